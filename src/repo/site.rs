use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Database, Pool};
use uuid::Uuid;

use super::RepoError;
use crate::model::{
    AccountId, DeploymentId, EnvironmentId, Site, SiteDeployment, SiteEnvironment, SiteId,
    SiteVersion, VersionId, WorkspaceId,
};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SiteRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: i32,
    pub active_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Site> for SiteRecord {
    fn from(value: Site) -> Self {
        Self {
            id: value.id.0,
            workspace_id: value.workspace_id.0,
            name: value.name,
            slug: value.slug,
            status: value.status.into(),
            active_version_id: value.active_version_id.map(|v| v.0),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl TryFrom<SiteRecord> for Site {
    type Error = String;

    fn try_from(value: SiteRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SiteId(value.id),
            workspace_id: WorkspaceId(value.workspace_id),
            name: value.name,
            slug: value.slug,
            status: value.status.try_into()?,
            active_version_id: value.active_version_id.map(VersionId),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EnvironmentRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub env_type: i32,
    pub hosting_project_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SiteEnvironment> for EnvironmentRecord {
    fn from(value: SiteEnvironment) -> Self {
        Self {
            id: value.id.0,
            site_id: value.site_id.0,
            env_type: value.env_type.into(),
            hosting_project_id: value.hosting_project_id,
            created_at: value.created_at,
        }
    }
}

impl TryFrom<EnvironmentRecord> for SiteEnvironment {
    type Error = String;

    fn try_from(value: EnvironmentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EnvironmentId(value.id),
            site_id: SiteId(value.site_id),
            env_type: value.env_type.try_into()?,
            hosting_project_id: value.hosting_project_id,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VersionRecord {
    pub id: Uuid,
    pub site_id: Uuid,
    pub number: i64,
    pub label: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<SiteVersion> for VersionRecord {
    fn from(value: SiteVersion) -> Self {
        Self {
            id: value.id.0,
            site_id: value.site_id.0,
            number: value.number,
            label: value.label,
            created_by: value.created_by.0,
            created_at: value.created_at,
        }
    }
}

impl From<VersionRecord> for SiteVersion {
    fn from(value: VersionRecord) -> Self {
        Self {
            id: VersionId(value.id),
            site_id: SiteId(value.site_id),
            number: value.number,
            label: value.label,
            created_by: AccountId(value.created_by),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DeploymentRecord {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub version_id: Option<Uuid>,
    pub status: i32,
    pub url: Option<String>,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DeploymentRecord> for SiteDeployment {
    type Error = String;

    fn try_from(value: DeploymentRecord) -> Result<Self, Self::Error> {
        let metadata = if value.metadata.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&value.metadata)
                .map_err(|err| format!("Invalid deployment metadata: {err}"))?
        };
        Ok(Self {
            id: DeploymentId(value.id),
            environment_id: EnvironmentId(value.environment_id),
            version_id: value.version_id.map(VersionId),
            status: value.status.try_into()?,
            url: value.url,
            metadata,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[async_trait]
pub trait SiteRepo {
    /// Creates the site and its default environments in one transaction.
    /// A duplicate slug within the workspace surfaces as a unique violation.
    async fn create(
        &self,
        site: &SiteRecord,
        environments: &[EnvironmentRecord],
    ) -> Result<(), RepoError>;
    async fn get(&self, id: &Uuid) -> Result<Option<SiteRecord>, RepoError>;
    async fn get_by_workspace(&self, workspace_id: &Uuid) -> Result<Vec<SiteRecord>, RepoError>;
    /// Moves the site to `to` only when its current status is in `from`.
    async fn update_status_if(&self, id: &Uuid, from: &[i32], to: i32) -> Result<bool, RepoError>;
    async fn set_active_version(&self, id: &Uuid, version_id: &Uuid) -> Result<(), RepoError>;

    async fn get_environment(&self, id: &Uuid) -> Result<Option<EnvironmentRecord>, RepoError>;
    async fn get_environments(&self, site_id: &Uuid) -> Result<Vec<EnvironmentRecord>, RepoError>;
    async fn get_environment_by_type(
        &self,
        site_id: &Uuid,
        env_type: i32,
    ) -> Result<Option<EnvironmentRecord>, RepoError>;

    async fn max_version_number(&self, site_id: &Uuid) -> Result<i64, RepoError>;
    /// Fails with a unique violation when the version number was taken by a
    /// concurrent writer; callers retry with a fresh number.
    async fn create_version(&self, version: &VersionRecord) -> Result<(), RepoError>;
    async fn get_version(&self, id: &Uuid) -> Result<Option<VersionRecord>, RepoError>;
    async fn get_versions(&self, site_id: &Uuid) -> Result<Vec<VersionRecord>, RepoError>;

    async fn create_deployment(&self, deployment: &DeploymentRecord) -> Result<(), RepoError>;
    async fn get_deployments(
        &self,
        environment_id: &Uuid,
    ) -> Result<Vec<DeploymentRecord>, RepoError>;
}

pub struct DbSiteRepo<DB: Database> {
    db_pool: Arc<Pool<DB>>,
}

impl<DB: Database> DbSiteRepo<DB> {
    pub fn new(db_pool: Arc<Pool<DB>>) -> Self {
        Self { db_pool }
    }
}

fn status_in_clause(from: &[i32], first_bind: usize) -> String {
    let placeholders = from
        .iter()
        .enumerate()
        .map(|(i, _)| format!("${}", first_bind + i))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({placeholders})")
}

#[async_trait]
impl SiteRepo for DbSiteRepo<sqlx::Postgres> {
    async fn create(
        &self,
        site: &SiteRecord,
        environments: &[EnvironmentRecord],
    ) -> Result<(), RepoError> {
        let mut transaction = self.db_pool.begin().await?;

        sqlx::query(
            r#"
              INSERT INTO sites
                (id, workspace_id, name, slug, status, active_version_id, created_at, updated_at)
              VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(site.id)
        .bind(site.workspace_id)
        .bind(&site.name)
        .bind(&site.slug)
        .bind(site.status)
        .bind(site.active_version_id)
        .bind(site.created_at)
        .bind(site.updated_at)
        .execute(&mut *transaction)
        .await?;

        for environment in environments {
            sqlx::query(
                r#"
                  INSERT INTO site_environments
                    (id, site_id, env_type, hosting_project_id, created_at)
                  VALUES
                    ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(environment.id)
            .bind(environment.site_id)
            .bind(environment.env_type)
            .bind(&environment.hosting_project_id)
            .bind(environment.created_at)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<SiteRecord>, RepoError> {
        let result = sqlx::query_as::<_, SiteRecord>("SELECT * FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db_pool.deref())
            .await?;

        Ok(result)
    }

    async fn get_by_workspace(&self, workspace_id: &Uuid) -> Result<Vec<SiteRecord>, RepoError> {
        let result = sqlx::query_as::<_, SiteRecord>(
            "SELECT * FROM sites WHERE workspace_id = $1 ORDER BY created_at",
        )
        .bind(workspace_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn update_status_if(&self, id: &Uuid, from: &[i32], to: i32) -> Result<bool, RepoError> {
        let sql = format!(
            "UPDATE sites SET status = $1, updated_at = $2 WHERE id = $3 AND status IN {}",
            status_in_clause(from, 4)
        );
        let mut query = sqlx::query(&sql).bind(to).bind(Utc::now()).bind(id);
        for status in from {
            query = query.bind(status);
        }
        let result = query.execute(self.db_pool.deref()).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_active_version(&self, id: &Uuid, version_id: &Uuid) -> Result<(), RepoError> {
        sqlx::query("UPDATE sites SET active_version_id = $1, updated_at = $2 WHERE id = $3")
            .bind(version_id)
            .bind(Utc::now())
            .bind(id)
            .execute(self.db_pool.deref())
            .await?;

        Ok(())
    }

    async fn get_environment(&self, id: &Uuid) -> Result<Option<EnvironmentRecord>, RepoError> {
        let result = sqlx::query_as::<_, EnvironmentRecord>(
            "SELECT * FROM site_environments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn get_environments(&self, site_id: &Uuid) -> Result<Vec<EnvironmentRecord>, RepoError> {
        let result = sqlx::query_as::<_, EnvironmentRecord>(
            "SELECT * FROM site_environments WHERE site_id = $1 ORDER BY env_type",
        )
        .bind(site_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn get_environment_by_type(
        &self,
        site_id: &Uuid,
        env_type: i32,
    ) -> Result<Option<EnvironmentRecord>, RepoError> {
        let result = sqlx::query_as::<_, EnvironmentRecord>(
            "SELECT * FROM site_environments WHERE site_id = $1 AND env_type = $2",
        )
        .bind(site_id)
        .bind(env_type)
        .fetch_optional(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn max_version_number(&self, site_id: &Uuid) -> Result<i64, RepoError> {
        let (max,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(number) FROM site_versions WHERE site_id = $1")
                .bind(site_id)
                .fetch_one(self.db_pool.deref())
                .await?;

        Ok(max.unwrap_or(0))
    }

    async fn create_version(&self, version: &VersionRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              INSERT INTO site_versions
                (id, site_id, number, label, created_by, created_at)
              VALUES
                ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(version.id)
        .bind(version.site_id)
        .bind(version.number)
        .bind(&version.label)
        .bind(version.created_by)
        .bind(version.created_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get_version(&self, id: &Uuid) -> Result<Option<VersionRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, VersionRecord>("SELECT * FROM site_versions WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_versions(&self, site_id: &Uuid) -> Result<Vec<VersionRecord>, RepoError> {
        let result = sqlx::query_as::<_, VersionRecord>(
            "SELECT * FROM site_versions WHERE site_id = $1 ORDER BY number",
        )
        .bind(site_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn create_deployment(&self, deployment: &DeploymentRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              INSERT INTO site_deployments
                (id, environment_id, version_id, status, url, metadata, created_at, updated_at)
              VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(deployment.id)
        .bind(deployment.environment_id)
        .bind(deployment.version_id)
        .bind(deployment.status)
        .bind(&deployment.url)
        .bind(&deployment.metadata)
        .bind(deployment.created_at)
        .bind(deployment.updated_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get_deployments(
        &self,
        environment_id: &Uuid,
    ) -> Result<Vec<DeploymentRecord>, RepoError> {
        let result = sqlx::query_as::<_, DeploymentRecord>(
            "SELECT * FROM site_deployments WHERE environment_id = $1 ORDER BY created_at",
        )
        .bind(environment_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }
}

#[async_trait]
impl SiteRepo for DbSiteRepo<sqlx::Sqlite> {
    async fn create(
        &self,
        site: &SiteRecord,
        environments: &[EnvironmentRecord],
    ) -> Result<(), RepoError> {
        let mut transaction = self.db_pool.begin().await?;

        sqlx::query(
            "INSERT INTO sites (id, workspace_id, name, slug, status, active_version_id, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(site.id)
        .bind(site.workspace_id)
        .bind(&site.name)
        .bind(&site.slug)
        .bind(site.status)
        .bind(site.active_version_id)
        .bind(site.created_at)
        .bind(site.updated_at)
        .execute(&mut *transaction)
        .await?;

        for environment in environments {
            sqlx::query(
                "INSERT INTO site_environments (id, site_id, env_type, hosting_project_id, created_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(environment.id)
            .bind(environment.site_id)
            .bind(environment.env_type)
            .bind(&environment.hosting_project_id)
            .bind(environment.created_at)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<SiteRecord>, RepoError> {
        let result = sqlx::query_as::<_, SiteRecord>("SELECT * FROM sites WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db_pool.deref())
            .await?;

        Ok(result)
    }

    async fn get_by_workspace(&self, workspace_id: &Uuid) -> Result<Vec<SiteRecord>, RepoError> {
        let result = sqlx::query_as::<_, SiteRecord>(
            "SELECT * FROM sites WHERE workspace_id = $1 ORDER BY created_at",
        )
        .bind(workspace_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn update_status_if(&self, id: &Uuid, from: &[i32], to: i32) -> Result<bool, RepoError> {
        let sql = format!(
            "UPDATE sites SET status = $1, updated_at = $2 WHERE id = $3 AND status IN {}",
            status_in_clause(from, 4)
        );
        let mut query = sqlx::query(&sql).bind(to).bind(Utc::now()).bind(id);
        for status in from {
            query = query.bind(status);
        }
        let result = query.execute(self.db_pool.deref()).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_active_version(&self, id: &Uuid, version_id: &Uuid) -> Result<(), RepoError> {
        sqlx::query("UPDATE sites SET active_version_id = $1, updated_at = $2 WHERE id = $3")
            .bind(version_id)
            .bind(Utc::now())
            .bind(id)
            .execute(self.db_pool.deref())
            .await?;

        Ok(())
    }

    async fn get_environment(&self, id: &Uuid) -> Result<Option<EnvironmentRecord>, RepoError> {
        let result = sqlx::query_as::<_, EnvironmentRecord>(
            "SELECT * FROM site_environments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn get_environments(&self, site_id: &Uuid) -> Result<Vec<EnvironmentRecord>, RepoError> {
        let result = sqlx::query_as::<_, EnvironmentRecord>(
            "SELECT * FROM site_environments WHERE site_id = $1 ORDER BY env_type",
        )
        .bind(site_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn get_environment_by_type(
        &self,
        site_id: &Uuid,
        env_type: i32,
    ) -> Result<Option<EnvironmentRecord>, RepoError> {
        let result = sqlx::query_as::<_, EnvironmentRecord>(
            "SELECT * FROM site_environments WHERE site_id = $1 AND env_type = $2",
        )
        .bind(site_id)
        .bind(env_type)
        .fetch_optional(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn max_version_number(&self, site_id: &Uuid) -> Result<i64, RepoError> {
        let (max,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(number) FROM site_versions WHERE site_id = $1")
                .bind(site_id)
                .fetch_one(self.db_pool.deref())
                .await?;

        Ok(max.unwrap_or(0))
    }

    async fn create_version(&self, version: &VersionRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO site_versions (id, site_id, number, label, created_by, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(version.id)
        .bind(version.site_id)
        .bind(version.number)
        .bind(&version.label)
        .bind(version.created_by)
        .bind(version.created_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get_version(&self, id: &Uuid) -> Result<Option<VersionRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, VersionRecord>("SELECT * FROM site_versions WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_versions(&self, site_id: &Uuid) -> Result<Vec<VersionRecord>, RepoError> {
        let result = sqlx::query_as::<_, VersionRecord>(
            "SELECT * FROM site_versions WHERE site_id = $1 ORDER BY number",
        )
        .bind(site_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn create_deployment(&self, deployment: &DeploymentRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO site_deployments (id, environment_id, version_id, status, url, metadata, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(deployment.id)
        .bind(deployment.environment_id)
        .bind(deployment.version_id)
        .bind(deployment.status)
        .bind(&deployment.url)
        .bind(&deployment.metadata)
        .bind(deployment.created_at)
        .bind(deployment.updated_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get_deployments(
        &self,
        environment_id: &Uuid,
    ) -> Result<Vec<DeploymentRecord>, RepoError> {
        let result = sqlx::query_as::<_, DeploymentRecord>(
            "SELECT * FROM site_deployments WHERE environment_id = $1 ORDER BY created_at",
        )
        .bind(environment_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }
}
