use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Database, Pool};
use uuid::Uuid;

use super::RepoError;
use crate::model::{DnsRecord, DomainId, EnvironmentId, SiteDomain};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DomainRecord {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub domain_name: String,
    pub is_primary: bool,
    pub status: i32,
    pub dns_records: String,
    pub verification_records: String,
    pub error_message: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn to_json(records: &[DnsRecord]) -> Result<String, String> {
    serde_json::to_string(records).map_err(|err| format!("Invalid DNS records: {err}"))
}

fn from_json(json: &str) -> Result<Vec<DnsRecord>, String> {
    if json.is_empty() {
        return Ok(vec![]);
    }
    serde_json::from_str(json).map_err(|err| format!("Invalid DNS records: {err}"))
}

impl TryFrom<SiteDomain> for DomainRecord {
    type Error = String;

    fn try_from(value: SiteDomain) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.0,
            environment_id: value.environment_id.0,
            domain_name: value.domain_name,
            is_primary: value.is_primary,
            status: value.status.into(),
            dns_records: to_json(&value.dns_records)?,
            verification_records: to_json(&value.verification_records)?,
            error_message: value.error_message,
            verified_at: value.verified_at,
            failed_at: value.failed_at,
            last_checked_at: value.last_checked_at,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<DomainRecord> for SiteDomain {
    type Error = String;

    fn try_from(value: DomainRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: DomainId(value.id),
            environment_id: EnvironmentId(value.environment_id),
            domain_name: value.domain_name,
            is_primary: value.is_primary,
            status: value.status.try_into()?,
            dns_records: from_json(&value.dns_records)?,
            verification_records: from_json(&value.verification_records)?,
            error_message: value.error_message,
            verified_at: value.verified_at,
            failed_at: value.failed_at,
            last_checked_at: value.last_checked_at,
            created_at: value.created_at,
        })
    }
}

#[async_trait]
pub trait DomainRepo {
    /// Inserts the domain; a primary domain clears any existing primary flag
    /// in the same environment within the same transaction.
    async fn create(&self, domain: &DomainRecord) -> Result<(), RepoError>;
    async fn get(&self, id: &Uuid) -> Result<Option<DomainRecord>, RepoError>;
    async fn get_by_environment(
        &self,
        environment_id: &Uuid,
    ) -> Result<Vec<DomainRecord>, RepoError>;
    async fn update(&self, domain: &DomainRecord) -> Result<(), RepoError>;
    async fn set_primary(&self, id: &Uuid, environment_id: &Uuid) -> Result<(), RepoError>;
    async fn mark_removed(&self, id: &Uuid, status: i32) -> Result<(), RepoError>;
}

pub struct DbDomainRepo<DB: Database> {
    db_pool: Arc<Pool<DB>>,
}

impl<DB: Database> DbDomainRepo<DB> {
    pub fn new(db_pool: Arc<Pool<DB>>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl DomainRepo for DbDomainRepo<sqlx::Postgres> {
    async fn create(&self, domain: &DomainRecord) -> Result<(), RepoError> {
        let mut transaction = self.db_pool.begin().await?;

        if domain.is_primary {
            sqlx::query(
                "UPDATE site_domains SET is_primary = FALSE WHERE environment_id = $1 AND is_primary = TRUE",
            )
            .bind(domain.environment_id)
            .execute(&mut *transaction)
            .await?;
        }

        sqlx::query(
            r#"
              INSERT INTO site_domains
                (id, environment_id, domain_name, is_primary, status, dns_records,
                 verification_records, error_message, verified_at, failed_at,
                 last_checked_at, created_at)
              VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(domain.id)
        .bind(domain.environment_id)
        .bind(&domain.domain_name)
        .bind(domain.is_primary)
        .bind(domain.status)
        .bind(&domain.dns_records)
        .bind(&domain.verification_records)
        .bind(&domain.error_message)
        .bind(domain.verified_at)
        .bind(domain.failed_at)
        .bind(domain.last_checked_at)
        .bind(domain.created_at)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<DomainRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, DomainRecord>("SELECT * FROM site_domains WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_by_environment(
        &self,
        environment_id: &Uuid,
    ) -> Result<Vec<DomainRecord>, RepoError> {
        let result = sqlx::query_as::<_, DomainRecord>(
            "SELECT * FROM site_domains WHERE environment_id = $1 ORDER BY created_at",
        )
        .bind(environment_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn update(&self, domain: &DomainRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              UPDATE site_domains
              SET status = $1,
                  dns_records = $2,
                  verification_records = $3,
                  error_message = $4,
                  verified_at = $5,
                  failed_at = $6,
                  last_checked_at = $7
              WHERE id = $8
            "#,
        )
        .bind(domain.status)
        .bind(&domain.dns_records)
        .bind(&domain.verification_records)
        .bind(&domain.error_message)
        .bind(domain.verified_at)
        .bind(domain.failed_at)
        .bind(domain.last_checked_at)
        .bind(domain.id)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn set_primary(&self, id: &Uuid, environment_id: &Uuid) -> Result<(), RepoError> {
        let mut transaction = self.db_pool.begin().await?;

        sqlx::query(
            "UPDATE site_domains SET is_primary = FALSE WHERE environment_id = $1 AND is_primary = TRUE",
        )
        .bind(environment_id)
        .execute(&mut *transaction)
        .await?;

        sqlx::query("UPDATE site_domains SET is_primary = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn mark_removed(&self, id: &Uuid, status: i32) -> Result<(), RepoError> {
        sqlx::query("UPDATE site_domains SET status = $1, is_primary = FALSE WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(self.db_pool.deref())
            .await?;

        Ok(())
    }
}

#[async_trait]
impl DomainRepo for DbDomainRepo<sqlx::Sqlite> {
    async fn create(&self, domain: &DomainRecord) -> Result<(), RepoError> {
        let mut transaction = self.db_pool.begin().await?;

        if domain.is_primary {
            sqlx::query(
                "UPDATE site_domains SET is_primary = FALSE WHERE environment_id = $1 AND is_primary = TRUE",
            )
            .bind(domain.environment_id)
            .execute(&mut *transaction)
            .await?;
        }

        sqlx::query(
            "INSERT INTO site_domains (id, environment_id, domain_name, is_primary, status, dns_records, verification_records, error_message, verified_at, failed_at, last_checked_at, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(domain.id)
        .bind(domain.environment_id)
        .bind(&domain.domain_name)
        .bind(domain.is_primary)
        .bind(domain.status)
        .bind(&domain.dns_records)
        .bind(&domain.verification_records)
        .bind(&domain.error_message)
        .bind(domain.verified_at)
        .bind(domain.failed_at)
        .bind(domain.last_checked_at)
        .bind(domain.created_at)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<DomainRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, DomainRecord>("SELECT * FROM site_domains WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_by_environment(
        &self,
        environment_id: &Uuid,
    ) -> Result<Vec<DomainRecord>, RepoError> {
        let result = sqlx::query_as::<_, DomainRecord>(
            "SELECT * FROM site_domains WHERE environment_id = $1 ORDER BY created_at",
        )
        .bind(environment_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn update(&self, domain: &DomainRecord) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE site_domains SET status = $1, dns_records = $2, verification_records = $3, error_message = $4, verified_at = $5, failed_at = $6, last_checked_at = $7 WHERE id = $8",
        )
        .bind(domain.status)
        .bind(&domain.dns_records)
        .bind(&domain.verification_records)
        .bind(&domain.error_message)
        .bind(domain.verified_at)
        .bind(domain.failed_at)
        .bind(domain.last_checked_at)
        .bind(domain.id)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn set_primary(&self, id: &Uuid, environment_id: &Uuid) -> Result<(), RepoError> {
        let mut transaction = self.db_pool.begin().await?;

        sqlx::query(
            "UPDATE site_domains SET is_primary = FALSE WHERE environment_id = $1 AND is_primary = TRUE",
        )
        .bind(environment_id)
        .execute(&mut *transaction)
        .await?;

        sqlx::query("UPDATE site_domains SET is_primary = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn mark_removed(&self, id: &Uuid, status: i32) -> Result<(), RepoError> {
        sqlx::query("UPDATE site_domains SET status = $1, is_primary = FALSE WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(self.db_pool.deref())
            .await?;

        Ok(())
    }
}
