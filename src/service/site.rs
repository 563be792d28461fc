use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::AccountAuthorisation;
use crate::model::{
    slugify, CreateSiteRequest, CreateVersionRequest, EnvironmentId, EnvironmentType, Site,
    SiteDeployment, SiteEnvironment, SiteId, SiteStatus, SiteVersion, VersionId, WorkspaceId,
};
use crate::repo::site::{EnvironmentRecord, SiteRecord, SiteRepo, VersionRecord};
use crate::repo::workspace::WorkspaceRepo;
use crate::repo::{RepoError, ResultExt};
use crate::SafeDisplay;

/// Number of attempts to allocate the next version number before giving up.
/// Only contended when two writers snapshot the same site concurrently.
const VERSION_ALLOCATION_ATTEMPTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("Site Not Found: {0}")]
    SiteNotFound(SiteId),
    #[error("Environment Not Found: {0}")]
    EnvironmentNotFound(EnvironmentId),
    #[error("Workspace Not Found: {0}")]
    WorkspaceNotFound(WorkspaceId),
    #[error("Version Not Found: {0}")]
    VersionNotFound(VersionId),
    #[error("Site slug already in use: {0}")]
    SlugAlreadyExists(String),
    #[error("Invalid site state: {0}")]
    InvalidSiteState(String),
    #[error("Arg Validation error: {}", .0.join(", "))]
    ArgValidation(Vec<String>),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Internal error: {0}")]
    InternalRepoError(#[from] RepoError),
}

impl SafeDisplay for SiteError {
    fn to_safe_string(&self) -> String {
        match self {
            SiteError::SiteNotFound(_) => self.to_string(),
            SiteError::EnvironmentNotFound(_) => self.to_string(),
            SiteError::WorkspaceNotFound(_) => self.to_string(),
            SiteError::VersionNotFound(_) => self.to_string(),
            SiteError::SlugAlreadyExists(_) => self.to_string(),
            SiteError::InvalidSiteState(_) => self.to_string(),
            SiteError::ArgValidation(_) => self.to_string(),
            SiteError::Unauthorized(_) => self.to_string(),
            SiteError::Internal(_) => self.to_string(),
            SiteError::InternalRepoError(inner) => inner.to_safe_string(),
        }
    }
}

#[async_trait]
pub trait SiteService: Send + Sync {
    /// Creates a site in `Draft` status together with its development,
    /// preview and production environments.
    async fn create(
        &self,
        workspace_id: &WorkspaceId,
        request: &CreateSiteRequest,
        auth: &AccountAuthorisation,
    ) -> Result<Site, SiteError>;

    async fn get(&self, site_id: &SiteId, auth: &AccountAuthorisation) -> Result<Site, SiteError>;

    async fn get_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<Site>, SiteError>;

    async fn get_environments(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<SiteEnvironment>, SiteError>;

    /// Deployment history of an environment, in creation order.
    async fn get_deployments(
        &self,
        environment_id: &EnvironmentId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<SiteDeployment>, SiteError>;

    /// Allocates the next version number for the site. Concurrent calls each
    /// get a distinct number.
    async fn create_version(
        &self,
        site_id: &SiteId,
        request: &CreateVersionRequest,
        auth: &AccountAuthorisation,
    ) -> Result<SiteVersion, SiteError>;

    async fn get_versions(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<SiteVersion>, SiteError>;

    /// Makes the version the site's active one. A `Draft` site moves to
    /// `Review` as a side effect.
    async fn activate_version(
        &self,
        site_id: &SiteId,
        version_id: &VersionId,
        auth: &AccountAuthorisation,
    ) -> Result<Site, SiteError>;

    async fn archive(&self, site_id: &SiteId, auth: &AccountAuthorisation)
        -> Result<(), SiteError>;
}

pub struct SiteServiceDefault {
    site_repo: Arc<dyn SiteRepo + Send + Sync>,
    workspace_repo: Arc<dyn WorkspaceRepo + Send + Sync>,
}

impl SiteServiceDefault {
    pub fn new(
        site_repo: Arc<dyn SiteRepo + Send + Sync>,
        workspace_repo: Arc<dyn WorkspaceRepo + Send + Sync>,
    ) -> Self {
        Self {
            site_repo,
            workspace_repo,
        }
    }

    async fn authorize_workspace(
        &self,
        workspace_id: &WorkspaceId,
        auth: &AccountAuthorisation,
    ) -> Result<(), SiteError> {
        if auth.has_admin() {
            return Ok(());
        }
        let member = self
            .workspace_repo
            .get_member(&workspace_id.0, &auth.account_id().0)
            .await?;
        if member.is_some() {
            Ok(())
        } else {
            Err(SiteError::Unauthorized(
                "Not a member of this workspace".to_string(),
            ))
        }
    }

    async fn authorized_site(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<SiteRecord, SiteError> {
        let record = self
            .site_repo
            .get(&site_id.0)
            .await?
            .ok_or(SiteError::SiteNotFound(*site_id))?;
        self.authorize_workspace(&WorkspaceId(record.workspace_id), auth)
            .await?;
        Ok(record)
    }
}

#[async_trait]
impl SiteService for SiteServiceDefault {
    async fn create(
        &self,
        workspace_id: &WorkspaceId,
        request: &CreateSiteRequest,
        auth: &AccountAuthorisation,
    ) -> Result<Site, SiteError> {
        self.authorize_workspace(workspace_id, auth).await?;
        let workspace = self.workspace_repo.get(&workspace_id.0).await?;
        if workspace.is_none() {
            return Err(SiteError::WorkspaceNotFound(*workspace_id));
        }

        let slug = match &request.slug {
            Some(slug) => slug.clone(),
            None => slugify(&request.name),
        };
        if slug.is_empty() {
            return Err(SiteError::ArgValidation(vec![
                "Site name must contain at least one alphanumeric character".to_string(),
            ]));
        }

        let now = Utc::now();
        let site = Site {
            id: SiteId::new_v4(),
            workspace_id: *workspace_id,
            name: request.name.clone(),
            slug: slug.clone(),
            status: SiteStatus::Draft,
            active_version_id: None,
            created_at: now,
            updated_at: now,
        };
        let environments = [
            EnvironmentType::Development,
            EnvironmentType::Preview,
            EnvironmentType::Production,
        ]
        .into_iter()
        .map(|env_type| EnvironmentRecord {
            id: uuid::Uuid::new_v4(),
            site_id: site.id.0,
            env_type: env_type.into(),
            hosting_project_id: None,
            created_at: now,
        })
        .collect::<Vec<_>>();

        info!("Creating site {} in workspace {}", site.slug, workspace_id);
        self.site_repo
            .create(&site.clone().into(), &environments)
            .await
            .to_error_on_unique_violation(SiteError::SlugAlreadyExists(slug))?;

        Ok(site)
    }

    async fn get(&self, site_id: &SiteId, auth: &AccountAuthorisation) -> Result<Site, SiteError> {
        let record = self.authorized_site(site_id, auth).await?;
        record.try_into().map_err(SiteError::Internal)
    }

    async fn get_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<Site>, SiteError> {
        self.authorize_workspace(workspace_id, auth).await?;
        let records = self.site_repo.get_by_workspace(&workspace_id.0).await?;
        records
            .into_iter()
            .map(|record| record.try_into().map_err(SiteError::Internal))
            .collect()
    }

    async fn get_environments(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<SiteEnvironment>, SiteError> {
        self.authorized_site(site_id, auth).await?;
        let records = self.site_repo.get_environments(&site_id.0).await?;
        records
            .into_iter()
            .map(|record| record.try_into().map_err(SiteError::Internal))
            .collect()
    }

    async fn get_deployments(
        &self,
        environment_id: &EnvironmentId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<SiteDeployment>, SiteError> {
        let environment = self
            .site_repo
            .get_environment(&environment_id.0)
            .await?
            .ok_or(SiteError::EnvironmentNotFound(*environment_id))?;
        self.authorized_site(&SiteId(environment.site_id), auth)
            .await?;
        let records = self.site_repo.get_deployments(&environment_id.0).await?;
        records
            .into_iter()
            .map(|record| record.try_into().map_err(SiteError::Internal))
            .collect()
    }

    async fn create_version(
        &self,
        site_id: &SiteId,
        request: &CreateVersionRequest,
        auth: &AccountAuthorisation,
    ) -> Result<SiteVersion, SiteError> {
        let site = self.authorized_site(site_id, auth).await?;
        if site.status == Into::<i32>::into(SiteStatus::Archived) {
            return Err(SiteError::InvalidSiteState(
                "Cannot add versions to an archived site".to_string(),
            ));
        }

        for _ in 0..VERSION_ALLOCATION_ATTEMPTS {
            let number = self.site_repo.max_version_number(&site_id.0).await? + 1;
            let record = VersionRecord {
                id: VersionId::new_v4().0,
                site_id: site_id.0,
                number,
                label: request.label.clone(),
                created_by: auth.account_id().0,
                created_at: Utc::now(),
            };
            let created = self
                .site_repo
                .create_version(&record)
                .await
                .false_on_unique_violation()?;
            if created {
                return Ok(record.into());
            }
            warn!(
                "Version number {} for site {} was taken concurrently, retrying",
                number, site_id
            );
        }

        Err(SiteError::Internal(
            "Could not allocate a site version number".to_string(),
        ))
    }

    async fn get_versions(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<SiteVersion>, SiteError> {
        self.authorized_site(site_id, auth).await?;
        let records = self.site_repo.get_versions(&site_id.0).await?;
        Ok(records.into_iter().map(|record| record.into()).collect())
    }

    async fn activate_version(
        &self,
        site_id: &SiteId,
        version_id: &VersionId,
        auth: &AccountAuthorisation,
    ) -> Result<Site, SiteError> {
        self.authorized_site(site_id, auth).await?;
        let version = self
            .site_repo
            .get_version(&version_id.0)
            .await?
            .ok_or(SiteError::VersionNotFound(*version_id))?;
        if version.site_id != site_id.0 {
            return Err(SiteError::VersionNotFound(*version_id));
        }

        self.site_repo
            .set_active_version(&site_id.0, &version_id.0)
            .await?;
        // No-op unless the site is still in Draft.
        self.site_repo
            .update_status_if(
                &site_id.0,
                &[SiteStatus::Draft.into()],
                SiteStatus::Review.into(),
            )
            .await?;

        let record = self
            .site_repo
            .get(&site_id.0)
            .await?
            .ok_or(SiteError::SiteNotFound(*site_id))?;
        record.try_into().map_err(SiteError::Internal)
    }

    async fn archive(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<(), SiteError> {
        self.authorized_site(site_id, auth).await?;
        info!("Archiving site {}", site_id);
        let archived = self
            .site_repo
            .update_status_if(
                &site_id.0,
                &[
                    SiteStatus::Draft.into(),
                    SiteStatus::Review.into(),
                    SiteStatus::ReadyForTransfer.into(),
                    SiteStatus::Live.into(),
                ],
                SiteStatus::Archived.into(),
            )
            .await?;
        if archived {
            Ok(())
        } else {
            Err(SiteError::InvalidSiteState(
                "Site is already archived".to_string(),
            ))
        }
    }
}
