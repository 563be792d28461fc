use std::sync::Arc;

use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::*;

use crate::api::ApiTags;
use crate::auth::ForgeSecurityScheme;
use crate::model::{
    ArchiveSiteResponse, CreateSiteRequest, CreateVersionRequest, EnvironmentId, ErrorBody,
    ErrorsBody, Site, SiteDeployment, SiteEnvironment, SiteId, SiteVersion, VersionId, WorkspaceId,
};
use crate::service::auth::{AuthService, AuthServiceError};
use crate::service::site::{SiteError as SiteServiceError, SiteService};
use crate::SafeDisplay;

#[derive(ApiResponse)]
pub enum SiteError {
    /// Invalid request, returning with a list of issues detected in the request
    #[oai(status = 400)]
    BadRequest(Json<ErrorsBody>),
    /// Unauthorized
    #[oai(status = 401)]
    Unauthorized(Json<ErrorBody>),
    /// Forbidden
    #[oai(status = 403)]
    Forbidden(Json<ErrorBody>),
    /// Site not found
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// The request conflicts with the site's current state
    #[oai(status = 409)]
    Conflict(Json<ErrorBody>),
    /// Internal server error
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

type Result<T> = std::result::Result<T, SiteError>;

impl From<AuthServiceError> for SiteError {
    fn from(value: AuthServiceError) -> Self {
        match value {
            AuthServiceError::InvalidToken(_) => SiteError::Unauthorized(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            AuthServiceError::Internal(_) => SiteError::InternalError(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
        }
    }
}

impl From<SiteServiceError> for SiteError {
    fn from(value: SiteServiceError) -> Self {
        match value {
            SiteServiceError::ArgValidation(errors) => {
                SiteError::BadRequest(Json(ErrorsBody { errors }))
            }
            SiteServiceError::SiteNotFound(_)
            | SiteServiceError::EnvironmentNotFound(_)
            | SiteServiceError::WorkspaceNotFound(_)
            | SiteServiceError::VersionNotFound(_) => SiteError::NotFound(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            SiteServiceError::SlugAlreadyExists(_) | SiteServiceError::InvalidSiteState(_) => {
                SiteError::Conflict(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
            SiteServiceError::Unauthorized(_) => SiteError::Forbidden(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            SiteServiceError::Internal(_) | SiteServiceError::InternalRepoError(_) => {
                SiteError::InternalError(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
        }
    }
}

pub struct SiteApi {
    pub auth_service: Arc<dyn AuthService + Send + Sync>,
    pub site_service: Arc<dyn SiteService + Send + Sync>,
}

#[OpenApi(prefix_path = "/v1", tag = ApiTags::Site)]
impl SiteApi {
    /// Create a site
    ///
    /// The site starts in `Draft` status with development, preview and
    /// production environments.
    #[oai(
        path = "/workspaces/:workspace_id/sites",
        method = "post",
        operation_id = "create_site"
    )]
    async fn create_site(
        &self,
        workspace_id: Path<WorkspaceId>,
        request: Json<CreateSiteRequest>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Site>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let site = self
            .site_service
            .create(&workspace_id.0, &request.0, &auth)
            .await?;
        Ok(Json(site))
    }

    /// Get all sites of a workspace
    #[oai(
        path = "/workspaces/:workspace_id/sites",
        method = "get",
        operation_id = "get_sites"
    )]
    async fn get_sites(
        &self,
        workspace_id: Path<WorkspaceId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Vec<Site>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let sites = self
            .site_service
            .get_by_workspace(&workspace_id.0, &auth)
            .await?;
        Ok(Json(sites))
    }

    /// Get a site
    #[oai(path = "/sites/:site_id", method = "get", operation_id = "get_site")]
    async fn get_site(
        &self,
        site_id: Path<SiteId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Site>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let site = self.site_service.get(&site_id.0, &auth).await?;
        Ok(Json(site))
    }

    /// Archive a site
    ///
    /// Archived sites keep their data but accept no further changes.
    #[oai(
        path = "/sites/:site_id",
        method = "delete",
        operation_id = "archive_site"
    )]
    async fn archive_site(
        &self,
        site_id: Path<SiteId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<ArchiveSiteResponse>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        self.site_service.archive(&site_id.0, &auth).await?;
        Ok(Json(ArchiveSiteResponse {}))
    }

    /// Get the environments of a site
    #[oai(
        path = "/sites/:site_id/environments",
        method = "get",
        operation_id = "get_site_environments"
    )]
    async fn get_site_environments(
        &self,
        site_id: Path<SiteId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Vec<SiteEnvironment>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let environments = self.site_service.get_environments(&site_id.0, &auth).await?;
        Ok(Json(environments))
    }

    /// Get the deployments of an environment
    #[oai(
        path = "/environments/:environment_id/deployments",
        method = "get",
        operation_id = "get_environment_deployments"
    )]
    async fn get_environment_deployments(
        &self,
        environment_id: Path<EnvironmentId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Vec<SiteDeployment>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let deployments = self
            .site_service
            .get_deployments(&environment_id.0, &auth)
            .await?;
        Ok(Json(deployments))
    }

    /// Create a new site version
    ///
    /// Version numbers are allocated sequentially per site.
    #[oai(
        path = "/sites/:site_id/versions",
        method = "post",
        operation_id = "create_site_version"
    )]
    async fn create_site_version(
        &self,
        site_id: Path<SiteId>,
        request: Json<CreateVersionRequest>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<SiteVersion>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let version = self
            .site_service
            .create_version(&site_id.0, &request.0, &auth)
            .await?;
        Ok(Json(version))
    }

    /// Get all versions of a site
    #[oai(
        path = "/sites/:site_id/versions",
        method = "get",
        operation_id = "get_site_versions"
    )]
    async fn get_site_versions(
        &self,
        site_id: Path<SiteId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Vec<SiteVersion>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let versions = self.site_service.get_versions(&site_id.0, &auth).await?;
        Ok(Json(versions))
    }

    /// Activate a site version
    ///
    /// Makes the version the one served to prospects. A `Draft` site moves
    /// to `Review` as a side effect.
    #[oai(
        path = "/sites/:site_id/versions/:version_id/activate",
        method = "post",
        operation_id = "activate_site_version"
    )]
    async fn activate_site_version(
        &self,
        site_id: Path<SiteId>,
        version_id: Path<VersionId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Site>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let site = self
            .site_service
            .activate_version(&site_id.0, &version_id.0, &auth)
            .await?;
        Ok(Json(site))
    }
}
