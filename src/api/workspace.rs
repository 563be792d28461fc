use std::sync::Arc;

use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::*;

use crate::api::ApiTags;
use crate::auth::ForgeSecurityScheme;
use crate::model::{
    AddMemberRequest, AddMemberResponse, ErrorBody, Workspace, WorkspaceData, WorkspaceId,
};
use crate::service::auth::{AuthService, AuthServiceError};
use crate::service::workspace::{WorkspaceError as WorkspaceServiceError, WorkspaceService};
use crate::SafeDisplay;

#[derive(ApiResponse)]
pub enum WorkspaceError {
    /// Unauthorized
    #[oai(status = 401)]
    Unauthorized(Json<ErrorBody>),
    /// Forbidden
    #[oai(status = 403)]
    Forbidden(Json<ErrorBody>),
    /// Workspace not found
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// Internal server error
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

type Result<T> = std::result::Result<T, WorkspaceError>;

impl From<AuthServiceError> for WorkspaceError {
    fn from(value: AuthServiceError) -> Self {
        match value {
            AuthServiceError::InvalidToken(_) => WorkspaceError::Unauthorized(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            AuthServiceError::Internal(_) => WorkspaceError::InternalError(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
        }
    }
}

impl From<WorkspaceServiceError> for WorkspaceError {
    fn from(value: WorkspaceServiceError) -> Self {
        match value {
            WorkspaceServiceError::WorkspaceNotFound(_)
            | WorkspaceServiceError::AccountNotFound(_) => {
                WorkspaceError::NotFound(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
            WorkspaceServiceError::Unauthorized(_) => WorkspaceError::Forbidden(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            WorkspaceServiceError::Internal(_) | WorkspaceServiceError::InternalRepoError(_) => {
                WorkspaceError::InternalError(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
        }
    }
}

pub struct WorkspaceApi {
    pub auth_service: Arc<dyn AuthService + Send + Sync>,
    pub workspace_service: Arc<dyn WorkspaceService + Send + Sync>,
}

#[OpenApi(prefix_path = "/v1/workspaces", tag = ApiTags::Workspace)]
impl WorkspaceApi {
    /// Create a workspace
    ///
    /// The calling account becomes the workspace owner.
    #[oai(path = "/", method = "post", operation_id = "create_workspace")]
    async fn create_workspace(
        &self,
        request: Json<WorkspaceData>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Workspace>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let workspace = self.workspace_service.create(&request.0, &auth).await?;
        Ok(Json(workspace))
    }

    /// Get all workspaces
    ///
    /// Lists the workspaces the calling account is a member of.
    #[oai(path = "/", method = "get", operation_id = "get_workspaces")]
    async fn get_workspaces(&self, token: ForgeSecurityScheme) -> Result<Json<Vec<Workspace>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let workspaces = self.workspace_service.get_for_account(&auth).await?;
        Ok(Json(workspaces))
    }

    /// Get a workspace
    #[oai(
        path = "/:workspace_id",
        method = "get",
        operation_id = "get_workspace"
    )]
    async fn get_workspace(
        &self,
        workspace_id: Path<WorkspaceId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Workspace>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let workspace = self.workspace_service.get(&workspace_id.0, &auth).await?;
        Ok(Json(workspace))
    }

    /// Add a workspace member
    ///
    /// Only the workspace owner can add members.
    #[oai(
        path = "/:workspace_id/members",
        method = "post",
        operation_id = "add_workspace_member"
    )]
    async fn add_workspace_member(
        &self,
        workspace_id: Path<WorkspaceId>,
        request: Json<AddMemberRequest>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<AddMemberResponse>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        self.workspace_service
            .add_member(
                &workspace_id.0,
                &request.0.account_id,
                request.0.role.clone(),
                &auth,
            )
            .await?;
        Ok(Json(AddMemberResponse {}))
    }
}
