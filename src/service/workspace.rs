use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::auth::AccountAuthorisation;
use crate::model::{AccountId, Workspace, WorkspaceData, WorkspaceId, WorkspaceRole};
use crate::repo::account::AccountRepo;
use crate::repo::workspace::{WorkspaceMemberRecord, WorkspaceRepo};
use crate::repo::RepoError;
use crate::SafeDisplay;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Workspace Not Found: {0}")]
    WorkspaceNotFound(WorkspaceId),
    #[error("Account Not Found: {0}")]
    AccountNotFound(AccountId),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Internal error: {0}")]
    InternalRepoError(#[from] RepoError),
}

impl SafeDisplay for WorkspaceError {
    fn to_safe_string(&self) -> String {
        match self {
            WorkspaceError::WorkspaceNotFound(_) => self.to_string(),
            WorkspaceError::AccountNotFound(_) => self.to_string(),
            WorkspaceError::Unauthorized(_) => self.to_string(),
            WorkspaceError::Internal(_) => self.to_string(),
            WorkspaceError::InternalRepoError(inner) => inner.to_safe_string(),
        }
    }
}

#[async_trait]
pub trait WorkspaceService: Send + Sync {
    /// Creates a workspace with the caller as its owner.
    async fn create(
        &self,
        data: &WorkspaceData,
        auth: &AccountAuthorisation,
    ) -> Result<Workspace, WorkspaceError>;

    async fn get(
        &self,
        workspace_id: &WorkspaceId,
        auth: &AccountAuthorisation,
    ) -> Result<Workspace, WorkspaceError>;

    /// Workspaces the calling account is a member of.
    async fn get_for_account(
        &self,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<Workspace>, WorkspaceError>;

    /// Owner-only: adds another account as a workspace member.
    async fn add_member(
        &self,
        workspace_id: &WorkspaceId,
        account_id: &AccountId,
        role: WorkspaceRole,
        auth: &AccountAuthorisation,
    ) -> Result<(), WorkspaceError>;

    /// Fails with `Unauthorized` unless the caller is an admin or a member of
    /// the workspace.
    async fn authorize_member(
        &self,
        workspace_id: &WorkspaceId,
        auth: &AccountAuthorisation,
    ) -> Result<(), WorkspaceError>;
}

pub struct WorkspaceServiceDefault {
    workspace_repo: Arc<dyn WorkspaceRepo + Send + Sync>,
    account_repo: Arc<dyn AccountRepo + Send + Sync>,
}

impl WorkspaceServiceDefault {
    pub fn new(
        workspace_repo: Arc<dyn WorkspaceRepo + Send + Sync>,
        account_repo: Arc<dyn AccountRepo + Send + Sync>,
    ) -> Self {
        Self {
            workspace_repo,
            account_repo,
        }
    }

    async fn member_role(
        &self,
        workspace_id: &WorkspaceId,
        auth: &AccountAuthorisation,
    ) -> Result<Option<WorkspaceRole>, WorkspaceError> {
        let member = self
            .workspace_repo
            .get_member(&workspace_id.0, &auth.account_id().0)
            .await?;
        match member {
            Some(member) => Ok(Some(member.role().map_err(WorkspaceError::Internal)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl WorkspaceService for WorkspaceServiceDefault {
    async fn create(
        &self,
        data: &WorkspaceData,
        auth: &AccountAuthorisation,
    ) -> Result<Workspace, WorkspaceError> {
        let workspace = Workspace {
            id: WorkspaceId::new_v4(),
            name: data.name.clone(),
            contact_email: data.contact_email.clone(),
            created_at: Utc::now(),
        };
        info!("Creating workspace: {} ({})", workspace.name, workspace.id);
        self.workspace_repo
            .create(&workspace.clone().into(), &auth.account_id().0)
            .await?;
        Ok(workspace)
    }

    async fn get(
        &self,
        workspace_id: &WorkspaceId,
        auth: &AccountAuthorisation,
    ) -> Result<Workspace, WorkspaceError> {
        self.authorize_member(workspace_id, auth).await?;
        let record = self
            .workspace_repo
            .get(&workspace_id.0)
            .await?
            .ok_or(WorkspaceError::WorkspaceNotFound(*workspace_id))?;
        Ok(record.into())
    }

    async fn get_for_account(
        &self,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<Workspace>, WorkspaceError> {
        let records = self
            .workspace_repo
            .get_for_account(&auth.account_id().0)
            .await?;
        Ok(records.into_iter().map(|record| record.into()).collect())
    }

    async fn add_member(
        &self,
        workspace_id: &WorkspaceId,
        account_id: &AccountId,
        role: WorkspaceRole,
        auth: &AccountAuthorisation,
    ) -> Result<(), WorkspaceError> {
        if !auth.has_admin() {
            let caller_role = self.member_role(workspace_id, auth).await?;
            if caller_role != Some(WorkspaceRole::Owner) {
                return Err(WorkspaceError::Unauthorized(
                    "Only workspace owners can add members".to_string(),
                ));
            }
        }
        let workspace = self.workspace_repo.get(&workspace_id.0).await?;
        if workspace.is_none() {
            return Err(WorkspaceError::WorkspaceNotFound(*workspace_id));
        }
        let account = self.account_repo.get(&account_id.0).await?;
        if account.is_none() {
            return Err(WorkspaceError::AccountNotFound(*account_id));
        }

        info!("Adding member {} to workspace {}", account_id, workspace_id);
        self.workspace_repo
            .add_member(&WorkspaceMemberRecord {
                workspace_id: workspace_id.0,
                account_id: account_id.0,
                role: role.into(),
            })
            .await?;
        Ok(())
    }

    async fn authorize_member(
        &self,
        workspace_id: &WorkspaceId,
        auth: &AccountAuthorisation,
    ) -> Result<(), WorkspaceError> {
        if auth.has_admin() {
            return Ok(());
        }
        match self.member_role(workspace_id, auth).await? {
            Some(_) => Ok(()),
            None => Err(WorkspaceError::Unauthorized(
                "Not a member of this workspace".to_string(),
            )),
        }
    }
}
