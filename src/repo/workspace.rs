use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Database, Pool};
use uuid::Uuid;

use super::RepoError;
use crate::model::{Workspace, WorkspaceId, WorkspaceRole};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct WorkspaceRecord {
    pub id: Uuid,
    pub name: String,
    pub contact_email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Workspace> for WorkspaceRecord {
    fn from(value: Workspace) -> Self {
        Self {
            id: value.id.0,
            name: value.name,
            contact_email: value.contact_email,
            created_at: value.created_at,
        }
    }
}

impl From<WorkspaceRecord> for Workspace {
    fn from(value: WorkspaceRecord) -> Self {
        Self {
            id: WorkspaceId(value.id),
            name: value.name,
            contact_email: value.contact_email,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct WorkspaceMemberRecord {
    pub workspace_id: Uuid,
    pub account_id: Uuid,
    pub role: i32,
}

impl WorkspaceMemberRecord {
    pub fn role(&self) -> Result<WorkspaceRole, String> {
        WorkspaceRole::try_from(self.role)
    }
}

#[async_trait]
pub trait WorkspaceRepo {
    /// Creates the workspace together with its owner membership.
    async fn create(&self, workspace: &WorkspaceRecord, owner: &Uuid) -> Result<(), RepoError>;
    async fn get(&self, id: &Uuid) -> Result<Option<WorkspaceRecord>, RepoError>;
    async fn get_for_account(&self, account_id: &Uuid) -> Result<Vec<WorkspaceRecord>, RepoError>;
    async fn add_member(&self, member: &WorkspaceMemberRecord) -> Result<(), RepoError>;
    async fn get_member(
        &self,
        workspace_id: &Uuid,
        account_id: &Uuid,
    ) -> Result<Option<WorkspaceMemberRecord>, RepoError>;
}

pub struct DbWorkspaceRepo<DB: Database> {
    db_pool: Arc<Pool<DB>>,
}

impl<DB: Database> DbWorkspaceRepo<DB> {
    pub fn new(db_pool: Arc<Pool<DB>>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WorkspaceRepo for DbWorkspaceRepo<sqlx::Postgres> {
    async fn create(&self, workspace: &WorkspaceRecord, owner: &Uuid) -> Result<(), RepoError> {
        let mut transaction = self.db_pool.begin().await?;

        sqlx::query(
            r#"
              INSERT INTO workspaces
                (id, name, contact_email, created_at)
              VALUES
                ($1, $2, $3, $4)
            "#,
        )
        .bind(workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.contact_email)
        .bind(workspace.created_at)
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            r#"
              INSERT INTO workspace_members
                (workspace_id, account_id, role)
              VALUES
                ($1, $2, $3)
            "#,
        )
        .bind(workspace.id)
        .bind(owner)
        .bind(i32::from(WorkspaceRole::Owner))
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<WorkspaceRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, WorkspaceRecord>("SELECT * FROM workspaces WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_for_account(&self, account_id: &Uuid) -> Result<Vec<WorkspaceRecord>, RepoError> {
        let result = sqlx::query_as::<_, WorkspaceRecord>(
            r#"
              SELECT w.id, w.name, w.contact_email, w.created_at
              FROM workspaces w
              JOIN workspace_members m ON m.workspace_id = w.id
              WHERE m.account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn add_member(&self, member: &WorkspaceMemberRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              INSERT INTO workspace_members
                (workspace_id, account_id, role)
              VALUES
                ($1, $2, $3)
            "#,
        )
        .bind(member.workspace_id)
        .bind(member.account_id)
        .bind(member.role)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get_member(
        &self,
        workspace_id: &Uuid,
        account_id: &Uuid,
    ) -> Result<Option<WorkspaceMemberRecord>, RepoError> {
        let result = sqlx::query_as::<_, WorkspaceMemberRecord>(
            "SELECT * FROM workspace_members WHERE workspace_id = $1 AND account_id = $2",
        )
        .bind(workspace_id)
        .bind(account_id)
        .fetch_optional(self.db_pool.deref())
        .await?;

        Ok(result)
    }
}

#[async_trait]
impl WorkspaceRepo for DbWorkspaceRepo<sqlx::Sqlite> {
    async fn create(&self, workspace: &WorkspaceRecord, owner: &Uuid) -> Result<(), RepoError> {
        let mut transaction = self.db_pool.begin().await?;

        sqlx::query(
            "INSERT INTO workspaces (id, name, contact_email, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(workspace.id)
        .bind(&workspace.name)
        .bind(&workspace.contact_email)
        .bind(workspace.created_at)
        .execute(&mut *transaction)
        .await?;

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, account_id, role) VALUES ($1, $2, $3)",
        )
        .bind(workspace.id)
        .bind(owner)
        .bind(i32::from(WorkspaceRole::Owner))
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<WorkspaceRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, WorkspaceRecord>("SELECT * FROM workspaces WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_for_account(&self, account_id: &Uuid) -> Result<Vec<WorkspaceRecord>, RepoError> {
        let result = sqlx::query_as::<_, WorkspaceRecord>(
            r#"
              SELECT w.id, w.name, w.contact_email, w.created_at
              FROM workspaces w
              JOIN workspace_members m ON m.workspace_id = w.id
              WHERE m.account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_all(self.db_pool.deref())
        .await?;

        Ok(result)
    }

    async fn add_member(&self, member: &WorkspaceMemberRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, account_id, role) VALUES ($1, $2, $3)",
        )
        .bind(member.workspace_id)
        .bind(member.account_id)
        .bind(member.role)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get_member(
        &self,
        workspace_id: &Uuid,
        account_id: &Uuid,
    ) -> Result<Option<WorkspaceMemberRecord>, RepoError> {
        let result = sqlx::query_as::<_, WorkspaceMemberRecord>(
            "SELECT * FROM workspace_members WHERE workspace_id = $1 AND account_id = $2",
        )
        .bind(workspace_id)
        .bind(account_id)
        .fetch_optional(self.db_pool.deref())
        .await?;

        Ok(result)
    }
}
