use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Database, Pool};
use uuid::Uuid;

use super::RepoError;
use crate::model::{Account, AccountId};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AccountRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountRecord {
    fn from(value: Account) -> Self {
        Self {
            id: value.id.0,
            name: value.name,
            email: value.email,
            created_at: value.created_at,
        }
    }
}

impl From<AccountRecord> for Account {
    fn from(value: AccountRecord) -> Self {
        Self {
            id: AccountId(value.id),
            name: value.name,
            email: value.email,
            created_at: value.created_at,
        }
    }
}

#[async_trait]
pub trait AccountRepo {
    async fn create(&self, account: &AccountRecord) -> Result<(), RepoError>;
    async fn get(&self, id: &Uuid) -> Result<Option<AccountRecord>, RepoError>;
    async fn get_roles(&self, id: &Uuid) -> Result<Vec<i32>, RepoError>;
    async fn add_role(&self, id: &Uuid, role: i32) -> Result<(), RepoError>;
}

pub struct DbAccountRepo<DB: Database> {
    db_pool: Arc<Pool<DB>>,
}

impl<DB: Database> DbAccountRepo<DB> {
    pub fn new(db_pool: Arc<Pool<DB>>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AccountRepo for DbAccountRepo<sqlx::Postgres> {
    async fn create(&self, account: &AccountRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              INSERT INTO accounts
                (id, name, email, created_at)
              VALUES
                ($1, $2, $3, $4)
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(account.created_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<AccountRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, AccountRecord>("SELECT * FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_roles(&self, id: &Uuid) -> Result<Vec<i32>, RepoError> {
        let result: Vec<(i32,)> =
            sqlx::query_as("SELECT role_id FROM account_grants WHERE account_id = $1")
                .bind(id)
                .fetch_all(self.db_pool.deref())
                .await?;

        Ok(result.into_iter().map(|(role,)| role).collect())
    }

    async fn add_role(&self, id: &Uuid, role: i32) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              INSERT INTO account_grants
                (account_id, role_id)
              VALUES
                ($1, $2)
              ON CONFLICT (account_id, role_id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(role)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AccountRepo for DbAccountRepo<sqlx::Sqlite> {
    async fn create(&self, account: &AccountRecord) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO accounts (id, name, email, created_at) VALUES ($1, $2, $3, $4)")
            .bind(account.id)
            .bind(&account.name)
            .bind(&account.email)
            .bind(account.created_at)
            .execute(self.db_pool.deref())
            .await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<AccountRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, AccountRecord>("SELECT * FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn get_roles(&self, id: &Uuid) -> Result<Vec<i32>, RepoError> {
        let result: Vec<(i32,)> =
            sqlx::query_as("SELECT role_id FROM account_grants WHERE account_id = $1")
                .bind(id)
                .fetch_all(self.db_pool.deref())
                .await?;

        Ok(result.into_iter().map(|(role,)| role).collect())
    }

    async fn add_role(&self, id: &Uuid, role: i32) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT OR IGNORE INTO account_grants (account_id, role_id) VALUES ($1, $2)",
        )
        .bind(id)
        .bind(role)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }
}
