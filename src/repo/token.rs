use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Database, Pool};
use uuid::Uuid;

use super::RepoError;
use crate::model::{AccountId, Token, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TokenRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub secret: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<TokenRecord> for Token {
    fn from(value: TokenRecord) -> Self {
        Self {
            id: TokenId(value.id),
            account_id: AccountId(value.account_id),
            created_at: value.created_at,
            expires_at: value.expires_at,
        }
    }
}

#[async_trait]
pub trait TokenRepo {
    async fn create(&self, token: &TokenRecord) -> Result<(), RepoError>;
    async fn get(&self, id: &Uuid) -> Result<Option<TokenRecord>, RepoError>;
    async fn get_by_secret(&self, secret: &Uuid) -> Result<Option<TokenRecord>, RepoError>;
    async fn get_by_account(&self, account_id: &Uuid) -> Result<Vec<TokenRecord>, RepoError>;
    async fn delete(&self, id: &Uuid) -> Result<bool, RepoError>;
}

pub struct DbTokenRepo<DB: Database> {
    db_pool: Arc<Pool<DB>>,
}

impl<DB: Database> DbTokenRepo<DB> {
    pub fn new(db_pool: Arc<Pool<DB>>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TokenRepo for DbTokenRepo<sqlx::Postgres> {
    async fn create(&self, token: &TokenRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
              INSERT INTO tokens
                (id, account_id, secret, created_at, expires_at)
              VALUES
                ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id)
        .bind(token.account_id)
        .bind(token.secret)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<TokenRecord>, RepoError> {
        let result = sqlx::query_as::<_, TokenRecord>("SELECT * FROM tokens WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db_pool.deref())
            .await?;

        Ok(result)
    }

    async fn get_by_secret(&self, secret: &Uuid) -> Result<Option<TokenRecord>, RepoError> {
        let result = sqlx::query_as::<_, TokenRecord>("SELECT * FROM tokens WHERE secret = $1")
            .bind(secret)
            .fetch_optional(self.db_pool.deref())
            .await?;

        Ok(result)
    }

    async fn get_by_account(&self, account_id: &Uuid) -> Result<Vec<TokenRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, TokenRecord>("SELECT * FROM tokens WHERE account_id = $1")
                .bind(account_id)
                .fetch_all(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id)
            .execute(self.db_pool.deref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TokenRepo for DbTokenRepo<sqlx::Sqlite> {
    async fn create(&self, token: &TokenRecord) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO tokens (id, account_id, secret, created_at, expires_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(token.id)
        .bind(token.account_id)
        .bind(token.secret)
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(self.db_pool.deref())
        .await?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<TokenRecord>, RepoError> {
        let result = sqlx::query_as::<_, TokenRecord>("SELECT * FROM tokens WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db_pool.deref())
            .await?;

        Ok(result)
    }

    async fn get_by_secret(&self, secret: &Uuid) -> Result<Option<TokenRecord>, RepoError> {
        let result = sqlx::query_as::<_, TokenRecord>("SELECT * FROM tokens WHERE secret = $1")
            .bind(secret)
            .fetch_optional(self.db_pool.deref())
            .await?;

        Ok(result)
    }

    async fn get_by_account(&self, account_id: &Uuid) -> Result<Vec<TokenRecord>, RepoError> {
        let result =
            sqlx::query_as::<_, TokenRecord>("SELECT * FROM tokens WHERE account_id = $1")
                .bind(account_id)
                .fetch_all(self.db_pool.deref())
                .await?;

        Ok(result)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id)
            .execute(self.db_pool.deref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
