use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::AccountConfig;
use crate::model::{Account, AccountData, AccountId, TokenId};
use crate::repo::account::{AccountRecord, AccountRepo};
use crate::repo::token::{TokenRecord, TokenRepo};
use crate::repo::{RepoError, ResultExt};
use crate::SafeDisplay;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Account Not Found: {0}")]
    AccountNotFound(AccountId),
    #[error("Account already exists for email: {0}")]
    EmailAlreadyExists(String),
    #[error("Internal error: {0}")]
    InternalRepoError(#[from] RepoError),
}

impl SafeDisplay for AccountError {
    fn to_safe_string(&self) -> String {
        match self {
            AccountError::AccountNotFound(_) => self.to_string(),
            AccountError::EmailAlreadyExists(_) => self.to_string(),
            AccountError::InternalRepoError(inner) => inner.to_safe_string(),
        }
    }
}

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn create(&self, id: &AccountId, account: &AccountData)
        -> Result<Account, AccountError>;

    async fn get(&self, account_id: &AccountId) -> Result<Account, AccountError>;

    /// Makes sure a configured account and its well-known token exist.
    /// Already existing rows are left untouched.
    async fn create_initial_account(&self, account: &AccountConfig) -> Result<(), AccountError>;
}

pub struct AccountServiceDefault {
    account_repo: Arc<dyn AccountRepo + Send + Sync>,
    token_repo: Arc<dyn TokenRepo + Send + Sync>,
}

impl AccountServiceDefault {
    pub fn new(
        account_repo: Arc<dyn AccountRepo + Send + Sync>,
        token_repo: Arc<dyn TokenRepo + Send + Sync>,
    ) -> Self {
        Self {
            account_repo,
            token_repo,
        }
    }
}

#[async_trait]
impl AccountService for AccountServiceDefault {
    async fn create(
        &self,
        id: &AccountId,
        account: &AccountData,
    ) -> Result<Account, AccountError> {
        info!("Creating account: {}", id);
        let record = AccountRecord {
            id: id.0,
            name: account.name.clone(),
            email: account.email.clone(),
            created_at: Utc::now(),
        };
        self.account_repo
            .create(&record)
            .await
            .to_error_on_unique_violation(AccountError::EmailAlreadyExists(account.email.clone()))?;

        Ok(record.into())
    }

    async fn get(&self, account_id: &AccountId) -> Result<Account, AccountError> {
        let result = self.account_repo.get(&account_id.0).await;
        match result {
            Ok(Some(record)) => Ok(record.into()),
            Ok(None) => Err(AccountError::AccountNotFound(*account_id)),
            Err(err) => {
                error!("DB call failed. {}", err);
                Err(err.into())
            }
        }
    }

    async fn create_initial_account(&self, account: &AccountConfig) -> Result<(), AccountError> {
        let existing = self.account_repo.get(&account.id).await?;
        if existing.is_none() {
            info!("Creating initial account: {} ({})", account.name, account.id);
            let now = Utc::now();
            self.account_repo
                .create(&AccountRecord {
                    id: account.id,
                    name: account.name.clone(),
                    email: account.email.clone(),
                    created_at: now,
                })
                .await?;
        }
        self.account_repo
            .add_role(&account.id, account.role.clone().into())
            .await?;

        let token = self.token_repo.get_by_secret(&account.token).await?;
        if token.is_none() {
            info!("Creating initial token for account: {}", account.id);
            self.token_repo
                .create(&TokenRecord {
                    id: TokenId::new_v4().0,
                    account_id: account.id,
                    secret: account.token,
                    created_at: Utc::now(),
                    expires_at: DateTime::<Utc>::MAX_UTC,
                })
                .await?;
        }
        Ok(())
    }
}
