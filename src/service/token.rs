use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::model::{AccountId, CreateTokenRequest, Token, TokenId, TokenSecret, UnsafeToken};
use crate::repo::account::AccountRepo;
use crate::repo::token::{TokenRecord, TokenRepo};
use crate::repo::RepoError;
use crate::SafeDisplay;

#[derive(Debug, thiserror::Error)]
pub enum TokenServiceError {
    #[error("Unknown token: {0}")]
    UnknownToken(TokenId),
    #[error("Account Not Found: {0}")]
    AccountNotFound(AccountId),
    #[error("Arg Validation error: {}", .0.join(", "))]
    ArgValidation(Vec<String>),
    #[error("Internal error: {0}")]
    InternalRepoError(#[from] RepoError),
}

impl SafeDisplay for TokenServiceError {
    fn to_safe_string(&self) -> String {
        match self {
            TokenServiceError::UnknownToken(_) => self.to_string(),
            TokenServiceError::AccountNotFound(_) => self.to_string(),
            TokenServiceError::ArgValidation(_) => self.to_string(),
            TokenServiceError::InternalRepoError(inner) => inner.to_safe_string(),
        }
    }
}

#[async_trait]
pub trait TokenService: Send + Sync {
    /// The only call that ever returns the token secret.
    async fn create(
        &self,
        account_id: &AccountId,
        request: &CreateTokenRequest,
    ) -> Result<UnsafeToken, TokenServiceError>;

    async fn get(&self, id: &TokenId) -> Result<Token, TokenServiceError>;

    async fn get_by_account(&self, account_id: &AccountId)
        -> Result<Vec<Token>, TokenServiceError>;

    async fn delete(&self, id: &TokenId) -> Result<(), TokenServiceError>;
}

pub struct TokenServiceDefault {
    token_repo: Arc<dyn TokenRepo + Send + Sync>,
    account_repo: Arc<dyn AccountRepo + Send + Sync>,
}

impl TokenServiceDefault {
    pub fn new(
        token_repo: Arc<dyn TokenRepo + Send + Sync>,
        account_repo: Arc<dyn AccountRepo + Send + Sync>,
    ) -> Self {
        Self {
            token_repo,
            account_repo,
        }
    }
}

#[async_trait]
impl TokenService for TokenServiceDefault {
    async fn create(
        &self,
        account_id: &AccountId,
        request: &CreateTokenRequest,
    ) -> Result<UnsafeToken, TokenServiceError> {
        let now = Utc::now();
        if request.expires_at <= now {
            return Err(TokenServiceError::ArgValidation(vec![
                "expiresAt must be in the future".to_string(),
            ]));
        }
        let account = self.account_repo.get(&account_id.0).await?;
        if account.is_none() {
            return Err(TokenServiceError::AccountNotFound(*account_id));
        }

        info!("Creating token for account: {}", account_id);
        let secret = TokenSecret::new_v4();
        let record = TokenRecord {
            id: TokenId::new_v4().0,
            account_id: account_id.0,
            secret: secret.value,
            created_at: now,
            expires_at: request.expires_at,
        };
        self.token_repo.create(&record).await?;

        Ok(UnsafeToken {
            data: record.into(),
            secret,
        })
    }

    async fn get(&self, id: &TokenId) -> Result<Token, TokenServiceError> {
        let result = self.token_repo.get(&id.0).await?;
        result
            .map(|record| record.into())
            .ok_or(TokenServiceError::UnknownToken(*id))
    }

    async fn get_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<Token>, TokenServiceError> {
        let records = self.token_repo.get_by_account(&account_id.0).await?;
        Ok(records.into_iter().map(|record| record.into()).collect())
    }

    async fn delete(&self, id: &TokenId) -> Result<(), TokenServiceError> {
        let deleted = self.token_repo.delete(&id.0).await?;
        if deleted {
            Ok(())
        } else {
            Err(TokenServiceError::UnknownToken(*id))
        }
    }
}
