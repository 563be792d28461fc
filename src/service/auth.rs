use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::AccountAuthorisation;
use crate::model::{Role, TokenSecret};
use crate::repo::account::AccountRepo;
use crate::repo::token::TokenRepo;
use crate::repo::RepoError;
use crate::SafeDisplay;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Invalid Token: {0}")]
    InvalidToken(String),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthServiceError {
    pub fn internal<M>(error: M) -> Self
    where
        M: Display,
    {
        Self::Internal(anyhow::Error::msg(error.to_string()))
    }

    pub fn invalid_token<M>(error: M) -> Self
    where
        M: Display,
    {
        AuthServiceError::InvalidToken(error.to_string())
    }
}

impl From<RepoError> for AuthServiceError {
    fn from(error: RepoError) -> Self {
        AuthServiceError::internal(error.to_safe_string())
    }
}

impl SafeDisplay for AuthServiceError {
    fn to_safe_string(&self) -> String {
        match self {
            AuthServiceError::InvalidToken(_) => self.to_string(),
            AuthServiceError::Internal(_) => "Internal error".to_string(),
        }
    }
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn authorization(
        &self,
        secret: &TokenSecret,
    ) -> Result<AccountAuthorisation, AuthServiceError>;
}

pub struct AuthServiceDefault {
    token_repo: Arc<dyn TokenRepo + Send + Sync>,
    account_repo: Arc<dyn AccountRepo + Send + Sync>,
}

impl AuthServiceDefault {
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
impl AuthService for AuthServiceDefault {
    async fn authorization(
        &self,
        secret: &TokenSecret,
    ) -> Result<AccountAuthorisation, AuthServiceError> {
        let token = self
            .token_repo
            .get_by_secret(&secret.value)
            .await?
            .ok_or(AuthServiceError::invalid_token("Unknown token secret."))?;

        let now = chrono::Utc::now();
        if token.expires_at <= now {
            return Err(AuthServiceError::invalid_token("Expired auth token."));
        }

        let mut roles = vec![Role::Member];
        for role in self.account_repo.get_roles(&token.account_id).await? {
            match Role::try_from(role) {
                Ok(role) => {
                    if !roles.contains(&role) {
                        roles.push(role);
                    }
                }
                Err(err) => return Err(AuthServiceError::internal(err)),
            }
        }

        Ok(AccountAuthorisation::new(token.into(), roles))
    }
}
