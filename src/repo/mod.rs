use sqlx::error::ErrorKind;

use crate::SafeDisplay;

pub mod account;
pub mod domain;
pub mod prospect;
pub mod site;
pub mod token;
pub mod workspace;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Unique violation repository error: {0}")]
    UniqueViolation(String),
    #[error(transparent)]
    InternalError(#[from] anyhow::Error),
}

impl RepoError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, RepoError::UniqueViolation(_))
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(error: sqlx::Error) -> Self {
        let unique_violation = error
            .as_database_error()
            .map(|db_error| db_error.kind() == ErrorKind::UniqueViolation)
            .unwrap_or(false);
        if unique_violation {
            RepoError::UniqueViolation(error.to_string())
        } else {
            RepoError::InternalError(error.into())
        }
    }
}

impl SafeDisplay for RepoError {
    fn to_safe_string(&self) -> String {
        match self {
            RepoError::InternalError(_) => "Internal repository error".to_string(),
            RepoError::UniqueViolation(_) => {
                "Internal repository error (unique key violation)".to_string()
            }
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

pub trait ResultExt<T> {
    fn false_on_unique_violation(self) -> RepoResult<bool>;

    fn to_error_on_unique_violation<E: From<RepoError>>(self, business_error: E) -> Result<T, E>;
}

impl<T> ResultExt<T> for RepoResult<T> {
    fn false_on_unique_violation(self) -> RepoResult<bool> {
        match self {
            Ok(_) => Ok(true),
            Err(err) if err.is_unique_violation() => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn to_error_on_unique_violation<E: From<RepoError>>(self, business_error: E) -> Result<T, E> {
        match self {
            Ok(value) => Ok(value),
            Err(err) if err.is_unique_violation() => Err(business_error),
            Err(err) => Err(err.into()),
        }
    }
}
