use std::sync::Arc;

use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::*;

use crate::api::ApiTags;
use crate::auth::ForgeSecurityScheme;
use crate::model::{
    CreateTokenRequest, DeleteTokenResponse, ErrorBody, ErrorsBody, Token, TokenId, UnsafeToken,
};
use crate::service::auth::{AuthService, AuthServiceError};
use crate::service::token::{TokenService, TokenServiceError};
use crate::SafeDisplay;

#[derive(ApiResponse)]
pub enum TokenError {
    /// Invalid request, returning with a list of issues detected in the request
    #[oai(status = 400)]
    BadRequest(Json<ErrorsBody>),
    /// Unauthorized
    #[oai(status = 401)]
    Unauthorized(Json<ErrorBody>),
    /// Forbidden
    #[oai(status = 403)]
    Forbidden(Json<ErrorBody>),
    /// Token not found
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// Internal server error
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

type Result<T> = std::result::Result<T, TokenError>;

impl From<AuthServiceError> for TokenError {
    fn from(value: AuthServiceError) -> Self {
        match value {
            AuthServiceError::InvalidToken(_) => TokenError::Unauthorized(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            AuthServiceError::Internal(_) => TokenError::InternalError(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
        }
    }
}

impl From<TokenServiceError> for TokenError {
    fn from(value: TokenServiceError) -> Self {
        match value {
            TokenServiceError::ArgValidation(errors) => {
                TokenError::BadRequest(Json(ErrorsBody { errors }))
            }
            TokenServiceError::UnknownToken(_) | TokenServiceError::AccountNotFound(_) => {
                TokenError::NotFound(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
            TokenServiceError::InternalRepoError(_) => TokenError::InternalError(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
        }
    }
}

pub struct TokenApi {
    pub auth_service: Arc<dyn AuthService + Send + Sync>,
    pub token_service: Arc<dyn TokenService + Send + Sync>,
}

#[OpenApi(prefix_path = "/v1", tag = ApiTags::Token)]
impl TokenApi {
    /// Get all tokens
    ///
    /// Lists the calling account's API tokens. Secrets are never included.
    #[oai(path = "/tokens", method = "get", operation_id = "get_tokens")]
    async fn get_tokens(&self, token: ForgeSecurityScheme) -> Result<Json<Vec<Token>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let result = self.token_service.get_by_account(&auth.account_id()).await?;
        Ok(Json(result))
    }

    /// Create new token
    ///
    /// Creates a token with the given expiration date. The response is the
    /// only place the token secret ever appears.
    #[oai(path = "/tokens", method = "post", operation_id = "create_token")]
    async fn create_token(
        &self,
        request: Json<CreateTokenRequest>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<UnsafeToken>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let result = self
            .token_service
            .create(&auth.account_id(), &request.0)
            .await?;
        Ok(Json(result))
    }

    /// Delete a token
    #[oai(
        path = "/tokens/:token_id",
        method = "delete",
        operation_id = "delete_token"
    )]
    async fn delete_token(
        &self,
        token_id: Path<TokenId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<DeleteTokenResponse>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let existing = self.token_service.get(&token_id.0).await?;
        if !auth.has_account_or_admin(&existing.account_id) {
            return Err(TokenError::Forbidden(Json(ErrorBody {
                error: "Cannot delete another account's token".to_string(),
            })));
        }
        self.token_service.delete(&token_id.0).await?;
        Ok(Json(DeleteTokenResponse {}))
    }
}
