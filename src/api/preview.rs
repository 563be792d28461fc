use std::str::FromStr;
use std::sync::Arc;

use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::*;

use crate::api::ApiTags;
use crate::model::{
    ErrorBody, ErrorsBody, RespondRequest, ReviewPreview, ShareToken, SubmitDetailsRequest,
};
use crate::service::prospect::{ProspectReviewError, ProspectReviewService};
use crate::SafeDisplay;

#[derive(ApiResponse)]
pub enum PreviewError {
    /// Invalid request, returning with a list of issues detected in the request
    #[oai(status = 400)]
    BadRequest(Json<ErrorsBody>),
    /// Unknown review link
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// The review has already been responded to
    #[oai(status = 409)]
    Conflict(Json<ErrorBody>),
    /// The review link has expired
    #[oai(status = 410)]
    Gone(Json<ErrorBody>),
    /// Internal server error
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

type Result<T> = std::result::Result<T, PreviewError>;

impl From<ProspectReviewError> for PreviewError {
    fn from(value: ProspectReviewError) -> Self {
        match value {
            ProspectReviewError::ArgValidation(errors) => {
                PreviewError::BadRequest(Json(ErrorsBody { errors }))
            }
            ProspectReviewError::ReviewNotFound(_)
            | ProspectReviewError::UnknownShareToken
            | ProspectReviewError::SiteNotFound(_) => PreviewError::NotFound(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            ProspectReviewError::ReviewExpired => PreviewError::Gone(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            ProspectReviewError::AlreadyResponded
            | ProspectReviewError::InvalidReviewState(_)
            | ProspectReviewError::InvalidSiteState(_) => PreviewError::Conflict(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            ProspectReviewError::Unauthorized(_)
            | ProspectReviewError::Domain(_)
            | ProspectReviewError::Provider(_)
            | ProspectReviewError::Internal(_)
            | ProspectReviewError::InternalRepoError(_) => {
                PreviewError::InternalError(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
        }
    }
}

fn parse_token(token: &str) -> Result<ShareToken> {
    ShareToken::from_str(token).map_err(|_| {
        PreviewError::NotFound(Json(ErrorBody {
            error: "Unknown review link".to_string(),
        }))
    })
}

/// Public endpoints behind the share token. No bearer authentication; the
/// unguessable token in the URL is the credential.
pub struct PreviewApi {
    pub prospect_service: Arc<dyn ProspectReviewService + Send + Sync>,
}

#[OpenApi(prefix_path = "/v1/preview", tag = ApiTags::Preview)]
impl PreviewApi {
    /// Get a review preview
    ///
    /// What the prospect sees when opening their review link.
    #[oai(path = "/:token", method = "get", operation_id = "get_preview")]
    async fn get_preview(&self, token: Path<String>) -> Result<Json<ReviewPreview>> {
        let share_token = parse_token(&token.0)?;
        let preview = self.prospect_service.get_preview(&share_token).await?;
        Ok(Json(preview))
    }

    /// Record that the prospect opened the preview
    ///
    /// Moves a `Pending` review to `Viewed`; a no-op on any later status.
    #[oai(path = "/:token/view", method = "post", operation_id = "mark_viewed")]
    async fn mark_viewed(&self, token: Path<String>) -> Result<Json<ReviewPreview>> {
        let share_token = parse_token(&token.0)?;
        let preview = self.prospect_service.mark_viewed(&share_token).await?;
        Ok(Json(preview))
    }

    /// Approve or decline the site
    ///
    /// Exactly one response wins; any further attempt fails.
    #[oai(path = "/:token/respond", method = "post", operation_id = "respond")]
    async fn respond(
        &self,
        token: Path<String>,
        request: Json<RespondRequest>,
    ) -> Result<Json<ReviewPreview>> {
        let share_token = parse_token(&token.0)?;
        let preview = self
            .prospect_service
            .respond(&share_token, &request.0)
            .await?;
        Ok(Json(preview))
    }

    /// Submit company details after approval
    ///
    /// Either requests a custom domain or gets a managed subdomain deployed
    /// right away.
    #[oai(
        path = "/:token/details",
        method = "post",
        operation_id = "submit_details"
    )]
    async fn submit_details(
        &self,
        token: Path<String>,
        request: Json<SubmitDetailsRequest>,
    ) -> Result<Json<ReviewPreview>> {
        let share_token = parse_token(&token.0)?;
        let preview = self
            .prospect_service
            .submit_details(&share_token, &request.0)
            .await?;
        Ok(Json(preview))
    }
}
