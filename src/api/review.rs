use std::sync::Arc;

use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::*;

use crate::api::ApiTags;
use crate::auth::ForgeSecurityScheme;
use crate::model::{
    CancelReviewResponse, CreateReviewRequest, ErrorBody, ErrorsBody, ProspectReview, ReviewId,
    SiteId,
};
use crate::service::auth::{AuthService, AuthServiceError};
use crate::service::prospect::{ProspectReviewError, ProspectReviewService};
use crate::SafeDisplay;

#[derive(ApiResponse)]
pub enum ReviewError {
    /// Invalid request, returning with a list of issues detected in the request
    #[oai(status = 400)]
    BadRequest(Json<ErrorsBody>),
    /// Unauthorized
    #[oai(status = 401)]
    Unauthorized(Json<ErrorBody>),
    /// Forbidden
    #[oai(status = 403)]
    Forbidden(Json<ErrorBody>),
    /// Review not found
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// The request conflicts with the review's current state
    #[oai(status = 409)]
    Conflict(Json<ErrorBody>),
    /// The review link has expired
    #[oai(status = 410)]
    Gone(Json<ErrorBody>),
    /// Internal server error
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

type Result<T> = std::result::Result<T, ReviewError>;

impl From<AuthServiceError> for ReviewError {
    fn from(value: AuthServiceError) -> Self {
        match value {
            AuthServiceError::InvalidToken(_) => ReviewError::Unauthorized(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            AuthServiceError::Internal(_) => ReviewError::InternalError(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
        }
    }
}

impl From<ProspectReviewError> for ReviewError {
    fn from(value: ProspectReviewError) -> Self {
        match value {
            ProspectReviewError::ArgValidation(errors) => {
                ReviewError::BadRequest(Json(ErrorsBody { errors }))
            }
            ProspectReviewError::ReviewNotFound(_)
            | ProspectReviewError::UnknownShareToken
            | ProspectReviewError::SiteNotFound(_) => ReviewError::NotFound(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            ProspectReviewError::ReviewExpired => ReviewError::Gone(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            ProspectReviewError::AlreadyResponded
            | ProspectReviewError::InvalidReviewState(_)
            | ProspectReviewError::InvalidSiteState(_) => ReviewError::Conflict(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            ProspectReviewError::Unauthorized(_) => ReviewError::Forbidden(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            ProspectReviewError::Domain(_)
            | ProspectReviewError::Provider(_)
            | ProspectReviewError::Internal(_)
            | ProspectReviewError::InternalRepoError(_) => {
                ReviewError::InternalError(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
        }
    }
}

pub struct ReviewApi {
    pub auth_service: Arc<dyn AuthService + Send + Sync>,
    pub prospect_service: Arc<dyn ProspectReviewService + Send + Sync>,
}

#[OpenApi(prefix_path = "/v1", tag = ApiTags::Review)]
impl ReviewApi {
    /// Create a prospect review
    ///
    /// Generates a share link and emails the invitation to the prospect. A
    /// `Draft` site moves to `Review`.
    #[oai(
        path = "/sites/:site_id/reviews",
        method = "post",
        operation_id = "create_review"
    )]
    async fn create_review(
        &self,
        site_id: Path<SiteId>,
        request: Json<CreateReviewRequest>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<ProspectReview>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let review = self
            .prospect_service
            .create_review(&site_id.0, &request.0, &auth)
            .await?;
        Ok(Json(review))
    }

    /// Get all reviews of a site
    #[oai(
        path = "/sites/:site_id/reviews",
        method = "get",
        operation_id = "get_reviews"
    )]
    async fn get_reviews(
        &self,
        site_id: Path<SiteId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Vec<ProspectReview>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let reviews = self.prospect_service.list_reviews(&site_id.0, &auth).await?;
        Ok(Json(reviews))
    }

    /// Resend a review invitation
    ///
    /// Resets the review to `Pending` with a fresh deadline and re-sends the
    /// invite email.
    #[oai(
        path = "/reviews/:review_id/resend",
        method = "post",
        operation_id = "resend_review"
    )]
    async fn resend_review(
        &self,
        review_id: Path<ReviewId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<ProspectReview>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let review = self.prospect_service.resend(&review_id.0, &auth).await?;
        Ok(Json(review))
    }

    /// Cancel a review
    ///
    /// Deletes the review; the share link stops working immediately.
    #[oai(
        path = "/reviews/:review_id",
        method = "delete",
        operation_id = "cancel_review"
    )]
    async fn cancel_review(
        &self,
        review_id: Path<ReviewId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<CancelReviewResponse>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        self.prospect_service.cancel(&review_id.0, &auth).await?;
        Ok(Json(CancelReviewResponse {}))
    }
}
