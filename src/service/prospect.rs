use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use crate::auth::AccountAuthorisation;
use crate::config::{HostingConfig, ReviewConfig};
use crate::metrics;
use crate::model::{
    CreateReviewRequest, DeploymentId, DeploymentStatus, EnvironmentId, EnvironmentType,
    ProspectReview, RespondRequest, ReviewId, ReviewPreview, ReviewStatus, ShareToken, SiteId,
    SiteStatus, SubmitDetailsRequest,
};
use crate::repo::prospect::{ProspectReviewRepo, ReviewRecord};
use crate::repo::site::{DeploymentRecord, SiteRecord, SiteRepo};
use crate::repo::workspace::WorkspaceRepo;
use crate::repo::{RepoError, ResultExt};
use crate::service::domain::{is_valid_domain_name, DomainError, DomainService};
use crate::service::email::{send_in_background, EmailClient, EmailMessage};
use crate::service::hosting::{self, HostingProvider};
use crate::SafeDisplay;

/// Share token collisions are practically impossible; attempts are bounded
/// anyway so a broken random source cannot loop forever.
const TOKEN_ALLOCATION_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ProspectReviewError {
    #[error("Review Not Found: {0}")]
    ReviewNotFound(ReviewId),
    #[error("Unknown review link")]
    UnknownShareToken,
    #[error("This review link has expired")]
    ReviewExpired,
    #[error("This review has already been responded to")]
    AlreadyResponded,
    #[error("Review is not in the right state for this action: {0}")]
    InvalidReviewState(ReviewStatus),
    #[error("Site Not Found: {0}")]
    SiteNotFound(SiteId),
    #[error("Invalid site state: {0}")]
    InvalidSiteState(String),
    #[error("Arg Validation error: {}", .0.join(", "))]
    ArgValidation(Vec<String>),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Provider(#[from] crate::service::hosting::ProviderError),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Internal error: {0}")]
    InternalRepoError(#[from] RepoError),
}

impl SafeDisplay for ProspectReviewError {
    fn to_safe_string(&self) -> String {
        match self {
            ProspectReviewError::ReviewNotFound(_) => self.to_string(),
            ProspectReviewError::UnknownShareToken => self.to_string(),
            ProspectReviewError::ReviewExpired => self.to_string(),
            ProspectReviewError::AlreadyResponded => self.to_string(),
            ProspectReviewError::InvalidReviewState(_) => self.to_string(),
            ProspectReviewError::SiteNotFound(_) => self.to_string(),
            ProspectReviewError::InvalidSiteState(_) => self.to_string(),
            ProspectReviewError::ArgValidation(_) => self.to_string(),
            ProspectReviewError::Unauthorized(_) => self.to_string(),
            ProspectReviewError::Domain(inner) => inner.to_safe_string(),
            ProspectReviewError::Provider(inner) => inner.to_safe_string(),
            ProspectReviewError::Internal(_) => self.to_string(),
            ProspectReviewError::InternalRepoError(inner) => inner.to_safe_string(),
        }
    }
}

#[async_trait]
pub trait ProspectReviewService: Send + Sync {
    async fn create_review(
        &self,
        site_id: &SiteId,
        request: &CreateReviewRequest,
        auth: &AccountAuthorisation,
    ) -> Result<ProspectReview, ProspectReviewError>;

    async fn list_reviews(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<ProspectReview>, ProspectReviewError>;

    /// Public, pure read. Never writes; an effectively expired review is
    /// reported as an error without touching the row.
    async fn get_preview(&self, token: &ShareToken) -> Result<ReviewPreview, ProspectReviewError>;

    /// Public. Records the first view (`Pending` to `Viewed`); a no-op on any
    /// later status.
    async fn mark_viewed(&self, token: &ShareToken) -> Result<ReviewPreview, ProspectReviewError>;

    /// Public. Approve or decline; exactly one response wins.
    async fn respond(
        &self,
        token: &ShareToken,
        request: &RespondRequest,
    ) -> Result<ReviewPreview, ProspectReviewError>;

    /// Public. Post-approval company details; either attaches the requested
    /// custom domain or assigns a managed subdomain, never both.
    async fn submit_details(
        &self,
        token: &ShareToken,
        request: &SubmitDetailsRequest,
    ) -> Result<ReviewPreview, ProspectReviewError>;

    /// Resets the review to `Pending` with a fresh deadline and re-sends the
    /// invite.
    async fn resend(
        &self,
        review_id: &ReviewId,
        auth: &AccountAuthorisation,
    ) -> Result<ProspectReview, ProspectReviewError>;

    async fn cancel(
        &self,
        review_id: &ReviewId,
        auth: &AccountAuthorisation,
    ) -> Result<(), ProspectReviewError>;
}

pub struct ProspectReviewServiceDefault {
    prospect_repo: Arc<dyn ProspectReviewRepo + Send + Sync>,
    site_repo: Arc<dyn SiteRepo + Send + Sync>,
    workspace_repo: Arc<dyn WorkspaceRepo + Send + Sync>,
    domain_service: Arc<dyn DomainService + Send + Sync>,
    hosting_provider: Arc<dyn HostingProvider + Send + Sync>,
    hosting_config: HostingConfig,
    email_client: Arc<dyn EmailClient + Send + Sync>,
    review_config: ReviewConfig,
    public_base_url: Url,
}

impl ProspectReviewServiceDefault {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prospect_repo: Arc<dyn ProspectReviewRepo + Send + Sync>,
        site_repo: Arc<dyn SiteRepo + Send + Sync>,
        workspace_repo: Arc<dyn WorkspaceRepo + Send + Sync>,
        domain_service: Arc<dyn DomainService + Send + Sync>,
        hosting_provider: Arc<dyn HostingProvider + Send + Sync>,
        hosting_config: HostingConfig,
        email_client: Arc<dyn EmailClient + Send + Sync>,
        review_config: ReviewConfig,
        public_base_url: Url,
    ) -> Self {
        Self {
            prospect_repo,
            site_repo,
            workspace_repo,
            domain_service,
            hosting_provider,
            hosting_config,
            email_client,
            review_config,
            public_base_url,
        }
    }

    fn preview_link(&self, token: &str) -> String {
        format!(
            "{}/v1/preview/{}",
            self.public_base_url.as_str().trim_end_matches('/'),
            token
        )
    }

    fn to_review(record: ReviewRecord) -> Result<ProspectReview, ProspectReviewError> {
        record.try_into().map_err(ProspectReviewError::Internal)
    }

    fn to_preview(review: &ProspectReview, site: &SiteRecord) -> ReviewPreview {
        ReviewPreview {
            site_name: site.name.clone(),
            status: review.effective_status(Utc::now()),
            prospect_name: review.prospect_name.clone(),
            expires_at: review.expires_at,
        }
    }

    async fn authorized_site(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<SiteRecord, ProspectReviewError> {
        let site = self
            .site_repo
            .get(&site_id.0)
            .await?
            .ok_or(ProspectReviewError::SiteNotFound(*site_id))?;
        if !auth.has_admin() {
            let member = self
                .workspace_repo
                .get_member(&site.workspace_id, &auth.account_id().0)
                .await?;
            if member.is_none() {
                return Err(ProspectReviewError::Unauthorized(
                    "Not a member of this workspace".to_string(),
                ));
            }
        }
        Ok(site)
    }

    async fn load_by_token(
        &self,
        token: &ShareToken,
    ) -> Result<(ProspectReview, SiteRecord), ProspectReviewError> {
        let record = self
            .prospect_repo
            .get_by_token(&token.0)
            .await?
            .ok_or(ProspectReviewError::UnknownShareToken)?;
        let review = Self::to_review(record)?;
        let site = self
            .site_repo
            .get(&review.site_id.0)
            .await?
            .ok_or(ProspectReviewError::SiteNotFound(review.site_id))?;
        Ok((review, site))
    }

    async fn workspace_contact(
        &self,
        site: &SiteRecord,
    ) -> Result<Option<String>, ProspectReviewError> {
        let workspace = self.workspace_repo.get(&site.workspace_id).await?;
        Ok(workspace.map(|workspace| workspace.contact_email))
    }

    async fn production_environment(
        &self,
        site: &SiteRecord,
    ) -> Result<crate::repo::site::EnvironmentRecord, ProspectReviewError> {
        self.site_repo
            .get_environment_by_type(&site.id, EnvironmentType::Production.into())
            .await?
            .ok_or_else(|| {
                ProspectReviewError::Internal("Site has no production environment".to_string())
            })
    }
}

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex");
}

fn validate_email(email: &str) -> Result<(), ProspectReviewError> {
    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ProspectReviewError::ArgValidation(vec![format!(
            "Invalid prospect email: {email}"
        )]))
    }
}

#[async_trait]
impl ProspectReviewService for ProspectReviewServiceDefault {
    async fn create_review(
        &self,
        site_id: &SiteId,
        request: &CreateReviewRequest,
        auth: &AccountAuthorisation,
    ) -> Result<ProspectReview, ProspectReviewError> {
        let site = self.authorized_site(site_id, auth).await?;
        if site.status == i32::from(SiteStatus::Archived) {
            return Err(ProspectReviewError::InvalidSiteState(
                "Cannot create reviews for an archived site".to_string(),
            ));
        }
        validate_email(&request.prospect_email)?;
        let expiry_days = request
            .expires_in_days
            .unwrap_or(self.review_config.expiry_days);
        if expiry_days <= 0 {
            return Err(ProspectReviewError::ArgValidation(vec![
                "expiresInDays must be positive".to_string(),
            ]));
        }

        let now = Utc::now();
        let mut created: Option<ReviewRecord> = None;
        for _ in 0..TOKEN_ALLOCATION_ATTEMPTS {
            let record = ReviewRecord {
                id: ReviewId::new_v4().0,
                site_id: site_id.0,
                share_token: ShareToken::generate().0,
                prospect_email: request.prospect_email.clone(),
                prospect_name: request.prospect_name.clone(),
                prospect_phone: request.prospect_phone.clone(),
                status: ReviewStatus::Pending.into(),
                expires_at: now + Duration::days(expiry_days),
                viewed_at: None,
                responded_at: None,
                feedback: None,
                company_name: None,
                requested_domain: None,
                deploy_started_at: None,
                created_by: auth.account_id().0,
                created_at: now,
                updated_at: now,
            };
            if self
                .prospect_repo
                .create(&record)
                .await
                .false_on_unique_violation()?
            {
                created = Some(record);
                break;
            }
            warn!("Share token collision on review creation, regenerating");
        }
        let record = created.ok_or_else(|| {
            ProspectReviewError::Internal("Could not allocate a share token".to_string())
        })?;

        // Sending a site out for review promotes it from Draft, once the
        // review row is in place.
        self.site_repo
            .update_status_if(
                &site.id,
                &[SiteStatus::Draft.into()],
                SiteStatus::Review.into(),
            )
            .await?;

        info!(
            "Created review {} for site {} (prospect {})",
            record.id, site.slug, record.prospect_email
        );
        metrics::record_review_transition("Pending");

        let link = self.preview_link(&record.share_token);
        send_in_background(
            self.email_client.clone(),
            EmailMessage::review_invitation(&record.prospect_email, &site.name, &link),
        );

        Self::to_review(record)
    }

    async fn list_reviews(
        &self,
        site_id: &SiteId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<ProspectReview>, ProspectReviewError> {
        self.authorized_site(site_id, auth).await?;
        let records = self.prospect_repo.get_by_site(&site_id.0).await?;
        records.into_iter().map(Self::to_review).collect()
    }

    async fn get_preview(&self, token: &ShareToken) -> Result<ReviewPreview, ProspectReviewError> {
        let (review, site) = self.load_by_token(token).await?;
        if review.effective_status(Utc::now()) == ReviewStatus::Expired {
            return Err(ProspectReviewError::ReviewExpired);
        }
        Ok(Self::to_preview(&review, &site))
    }

    async fn mark_viewed(&self, token: &ShareToken) -> Result<ReviewPreview, ProspectReviewError> {
        let (review, _) = self.load_by_token(token).await?;
        if review.effective_status(Utc::now()) == ReviewStatus::Expired {
            return Err(ProspectReviewError::ReviewExpired);
        }
        if review.status == ReviewStatus::Pending {
            let updated = self
                .prospect_repo
                .mark_viewed(&review.id.0, Utc::now())
                .await?;
            if updated {
                metrics::record_review_transition("Viewed");
            }
        }
        let (review, site) = self.load_by_token(token).await?;
        Ok(Self::to_preview(&review, &site))
    }

    async fn respond(
        &self,
        token: &ShareToken,
        request: &RespondRequest,
    ) -> Result<ReviewPreview, ProspectReviewError> {
        let (review, site) = self.load_by_token(token).await?;
        let effective = review.effective_status(Utc::now());
        if effective == ReviewStatus::Expired {
            return Err(ProspectReviewError::ReviewExpired);
        }
        if !effective.can_respond() {
            return Err(ProspectReviewError::AlreadyResponded);
        }

        let new_status = if request.approved {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Declined
        };
        let updated = self
            .prospect_repo
            .respond(
                &review.id.0,
                new_status.clone().into(),
                request.feedback.as_deref(),
                Utc::now(),
            )
            .await?;
        if !updated {
            // Lost the race: either a concurrent response or the deadline.
            let (review, _) = self.load_by_token(token).await?;
            if review.effective_status(Utc::now()) == ReviewStatus::Expired {
                return Err(ProspectReviewError::ReviewExpired);
            }
            return Err(ProspectReviewError::AlreadyResponded);
        }

        info!(
            "Review {} {} by prospect",
            review.id,
            if request.approved { "approved" } else { "declined" }
        );
        metrics::record_review_transition(&new_status.to_string());

        if let Some(contact) = self.workspace_contact(&site).await? {
            send_in_background(
                self.email_client.clone(),
                EmailMessage::review_responded(&contact, &site.name, request.approved),
            );
        }

        let (review, site) = self.load_by_token(token).await?;
        Ok(Self::to_preview(&review, &site))
    }

    async fn submit_details(
        &self,
        token: &ShareToken,
        request: &SubmitDetailsRequest,
    ) -> Result<ReviewPreview, ProspectReviewError> {
        let (review, site) = self.load_by_token(token).await?;
        match review.effective_status(Utc::now()) {
            ReviewStatus::Approved => {}
            ReviewStatus::Expired => return Err(ProspectReviewError::ReviewExpired),
            other => return Err(ProspectReviewError::InvalidReviewState(other)),
        }
        if request.company_name.trim().is_empty() {
            return Err(ProspectReviewError::ArgValidation(vec![
                "companyName must not be empty".to_string(),
            ]));
        }
        if let Some(domain) = &request.requested_domain {
            if !is_valid_domain_name(domain) {
                return Err(ProspectReviewError::ArgValidation(vec![format!(
                    "Invalid requested domain: {domain}"
                )]));
            }
        }

        let production = self.production_environment(&site).await?;
        let now = Utc::now();

        match &request.requested_domain {
            Some(domain) => {
                let updated = self
                    .prospect_repo
                    .submit_details(
                        &review.id.0,
                        ReviewStatus::DetailsSubmitted.into(),
                        &request.company_name,
                        Some(domain),
                        request.prospect_phone.as_deref(),
                        None,
                        now,
                    )
                    .await?;
                if !updated {
                    return Err(ProspectReviewError::InvalidReviewState(review.status));
                }
                metrics::record_review_transition("DetailsSubmitted");

                self.domain_service
                    .add_domain(
                        &EnvironmentId(production.id),
                        domain,
                        true,
                        &AccountAuthorisation::admin(),
                    )
                    .await?;
                self.site_repo
                    .update_status_if(
                        &site.id,
                        &[SiteStatus::Draft.into(), SiteStatus::Review.into()],
                        SiteStatus::ReadyForTransfer.into(),
                    )
                    .await?;

                if let Some(contact) = self.workspace_contact(&site).await? {
                    send_in_background(
                        self.email_client.clone(),
                        EmailMessage::details_submitted(&contact, &site.name, &request.company_name),
                    );
                }
            }
            None => {
                let project_id = hosting::resolve_project_id(
                    production.hosting_project_id.as_deref(),
                    &self.hosting_config,
                )
                .ok_or_else(|| {
                    ProspectReviewError::Internal(
                        "No hosting project configured for this environment".to_string(),
                    )
                })?;

                let result = self
                    .hosting_provider
                    .assign_subdomain(&project_id, &site.slug)
                    .await;
                metrics::record_provider_call("assign_subdomain", result.is_ok());
                let url = result?;

                let updated = self
                    .prospect_repo
                    .submit_details(
                        &review.id.0,
                        ReviewStatus::Deploying.into(),
                        &request.company_name,
                        None,
                        request.prospect_phone.as_deref(),
                        Some(now),
                        now,
                    )
                    .await?;
                if !updated {
                    return Err(ProspectReviewError::InvalidReviewState(review.status));
                }
                metrics::record_review_transition("Deploying");

                self.site_repo
                    .create_deployment(&DeploymentRecord {
                        id: DeploymentId::new_v4().0,
                        environment_id: production.id,
                        version_id: site.active_version_id,
                        status: DeploymentStatus::Deploying.into(),
                        url: Some(url.clone()),
                        metadata: serde_json::json!({ "subdomain": site.slug }).to_string(),
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                self.site_repo
                    .update_status_if(
                        &site.id,
                        &[
                            SiteStatus::Draft.into(),
                            SiteStatus::Review.into(),
                            SiteStatus::ReadyForTransfer.into(),
                        ],
                        SiteStatus::Live.into(),
                    )
                    .await?;

                send_in_background(
                    self.email_client.clone(),
                    EmailMessage::site_live(&review.prospect_email, &site.name, &url),
                );
            }
        }

        let (review, site) = self.load_by_token(token).await?;
        Ok(Self::to_preview(&review, &site))
    }

    async fn resend(
        &self,
        review_id: &ReviewId,
        auth: &AccountAuthorisation,
    ) -> Result<ProspectReview, ProspectReviewError> {
        let record = self
            .prospect_repo
            .get(&review_id.0)
            .await?
            .ok_or(ProspectReviewError::ReviewNotFound(*review_id))?;
        let review = Self::to_review(record)?;
        let site = self.authorized_site(&review.site_id, auth).await?;

        match review.status {
            ReviewStatus::Deploying | ReviewStatus::Live => {
                return Err(ProspectReviewError::InvalidReviewState(review.status))
            }
            _ => {}
        }

        let now = Utc::now();
        let expires_at = now + Duration::days(self.review_config.expiry_days);
        self.prospect_repo
            .reset_for_resend(&review.id.0, expires_at, now)
            .await?;
        metrics::record_review_transition("Pending");

        let link = self.preview_link(&review.share_token);
        send_in_background(
            self.email_client.clone(),
            EmailMessage::review_invitation(&review.prospect_email, &site.name, &link),
        );

        let record = self
            .prospect_repo
            .get(&review_id.0)
            .await?
            .ok_or(ProspectReviewError::ReviewNotFound(*review_id))?;
        Self::to_review(record)
    }

    async fn cancel(
        &self,
        review_id: &ReviewId,
        auth: &AccountAuthorisation,
    ) -> Result<(), ProspectReviewError> {
        let record = self
            .prospect_repo
            .get(&review_id.0)
            .await?
            .ok_or(ProspectReviewError::ReviewNotFound(*review_id))?;
        let review = Self::to_review(record)?;
        self.authorized_site(&review.site_id, auth).await?;

        info!("Cancelling review {}", review_id);
        let deleted = self.prospect_repo.delete(&review_id.0).await?;
        if deleted {
            Ok(())
        } else {
            Err(ProspectReviewError::ReviewNotFound(*review_id))
        }
    }
}
