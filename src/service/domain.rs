use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::AccountAuthorisation;
use crate::config::HostingConfig;
use crate::metrics;
use crate::model::{
    DnsRecord, DomainId, DomainStatus, EnvironmentId, EnvironmentType, SiteDomain, SiteId,
    SiteStatus,
};
use crate::repo::account::AccountRepo;
use crate::repo::domain::{DomainRecord, DomainRepo};
use crate::repo::site::{EnvironmentRecord, SiteRecord, SiteRepo};
use crate::repo::workspace::WorkspaceRepo;
use crate::repo::{RepoError, ResultExt};
use crate::service::email::{send_in_background, EmailClient, EmailMessage};
use crate::service::hosting::{self, HostingProvider, ProviderError};
use crate::SafeDisplay;

lazy_static! {
    static ref DOMAIN_NAME_REGEX: Regex =
        Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$")
            .expect("invalid domain name regex");
}

pub fn is_valid_domain_name(domain_name: &str) -> bool {
    DOMAIN_NAME_REGEX.is_match(domain_name)
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Domain Not Found: {0}")]
    DomainNotFound(DomainId),
    #[error("Environment Not Found: {0}")]
    EnvironmentNotFound(EnvironmentId),
    #[error("Site Not Found: {0}")]
    SiteNotFound(SiteId),
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),
    #[error("Domain already attached to this environment: {0}")]
    DomainAlreadyExists(String),
    #[error("No hosting project configured for this environment")]
    NoHostingProject,
    #[error("Invalid domain state: {0}")]
    InvalidDomainState(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Internal error: {0}")]
    InternalRepoError(#[from] RepoError),
}

impl DomainError {
    /// Whether retrying the same call can be expected to help.
    pub fn is_retryable(&self) -> bool {
        match self {
            DomainError::Provider(inner) => inner.is_retryable(),
            DomainError::InternalRepoError(_) => true,
            _ => false,
        }
    }
}

impl SafeDisplay for DomainError {
    fn to_safe_string(&self) -> String {
        match self {
            DomainError::DomainNotFound(_) => self.to_string(),
            DomainError::EnvironmentNotFound(_) => self.to_string(),
            DomainError::SiteNotFound(_) => self.to_string(),
            DomainError::InvalidDomainName(_) => self.to_string(),
            DomainError::DomainAlreadyExists(_) => self.to_string(),
            DomainError::NoHostingProject => self.to_string(),
            DomainError::InvalidDomainState(_) => self.to_string(),
            DomainError::Unauthorized(_) => self.to_string(),
            DomainError::Provider(inner) => inner.to_safe_string(),
            DomainError::Internal(_) => self.to_string(),
            DomainError::InternalRepoError(inner) => inner.to_safe_string(),
        }
    }
}

#[async_trait]
pub trait DomainService: Send + Sync {
    /// Attaches a custom domain to a site environment. The domain name is
    /// validated before the hosting provider is involved.
    async fn add_domain(
        &self,
        environment_id: &EnvironmentId,
        domain_name: &str,
        is_primary: bool,
        auth: &AccountAuthorisation,
    ) -> Result<SiteDomain, DomainError>;

    async fn get_domains(
        &self,
        environment_id: &EnvironmentId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<SiteDomain>, DomainError>;

    /// Triggers provider verification and persists the outcome.
    async fn verify_domain(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<SiteDomain, DomainError>;

    /// Read-only provider status check, persisted to the row. No emails.
    async fn refresh_status(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<SiteDomain, DomainError>;

    /// Stored DNS setup records, re-fetched from the provider when empty.
    async fn get_dns_records(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<DnsRecord>, DomainError>;

    async fn set_primary(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<(), DomainError>;

    async fn remove_domain(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<(), DomainError>;
}

pub struct DomainServiceDefault {
    domain_repo: Arc<dyn DomainRepo + Send + Sync>,
    site_repo: Arc<dyn SiteRepo + Send + Sync>,
    workspace_repo: Arc<dyn WorkspaceRepo + Send + Sync>,
    account_repo: Arc<dyn AccountRepo + Send + Sync>,
    hosting_provider: Arc<dyn HostingProvider + Send + Sync>,
    hosting_config: HostingConfig,
    email_client: Arc<dyn EmailClient + Send + Sync>,
}

impl DomainServiceDefault {
    pub fn new(
        domain_repo: Arc<dyn DomainRepo + Send + Sync>,
        site_repo: Arc<dyn SiteRepo + Send + Sync>,
        workspace_repo: Arc<dyn WorkspaceRepo + Send + Sync>,
        account_repo: Arc<dyn AccountRepo + Send + Sync>,
        hosting_provider: Arc<dyn HostingProvider + Send + Sync>,
        hosting_config: HostingConfig,
        email_client: Arc<dyn EmailClient + Send + Sync>,
    ) -> Self {
        Self {
            domain_repo,
            site_repo,
            workspace_repo,
            account_repo,
            hosting_provider,
            hosting_config,
            email_client,
        }
    }

    async fn authorize_site(
        &self,
        site: &SiteRecord,
        auth: &AccountAuthorisation,
    ) -> Result<(), DomainError> {
        if auth.has_admin() {
            return Ok(());
        }
        let member = self
            .workspace_repo
            .get_member(&site.workspace_id, &auth.account_id().0)
            .await?;
        if member.is_some() {
            Ok(())
        } else {
            Err(DomainError::Unauthorized(
                "Not a member of this workspace".to_string(),
            ))
        }
    }

    async fn authorized_environment(
        &self,
        environment_id: &EnvironmentId,
        auth: &AccountAuthorisation,
    ) -> Result<(EnvironmentRecord, SiteRecord), DomainError> {
        let environment = self
            .site_repo
            .get_environment(&environment_id.0)
            .await?
            .ok_or(DomainError::EnvironmentNotFound(*environment_id))?;
        let site = self
            .site_repo
            .get(&environment.site_id)
            .await?
            .ok_or(DomainError::SiteNotFound(SiteId(environment.site_id)))?;
        self.authorize_site(&site, auth).await?;
        Ok((environment, site))
    }

    async fn authorized_domain(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<(DomainRecord, EnvironmentRecord, SiteRecord), DomainError> {
        let domain = self
            .domain_repo
            .get(&domain_id.0)
            .await?
            .ok_or(DomainError::DomainNotFound(*domain_id))?;
        let (environment, site) = self
            .authorized_environment(&EnvironmentId(domain.environment_id), auth)
            .await?;
        Ok((domain, environment, site))
    }

    fn project_id(&self, environment: &EnvironmentRecord) -> Result<String, DomainError> {
        hosting::resolve_project_id(
            environment.hosting_project_id.as_deref(),
            &self.hosting_config,
        )
        .ok_or(DomainError::NoHostingProject)
    }

    async fn workspace_contact(&self, site: &SiteRecord) -> Result<Option<String>, DomainError> {
        let workspace = self.workspace_repo.get(&site.workspace_id).await?;
        Ok(workspace.map(|workspace| workspace.contact_email))
    }

    fn to_model(record: DomainRecord) -> Result<SiteDomain, DomainError> {
        record.try_into().map_err(DomainError::Internal)
    }

    /// Primary active domain on the production environment takes the site
    /// from `ReadyForTransfer` to `Live`.
    async fn maybe_go_live(
        &self,
        domain: &DomainRecord,
        environment: &EnvironmentRecord,
        site: &SiteRecord,
    ) -> Result<(), DomainError> {
        let production: i32 = EnvironmentType::Production.into();
        if domain.is_primary && environment.env_type == production {
            let promoted = self
                .site_repo
                .update_status_if(
                    &site.id,
                    &[SiteStatus::ReadyForTransfer.into()],
                    SiteStatus::Live.into(),
                )
                .await?;
            if promoted {
                info!("Site {} is now live on {}", site.slug, domain.domain_name);
            }
        }
        Ok(())
    }
}

fn records_to_json(records: &[DnsRecord]) -> Result<String, DomainError> {
    serde_json::to_string(records).map_err(|err| DomainError::Internal(err.to_string()))
}

fn records_from_json(json: &str) -> Result<Vec<DnsRecord>, DomainError> {
    if json.is_empty() {
        return Ok(vec![]);
    }
    serde_json::from_str(json).map_err(|err| DomainError::Internal(err.to_string()))
}

#[async_trait]
impl DomainService for DomainServiceDefault {
    async fn add_domain(
        &self,
        environment_id: &EnvironmentId,
        domain_name: &str,
        is_primary: bool,
        auth: &AccountAuthorisation,
    ) -> Result<SiteDomain, DomainError> {
        if !is_valid_domain_name(domain_name) {
            return Err(DomainError::InvalidDomainName(domain_name.to_string()));
        }
        let (environment, site) = self.authorized_environment(environment_id, auth).await?;
        let project_id = self.project_id(&environment)?;

        let result = self
            .hosting_provider
            .add_domain(&project_id, domain_name)
            .await;
        metrics::record_provider_call("add_domain", result.is_ok());
        let provider_domain = result?;

        let dns_records: Vec<DnsRecord> = provider_domain
            .dns_records
            .into_iter()
            .map(|record| record.into())
            .collect();
        let verification_records: Vec<DnsRecord> = provider_domain
            .verification
            .into_iter()
            .map(|record| record.into())
            .collect();

        let now = Utc::now();
        let record = DomainRecord {
            id: DomainId::new_v4().0,
            environment_id: environment_id.0,
            domain_name: domain_name.to_string(),
            is_primary,
            status: DomainStatus::PendingVerification.into(),
            dns_records: records_to_json(&dns_records)?,
            verification_records: records_to_json(&verification_records)?,
            error_message: None,
            verified_at: None,
            failed_at: None,
            last_checked_at: None,
            created_at: now,
        };
        info!(
            "Attaching domain {} to environment {}",
            domain_name, environment_id
        );
        self.domain_repo
            .create(&record)
            .await
            .to_error_on_unique_violation(DomainError::DomainAlreadyExists(
                domain_name.to_string(),
            ))?;

        let contact = self.workspace_contact(&site).await?;
        if let Some(contact) = &contact {
            send_in_background(
                self.email_client.clone(),
                EmailMessage::dns_instructions(contact, domain_name, &dns_records),
            );
        }
        // The member who attached the domain gets the instructions too,
        // unless they are the workspace contact already. Lookup failures
        // only cost the email, never the request.
        match self.account_repo.get(&auth.account_id().0).await {
            Ok(Some(actor)) if contact.as_deref() != Some(actor.email.as_str()) => {
                send_in_background(
                    self.email_client.clone(),
                    EmailMessage::dns_instructions(&actor.email, domain_name, &dns_records),
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    "Could not resolve acting account for DNS instructions: {}",
                    err
                );
            }
        }

        Self::to_model(record)
    }

    async fn get_domains(
        &self,
        environment_id: &EnvironmentId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<SiteDomain>, DomainError> {
        self.authorized_environment(environment_id, auth).await?;
        let records = self.domain_repo.get_by_environment(&environment_id.0).await?;
        records.into_iter().map(Self::to_model).collect()
    }

    async fn verify_domain(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<SiteDomain, DomainError> {
        let (mut record, environment, site) = self.authorized_domain(domain_id, auth).await?;
        let status = DomainStatus::try_from(record.status).map_err(DomainError::Internal)?;
        match status {
            DomainStatus::Active => return Self::to_model(record),
            DomainStatus::Removed => {
                return Err(DomainError::InvalidDomainState(
                    "Domain has been removed".to_string(),
                ))
            }
            DomainStatus::PendingVerification | DomainStatus::Verifying | DomainStatus::Failed => {}
        }
        let project_id = self.project_id(&environment)?;

        let result = self
            .hosting_provider
            .verify_domain(&project_id, &record.domain_name)
            .await;
        metrics::record_provider_call("verify_domain", result.is_ok());

        let now = Utc::now();
        record.last_checked_at = Some(now);
        match result {
            Ok(provider_domain) => {
                if provider_domain.verified {
                    record.status = DomainStatus::Active.into();
                    record.verified_at = Some(now);
                    record.error_message = None;
                    info!("Domain {} verified", record.domain_name);
                } else if let Some(error) = provider_domain.error {
                    record.status = DomainStatus::Failed.into();
                    record.failed_at = Some(now);
                    record.error_message = Some(error);
                } else {
                    record.status = DomainStatus::Verifying.into();
                    if !provider_domain.verification.is_empty() {
                        let records: Vec<DnsRecord> = provider_domain
                            .verification
                            .into_iter()
                            .map(|r| r.into())
                            .collect();
                        record.verification_records = records_to_json(&records)?;
                    }
                }
                self.domain_repo.update(&record).await?;

                if record.status == i32::from(DomainStatus::Active) {
                    self.maybe_go_live(&record, &environment, &site).await?;
                } else if record.status == i32::from(DomainStatus::Failed) {
                    if let Some(contact) = self.workspace_contact(&site).await? {
                        send_in_background(
                            self.email_client.clone(),
                            EmailMessage::verification_failed(
                                &contact,
                                &record.domain_name,
                                record.error_message.as_deref(),
                            ),
                        );
                    }
                }
                Self::to_model(record)
            }
            Err(err) => {
                // Best effort bookkeeping; the provider error is what the
                // caller needs to see.
                record.status = DomainStatus::Failed.into();
                record.failed_at = Some(now);
                record.error_message = Some(err.to_safe_string());
                if let Err(update_err) = self.domain_repo.update(&record).await {
                    warn!(
                        "Failed to record verification failure for {}: {}",
                        record.domain_name, update_err
                    );
                }
                if let Some(contact) = self.workspace_contact(&site).await.ok().flatten() {
                    send_in_background(
                        self.email_client.clone(),
                        EmailMessage::verification_failed(
                            &contact,
                            &record.domain_name,
                            record.error_message.as_deref(),
                        ),
                    );
                }
                Err(err.into())
            }
        }
    }

    async fn refresh_status(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<SiteDomain, DomainError> {
        let (mut record, environment, site) = self.authorized_domain(domain_id, auth).await?;
        if record.status == i32::from(DomainStatus::Removed) {
            return Err(DomainError::InvalidDomainState(
                "Domain has been removed".to_string(),
            ));
        }
        let project_id = self.project_id(&environment)?;

        let result = self
            .hosting_provider
            .get_domain(&project_id, &record.domain_name)
            .await;
        metrics::record_provider_call("get_domain", result.is_ok());
        let provider_domain = result?;

        let now = Utc::now();
        record.last_checked_at = Some(now);
        if provider_domain.verified {
            if record.status != i32::from(DomainStatus::Active) {
                record.status = DomainStatus::Active.into();
                record.verified_at = Some(now);
                record.error_message = None;
            }
        } else if let Some(error) = provider_domain.error {
            record.status = DomainStatus::Failed.into();
            record.failed_at = Some(now);
            record.error_message = Some(error);
        }
        self.domain_repo.update(&record).await?;

        if record.status == i32::from(DomainStatus::Active) {
            self.maybe_go_live(&record, &environment, &site).await?;
        }
        Self::to_model(record)
    }

    async fn get_dns_records(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<Vec<DnsRecord>, DomainError> {
        let (mut record, environment, _site) = self.authorized_domain(domain_id, auth).await?;
        let stored = records_from_json(&record.dns_records)?;
        if !stored.is_empty() {
            return Ok(stored);
        }

        let project_id = self.project_id(&environment)?;
        let result = self
            .hosting_provider
            .get_domain(&project_id, &record.domain_name)
            .await;
        metrics::record_provider_call("get_domain", result.is_ok());
        let provider_domain = result?;

        let records: Vec<DnsRecord> = provider_domain
            .dns_records
            .into_iter()
            .map(|r| r.into())
            .collect();
        record.dns_records = records_to_json(&records)?;
        self.domain_repo.update(&record).await?;
        Ok(records)
    }

    async fn set_primary(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<(), DomainError> {
        let (record, _environment, _site) = self.authorized_domain(domain_id, auth).await?;
        if record.status == i32::from(DomainStatus::Removed) {
            return Err(DomainError::InvalidDomainState(
                "Domain has been removed".to_string(),
            ));
        }
        self.domain_repo
            .set_primary(&record.id, &record.environment_id)
            .await?;
        Ok(())
    }

    async fn remove_domain(
        &self,
        domain_id: &DomainId,
        auth: &AccountAuthorisation,
    ) -> Result<(), DomainError> {
        let (record, environment, _site) = self.authorized_domain(domain_id, auth).await?;
        let project_id = self.project_id(&environment)?;

        let result = self
            .hosting_provider
            .remove_domain(&project_id, &record.domain_name)
            .await;
        metrics::record_provider_call("remove_domain", result.is_ok());
        if let Err(err) = result {
            warn!(
                "Provider removal of {} failed, removing locally anyway: {}",
                record.domain_name, err
            );
        }

        info!("Removing domain {}", record.domain_name);
        self.domain_repo
            .mark_removed(&record.id, DomainStatus::Removed.into())
            .await?;
        Ok(())
    }
}
