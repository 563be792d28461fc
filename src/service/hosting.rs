use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::HostingProviderConfig;
use crate::model::DnsRecord;
use crate::SafeDisplay;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Hosting provider error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Hosting provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid hosting provider configuration: {0}")]
    InvalidConfiguration(String),
}

impl ProviderError {
    /// Transport failures, rate limiting and provider-side errors are worth
    /// retrying; other API rejections are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => *status >= 500 || *status == 429,
            ProviderError::Request(_) => true,
            ProviderError::InvalidConfiguration(_) => false,
        }
    }
}

impl SafeDisplay for ProviderError {
    fn to_safe_string(&self) -> String {
        match self {
            ProviderError::Api { status, .. } => {
                format!("Hosting provider rejected the request ({status})")
            }
            ProviderError::Request(_) => "Hosting provider is unreachable".to_string(),
            ProviderError::InvalidConfiguration(_) => {
                "Hosting provider is misconfigured".to_string()
            }
        }
    }
}

/// Domain state as reported by the hosting provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDomain {
    pub name: String,
    pub verified: bool,
    #[serde(default)]
    pub dns_records: Vec<ProviderDnsRecord>,
    #[serde(default)]
    pub verification: Vec<ProviderDnsRecord>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub value: String,
}

impl From<ProviderDnsRecord> for DnsRecord {
    fn from(value: ProviderDnsRecord) -> Self {
        Self {
            record_type: value.record_type,
            name: value.name,
            value: value.value,
        }
    }
}

/// Picks the hosting project for an environment: its own project when it has
/// one, the configured default otherwise. With hosting disabled a placeholder
/// keeps the workflow going.
pub fn resolve_project_id(
    environment_project: Option<&str>,
    config: &crate::config::HostingConfig,
) -> Option<String> {
    if let Some(project_id) = environment_project {
        return Some(project_id.to_string());
    }
    match config {
        crate::config::HostingConfig::Provider(provider) => provider.default_project_id.clone(),
        crate::config::HostingConfig::Disabled => Some("local".to_string()),
    }
}

#[async_trait]
pub trait HostingProvider: Send + Sync {
    async fn add_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError>;

    async fn remove_domain(&self, project_id: &str, domain_name: &str)
        -> Result<(), ProviderError>;

    async fn get_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError>;

    /// Asks the provider to re-check the domain's DNS configuration.
    async fn verify_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError>;

    /// Attaches a managed subdomain derived from the site slug and returns its
    /// public URL.
    async fn assign_subdomain(&self, project_id: &str, slug: &str)
        -> Result<String, ProviderError>;
}

pub struct HttpHostingProvider {
    client: reqwest::Client,
    config: HostingProviderConfig,
}

#[derive(Debug, Serialize)]
struct AddDomainBody<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
}

impl HttpHostingProvider {
    pub fn new(config: &HostingProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn domains_url(&self, project_id: &str) -> Result<url::Url, ProviderError> {
        self.config
            .base_url
            .join(&format!("v1/projects/{project_id}/domains"))
            .map_err(|err| ProviderError::InvalidConfiguration(err.to_string()))
    }

    fn domain_url(&self, project_id: &str, domain_name: &str) -> Result<url::Url, ProviderError> {
        self.config
            .base_url
            .join(&format!("v1/projects/{project_id}/domains/{domain_name}"))
            .map_err(|err| ProviderError::InvalidConfiguration(err.to_string()))
    }

    async fn handle<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| status.to_string());
            Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl HostingProvider for HttpHostingProvider {
    async fn add_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        let response = self
            .client
            .post(self.domains_url(project_id)?)
            .bearer_auth(&self.config.api_token)
            .json(&AddDomainBody { name: domain_name })
            .send()
            .await?;
        Self::handle(response).await
    }

    async fn remove_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.domain_url(project_id, domain_name)?)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| status.to_string());
            Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn get_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        let response = self
            .client
            .get(self.domain_url(project_id, domain_name)?)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Self::handle(response).await
    }

    async fn verify_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        let mut url = self.domain_url(project_id, domain_name)?;
        url.set_path(&format!("{}/verify", url.path()));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        Self::handle(response).await
    }

    async fn assign_subdomain(
        &self,
        project_id: &str,
        slug: &str,
    ) -> Result<String, ProviderError> {
        let subdomain = format!("{}.{}", slug, self.config.subdomain_suffix);
        let domain = self.add_domain(project_id, &subdomain).await?;
        Ok(format!("https://{}", domain.name))
    }
}

/// Stand-in used when no hosting provider is configured. Domains are accepted
/// without talking to anyone and verification always succeeds, which keeps the
/// full workflow usable in local development.
#[derive(Default)]
pub struct DisabledHostingProvider {}

fn canned_verification(domain_name: &str) -> ProviderDnsRecord {
    ProviderDnsRecord {
        record_type: "TXT".to_string(),
        name: format!("_forge-verify.{domain_name}"),
        value: "forge-verification".to_string(),
    }
}

#[async_trait]
impl HostingProvider for DisabledHostingProvider {
    async fn add_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        info!(
            "Hosting disabled, accepting domain {} for project {}",
            domain_name, project_id
        );
        Ok(ProviderDomain {
            name: domain_name.to_string(),
            verified: false,
            dns_records: vec![ProviderDnsRecord {
                record_type: "CNAME".to_string(),
                name: domain_name.to_string(),
                value: "sites.localhost".to_string(),
            }],
            verification: vec![canned_verification(domain_name)],
            error: None,
        })
    }

    async fn remove_domain(
        &self,
        project_id: &str,
        domain_name: &str,
    ) -> Result<(), ProviderError> {
        info!(
            "Hosting disabled, dropping domain {} for project {}",
            domain_name, project_id
        );
        Ok(())
    }

    async fn get_domain(
        &self,
        _project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        Ok(ProviderDomain {
            name: domain_name.to_string(),
            verified: false,
            dns_records: vec![],
            verification: vec![canned_verification(domain_name)],
            error: None,
        })
    }

    async fn verify_domain(
        &self,
        _project_id: &str,
        domain_name: &str,
    ) -> Result<ProviderDomain, ProviderError> {
        info!("Hosting disabled, verifying domain {}", domain_name);
        Ok(ProviderDomain {
            name: domain_name.to_string(),
            verified: true,
            dns_records: vec![],
            verification: vec![],
            error: None,
        })
    }

    async fn assign_subdomain(
        &self,
        _project_id: &str,
        slug: &str,
    ) -> Result<String, ProviderError> {
        info!("Hosting disabled, assigning subdomain for {}", slug);
        Ok(format!("https://{slug}.localhost"))
    }
}
