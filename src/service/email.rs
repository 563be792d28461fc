use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EmailProviderConfig;
use crate::metrics;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email provider error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Email request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip)]
    pub kind: &'static str,
}

impl EmailMessage {
    pub fn review_invitation(to: &str, site_name: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("Your new website preview: {site_name}"),
            body: format!(
                "We built a website preview for you.\n\nHave a look and tell us what you think: {link}\n"
            ),
            kind: "review_invitation",
        }
    }

    pub fn review_responded(to: &str, site_name: &str, approved: bool) -> Self {
        let verdict = if approved { "approved" } else { "declined" };
        Self {
            to: to.to_string(),
            subject: format!("Prospect {verdict} the preview of {site_name}"),
            body: format!("The prospect has {verdict} the website preview for {site_name}.\n"),
            kind: "review_responded",
        }
    }

    pub fn dns_instructions(to: &str, domain_name: &str, records: &[crate::model::DnsRecord]) -> Self {
        let mut body = format!(
            "To connect {domain_name}, create the following DNS records at your DNS host:\n\n"
        );
        for record in records {
            body.push_str(&format!(
                "  {}  {}  {}\n",
                record.record_type, record.name, record.value
            ));
        }
        Self {
            to: to.to_string(),
            subject: format!("DNS setup for {domain_name}"),
            body,
            kind: "dns_instructions",
        }
    }

    pub fn verification_failed(to: &str, domain_name: &str, reason: Option<&str>) -> Self {
        let reason = reason.unwrap_or("DNS records could not be confirmed");
        Self {
            to: to.to_string(),
            subject: format!("Domain verification failed for {domain_name}"),
            body: format!(
                "Verification of {domain_name} failed: {reason}.\nPlease double-check the DNS records and try again.\n"
            ),
            kind: "verification_failed",
        }
    }

    pub fn details_submitted(to: &str, site_name: &str, company_name: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("Details received for {site_name}"),
            body: format!(
                "{company_name} submitted their company details for {site_name}. The site is moving towards go-live.\n"
            ),
            kind: "details_submitted",
        }
    }

    pub fn site_live(to: &str, site_name: &str, url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("{site_name} is live"),
            body: format!("Your website is now live at {url}.\n"),
            kind: "site_live",
        }
    }
}

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Sends the email on a background task. Delivery failures are logged and
/// counted but never fail the calling request.
pub fn send_in_background(client: Arc<dyn EmailClient + Send + Sync>, message: EmailMessage) {
    tokio::spawn(async move {
        let kind = message.kind;
        match client.send(&message).await {
            Ok(()) => {
                metrics::record_email(kind, true);
            }
            Err(err) => {
                metrics::record_email(kind, false);
                warn!("Failed to send {} email to {}: {}", kind, message.to, err);
            }
        }
    });
}

pub struct HttpEmailClient {
    client: reqwest::Client,
    config: EmailProviderConfig,
}

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpEmailClient {
    pub fn new(config: &EmailProviderConfig) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl EmailClient for HttpEmailClient {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let url = self
            .config
            .base_url
            .join("v1/send")
            .map_err(|err| EmailError::Api {
                status: 0,
                message: err.to_string(),
            })?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&SendEmailBody {
                from: &self.config.from_address,
                to: &message.to,
                subject: &message.subject,
                text: &message.body,
            })
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(EmailError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[derive(Default)]
pub struct DisabledEmailClient {}

#[async_trait]
impl EmailClient for DisabledEmailClient {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            "Email disabled, skipping {} email to {}: {}",
            message.kind, message.to, message.subject
        );
        Ok(())
    }
}
