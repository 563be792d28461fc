use test_r::test;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use social_forge_service::auth::AccountAuthorisation;
use social_forge_service::config::{
    DbConfig, DbSqliteConfig, ForgeServiceConfig, HostingConfig, ReviewConfig,
};
use social_forge_service::db;
use social_forge_service::model::{
    Account, AccountData, AccountId, CreateReviewRequest, CreateSiteRequest, CreateTokenRequest,
    CreateVersionRequest, DomainStatus, EnvironmentType, ReviewStatus, Role, ShareToken, Site,
    SiteStatus, Token, TokenId, Workspace, WorkspaceData,
};
use social_forge_service::repo::account::DbAccountRepo;
use social_forge_service::repo::domain::DbDomainRepo;
use social_forge_service::repo::prospect::{DbProspectReviewRepo, ProspectReviewRepo, ReviewRecord};
use social_forge_service::repo::site::{
    DbSiteRepo, DeploymentRecord, EnvironmentRecord, SiteRecord, SiteRepo, VersionRecord,
};
use social_forge_service::repo::token::{DbTokenRepo, TokenRecord, TokenRepo};
use social_forge_service::repo::workspace::DbWorkspaceRepo;
use social_forge_service::repo::RepoError;
use social_forge_service::service::account::AccountService;
use social_forge_service::service::auth::AuthService;
use social_forge_service::service::domain::{DomainError, DomainService, DomainServiceDefault};
use social_forge_service::service::email::{EmailClient, EmailError, EmailMessage};
use social_forge_service::service::hosting::DisabledHostingProvider;
use social_forge_service::service::prospect::{ProspectReviewError, ProspectReviewService};
use social_forge_service::service::site::{SiteError, SiteService, SiteServiceDefault};
use social_forge_service::service::token::{TokenService, TokenServiceError};
use social_forge_service::service::workspace::WorkspaceService;
use social_forge_service::service::Services;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

test_r::enable!();

struct SqliteDb {
    db_path: String,
}

impl Default for SqliteDb {
    fn default() -> Self {
        Self {
            db_path: format!("/tmp/social-forge-{}.db", Uuid::new_v4()),
        }
    }
}

impl Drop for SqliteDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

fn sqlite_config(db: &SqliteDb, review: ReviewConfig) -> ForgeServiceConfig {
    ForgeServiceConfig {
        db: DbConfig::Sqlite(DbSqliteConfig {
            database: db.db_path.clone(),
            max_connections: 4,
        }),
        review,
        ..ForgeServiceConfig::default()
    }
}

async fn make_services(db: &SqliteDb, review: ReviewConfig) -> Services {
    let config = sqlite_config(db, review);
    let db_config = match config.db.clone() {
        DbConfig::Sqlite(db_config) => db_config,
        _ => panic!("Invalid DB config"),
    };
    db::sqlite_migrate(&db_config, "./db/migration/sqlite")
        .await
        .unwrap();
    Services::new(&config).await.unwrap()
}

async fn sqlite_pool(db: &SqliteDb) -> Arc<sqlx::Pool<sqlx::Sqlite>> {
    let config = sqlite_config(db, ReviewConfig::default());
    let db_config = match config.db {
        DbConfig::Sqlite(db_config) => db_config,
        _ => panic!("Invalid DB config"),
    };
    Arc::new(db::create_sqlite_pool(&db_config).await.unwrap())
}

#[derive(Default)]
struct RecordingEmailClient {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailClient for RecordingEmailClient {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

async fn wait_for_emails(client: &RecordingEmailClient, at_least: usize) -> Vec<EmailMessage> {
    for _ in 0..100 {
        {
            let sent = client.sent.lock().unwrap();
            if sent.len() >= at_least {
                return sent.clone();
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    client.sent.lock().unwrap().clone()
}

/// Site repo whose first max-number read is one behind the database, like a
/// read made just before a concurrent writer inserted the next version.
struct StaleReadSiteRepo {
    inner: Arc<dyn SiteRepo + Send + Sync>,
    stale: AtomicBool,
}

#[async_trait]
impl SiteRepo for StaleReadSiteRepo {
    async fn create(
        &self,
        site: &SiteRecord,
        environments: &[EnvironmentRecord],
    ) -> Result<(), RepoError> {
        self.inner.create(site, environments).await
    }

    async fn get(&self, id: &Uuid) -> Result<Option<SiteRecord>, RepoError> {
        self.inner.get(id).await
    }

    async fn get_by_workspace(&self, workspace_id: &Uuid) -> Result<Vec<SiteRecord>, RepoError> {
        self.inner.get_by_workspace(workspace_id).await
    }

    async fn update_status_if(&self, id: &Uuid, from: &[i32], to: i32) -> Result<bool, RepoError> {
        self.inner.update_status_if(id, from, to).await
    }

    async fn set_active_version(&self, id: &Uuid, version_id: &Uuid) -> Result<(), RepoError> {
        self.inner.set_active_version(id, version_id).await
    }

    async fn get_environment(&self, id: &Uuid) -> Result<Option<EnvironmentRecord>, RepoError> {
        self.inner.get_environment(id).await
    }

    async fn get_environments(&self, site_id: &Uuid) -> Result<Vec<EnvironmentRecord>, RepoError> {
        self.inner.get_environments(site_id).await
    }

    async fn get_environment_by_type(
        &self,
        site_id: &Uuid,
        env_type: i32,
    ) -> Result<Option<EnvironmentRecord>, RepoError> {
        self.inner.get_environment_by_type(site_id, env_type).await
    }

    async fn max_version_number(&self, site_id: &Uuid) -> Result<i64, RepoError> {
        let max = self.inner.max_version_number(site_id).await?;
        if self.stale.swap(false, Ordering::SeqCst) {
            Ok(max - 1)
        } else {
            Ok(max)
        }
    }

    async fn create_version(&self, version: &VersionRecord) -> Result<(), RepoError> {
        self.inner.create_version(version).await
    }

    async fn get_version(&self, id: &Uuid) -> Result<Option<VersionRecord>, RepoError> {
        self.inner.get_version(id).await
    }

    async fn get_versions(&self, site_id: &Uuid) -> Result<Vec<VersionRecord>, RepoError> {
        self.inner.get_versions(site_id).await
    }

    async fn create_deployment(&self, deployment: &DeploymentRecord) -> Result<(), RepoError> {
        self.inner.create_deployment(deployment).await
    }

    async fn get_deployments(
        &self,
        environment_id: &Uuid,
    ) -> Result<Vec<DeploymentRecord>, RepoError> {
        self.inner.get_deployments(environment_id).await
    }
}

fn create_auth(account_id: &AccountId, roles: Vec<Role>) -> AccountAuthorisation {
    AccountAuthorisation::new(
        Token {
            id: TokenId::new_v4(),
            account_id: *account_id,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(1),
        },
        roles,
    )
}

async fn create_account(services: &Services) -> Account {
    let account_id = AccountId::new_v4();
    let account_data = AccountData {
        name: "acc_name".to_string(),
        email: format!("{}@social-forge.dev", account_id.0),
    };
    services
        .account_service
        .create(&account_id, &account_data)
        .await
        .unwrap()
}

async fn create_workspace(services: &Services, auth: &AccountAuthorisation) -> Workspace {
    services
        .workspace_service
        .create(
            &WorkspaceData {
                name: "Agency".to_string(),
                contact_email: "agency@social-forge.dev".to_string(),
            },
            auth,
        )
        .await
        .unwrap()
}

async fn create_site(
    services: &Services,
    auth: &AccountAuthorisation,
    name: &str,
) -> (Workspace, Site) {
    let workspace = create_workspace(services, auth).await;
    let site = services
        .site_service
        .create(
            &workspace.id,
            &CreateSiteRequest {
                name: name.to_string(),
                slug: None,
            },
            auth,
        )
        .await
        .unwrap();
    (workspace, site)
}

async fn create_review(
    services: &Services,
    auth: &AccountAuthorisation,
    site: &Site,
) -> social_forge_service::model::ProspectReview {
    services
        .prospect_service
        .create_review(
            &site.id,
            &CreateReviewRequest {
                prospect_email: "prospect@example.com".to_string(),
                prospect_name: Some("Pat Prospect".to_string()),
                prospect_phone: None,
                expires_in_days: None,
            },
            auth,
        )
        .await
        .unwrap()
}

#[test]
pub async fn test_site_lifecycle() {
    let db = SqliteDb::default();
    let services = make_services(&db, ReviewConfig::default()).await;

    let account = create_account(&services).await;
    let auth = create_auth(&account.id, vec![]);
    let (workspace, site) = create_site(&services, &auth, "Acme Bakery").await;

    assert_eq!(site.slug, "acme-bakery");
    assert_eq!(site.status, SiteStatus::Draft);

    // same slug in the same workspace is rejected
    let duplicate = services
        .site_service
        .create(
            &workspace.id,
            &CreateSiteRequest {
                name: "Another".to_string(),
                slug: Some("acme-bakery".to_string()),
            },
            &auth,
        )
        .await;
    assert!(matches!(duplicate, Err(SiteError::SlugAlreadyExists(_))));

    let environments = services
        .site_service
        .get_environments(&site.id, &auth)
        .await
        .unwrap();
    assert_eq!(environments.len(), 3);
    assert!(environments
        .iter()
        .any(|e| e.env_type == EnvironmentType::Production));

    let v1 = services
        .site_service
        .create_version(&site.id, &CreateVersionRequest { label: None }, &auth)
        .await
        .unwrap();
    let v2 = services
        .site_service
        .create_version(
            &site.id,
            &CreateVersionRequest {
                label: Some("second draft".to_string()),
            },
            &auth,
        )
        .await
        .unwrap();
    assert_eq!(v1.number, 1);
    assert_eq!(v2.number, 2);

    let site = services
        .site_service
        .activate_version(&site.id, &v2.id, &auth)
        .await
        .unwrap();
    assert_eq!(site.active_version_id, Some(v2.id));
    assert_eq!(site.status, SiteStatus::Review);

    services.site_service.archive(&site.id, &auth).await.unwrap();
    let archived = services.site_service.get(&site.id, &auth).await.unwrap();
    assert_eq!(archived.status, SiteStatus::Archived);

    let again = services.site_service.archive(&site.id, &auth).await;
    assert!(matches!(again, Err(SiteError::InvalidSiteState(_))));
}

#[test]
pub async fn test_review_flow_with_subdomain() {
    let db = SqliteDb::default();
    let services = make_services(
        &db,
        ReviewConfig {
            promote_after: std::time::Duration::from_secs(0),
            ..ReviewConfig::default()
        },
    )
    .await;

    let account = create_account(&services).await;
    let auth = create_auth(&account.id, vec![]);
    let (_, site) = create_site(&services, &auth, "Corner Cafe").await;

    let review = create_review(&services, &auth, &site).await;
    assert_eq!(review.status, ReviewStatus::Pending);
    assert_eq!(review.share_token.len(), 32);
    assert!(review.expires_at > Utc::now() + Duration::days(13));

    // sending out a review promotes the site from Draft
    let site = services.site_service.get(&site.id, &auth).await.unwrap();
    assert_eq!(site.status, SiteStatus::Review);

    let token = ShareToken::from_str(&review.share_token).unwrap();

    let preview = services.prospect_service.get_preview(&token).await.unwrap();
    assert_eq!(preview.status, ReviewStatus::Pending);
    assert_eq!(preview.site_name, "Corner Cafe");

    let preview = services.prospect_service.mark_viewed(&token).await.unwrap();
    assert_eq!(preview.status, ReviewStatus::Viewed);

    // marking viewed again is a no-op
    let preview = services.prospect_service.mark_viewed(&token).await.unwrap();
    assert_eq!(preview.status, ReviewStatus::Viewed);

    let preview = services
        .prospect_service
        .respond(
            &token,
            &social_forge_service::model::RespondRequest {
                approved: true,
                feedback: Some("Looks great".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(preview.status, ReviewStatus::Approved);

    // only one response wins
    let second = services
        .prospect_service
        .respond(
            &token,
            &social_forge_service::model::RespondRequest {
                approved: false,
                feedback: None,
            },
        )
        .await;
    assert!(matches!(second, Err(ProspectReviewError::AlreadyResponded)));

    // no requested domain: the site goes live on a managed subdomain
    let preview = services
        .prospect_service
        .submit_details(
            &token,
            &social_forge_service::model::SubmitDetailsRequest {
                company_name: "Corner Cafe LLC".to_string(),
                requested_domain: None,
                prospect_phone: Some("555-0100".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(preview.status, ReviewStatus::Deploying);

    let site = services.site_service.get(&site.id, &auth).await.unwrap();
    assert_eq!(site.status, SiteStatus::Live);

    let environments = services
        .site_service
        .get_environments(&site.id, &auth)
        .await
        .unwrap();
    let production = environments
        .iter()
        .find(|e| e.env_type == EnvironmentType::Production)
        .unwrap();
    let deployments = services
        .site_service
        .get_deployments(&production.id, &auth)
        .await
        .unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(
        deployments[0].url.as_deref(),
        Some("https://corner-cafe.localhost")
    );
    assert_eq!(deployments[0].metadata["subdomain"], "corner-cafe");

    // the sweeper promotes finished deployments
    services.review_sweeper.sweep_once().await;
    let reviews = services
        .prospect_service
        .list_reviews(&site.id, &auth)
        .await
        .unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].status, ReviewStatus::Live);
    assert_eq!(reviews[0].company_name.as_deref(), Some("Corner Cafe LLC"));
}

#[test]
pub async fn test_review_decline_and_resend() {
    let db = SqliteDb::default();
    let services = make_services(&db, ReviewConfig::default()).await;

    let account = create_account(&services).await;
    let auth = create_auth(&account.id, vec![]);
    let (_, site) = create_site(&services, &auth, "Flower Shop").await;

    let review = create_review(&services, &auth, &site).await;
    let token = ShareToken::from_str(&review.share_token).unwrap();

    let preview = services
        .prospect_service
        .respond(
            &token,
            &social_forge_service::model::RespondRequest {
                approved: false,
                feedback: Some("Too colorful".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(preview.status, ReviewStatus::Declined);

    // details can only follow an approval
    let details = services
        .prospect_service
        .submit_details(
            &token,
            &social_forge_service::model::SubmitDetailsRequest {
                company_name: "Flower Shop LLC".to_string(),
                requested_domain: None,
                prospect_phone: None,
            },
        )
        .await;
    assert!(matches!(
        details,
        Err(ProspectReviewError::InvalidReviewState(
            ReviewStatus::Declined
        ))
    ));

    // resending resets the review for another round
    let resent = services
        .prospect_service
        .resend(&review.id, &auth)
        .await
        .unwrap();
    assert_eq!(resent.status, ReviewStatus::Pending);
    assert_eq!(resent.feedback, None);
    assert_eq!(resent.share_token, review.share_token);

    services
        .prospect_service
        .cancel(&review.id, &auth)
        .await
        .unwrap();
    let gone = services.prospect_service.get_preview(&token).await;
    assert!(matches!(gone, Err(ProspectReviewError::UnknownShareToken)));
}

#[test]
pub async fn test_review_expiry() {
    let db = SqliteDb::default();
    let services = make_services(&db, ReviewConfig::default()).await;

    let account = create_account(&services).await;
    let auth = create_auth(&account.id, vec![]);
    let (_, site) = create_site(&services, &auth, "Gym Studio").await;

    // zero lifetime is rejected up front
    let invalid = services
        .prospect_service
        .create_review(
            &site.id,
            &CreateReviewRequest {
                prospect_email: "prospect@example.com".to_string(),
                prospect_name: None,
                prospect_phone: None,
                expires_in_days: Some(0),
            },
            &auth,
        )
        .await;
    assert!(matches!(invalid, Err(ProspectReviewError::ArgValidation(_))));

    // so is a malformed prospect email, leaving the site untouched
    let invalid = services
        .prospect_service
        .create_review(
            &site.id,
            &CreateReviewRequest {
                prospect_email: "not-an-email".to_string(),
                prospect_name: None,
                prospect_phone: None,
                expires_in_days: None,
            },
            &auth,
        )
        .await;
    assert!(matches!(invalid, Err(ProspectReviewError::ArgValidation(_))));
    let site_after = services.site_service.get(&site.id, &auth).await.unwrap();
    assert_eq!(site_after.status, SiteStatus::Draft);

    // a review past its deadline reads as expired even before the sweeper ran
    let prospect_repo = DbProspectReviewRepo::new(sqlite_pool(&db).await);

    let now = Utc::now();
    let record = ReviewRecord {
        id: Uuid::new_v4(),
        site_id: site.id.0,
        share_token: ShareToken::generate().0,
        prospect_email: "late@example.com".to_string(),
        prospect_name: None,
        prospect_phone: None,
        status: ReviewStatus::Pending.into(),
        expires_at: now - Duration::days(1),
        viewed_at: None,
        responded_at: None,
        feedback: None,
        company_name: None,
        requested_domain: None,
        deploy_started_at: None,
        created_by: account.id.0,
        created_at: now - Duration::days(15),
        updated_at: now - Duration::days(15),
    };
    prospect_repo.create(&record).await.unwrap();

    let token = ShareToken::from_str(&record.share_token).unwrap();
    let preview = services.prospect_service.get_preview(&token).await;
    match preview {
        Err(ProspectReviewError::ReviewExpired) => {
            assert_eq!(
                ProspectReviewError::ReviewExpired.to_string(),
                "This review link has expired"
            );
        }
        other => panic!("Expected expired review, got {other:?}"),
    }

    let respond = services
        .prospect_service
        .respond(
            &token,
            &social_forge_service::model::RespondRequest {
                approved: true,
                feedback: None,
            },
        )
        .await;
    assert!(matches!(respond, Err(ProspectReviewError::ReviewExpired)));

    // the sweeper makes the expiry durable
    services.review_sweeper.sweep_once().await;
    let swept = prospect_repo.get(&record.id).await.unwrap().unwrap();
    assert_eq!(swept.status, i32::from(ReviewStatus::Expired));
}

#[test]
pub async fn test_domain_lifecycle() {
    let db = SqliteDb::default();
    let services = make_services(&db, ReviewConfig::default()).await;

    let account = create_account(&services).await;
    let auth = create_auth(&account.id, vec![]);
    let (_, site) = create_site(&services, &auth, "Pizza Place").await;

    let environments = services
        .site_service
        .get_environments(&site.id, &auth)
        .await
        .unwrap();
    let production = environments
        .iter()
        .find(|e| e.env_type == EnvironmentType::Production)
        .unwrap();

    // name validation happens before the provider is involved
    let invalid = services
        .domain_service
        .add_domain(&production.id, "not a domain!", false, &auth)
        .await;
    assert!(matches!(invalid, Err(DomainError::InvalidDomainName(_))));

    let apex = services
        .domain_service
        .add_domain(&production.id, "pizza.example", true, &auth)
        .await
        .unwrap();
    assert_eq!(apex.status, DomainStatus::PendingVerification);
    assert!(apex.is_primary);
    assert!(!apex.dns_records.is_empty());
    assert!(!apex.verification_records.is_empty());

    let duplicate = services
        .domain_service
        .add_domain(&production.id, "pizza.example", false, &auth)
        .await;
    assert!(matches!(duplicate, Err(DomainError::DomainAlreadyExists(_))));

    let www = services
        .domain_service
        .add_domain(&production.id, "www.pizza.example", false, &auth)
        .await
        .unwrap();
    assert!(!www.is_primary);

    // switching primary demotes the previous one
    services
        .domain_service
        .set_primary(&www.id, &auth)
        .await
        .unwrap();
    let domains = services
        .domain_service
        .get_domains(&production.id, &auth)
        .await
        .unwrap();
    let primaries: Vec<_> = domains.iter().filter(|d| d.is_primary).collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0].domain_name, "www.pizza.example");

    let verified = services
        .domain_service
        .verify_domain(&apex.id, &auth)
        .await
        .unwrap();
    assert_eq!(verified.status, DomainStatus::Active);
    assert!(verified.verified_at.is_some());

    services
        .domain_service
        .remove_domain(&www.id, &auth)
        .await
        .unwrap();
    let domains = services
        .domain_service
        .get_domains(&production.id, &auth)
        .await
        .unwrap();
    let removed = domains
        .iter()
        .find(|d| d.domain_name == "www.pizza.example")
        .unwrap();
    assert_eq!(removed.status, DomainStatus::Removed);

    let reprimary = services.domain_service.set_primary(&removed.id, &auth).await;
    assert!(matches!(reprimary, Err(DomainError::InvalidDomainState(_))));
}

#[test]
pub async fn test_custom_domain_details() {
    let db = SqliteDb::default();
    let services = make_services(&db, ReviewConfig::default()).await;

    let account = create_account(&services).await;
    let auth = create_auth(&account.id, vec![]);
    let (_, site) = create_site(&services, &auth, "Dental Clinic").await;

    let review = create_review(&services, &auth, &site).await;
    let token = ShareToken::from_str(&review.share_token).unwrap();

    services
        .prospect_service
        .respond(
            &token,
            &social_forge_service::model::RespondRequest {
                approved: true,
                feedback: None,
            },
        )
        .await
        .unwrap();

    // a malformed requested domain is rejected without touching the review
    let bad = services
        .prospect_service
        .submit_details(
            &token,
            &social_forge_service::model::SubmitDetailsRequest {
                company_name: "Dental Clinic LLC".to_string(),
                requested_domain: Some("not a domain!".to_string()),
                prospect_phone: None,
            },
        )
        .await;
    assert!(matches!(bad, Err(ProspectReviewError::ArgValidation(_))));
    let reviews = services
        .prospect_service
        .list_reviews(&site.id, &auth)
        .await
        .unwrap();
    assert_eq!(reviews[0].status, ReviewStatus::Approved);

    // a requested custom domain parks the review until DNS is sorted out
    let preview = services
        .prospect_service
        .submit_details(
            &token,
            &social_forge_service::model::SubmitDetailsRequest {
                company_name: "Dental Clinic LLC".to_string(),
                requested_domain: Some("smile.example".to_string()),
                prospect_phone: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(preview.status, ReviewStatus::DetailsSubmitted);

    let site = services.site_service.get(&site.id, &auth).await.unwrap();
    assert_eq!(site.status, SiteStatus::ReadyForTransfer);

    let environments = services
        .site_service
        .get_environments(&site.id, &auth)
        .await
        .unwrap();
    let production = environments
        .iter()
        .find(|e| e.env_type == EnvironmentType::Production)
        .unwrap();
    let domains = services
        .domain_service
        .get_domains(&production.id, &auth)
        .await
        .unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].domain_name, "smile.example");
    assert!(domains[0].is_primary);

    // verifying the primary production domain takes the site live
    let verified = services
        .domain_service
        .verify_domain(&domains[0].id, &auth)
        .await
        .unwrap();
    assert_eq!(verified.status, DomainStatus::Active);

    let site = services.site_service.get(&site.id, &auth).await.unwrap();
    assert_eq!(site.status, SiteStatus::Live);
}

#[test]
pub async fn test_token_auth() {
    let db = SqliteDb::default();
    let services = make_services(&db, ReviewConfig::default()).await;

    let account = create_account(&services).await;

    let created = services
        .token_service
        .create(
            &account.id,
            &CreateTokenRequest {
                expires_at: Utc::now() + Duration::days(30),
            },
        )
        .await
        .unwrap();

    let auth = services
        .auth_service
        .authorization(&created.secret)
        .await
        .unwrap();
    assert_eq!(auth.account_id(), account.id);
    assert!(auth.has_role(&Role::Member));

    // token in the past can not be created
    let invalid = services
        .token_service
        .create(
            &account.id,
            &CreateTokenRequest {
                expires_at: Utc::now() - Duration::days(1),
            },
        )
        .await;
    assert!(matches!(invalid, Err(TokenServiceError::ArgValidation(_))));

    // unknown secrets are rejected
    let unknown = services
        .auth_service
        .authorization(&social_forge_service::model::TokenSecret::new_v4())
        .await;
    assert!(unknown.is_err());

    let listed = services.token_service.get_by_account(&account.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.data.id);

    // expired tokens are rejected even though the row still exists
    let token_repo = DbTokenRepo::new(sqlite_pool(&db).await);
    let expired_secret = Uuid::new_v4();
    token_repo
        .create(&TokenRecord {
            id: Uuid::new_v4(),
            account_id: account.id.0,
            secret: expired_secret,
            created_at: Utc::now() - Duration::days(2),
            expires_at: Utc::now() - Duration::days(1),
        })
        .await
        .unwrap();
    let expired = services
        .auth_service
        .authorization(&social_forge_service::model::TokenSecret::new(
            expired_secret,
        ))
        .await;
    assert!(expired.is_err());
}

#[test]
pub async fn test_dns_instructions_reach_contact_and_acting_user() {
    let db = SqliteDb::default();
    let services = make_services(&db, ReviewConfig::default()).await;

    let account = create_account(&services).await;
    let auth = create_auth(&account.id, vec![]);
    let (_, site) = create_site(&services, &auth, "Book Store").await;

    let environments = services
        .site_service
        .get_environments(&site.id, &auth)
        .await
        .unwrap();
    let production = environments
        .iter()
        .find(|e| e.env_type == EnvironmentType::Production)
        .unwrap();

    // same database, but with an email client we can observe
    let pool = sqlite_pool(&db).await;
    let email_client = Arc::new(RecordingEmailClient::default());
    let domain_service = DomainServiceDefault::new(
        Arc::new(DbDomainRepo::new(pool.clone())),
        Arc::new(DbSiteRepo::new(pool.clone())),
        Arc::new(DbWorkspaceRepo::new(pool.clone())),
        Arc::new(DbAccountRepo::new(pool.clone())),
        Arc::new(DisabledHostingProvider::default()),
        HostingConfig::Disabled,
        email_client.clone(),
    );

    domain_service
        .add_domain(&production.id, "books.example", true, &auth)
        .await
        .unwrap();

    let sent = wait_for_emails(&email_client, 2).await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.kind == "dns_instructions"));
    let recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
    assert!(recipients.contains(&"agency@social-forge.dev"));
    assert!(recipients.contains(&account.email.as_str()));
}

#[test]
pub async fn test_version_allocation_retries_after_concurrent_insert() {
    let db = SqliteDb::default();
    let services = make_services(&db, ReviewConfig::default()).await;

    let account = create_account(&services).await;
    let auth = create_auth(&account.id, vec![]);
    let (_, site) = create_site(&services, &auth, "Barber Shop").await;

    let v1 = services
        .site_service
        .create_version(&site.id, &CreateVersionRequest { label: None }, &auth)
        .await
        .unwrap();
    assert_eq!(v1.number, 1);

    // the stale read makes the service collide with v1 and re-read
    let pool = sqlite_pool(&db).await;
    let site_repo = Arc::new(StaleReadSiteRepo {
        inner: Arc::new(DbSiteRepo::new(pool.clone())),
        stale: AtomicBool::new(true),
    });
    let site_service = SiteServiceDefault::new(site_repo, Arc::new(DbWorkspaceRepo::new(pool)));

    let v2 = site_service
        .create_version(&site.id, &CreateVersionRequest { label: None }, &auth)
        .await
        .unwrap();
    assert_eq!(v2.number, 2);

    let versions = services
        .site_service
        .get_versions(&site.id, &auth)
        .await
        .unwrap();
    let mut numbers: Vec<i64> = versions.iter().map(|v| v.number).collect();
    numbers.sort();
    assert_eq!(numbers, vec![1, 2]);
}
