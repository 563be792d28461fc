use std::sync::Arc;

use crate::config::{DbConfig, EmailConfig, ForgeServiceConfig, HostingConfig};
use crate::db;
use crate::repo;

pub mod account;
pub mod auth;
pub mod domain;
pub mod email;
pub mod hosting;
pub mod prospect;
pub mod site;
pub mod sweeper;
pub mod token;
pub mod workspace;

#[derive(Clone)]
pub struct Services {
    pub auth_service: Arc<dyn auth::AuthService + Send + Sync>,
    pub account_service: Arc<dyn account::AccountService + Send + Sync>,
    pub token_service: Arc<dyn token::TokenService + Send + Sync>,
    pub workspace_service: Arc<dyn workspace::WorkspaceService + Send + Sync>,
    pub site_service: Arc<dyn site::SiteService + Send + Sync>,
    pub domain_service: Arc<dyn domain::DomainService + Send + Sync>,
    pub prospect_service: Arc<dyn prospect::ProspectReviewService + Send + Sync>,
    pub review_sweeper: Arc<sweeper::ReviewSweeper>,
}

impl Services {
    pub async fn new(config: &ForgeServiceConfig) -> Result<Self, String> {
        match config.db.clone() {
            DbConfig::Postgres(db_config) => {
                let db_pool = Arc::new(
                    db::create_postgres_pool(&db_config)
                        .await
                        .map_err(|e| e.to_string())?,
                );
                Self::make_with_db(config, db_pool)
            }
            DbConfig::Sqlite(db_config) => {
                let db_pool = Arc::new(
                    db::create_sqlite_pool(&db_config)
                        .await
                        .map_err(|e| e.to_string())?,
                );
                Self::make_with_db(config, db_pool)
            }
        }
    }

    fn make_with_db<DB>(
        config: &ForgeServiceConfig,
        db_pool: Arc<sqlx::Pool<DB>>,
    ) -> Result<Self, String>
    where
        DB: sqlx::Database,
        repo::account::DbAccountRepo<DB>: repo::account::AccountRepo,
        repo::token::DbTokenRepo<DB>: repo::token::TokenRepo,
        repo::workspace::DbWorkspaceRepo<DB>: repo::workspace::WorkspaceRepo,
        repo::site::DbSiteRepo<DB>: repo::site::SiteRepo,
        repo::domain::DbDomainRepo<DB>: repo::domain::DomainRepo,
        repo::prospect::DbProspectReviewRepo<DB>: repo::prospect::ProspectReviewRepo,
    {
        let account_repo: Arc<dyn repo::account::AccountRepo + Send + Sync> =
            Arc::new(repo::account::DbAccountRepo::new(db_pool.clone()));

        let token_repo: Arc<dyn repo::token::TokenRepo + Send + Sync> =
            Arc::new(repo::token::DbTokenRepo::new(db_pool.clone()));

        let workspace_repo: Arc<dyn repo::workspace::WorkspaceRepo + Send + Sync> =
            Arc::new(repo::workspace::DbWorkspaceRepo::new(db_pool.clone()));

        let site_repo: Arc<dyn repo::site::SiteRepo + Send + Sync> =
            Arc::new(repo::site::DbSiteRepo::new(db_pool.clone()));

        let domain_repo: Arc<dyn repo::domain::DomainRepo + Send + Sync> =
            Arc::new(repo::domain::DbDomainRepo::new(db_pool.clone()));

        let prospect_repo: Arc<dyn repo::prospect::ProspectReviewRepo + Send + Sync> =
            Arc::new(repo::prospect::DbProspectReviewRepo::new(db_pool.clone()));

        let hosting_provider: Arc<dyn hosting::HostingProvider + Send + Sync> =
            match &config.hosting {
                HostingConfig::Provider(provider_config) => Arc::new(
                    hosting::HttpHostingProvider::new(provider_config)
                        .map_err(|e| e.to_string())?,
                ),
                HostingConfig::Disabled => Arc::new(hosting::DisabledHostingProvider::default()),
            };

        let email_client: Arc<dyn email::EmailClient + Send + Sync> = match &config.email {
            EmailConfig::Provider(provider_config) => Arc::new(
                email::HttpEmailClient::new(provider_config).map_err(|e| e.to_string())?,
            ),
            EmailConfig::Disabled => Arc::new(email::DisabledEmailClient::default()),
        };

        let account_service: Arc<dyn account::AccountService + Send + Sync> = Arc::new(
            account::AccountServiceDefault::new(account_repo.clone(), token_repo.clone()),
        );

        let token_service: Arc<dyn token::TokenService + Send + Sync> = Arc::new(
            token::TokenServiceDefault::new(token_repo.clone(), account_repo.clone()),
        );

        let auth_service: Arc<dyn auth::AuthService + Send + Sync> = Arc::new(
            auth::AuthServiceDefault::new(token_repo.clone(), account_repo.clone()),
        );

        let workspace_service: Arc<dyn workspace::WorkspaceService + Send + Sync> =
            Arc::new(workspace::WorkspaceServiceDefault::new(
                workspace_repo.clone(),
                account_repo.clone(),
            ));

        let site_service: Arc<dyn site::SiteService + Send + Sync> = Arc::new(
            site::SiteServiceDefault::new(site_repo.clone(), workspace_repo.clone()),
        );

        let domain_service: Arc<dyn domain::DomainService + Send + Sync> =
            Arc::new(domain::DomainServiceDefault::new(
                domain_repo.clone(),
                site_repo.clone(),
                workspace_repo.clone(),
                account_repo.clone(),
                hosting_provider.clone(),
                config.hosting.clone(),
                email_client.clone(),
            ));

        let prospect_service: Arc<dyn prospect::ProspectReviewService + Send + Sync> =
            Arc::new(prospect::ProspectReviewServiceDefault::new(
                prospect_repo.clone(),
                site_repo.clone(),
                workspace_repo.clone(),
                domain_service.clone(),
                hosting_provider.clone(),
                config.hosting.clone(),
                email_client.clone(),
                config.review.clone(),
                config.public_base_url.clone(),
            ));

        let review_sweeper = Arc::new(sweeper::ReviewSweeper::new(
            prospect_repo.clone(),
            config.review.clone(),
        ));

        Ok(Self {
            auth_service,
            account_service,
            token_service,
            workspace_service,
            site_service,
            domain_service,
            prospect_service,
            review_sweeper,
        })
    }
}
