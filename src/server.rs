use poem::listener::TcpListener;
use poem::middleware::{CookieJarManager, Cors};
use poem::EndpointExt;
use prometheus::Registry;
use social_forge_service::api::{self, make_open_api_service};
use social_forge_service::config::{make_config_loader, ForgeServiceConfig};
use social_forge_service::service::Services;
use social_forge_service::tracing::init_tracing_with_default_env_filter;
use social_forge_service::{db, metrics};
use std::sync::Arc;
use tracing::error;

fn main() -> Result<(), std::io::Error> {
    if std::env::args().any(|arg| arg == "--dump-openapi-yaml") {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(dump_openapi_yaml())
    } else if let Some(config) = make_config_loader().load_or_dump_config() {
        init_tracing_with_default_env_filter(&config.tracing);

        let prometheus = metrics::register_all();

        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(async_main(&config, prometheus))
    } else {
        Ok(())
    }
}

async fn dump_openapi_yaml() -> Result<(), std::io::Error> {
    let config = ForgeServiceConfig::default();
    let services = Services::new(&config).await.map_err(|e| {
        error!("Services - init error: {}", e);
        std::io::Error::other(e)
    })?;
    let open_api_service = make_open_api_service(&services);
    println!("{}", open_api_service.spec_yaml());
    Ok(())
}

async fn async_main(
    config: &ForgeServiceConfig,
    prometheus_registry: Registry,
) -> Result<(), std::io::Error> {
    let http_port = config.http_port;

    match config.db.clone() {
        social_forge_service::config::DbConfig::Postgres(c) => {
            db::postgres_migrate(&c, "./db/migration/postgres")
                .await
                .map_err(|e| {
                    error!("DB - init error: {}", e);
                    std::io::Error::other(format!("Init error: {e:?}"))
                })?;
        }
        social_forge_service::config::DbConfig::Sqlite(c) => {
            db::sqlite_migrate(&c, "./db/migration/sqlite")
                .await
                .map_err(|e| {
                    error!("DB - init error: {}", e);
                    std::io::Error::other(format!("Init error: {e:?}"))
                })?;
        }
    };

    let services = Services::new(config).await.map_err(|e| {
        error!("Services - init error: {}", e);
        std::io::Error::other(e)
    })?;

    for account in config.accounts.accounts.values() {
        services
            .account_service
            .create_initial_account(account)
            .await
            .map_err(|e| {
                error!("Account - init error: {}", e);
                std::io::Error::other("Account Error")
            })?;
    }

    tokio::spawn(services.review_sweeper.clone().run());

    let cors = Cors::new()
        .allow_origin_regex(&config.cors_origin_regex)
        .allow_credentials(true);

    let prometheus_registry = Arc::new(prometheus_registry);
    let app = api::combined_routes(prometheus_registry, &services)
        .with(CookieJarManager::new())
        .with(cors);

    poem::Server::new(TcpListener::bind(format!("0.0.0.0:{}", http_port)))
        .run(app)
        .await
}
