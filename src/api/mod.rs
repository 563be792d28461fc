use std::ops::Deref;
use std::sync::Arc;

use poem::endpoint::PrometheusExporter;
use poem::Route;
use poem_openapi::{OpenApiService, Tags};
use prometheus::Registry;

use crate::service::Services;

mod domain;
mod healthcheck;
mod preview;
mod review;
mod site;
mod token;
mod workspace;

#[derive(Tags)]
enum ApiTags {
    /// Custom domain management for site environments.
    Domain,
    HealthCheck,
    /// Public, token-addressed endpoints used by prospects. No authentication.
    Preview,
    /// Prospect review lifecycle, driven by the workspace side.
    Review,
    /// Sites, their versions and environments.
    Site,
    /// API tokens for programmatic access.
    Token,
    Workspace,
}

pub fn combined_routes(prometheus_registry: Arc<Registry>, services: &Services) -> Route {
    let api_service = make_open_api_service(services);

    let ui = api_service.swagger_ui();
    let spec = api_service.spec_endpoint_yaml();
    let metrics = PrometheusExporter::new(prometheus_registry.deref().clone());

    Route::new()
        .nest("/", api_service)
        .nest("/docs", ui)
        .nest("/specs", spec)
        .nest("/metrics", metrics)
}

type ApiServices = (
    healthcheck::HealthcheckApi,
    workspace::WorkspaceApi,
    site::SiteApi,
    domain::DomainApi,
    review::ReviewApi,
    preview::PreviewApi,
    token::TokenApi,
);

pub fn make_open_api_service(services: &Services) -> OpenApiService<ApiServices, ()> {
    OpenApiService::new(
        (
            healthcheck::HealthcheckApi,
            workspace::WorkspaceApi {
                auth_service: services.auth_service.clone(),
                workspace_service: services.workspace_service.clone(),
            },
            site::SiteApi {
                auth_service: services.auth_service.clone(),
                site_service: services.site_service.clone(),
            },
            domain::DomainApi {
                auth_service: services.auth_service.clone(),
                domain_service: services.domain_service.clone(),
            },
            review::ReviewApi {
                auth_service: services.auth_service.clone(),
                prospect_service: services.prospect_service.clone(),
            },
            preview::PreviewApi {
                prospect_service: services.prospect_service.clone(),
            },
            token::TokenApi {
                auth_service: services.auth_service.clone(),
                token_service: services.token_service.clone(),
            },
        ),
        "Social Forge",
        env!("CARGO_PKG_VERSION"),
    )
}
