use std::sync::Arc;

use poem_openapi::param::Path;
use poem_openapi::payload::Json;
use poem_openapi::*;

use crate::api::ApiTags;
use crate::auth::ForgeSecurityScheme;
use crate::model::{
    AddDomainRequest, DeleteDomainResponse, DnsRecord, DomainId, EnvironmentId, ErrorBody,
    SetPrimaryDomainResponse, SiteDomain,
};
use crate::service::auth::{AuthService, AuthServiceError};
use crate::service::domain::{DomainError as DomainServiceError, DomainService};
use crate::SafeDisplay;

#[derive(ApiResponse)]
pub enum DomainError {
    /// Invalid request
    #[oai(status = 400)]
    BadRequest(Json<ErrorBody>),
    /// Unauthorized
    #[oai(status = 401)]
    Unauthorized(Json<ErrorBody>),
    /// Forbidden
    #[oai(status = 403)]
    Forbidden(Json<ErrorBody>),
    /// Domain not found
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// The request conflicts with the domain's current state
    #[oai(status = 409)]
    Conflict(Json<ErrorBody>),
    /// Internal server error
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

type Result<T> = std::result::Result<T, DomainError>;

impl From<AuthServiceError> for DomainError {
    fn from(value: AuthServiceError) -> Self {
        match value {
            AuthServiceError::InvalidToken(_) => DomainError::Unauthorized(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            AuthServiceError::Internal(_) => DomainError::InternalError(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
        }
    }
}

impl From<DomainServiceError> for DomainError {
    fn from(value: DomainServiceError) -> Self {
        match value {
            DomainServiceError::InvalidDomainName(_) | DomainServiceError::NoHostingProject => {
                DomainError::BadRequest(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
            DomainServiceError::DomainNotFound(_)
            | DomainServiceError::EnvironmentNotFound(_)
            | DomainServiceError::SiteNotFound(_) => DomainError::NotFound(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            DomainServiceError::DomainAlreadyExists(_)
            | DomainServiceError::InvalidDomainState(_) => DomainError::Conflict(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            DomainServiceError::Unauthorized(_) => DomainError::Forbidden(Json(ErrorBody {
                error: value.to_safe_string(),
            })),
            DomainServiceError::Provider(_)
            | DomainServiceError::Internal(_)
            | DomainServiceError::InternalRepoError(_) => {
                DomainError::InternalError(Json(ErrorBody {
                    error: value.to_safe_string(),
                }))
            }
        }
    }
}

pub struct DomainApi {
    pub auth_service: Arc<dyn AuthService + Send + Sync>,
    pub domain_service: Arc<dyn DomainService + Send + Sync>,
}

#[OpenApi(prefix_path = "/v1", tag = ApiTags::Domain)]
impl DomainApi {
    /// Attach a domain to an environment
    ///
    /// Registers the domain with the hosting provider and returns the DNS
    /// records the customer has to create.
    #[oai(
        path = "/environments/:environment_id/domains",
        method = "post",
        operation_id = "add_domain"
    )]
    async fn add_domain(
        &self,
        environment_id: Path<EnvironmentId>,
        request: Json<AddDomainRequest>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<SiteDomain>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let domain = self
            .domain_service
            .add_domain(
                &environment_id.0,
                &request.0.domain_name,
                request.0.is_primary.unwrap_or(false),
                &auth,
            )
            .await?;
        Ok(Json(domain))
    }

    /// Get all domains of an environment
    #[oai(
        path = "/environments/:environment_id/domains",
        method = "get",
        operation_id = "get_domains"
    )]
    async fn get_domains(
        &self,
        environment_id: Path<EnvironmentId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Vec<SiteDomain>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let domains = self
            .domain_service
            .get_domains(&environment_id.0, &auth)
            .await?;
        Ok(Json(domains))
    }

    /// Verify a domain
    ///
    /// Asks the hosting provider to check the customer's DNS setup and
    /// persists the result.
    #[oai(
        path = "/domains/:domain_id/verify",
        method = "post",
        operation_id = "verify_domain"
    )]
    async fn verify_domain(
        &self,
        domain_id: Path<DomainId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<SiteDomain>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let domain = self.domain_service.verify_domain(&domain_id.0, &auth).await?;
        Ok(Json(domain))
    }

    /// Refresh a domain's status
    ///
    /// Read-only provider status check, without triggering verification.
    #[oai(
        path = "/domains/:domain_id/refresh",
        method = "post",
        operation_id = "refresh_domain_status"
    )]
    async fn refresh_domain_status(
        &self,
        domain_id: Path<DomainId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<SiteDomain>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let domain = self
            .domain_service
            .refresh_status(&domain_id.0, &auth)
            .await?;
        Ok(Json(domain))
    }

    /// Get the DNS records of a domain
    #[oai(
        path = "/domains/:domain_id/dns-records",
        method = "get",
        operation_id = "get_domain_dns_records"
    )]
    async fn get_domain_dns_records(
        &self,
        domain_id: Path<DomainId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<Vec<DnsRecord>>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        let records = self
            .domain_service
            .get_dns_records(&domain_id.0, &auth)
            .await?;
        Ok(Json(records))
    }

    /// Make a domain the primary one of its environment
    #[oai(
        path = "/domains/:domain_id/primary",
        method = "post",
        operation_id = "set_primary_domain"
    )]
    async fn set_primary_domain(
        &self,
        domain_id: Path<DomainId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<SetPrimaryDomainResponse>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        self.domain_service.set_primary(&domain_id.0, &auth).await?;
        Ok(Json(SetPrimaryDomainResponse {}))
    }

    /// Remove a domain
    ///
    /// Detaches the domain from the hosting provider and marks it removed.
    #[oai(
        path = "/domains/:domain_id",
        method = "delete",
        operation_id = "delete_domain"
    )]
    async fn delete_domain(
        &self,
        domain_id: Path<DomainId>,
        token: ForgeSecurityScheme,
    ) -> Result<Json<DeleteDomainResponse>> {
        let auth = self.auth_service.authorization(token.as_ref()).await?;
        self.domain_service.remove_domain(&domain_id.0, &auth).await?;
        Ok(Json(DeleteDomainResponse {}))
    }
}
