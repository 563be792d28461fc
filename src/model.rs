use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use poem_openapi::{Enum, Object};
use rand::distr::Alphanumeric;
use rand::Rng;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, FromRepr};
use uuid::Uuid;

macro_rules! newtype_uuid {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialOrd, Ord, Eq, Hash, PartialEq)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v4() -> $name {
                Self(Uuid::new_v4())
            }
        }

        impl TryFrom<&str> for $name {
            type Error = String;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                let uuid = Uuid::parse_str(value)
                    .map_err(|err| format!("Invalid {}: {err}", stringify!($name)))?;
                Ok(Self(uuid))
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::try_from(s)
            }
        }

        impl poem_openapi::types::Type for $name {
            const IS_REQUIRED: bool = true;
            type RawValueType = Self;
            type RawElementValueType = Self;

            fn name() -> std::borrow::Cow<'static, str> {
                std::borrow::Cow::from(format!("string({})", stringify!($name)))
            }

            fn schema_ref() -> poem_openapi::registry::MetaSchemaRef {
                poem_openapi::registry::MetaSchemaRef::Inline(Box::new(
                    poem_openapi::registry::MetaSchema::new_with_format("string", "uuid"),
                ))
            }

            fn as_raw_value(&self) -> Option<&Self::RawValueType> {
                Some(self)
            }

            fn raw_element_iter<'a>(
                &'a self,
            ) -> Box<dyn Iterator<Item = &'a Self::RawElementValueType> + 'a> {
                Box::new(self.as_raw_value().into_iter())
            }
        }

        impl poem_openapi::types::ParseFromParameter for $name {
            fn parse_from_parameter(value: &str) -> poem_openapi::types::ParseResult<Self> {
                Ok(Self(Uuid::from_str(value)?))
            }
        }

        impl poem_openapi::types::ParseFromJSON for $name {
            fn parse_from_json(
                value: Option<serde_json::Value>,
            ) -> poem_openapi::types::ParseResult<Self> {
                match value {
                    Some(serde_json::Value::String(s)) => Ok(Self(Uuid::from_str(&s)?)),
                    _ => Err(poem_openapi::types::ParseError::<$name>::custom(format!(
                        "Unexpected representation of {}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl poem_openapi::types::ToJSON for $name {
            fn to_json(&self) -> Option<serde_json::Value> {
                Some(serde_json::Value::String(self.0.to_string()))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", &self.0)
            }
        }
    };
}

newtype_uuid!(AccountId);
newtype_uuid!(TokenId);
newtype_uuid!(WorkspaceId);
newtype_uuid!(SiteId);
newtype_uuid!(EnvironmentId);
newtype_uuid!(DomainId);
newtype_uuid!(VersionId);
newtype_uuid!(DeploymentId);
newtype_uuid!(ReviewId);

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
pub struct TokenSecret {
    pub value: Uuid,
}

impl TokenSecret {
    pub fn new(value: Uuid) -> Self {
        Self { value }
    }

    pub fn new_v4() -> Self {
        Self {
            value: Uuid::new_v4(),
        }
    }
}

impl FromStr for TokenSecret {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(|err| format!("Invalid token: {err}"))?;
        Ok(Self { value: uuid })
    }
}

/// URL-safe token included in public prospect review links.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ShareToken(pub String);

impl ShareToken {
    pub fn generate() -> Self {
        let value: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Self(value)
    }
}

impl Display for ShareToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl FromStr for ShareToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 64 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            Err("Invalid share token".to_string())
        } else {
            Ok(Self(s.to_string()))
        }
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    serde::Serialize,
    serde::Deserialize,
    Enum,
    EnumIter,
    FromRepr,
)]
#[repr(i32)]
pub enum Role {
    Admin = 0,
    Member = 1,
}

impl Role {
    pub fn all() -> Vec<Role> {
        Role::iter().collect::<Vec<Role>>()
    }
}

impl From<Role> for i32 {
    fn from(value: Role) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for Role {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Role::from_repr(value).ok_or_else(|| format!("Invalid role: {}", value))
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Member => write!(f, "Member"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Member" => Ok(Role::Member),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    serde::Serialize,
    serde::Deserialize,
    Enum,
    EnumIter,
    FromRepr,
)]
#[repr(i32)]
pub enum WorkspaceRole {
    Owner = 0,
    Member = 1,
}

impl From<WorkspaceRole> for i32 {
    fn from(value: WorkspaceRole) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for WorkspaceRole {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        WorkspaceRole::from_repr(value).ok_or_else(|| format!("Invalid workspace role: {}", value))
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    serde::Serialize,
    serde::Deserialize,
    Enum,
    EnumIter,
    FromRepr,
)]
#[repr(i32)]
pub enum SiteStatus {
    Draft = 0,
    Review = 1,
    ReadyForTransfer = 2,
    Live = 3,
    Archived = 4,
}

impl From<SiteStatus> for i32 {
    fn from(value: SiteStatus) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for SiteStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        SiteStatus::from_repr(value).ok_or_else(|| format!("Invalid site status: {}", value))
    }
}

impl Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SiteStatus::Draft => write!(f, "Draft"),
            SiteStatus::Review => write!(f, "Review"),
            SiteStatus::ReadyForTransfer => write!(f, "ReadyForTransfer"),
            SiteStatus::Live => write!(f, "Live"),
            SiteStatus::Archived => write!(f, "Archived"),
        }
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    serde::Serialize,
    serde::Deserialize,
    Enum,
    EnumIter,
    FromRepr,
)]
#[repr(i32)]
pub enum EnvironmentType {
    Development = 0,
    Preview = 1,
    Production = 2,
}

impl From<EnvironmentType> for i32 {
    fn from(value: EnvironmentType) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for EnvironmentType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        EnvironmentType::from_repr(value)
            .ok_or_else(|| format!("Invalid environment type: {}", value))
    }
}

impl Display for EnvironmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EnvironmentType::Development => write!(f, "Development"),
            EnvironmentType::Preview => write!(f, "Preview"),
            EnvironmentType::Production => write!(f, "Production"),
        }
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    serde::Serialize,
    serde::Deserialize,
    Enum,
    EnumIter,
    FromRepr,
)]
#[repr(i32)]
pub enum DomainStatus {
    PendingVerification = 0,
    Verifying = 1,
    Active = 2,
    Failed = 3,
    Removed = 4,
}

impl From<DomainStatus> for i32 {
    fn from(value: DomainStatus) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for DomainStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        DomainStatus::from_repr(value).ok_or_else(|| format!("Invalid domain status: {}", value))
    }
}

impl Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DomainStatus::PendingVerification => write!(f, "PendingVerification"),
            DomainStatus::Verifying => write!(f, "Verifying"),
            DomainStatus::Active => write!(f, "Active"),
            DomainStatus::Failed => write!(f, "Failed"),
            DomainStatus::Removed => write!(f, "Removed"),
        }
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    serde::Serialize,
    serde::Deserialize,
    Enum,
    EnumIter,
    FromRepr,
)]
#[repr(i32)]
pub enum DeploymentStatus {
    Queued = 0,
    Building = 1,
    Deploying = 2,
    Ready = 3,
    Failed = 4,
}

impl From<DeploymentStatus> for i32 {
    fn from(value: DeploymentStatus) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for DeploymentStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        DeploymentStatus::from_repr(value)
            .ok_or_else(|| format!("Invalid deployment status: {}", value))
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Ord,
    PartialOrd,
    serde::Serialize,
    serde::Deserialize,
    Enum,
    EnumIter,
    FromRepr,
)]
#[repr(i32)]
pub enum ReviewStatus {
    Pending = 0,
    Viewed = 1,
    Approved = 2,
    Declined = 3,
    DetailsSubmitted = 4,
    Deploying = 5,
    Live = 6,
    Expired = 7,
}

impl ReviewStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReviewStatus::Declined | ReviewStatus::Live | ReviewStatus::Expired
        )
    }

    /// Statuses from which a prospect response (approve/decline) is accepted.
    pub fn can_respond(&self) -> bool {
        matches!(self, ReviewStatus::Pending | ReviewStatus::Viewed)
    }
}

impl From<ReviewStatus> for i32 {
    fn from(value: ReviewStatus) -> Self {
        value as i32
    }
}

impl TryFrom<i32> for ReviewStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        ReviewStatus::from_repr(value).ok_or_else(|| format!("Invalid review status: {}", value))
    }
}

impl Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "Pending"),
            ReviewStatus::Viewed => write!(f, "Viewed"),
            ReviewStatus::Approved => write!(f, "Approved"),
            ReviewStatus::Declined => write!(f, "Declined"),
            ReviewStatus::DetailsSubmitted => write!(f, "DetailsSubmitted"),
            ReviewStatus::Deploying => write!(f, "Deploying"),
            ReviewStatus::Live => write!(f, "Live"),
            ReviewStatus::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct AccountData {
    pub name: String,
    pub email: String,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Token {
    pub id: TokenId,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn admin() -> Self {
        Self {
            id: TokenId(Uuid::nil()),
            account_id: AccountId(Uuid::nil()),
            created_at: DateTime::<Utc>::MIN_UTC,
            expires_at: DateTime::<Utc>::MAX_UTC,
        }
    }
}

/// A freshly created token, the only time its secret is exposed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct UnsafeToken {
    pub data: Token,
    pub secret: TokenSecret,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub expires_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub contact_email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkspaceData {
    pub name: String,
    pub contact_email: String,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub account_id: AccountId,
    pub role: WorkspaceRole,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
pub struct AddMemberResponse {}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
pub struct ArchiveSiteResponse {}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Site {
    pub id: SiteId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub slug: String,
    pub status: SiteStatus,
    pub active_version_id: Option<VersionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct CreateSiteRequest {
    pub name: String,
    pub slug: Option<String>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SiteEnvironment {
    pub id: EnvironmentId,
    pub site_id: SiteId,
    pub env_type: EnvironmentType,
    pub hosting_project_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SiteVersion {
    pub id: VersionId,
    pub site_id: SiteId,
    pub number: i64,
    pub label: Option<String>,
    pub created_by: AccountId,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct CreateVersionRequest {
    pub label: Option<String>,
}

/// One DNS record the customer has to create at their DNS host.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DnsRecord {
    pub record_type: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SiteDomain {
    pub id: DomainId,
    pub environment_id: EnvironmentId,
    pub domain_name: String,
    pub is_primary: bool,
    pub status: DomainStatus,
    pub dns_records: Vec<DnsRecord>,
    pub verification_records: Vec<DnsRecord>,
    pub error_message: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct AddDomainRequest {
    pub domain_name: String,
    pub is_primary: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SiteDeployment {
    pub id: DeploymentId,
    pub environment_id: EnvironmentId,
    pub version_id: Option<VersionId>,
    pub status: DeploymentStatus,
    pub url: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ProspectReview {
    pub id: ReviewId,
    pub site_id: SiteId,
    pub share_token: String,
    pub prospect_email: String,
    pub prospect_name: Option<String>,
    pub prospect_phone: Option<String>,
    pub status: ReviewStatus,
    pub expires_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub company_name: Option<String>,
    pub requested_domain: Option<String>,
    pub deploy_started_at: Option<DateTime<Utc>>,
    pub created_by: AccountId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProspectReview {
    /// The status as the outside world should see it: a non-terminal review
    /// past its deadline is expired, regardless of what the row still says.
    pub fn effective_status(&self, now: DateTime<Utc>) -> ReviewStatus {
        if !self.status.is_terminal() && self.expires_at < now {
            ReviewStatus::Expired
        } else {
            self.status.clone()
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub prospect_email: String,
    pub prospect_name: Option<String>,
    pub prospect_phone: Option<String>,
    pub expires_in_days: Option<i64>,
}

/// What a prospect sees when opening a review link. Deliberately
/// excludes internal identifiers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ReviewPreview {
    pub site_name: String,
    pub status: ReviewStatus,
    pub prospect_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondRequest {
    pub approved: bool,
    pub feedback: Option<String>,
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize, Object,
)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SubmitDetailsRequest {
    pub company_name: String,
    pub requested_domain: Option<String>,
    pub prospect_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
#[oai(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
#[oai(rename_all = "camelCase")]
pub struct ErrorsBody {
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
pub struct HealthcheckResponse {}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
pub struct VersionInfo {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
pub struct DeleteTokenResponse {}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
pub struct DeleteDomainResponse {}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
pub struct SetPrimaryDomainResponse {}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Object)]
pub struct CancelReviewResponse {}

/// Derives a URL-safe slug from a site name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[test]
    fn review_status_roundtrip() {
        for status in ReviewStatus::iter() {
            let n: i32 = status.clone().into();
            assert_eq!(ReviewStatus::try_from(n), Ok(status));
        }
    }

    #[test]
    fn domain_status_roundtrip() {
        for status in DomainStatus::iter() {
            let n: i32 = status.clone().into();
            assert_eq!(DomainStatus::try_from(n), Ok(status));
        }
    }

    #[test]
    fn site_status_roundtrip() {
        for status in SiteStatus::iter() {
            let n: i32 = status.clone().into();
            assert_eq!(SiteStatus::try_from(n), Ok(status));
        }
    }

    #[test]
    fn share_tokens_are_url_safe() {
        let token = ShareToken::generate();
        assert_eq!(token.0.len(), 32);
        assert!(token.0.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(ShareToken::from_str(&token.0), Ok(token));
    }

    #[test]
    fn slugify_drops_punctuation() {
        assert_eq!(slugify("Acme & Sons, LLC"), "acme-sons-llc");
        assert_eq!(slugify("  Plain Name  "), "plain-name");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }

    #[test]
    fn effective_status_expires_non_terminal_reviews() {
        let now = Utc::now();
        let review = ProspectReview {
            id: ReviewId::new_v4(),
            site_id: SiteId::new_v4(),
            share_token: ShareToken::generate().0,
            prospect_email: "prospect@example.com".to_string(),
            prospect_name: None,
            prospect_phone: None,
            status: ReviewStatus::Viewed,
            expires_at: now - chrono::Duration::days(1),
            viewed_at: Some(now - chrono::Duration::days(2)),
            responded_at: None,
            feedback: None,
            company_name: None,
            requested_domain: None,
            deploy_started_at: None,
            created_by: AccountId::new_v4(),
            created_at: now - chrono::Duration::days(10),
            updated_at: now - chrono::Duration::days(2),
        };
        assert_eq!(review.effective_status(now), ReviewStatus::Expired);

        let declined = ProspectReview {
            status: ReviewStatus::Declined,
            ..review
        };
        assert_eq!(declined.effective_status(now), ReviewStatus::Declined);
    }
}
