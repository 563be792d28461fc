use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::model::Role;
use crate::tracing::TracingConfig;

const ENV_VAR_PREFIX: &str = "FORGE__";

pub type ConfigExample<T> = (&'static str, T);

pub trait HasConfigExamples<T> {
    fn examples() -> Vec<ConfigExample<T>>;
}

/// Loads the service configuration from an optional TOML file with
/// `FORGE__`-prefixed environment variable overrides, falling back to the
/// `Default` values for everything else.
pub struct ConfigLoader<T: Default + Serialize + DeserializeOwned> {
    pub config_file_name: PathBuf,
    examples: Vec<ConfigExample<T>>,
    phantom: PhantomData<T>,
}

impl<T: Default + Serialize + DeserializeOwned> ConfigLoader<T> {
    pub fn new(config_file_name: &Path) -> ConfigLoader<T> {
        ConfigLoader {
            config_file_name: config_file_name.to_path_buf(),
            examples: vec![],
            phantom: PhantomData,
        }
    }

    pub fn new_with_examples(config_file_name: &Path) -> ConfigLoader<T>
    where
        T: HasConfigExamples<T>,
    {
        ConfigLoader {
            config_file_name: config_file_name.to_path_buf(),
            examples: T::examples(),
            phantom: PhantomData,
        }
    }

    fn figment(&self) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(T::default()))
            .merge(Toml::file(self.config_file_name.clone()))
            .merge(Env::prefixed(ENV_VAR_PREFIX).split("__"))
    }

    pub fn load(&self) -> Result<T, figment::Error> {
        self.figment().extract()
    }

    /// Loads the configuration, unless `--dump-config` was passed on the
    /// command line, in which case the effective or example configuration is
    /// printed as TOML and `None` is returned.
    pub fn load_or_dump_config(&self) -> Option<T> {
        if std::env::args().any(|arg| arg == "--dump-config") {
            match self.load() {
                Ok(config) => {
                    println!(
                        "{}",
                        toml::to_string(&config).expect("Failed to serialize config")
                    );
                }
                Err(err) => {
                    eprintln!("Failed to load config: {err}");
                }
            }
            for (name, example) in &self.examples {
                println!("# Example: {name}");
                println!(
                    "{}",
                    toml::to_string(example).expect("Failed to serialize config example")
                );
            }
            None
        } else {
            match self.load() {
                Ok(config) => Some(config),
                Err(err) => {
                    eprintln!("Failed to load config: {err}");
                    None
                }
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbPostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub schema: Option<String>,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbSqliteConfig {
    pub database: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum DbConfig {
    Postgres(DbPostgresConfig),
    Sqlite(DbSqliteConfig),
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig::Sqlite(DbSqliteConfig {
            database: "../data/social-forge.sqlite".to_string(),
            max_connections: 10,
        })
    }
}

/// Hosting provider credentials. `Disabled` makes every provider call a
/// logged no-op, which is enough for local development.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum HostingConfig {
    Provider(HostingProviderConfig),
    Disabled,
}

impl Default for HostingConfig {
    fn default() -> Self {
        HostingConfig::Disabled
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostingProviderConfig {
    pub base_url: Url,
    pub api_token: String,
    /// Used when a site environment has no hosting project of its own.
    pub default_project_id: Option<String>,
    pub subdomain_suffix: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum EmailConfig {
    Provider(EmailProviderConfig),
    Disabled,
}

impl Default for EmailConfig {
    fn default() -> Self {
        EmailConfig::Disabled
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmailProviderConfig {
    pub base_url: Url,
    pub api_key: String,
    pub from_address: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Default review link lifetime when the request does not specify one.
    pub expiry_days: i64,
    /// How long a review stays in Deploying before the sweeper promotes it.
    #[serde(with = "humantime_serde")]
    pub promote_after: Duration,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            expiry_days: 14,
            promote_after: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub token: Uuid,
    pub role: Role,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountsConfig {
    pub accounts: HashMap<String, AccountConfig>,
}

impl Default for AccountsConfig {
    fn default() -> AccountsConfig {
        let mut accounts = HashMap::new();
        accounts.insert(
            "root".to_string(),
            AccountConfig {
                id: Uuid::parse_str("4a15bbbe-0a2a-4182-bb35-d2f4f9f70b36").expect("invalid UUID"),
                name: "Initial User".to_string(),
                email: "initial@user".to_string(),
                token: Uuid::parse_str("5c832d93-ff85-4a8f-9803-513950fdfdb1")
                    .expect("invalid UUID"),
                role: Role::Admin,
            },
        );
        AccountsConfig { accounts }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForgeServiceConfig {
    pub tracing: TracingConfig,
    pub environment: String,
    pub workspace: String,
    pub http_port: u16,
    pub db: DbConfig,
    pub hosting: HostingConfig,
    pub email: EmailConfig,
    pub review: ReviewConfig,
    pub accounts: AccountsConfig,
    /// Base URL prospect-facing links are built on.
    pub public_base_url: Url,
    pub cors_origin_regex: String,
}

impl Default for ForgeServiceConfig {
    fn default() -> Self {
        Self {
            tracing: TracingConfig::local_dev(),
            environment: "dev".to_string(),
            workspace: "it".to_string(),
            http_port: 8080,
            db: DbConfig::default(),
            hosting: HostingConfig::default(),
            email: EmailConfig::default(),
            review: ReviewConfig::default(),
            accounts: AccountsConfig::default(),
            public_base_url: Url::parse("http://localhost:8080").expect("invalid URL"),
            cors_origin_regex: "https://*.social-forge.dev".to_string(),
        }
    }
}

impl HasConfigExamples<ForgeServiceConfig> for ForgeServiceConfig {
    fn examples() -> Vec<ConfigExample<ForgeServiceConfig>> {
        vec![(
            "with postgres and hosting provider",
            Self {
                db: DbConfig::Postgres(DbPostgresConfig {
                    host: "localhost".to_string(),
                    port: 5432,
                    database: "social_forge".to_string(),
                    username: "postgres".to_string(),
                    password: "postgres".to_string(),
                    schema: Some("social_forge".to_string()),
                    max_connections: 10,
                }),
                hosting: HostingConfig::Provider(HostingProviderConfig {
                    base_url: Url::parse("https://api.hosting.example.com").expect("invalid URL"),
                    api_token: "token".to_string(),
                    default_project_id: Some("prj_default".to_string()),
                    subdomain_suffix: "sites.social-forge.dev".to_string(),
                    request_timeout: Duration::from_secs(10),
                }),
                ..Self::default()
            },
        )]
    }
}

pub fn make_config_loader() -> ConfigLoader<ForgeServiceConfig> {
    ConfigLoader::new_with_examples(&PathBuf::from("config/social-forge-service.toml"))
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use crate::config::make_config_loader;

    #[test]
    pub fn config_is_loadable() {
        make_config_loader().load().expect("Failed to load config");
    }
}
