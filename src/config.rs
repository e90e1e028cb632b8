use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::AdapterError;
use crate::models::{
    CollectionDescriptor, Credentials, FieldDefinition, SessionConfig, DEFAULT_API_VERSION,
    DEFAULT_MAX_CONNECTION_AGE_SECS, DEFAULT_PICKLIST_KEY,
};

/// Default configuration file, read when `CRM_ADAPTER_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "adapter.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub adapter: AdapterDefaults,
    #[serde(default)]
    pub sources: Vec<SourceSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Defaults applied to every source that does not override them
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterDefaults {
    pub max_connection_age_secs: u64,
    pub picklist_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub identity: String,
    pub instance_url: String,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub max_connection_age_secs: Option<u64>,
    #[serde(default)]
    pub picklist_key: Option<String>,
    #[serde(default)]
    pub collections: Vec<CollectionSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl SourceSettings {
    /// Build the session config and validated collection descriptors for registration
    pub fn to_registration(
        &self,
        defaults: &AdapterDefaults,
    ) -> Result<(SessionConfig, Vec<CollectionDescriptor>), AdapterError> {
        let credentials = Credentials {
            instance_url: self.instance_url.clone(),
            access_token: self.access_token.clone(),
            api_version: self.api_version.clone(),
        };

        let config = SessionConfig::new(credentials)
            .with_max_connection_age(Duration::from_secs(
                self.max_connection_age_secs
                    .unwrap_or(defaults.max_connection_age_secs),
            ))
            .with_picklist_key(
                self.picklist_key
                    .clone()
                    .unwrap_or_else(|| defaults.picklist_key.clone()),
            );

        let collections = self
            .collections
            .iter()
            .map(|c| CollectionDescriptor::new(c.name.clone(), c.fields.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((config, collections))
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let path = env::var("CRM_ADAPTER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load(Path::new(&path))
    }

    /// Defaults, then the file at `path` if it exists, then environment overrides
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("adapter.max_connection_age_secs", DEFAULT_MAX_CONNECTION_AGE_SECS)?
            .set_default("adapter.picklist_key", DEFAULT_PICKLIST_KEY)?
            .add_source(config::File::from(path).required(false));

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
