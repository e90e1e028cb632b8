use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default session lifetime before a fresh authenticate call (30 minutes).
pub const DEFAULT_MAX_CONNECTION_AGE_SECS: u64 = 30 * 60;

/// Default name of the metadata field type marking enumerated-value fields.
pub const DEFAULT_PICKLIST_KEY: &str = "picklist";

/// Default remote API version.
pub const DEFAULT_API_VERSION: &str = "59.0";

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub instance_url: String,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("instance_url", &self.instance_url)
            .field("access_token", &"***")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Connection settings for one data source. Immutable once registered.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub credentials: Credentials,
    pub max_connection_age: Duration,
    pub picklist_key: String,
}

impl SessionConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            max_connection_age: Duration::from_secs(DEFAULT_MAX_CONNECTION_AGE_SECS),
            picklist_key: DEFAULT_PICKLIST_KEY.to_string(),
        }
    }

    pub fn with_max_connection_age(mut self, max_connection_age: Duration) -> Self {
        self.max_connection_age = max_connection_age;
        self
    }

    pub fn with_picklist_key(mut self, picklist_key: impl Into<String>) -> Self {
        self.picklist_key = picklist_key.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_masks_token() {
        let credentials = Credentials {
            instance_url: "https://example.my.salesforce.com".to_string(),
            access_token: "00Dxx!secret".to_string(),
            api_version: default_api_version(),
        };
        let printed = format!("{:?}", SessionConfig::new(credentials));
        assert!(printed.contains("***"));
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new(Credentials {
            instance_url: "https://example.my.salesforce.com".to_string(),
            access_token: "token".to_string(),
            api_version: default_api_version(),
        });
        assert_eq!(config.max_connection_age, Duration::from_secs(1800));
        assert_eq!(config.picklist_key, "picklist");
    }
}
