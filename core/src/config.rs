//! Client configuration.
//!
//! Defaults point at the production collection endpoint. Values can be
//! loaded from the environment or deserialized from any serde format; a
//! per-submission `endpoint` or `client_name` always wins over these.

use serde::Deserialize;

/// Production base URL for submissions.
pub const DEFAULT_ENDPOINT: &str = "https://api.statickit.com";

pub const ENDPOINT_VAR: &str = "STATICKIT_ENDPOINT";
pub const CLIENT_NAME_VAR: &str = "STATICKIT_CLIENT_NAME";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub endpoint: String,
    pub client_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client_name: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Read `STATICKIT_ENDPOINT` and `STATICKIT_CLIENT_NAME`, falling back
    /// to defaults for unset or empty variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| lookup(key).filter(|v: &String| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(endpoint) = present(ENDPOINT_VAR) {
            config.endpoint = endpoint;
        }
        config.client_name = present(CLIENT_NAME_VAR);
        config
    }
}
