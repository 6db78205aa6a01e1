//! Config schema types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub graphql: GraphqlConfig,
    pub i18n: I18nConfig,
    /// Controllers served by another GraphQL service and stitched in as-is.
    pub remote_controllers: Vec<RemoteControllerConfig>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 4000,
        }
    }
}

/// GraphQL transport options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphqlConfig {
    /// Optional instance name, shown in build logs when several transports
    /// run in one process.
    pub id: Option<String>,
    /// Path of the query endpoint.
    pub endpoint: String,
    pub ui: UiConfig,
    /// Replace every resolver with generated mock values.
    pub use_mocks: bool,
    /// Fail schema building when two actions bind the same resolver path
    /// instead of letting the last registration win.
    pub strict_resolver_paths: bool,
    /// How long a `pagination(key:)` field waits for its producer.
    pub pagination_timeout_secs: u64,
    pub remote_schema: RemoteSchemaOptions,
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            id: None,
            endpoint: "/graphql".into(),
            ui: UiConfig::default(),
            use_mocks: false,
            strict_resolver_paths: false,
            pagination_timeout_secs: 30,
            remote_schema: RemoteSchemaOptions::default(),
        }
    }
}

impl GraphqlConfig {
    /// Explorer path: the configured one, or `/ui` followed by the endpoint.
    #[must_use]
    pub fn ui_path(&self) -> String {
        self.ui
            .path
            .clone()
            .unwrap_or_else(|| format!("/ui{}", self.endpoint))
    }
}

/// Interactive query explorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub enabled: bool,
    pub path: Option<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// Options shared by every remote controller's HTTP fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSchemaOptions {
    pub timeout_secs: u64,
    /// Static headers sent with introspection and forwarded queries.
    pub headers: BTreeMap<String, String>,
}

impl Default for RemoteSchemaOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            headers: BTreeMap::new(),
        }
    }
}

/// Message catalogs used to localize error hashes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    pub default_locale: Option<String>,
    /// locale -> (hash -> message)
    pub catalogs: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteControllerConfig {
    pub id: String,
    pub uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_path_defaults_to_prefixed_endpoint() {
        let mut cfg = GraphqlConfig {
            endpoint: "/api/gql".into(),
            ..GraphqlConfig::default()
        };
        assert_eq!(cfg.ui_path(), "/ui/api/gql");

        cfg.ui.path = Some("/explorer".into());
        assert_eq!(cfg.ui_path(), "/explorer");
    }
}
