//! Configuration loading and validation.
//!
//! Config files: `actiongraph.toml`, `actiongraph.yaml`, or `actiongraph.json`
//! Searched in `./` then `~/.config/actiongraph/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, load_config},
    schema::{
        AppConfig, GraphqlConfig, I18nConfig, RemoteControllerConfig, RemoteSchemaOptions,
        ServerConfig, UiConfig,
    },
    validate::{Diagnostic, Severity},
};
