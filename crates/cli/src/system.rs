//! Built-in `system` controller.

use std::time::Instant;

use {
    actiongraph_graphql::{Registry, RegistryBuilder, action_fn},
    serde_json::json,
};

pub const CONTROLLER_ID: &str = "system";

const TYPE_DEFS: &str = "\
type Query {
  health: Health!
}

type Health {
  status: String!
  version: String!
  uptimeSecs: Int!
}
";

/// Registry with the `system` controller and one remote controller per
/// configured entry.
pub fn registry(config: &actiongraph_config::AppConfig) -> anyhow::Result<Registry> {
    let mut builder = Registry::builder();
    register(&mut builder)?;
    for remote in &config.remote_controllers {
        builder.register_remote_controller(&remote.id, remote.uri.as_str())?;
    }
    Ok(builder.build())
}

pub fn register(builder: &mut RegistryBuilder) -> actiongraph_graphql::error::Result<()> {
    let started = Instant::now();
    builder
        .register_controller(CONTROLLER_ID, TYPE_DEFS)?
        .register_action(
            CONTROLLER_ID,
            "health",
            action_fn(move |_, _| async move {
                Ok(json!({
                    "status": "ok",
                    "version": env!("CARGO_PKG_VERSION"),
                    "uptimeSecs": started.elapsed().as_secs(),
                }))
            }),
            "Query.health",
        )?;
    Ok(())
}
