//! Gateway: HTTP binding for the composed actiongraph schema.
//!
//! Lifecycle:
//! 1. Build the schema from the registry (fatal on error)
//! 2. Bind the listener
//! 3. Serve the endpoint, the explorer UI and `/health`
//! 4. Stop on Ctrl-C
//!
//! Schema composition and execution live in `actiongraph-graphql`; this crate
//! only turns HTTP requests into request contexts.

pub mod error;
pub mod graphql_routes;
pub mod i18n;
pub mod server;

pub use {
    error::{Error, Result},
    i18n::{CatalogLocalizer, Catalogs},
    server::{AppState, build_router, start_gateway},
};
