use std::sync::Arc;

use {
    actiongraph_config::AppConfig,
    actiongraph_graphql::{ComposedSchema, GraphqlTransport, Registry},
    axum::{
        Router,
        response::{IntoResponse, Json},
        routing::get,
    },
    tokio::{net::TcpListener, sync::RwLock},
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use crate::{
    error::{Error, Result},
    graphql_routes::{graphiql_handler, graphql_handler},
    i18n::Catalogs,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub schema: Arc<RwLock<ComposedSchema>>,
    pub transport: Arc<GraphqlTransport>,
    pub catalogs: Arc<Catalogs>,
}

impl AppState {
    /// Build the schema once. Any composition error aborts startup.
    pub async fn new(transport: GraphqlTransport, catalogs: Catalogs) -> Result<Self> {
        let schema = transport.build_schema().await?;
        Ok(Self {
            schema: Arc::new(RwLock::new(schema)),
            transport: Arc::new(transport),
            catalogs: Arc::new(catalogs),
        })
    }

    /// Rebuild from the registry and swap it in. The old schema keeps serving
    /// when the rebuild fails.
    pub async fn rebuild_schema(&self) -> Result<()> {
        let schema = self.transport.build_schema().await?;
        *self.schema.write().await = schema;
        info!("schema rebuilt");
        Ok(())
    }
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let options = state.transport.options();
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route(
            &options.endpoint,
            get(graphql_handler).post(graphql_handler),
        );

    if options.ui.enabled {
        router = router.route(&options.ui_path(), get(graphiql_handler));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Compose the schema for `registry` and serve it until Ctrl-C.
pub async fn start_gateway(config: &AppConfig, registry: Arc<Registry>) -> Result<()> {
    let transport = GraphqlTransport::new(config.graphql.clone(), registry);
    let state = AppState::new(transport, Catalogs::from_config(&config.i18n)).await?;

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| Error::Bind {
            addr: addr.clone(),
            source,
        })?;

    let local = listener.local_addr()?;
    info!(
        "graphql endpoint listening on http://{local}{}",
        config.graphql.endpoint
    );
    if config.graphql.ui.enabled {
        info!("graphql explorer on http://{local}{}", config.graphql.ui_path());
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
