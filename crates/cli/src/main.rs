mod config_commands;
mod system;

use std::{path::PathBuf, sync::Arc};

use {
    actiongraph_config::{AppConfig, validate},
    actiongraph_graphql::GraphqlTransport,
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "actiongraph", about = "actiongraph: GraphQL gateway for action controllers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (skips discovery in ./ and the user config dir).
    #[arg(long, global = true, env = "ACTIONGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Answer every field with generated mock values.
    #[arg(long, global = true, default_value_t = false)]
    mocks: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the GraphQL server (default when no subcommand is provided).
    Serve,
    /// Build the merged schema and print it as SDL.
    PrintSchema,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config file, then apply CLI overrides.
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match cli.config {
        Some(ref path) => actiongraph_config::load_config(path)?,
        None => actiongraph_config::discover_and_load()?,
    };
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.mocks {
        config.graphql.use_mocks = true;
    }
    Ok(config)
}

/// Log every diagnostic; refuse to continue on errors.
fn ensure_valid(config: &AppConfig) -> anyhow::Result<()> {
    let diagnostics = validate::validate(config);
    for d in &diagnostics {
        if d.is_error() {
            tracing::error!(path = %d.path, "{}", d.message);
        } else {
            warn!(path = %d.path, "{}", d.message);
        }
    }
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    if errors > 0 {
        anyhow::bail!("invalid configuration ({errors} error(s)), see `actiongraph config check`");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Serve) => {
            info!(version = env!("CARGO_PKG_VERSION"), "actiongraph starting");
            ensure_valid(&config)?;
            let registry = Arc::new(system::registry(&config)?);
            actiongraph_gateway::start_gateway(&config, registry).await?;
            Ok(())
        },
        Some(Commands::PrintSchema) => {
            ensure_valid(&config)?;
            let registry = Arc::new(system::registry(&config)?);
            let schema = GraphqlTransport::new(config.graphql.clone(), registry)
                .build_schema()
                .await?;
            println!("{}", schema.sdl());
            Ok(())
        },
        Some(Commands::Config { action }) => config_commands::handle_config(action, &config),
    }
}
