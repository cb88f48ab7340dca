//! Load harness server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────┐
//!                     │                HARNESS SERVER                  │
//!   GET /json         │  ┌─────────┐    ┌───────────┐    ┌──────────┐ │
//!   ──────────────────┼─▶│  http   │───▶│ admission │───▶│   work   │ │
//!                     │  │ server  │    │   queue   │    │dispatcher│ │
//!                     │  └─────────┘    └─────┬─────┘    └────┬─────┘ │
//!   503 overloaded    │                       │ full          │       │
//!   ◀─────────────────┼───────────────────────┘               │       │
//!   200 receipt       │                                       │       │
//!   ◀─────────────────┼───────────────────────────────────────┘       │
//!                     │                                               │
//!                     │  /prometheus  /stats  /health                 │
//!                     └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use load_harness::config::validation::validate_config;
use load_harness::config::{load_or_default, ConfigError};
use load_harness::lifecycle::{spawn_signal_listener, Shutdown};
use load_harness::observability::logging::init_logging;
use load_harness::HttpServer;

#[derive(Parser)]
#[command(name = "load-harness")]
#[command(about = "CPU-bound HTTP server with optional load shedding", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable admission-queue load shedding
    #[arg(long)]
    shed_load: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if cli.shed_load {
        config.server.load_shedding = true;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability);
    tracing::info!("load-harness v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        worker_threads = config.server.worker_threads,
        admission_capacity = config.server.admission_capacity,
        load_shedding = config.server.load_shedding,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
