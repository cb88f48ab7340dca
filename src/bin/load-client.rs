use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use load_harness::client::{ApiRequester, LoadDriver};
use load_harness::config::validation::validate_config;
use load_harness::config::{load_or_default, ConfigError};
use load_harness::lifecycle::{spawn_signal_listener, Shutdown};
use load_harness::observability::logging::init_logging;
use load_harness::observability::metrics::init_metrics;
use load_harness::observability::{Counters, MetricsSink, NoopSink, RecorderSink};

#[derive(Parser)]
#[command(name = "load-client")]
#[command(about = "Drive load against the harness server through a circuit breaker", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the target base URL
    #[arg(short, long)]
    target: Option<String>,

    /// Number of requests to submit
    #[arg(short = 'n', long)]
    requests: Option<u64>,

    /// Delay between submissions in milliseconds
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(target) = cli.target {
        config.client.target_url = target;
    }
    if let Some(requests) = cli.requests {
        config.client.total_requests = requests;
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.client.submit_interval_ms = interval_ms;
    }
    if let Some(addr) = cli.metrics_address {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = addr.to_string();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability);

    let sink: Arc<dyn MetricsSink> = if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                init_metrics(addr);
                Arc::new(RecorderSink)
            }
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
                Arc::new(NoopSink)
            }
        }
    } else {
        Arc::new(NoopSink)
    };
    let counters = Arc::new(Counters::new(sink));

    let requester = Arc::new(ApiRequester::from_config(&config, counters.clone())?);
    let driver = LoadDriver::new(config.client.clone(), requester, counters);
    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);
    let report = driver.run_until(shutdown.subscribe()).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
