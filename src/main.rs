//! Service dispatch CLI
//!
//! Issues JSON calls against every discovered instance of a service through
//! the full resilience pipeline.
//!
//! # Architecture Overview
//!
//! ```text
//!   discovery (fixed list / watched file)
//!        │ Added / Removed
//!        ▼
//!   ┌──────────────┐   snapshot   ┌──────────────┐
//!   │ endpoint set │─────────────▶│   balancer   │
//!   └──────────────┘              └──────┬───────┘
//!                                        │ pick per attempt
//!                                        ▼
//!   call ──▶ retry dispatcher ──▶ trace ──▶ breaker ──▶ HTTP transport ──▶ instance
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;

use service_dispatch::config::validation::validate_config;
use service_dispatch::config::{load_config, ConfigError, DispatchConfig};
use service_dispatch::observability::{logging, metrics};
use service_dispatch::ServiceClient;

#[derive(Parser)]
#[command(name = "service-dispatch")]
#[command(about = "Resilient JSON calls against a discovered service", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Instance address; repeat for more (replaces configured instances)
    #[arg(short, long = "instance")]
    instances: Vec<String>,

    /// Operation name recorded in spans and metrics
    #[arg(short, long)]
    operation: Option<String>,

    /// Request path appended to each instance address
    #[arg(short, long)]
    path: Option<String>,

    /// JSON request body
    #[arg(short, long, default_value = "{}")]
    data: String,

    /// Number of calls to issue
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// How long to wait for discovery before the first call, in milliseconds
    #[arg(long, default_value_t = 2000)]
    wait_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    logging::init_logging(&config.observability);

    tracing::info!(
        service = %config.service.name,
        operation = %config.service.operation,
        instances = config.discovery.instances.len(),
        watch_file = ?config.discovery.watch_file,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let request: Value = serde_json::from_str(&cli.data)?;
    let client: ServiceClient<Value, Value> = ServiceClient::http(&config)?;

    if !client.wait_ready(Duration::from_millis(cli.wait_ms)).await {
        tracing::warn!("No endpoints discovered yet, calls will fail until one appears");
    }

    let mut failures = 0u32;
    for _ in 0..cli.count {
        match client.call(&request).await {
            Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
            Err(e) => {
                failures += 1;
                eprintln!("Error: {e}");
            }
        }
    }

    client.shutdown();
    tracing::info!(calls = cli.count, failures, "Done");

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Config file (or defaults) with command line overrides applied.
fn build_config(cli: &Cli) -> Result<DispatchConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DispatchConfig::default(),
    };

    if !cli.instances.is_empty() {
        config.discovery.instances = cli.instances.clone();
        config.discovery.watch_file = None;
    }
    if let Some(operation) = &cli.operation {
        config.service.operation = operation.clone();
    }
    if let Some(path) = &cli.path {
        config.transport.path = path.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
