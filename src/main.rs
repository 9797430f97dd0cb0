//! OpenAPI Deprecation Notify - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use openapi_deprecation_notify::event::HistoryRecord;
use openapi_deprecation_notify::http::ReqwestClient;
use openapi_deprecation_notify::{DeprecationConfig, DeprecationMonitor, OpenApiDocument};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "openapi-deprecation-notify",
    about = "Check a request against an OpenAPI document and report deprecations",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "deprecation-notify.yaml")]
    config: PathBuf,

    /// OpenAPI document (JSON or YAML)
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// Absolute request URL, including the query string
    #[arg(short, long)]
    url: Option<String>,

    /// HTTP method of the request
    #[arg(short, long, default_value = "GET")]
    method: String,

    /// Response header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Dispatch notifications to the configured sinks
    #[arg(long)]
    notify: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Print metrics in Prometheus text format before exiting
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print default config if requested
    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        DeprecationConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration with detection enabled");
        let mut config = DeprecationConfig::default();
        config.set_detection_enabled(true);
        config
    };

    // Validate and exit if requested
    if args.validate {
        config.validate()?;
        println!("Configuration is valid");
        return Ok(());
    }

    let spec = args.spec.context("--spec is required")?;
    let url = args.url.context("--url is required")?;
    let headers = parse_headers(&args.headers)?;

    let document = OpenApiDocument::from_file(&spec)
        .with_context(|| format!("Failed to load OpenAPI document {:?}", spec))?;

    let monitor = if args.notify {
        DeprecationMonitor::from_config(config, document, Arc::new(ReqwestClient::new()))?
    } else {
        DeprecationMonitor::new(config, document, Default::default())
    };

    let request = monitor.observe(&args.method, &url, headers)?;

    if args.notify {
        match monitor.process(&request).await? {
            Some(notification) => {
                let output = serde_json::json!({
                    "event": HistoryRecord::from(&notification.event),
                    "report": notification.report,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            None => println!("No deprecation detected"),
        }
    } else {
        match monitor.inspect(&request)? {
            Some(event) => {
                println!("{}", serde_json::to_string_pretty(&HistoryRecord::from(&event))?);
            }
            None => println!("No deprecation detected"),
        }
    }

    if args.metrics {
        print!("{}", monitor.metrics().encode());
    }

    Ok(())
}

/// Parse "Name: value" header arguments.
fn parse_headers(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|h| {
            let (name, value) = h
                .split_once(':')
                .with_context(|| format!("Invalid header {:?}, expected \"Name: value\"", h))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
