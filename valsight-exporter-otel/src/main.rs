//! Standalone validator telemetry bridge.
//!
//! Pushes this process's default Prometheus registry to an OTLP collector.
//! Mostly useful for checking a collector setup end to end.

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info};

use valsight_exporter_otel::{ExporterConfig, TelemetryClient, ValidatorInfo};

/// Validator telemetry bridge.
#[derive(Parser, Debug)]
#[command(name = "valsight-exporter-otel")]
#[command(about = "Export a validator's Prometheus metrics via OpenTelemetry OTLP")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// OTLP endpoint (overrides config).
    #[arg(long)]
    endpoint: Option<String>,

    /// Log level (overrides config).
    #[arg(long)]
    log_level: Option<String>,

    /// Node moniker; generated when omitted.
    #[arg(long, default_value = "")]
    moniker: String,

    /// Chain identifier attached to every data point.
    #[arg(long, default_value = "")]
    chain_id: String,

    /// Treat this node as an active validator from startup.
    #[arg(long)]
    validator: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    if let Some(endpoint) = args.endpoint {
        config.opentelemetry.endpoint = endpoint;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    valsight_common::init_tracing(&config.logging)?;

    info!("Starting validator telemetry bridge");
    info!(
        endpoint = %config.opentelemetry.endpoint,
        url_path = %config.opentelemetry.url_path,
        disabled = config.opentelemetry.disabled,
        push_interval_secs = config.opentelemetry.push_interval_secs,
        "Configuration loaded"
    );

    let uptime = prometheus::Gauge::new("valsight_uptime_seconds", "Bridge uptime in seconds")?;
    prometheus::register(Box::new(uptime.clone()))?;

    let validator = ValidatorInfo::new(args.moniker, Vec::new())
        .with_chain_id(args.chain_id)
        .with_validator(args.validator);
    let client = TelemetryClient::new(config.opentelemetry.clone(), validator);

    if let Err(e) = client.start() {
        error!("Telemetry disabled: {}", e);
    }

    let started = Instant::now();
    let uptime_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            uptime.set(started.elapsed().as_secs_f64());
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    uptime_task.abort();
    client.stop().await;

    let stats = client.stats();
    info!(
        cycles = stats.cycles,
        cycles_skipped = stats.cycles_skipped,
        points_recorded = stats.points_recorded,
        instrument_errors = stats.instrument_errors,
        "Final statistics"
    );

    info!("Bridge stopped");
    Ok(())
}
