//! OpenTelemetry bridge for a validator node's Prometheus registry.
//!
//! While the local node is an active validator, this crate periodically
//! gathers the node's metrics registry and re-exports the values through
//! OTLP/HTTP to an external collector.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   Prometheus    │────>│  Scrape loop +  │────>│  OTLP Endpoint  │
//! │    registry     │     │   translator    │     │  (Collector)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! The scrape loop and the OTLP periodic reader tick on the same interval
//! but are not phase-locked; a value recorded right after a flush is pushed
//! with the following one.
//!
//! # Mapping
//!
//! - **Gauges and counters** are exported as gauges of their current value.
//! - **Histograms** are replayed as observations at bucket midpoints.
//! - **Summaries** become `<name>_sum`, `<name>_count` and a `<name>` gauge
//!   per quantile, tagged with `quantile`.
//!
//! Every data point carries a `moniker` attribute.
//!
//! # Configuration
//!
//! See [`config::OtelConfig`] for configuration options.

pub mod client;
pub mod config;
pub mod error;
pub mod exporter;
pub mod instruments;
pub mod metrics;
pub mod registry;
pub mod scraper;
pub mod validator;

pub use client::TelemetryClient;
pub use config::{ExporterConfig, OtelConfig};
pub use error::{GatherError, InstrumentError, TelemetryError};
pub use exporter::ScrapeStats;
pub use registry::{DefaultGatherer, MetricFamily, MetricsGatherer};
pub use validator::ValidatorInfo;
