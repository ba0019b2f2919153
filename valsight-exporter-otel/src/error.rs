//! Error types for the telemetry bridge.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by [`TelemetryClient::start`](crate::TelemetryClient::start).
///
/// None of these are fatal to the host process: a caller may log the error and
/// keep running without telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The OTLP client could not be constructed.
    #[error("OTLP exporter setup failed: {0}")]
    ExporterSetup(String),

    /// The configuration failed validation.
    #[error("Invalid telemetry configuration: {0}")]
    Config(#[from] ConfigError),

    /// `start` was called outside of a tokio runtime.
    #[error("No async runtime available: {0}")]
    Runtime(String),

    /// `start` was called while the scrape loop is already running.
    #[error("Telemetry exporter is already running")]
    AlreadyRunning,
}

/// The metrics registry could not produce a snapshot.
#[derive(Debug, Error)]
#[error("Failed to gather metrics: {0}")]
pub struct GatherError(pub String);

/// An export instrument could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstrumentError {
    #[error("Invalid instrument name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid histogram boundaries for '{name}': {reason}")]
    InvalidBoundaries { name: String, reason: String },
}
