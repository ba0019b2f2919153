//! OTLP exporter setup and management.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry_otlp::{MetricExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use tracing::{error, info};

use crate::config::OtelConfig;
use crate::error::TelemetryError;

/// Instrumentation scope name of every exported instrument.
pub const METER_NAME: &str = "valsight";

/// Hosts reached over plain HTTP when no credentials are configured.
const LOCAL_HOST_PREFIXES: &[&str] = &["localhost", "127.0.0.1", "host.docker.internal"];

/// Build the collector URL from `endpoint` and `url_path`.
///
/// An endpoint without a scheme gets `http://` for local collectors without
/// credentials and `https://` otherwise.
pub fn build_metrics_url(endpoint: &str, url_path: &str, has_credentials: bool) -> String {
    let base = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        let local = LOCAL_HOST_PREFIXES.iter().any(|p| endpoint.starts_with(p));
        let scheme = if local && !has_credentials {
            "http"
        } else {
            "https"
        };
        format!("{}://{}", scheme, endpoint)
    };

    let path = url_path.trim_start_matches('/');
    if path.is_empty() {
        return base;
    }

    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Value of the `Authorization` header for Basic auth.
pub fn basic_auth_header(user: &str, token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, token)))
}

/// HTTP headers sent with every export request.
///
/// Carries a Basic `Authorization` header only when both user and token are set.
pub fn build_export_headers(config: &OtelConfig) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if config.has_credentials() {
        headers.insert(
            "Authorization".to_string(),
            basic_auth_header(&config.user, &config.token),
        );
    }
    headers
}

/// Build resource attributes for the meter provider.
///
/// The service name is suffixed with the chain id when one is known.
pub fn build_resource_attributes(service_name: &str, chain_id: &str) -> Vec<KeyValue> {
    let service = if chain_id.is_empty() {
        service_name.to_string()
    } else {
        format!("{}.{}", service_name, chain_id)
    };

    vec![
        KeyValue::new("service.name", service),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]
}

/// Scrape loop statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    /// Ticks handled, including skipped ones.
    pub cycles: u64,
    /// Ticks skipped because the node was not a validator.
    pub cycles_skipped: u64,
    pub gather_errors: u64,
    pub families_processed: u64,
    pub points_recorded: u64,
    pub instruments_created: u64,
    pub instrument_errors: u64,
}

/// Push client: OTLP/HTTP metric exporter driven by a periodic reader.
///
/// The reader flushes on its own thread at the push interval, independently
/// of the scrape loop.
pub struct ExporterClient {
    meter_provider: SdkMeterProvider,
}

impl ExporterClient {
    /// Create the OTLP exporter and meter provider.
    pub fn new(config: &OtelConfig, chain_id: &str) -> Result<Self, TelemetryError> {
        let url = build_metrics_url(&config.endpoint, &config.url_path, config.has_credentials());

        info!(
            url = %url,
            authenticated = config.has_credentials(),
            interval_secs = config.push_interval_secs,
            "Initializing OTLP metrics exporter"
        );

        let headers = build_export_headers(config);

        let exporter = MetricExporter::builder()
            .with_http()
            .with_endpoint(url)
            .with_timeout(config.timeout())
            .with_headers(headers)
            .build()
            .map_err(|e| TelemetryError::ExporterSetup(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter)
            .with_interval(config.push_interval())
            .build();

        let resource = Resource::builder()
            .with_attributes(build_resource_attributes(&config.service_name, chain_id))
            .build();

        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader)
            .build();

        info!("Meter provider initialized");
        Ok(Self { meter_provider })
    }

    /// Meter every bridged instrument is created on.
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(METER_NAME)
    }

    /// Flush pending data and stop the periodic reader.
    pub fn shutdown(&self) {
        info!("Shutting down OTLP metrics exporter");

        if let Err(e) = self.meter_provider.shutdown() {
            error!("Error shutting down meter provider: {:?}", e);
        }
    }
}
