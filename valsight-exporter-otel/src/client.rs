//! Client facade owning configuration, validator identity and lifecycle.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OtelConfig;
use crate::error::TelemetryError;
use crate::exporter::{ExporterClient, ScrapeStats};
use crate::instruments::OtelInstruments;
use crate::registry::{DefaultGatherer, MetricsGatherer};
use crate::scraper::Scraper;
use crate::validator::ValidatorInfo;

/// Running scrape loop plus the push client it records into.
struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    exporter: ExporterClient,
}

/// Entry point held by the rest of the process.
///
/// ```ignore
/// let client = TelemetryClient::new(config, ValidatorInfo::new("my-node", address));
/// client.start()?;
/// // from the block-processing path
/// client.set_validator_status(true);
/// // on shutdown
/// client.stop().await;
/// ```
pub struct TelemetryClient {
    config: OtelConfig,
    validator: Arc<ValidatorInfo>,
    gatherer: Arc<dyn MetricsGatherer>,
    stats: Arc<RwLock<ScrapeStats>>,
    worker: Mutex<Option<Worker>>,
}

impl TelemetryClient {
    /// Create a client reading the process-wide default Prometheus registry.
    pub fn new(config: OtelConfig, validator: ValidatorInfo) -> Self {
        Self::with_gatherer(config, validator, DefaultGatherer)
    }

    /// Create a client reading from a custom gatherer.
    ///
    /// An empty moniker is replaced by `UNKNOWN-<uuid>`.
    pub fn with_gatherer(
        config: OtelConfig,
        mut validator: ValidatorInfo,
        gatherer: impl MetricsGatherer,
    ) -> Self {
        validator.ensure_moniker();

        Self {
            config,
            validator: Arc::new(validator),
            gatherer: Arc::new(gatherer),
            stats: Arc::new(RwLock::new(ScrapeStats::default())),
            worker: Mutex::new(None),
        }
    }

    /// Start the push client and the scrape loop.
    ///
    /// Does nothing when the exporter is disabled. Must be called from within
    /// a tokio runtime.
    pub fn start(&self) -> Result<(), TelemetryError> {
        if self.config.disabled {
            debug!("OTLP exporter is disabled");
            return Ok(());
        }

        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(TelemetryError::AlreadyRunning);
        }

        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TelemetryError::Runtime(e.to_string()))?;

        debug!("Starting OTLP exporter");
        // The blocking HTTP client cannot be built on a runtime thread.
        let exporter = std::thread::scope(|s| {
            s.spawn(|| ExporterClient::new(&self.config, &self.validator.chain_id))
                .join()
        })
        .map_err(|_| {
            TelemetryError::ExporterSetup("exporter setup thread panicked".to_string())
        })??;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scraper = Scraper::new(
            self.gatherer.clone(),
            self.validator.clone(),
            OtelInstruments::new(exporter.meter()),
            self.stats.clone(),
        );
        let handle = runtime.spawn(scraper.run(self.config.push_interval(), shutdown_rx));

        *worker = Some(Worker {
            shutdown: shutdown_tx,
            handle,
            exporter,
        });

        info!(
            moniker = %self.validator.moniker,
            endpoint = %self.config.endpoint,
            "Telemetry exporter started"
        );
        Ok(())
    }

    /// Stop the scrape loop and flush the push client.
    ///
    /// Safe to call when not running.
    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return;
        };

        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "Scrape loop terminated abnormally");
        }

        // Shutdown flushes over the network and blocks.
        let exporter = worker.exporter;
        if let Err(e) = tokio::task::spawn_blocking(move || exporter.shutdown()).await {
            warn!(error = %e, "Exporter shutdown task failed");
        }

        info!("Telemetry exporter stopped");
    }

    /// Update the validator role; takes effect on the next scrape.
    pub fn set_validator_status(&self, is_validator: bool) {
        self.validator.set_validator(is_validator);
    }

    pub fn is_validator(&self) -> bool {
        self.validator.is_validator()
    }

    pub fn validator_address(&self) -> &[u8] {
        &self.validator.address
    }

    pub fn moniker(&self) -> &str {
        &self.validator.moniker
    }

    pub fn chain_id(&self) -> &str {
        &self.validator.chain_id
    }

    pub fn config(&self) -> &OtelConfig {
        &self.config
    }

    /// Whether export is configured on.
    pub fn is_enabled(&self) -> bool {
        !self.config.disabled
    }

    /// Whether the scrape loop is running.
    ///
    /// False once the loop has exited on its own, even before `stop`.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Snapshot of the scrape statistics.
    pub fn stats(&self) -> ScrapeStats {
        self.stats.read().clone()
    }
}

impl Drop for TelemetryClient {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            let _ = worker.shutdown.send(true);
        }
    }
}
