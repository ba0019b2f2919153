//! Scrape loop: periodically replays the registry onto export instruments.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

use crate::exporter::ScrapeStats;
use crate::instruments::InstrumentFactory;
use crate::metrics::MetricRecorder;
use crate::registry::MetricsGatherer;
use crate::validator::ValidatorInfo;

/// Result of a single scrape cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The node is not a validator; the registry was not read.
    Skipped,
    /// The registry could not be gathered; nothing was recorded.
    GatherFailed,
    Completed { families: u64, points: u64 },
}

/// Drives the registry → instrument translation on every tick.
pub struct Scraper<F: InstrumentFactory> {
    gatherer: Arc<dyn MetricsGatherer>,
    validator: Arc<ValidatorInfo>,
    recorder: MetricRecorder<F>,
    stats: Arc<RwLock<ScrapeStats>>,
}

impl<F: InstrumentFactory> Scraper<F> {
    /// Create a scraper recording through `factory`.
    pub fn new(
        gatherer: Arc<dyn MetricsGatherer>,
        validator: Arc<ValidatorInfo>,
        factory: F,
        stats: Arc<RwLock<ScrapeStats>>,
    ) -> Self {
        let recorder = MetricRecorder::new(
            factory,
            validator.moniker.clone(),
            validator.chain_id.clone(),
        );

        Self {
            gatherer,
            validator,
            recorder,
            stats,
        }
    }

    pub fn recorder(&self) -> &MetricRecorder<F> {
        &self.recorder
    }

    /// Run one scrape cycle.
    pub fn scrape_once(&mut self) -> CycleOutcome {
        self.stats.write().cycles += 1;

        if !self.validator.is_validator() {
            trace!("Not a validator, skipping scrape");
            self.stats.write().cycles_skipped += 1;
            return CycleOutcome::Skipped;
        }

        let families = match self.gatherer.gather() {
            Ok(families) => families,
            Err(e) => {
                debug!(error = %e, "Failed to gather metrics");
                self.stats.write().gather_errors += 1;
                return CycleOutcome::GatherFailed;
            }
        };

        let mut points = 0;
        let mut created = 0;
        let mut errors = 0;

        for family in &families {
            let outcome = self.recorder.record_family(family);
            points += outcome.points_recorded;
            created += outcome.instruments_created;
            errors += outcome.instrument_errors;
        }

        let family_count = families.len() as u64;
        {
            let mut stats = self.stats.write();
            stats.families_processed += family_count;
            stats.points_recorded += points;
            stats.instruments_created += created;
            stats.instrument_errors += errors;
        }

        trace!(
            families = family_count,
            points = points,
            instrument_errors = errors,
            "Scrape cycle complete"
        );

        CycleOutcome::Completed {
            families: family_count,
            points,
        }
    }

    /// Scrape every `period` until the shutdown signal is received.
    ///
    /// The first scrape happens one period after start. A dropped shutdown
    /// sender also stops the loop.
    ///
    /// Each cycle runs on the blocking pool: histogram replay is proportional
    /// to the observation count and must not stall the runtime's workers.
    /// A panicking cycle stops the loop.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = period.as_secs_f64(),
            moniker = %self.validator.moniker,
            "Scrape loop started"
        );

        let mut scraper = self;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping scrape loop");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let cycle = tokio::task::spawn_blocking(move || {
                        scraper.scrape_once();
                        scraper
                    });
                    match cycle.await {
                        Ok(returned) => scraper = returned,
                        Err(e) => {
                            error!(error = %e, "Scrape cycle failed, stopping scrape loop");
                            return;
                        }
                    }
                }
            }
        }

        info!("Scrape loop stopped");
    }
}
