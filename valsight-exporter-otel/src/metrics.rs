//! Mapping from registry snapshots to OpenTelemetry instrument recordings.
//!
//! Gauges and counters become gauge recordings of their current value.
//! Histograms are replayed as individual observations at bucket midpoints,
//! which keeps per-bucket counts exact but loses intra-bucket precision.
//! Summaries are flattened into `_sum`, `_count` and one quantile gauge
//! distinguished by a `quantile` attribute.

use opentelemetry::KeyValue;
use tracing::{debug, trace};

use crate::instruments::{
    CachedHistogram, GaugeInstrument, HistogramInstrument, InstrumentCache, InstrumentFactory,
};
use crate::registry::{Bucket, HistogramSnapshot, MetricFamily, SampleValue, SummarySnapshot};

/// Attribute key identifying the node.
pub const MONIKER_KEY: &str = "moniker";
/// Attribute key for the chain identifier.
pub const CHAIN_ID_KEY: &str = "chain_id";
/// Attribute key distinguishing summary quantiles.
pub const QUANTILE_KEY: &str = "quantile";

/// Build the attribute set shared by every data point of a sample.
///
/// Order: moniker, chain id (when set), then the sample's own labels.
pub fn build_metric_attributes(
    moniker: &str,
    chain_id: &str,
    labels: &[(String, String)],
) -> Vec<KeyValue> {
    let mut attrs = Vec::with_capacity(2 + labels.len());

    attrs.push(KeyValue::new(MONIKER_KEY, moniker.to_string()));

    if !chain_id.is_empty() {
        attrs.push(KeyValue::new(CHAIN_ID_KEY, chain_id.to_string()));
    }

    for (k, v) in labels {
        attrs.push(KeyValue::new(k.clone(), v.clone()));
    }

    attrs
}

/// Finite upper bounds of a histogram, in registry order.
///
/// The `+Inf` bucket closes the last interval but is not a boundary.
pub fn histogram_boundaries(buckets: &[Bucket]) -> Vec<f64> {
    buckets
        .iter()
        .map(|b| b.upper_bound)
        .filter(|bound| bound.is_finite())
        .collect()
}

/// Observations reconstructed for one finite bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketObservations {
    /// Value every observation of the bucket is recorded at.
    pub midpoint: f64,
    /// Observations that fell into this bucket alone.
    pub count: u64,
}

/// De-accumulate cumulative bucket counts and place them at bucket midpoints.
///
/// The first bucket spans `[0, bound]`. Observations counted only by the
/// `+Inf` bucket have no finite midpoint and are not reconstructed.
pub fn bucket_observations(buckets: &[Bucket]) -> Vec<BucketObservations> {
    let mut observations = Vec::with_capacity(buckets.len());
    let mut prev_bound: Option<f64> = None;
    let mut prev_count = 0u64;

    for bucket in buckets.iter().filter(|b| b.upper_bound.is_finite()) {
        let midpoint = match prev_bound {
            None => bucket.upper_bound / 2.0,
            Some(lower) => (lower + bucket.upper_bound) / 2.0,
        };
        // Saturate so a malformed snapshot cannot underflow.
        let count = bucket.cumulative_count.saturating_sub(prev_count);

        observations.push(BucketObservations { midpoint, count });

        prev_bound = Some(bucket.upper_bound);
        prev_count = bucket.cumulative_count;
    }

    observations
}

/// Decimal label of a quantile, e.g. `0.95`.
pub fn quantile_label(quantile: f64) -> String {
    quantile.to_string()
}

/// Counts produced by recording one metric family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FamilyOutcome {
    pub points_recorded: u64,
    pub instruments_created: u64,
    pub instrument_errors: u64,
}

impl FamilyOutcome {
    fn merge(&mut self, other: FamilyOutcome) {
        self.points_recorded += other.points_recorded;
        self.instruments_created += other.instruments_created;
        self.instrument_errors += other.instrument_errors;
    }
}

/// Records metric families on cached instruments.
///
/// Each metric name gets at most one gauge and one histogram handle for the
/// lifetime of the recorder.
pub struct MetricRecorder<F: InstrumentFactory> {
    factory: F,
    moniker: String,
    chain_id: String,
    gauges: InstrumentCache<F::Gauge>,
    histograms: InstrumentCache<CachedHistogram<F::Histogram>>,
}

impl<F: InstrumentFactory> MetricRecorder<F> {
    pub fn new(factory: F, moniker: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            factory,
            moniker: moniker.into(),
            chain_id: chain_id.into(),
            gauges: InstrumentCache::new(),
            histograms: InstrumentCache::new(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn gauges(&self) -> &InstrumentCache<F::Gauge> {
        &self.gauges
    }

    pub fn histograms(&self) -> &InstrumentCache<CachedHistogram<F::Histogram>> {
        &self.histograms
    }

    /// Record every sample of a family.
    pub fn record_family(&mut self, family: &MetricFamily) -> FamilyOutcome {
        let mut outcome = FamilyOutcome::default();

        for sample in &family.samples {
            let attrs = build_metric_attributes(&self.moniker, &self.chain_id, &sample.labels);

            let sample_outcome = match &sample.value {
                SampleValue::Gauge(value) | SampleValue::Counter(value) => {
                    self.record_gauge(&family.name, &family.help, *value, &attrs)
                }
                SampleValue::Histogram(snapshot) => {
                    self.record_histogram(&family.name, &family.help, snapshot, &attrs)
                }
                SampleValue::Summary(snapshot) => {
                    self.record_summary(&family.name, &family.help, snapshot, &attrs)
                }
                SampleValue::Untyped(_) => {
                    trace!(metric = %family.name, "Skipping untyped sample");
                    continue;
                }
            };

            outcome.merge(sample_outcome);
        }

        outcome
    }

    fn record_gauge(
        &mut self,
        name: &str,
        description: &str,
        value: f64,
        attrs: &[KeyValue],
    ) -> FamilyOutcome {
        let mut outcome = FamilyOutcome::default();
        let factory = &self.factory;

        let gauge = match self.gauges.get_or_try_insert_with(name, || {
            outcome.instruments_created += 1;
            factory.gauge(name, description)
        }) {
            Ok(gauge) => gauge,
            Err(e) => {
                debug!(name = %name, error = %e, "Failed to create gauge");
                return FamilyOutcome {
                    instrument_errors: 1,
                    ..Default::default()
                };
            }
        };

        gauge.record(value, attrs);
        outcome.points_recorded += 1;
        outcome
    }

    fn record_histogram(
        &mut self,
        name: &str,
        description: &str,
        snapshot: &HistogramSnapshot,
        attrs: &[KeyValue],
    ) -> FamilyOutcome {
        let mut outcome = FamilyOutcome::default();
        let boundaries = histogram_boundaries(&snapshot.buckets);
        let factory = &self.factory;

        let cached = match self.histograms.get_or_try_insert_with(name, || {
            outcome.instruments_created += 1;
            factory
                .histogram(name, description, &boundaries)
                .map(|instrument| CachedHistogram {
                    instrument,
                    boundaries: boundaries.clone(),
                })
        }) {
            Ok(cached) => cached,
            Err(e) => {
                debug!(name = %name, error = %e, "Failed to create histogram");
                return FamilyOutcome {
                    instrument_errors: 1,
                    ..Default::default()
                };
            }
        };

        if cached.boundaries != boundaries {
            debug!(
                name = %name,
                cached = ?cached.boundaries,
                current = ?boundaries,
                "Histogram bucket layout changed, keeping original boundaries"
            );
        }

        for bucket in bucket_observations(&snapshot.buckets) {
            for _ in 0..bucket.count {
                cached.instrument.record(bucket.midpoint, attrs);
            }
            outcome.points_recorded += bucket.count;
        }

        outcome
    }

    fn record_summary(
        &mut self,
        name: &str,
        help: &str,
        snapshot: &SummarySnapshot,
        attrs: &[KeyValue],
    ) -> FamilyOutcome {
        let mut outcome = FamilyOutcome::default();

        outcome.merge(self.record_gauge(
            &format!("{}_sum", name),
            &format!("{} (summary sum)", help),
            snapshot.sample_sum,
            attrs,
        ));
        outcome.merge(self.record_gauge(
            &format!("{}_count", name),
            &format!("{} (summary count)", help),
            snapshot.sample_count as f64,
            attrs,
        ));

        let quantile_help = format!("{} (summary quantile)", help);
        for q in &snapshot.quantiles {
            let mut quantile_attrs = Vec::with_capacity(attrs.len() + 1);
            quantile_attrs.extend_from_slice(attrs);
            quantile_attrs.push(KeyValue::new(QUANTILE_KEY, quantile_label(q.quantile)));

            outcome.merge(self.record_gauge(name, &quantile_help, q.value, &quantile_attrs));
        }

        outcome
    }
}
