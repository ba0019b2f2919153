//! Snapshot model of a pull-style metrics registry.
//!
//! The bridge reads the node's Prometheus registry through [`MetricsGatherer`]
//! and works on the owned [`MetricFamily`] values defined here, so the
//! translation logic never depends on the protobuf types directly.

use prometheus::proto;

use crate::error::GatherError;

/// A named group of samples of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            samples: Vec::new(),
        }
    }

    /// Add a sample to this family.
    pub fn with_sample(mut self, sample: Sample) -> Self {
        self.samples.push(sample);
        self
    }
}

/// One labelled measurement inside a family.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<(String, String)>,
    pub value: SampleValue,
}

impl Sample {
    pub fn new(value: SampleValue) -> Self {
        Self {
            labels: Vec::new(),
            value,
        }
    }

    /// Add a label pair to this sample.
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((name.into(), value.into()));
        self
    }
}

/// Sample payload, one variant per registry metric kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Gauge(f64),
    /// Cumulative value; only the current total is known, not the delta.
    Counter(f64),
    Histogram(HistogramSnapshot),
    Summary(SummarySnapshot),
    /// Kind the bridge does not export.
    Untyped(f64),
}

/// Cumulative-bucket histogram as exposed by the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramSnapshot {
    /// Ascending by upper bound. A trailing `+Inf` bucket may or may not be present.
    pub buckets: Vec<Bucket>,
    pub sample_count: u64,
    pub sample_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub upper_bound: f64,
    pub cumulative_count: u64,
}

impl Bucket {
    pub fn new(upper_bound: f64, cumulative_count: u64) -> Self {
        Self {
            upper_bound,
            cumulative_count,
        }
    }
}

/// Precomputed quantiles plus totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummarySnapshot {
    pub sample_count: u64,
    pub sample_sum: f64,
    pub quantiles: Vec<Quantile>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantile {
    pub quantile: f64,
    pub value: f64,
}

impl Quantile {
    pub fn new(quantile: f64, value: f64) -> Self {
        Self { quantile, value }
    }
}

/// Source of metric snapshots.
///
/// Called once per scrape cycle from the scrape loop; implementations should
/// be cheap and must not block on external I/O.
pub trait MetricsGatherer: Send + Sync + 'static {
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError>;
}

impl MetricsGatherer for prometheus::Registry {
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        Ok(prometheus::Registry::gather(self)
            .iter()
            .map(MetricFamily::from)
            .collect())
    }
}

/// Gathers from the process-wide default Prometheus registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGatherer;

impl MetricsGatherer for DefaultGatherer {
    fn gather(&self) -> Result<Vec<MetricFamily>, GatherError> {
        Ok(prometheus::gather().iter().map(MetricFamily::from).collect())
    }
}

impl From<&proto::MetricFamily> for MetricFamily {
    fn from(family: &proto::MetricFamily) -> Self {
        let kind = family.get_field_type();
        let samples = family
            .get_metric()
            .iter()
            .map(|metric| Sample {
                labels: metric
                    .get_label()
                    .iter()
                    .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
                    .collect(),
                value: convert_value(kind, metric),
            })
            .collect();

        Self {
            name: family.get_name().to_string(),
            help: family.get_help().to_string(),
            samples,
        }
    }
}

fn convert_value(kind: proto::MetricType, metric: &proto::Metric) -> SampleValue {
    match kind {
        proto::MetricType::GAUGE => SampleValue::Gauge(metric.get_gauge().get_value()),
        proto::MetricType::COUNTER => SampleValue::Counter(metric.get_counter().get_value()),
        proto::MetricType::HISTOGRAM => {
            let h = metric.get_histogram();
            SampleValue::Histogram(HistogramSnapshot {
                buckets: h
                    .get_bucket()
                    .iter()
                    .map(|b| Bucket::new(b.get_upper_bound(), b.get_cumulative_count()))
                    .collect(),
                sample_count: h.get_sample_count(),
                sample_sum: h.get_sample_sum(),
            })
        }
        proto::MetricType::SUMMARY => {
            let s = metric.get_summary();
            SampleValue::Summary(SummarySnapshot {
                sample_count: s.get_sample_count(),
                sample_sum: s.get_sample_sum(),
                quantiles: s
                    .get_quantile()
                    .iter()
                    .map(|q| Quantile::new(q.get_quantile(), q.get_value()))
                    .collect(),
            })
        }
        proto::MetricType::UNTYPED => SampleValue::Untyped(metric.get_untyped().get_value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Counter, Gauge, Histogram, HistogramOpts, IntGaugeVec, Opts, Registry};

    fn find<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("family {} not gathered", name))
    }

    #[test]
    fn test_gather_gauge_and_counter() {
        let registry = Registry::new();
        let gauge = Gauge::new("test_metric_gauge", "A test gauge metric").unwrap();
        gauge.set(3.1415);
        let counter = Counter::new("blocks_total", "Blocks seen").unwrap();
        counter.inc_by(7.0);
        registry.register(Box::new(gauge)).unwrap();
        registry.register(Box::new(counter)).unwrap();

        let families = MetricsGatherer::gather(&registry).unwrap();

        let gauge = find(&families, "test_metric_gauge");
        assert_eq!(gauge.help, "A test gauge metric");
        assert_eq!(gauge.samples.len(), 1);
        assert_eq!(gauge.samples[0].value, SampleValue::Gauge(3.1415));

        let counter = find(&families, "blocks_total");
        assert_eq!(counter.samples[0].value, SampleValue::Counter(7.0));
    }

    #[test]
    fn test_gather_histogram_buckets() {
        let registry = Registry::new();
        let histogram = Histogram::with_opts(
            HistogramOpts::new("block_time_seconds", "Block time").buckets(vec![1.0, 5.0, 10.0]),
        )
        .unwrap();
        for value in [0.5, 2.0, 2.5, 7.0, 20.0] {
            histogram.observe(value);
        }
        registry.register(Box::new(histogram)).unwrap();

        let families = MetricsGatherer::gather(&registry).unwrap();
        let family = find(&families, "block_time_seconds");

        let SampleValue::Histogram(snapshot) = &family.samples[0].value else {
            panic!("expected histogram sample");
        };
        assert_eq!(snapshot.sample_count, 5);
        let finite: Vec<Bucket> = snapshot
            .buckets
            .iter()
            .copied()
            .filter(|b| b.upper_bound.is_finite())
            .collect();
        assert_eq!(
            finite,
            vec![Bucket::new(1.0, 1), Bucket::new(5.0, 3), Bucket::new(10.0, 4)]
        );
    }

    #[test]
    fn test_gather_labels() {
        let registry = Registry::new();
        let peers =
            IntGaugeVec::new(Opts::new("peers", "Connected peers"), &["direction"]).unwrap();
        peers.with_label_values(&["inbound"]).set(3);
        registry.register(Box::new(peers)).unwrap();

        let families = MetricsGatherer::gather(&registry).unwrap();
        let family = find(&families, "peers");

        assert_eq!(
            family.samples[0].labels,
            vec![("direction".to_string(), "inbound".to_string())]
        );
        assert_eq!(family.samples[0].value, SampleValue::Gauge(3.0));
    }

    #[test]
    fn test_builders() {
        let family = MetricFamily::new("m", "help")
            .with_sample(Sample::new(SampleValue::Gauge(1.0)).with_label("k", "v"));

        assert_eq!(family.samples.len(), 1);
        assert_eq!(family.samples[0].labels[0], ("k".to_string(), "v".to_string()));
    }
}
