//! Export instruments and the per-name instrument cache.

use std::collections::HashMap;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Gauge, Histogram, Meter};

use crate::error::InstrumentError;

/// Maximum instrument name length accepted by OpenTelemetry.
pub const MAX_INSTRUMENT_NAME_LEN: usize = 255;

/// Handle recording point-in-time values.
pub trait GaugeInstrument: Send {
    fn record(&self, value: f64, attributes: &[KeyValue]);
}

/// Handle recording individual observations into explicit buckets.
pub trait HistogramInstrument: Send {
    fn record(&self, value: f64, attributes: &[KeyValue]);
}

/// Creates export instruments.
///
/// Creation may fail; a failure only affects the metric being created.
pub trait InstrumentFactory: Send + 'static {
    type Gauge: GaugeInstrument;
    type Histogram: HistogramInstrument;

    fn gauge(&self, name: &str, description: &str) -> Result<Self::Gauge, InstrumentError>;

    fn histogram(
        &self,
        name: &str,
        description: &str,
        boundaries: &[f64],
    ) -> Result<Self::Histogram, InstrumentError>;
}

/// Memoizing get-or-create map from metric name to instrument handle.
///
/// Owned by a single scrape loop, so it carries no locking.
#[derive(Debug)]
pub struct InstrumentCache<T> {
    entries: HashMap<String, T>,
}

impl<T> Default for InstrumentCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> InstrumentCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle for `name`, creating it with `create` on first use.
    ///
    /// A failed creation is returned to the caller and nothing is cached, so the
    /// next call retries.
    pub fn get_or_try_insert_with<E, F>(&mut self, name: &str, create: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.entries.contains_key(name) {
            let instrument = create()?;
            self.entries.insert(name.to_string(), instrument);
        }
        Ok(&self.entries[name])
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Histogram handle together with the bucket layout it was created with.
#[derive(Debug)]
pub struct CachedHistogram<H> {
    pub instrument: H,
    pub boundaries: Vec<f64>,
}

/// Instrument factory backed by an OpenTelemetry [`Meter`].
#[derive(Clone)]
pub struct OtelInstruments {
    meter: Meter,
}

impl OtelInstruments {
    pub fn new(meter: Meter) -> Self {
        Self { meter }
    }
}

impl InstrumentFactory for OtelInstruments {
    type Gauge = Gauge<f64>;
    type Histogram = Histogram<f64>;

    fn gauge(&self, name: &str, description: &str) -> Result<Self::Gauge, InstrumentError> {
        validate_instrument_name(name)?;
        Ok(self
            .meter
            .f64_gauge(name.to_string())
            .with_description(description.to_string())
            .build())
    }

    fn histogram(
        &self,
        name: &str,
        description: &str,
        boundaries: &[f64],
    ) -> Result<Self::Histogram, InstrumentError> {
        validate_instrument_name(name)?;
        validate_boundaries(name, boundaries)?;
        Ok(self
            .meter
            .f64_histogram(name.to_string())
            .with_description(description.to_string())
            .with_boundaries(boundaries.to_vec())
            .build())
    }
}

impl GaugeInstrument for Gauge<f64> {
    fn record(&self, value: f64, attributes: &[KeyValue]) {
        Gauge::record(self, value, attributes);
    }
}

impl HistogramInstrument for Histogram<f64> {
    fn record(&self, value: f64, attributes: &[KeyValue]) {
        Histogram::record(self, value, attributes);
    }
}

/// Check a name against the OpenTelemetry instrument name syntax.
///
/// The SDK silently swaps invalid instruments for no-ops; checking here turns
/// that into a creation error the caller can log and retry.
pub fn validate_instrument_name(name: &str) -> Result<(), InstrumentError> {
    let invalid = |reason: &str| InstrumentError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("name is empty")),
        Some(c) if !c.is_ascii_alphabetic() => {
            return Err(invalid("name must start with an ASCII letter"));
        }
        Some(_) => {}
    }

    if name.len() > MAX_INSTRUMENT_NAME_LEN {
        return Err(invalid("name is longer than 255 characters"));
    }

    let allowed = |c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/');
    if let Some(c) = chars.find(|c| !allowed(c)) {
        return Err(invalid(&format!("unsupported character '{}'", c)));
    }

    Ok(())
}

/// Boundaries must be finite and strictly increasing.
pub fn validate_boundaries(name: &str, boundaries: &[f64]) -> Result<(), InstrumentError> {
    let invalid = |reason: String| InstrumentError::InvalidBoundaries {
        name: name.to_string(),
        reason,
    };

    if let Some(b) = boundaries.iter().find(|b| !b.is_finite()) {
        return Err(invalid(format!("non-finite boundary {}", b)));
    }

    if let Some(pair) = boundaries.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(invalid(format!(
            "boundaries not strictly increasing ({} >= {})",
            pair[0], pair[1]
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_creates_once() {
        let mut cache: InstrumentCache<u32> = InstrumentCache::new();
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with::<(), _>("blocks", || {
                    calls += 1;
                    Ok(42)
                })
                .unwrap();
            assert_eq!(*value, 42);
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_failure_not_cached() {
        let mut cache: InstrumentCache<u32> = InstrumentCache::new();

        let result = cache.get_or_try_insert_with("broken", || Err("boom"));
        assert_eq!(result, Err("boom"));
        assert!(!cache.contains("broken"));
        assert!(cache.is_empty());

        // Next attempt retries creation.
        let value = cache
            .get_or_try_insert_with::<&str, _>("broken", || Ok(7))
            .unwrap();
        assert_eq!(*value, 7);
        assert_eq!(cache.get("broken"), Some(&7));
    }

    #[test]
    fn test_valid_instrument_names() {
        for name in [
            "test_metric_gauge",
            "cometbft.consensus.height",
            "http-requests/total",
            "a",
        ] {
            assert!(validate_instrument_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_instrument_names() {
        assert!(validate_instrument_name("").is_err());
        assert!(validate_instrument_name("_private").is_err());
        assert!(validate_instrument_name("9lives").is_err());
        assert!(validate_instrument_name("job:rate:5m").is_err());
        assert!(validate_instrument_name(&"a".repeat(256)).is_err());
        assert!(validate_instrument_name(&"a".repeat(255)).is_ok());

        let err = validate_instrument_name("job:rate").unwrap_err();
        assert!(err.to_string().contains("':'"));
    }

    #[test]
    fn test_boundaries_validation() {
        assert!(validate_boundaries("h", &[]).is_ok());
        assert!(validate_boundaries("h", &[1.0, 5.0, 10.0]).is_ok());
        assert!(validate_boundaries("h", &[1.0, 1.0]).is_err());
        assert!(validate_boundaries("h", &[5.0, 1.0]).is_err());
        assert!(validate_boundaries("h", &[1.0, f64::NAN]).is_err());
        assert!(validate_boundaries("h", &[1.0, f64::INFINITY]).is_err());
    }
}
