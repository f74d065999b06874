//! Scrape-time evaluation of the temperature gauges.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use tracing::error;

use crate::cache::{Cache, CacheStats};
use crate::client::{SensorClient, SensorSource};

/// Content type of the rendered exposition.
pub const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Label set for the temperature gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct UnitLabels {
    unit: String,
}

/// Values observed during one scrape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrapeValues {
    pub celsius: f64,
    pub fahrenheit: f64,
    pub up: bool,
}

/// Reads the sensor through the cache and renders Prometheus metrics.
pub struct TemperatureCollector<S = SensorClient> {
    cache: Cache,
    source: S,
    endpoint: String,
    prefix: String,
}

impl<S: SensorSource> TemperatureCollector<S> {
    /// Create a collector polling `endpoint` through `source`.
    pub fn new(source: S, endpoint: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            cache: Cache::new(),
            source,
            endpoint: endpoint.into(),
            prefix: prefix.into(),
        }
    }

    /// The sensor endpoint being polled.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Evaluate each gauge. Every gauge goes through [`Cache::get`] on its
    /// own; within one TTL window they share a single upstream fetch.
    pub async fn scrape(&self) -> ScrapeValues {
        let (reading, _) = self.cache.get(&self.source, &self.endpoint).await;
        let celsius = reading.celsius();

        let (reading, _) = self.cache.get(&self.source, &self.endpoint).await;
        let fahrenheit = reading.fahrenheit();

        let (_, up) = self.cache.get(&self.source, &self.endpoint).await;

        ScrapeValues {
            celsius,
            fahrenheit,
            up,
        }
    }

    /// Scrape and render in the text exposition format.
    pub async fn render(&self) -> String {
        let values = self.scrape().await;
        let registry = self.build_registry(values, &self.cache.stats());

        let mut output = String::new();
        if let Err(e) = encode(&mut output, &registry) {
            error!(error = %e, "Failed to encode metrics");
        }
        output
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn build_registry(&self, values: ScrapeValues, stats: &CacheStats) -> Registry {
        let mut registry = Registry::with_prefix(self.prefix.as_str());

        let temperature = Family::<UnitLabels, Gauge<f64, AtomicU64>>::default();
        temperature
            .get_or_create(&UnitLabels {
                unit: "celsius".to_string(),
            })
            .set(values.celsius);
        temperature
            .get_or_create(&UnitLabels {
                unit: "fahrenheit".to_string(),
            })
            .set(values.fahrenheit);
        registry.register("temperature", "Pico Sensor Temperature", temperature);

        let up = Gauge::<i64>::default();
        up.set(i64::from(values.up));
        registry.register("up", "Pico Sensor Server Status", up);

        let refreshes = Counter::<u64>::default();
        refreshes.inc_by(stats.refreshes);
        registry.register(
            "exporter_refreshes",
            "Fetches issued to the sensor",
            refreshes,
        );

        let failures = Counter::<u64>::default();
        failures.inc_by(stats.refresh_failures);
        registry.register(
            "exporter_refresh_failures",
            "Sensor fetches that failed",
            failures,
        );

        let hits = Counter::<u64>::default();
        hits.inc_by(stats.hits);
        registry.register(
            "exporter_cache_hits",
            "Reads answered from the cache",
            hits,
        );

        registry
    }
}

/// Create a shareable collector handle.
pub type SharedCollector<S = SensorClient> = Arc<TemperatureCollector<S>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SensorError;
    use picotemp_common::Reading;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSensor {
        celsius: Option<f64>,
        calls: AtomicUsize,
    }

    impl FixedSensor {
        fn new(celsius: Option<f64>) -> Self {
            Self {
                celsius,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SensorSource for FixedSensor {
        async fn fetch(&self, _endpoint: &str) -> Result<Reading, SensorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.celsius
                .map(Reading::from_celsius)
                .ok_or_else(|| SensorError::Unreachable("HTTP 503".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_collapses_to_one_fetch() {
        let collector = TemperatureCollector::new(FixedSensor::new(Some(25.0)), "http://x/", "pico");

        let values = collector.scrape().await;

        assert_eq!(
            values,
            ScrapeValues {
                celsius: 25.0,
                fahrenheit: 77.0,
                up: true
            }
        );
        assert_eq!(collector.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(collector.stats().hits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_healthy() {
        let collector =
            TemperatureCollector::new(FixedSensor::new(Some(23.456)), "http://x/", "pico");

        let output = collector.render().await;

        assert!(output.contains("# TYPE pico_temperature gauge"));
        assert!(output.contains("pico_temperature{unit=\"celsius\"} 23.456"));
        assert!(output.contains("pico_temperature{unit=\"fahrenheit\"} 74.2208"));
        assert!(output.contains("pico_up 1"));
        assert!(output.contains("pico_exporter_refreshes_total 1"));
        assert!(output.ends_with("# EOF\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_unhealthy() {
        let collector = TemperatureCollector::new(FixedSensor::new(None), "http://x/", "pico");

        let output = collector.render().await;

        assert!(output.contains("pico_up 0"));
        assert!(output.contains("pico_temperature{unit=\"celsius\"} 0"));
        assert!(output.contains("pico_temperature{unit=\"fahrenheit\"} 0"));
        assert!(output.contains("pico_exporter_refresh_failures_total 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_prefix() {
        let collector =
            TemperatureCollector::new(FixedSensor::new(Some(20.0)), "http://x/", "greenhouse");

        let output = collector.render().await;

        assert!(output.contains("greenhouse_temperature{unit=\"celsius\"} 20"));
        assert!(output.contains("greenhouse_up 1"));
    }
}
