//! # Prometheus Metrics: Exposition for Container Orchestration
//!
//! Exposes carbonledger operational metrics in the Prometheus text exposition
//! format for scraping by Prometheus, Grafana Agent, or any OpenMetrics-compatible
//! collector.
//!
//! ## Metrics Exposed
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `carbonledger_http_request_duration_seconds` | Histogram | `method`, `path` | Request latency |
//! | `carbonledger_calculations_total` | Counter | `kind` | Aggregate and history calculations served |
//! | `carbonledger_records_written_total` | Counter | `table` | Activity records and sinks written |
//!
//! The `/metrics` endpoint renders the current registry state on each scrape.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Label set for HTTP request metrics. `path` is normalized (ids collapsed).
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub path: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KindLabel {
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TableLabel {
    pub table: String,
}

fn request_duration_histogram() -> Histogram {
    // 5ms .. ~10s
    Histogram::new(exponential_buckets(0.005, 2.0, 12))
}

/// Thread-safe metrics registry.
///
/// All fields use atomic types and are safe to update from any async task.
pub struct Metrics {
    pub registry: Registry,
    pub http_request_duration: Family<HttpLabel, Histogram>,
    pub calculations: Family<KindLabel, Counter>,
    pub records_written: Family<TableLabel, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_request_duration =
            Family::<HttpLabel, Histogram>::new_with_constructor(request_duration_histogram);
        registry.register(
            "carbonledger_http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_request_duration.clone(),
        );

        let calculations = Family::<KindLabel, Counter>::default();
        registry.register(
            "carbonledger_calculations",
            "Emission calculations served by kind",
            calculations.clone(),
        );

        let records_written = Family::<TableLabel, Counter>::default();
        registry.register(
            "carbonledger_records_written",
            "Records created or updated by table",
            records_written.clone(),
        );

        Self {
            registry,
            http_request_duration,
            calculations,
            records_written,
        }
    }

    pub fn record_calculation(&self, kind: &str) {
        self.calculations
            .get_or_create(&KindLabel {
                kind: kind.to_string(),
            })
            .inc();
    }

    pub fn record_write(&self, table: &str, count: u64) {
        self.records_written
            .get_or_create(&TableLabel {
                table: table.to_string(),
            })
            .inc_by(count);
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        match encode(&mut buf, &self.registry) {
            Ok(()) => buf,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode metrics");
                String::new()
            }
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
