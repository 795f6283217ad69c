// src/metrics/collector.rs
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency buckets in milliseconds, shared by every histogram.
pub const LATENCY_BUCKETS_MS: &[f64] = &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 200.0];

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new(prefix: &str) -> prometheus::Result<Self> {
        let prefix = prefix.trim_end_matches('_');
        let registry = if prefix.is_empty() {
            Registry::new()
        } else {
            Registry::new_custom(Some(prefix.to_string()), None)?
        };
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Prometheus text exposition of everything registered.
    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode metrics");
        }
        buffer
    }
}

pub struct MetricsCollector {
    // Balancer-wide
    pub requests: IntCounter,
    pub errors: IntCounter,
    pub latency: Histogram,

    // Per service, labelled by address
    pub service_requests: IntCounterVec,
    pub service_errors: IntCounterVec,
    pub service_alive: IntGaugeVec,
    pub service_latency: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let requests = IntCounter::new("requests", "balancer requests counter")?;
        registry.register(Box::new(requests.clone()))?;

        let errors = IntCounter::new("errors", "balancer errors counter")?;
        registry.register(Box::new(errors.clone()))?;

        let latency = Histogram::with_opts(
            HistogramOpts::new("latency", "balancer requests latency (ms)")
                .buckets(LATENCY_BUCKETS_MS.to_vec()),
        )?;
        registry.register(Box::new(latency.clone()))?;

        let service_requests = IntCounterVec::new(
            Opts::new("service_requests", "service requests counter"),
            &["service"],
        )?;
        registry.register(Box::new(service_requests.clone()))?;

        let service_errors = IntCounterVec::new(
            Opts::new("service_errors", "service errors counter"),
            &["service"],
        )?;
        registry.register(Box::new(service_errors.clone()))?;

        let service_alive = IntGaugeVec::new(
            Opts::new("service_alive", "service status (1=alive, 0=otherwise)"),
            &["service"],
        )?;
        registry.register(Box::new(service_alive.clone()))?;

        let service_latency = HistogramVec::new(
            HistogramOpts::new("service_latency", "service requests latency (ms)")
                .buckets(LATENCY_BUCKETS_MS.to_vec()),
            &["service"],
        )?;
        registry.register(Box::new(service_latency.clone()))?;

        Ok(Self {
            requests,
            errors,
            latency,
            service_requests,
            service_errors,
            service_alive,
            service_latency,
        })
    }

    /// Handles for one pool member. Items sharing an address share a series.
    pub fn item_metrics(&self, service: &str) -> ItemMetrics {
        ItemMetrics {
            requests: self.service_requests.with_label_values(&[service]),
            errors: self.service_errors.with_label_values(&[service]),
            alive: self.service_alive.with_label_values(&[service]),
            latency: self.service_latency.with_label_values(&[service]),
        }
    }
}

/// Per-item metric handles, resolved once at construction.
#[derive(Clone)]
pub struct ItemMetrics {
    pub requests: IntCounter,
    pub errors: IntCounter,
    pub alive: IntGauge,
    pub latency: Histogram,
}

/// Observes elapsed milliseconds into a histogram when dropped, so every exit
/// path of a call is timed.
pub struct LatencyTimer<'a> {
    start: Instant,
    histogram: &'a Histogram,
}

impl<'a> LatencyTimer<'a> {
    pub fn start(histogram: &'a Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer<'_> {
    fn drop(&mut self) {
        self.histogram.observe(as_millis_f64(self.start.elapsed()));
    }
}

pub fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_exposition() {
        let registry = MetricsRegistry::new("balancer_").unwrap();
        let collector = registry.collector();
        collector.requests.inc();
        collector.item_metrics("10.0.0.1:80").alive.set(1);

        let text = String::from_utf8(registry.gather()).unwrap();
        assert!(text.contains("balancer_requests 1"));
        assert!(text.contains(r#"balancer_service_alive{service="10.0.0.1:80"} 1"#));
    }

    #[test]
    fn test_item_metrics_share_series() {
        let registry = MetricsRegistry::new("t").unwrap();
        let collector = registry.collector();
        let a = collector.item_metrics("a");
        let b = collector.item_metrics("a");
        a.requests.inc();
        b.requests.inc();
        assert_eq!(a.requests.get(), 2);
    }

    #[test]
    fn test_latency_timer_observes_on_drop() {
        let registry = MetricsRegistry::new("t").unwrap();
        let collector = registry.collector();
        {
            let _timer = LatencyTimer::start(&collector.latency);
        }
        assert_eq!(collector.latency.get_sample_count(), 1);
    }
}
