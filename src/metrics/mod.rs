mod collector;

pub use collector::{
    as_millis_f64, ItemMetrics, LatencyTimer, MetricsCollector, MetricsRegistry,
    LATENCY_BUCKETS_MS,
};
