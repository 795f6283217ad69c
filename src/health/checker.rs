// src/health/checker.rs
use crate::backend::{BackendError, Context, Item, Status};
use crate::config::HealthCheckConfig;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically re-probes Unalive items and promotes the ones that answer.
///
/// Only items in Unalive are probed. Alive items are left to client traffic
/// and Checking items already have a canary request in flight.
pub struct HealthChecker {
    items: Arc<[Arc<Item>]>,
    config: HealthCheckConfig,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub recovered: Vec<String>,
    pub unhealthy: Vec<String>,
}

impl CheckReport {
    pub fn is_empty(&self) -> bool {
        self.recovered.is_empty() && self.unhealthy.is_empty()
    }
}

impl HealthChecker {
    pub fn new(items: Arc<[Arc<Item>]>, config: HealthCheckConfig) -> Self {
        Self { items, config }
    }

    /// Runs until `shutdown` fires. The interval restarts after each pass,
    /// so a slow pass is never followed by an immediate one.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.config.interval_ms,
            items = self.items.len(),
            "started balancer routine"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.config.interval()) => {}
            }
            self.check_unalive(&shutdown).await;
        }

        info!("stopped balancer routine");
    }

    /// Probe every Unalive item once, concurrently.
    pub async fn check_unalive(&self, shutdown: &CancellationToken) -> CheckReport {
        let candidates: Vec<&Arc<Item>> = self
            .items
            .iter()
            .filter(|item| item.status().0 == Status::Unalive)
            .collect();

        let mut report = CheckReport::default();
        if candidates.is_empty() {
            return report;
        }

        let probes = candidates.into_iter().map(|item| {
            let ctx = Context::with_token(shutdown.child_token()).with_timeout(self.config.timeout());
            async move {
                let result = item.health(&ctx).await;
                (item, result)
            }
        });

        for (item, result) in futures::future::join_all(probes).await {
            match result {
                Ok(()) => {
                    item.set_status(Status::Alive);
                    info!(item = %item.id(), "now healthy");
                    report.recovered.push(item.id().to_string());
                }
                Err(BackendError::Cancelled) => {
                    debug!(item = %item.id(), "probe abandoned on shutdown");
                }
                Err(err) => {
                    debug!(item = %item.id(), error = %err, "probe failed");
                    report.unhealthy.push(item.id().to_string());
                }
            }
        }

        if !report.unhealthy.is_empty() {
            warn!(nodes = ?report.unhealthy, "unhealthy nodes");
        }
        report
    }
}
