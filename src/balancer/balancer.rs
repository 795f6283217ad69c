// src/balancer/balancer.rs
use super::error::BalancerError;
use crate::backend::{Backend, BackendError, Context, HttpBackend, Item, Request, Response, Status};
use crate::config::{Config, HealthCheckConfig};
use crate::health::{CheckReport, HealthChecker};
use crate::metrics::{LatencyTimer, MetricsCollector};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::strategy::{build_strategy, Strategy, StrategyType};
use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The strategy currently routing requests, replaced as a whole on swap.
pub struct ActiveStrategy {
    kind: StrategyType,
    inner: Box<dyn Strategy>,
}

impl ActiveStrategy {
    pub fn kind(&self) -> StrategyType {
        self.kind
    }

    pub fn next(&self) -> Option<Arc<Item>> {
        self.inner.next()
    }
}

/// Routes requests over a fixed pool of items.
pub struct Balancer {
    items: Arc<[Arc<Item>]>,
    strategy: ArcSwap<ActiveStrategy>,
    retry: RetryPolicy,
    cooldown: Duration,
    health: HealthCheckConfig,
    metrics: Arc<MetricsCollector>,
}

impl Balancer {
    /// One [`HttpBackend`] per configured address.
    pub fn new(config: &Config, metrics: Arc<MetricsCollector>) -> Result<Self, BalancerError> {
        let backends = config
            .backends
            .iter()
            .map(|addr| {
                let backend: Box<dyn Backend> = Box::new(HttpBackend::new(addr)?);
                Ok((addr.clone(), backend))
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        Self::with_backends(backends, config, metrics)
    }

    /// Build over caller-supplied transports, keyed by address.
    pub fn with_backends(
        backends: Vec<(String, Box<dyn Backend>)>,
        config: &Config,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self, BalancerError> {
        if backends.is_empty() {
            return Err(BalancerError::EmptyPool);
        }

        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(backends.len());
        for (id, backend) in backends {
            if config.balancer.dedupe_backends && !seen.insert(id.clone()) {
                debug!(item = %id, "dropping duplicate backend");
                continue;
            }
            let item_metrics = metrics.item_metrics(&id);
            items.push(Arc::new(Item::new(id, backend, item_metrics)));
        }
        let items: Arc<[Arc<Item>]> = items.into();

        let cooldown = config.balancer.cooldown();
        let kind = config.balancer.strategy;
        let strategy = ArcSwap::from_pointee(ActiveStrategy {
            kind,
            inner: build_strategy(kind, items.clone(), cooldown),
        });

        info!(items = items.len(), strategy = %kind, "balancer ready");

        Ok(Self {
            items,
            strategy,
            retry: RetryPolicy::new(config.retry.clone()),
            cooldown,
            health: config.health_check.clone(),
            metrics,
        })
    }

    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn strategy_type(&self) -> StrategyType {
        self.strategy.load().kind()
    }

    /// Replace the active strategy with a fresh one over the same items.
    /// In-flight selections finish on whichever strategy they loaded.
    pub fn set_strategy(&self, kind: StrategyType) {
        let fresh = ActiveStrategy {
            kind,
            inner: build_strategy(kind, self.items.clone(), self.cooldown),
        };
        self.strategy.store(Arc::new(fresh));
        info!(strategy = %kind, "strategy switched");
    }

    /// Next item under the active strategy.
    pub fn next(&self) -> Option<Arc<Item>> {
        self.strategy.load().next()
    }

    /// Route `request` to a backend, retrying other items on failure.
    pub async fn invoke(&self, ctx: &Context, request: Request) -> Result<Response, BalancerError> {
        self.metrics.requests.inc();
        let _timer = LatencyTimer::start(&self.metrics.latency);

        if let Some(err) = ctx.err() {
            return Err(BalancerError::Cancelled(err));
        }

        let max_attempts = self.retry.max_attempts();
        let mut attempts = 0;
        let mut last_error: Option<BackendError> = None;

        while attempts < max_attempts {
            attempts += 1;

            let Some(item) = self.next() else {
                if last_error.is_none() {
                    return Err(BalancerError::NoBackend);
                }
                // Nothing left to retry on; the budget is spent.
                break;
            };

            let lease = CanaryLease::acquire(&item);
            if lease.is_some() {
                info!(item = %item.id(), "try check unalive");
            }

            match item.invoke(ctx, request.clone()).await {
                Ok(response) => {
                    if let Some(lease) = lease {
                        lease.promote();
                    }
                    return Ok(response);
                }
                Err(err) if RetryPolicy::classify(&err) == RetryDecision::NoRetry => {
                    // Dropping the lease puts a canary back to Unalive.
                    return Err(BalancerError::Cancelled(err));
                }
                Err(err) => {
                    item.set_status(Status::Unalive);
                    if let Some(lease) = lease {
                        lease.release();
                    }
                    warn!(item = %item.id(), attempt = attempts, error = %err, "not alive");
                    last_error = Some(err);

                    if attempts < max_attempts {
                        if let Err(err) = self.retry.pause(ctx, attempts).await {
                            return Err(BalancerError::Cancelled(err));
                        }
                    }
                }
            }
        }

        self.metrics.errors.inc();
        match last_error {
            Some(source) => Err(BalancerError::Exhausted { attempts, source }),
            None => Err(BalancerError::NoBackend),
        }
    }

    pub fn health_checker(&self) -> HealthChecker {
        HealthChecker::new(self.items.clone(), self.health.clone())
    }

    /// Background reconciliation: re-probes Unalive items every tick until
    /// `shutdown` fires.
    pub async fn routine(&self, shutdown: CancellationToken) {
        self.health_checker().run(shutdown).await;
    }

    /// A single reconciliation pass.
    pub async fn reconcile(&self) -> CheckReport {
        self.health_checker()
            .check_unalive(&CancellationToken::new())
            .await
    }
}

// Marks a request routed to a Checking item. Unless promoted or released, the
// item goes back to Unalive when the lease drops so it is never left Checking.
struct CanaryLease<'a> {
    item: &'a Item,
    settled: bool,
}

impl<'a> CanaryLease<'a> {
    fn acquire(item: &'a Item) -> Option<Self> {
        (item.status().0 == Status::Checking).then(|| Self {
            item,
            settled: false,
        })
    }

    fn promote(mut self) {
        self.item.set_status(Status::Alive);
        self.settled = true;
        info!(item = %self.item.id(), "now is alive");
    }

    fn release(mut self) {
        self.settled = true;
    }
}

impl Drop for CanaryLease<'_> {
    fn drop(&mut self) {
        if !self.settled && self.item.abandon_canary() {
            debug!(item = %self.item.id(), "canary abandoned");
        }
    }
}
