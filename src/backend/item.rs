// src/backend/item.rs
use super::context::Context;
use super::error::BackendError;
use super::transport::{Backend, Request, Response};
use crate::metrics::{ItemMetrics, LatencyTimer};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Alive,
    Unalive,
    /// A single canary request is in flight to verify recovery.
    Checking,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Alive => "alive",
            Status::Unalive => "unalive",
            Status::Checking => "checking",
        };
        f.write_str(s)
    }
}

// Status and its change time are only ever read and written together.
#[derive(Debug, Clone, Copy)]
struct StatusEntry {
    status: Status,
    changed_at: Instant,
}

/// One pool member: a backend plus its health state, load hint and metrics.
pub struct Item {
    id: String,
    backend: Box<dyn Backend>,
    state: RwLock<StatusEntry>,
    connections: AtomicI64,
    metrics: ItemMetrics,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (status, _) = self.status();
        f.debug_struct("Item")
            .field("id", &self.id)
            .field("status", &status)
            .field("connections", &self.connections())
            .finish()
    }
}

impl Item {
    /// New items start Alive.
    pub fn new(id: impl Into<String>, backend: Box<dyn Backend>, metrics: ItemMetrics) -> Self {
        let item = Self {
            id: id.into(),
            backend,
            state: RwLock::new(StatusEntry {
                status: Status::Alive,
                changed_at: Instant::now(),
            }),
            connections: AtomicI64::new(0),
            metrics,
        };
        item.set_status(Status::Alive);
        item
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consistent snapshot of the status and when it last changed.
    pub fn status(&self) -> (Status, Instant) {
        let entry = *self.state.read().unwrap_or_else(PoisonError::into_inner);
        (entry.status, entry.changed_at)
    }

    pub fn set_status(&self, status: Status) {
        let mut entry = self.state.write().unwrap_or_else(PoisonError::into_inner);
        self.write_entry(&mut entry, status);
    }

    fn write_entry(&self, entry: &mut StatusEntry, status: Status) {
        self.metrics
            .alive
            .set(if status == Status::Alive { 1 } else { 0 });
        entry.status = status;
        entry.changed_at = Instant::now();
    }

    /// Moves an Unalive item whose cooldown has expired into Checking.
    ///
    /// The check and the transition happen under one write lock, so among
    /// concurrent callers exactly one gets `true` per cooldown window.
    pub fn try_begin_canary(&self, cooldown: Duration) -> bool {
        let mut entry = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if entry.status != Status::Unalive || entry.changed_at.elapsed() <= cooldown {
            return false;
        }
        self.write_entry(&mut entry, Status::Checking);
        true
    }

    /// Returns a Checking item to Unalive if it is still Checking.
    pub fn abandon_canary(&self) -> bool {
        let mut entry = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if entry.status != Status::Checking {
            return false;
        }
        self.write_entry(&mut entry, Status::Unalive);
        true
    }

    /// Live in-flight calls. A load hint, not synchronised with status.
    pub fn connections(&self) -> i64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Counted and timed passthrough to the backend.
    pub async fn invoke(&self, ctx: &Context, request: Request) -> Result<Response, BackendError> {
        self.metrics.requests.inc();
        let _in_flight = InFlight::enter(self);

        let result = ctx.run(self.backend.invoke(request)).await;
        if let Err(err) = &result {
            if !err.is_cancellation() {
                self.metrics.errors.inc();
            }
        }
        result
    }

    /// Out-of-band liveness probe bounded by `ctx`.
    pub async fn health(&self, ctx: &Context) -> Result<(), BackendError> {
        ctx.run(self.backend.health()).await
    }
}

// Holds a connection slot and times the call; released on every exit path,
// including when the calling future is dropped.
struct InFlight<'a> {
    item: &'a Item,
    _timer: LatencyTimer<'a>,
}

impl<'a> InFlight<'a> {
    fn enter(item: &'a Item) -> Self {
        item.connections.fetch_add(1, Ordering::Relaxed);
        Self {
            item,
            _timer: LatencyTimer::start(&item.metrics.latency),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.item.connections.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Scripted {
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl Backend for Scripted {
        async fn invoke(&self, _request: Request) -> Result<Response, BackendError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(BackendError::Transport("refused".into()))
            } else {
                Ok(Response {
                    status: 200,
                    ..Default::default()
                })
            }
        }
    }

    fn item(fail: bool, delay: Duration) -> (Item, ItemMetrics) {
        let registry = MetricsRegistry::new("test").unwrap();
        let metrics = registry.collector().item_metrics("a");
        let item = Item::new("a", Box::new(Scripted { fail, delay }), metrics.clone());
        (item, metrics)
    }

    #[test]
    fn test_new_item_is_alive() {
        let (item, metrics) = item(false, Duration::ZERO);
        assert_eq!(item.status().0, Status::Alive);
        assert_eq!(metrics.alive.get(), 1);
        assert_eq!(item.connections(), 0);
    }

    #[test]
    fn test_set_status_updates_gauge_and_time() {
        let (item, metrics) = item(false, Duration::ZERO);
        let (_, before) = item.status();

        std::thread::sleep(Duration::from_millis(2));
        item.set_status(Status::Checking);
        let (status, after) = item.status();
        assert_eq!(status, Status::Checking);
        assert!(after > before);
        assert_eq!(metrics.alive.get(), 0);

        item.set_status(Status::Unalive);
        assert_eq!(metrics.alive.get(), 0);
        item.set_status(Status::Alive);
        assert_eq!(metrics.alive.get(), 1);
    }

    #[tokio::test]
    async fn test_invoke_success_counts() {
        let (item, metrics) = item(false, Duration::ZERO);
        let response = item.invoke(&Context::new(), Request::default()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(metrics.requests.get(), 1);
        assert_eq!(metrics.errors.get(), 0);
        assert_eq!(metrics.latency.get_sample_count(), 1);
        assert_eq!(item.connections(), 0);
    }

    #[tokio::test]
    async fn test_invoke_failure_counts_error() {
        let (item, metrics) = item(true, Duration::ZERO);
        let err = item
            .invoke(&Context::new(), Request::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
        assert_eq!(metrics.errors.get(), 1);
        assert_eq!(item.connections(), 0);
    }

    #[tokio::test]
    async fn test_invoke_cancelled_is_not_an_error() {
        let (item, metrics) = item(false, Duration::from_secs(60));
        let ctx = Context::new();
        ctx.cancel();

        let err = item.invoke(&ctx, Request::default()).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(metrics.requests.get(), 1);
        assert_eq!(metrics.errors.get(), 0);
        assert_eq!(metrics.latency.get_sample_count(), 1);
        assert_eq!(item.connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connections_tracked_while_in_flight() {
        let (item, _) = item(false, Duration::from_millis(100));
        let item = Arc::new(item);

        let worker = {
            let item = item.clone();
            tokio::spawn(async move { item.invoke(&Context::new(), Request::default()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(item.connections(), 1);

        worker.await.unwrap().unwrap();
        assert_eq!(item.connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_canary_requires_cooldown() {
        let (item, _) = item(false, Duration::ZERO);
        let cooldown = Duration::from_secs(5);

        assert!(!item.try_begin_canary(cooldown), "alive item is not a canary");

        item.set_status(Status::Unalive);
        assert!(!item.try_begin_canary(cooldown));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(item.try_begin_canary(cooldown));
        assert_eq!(item.status().0, Status::Checking);
        assert!(!item.try_begin_canary(cooldown));

        assert!(item.abandon_canary());
        assert_eq!(item.status().0, Status::Unalive);
        assert!(!item.abandon_canary());
    }

    #[tokio::test]
    async fn test_default_health_is_unsupported() {
        let (item, _) = item(false, Duration::ZERO);
        let err = item.health(&Context::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::HealthUnsupported));
    }
}
