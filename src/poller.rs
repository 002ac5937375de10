//! # Health Aggregator and Poller
//!
//! Drives repeated probing of every registered service and owns the current
//! [`Snapshot`]. One operation, [`HealthAggregator::run_cycle`], serves both
//! the recurring schedule and manual refreshes.
//!
//! ## Cycle
//!
//! 1. Take the cycle guard. If another cycle holds it, return
//!    [`CycleOutcome::Skipped`] without touching any slot.
//! 2. Fan out one probe per service (plus the optional Prometheus `up`
//!    query) and wait for all of them. Each probe is bounded by its own
//!    timeout, so the barrier is bounded by the slowest budget.
//! 3. Replace every slot as a whole value under the write lock, build the
//!    snapshot from the slots, and publish it to subscribers.
//!
//! Readers never observe a half-updated set: slots are only written after the
//! fan-in barrier, and the snapshot is built while the write lock is held.

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};
use uuid::Uuid;

use crate::log_cycle;
use crate::prober::HealthProber;
use crate::prometheus::{UpQuery, UpSummary};
use crate::registry::ServiceRegistry;
use crate::status::{ServiceStatus, Snapshot};

/// Result of asking for a poll cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The cycle ran and published this snapshot
    Completed(Arc<Snapshot>),
    /// Another cycle was already in flight; nothing was probed
    Skipped,
}

impl CycleOutcome {
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            CycleOutcome::Completed(snapshot) => Some(snapshot),
            CycleOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped)
    }
}

/// Owns the per-service status slots and the published snapshot
pub struct HealthAggregator {
    id: Uuid,
    registry: Arc<ServiceRegistry>,
    prober: HealthProber,
    up_query: Option<UpQuery>,
    /// One slot per descriptor, in registry order
    slots: RwLock<Vec<ServiceStatus>>,
    cycle_guard: Mutex<()>,
    cycles_completed: AtomicU64,
    cycles_skipped: AtomicU64,
    publisher: watch::Sender<Arc<Snapshot>>,
}

impl fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("id", &self.id)
            .field("services", &self.registry.len())
            .field("prober", &self.prober)
            .field("has_up_query", &self.up_query.is_some())
            .field("cycles_completed", &self.cycles_completed())
            .field("cycles_skipped", &self.cycles_skipped())
            .finish()
    }
}

impl HealthAggregator {
    /// Create an aggregator with every service in `Unknown`
    pub fn new(registry: Arc<ServiceRegistry>, prober: HealthProber) -> Self {
        let id = Uuid::new_v4();
        let initial = Snapshot::initial(&registry);
        let slots = initial.services().to_vec();
        let (publisher, _) = watch::channel(Arc::new(initial));

        info!(
            poller_id = %id,
            services = registry.len(),
            timeout_ms = prober.timeout().as_millis(),
            mode = ?prober.mode(),
            "Creating HealthAggregator"
        );

        Self {
            id,
            registry,
            prober,
            up_query: None,
            slots: RwLock::new(slots),
            cycle_guard: Mutex::new(()),
            cycles_completed: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            publisher,
        }
    }

    /// Also collect the Prometheus target summary on every cycle
    pub fn with_up_query(mut self, up_query: UpQuery) -> Self {
        self.up_query = Some(up_query);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn prober(&self) -> &HealthProber {
        &self.prober
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.publisher.borrow().clone()
    }

    /// Receive every snapshot published from now on
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.publisher.subscribe()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    pub fn cycles_skipped(&self) -> u64 {
        self.cycles_skipped.load(Ordering::SeqCst)
    }

    /// Probe every service once and publish the result
    ///
    /// Never fails. Returns [`CycleOutcome::Skipped`] if a cycle is already
    /// running.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            self.cycles_skipped.fetch_add(1, Ordering::SeqCst);
            log_cycle!(debug, "SKIPPED", poller_id: self.id);
            return CycleOutcome::Skipped;
        };

        let started = Instant::now();
        log_cycle!(debug, "STARTED", poller_id: self.id, services: self.registry.len());

        let probes = join_all(self.registry.iter().map(|d| self.prober.probe(d)));
        let metrics = async {
            match &self.up_query {
                Some(query) => query.fetch().await,
                None => None,
            }
        };
        let (statuses, metrics) = tokio::join!(probes, metrics);

        let snapshot = self.publish(statuses, metrics);

        log_cycle!(info, "COMPLETED",
            poller_id: self.id,
            cycle: snapshot.cycle(),
            healthy: snapshot.healthy_count(),
            total: snapshot.total_count(),
            duration_ms: started.elapsed().as_millis(),
        );

        CycleOutcome::Completed(snapshot)
    }

    fn publish(&self, statuses: Vec<ServiceStatus>, metrics: Option<UpSummary>) -> Arc<Snapshot> {
        let mut slots = self.slots.write();

        for (slot, mut status) in slots.iter_mut().zip(statuses) {
            if let (Some(previous), Some(next)) = (slot.last_checked_at, status.last_checked_at) {
                if next < previous {
                    status.last_checked_at = Some(previous);
                }
            }
            *slot = status;
        }

        let cycle = self.cycles_completed.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(Snapshot::new(
            cycle,
            slots.clone(),
            Some(Utc::now()),
            metrics,
        ));
        self.publisher.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    /// Run a cycle now and then every `interval` until the handle is shut
    /// down or dropped
    pub fn start(self: &Arc<Self>, interval: Duration) -> PollerHandle {
        let poller_id = self.id;
        let interval = interval.max(Duration::from_millis(1));
        let aggregator = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        info!(
            poller_id = %poller_id,
            interval_ms = interval.as_millis(),
            "Starting health poller"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let cycle = AssertUnwindSafe(aggregator.run_cycle()).catch_unwind();
                        if let Err(panic) = cycle.await {
                            error!(
                                poller_id = %poller_id,
                                panic = %panic_message(panic.as_ref()),
                                "Poll cycle panicked; continuing with next tick"
                            );
                        }
                    }
                }
            }

            info!(poller_id = %poller_id, "Health poller stopped");
        });

        PollerHandle {
            poller_id,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Cancellation handle for the recurring schedule
///
/// Dropping the handle aborts the schedule. Probes already in flight are
/// abandoned with it.
#[derive(Debug)]
pub struct PollerHandle {
    poller_id: Uuid,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn poller_id(&self) -> Uuid {
        self.poller_id
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop scheduling and wait for the loop to exit
    ///
    /// A cycle in progress is allowed to finish first.
    pub async fn shutdown(mut self) {
        info!(poller_id = %self.poller_id, "Stopping health poller");

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!(poller_id = %self.poller_id, error = %e, "Health poller task failed");
                }
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::registry::{ServiceDescriptor, ServiceKind};
    use crate::status::ServiceState;
    use crate::transport::{ProbeRequest, ProbeResponse, ProbeTransport};
    use async_trait::async_trait;

    struct AlwaysUp;

    #[async_trait]
    impl ProbeTransport for AlwaysUp {
        fn transport_name(&self) -> &'static str {
            "always-up"
        }

        async fn fetch(&self, _request: &ProbeRequest) -> Result<ProbeResponse, TransportError> {
            Ok(ProbeResponse::with_status(200))
        }
    }

    fn aggregator(names: &[&str]) -> HealthAggregator {
        let descriptors = names
            .iter()
            .map(|n| ServiceDescriptor::new(*n, format!("http://{n}:80"), ServiceKind::Generic))
            .collect();
        let registry = Arc::new(ServiceRegistry::new(descriptors).unwrap());
        HealthAggregator::new(registry, HealthProber::new(Arc::new(AlwaysUp)))
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_unknown() {
        let aggregator = aggregator(&["a", "b"]);
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.cycle(), 0);
        assert_eq!(snapshot.count(ServiceState::Unknown), 2);
        assert!(snapshot.published_at().is_none());
    }

    #[tokio::test]
    async fn test_publish_clamps_last_checked_at() {
        let aggregator = aggregator(&["a"]);
        let descriptor = aggregator.registry().descriptors()[0].clone();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(10);

        aggregator.publish(vec![ServiceStatus::healthy(&descriptor, 5, later)], None);
        let snapshot = aggregator.publish(
            vec![ServiceStatus::unknown(&descriptor, earlier, "timed out")],
            None,
        );

        let status = snapshot.get("a").unwrap();
        assert_eq!(status.state, ServiceState::Unknown);
        assert_eq!(status.last_checked_at, Some(later));
        assert_eq!(snapshot.cycle(), 2);
    }

    #[tokio::test]
    async fn test_skip_when_guard_held() {
        let aggregator = aggregator(&["a"]);
        let _held = aggregator.cycle_guard.lock().await;

        assert!(aggregator.run_cycle().await.is_skipped());
        assert_eq!(aggregator.cycles_skipped(), 1);
        assert_eq!(aggregator.cycles_completed(), 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
