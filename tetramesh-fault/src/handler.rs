//! Partition fault classification
//!
//! [`FaultHandler`] owns per-partition status and turns externally reported
//! symptoms into status transitions:
//!
//! ```text
//! Partition states: Healthy → Suspected → Failed → Recovering
//!
//! Transitions:
//!   healthy → suspected: symptom received (barrier timeout, sync failure,
//!                        heartbeat failure, excessive symptom latency)
//!   suspected → failed: repeated symptom, or confirmation sweep timeout
//!   any → recovering: recovery started
//!   recovering → healthy: recovery succeeded (mark_healthy also clears)
//!   recovering → failed: recovery failed
//! ```
//!
//! Every non-identity transition is delivered inline to subscribed
//! listeners and published on a broadcast stream as a tagged fault event.
//! Transitions for one partition are linearized under that partition's
//! lock; listeners must not call back into the handler for the partition
//! they are being notified about.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::FaultConfig;
use crate::error::{FaultError, Result};
use crate::listener::{FaultListener, Registry, Subscription};
use crate::metrics;
use crate::strategy::RecoveryStrategy;
use crate::tracker::OperationTracker;
use crate::types::{
    FaultMetrics, PartitionChangeEvent, PartitionFaultEvent, PartitionId, PartitionStatus,
    PartitionView, RecoveryResult,
};

/// Per-partition classified state
#[derive(Debug, Default)]
struct PartitionRecord {
    status: PartitionStatus,
    last_seen_ms: u64,
    suspected_at_ms: Option<u64>,
    recovery_started_ms: Option<u64>,
    nodes: HashSet<String>,
    failed_nodes: HashSet<String>,
    metrics: FaultMetrics,
}

impl PartitionRecord {
    fn view(&self, partition: PartitionId) -> PartitionView {
        PartitionView {
            partition,
            status: self.status,
            last_seen_ms: self.last_seen_ms,
            node_count: self.nodes.len(),
            healthy_node_count: self.nodes.len() - self.failed_nodes.len(),
            metrics: self.metrics,
        }
    }
}

/// Partition fault classifier
///
/// Constructed once at subsystem start and shared (`Arc`) by recovery
/// coordinators and strategies for status queries and updates.
pub struct FaultHandler {
    config: FaultConfig,
    clock: Arc<dyn Clock>,
    partitions: RwLock<HashMap<PartitionId, Arc<Mutex<PartitionRecord>>>>,
    strategies: RwLock<HashMap<PartitionId, Arc<dyn RecoveryStrategy>>>,
    listeners: Arc<Registry<dyn FaultListener>>,
    event_tx: broadcast::Sender<PartitionFaultEvent>,
    recovery_slots: Arc<Semaphore>,
    tracker: Arc<OperationTracker>,
    running: AtomicBool,
}

impl FaultHandler {
    /// Create a handler with the production clock
    pub fn new(config: FaultConfig) -> Result<Arc<Self>> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a handler with an injected clock
    pub fn with_clock(config: FaultConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(256);
        Ok(Arc::new(Self {
            recovery_slots: Arc::new(Semaphore::new(config.max_concurrent_recoveries)),
            config,
            clock,
            partitions: RwLock::new(HashMap::new()),
            strategies: RwLock::new(HashMap::new()),
            listeners: Registry::new(),
            event_tx,
            tracker: Arc::new(OperationTracker::new()),
            running: AtomicBool::new(false),
        }))
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// The in-flight operation tracker owned by this subsystem
    pub fn tracker(&self) -> Arc<OperationTracker> {
        Arc::clone(&self.tracker)
    }

    /// Current status; unknown partitions are healthy
    pub fn check_health(&self, partition: PartitionId) -> PartitionStatus {
        self.partitions
            .read()
            .get(&partition)
            .map(|record| record.lock().status)
            .unwrap_or_default()
    }

    /// Whether the classifier has seen this partition
    pub fn is_known(&self, partition: PartitionId) -> bool {
        self.partitions.read().contains_key(&partition)
    }

    /// Snapshot of a partition's classified state
    pub fn view(&self, partition: PartitionId) -> PartitionView {
        match self.partitions.read().get(&partition) {
            Some(record) => record.lock().view(partition),
            None => PartitionView {
                partition,
                status: PartitionStatus::Healthy,
                last_seen_ms: 0,
                node_count: 0,
                healthy_node_count: 0,
                metrics: FaultMetrics::default(),
            },
        }
    }

    /// Subscribe to status change events
    pub fn subscribe(&self, listener: Arc<dyn FaultListener>) -> Subscription {
        self.listeners.register(listener)
    }

    /// Subscribe to the tagged fault-event broadcast stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PartitionFaultEvent> {
        self.event_tx.subscribe()
    }

    /// Record a node as belonging to a partition
    pub fn register_node(&self, partition: PartitionId, node: &str) {
        let record = self.record(partition);
        let mut guard = record.lock();
        guard.nodes.insert(node.to_string());
        guard.last_seen_ms = self.clock.now_ms();
    }

    /// Transition a partition to healthy
    pub fn mark_healthy(&self, partition: PartitionId) {
        self.transition(partition, PartitionStatus::Healthy, "marked healthy");
    }

    /// Report a barrier timeout symptom
    pub fn report_barrier_timeout(self: &Arc<Self>, partition: PartitionId) {
        metrics::record_symptom("barrier_timeout");
        let record = self.record(partition);
        let mut guard = record.lock();
        let event = self.escalate_locked(partition, &mut guard, "barrier timeout");
        drop(guard);
        self.after_symptom(partition, event);
    }

    /// Report a ghost-exchange sync failure symptom
    pub fn report_sync_failure(self: &Arc<Self>, partition: PartitionId) {
        metrics::record_symptom("sync_failure");
        let record = self.record(partition);
        let mut guard = record.lock();
        let event = self.escalate_locked(partition, &mut guard, "sync failure");
        drop(guard);
        self.after_symptom(partition, event);
    }

    /// Report a missed heartbeat from one of the partition's nodes
    pub fn report_heartbeat_failure(self: &Arc<Self>, partition: PartitionId, node: &str) {
        metrics::record_symptom("heartbeat_failure");
        let record = self.record(partition);
        let mut guard = record.lock();
        guard.nodes.insert(node.to_string());
        guard.failed_nodes.insert(node.to_string());
        let reason = format!("heartbeat failure on node {node}");
        let event = self.escalate_locked(partition, &mut guard, &reason);
        drop(guard);
        self.after_symptom(partition, event);
    }

    /// Report observed symptom latency for a partition
    ///
    /// Escalates only when `suspect_timeout_ms` is nonzero and the latency
    /// exceeds it; a zero setting disables this source entirely.
    pub fn report_symptom_latency(self: &Arc<Self>, partition: PartitionId, latency_ms: u64) {
        if self.config.suspect_timeout_ms == 0 || latency_ms <= self.config.suspect_timeout_ms {
            return;
        }
        metrics::record_symptom("symptom_latency");
        let record = self.record(partition);
        let mut guard = record.lock();
        let reason = format!(
            "symptom latency {latency_ms} ms exceeded {} ms",
            self.config.suspect_timeout_ms
        );
        let event = self.escalate_locked(partition, &mut guard, &reason);
        drop(guard);
        self.after_symptom(partition, event);
    }

    /// Attach a recovery strategy to a partition
    pub fn register_recovery(&self, partition: PartitionId, strategy: Arc<dyn RecoveryStrategy>) {
        info!(
            partition = %partition,
            strategy = strategy.strategy_name(),
            "registered recovery strategy"
        );
        self.strategies.write().insert(partition, strategy);
    }

    pub fn strategy_for(&self, partition: PartitionId) -> Option<Arc<dyn RecoveryStrategy>> {
        self.strategies.read().get(&partition).cloned()
    }

    /// Start a recovery for a partition
    ///
    /// Returns promptly; the recovery runs on the async pool. At most
    /// `max_concurrent_recoveries` run at once, further calls queue for a
    /// slot. Must be called from within a tokio runtime.
    pub fn initiate_recovery(self: &Arc<Self>, partition: PartitionId) -> tokio::task::JoinHandle<bool> {
        let handler = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = match Arc::clone(&handler.recovery_slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return false,
            };

            handler.notify_recovery_started(partition);
            let success = match handler.strategy_for(partition) {
                Some(strategy) => handler.run_strategy(strategy, partition).await,
                None => {
                    debug!(
                        partition = %partition,
                        "no recovery strategy registered; completing as no-op"
                    );
                    true
                }
            };
            handler.notify_recovery_complete(partition, success);
            success
        })
    }

    async fn run_strategy(
        self: &Arc<Self>,
        strategy: Arc<dyn RecoveryStrategy>,
        partition: PartitionId,
    ) -> bool {
        metrics::record_recovery_started(strategy.strategy_name());
        let strategy_name = strategy.strategy_name().to_string();
        let handler = Arc::clone(self);
        let future = async move { strategy.recover(partition, handler).await };

        let result = if self.config.recovery_timeout_ms > 0 {
            let budget = Duration::from_millis(self.config.recovery_timeout_ms);
            match tokio::time::timeout(budget, future).await {
                Ok(result) => result,
                Err(_) => RecoveryResult::failure(
                    partition,
                    self.config.recovery_timeout_ms,
                    strategy_name,
                    1,
                    FaultError::Timeout(self.config.recovery_timeout_ms).to_string(),
                ),
            }
        } else {
            future.await
        };

        if !result.success {
            warn!(
                partition = %partition,
                reason = result.failure_reason.as_deref().unwrap_or("unknown"),
                "recovery strategy failed"
            );
        }
        result.success
    }

    /// Record that a recovery has started for a partition
    pub fn notify_recovery_started(&self, partition: PartitionId) {
        self.transition(partition, PartitionStatus::Recovering, "recovery started");
    }

    /// Record the outcome of a recovery
    pub fn notify_recovery_complete(&self, partition: PartitionId, success: bool) {
        let record = self.record(partition);
        let mut guard = record.lock();

        let now = self.clock.now_ms();
        let latency = guard
            .recovery_started_ms
            .take()
            .map(|started| now.saturating_sub(started))
            .unwrap_or(0);
        guard.metrics.recovery_latency_ms = guard.metrics.recovery_latency_ms.max(latency);
        guard.metrics.recovery_attempts += 1;
        if success {
            guard.metrics.successful_recoveries += 1;
        } else {
            guard.metrics.failed_recoveries += 1;
        }
        metrics::record_recovery_completed(success, Duration::from_millis(latency));

        let (status, reason) = if success {
            (PartitionStatus::Healthy, "recovery complete")
        } else {
            (PartitionStatus::Failed, "recovery failed")
        };
        self.commit(partition, &mut guard, status, reason);
    }

    /// Metrics for one partition
    pub fn metrics(&self, partition: PartitionId) -> FaultMetrics {
        self.partitions
            .read()
            .get(&partition)
            .map(|record| record.lock().metrics)
            .unwrap_or_default()
    }

    /// Merged metrics across all partitions
    pub fn aggregate_metrics(&self) -> FaultMetrics {
        let records: Vec<_> = self.partitions.read().values().cloned().collect();
        records
            .iter()
            .fold(FaultMetrics::default(), |merged, record| {
                merged.merge(&record.lock().metrics)
            })
    }

    /// Start the failure confirmation sweep
    ///
    /// Partitions suspected longer than `failure_confirmation_ms` (by the
    /// injected clock) are promoted to failed. A zero setting disables the
    /// sweep. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            failure_confirmation_ms = self.config.failure_confirmation_ms,
            "fault handler started"
        );
        if self.config.failure_confirmation_ms == 0 {
            return;
        }

        let handler = Arc::clone(self);
        let interval = Duration::from_millis((self.config.failure_confirmation_ms / 4).clamp(10, 1000));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            while handler.is_running() {
                ticker.tick().await;
                if !handler.is_running() {
                    break;
                }
                handler.confirm_failures();
            }
            debug!("failure confirmation sweep stopped");
        });
    }

    /// Stop the confirmation sweep
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("fault handler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Promote partitions whose suspicion has outlived the confirmation
    /// window
    fn confirm_failures(self: &Arc<Self>) {
        let now = self.clock.now_ms();
        let records: Vec<_> = self
            .partitions
            .read()
            .iter()
            .map(|(id, record)| (*id, Arc::clone(record)))
            .collect();

        for (partition, record) in records {
            let mut guard = record.lock();
            let due = guard.status == PartitionStatus::Suspected
                && guard
                    .suspected_at_ms
                    .is_some_and(|at| now.saturating_sub(at) >= self.config.failure_confirmation_ms);
            if !due {
                continue;
            }
            let event = self.commit(partition, &mut guard, PartitionStatus::Failed, "failure confirmed");
            drop(guard);
            self.after_symptom(partition, event);
        }
    }

    /// Drive a partition to failed because a partition it depends on
    /// failed; used by cascading failure propagation
    pub(crate) fn inject_cascade_failure(self: &Arc<Self>, partition: PartitionId, reason: &str) {
        let record = self.record(partition);
        let mut guard = record.lock();
        if guard.status == PartitionStatus::Recovering {
            return;
        }
        // Walk the symptom path so listeners observe a legal sequence.
        let mut event = None;
        while guard.status != PartitionStatus::Failed {
            event = self.escalate_locked(partition, &mut guard, reason);
        }
        drop(guard);
        self.after_symptom(partition, event);
    }

    fn record(&self, partition: PartitionId) -> Arc<Mutex<PartitionRecord>> {
        if let Some(record) = self.partitions.read().get(&partition) {
            return Arc::clone(record);
        }
        let mut partitions = self.partitions.write();
        Arc::clone(partitions.entry(partition).or_default())
    }

    /// Escalate per the symptom rule: healthy partitions become suspected,
    /// suspected ones fail, failed and recovering ones are left alone.
    fn escalate_locked(
        &self,
        partition: PartitionId,
        guard: &mut PartitionRecord,
        reason: &str,
    ) -> Option<PartitionChangeEvent> {
        let target = match guard.status {
            PartitionStatus::Healthy => PartitionStatus::Suspected,
            PartitionStatus::Suspected | PartitionStatus::Failed => PartitionStatus::Failed,
            PartitionStatus::Recovering => PartitionStatus::Recovering,
        };
        self.commit(partition, guard, target, reason)
    }

    fn transition(
        &self,
        partition: PartitionId,
        new_status: PartitionStatus,
        reason: &str,
    ) -> Option<PartitionChangeEvent> {
        let record = self.record(partition);
        let mut guard = record.lock();
        self.commit(partition, &mut guard, new_status, reason)
    }

    /// Commit a status change under the partition lock and deliver events
    ///
    /// Delivery happens under the lock so the event order observed for one
    /// partition matches its transition order.
    fn commit(
        &self,
        partition: PartitionId,
        guard: &mut PartitionRecord,
        new_status: PartitionStatus,
        reason: &str,
    ) -> Option<PartitionChangeEvent> {
        let now = self.clock.now_ms();
        guard.last_seen_ms = now;

        let old_status = guard.status;
        if old_status == new_status {
            return None;
        }
        guard.status = new_status;

        match new_status {
            PartitionStatus::Suspected => {
                guard.suspected_at_ms = Some(now);
            }
            PartitionStatus::Failed => {
                guard.metrics.failure_count += 1;
                if let Some(suspected_at) = guard.suspected_at_ms.take() {
                    let latency = now.saturating_sub(suspected_at);
                    guard.metrics.detection_latency_ms =
                        guard.metrics.detection_latency_ms.max(latency);
                    metrics::record_detection_latency(Duration::from_millis(latency));
                }
            }
            PartitionStatus::Healthy => {
                guard.suspected_at_ms = None;
                guard.failed_nodes.clear();
            }
            PartitionStatus::Recovering => {
                guard.recovery_started_ms = Some(now);
            }
        }

        info!(
            partition = %partition,
            from = old_status.as_str(),
            to = new_status.as_str(),
            reason,
            "partition status changed"
        );
        metrics::record_status_transition(old_status.as_str(), new_status.as_str());

        let event = PartitionChangeEvent {
            partition,
            old_status,
            new_status,
            timestamp_ms: now,
            reason: reason.to_string(),
        };
        self.listeners.each(|listener| listener.on_change(&event));
        if let Some(fault_event) = PartitionFaultEvent::from_change(&event) {
            let _ = self.event_tx.send(fault_event);
        }
        Some(event)
    }

    /// Trigger auto-recovery after a symptom-driven failure
    fn after_symptom(self: &Arc<Self>, partition: PartitionId, event: Option<PartitionChangeEvent>) {
        let failed = event
            .map(|e| e.new_status == PartitionStatus::Failed)
            .unwrap_or(false);
        if !failed || !self.config.auto_recovery_enabled {
            return;
        }
        if self.strategy_for(partition).is_none() {
            return;
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            debug!(partition = %partition, "triggering automatic recovery");
            let _ = self.initiate_recovery(partition);
        } else {
            debug!(partition = %partition, "auto recovery skipped: no async runtime");
        }
    }
}
