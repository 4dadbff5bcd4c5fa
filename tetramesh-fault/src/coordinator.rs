//! Phase-driven recovery coordination
//!
//! [`RecoveryCoordinator`] drives one partition through the recovery phase
//! sequence:
//!
//! ```text
//! Idle → Detecting → Redistributing → Rebalancing → Validating → Complete
//!            │              │               │            │
//!            └──────────────┴───── Failed ──┴────────────┘
//! ```
//!
//! Detecting drains the in-flight operation tracker; Redistributing runs
//! the registered strategy. Each committed transition records the injected
//! clock and is broadcast to phase listeners. `retry` resets a terminal
//! machine to Idle for another attempt.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::FaultConfig;
use crate::error::{FaultError, Result};
use crate::handler::FaultHandler;
use crate::listener::{PhaseListener, Registry, Subscription};
use crate::metrics;
use crate::observer::{RecoveryEvent, RecoveryEventType, RecoveryObservers};
use crate::strategy::RecoveryStrategy;
use crate::tracker::OperationTracker;
use crate::types::{PartitionChangeEvent, PartitionId, PartitionStatus, RecoveryPhase, RecoveryResult};

/// Cap on the drain wait when `recovery_timeout_ms` is disabled, so the
/// blocking task cannot hang forever
const MAX_DRAIN_WAIT_MS: u64 = 3_600_000;

/// Recovery coordinator bound to a single partition
pub struct RecoveryCoordinator {
    partition: PartitionId,
    config: FaultConfig,
    clock: RwLock<Arc<dyn Clock>>,
    phase: AtomicU8,
    /// Serializes validate+commit+broadcast so listeners observe phases in
    /// commit order
    commit_lock: Mutex<()>,
    transition_time_ms: AtomicU64,
    retry_count: AtomicU32,
    running: AtomicBool,
    last_result: RwLock<Option<RecoveryResult>>,
    phase_listeners: Arc<Registry<dyn PhaseListener>>,
    observers: Arc<RecoveryObservers>,
    strategy: RwLock<Option<Arc<dyn RecoveryStrategy>>>,
    tracker: RwLock<Option<Arc<OperationTracker>>>,
}

impl RecoveryCoordinator {
    pub fn new(partition: PartitionId, config: FaultConfig) -> Arc<Self> {
        Arc::new(Self {
            partition,
            config,
            clock: RwLock::new(Arc::new(SystemClock::new())),
            phase: AtomicU8::new(RecoveryPhase::Idle as u8),
            commit_lock: Mutex::new(()),
            transition_time_ms: AtomicU64::new(0),
            retry_count: AtomicU32::new(0),
            running: AtomicBool::new(false),
            last_result: RwLock::new(None),
            phase_listeners: Registry::new(),
            observers: Arc::new(RecoveryObservers::new()),
            strategy: RwLock::new(None),
            tracker: RwLock::new(None),
        })
    }

    /// The partition this coordinator is bound to
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Replace the clock; the next transition is stamped by the new clock
    pub fn set_clock(&self, clock: Arc<dyn Clock>) {
        *self.clock.write() = clock;
    }

    /// Use a strategy during the redistributing phase
    pub fn set_strategy(&self, strategy: Arc<dyn RecoveryStrategy>) {
        *self.strategy.write() = Some(strategy);
    }

    /// Borrow the subsystem tracker; recovery drains it before phase work
    pub fn attach_tracker(&self, tracker: Arc<OperationTracker>) {
        *self.tracker.write() = Some(tracker);
    }

    /// Subscribe to phase transitions
    pub fn subscribe(&self, listener: Arc<dyn PhaseListener>) -> Subscription {
        self.phase_listeners.register(listener)
    }

    /// Observer channel for progress and lifecycle events
    pub fn observers(&self) -> Arc<RecoveryObservers> {
        Arc::clone(&self.observers)
    }

    pub fn current_phase(&self) -> RecoveryPhase {
        RecoveryPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// Clock reading recorded at the most recent phase transition
    pub fn state_transition_time(&self) -> u64 {
        self.transition_time_ms.load(Ordering::SeqCst)
    }

    /// Reset a terminal machine to idle for another attempt
    ///
    /// Valid only from `Complete` or `Failed`.
    pub fn retry(&self) -> Result<()> {
        self.commit_phase(RecoveryPhase::Idle)?;
        let retries = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_result.write() = None;
        debug!(partition = %self.partition, retries, "recovery reset for retry");
        Ok(())
    }

    /// Run the recovery for the bound partition
    ///
    /// Returns immediately; the work runs in a spawned task and the handle
    /// resolves to the [`RecoveryResult`]. A `partition` other than the
    /// bound one is rejected synchronously. Must be called from within a
    /// tokio runtime.
    pub fn recover(
        self: &Arc<Self>,
        partition: PartitionId,
        handler: &Arc<FaultHandler>,
    ) -> Result<tokio::task::JoinHandle<RecoveryResult>> {
        if partition != self.partition {
            return Err(FaultError::Mismatch {
                expected: self.partition,
                actual: partition,
            });
        }
        let coordinator = Arc::clone(self);
        let handler = Arc::clone(handler);
        Ok(tokio::spawn(async move { coordinator.run(handler).await }))
    }

    /// Trigger recovery from classifier failures
    ///
    /// Subscribes to the classifier; a symptom-driven failure of the bound
    /// partition starts a recovery when the coordinator is idle. Must be
    /// called from within a tokio runtime.
    pub fn watch(self: &Arc<Self>, handler: &Arc<FaultHandler>) -> Subscription {
        let partition = self.partition;
        let coordinator_weak = Arc::downgrade(self);
        let handler_weak = Arc::downgrade(handler);

        handler.subscribe(Arc::new(move |event: &PartitionChangeEvent| {
            if event.partition != partition
                || event.new_status != PartitionStatus::Failed
                || event.old_status == PartitionStatus::Recovering
            {
                return;
            }
            let (Some(coordinator), Some(handler)) =
                (coordinator_weak.upgrade(), handler_weak.upgrade())
            else {
                return;
            };
            if coordinator.current_phase() != RecoveryPhase::Idle {
                return;
            }
            if let Err(error) = coordinator.recover(partition, &handler) {
                warn!(partition = %partition, %error, "failed to start watched recovery");
            }
        }))
    }

    async fn run(self: Arc<Self>, handler: Arc<FaultHandler>) -> RecoveryResult {
        // Re-invocation after success without retry() returns the prior
        // result without touching the machine.
        if self.current_phase() == RecoveryPhase::Complete {
            if let Some(previous) = self.last_result.read().clone() {
                debug!(partition = %self.partition, "recovery already complete");
                return RecoveryResult {
                    duration_ms: 0,
                    status_message: "recovery already complete".to_string(),
                    ..previous
                };
            }
        }

        let attempts = self.retry_count() + 1;
        let strategy = self.strategy.read().clone();
        let strategy_label = strategy
            .as_ref()
            .map(|s| s.strategy_name().to_string())
            .unwrap_or_else(|| "none".to_string());

        if self.running.swap(true, Ordering::SeqCst) {
            return RecoveryResult::failure(
                self.partition,
                0,
                strategy_label,
                attempts,
                "recovery already in progress",
            );
        }

        let started_ms = self.now_ms();
        metrics::record_recovery_started(&strategy_label);
        self.emit_event(RecoveryEventType::Started, format!("recovery attempt {attempts}"));
        handler.notify_recovery_started(self.partition);

        let outcome = self.drive(&handler, strategy).await;

        if let Some(tracker) = self.tracker.read().clone() {
            tracker.resume();
        }

        let duration_ms = self.now_ms().saturating_sub(started_ms);
        let result = match outcome {
            Ok(()) => {
                self.emit_event(
                    RecoveryEventType::Completed,
                    format!("recovery complete in {duration_ms} ms"),
                );
                RecoveryResult::success(
                    self.partition,
                    duration_ms,
                    strategy_label,
                    attempts,
                    "recovery complete",
                )
            }
            Err(reason) => {
                if self.current_phase().is_active() {
                    let _ = self.commit_phase(RecoveryPhase::Failed);
                }
                self.emit_event(RecoveryEventType::Failed, reason.clone());
                RecoveryResult::failure(self.partition, duration_ms, strategy_label, attempts, reason)
            }
        };

        handler.notify_recovery_complete(self.partition, result.success);
        metrics::record_recovery_completed(result.success, Duration::from_millis(duration_ms));
        *self.last_result.write() = Some(result.clone());
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn drive(
        &self,
        handler: &Arc<FaultHandler>,
        strategy: Option<Arc<dyn RecoveryStrategy>>,
    ) -> std::result::Result<(), String> {
        self.commit_phase(RecoveryPhase::Detecting)
            .map_err(|e| e.to_string())?;
        self.drain_in_flight().await?;

        self.commit_phase(RecoveryPhase::Redistributing)
            .map_err(|e| e.to_string())?;
        if let Some(strategy) = strategy {
            self.run_strategy(strategy, handler).await?;
        }

        self.commit_phase(RecoveryPhase::Rebalancing)
            .map_err(|e| e.to_string())?;
        self.commit_phase(RecoveryPhase::Validating)
            .map_err(|e| e.to_string())?;
        self.commit_phase(RecoveryPhase::Complete)
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Pause new operations and wait for in-flight ones to drain
    async fn drain_in_flight(&self) -> std::result::Result<(), String> {
        let Some(tracker) = self.tracker.read().clone() else {
            return Ok(());
        };
        let budget_ms = if self.config.recovery_timeout_ms > 0 {
            self.config.recovery_timeout_ms
        } else {
            MAX_DRAIN_WAIT_MS
        };
        let wait = Duration::from_millis(budget_ms);
        let drained = tokio::task::spawn_blocking(move || tracker.pause_and_wait(wait))
            .await
            .map_err(|e| format!("drain task failed: {e}"))?;
        if drained {
            Ok(())
        } else {
            Err(format!("in-flight operations did not drain within {budget_ms} ms"))
        }
    }

    /// Run the strategy in its own task so a panic surfaces as a failed
    /// result instead of unwinding through the coordinator
    async fn run_strategy(
        &self,
        strategy: Arc<dyn RecoveryStrategy>,
        handler: &Arc<FaultHandler>,
    ) -> std::result::Result<(), String> {
        let partition = self.partition;
        let handler = Arc::clone(handler);
        let mut task = tokio::spawn(async move { strategy.recover(partition, handler).await });

        let joined = if self.config.recovery_timeout_ms > 0 {
            let budget = Duration::from_millis(self.config.recovery_timeout_ms);
            match tokio::time::timeout(budget, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(FaultError::Timeout(self.config.recovery_timeout_ms).to_string());
                }
            }
        } else {
            task.await
        };

        let result = joined.map_err(|e| format!("recovery strategy panicked: {e}"))?;
        if result.success {
            Ok(())
        } else {
            Err(result
                .failure_reason
                .unwrap_or_else(|| FaultError::Strategy("strategy reported failure".into()).to_string()))
        }
    }

    fn commit_phase(&self, next: RecoveryPhase) -> Result<()> {
        let _commit = self.commit_lock.lock();
        let current = self.current_phase();
        if !current.can_transition_to(next) {
            return Err(FaultError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        let now = self.clock.read().now_ms();
        self.phase.store(next as u8, Ordering::SeqCst);
        self.transition_time_ms.store(now, Ordering::SeqCst);

        debug!(partition = %self.partition, phase = next.as_str(), "recovery phase committed");
        metrics::record_phase_transition(next.as_str());

        let partition = self.partition;
        self.phase_listeners
            .each(|listener| listener.on_phase(partition, next));
        Ok(())
    }

    fn emit_event(&self, event_type: RecoveryEventType, details: String) {
        self.observers.emit_event(RecoveryEvent {
            partition: self.partition,
            event_type,
            details,
            timestamp_ms: self.now_ms(),
        });
    }

    fn now_ms(&self) -> u64 {
        self.clock.read().now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    fn test_handler() -> Arc<FaultHandler> {
        FaultHandler::with_clock(
            FaultConfig::default().with_auto_recovery(false),
            Arc::new(TestClock::new(0)),
        )
        .unwrap()
    }

    fn recorded_phases(
        coordinator: &Arc<RecoveryCoordinator>,
    ) -> (Arc<Mutex<Vec<RecoveryPhase>>>, Subscription) {
        let phases: Arc<Mutex<Vec<RecoveryPhase>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let subscription = coordinator.subscribe(Arc::new(
            move |_partition: PartitionId, phase: RecoveryPhase| {
                sink.lock().push(phase);
            },
        ));
        (phases, subscription)
    }

    #[tokio::test]
    async fn test_mismatched_partition_rejected_synchronously() {
        let handler = test_handler();
        let coordinator = RecoveryCoordinator::new(PartitionId::new(), FaultConfig::default());

        let other = PartitionId::new();
        match coordinator.recover(other, &handler) {
            Err(FaultError::Mismatch { expected, actual }) => {
                assert_eq!(expected, coordinator.partition());
                assert_eq!(actual, other);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_full_phase_sequence_on_success() {
        let handler = test_handler();
        let partition = PartitionId::new();
        handler.report_barrier_timeout(partition);
        handler.report_sync_failure(partition);

        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());
        let (phases, _subscription) = recorded_phases(&coordinator);

        let result = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.attempts_needed, 1);
        assert_eq!(
            *phases.lock(),
            vec![
                RecoveryPhase::Detecting,
                RecoveryPhase::Redistributing,
                RecoveryPhase::Rebalancing,
                RecoveryPhase::Validating,
                RecoveryPhase::Complete,
            ]
        );
        assert_eq!(coordinator.current_phase(), RecoveryPhase::Complete);
        assert_eq!(handler.check_health(partition), PartitionStatus::Healthy);
    }

    #[tokio::test]
    async fn test_recover_after_complete_is_idempotent() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());

        let first = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(first.success);

        let (phases, _subscription) = recorded_phases(&coordinator);
        let second = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();

        assert!(second.success);
        assert_eq!(second.duration_ms, 0);
        assert_eq!(second.attempts_needed, first.attempts_needed);
        assert!(phases.lock().is_empty(), "no phase transitions on re-invoke");
    }

    #[tokio::test]
    async fn test_retry_resets_machine_and_counts_attempts() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());

        // retry from idle is invalid
        assert!(matches!(
            coordinator.retry(),
            Err(FaultError::InvalidTransition { .. })
        ));

        let first = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(first.success);
        assert_eq!(first.attempts_needed, 1);

        coordinator.retry().unwrap();
        assert_eq!(coordinator.current_phase(), RecoveryPhase::Idle);
        assert_eq!(coordinator.retry_count(), 1);

        let second = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(second.success);
        assert_eq!(second.attempts_needed, 2);
    }

    struct AlwaysFailing {
        config: FaultConfig,
    }

    #[async_trait]
    impl RecoveryStrategy for AlwaysFailing {
        async fn recover(&self, partition: PartitionId, _handler: Arc<FaultHandler>) -> RecoveryResult {
            RecoveryResult::failure(partition, 0, "always-failing", 1, "redistribution refused")
        }

        fn can_recover(&self, _partition: PartitionId, _handler: &FaultHandler) -> bool {
            true
        }

        fn strategy_name(&self) -> &str {
            "always-failing"
        }

        fn configuration(&self) -> &FaultConfig {
            &self.config
        }
    }

    #[tokio::test]
    async fn test_strategy_failure_lands_on_failed_phase() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());
        coordinator.set_strategy(Arc::new(AlwaysFailing {
            config: FaultConfig::default(),
        }));

        let (phases, _subscription) = recorded_phases(&coordinator);
        let result = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.failure_reason.as_deref(), Some("redistribution refused"));
        assert_eq!(coordinator.current_phase(), RecoveryPhase::Failed);
        assert_eq!(
            *phases.lock(),
            vec![
                RecoveryPhase::Detecting,
                RecoveryPhase::Redistributing,
                RecoveryPhase::Failed,
            ]
        );
        assert_eq!(handler.check_health(partition), PartitionStatus::Failed);
    }

    struct FlakyStrategy {
        config: FaultConfig,
        calls: AtomicU32,
        failures_before_success: u32,
    }

    #[async_trait]
    impl RecoveryStrategy for FlakyStrategy {
        async fn recover(&self, partition: PartitionId, _handler: Arc<FaultHandler>) -> RecoveryResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures_before_success {
                RecoveryResult::failure(partition, 0, "flaky", 1, format!("transient failure {call}"))
            } else {
                RecoveryResult::success(partition, 0, "flaky", 1, "recovered")
            }
        }

        fn can_recover(&self, _partition: PartitionId, _handler: &FaultHandler) -> bool {
            true
        }

        fn strategy_name(&self) -> &str {
            "flaky"
        }

        fn configuration(&self) -> &FaultConfig {
            &self.config
        }
    }

    #[tokio::test]
    async fn test_retry_loop_succeeds_on_third_attempt() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let config = FaultConfig::default().with_max_recovery_retries(3);
        let coordinator = RecoveryCoordinator::new(partition, config.clone());
        coordinator.set_strategy(Arc::new(FlakyStrategy {
            config,
            calls: AtomicU32::new(0),
            failures_before_success: 2,
        }));

        let mut result = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        let mut attempt = 1;
        while !result.success && attempt < coordinator.config.max_recovery_retries {
            coordinator.retry().unwrap();
            result = coordinator
                .recover(partition, &handler)
                .unwrap()
                .await
                .unwrap();
            attempt += 1;
        }

        assert!(result.success);
        assert_eq!(result.attempts_needed, 3);
        assert_eq!(coordinator.retry_count(), 2);
    }

    #[tokio::test]
    async fn test_recover_after_failure_without_retry_reports_invariant() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());
        coordinator.set_strategy(Arc::new(AlwaysFailing {
            config: FaultConfig::default(),
        }));

        let first = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(!first.success);

        let second = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(!second.success);
        assert!(second
            .failure_reason
            .unwrap()
            .contains("invalid recovery phase transition"));
    }

    #[tokio::test]
    async fn test_transition_times_use_injected_clock() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());

        let clock = Arc::new(TestClock::new(1000));
        coordinator.set_clock(clock.clone());
        clock.advance(500);

        let result = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(result.success);
        assert!(coordinator.state_transition_time() >= 1500);

        // a backward clock jump after completion does not change the phase
        clock.set(100);
        assert_eq!(coordinator.current_phase(), RecoveryPhase::Complete);
    }

    #[tokio::test]
    async fn test_drain_timeout_fails_recovery_and_resumes_tracker() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let config = FaultConfig::default().with_recovery_timeout_ms(50);
        let coordinator = RecoveryCoordinator::new(partition, config);

        let tracker = Arc::new(OperationTracker::new());
        coordinator.attach_tracker(Arc::clone(&tracker));
        let token = tracker.begin().unwrap();

        let result = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.failure_reason.unwrap().contains("did not drain"));
        assert_eq!(coordinator.current_phase(), RecoveryPhase::Failed);
        assert!(!tracker.is_paused(), "tracker resumed after failed recovery");

        token.release();
        coordinator.retry().unwrap();
        let result = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(result.success);
    }

    struct PanickingStrategy {
        config: FaultConfig,
    }

    #[async_trait]
    impl RecoveryStrategy for PanickingStrategy {
        async fn recover(&self, _partition: PartitionId, _handler: Arc<FaultHandler>) -> RecoveryResult {
            panic!("strategy exploded");
        }

        fn can_recover(&self, _partition: PartitionId, _handler: &FaultHandler) -> bool {
            true
        }

        fn strategy_name(&self) -> &str {
            "panicking"
        }

        fn configuration(&self) -> &FaultConfig {
            &self.config
        }
    }

    #[tokio::test]
    async fn test_panicking_strategy_becomes_failed_result() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());
        coordinator.set_strategy(Arc::new(PanickingStrategy {
            config: FaultConfig::default(),
        }));

        let result = coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.failure_reason.unwrap().contains("panicked"));
        assert_eq!(coordinator.current_phase(), RecoveryPhase::Failed);
    }

    #[tokio::test]
    async fn test_lifecycle_events_published() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());

        struct Sink {
            events: Mutex<Vec<RecoveryEventType>>,
        }
        impl crate::observer::RecoveryObserver for Sink {
            fn on_event(&self, event: &RecoveryEvent) {
                self.events.lock().push(event.event_type);
            }
        }
        let sink = Arc::new(Sink {
            events: Mutex::new(Vec::new()),
        });
        let _subscription = coordinator.observers().register(sink.clone());

        coordinator
            .recover(partition, &handler)
            .unwrap()
            .await
            .unwrap();

        let events = sink.events.lock();
        assert_eq!(
            *events,
            vec![RecoveryEventType::Started, RecoveryEventType::Completed]
        );
    }

    #[tokio::test]
    async fn test_watch_triggers_recovery_on_failure() {
        let handler = test_handler();
        let partition = PartitionId::new();
        let coordinator = RecoveryCoordinator::new(partition, FaultConfig::default());
        let _watch = coordinator.watch(&handler);

        handler.report_barrier_timeout(partition);
        handler.report_sync_failure(partition);

        for _ in 0..100 {
            if handler.check_health(partition) == PartitionStatus::Healthy {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(handler.check_health(partition), PartitionStatus::Healthy);
        assert_eq!(coordinator.current_phase(), RecoveryPhase::Complete);
    }
}
