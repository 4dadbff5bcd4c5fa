//! Cascading recovery
//!
//! Recovers a primary partition together with its declared dependents. A
//! delegate strategy does the per-partition work; the cascade orchestrates
//! ordering and aggregates partial failures into one diagnostic.
//!
//! The same dependency declaration also drives failure propagation: a
//! watched primary that fails drags its dependents down one cascade delay
//! apart, which is how the fault injection harness models correlated
//! outages.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::RecoveryStrategy;
use crate::clock::Clock;
use crate::config::FaultConfig;
use crate::handler::FaultHandler;
use crate::listener::Subscription;
use crate::observer::{RecoveryObservers, RecoveryProgress};
use crate::types::{PartitionChangeEvent, PartitionId, PartitionStatus, RecoveryResult};

const STRATEGY_NAME: &str = "cascading";

/// Recovery of a primary partition and its dependents
pub struct CascadingRecovery {
    config: FaultConfig,
    primary: PartitionId,
    dependents: Vec<PartitionId>,
    delegate: Arc<dyn RecoveryStrategy>,
    clock: Arc<dyn Clock>,
    cascade_delay_ms: u64,
    observers: Arc<RecoveryObservers>,
}

impl CascadingRecovery {
    pub fn new(
        config: FaultConfig,
        primary: PartitionId,
        dependents: Vec<PartitionId>,
        delegate: Arc<dyn RecoveryStrategy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            primary,
            dependents,
            delegate,
            clock,
            cascade_delay_ms: 0,
            observers: Arc::new(RecoveryObservers::new()),
        }
    }

    /// Delay between dependent failures during propagation
    pub fn with_cascade_delay_ms(mut self, delay_ms: u64) -> Self {
        self.cascade_delay_ms = delay_ms;
        self
    }

    /// Publish progress to a shared observer channel
    pub fn with_observers(mut self, observers: Arc<RecoveryObservers>) -> Self {
        self.observers = observers;
        self
    }

    pub fn observers(&self) -> Arc<RecoveryObservers> {
        Arc::clone(&self.observers)
    }

    pub fn dependents(&self) -> &[PartitionId] {
        &self.dependents
    }

    /// Propagate primary failures to dependents
    ///
    /// Subscribes to the classifier; when the primary fails from a symptom
    /// (not from a failed recovery), each dependent is driven to failed one
    /// cascade delay apart. Must be called from within a tokio runtime.
    pub fn watch(&self, handler: &Arc<FaultHandler>) -> Subscription {
        let primary = self.primary;
        let dependents = self.dependents.clone();
        let delay_ms = self.cascade_delay_ms;
        let handler_weak = Arc::downgrade(handler);

        handler.subscribe(Arc::new(move |event: &PartitionChangeEvent| {
            if event.partition != primary
                || event.new_status != PartitionStatus::Failed
                || event.old_status == PartitionStatus::Recovering
            {
                return;
            }
            let Some(handler) = handler_weak.upgrade() else {
                return;
            };
            let dependents = dependents.clone();
            info!(
                primary = %primary,
                dependents = dependents.len(),
                delay_ms,
                "primary failed; cascading to dependents"
            );
            tokio::spawn(async move {
                for dependent in dependents {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    warn!(
                        partition = %dependent,
                        primary = %primary,
                        "cascading failure"
                    );
                    handler
                        .inject_cascade_failure(dependent, &format!("cascading failure from {primary}"));
                }
            });
        }))
    }

    fn progress(&self, started_ms: u64, percent: u8, message: String) {
        self.observers.emit_progress(RecoveryProgress {
            partition: self.primary,
            phase_label: "cascade".to_string(),
            percent,
            elapsed_ms: self.clock.now_ms().saturating_sub(started_ms),
            message,
        });
    }
}

#[async_trait]
impl RecoveryStrategy for CascadingRecovery {
    async fn recover(&self, partition: PartitionId, handler: Arc<FaultHandler>) -> RecoveryResult {
        let started_ms = self.clock.now_ms();
        if partition != self.primary {
            return RecoveryResult::failure(
                partition,
                0,
                STRATEGY_NAME,
                1,
                format!("cascading recovery is bound to {}", self.primary),
            );
        }

        self.progress(started_ms, 0, format!("recovering primary {partition}"));
        let primary_result = self.delegate.recover(partition, Arc::clone(&handler)).await;
        if !primary_result.success {
            let reason = primary_result
                .failure_reason
                .unwrap_or_else(|| "unknown".to_string());
            return RecoveryResult::failure(
                partition,
                self.clock.now_ms().saturating_sub(started_ms),
                STRATEGY_NAME,
                1,
                format!("primary {partition} failed: {reason}"),
            );
        }

        self.progress(
            started_ms,
            50,
            format!("primary recovered; recovering {} dependents", self.dependents.len()),
        );
        let recoveries = self.dependents.iter().map(|dependent| {
            let delegate = Arc::clone(&self.delegate);
            let handler = Arc::clone(&handler);
            let dependent = *dependent;
            async move { (dependent, delegate.recover(dependent, handler).await) }
        });
        let results = join_all(recoveries).await;

        let failures: Vec<String> = results
            .iter()
            .filter(|(_, result)| !result.success)
            .map(|(dependent, result)| {
                format!(
                    "dependent {dependent}: {}",
                    result.failure_reason.as_deref().unwrap_or("unknown")
                )
            })
            .collect();

        let elapsed = self.clock.now_ms().saturating_sub(started_ms);
        if failures.is_empty() {
            self.progress(started_ms, 100, "cascade recovery complete".to_string());
            RecoveryResult::success(
                partition,
                elapsed,
                STRATEGY_NAME,
                1,
                format!(
                    "recovered primary and {} dependent partition(s)",
                    self.dependents.len()
                ),
            )
        } else {
            debug!(
                primary = %partition,
                failed = failures.len(),
                total = self.dependents.len(),
                "cascade recovery partially failed"
            );
            RecoveryResult::failure(partition, elapsed, STRATEGY_NAME, 1, failures.join("; "))
        }
    }

    fn can_recover(&self, partition: PartitionId, handler: &FaultHandler) -> bool {
        partition == self.primary && self.delegate.can_recover(partition, handler)
    }

    fn strategy_name(&self) -> &str {
        STRATEGY_NAME
    }

    fn configuration(&self) -> &FaultConfig {
        &self.config
    }
}
