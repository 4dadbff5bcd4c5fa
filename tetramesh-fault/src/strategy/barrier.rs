//! Barrier-synchronization recovery
//!
//! Recovers a partition by running a logical barrier across the active
//! ranks in the topology, then verifying the partition answers health
//! queries again. Failed attempts retry with exponential backoff.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::RecoveryStrategy;
use crate::clock::Clock;
use crate::config::FaultConfig;
use crate::error::FaultError;
use crate::handler::FaultHandler;
use crate::observer::{RecoveryEvent, RecoveryEventType, RecoveryObservers, RecoveryProgress};
use crate::topology::TopologyRegistry;
use crate::types::{PartitionId, PartitionStatus, RecoveryResult};

const STRATEGY_NAME: &str = "barrier-sync";

/// Backoff for the first failed attempt; doubles per attempt after that
const INITIAL_BACKOFF_MS: u64 = 100;

/// Recovery through a logical barrier synchronization
pub struct BarrierSyncRecovery {
    config: FaultConfig,
    topology: Arc<TopologyRegistry>,
    clock: Arc<dyn Clock>,
    observers: Arc<RecoveryObservers>,
}

impl BarrierSyncRecovery {
    pub fn new(config: FaultConfig, topology: Arc<TopologyRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            topology,
            clock,
            observers: Arc::new(RecoveryObservers::new()),
        }
    }

    /// Publish progress and events to a shared observer channel
    pub fn with_observers(mut self, observers: Arc<RecoveryObservers>) -> Self {
        self.observers = observers;
        self
    }

    pub fn observers(&self) -> Arc<RecoveryObservers> {
        Arc::clone(&self.observers)
    }

    fn emit_event(&self, partition: PartitionId, event_type: RecoveryEventType, details: String) {
        self.observers.emit_event(RecoveryEvent {
            partition,
            event_type,
            details,
            timestamp_ms: self.clock.now_ms(),
        });
    }

    fn emit_progress(
        &self,
        partition: PartitionId,
        started_ms: u64,
        phase_label: &str,
        percent: u8,
        message: String,
    ) {
        self.observers.emit_progress(RecoveryProgress {
            partition,
            phase_label: phase_label.to_string(),
            percent,
            elapsed_ms: self.clock.now_ms().saturating_sub(started_ms),
            message,
        });
    }

    /// One barrier attempt, bounded by `recovery_timeout_ms` when nonzero
    async fn attempt(
        &self,
        partition: PartitionId,
        handler: &Arc<FaultHandler>,
        started_ms: u64,
    ) -> std::result::Result<(), String> {
        let barrier = self.barrier_sync(partition, handler, started_ms);
        if self.config.recovery_timeout_ms > 0 {
            match tokio::time::timeout(
                Duration::from_millis(self.config.recovery_timeout_ms),
                barrier,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(FaultError::Timeout(self.config.recovery_timeout_ms).to_string()),
            }
        } else {
            barrier.await
        }
    }

    async fn barrier_sync(
        &self,
        partition: PartitionId,
        handler: &Arc<FaultHandler>,
        started_ms: u64,
    ) -> std::result::Result<(), String> {
        let Some(rank) = self.topology.rank_for(partition) else {
            return Err(format!("no rank registered for partition {partition}"));
        };
        let peers = self.topology.active_ranks();
        self.emit_event(
            partition,
            RecoveryEventType::Barrier,
            format!("barrier sync from rank {rank} across {} active ranks", peers.len()),
        );

        for (index, peer) in peers.iter().enumerate() {
            // Yield between peers so a barrier over a large topology does
            // not monopolize the worker.
            tokio::task::yield_now().await;
            let percent = ((index + 1) * 90 / peers.len()) as u8;
            self.emit_progress(
                partition,
                started_ms,
                "barrier",
                percent,
                format!("rank {peer} joined the barrier"),
            );
        }

        self.emit_event(
            partition,
            RecoveryEventType::Verification,
            "verifying partition responsiveness".to_string(),
        );
        handler.mark_healthy(partition);
        if handler.check_health(partition) == PartitionStatus::Healthy {
            Ok(())
        } else {
            Err("partition did not report healthy after barrier".to_string())
        }
    }
}

#[async_trait]
impl RecoveryStrategy for BarrierSyncRecovery {
    async fn recover(&self, partition: PartitionId, handler: Arc<FaultHandler>) -> RecoveryResult {
        let started_ms = self.clock.now_ms();
        self.emit_event(
            partition,
            RecoveryEventType::Validation,
            "validating partition state".to_string(),
        );
        self.emit_progress(partition, started_ms, "validate", 0, "validating partition state".into());

        if !handler.is_known(partition) {
            return RecoveryResult::failure(
                partition,
                self.clock.now_ms().saturating_sub(started_ms),
                STRATEGY_NAME,
                1,
                FaultError::UnknownPartition(partition).to_string(),
            );
        }
        // Accept Recovering as well: the classifier flips the partition to
        // Recovering before the strategy runs.
        let status = handler.check_health(partition);
        if status == PartitionStatus::Healthy {
            return RecoveryResult::failure(
                partition,
                self.clock.now_ms().saturating_sub(started_ms),
                STRATEGY_NAME,
                1,
                format!("partition is {status}, nothing to recover"),
            );
        }

        let max_attempts = self.config.max_recovery_retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            match self.attempt(partition, &handler, started_ms).await {
                Ok(()) => {
                    let elapsed = self.clock.now_ms().saturating_sub(started_ms);
                    self.emit_progress(
                        partition,
                        started_ms,
                        "verify",
                        100,
                        "barrier recovery complete".into(),
                    );
                    return RecoveryResult::success(
                        partition,
                        elapsed,
                        STRATEGY_NAME,
                        attempt,
                        format!("barrier recovery complete after {attempt} attempt(s)"),
                    );
                }
                Err(reason) => {
                    warn!(
                        partition = %partition,
                        attempt,
                        max_attempts,
                        reason = reason.as_str(),
                        "barrier attempt failed"
                    );
                    last_error = reason;
                    if attempt < max_attempts {
                        let backoff_ms = INITIAL_BACKOFF_MS << (attempt - 1);
                        debug!(backoff_ms, "backing off before next barrier attempt");
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }

        RecoveryResult::failure(
            partition,
            self.clock.now_ms().saturating_sub(started_ms),
            STRATEGY_NAME,
            max_attempts,
            last_error,
        )
    }

    fn can_recover(&self, partition: PartitionId, handler: &FaultHandler) -> bool {
        handler.is_known(partition) && handler.check_health(partition) != PartitionStatus::Healthy
    }

    fn strategy_name(&self) -> &str {
        STRATEGY_NAME
    }

    fn configuration(&self) -> &FaultConfig {
        &self.config
    }
}
