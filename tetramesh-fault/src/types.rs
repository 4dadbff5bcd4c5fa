//! Core fault-subsystem types: partition identity, status, events,
//! recovery phases, results, views, and aggregate metrics.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit partition identifier
///
/// Globally unique and immutable. Partitions are the unit of fault
/// classification and recovery; each owns a subset of the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(Uuid);

impl PartitionId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PartitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Health status of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStatus {
    /// Partition is participating normally
    Healthy,
    /// Partition showed a symptom but may recover on its own
    Suspected,
    /// Partition is confirmed faulted
    Failed,
    /// A recovery is in progress for this partition
    Recovering,
}

impl Default for PartitionStatus {
    fn default() -> Self {
        PartitionStatus::Healthy
    }
}

impl PartitionStatus {
    /// Get status as a string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStatus::Healthy => "healthy",
            PartitionStatus::Suspected => "suspected",
            PartitionStatus::Failed => "failed",
            PartitionStatus::Recovering => "recovering",
        }
    }

    /// Whether a recovery may be started from this status
    pub fn can_recover(&self) -> bool {
        matches!(self, PartitionStatus::Suspected | PartitionStatus::Failed)
    }
}

impl fmt::Display for PartitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged fault event published on the broadcast stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PartitionFaultEvent {
    Suspected {
        partition: PartitionId,
        timestamp_ms: u64,
        reason: String,
    },
    Failed {
        partition: PartitionId,
        timestamp_ms: u64,
        reason: String,
    },
    Recovered {
        partition: PartitionId,
        timestamp_ms: u64,
    },
}

impl PartitionFaultEvent {
    pub fn partition(&self) -> PartitionId {
        match self {
            PartitionFaultEvent::Suspected { partition, .. }
            | PartitionFaultEvent::Failed { partition, .. }
            | PartitionFaultEvent::Recovered { partition, .. } => *partition,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            PartitionFaultEvent::Suspected { timestamp_ms, .. }
            | PartitionFaultEvent::Failed { timestamp_ms, .. }
            | PartitionFaultEvent::Recovered { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    /// Derive the tagged event for a status change, if one applies
    pub fn from_change(change: &PartitionChangeEvent) -> Option<Self> {
        match change.new_status {
            PartitionStatus::Suspected => Some(PartitionFaultEvent::Suspected {
                partition: change.partition,
                timestamp_ms: change.timestamp_ms,
                reason: change.reason.clone(),
            }),
            PartitionStatus::Failed => Some(PartitionFaultEvent::Failed {
                partition: change.partition,
                timestamp_ms: change.timestamp_ms,
                reason: change.reason.clone(),
            }),
            PartitionStatus::Healthy => Some(PartitionFaultEvent::Recovered {
                partition: change.partition,
                timestamp_ms: change.timestamp_ms,
            }),
            PartitionStatus::Recovering => None,
        }
    }
}

/// Event emitted by the classifier on every non-identity transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionChangeEvent {
    pub partition: PartitionId,
    pub old_status: PartitionStatus,
    pub new_status: PartitionStatus,
    pub timestamp_ms: u64,
    pub reason: String,
}

/// Phase of a recovery run
///
/// ```text
/// Idle → Detecting → Redistributing → Rebalancing → Validating → Complete
///           ↓              ↓               ↓             ↓
///         Failed         Failed          Failed        Failed
///
/// Complete → Idle and Failed → Idle reset the machine for a retry.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RecoveryPhase {
    /// No recovery in progress
    Idle = 0,
    /// Confirming the fault and draining in-flight operations
    Detecting = 1,
    /// Redistributing the partition's data (strategy runs here)
    Redistributing = 2,
    /// Rebalancing load across surviving partitions
    Rebalancing = 3,
    /// Verifying the partition is consistent and responsive
    Validating = 4,
    /// Recovery finished successfully
    Complete = 5,
    /// Recovery failed
    Failed = 6,
}

impl Default for RecoveryPhase {
    fn default() -> Self {
        RecoveryPhase::Idle
    }
}

impl RecoveryPhase {
    /// Get phase as a string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryPhase::Idle => "idle",
            RecoveryPhase::Detecting => "detecting",
            RecoveryPhase::Redistributing => "redistributing",
            RecoveryPhase::Rebalancing => "rebalancing",
            RecoveryPhase::Validating => "validating",
            RecoveryPhase::Complete => "complete",
            RecoveryPhase::Failed => "failed",
        }
    }

    /// Terminal phases: no transition happens without an explicit reset
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecoveryPhase::Idle | RecoveryPhase::Complete | RecoveryPhase::Failed
        )
    }

    /// Phases in which recovery work is running
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `next` is a legal transition from this phase
    pub fn can_transition_to(&self, next: RecoveryPhase) -> bool {
        use RecoveryPhase::*;
        match (*self, next) {
            (Idle, Detecting) => true,
            (Detecting, Redistributing) => true,
            (Redistributing, Rebalancing) => true,
            (Rebalancing, Validating) => true,
            (Validating, Complete) => true,
            (from, Failed) => from.is_active(),
            (Complete, Idle) | (Failed, Idle) => true,
            _ => false,
        }
    }

    pub(crate) fn from_u8(value: u8) -> RecoveryPhase {
        match value {
            1 => RecoveryPhase::Detecting,
            2 => RecoveryPhase::Redistributing,
            3 => RecoveryPhase::Rebalancing,
            4 => RecoveryPhase::Validating,
            5 => RecoveryPhase::Complete,
            6 => RecoveryPhase::Failed,
            _ => RecoveryPhase::Idle,
        }
    }
}

impl fmt::Display for RecoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one recovery invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub partition: PartitionId,
    pub success: bool,
    pub duration_ms: u64,
    pub strategy_name: String,
    /// Attempt count at completion; at least 1 even on failure
    pub attempts_needed: u32,
    pub status_message: String,
    pub failure_reason: Option<String>,
}

impl RecoveryResult {
    pub fn success(
        partition: PartitionId,
        duration_ms: u64,
        strategy_name: impl Into<String>,
        attempts_needed: u32,
        status_message: impl Into<String>,
    ) -> Self {
        Self {
            partition,
            success: true,
            duration_ms,
            strategy_name: strategy_name.into(),
            attempts_needed: attempts_needed.max(1),
            status_message: status_message.into(),
            failure_reason: None,
        }
    }

    pub fn failure(
        partition: PartitionId,
        duration_ms: u64,
        strategy_name: impl Into<String>,
        attempts_needed: u32,
        failure_reason: impl Into<String>,
    ) -> Self {
        let reason = failure_reason.into();
        Self {
            partition,
            success: false,
            duration_ms,
            strategy_name: strategy_name.into(),
            attempts_needed: attempts_needed.max(1),
            status_message: format!("recovery failed: {reason}"),
            failure_reason: Some(reason),
        }
    }
}

/// Read-only snapshot of a partition's classified state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionView {
    pub partition: PartitionId,
    pub status: PartitionStatus,
    /// Last time (injected clock) the classifier touched this partition
    pub last_seen_ms: u64,
    /// Nodes known to belong to the partition
    pub node_count: usize,
    /// Nodes without a recorded heartbeat failure
    pub healthy_node_count: usize,
    pub metrics: FaultMetrics,
}

/// Aggregate fault and recovery counters
///
/// Merging takes the max of latency fields and the sum of counts, so the
/// operation is commutative and associative with the zero value as identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultMetrics {
    pub detection_latency_ms: u64,
    pub recovery_latency_ms: u64,
    pub failure_count: u64,
    pub recovery_attempts: u64,
    pub successful_recoveries: u64,
    pub failed_recoveries: u64,
}

impl FaultMetrics {
    /// Fraction of recoveries that succeeded; 0.0 when none completed
    pub fn success_rate(&self) -> f64 {
        let total = self.successful_recoveries + self.failed_recoveries;
        if total == 0 {
            0.0
        } else {
            self.successful_recoveries as f64 / total as f64
        }
    }

    /// Combine with another metrics record
    pub fn merge(&self, other: &FaultMetrics) -> FaultMetrics {
        FaultMetrics {
            detection_latency_ms: self.detection_latency_ms.max(other.detection_latency_ms),
            recovery_latency_ms: self.recovery_latency_ms.max(other.recovery_latency_ms),
            failure_count: self.failure_count + other.failure_count,
            recovery_attempts: self.recovery_attempts + other.recovery_attempts,
            successful_recoveries: self.successful_recoveries + other.successful_recoveries,
            failed_recoveries: self.failed_recoveries + other.failed_recoveries,
        }
    }
}
