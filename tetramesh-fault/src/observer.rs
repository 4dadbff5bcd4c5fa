//! Recovery progress and lifecycle event observers
//!
//! Orthogonal to classifier listeners: observers receive strategy progress
//! reports and coordinator lifecycle events, never status transitions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::listener::{Registry, Subscription};
use crate::metrics;
use crate::types::PartitionId;

/// Progress report published by a running recovery strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryProgress {
    pub partition: PartitionId,
    pub phase_label: String,
    /// Percent complete, 0 to 100
    pub percent: u8,
    /// Milliseconds since the strategy started
    pub elapsed_ms: u64,
    pub message: String,
}

/// Lifecycle event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEventType {
    Started,
    Validation,
    Barrier,
    Verification,
    Completed,
    Failed,
}

impl RecoveryEventType {
    /// Get event type as a string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryEventType::Started => "started",
            RecoveryEventType::Validation => "validation",
            RecoveryEventType::Barrier => "barrier",
            RecoveryEventType::Verification => "verification",
            RecoveryEventType::Completed => "completed",
            RecoveryEventType::Failed => "failed",
        }
    }
}

/// Lifecycle event published by coordinators and strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub partition: PartitionId,
    pub event_type: RecoveryEventType,
    pub details: String,
    pub timestamp_ms: u64,
}

/// Observer of recovery progress and lifecycle events
///
/// Both methods default to no-ops so an observer can subscribe to a single
/// stream.
pub trait RecoveryObserver: Send + Sync {
    fn on_progress(&self, _progress: &RecoveryProgress) {}
    fn on_event(&self, _event: &RecoveryEvent) {}
}

/// Shared observer channel
///
/// Coordinators and strategies publish through a common channel so one
/// subscription covers a whole recovery pipeline.
pub struct RecoveryObservers {
    registry: Arc<Registry<dyn RecoveryObserver>>,
}

impl RecoveryObservers {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn register(&self, observer: Arc<dyn RecoveryObserver>) -> Subscription {
        self.registry.register(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.registry.len()
    }

    pub fn emit_progress(&self, progress: RecoveryProgress) {
        self.registry.each(|observer| observer.on_progress(&progress));
    }

    pub fn emit_event(&self, event: RecoveryEvent) {
        metrics::record_recovery_event(event.event_type.as_str());
        self.registry.each(|observer| observer.on_event(&event));
    }
}

impl Default for RecoveryObservers {
    fn default() -> Self {
        Self::new()
    }
}
