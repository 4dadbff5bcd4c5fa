//! TetraMesh Fault - Partition fault detection and recovery
//!
//! This crate classifies partition health from externally reported
//! symptoms, gates coordination work while a faulted partition recovers,
//! and drives a multi-phase recovery state machine. Spatial indexing,
//! ghost/balance wire formats, and membership discovery live elsewhere in
//! TetraMesh; this crate only consumes their symptom reports.
//!
//! # Architecture
//!
//! - **Handler**: per-partition status state machine publishing change
//!   events to subscribers
//! - **Tracker**: counting barrier that pauses new coordination work and
//!   drains in-flight operations before recovery
//! - **Coordinator**: phase-driven recovery controller with retry support
//!   and phase broadcasts
//! - **Strategies**: pluggable recovery policies (no-op, barrier-sync,
//!   cascading)
//! - **Topology**: partition-to-rank registry consulted by strategies
//! - **Clock**: injectable millisecond time source; tests run on a manual
//!   clock
//!
//! # Key operations
//!
//! - Symptom reports: barrier timeout, sync failure, heartbeat failure,
//!   symptom latency
//! - Recovery: initiate, notify start/completion, retry, phase listeners
//! - Observability: change events, fault-event broadcast, progress and
//!   lifecycle observers, aggregate metrics

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handler;
pub mod listener;
pub mod metrics;
pub mod observer;
pub mod strategy;
pub mod topology;
pub mod tracker;
pub mod types;

pub use clock::{Clock, SystemClock, TestClock};
pub use config::FaultConfig;
pub use coordinator::RecoveryCoordinator;
pub use error::{FaultError, Result};
pub use handler::FaultHandler;
pub use listener::{FaultListener, PhaseListener, Subscription};
pub use observer::{
    RecoveryEvent, RecoveryEventType, RecoveryObserver, RecoveryObservers, RecoveryProgress,
};
pub use strategy::{BarrierSyncRecovery, CascadingRecovery, NoopRecovery, RecoveryStrategy};
pub use topology::TopologyRegistry;
pub use tracker::{OperationToken, OperationTracker};
pub use types::{
    FaultMetrics, PartitionChangeEvent, PartitionFaultEvent, PartitionId, PartitionStatus,
    PartitionView, RecoveryPhase, RecoveryResult,
};
