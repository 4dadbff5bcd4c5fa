//! Pluggable recovery strategies
//!
//! A strategy owns the partition-specific recovery work; the classifier
//! and coordinator only await its result. Failure travels inside the
//! returned [`RecoveryResult`], never by unwinding.

mod barrier;
mod cascade;
mod noop;

pub use barrier::BarrierSyncRecovery;
pub use cascade::CascadingRecovery;
pub use noop::NoopRecovery;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::FaultConfig;
use crate::handler::FaultHandler;
use crate::types::{PartitionId, RecoveryResult};

/// Recovery policy for one partition
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Execute the recovery; the result is the sole completion signal
    async fn recover(&self, partition: PartitionId, handler: Arc<FaultHandler>) -> RecoveryResult;

    /// Whether this strategy can currently recover the partition
    fn can_recover(&self, partition: PartitionId, handler: &FaultHandler) -> bool;

    fn strategy_name(&self) -> &str;

    fn configuration(&self) -> &FaultConfig;
}
