//! No-op recovery

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::RecoveryStrategy;
use crate::config::FaultConfig;
use crate::handler::FaultHandler;
use crate::types::{PartitionId, RecoveryResult};

/// Strategy that succeeds immediately without doing any work
///
/// Baseline for measuring coordinator overhead and a seam for tests.
pub struct NoopRecovery {
    config: FaultConfig,
}

impl NoopRecovery {
    pub fn new(config: FaultConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RecoveryStrategy for NoopRecovery {
    async fn recover(&self, partition: PartitionId, _handler: Arc<FaultHandler>) -> RecoveryResult {
        debug!(partition = %partition, "no-op recovery");
        RecoveryResult::success(partition, 0, self.strategy_name(), 1, "no-op recovery")
    }

    fn can_recover(&self, _partition: PartitionId, _handler: &FaultHandler) -> bool {
        true
    }

    fn strategy_name(&self) -> &str {
        "noop"
    }

    fn configuration(&self) -> &FaultConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_succeeds_immediately() {
        let handler = FaultHandler::new(FaultConfig::default()).unwrap();
        let strategy = NoopRecovery::new(FaultConfig::default());
        let partition = PartitionId::new();

        assert!(strategy.can_recover(partition, &handler));
        let result = strategy.recover(partition, handler).await;
        assert!(result.success);
        assert_eq!(result.attempts_needed, 1);
        assert_eq!(result.strategy_name, "noop");
    }
}
