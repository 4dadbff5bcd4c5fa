//! Partition-to-rank topology registry
//!
//! Maps partition identifiers to logical ranks so recovery strategies can
//! reach peers. Membership discovery and transport live outside this
//! crate; the registry only records what collaborators report.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::types::PartitionId;

/// Registry of partition ranks
#[derive(Debug, Default)]
pub struct TopologyRegistry {
    ranks: RwLock<HashMap<PartitionId, u32>>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or overwrite the rank for a partition
    pub fn register(&self, partition: PartitionId, rank: u32) {
        self.ranks.write().insert(partition, rank);
    }

    /// Remove a partition's rank mapping
    pub fn deregister(&self, partition: PartitionId) {
        self.ranks.write().remove(&partition);
    }

    pub fn rank_for(&self, partition: PartitionId) -> Option<u32> {
        self.ranks.read().get(&partition).copied()
    }

    /// All registered ranks, sorted and deduplicated
    pub fn active_ranks(&self) -> Vec<u32> {
        let mut ranks: Vec<u32> = self.ranks.read().values().copied().collect();
        ranks.sort_unstable();
        ranks.dedup();
        ranks
    }

    pub fn partition_count(&self) -> usize {
        self.ranks.read().len()
    }
}
