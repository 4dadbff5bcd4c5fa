//! Fault-handling configuration

use crate::error::{FaultError, Result};
use serde::{Deserialize, Serialize};

/// Immutable tuning knobs for fault classification and recovery
///
/// Millisecond fields accept zero to disable the feature they gate.
/// Builder-style `with_*` methods derive a new record and leave the
/// original unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FaultConfig {
    /// Reported symptom latency beyond which a healthy partition becomes
    /// suspected; zero disables latency-driven escalation
    #[serde(default = "default_suspect_timeout")]
    pub suspect_timeout_ms: u64,

    /// Time a partition may stay suspected before the confirmation sweep
    /// marks it failed; zero disables the sweep
    #[serde(default = "default_failure_confirmation")]
    pub failure_confirmation_ms: u64,

    /// Maximum recovery attempts before giving up
    #[serde(default = "default_max_recovery_retries")]
    pub max_recovery_retries: u32,

    /// Wall budget for one recovery invocation; zero disables the limit
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_ms: u64,

    /// Whether a confirmed failure triggers recovery automatically
    #[serde(default = "default_auto_recovery")]
    pub auto_recovery_enabled: bool,

    /// Upper bound on in-flight recoveries cluster-wide (at least 1)
    #[serde(default = "default_max_concurrent_recoveries")]
    pub max_concurrent_recoveries: usize,
}

fn default_suspect_timeout() -> u64 {
    3000
}

fn default_failure_confirmation() -> u64 {
    5000
}

fn default_max_recovery_retries() -> u32 {
    3
}

fn default_recovery_timeout() -> u64 {
    30000
}

fn default_auto_recovery() -> bool {
    true
}

fn default_max_concurrent_recoveries() -> usize {
    3
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            suspect_timeout_ms: default_suspect_timeout(),
            failure_confirmation_ms: default_failure_confirmation(),
            max_recovery_retries: default_max_recovery_retries(),
            recovery_timeout_ms: default_recovery_timeout(),
            auto_recovery_enabled: default_auto_recovery(),
            max_concurrent_recoveries: default_max_concurrent_recoveries(),
        }
    }
}

impl FaultConfig {
    /// Check field constraints
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_recoveries == 0 {
            return Err(FaultError::Config(
                "max_concurrent_recoveries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn with_suspect_timeout_ms(mut self, value: u64) -> Self {
        self.suspect_timeout_ms = value;
        self
    }

    pub fn with_failure_confirmation_ms(mut self, value: u64) -> Self {
        self.failure_confirmation_ms = value;
        self
    }

    pub fn with_max_recovery_retries(mut self, value: u32) -> Self {
        self.max_recovery_retries = value;
        self
    }

    pub fn with_recovery_timeout_ms(mut self, value: u64) -> Self {
        self.recovery_timeout_ms = value;
        self
    }

    pub fn with_auto_recovery(mut self, enabled: bool) -> Self {
        self.auto_recovery_enabled = enabled;
        self
    }

    pub fn with_max_concurrent_recoveries(mut self, value: usize) -> Self {
        self.max_concurrent_recoveries = value;
        self
    }
}
