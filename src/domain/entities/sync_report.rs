use serde::{Deserialize, Serialize};

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Operations still pending after the cycle (including scheduled retries).
    pub pending: u64,
    /// True when connectivity dropped mid-cycle and remaining batches were
    /// skipped.
    pub aborted: bool,
}
