use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonically accumulated queue counters. Persisted independently of the
/// queue record so history survives a corrupted queue file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_enqueued: u64,
    /// Always equals the current in-memory queue length.
    pub pending: u64,
    pub failed: u64,
    pub succeeded: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
}
