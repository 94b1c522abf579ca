use crate::domain::value_objects::{OperationId, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, serializable description of a remote write: an action name plus
/// its input payload. The queue never interprets it; the remote executor
/// knows how to perform it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub variables: serde_json::Value,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, variables: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            variables,
        }
    }
}

/// The unit of durable work. Created by `enqueue`, mutated only through its
/// retry counter, destroyed on terminal success or permanent failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: OperationId,
    pub operation: OperationDescriptor,
    pub optimistic_result: Option<serde_json::Value>,
    /// Reference to a post-commit side effect, resolved by the caller.
    pub side_effect: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub priority: Priority,
    pub category: String,
}

impl QueuedOperation {
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}
