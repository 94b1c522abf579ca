use crate::domain::entities::OperationDescriptor;
use crate::domain::value_objects::OperationId;
use async_trait::async_trait;

/// Metadata handed to the executor alongside the descriptor.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub operation_id: OperationId,
    pub category: String,
    /// 0 on the first attempt, incremented per retry.
    pub attempt: u32,
}

/// Executes one operation descriptor against the backend. Any rejection is
/// treated as retryable; the queue applies its own backoff and retry budget.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(
        &self,
        operation: &OperationDescriptor,
        context: ExecutionContext,
    ) -> anyhow::Result<serde_json::Value>;
}
