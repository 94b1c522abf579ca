use crate::domain::entities::ConnectionTest;
use async_trait::async_trait;

/// Issues one lightweight round trip against a known endpoint.
/// Never errors: a failed or timed-out probe is a failed `ConnectionTest`.
#[async_trait]
pub trait LatencyProber: Send + Sync {
    async fn probe(&self) -> ConnectionTest;
}
