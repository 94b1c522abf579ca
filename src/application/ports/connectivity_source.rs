use crate::domain::entities::RawConnectivityState;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Platform connectivity API: push on every change, pull on demand.
#[async_trait]
pub trait ConnectivitySource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<RawConnectivityState>;
    async fn fetch_current(&self) -> RawConnectivityState;
}
