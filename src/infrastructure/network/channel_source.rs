use crate::application::ports::ConnectivitySource;
use crate::domain::entities::RawConnectivityState;
use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

/// In-process connectivity source. Hosts bridge their platform callbacks
/// into `set_state`; subscribers get the push feed and `fetch_current`
/// serves the pull side.
pub struct ChannelConnectivitySource {
    state: RwLock<RawConnectivityState>,
    sender: broadcast::Sender<RawConnectivityState>,
}

impl ChannelConnectivitySource {
    pub fn new(initial: RawConnectivityState) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            state: RwLock::new(initial),
            sender,
        }
    }

    /// Publish a new platform state to every subscriber.
    pub async fn set_state(&self, raw: RawConnectivityState) {
        *self.state.write().await = raw.clone();
        // No receivers is fine; the state is still observable via pull.
        let _ = self.sender.send(raw);
    }
}

#[async_trait]
impl ConnectivitySource for ChannelConnectivitySource {
    fn subscribe(&self) -> broadcast::Receiver<RawConnectivityState> {
        self.sender.subscribe()
    }

    async fn fetch_current(&self) -> RawConnectivityState {
        self.state.read().await.clone()
    }
}
