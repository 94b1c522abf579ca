use crate::application::ports::LatencyProber;
use crate::domain::entities::ConnectionTest;
use crate::shared::config::MonitorConfig;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// Measures round-trip latency with a lightweight GET against a known
/// endpoint. Timeouts and transport errors become failed samples.
pub struct HttpLatencyProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpLatencyProbe {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.probe_url.clone(),
            timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }
}

#[async_trait]
impl LatencyProber for HttpLatencyProbe {
    async fn probe(&self) -> ConnectionTest {
        let started = Instant::now();

        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                let latency_ms = started.elapsed().as_millis() as u64;
                debug!(target: "network::monitor", latency_ms, "probe round trip");
                ConnectionTest::success(latency_ms)
            }
            Ok(response) => {
                ConnectionTest::failure(format!("probe returned status {}", response.status()))
            }
            Err(err) => ConnectionTest::failure(err.to_string()),
        }
    }
}
