use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use musubi::infrastructure::network::ChannelConnectivitySource;
use musubi::infrastructure::storage::MemoryStore;
use musubi::{
    ConnectionStatsSnapshot, ConnectionTest, EnqueueOptions, ExecutionContext, LatencyProber,
    MonitorConfig, NetworkMonitor, OfflineQueue, OperationDescriptor, Priority, QueueConfig,
    QueueStats, RawConnectivityState, RemoteExecutor,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct HarnessConfig {
    operations: u64,
    fail_every: u64,
    offline_ms: u64,
    max_retries: u32,
    base_delay_ms: u64,
    drain_timeout_secs: u64,
    probe_latency_ms: u64,
    summary_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct HarnessSummary {
    operations: u64,
    executor_calls: u64,
    executor_failures: u64,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    uptime_ms: u64,
    drained: bool,
    queue_stats: QueueStats,
    connection_stats: ConnectionStatsSnapshot,
    event_kinds: Vec<String>,
}

/// Executor that rejects every Nth call, to exercise backoff and retries.
struct FlakyExecutor {
    calls: AtomicU64,
    failures: AtomicU64,
    fail_every: u64,
}

impl FlakyExecutor {
    fn new(fail_every: u64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            fail_every,
        })
    }
}

#[async_trait]
impl RemoteExecutor for FlakyExecutor {
    async fn execute(
        &self,
        operation: &OperationDescriptor,
        context: ExecutionContext,
    ) -> anyhow::Result<serde_json::Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every > 0 && call % self.fail_every == 0 {
            self.failures.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("injected failure on call {call}");
        }
        info!(
            name = operation.name.as_str(),
            category = context.category.as_str(),
            attempt = context.attempt,
            "executed operation"
        );
        Ok(serde_json::json!({ "call": call }))
    }
}

struct FixedLatencyProber {
    latency_ms: u64,
}

#[async_trait]
impl LatencyProber for FixedLatencyProber {
    async fn probe(&self) -> ConnectionTest {
        ConnectionTest::success(self.latency_ms)
    }
}

fn parse_optional_u64(raw: Option<String>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
}

fn build_config() -> HarnessConfig {
    HarnessConfig {
        operations: parse_optional_u64(std::env::var("MUSUBI_HARNESS_OPERATIONS").ok())
            .unwrap_or(6)
            .max(1),
        fail_every: parse_optional_u64(std::env::var("MUSUBI_HARNESS_FAIL_EVERY").ok())
            .unwrap_or(0),
        offline_ms: parse_optional_u64(std::env::var("MUSUBI_HARNESS_OFFLINE_MS").ok())
            .unwrap_or(500),
        max_retries: parse_optional_u64(std::env::var("MUSUBI_HARNESS_MAX_RETRIES").ok())
            .unwrap_or(3) as u32,
        base_delay_ms: parse_optional_u64(std::env::var("MUSUBI_HARNESS_BASE_DELAY_MS").ok())
            .unwrap_or(200),
        drain_timeout_secs: parse_optional_u64(
            std::env::var("MUSUBI_HARNESS_DRAIN_TIMEOUT_SECS").ok(),
        )
        .unwrap_or(30),
        probe_latency_ms: parse_optional_u64(
            std::env::var("MUSUBI_HARNESS_PROBE_LATENCY_MS").ok(),
        )
        .unwrap_or(25),
        summary_path: std::env::var("MUSUBI_HARNESS_SUMMARY_PATH")
            .ok()
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from),
    }
}

fn init_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

fn write_summary(path: &PathBuf, summary: &HarnessSummary) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(summary)?)?;
    Ok(())
}

const PRIORITY_CYCLE: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cfg = build_config();
    let started_at = Utc::now();
    let start_instant = Instant::now();

    info!(
        operations = cfg.operations,
        fail_every = cfg.fail_every,
        offline_ms = cfg.offline_ms,
        "sync harness starting"
    );

    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ChannelConnectivitySource::new(
        RawConnectivityState::offline(),
    ));
    let prober = Arc::new(FixedLatencyProber {
        latency_ms: cfg.probe_latency_ms,
    });
    let executor = FlakyExecutor::new(cfg.fail_every);

    let monitor = NetworkMonitor::restore(
        store.clone(),
        source.clone(),
        prober,
        MonitorConfig::default(),
        "harness",
    )
    .await;
    monitor.start().await;

    let queue_config = QueueConfig {
        max_retries: cfg.max_retries,
        base_delay_ms: cfg.base_delay_ms,
        ..QueueConfig::default()
    };
    let queue = OfflineQueue::restore(
        store,
        executor.clone(),
        monitor.clone(),
        queue_config,
        "harness",
    )
    .await;
    queue.bind_network_events().await;

    // Everything below lands in the queue while the link is down.
    for index in 0..cfg.operations {
        let priority = PRIORITY_CYCLE[(index % 3) as usize];
        let category = if index % 2 == 0 { "posts" } else { "reactions" };
        queue
            .enqueue(
                OperationDescriptor::new(
                    format!("op_{index}"),
                    serde_json::json!({ "index": index }),
                ),
                EnqueueOptions {
                    priority,
                    category: Some(category.to_string()),
                    ..EnqueueOptions::default()
                },
            )
            .await?;
    }
    info!(pending = queue.stats().await.pending, "operations queued offline");

    tokio::time::sleep(Duration::from_millis(cfg.offline_ms)).await;
    source.set_state(RawConnectivityState::wifi(80)).await;
    info!("connection restored; waiting for drain");

    let deadline = Instant::now() + Duration::from_secs(cfg.drain_timeout_secs);
    let mut drained = false;
    while Instant::now() < deadline {
        if queue.is_empty().await {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if !drained {
        warn!(
            pending = queue.stats().await.pending,
            "queue did not drain before the timeout"
        );
    }

    monitor.stop().await;

    let event_kinds = monitor
        .events()
        .await
        .iter()
        .map(|event| event.kind.as_str().to_string())
        .collect();

    let summary = HarnessSummary {
        operations: cfg.operations,
        executor_calls: executor.calls.load(Ordering::SeqCst),
        executor_failures: executor.failures.load(Ordering::SeqCst),
        started_at,
        finished_at: Utc::now(),
        uptime_ms: start_instant.elapsed().as_millis() as u64,
        drained,
        queue_stats: queue.stats().await,
        connection_stats: monitor.connection_stats().await,
        event_kinds,
    };

    info!(
        drained = summary.drained,
        succeeded = summary.queue_stats.succeeded,
        failed = summary.queue_stats.failed,
        "sync harness finished"
    );

    if let Some(path) = &cfg.summary_path {
        if let Err(err) = write_summary(path, &summary) {
            warn!(path = %path.display(), error = %err, "failed to write summary");
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
