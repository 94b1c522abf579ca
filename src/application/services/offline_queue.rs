use crate::application::ports::{ExecutionContext, KeyValueStore, RemoteExecutor};
use crate::application::services::network_monitor::{ListenerId, NetworkMonitor};
use crate::domain::entities::{OperationDescriptor, QueueStats, QueuedOperation, SyncReport};
use crate::domain::value_objects::{OperationId, Priority};
use crate::shared::config::QueueConfig;
use crate::shared::error::{QueueError, Result};
use chrono::Utc;
use futures::future::join_all;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type StatsListener = Box<dyn Fn(&QueueStats) + Send + Sync>;

const QUEUE_RECORD: &str = "sync_queue";
const STATS_RECORD: &str = "sync_stats";
const CONFIG_RECORD: &str = "sync_config";

#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Priority,
    pub category: Option<String>,
    pub max_retries: Option<u32>,
    pub optimistic_result: Option<serde_json::Value>,
    pub side_effect: Option<String>,
}

enum FailureOutcome {
    Terminal,
    Retry(u64),
    /// The operation was removed (dequeued/cleared) while in flight.
    Gone,
}

struct QueueInner {
    queue: VecDeque<QueuedOperation>,
    stats: QueueStats,
}

/// Bounded, priority-ordered, persisted queue of pending remote writes.
/// Consumes network monitor transitions to trigger flush cycles and owns
/// the per-operation retry/backoff and eviction policy.
pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    executor: Arc<dyn RemoteExecutor>,
    monitor: Arc<NetworkMonitor>,
    config: QueueConfig,
    namespace: String,
    inner: RwLock<QueueInner>,
    /// Single-flight latch: at most one flush cycle at a time.
    gate: Mutex<()>,
    retry_tasks: Mutex<HashMap<OperationId, JoinHandle<()>>>,
    stats_listeners: RwLock<Vec<(ListenerId, StatsListener)>>,
    next_listener_id: AtomicU64,
    /// Last observed online state, for edge detection in the monitor listener.
    was_online: AtomicBool,
}

impl OfflineQueue {
    /// Build a queue, reloading persisted operations and counters. Invalid
    /// records are treated as absent; the active config is written back for
    /// inspection.
    pub async fn restore(
        store: Arc<dyn KeyValueStore>,
        executor: Arc<dyn RemoteExecutor>,
        monitor: Arc<NetworkMonitor>,
        config: QueueConfig,
        namespace: &str,
    ) -> Arc<Self> {
        let queue: VecDeque<QueuedOperation> = load_record(store.as_ref(), namespace, QUEUE_RECORD)
            .await
            .unwrap_or_default();
        let mut stats: QueueStats = load_record(store.as_ref(), namespace, STATS_RECORD)
            .await
            .unwrap_or_default();
        stats.pending = queue.len() as u64;

        let this = Arc::new(Self {
            store,
            executor,
            monitor,
            config,
            namespace: namespace.to_string(),
            inner: RwLock::new(QueueInner { queue, stats }),
            gate: Mutex::new(()),
            retry_tasks: Mutex::new(HashMap::new()),
            stats_listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            was_online: AtomicBool::new(false),
        });

        if let Ok(payload) = serde_json::to_string(&this.config) {
            let key = this.record_key(CONFIG_RECORD);
            if let Err(err) = this.store.set(&key, &payload).await {
                warn!(target: "sync::queue", error = %err, "failed to persist queue config");
            }
        }

        this
    }

    /// Subscribe to the network monitor so every offline-to-online edge
    /// starts a flush cycle (when `auto_sync` is enabled).
    pub async fn bind_network_events(self: &Arc<Self>) {
        self.was_online
            .store(self.monitor.is_online().await, Ordering::SeqCst);

        let weak: Weak<Self> = Arc::downgrade(self);
        let auto_sync = self.config.auto_sync;
        self.monitor
            .add_listener(move |quality| {
                let Some(queue) = weak.upgrade() else {
                    return;
                };
                let online = quality.is_online();
                let was_online = queue.was_online.swap(online, Ordering::SeqCst);
                if online && !was_online && auto_sync {
                    debug!(target: "sync::queue", "connection restored; scheduling flush");
                    tokio::spawn(async move {
                        queue.process_queue().await;
                    });
                }
            })
            .await;
    }

    /// Queue one remote write. Returns the operation id as soon as the item
    /// is durable; callers never wait for remote confirmation. The only hard
    /// rejection is backpressure.
    pub async fn enqueue(
        self: &Arc<Self>,
        operation: OperationDescriptor,
        options: EnqueueOptions,
    ) -> Result<OperationId> {
        let op = QueuedOperation {
            id: OperationId::generate(),
            operation,
            optimistic_result: options.optimistic_result,
            side_effect: options.side_effect,
            enqueued_at: Utc::now(),
            retry_count: 0,
            max_retries: options.max_retries.unwrap_or(self.config.max_retries),
            priority: options.priority,
            category: options.category.unwrap_or_else(|| "default".to_string()),
        };
        let id = op.id.clone();

        let evicted = {
            let mut inner = self.inner.write().await;

            let mut evicted = None;
            if inner.queue.len() >= self.config.max_size {
                let victim = inner
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, queued)| queued.priority == Priority::Low)
                    .min_by_key(|(_, queued)| queued.enqueued_at)
                    .map(|(index, _)| index);
                match victim {
                    Some(index) => evicted = inner.queue.remove(index),
                    None => return Err(QueueError::QueueFull(inner.queue.len())),
                }
            }

            // High priority jumps the line; everything else arrives in order.
            match op.priority {
                Priority::High => inner.queue.push_front(op),
                Priority::Medium | Priority::Low => inner.queue.push_back(op),
            }
            inner.stats.total_enqueued += 1;
            inner.stats.pending = inner.queue.len() as u64;

            evicted
        };

        if let Some(victim) = &evicted {
            warn!(
                target: "sync::queue",
                operation_id = %victim.id,
                name = victim.operation.name.as_str(),
                "queue full; evicted oldest low-priority operation"
            );
            self.cancel_retry(&victim.id).await;
        }

        self.persist_queue().await;
        self.persist_stats().await;
        self.notify_stats_listeners().await;

        debug!(
            target: "sync::queue",
            operation_id = %id,
            "operation enqueued"
        );

        if self.monitor.is_online().await {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                queue.process_queue().await;
            });
        }

        Ok(id)
    }

    /// One flush cycle. No-op when a cycle is already running, the network
    /// is down, or nothing is pending. Individual failures never abort the
    /// cycle; only a connectivity loss does.
    pub async fn process_queue(self: &Arc<Self>) -> SyncReport {
        let Ok(_guard) = self.gate.try_lock() else {
            debug!(target: "sync::queue", "flush already in progress");
            return self.idle_report().await;
        };

        if !self.monitor.is_online().await {
            return self.idle_report().await;
        }

        // Fresh processing order each cycle: priority band first, arrival
        // order within a band (retried items keep their original arrival).
        let order: Vec<OperationId> = {
            let inner = self.inner.read().await;
            let mut entries: Vec<(OperationId, u8, chrono::DateTime<Utc>)> = inner
                .queue
                .iter()
                .map(|op| (op.id.clone(), op.priority.rank(), op.enqueued_at))
                .collect();
            entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
            entries.into_iter().map(|(id, _, _)| id).collect()
        };
        if order.is_empty() {
            return self.idle_report().await;
        }

        let batch_size = if self.config.batching_enabled {
            self.config.batch_size.max(1)
        } else {
            1
        };

        let mut report = SyncReport::default();
        for batch in order.chunks(batch_size) {
            if !self.monitor.is_online().await {
                warn!(
                    target: "sync::queue",
                    "connection lost mid-flush; aborting remaining batches"
                );
                report.aborted = true;
                break;
            }

            let operations: Vec<QueuedOperation> = {
                let inner = self.inner.read().await;
                batch
                    .iter()
                    .filter_map(|id| inner.queue.iter().find(|op| &op.id == id).cloned())
                    .collect()
            };
            if operations.is_empty() {
                continue;
            }

            let mut categories: HashMap<&str, usize> = HashMap::new();
            for op in &operations {
                *categories.entry(op.category.as_str()).or_default() += 1;
            }
            debug!(
                target: "sync::queue",
                batch = operations.len(),
                categories = ?categories,
                "dispatching batch"
            );

            let results = join_all(
                operations
                    .iter()
                    .map(|op| self.execute_operation(op)),
            )
            .await;

            for (op, result) in operations.iter().zip(results) {
                report.attempted += 1;
                match result {
                    Ok(_) => {
                        self.finish_success(&op.id).await;
                        self.cancel_retry(&op.id).await;
                        report.succeeded += 1;
                    }
                    Err(err) => match self.apply_failure(&op.id, &err).await {
                        FailureOutcome::Terminal => {
                            self.cancel_retry(&op.id).await;
                            report.failed += 1;
                        }
                        FailureOutcome::Retry(delay_ms) => {
                            self.schedule_retry(op.id.clone(), delay_ms).await;
                        }
                        FailureOutcome::Gone => {}
                    },
                }
            }
        }

        {
            let mut inner = self.inner.write().await;
            inner.stats.last_sync_at = Some(Utc::now());
            inner.stats.pending = inner.queue.len() as u64;
            report.pending = inner.stats.pending;
        }
        self.persist_stats().await;
        self.notify_stats_listeners().await;

        info!(
            target: "sync::queue",
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            pending = report.pending,
            aborted = report.aborted,
            "flush cycle finished"
        );

        report
    }

    /// Immediate flush for user-initiated refresh. Unlike the silent
    /// automatic path, rejects when offline.
    pub async fn force_sync(self: &Arc<Self>) -> Result<SyncReport> {
        if !self.monitor.is_online().await {
            return Err(QueueError::Offline);
        }
        Ok(self.process_queue().await)
    }

    /// Manual cancellation. Also suppresses any retry already scheduled for
    /// the operation.
    pub async fn dequeue(&self, id: &OperationId) -> bool {
        let removed = {
            let mut inner = self.inner.write().await;
            let before = inner.queue.len();
            inner.queue.retain(|op| &op.id != id);
            let removed = inner.queue.len() != before;
            inner.stats.pending = inner.queue.len() as u64;
            removed
        };

        if removed {
            self.cancel_retry(id).await;
            self.persist_queue().await;
            self.persist_stats().await;
            self.notify_stats_listeners().await;
            debug!(target: "sync::queue", operation_id = %id, "operation dequeued");
        }
        removed
    }

    /// Drop every pending operation and reset the counters. Destructive;
    /// meant for explicit user-initiated resets only.
    pub async fn clear(&self) {
        {
            let mut tasks = self.retry_tasks.lock().await;
            for (_, handle) in tasks.drain() {
                handle.abort();
            }
        }
        {
            let mut inner = self.inner.write().await;
            inner.queue.clear();
            inner.stats = QueueStats::default();
        }
        self.persist_queue().await;
        self.persist_stats().await;
        self.notify_stats_listeners().await;
        info!(target: "sync::queue", "queue cleared");
    }

    pub async fn pending_operations(&self) -> Vec<QueuedOperation> {
        self.inner.read().await.queue.iter().cloned().collect()
    }

    pub async fn operations_by_category(&self, category: &str) -> Vec<QueuedOperation> {
        self.inner
            .read()
            .await
            .queue
            .iter()
            .filter(|op| op.category == category)
            .cloned()
            .collect()
    }

    pub async fn operations_by_priority(&self, priority: Priority) -> Vec<QueuedOperation> {
        self.inner
            .read()
            .await
            .queue
            .iter()
            .filter(|op| op.priority == priority)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.queue.is_empty()
    }

    pub async fn stats(&self) -> QueueStats {
        self.inner.read().await.stats.clone()
    }

    /// Register a listener invoked with a stats snapshot after every queue
    /// mutation.
    pub async fn add_stats_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&QueueStats) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.stats_listeners
            .write()
            .await
            .push((id, Box::new(listener)));
        id
    }

    pub async fn remove_stats_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.stats_listeners.write().await;
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    async fn execute_operation(&self, op: &QueuedOperation) -> anyhow::Result<serde_json::Value> {
        let context = ExecutionContext {
            operation_id: op.id.clone(),
            category: op.category.clone(),
            attempt: op.retry_count,
        };
        self.executor.execute(&op.operation, context).await
    }

    /// Remove a completed operation and account for it. Does not touch the
    /// retry task map; callers own that side.
    async fn finish_success(&self, id: &OperationId) {
        let removed = {
            let mut inner = self.inner.write().await;
            let before = inner.queue.len();
            inner.queue.retain(|op| &op.id != id);
            let removed = inner.queue.len() != before;
            if removed {
                inner.stats.succeeded += 1;
                inner.stats.pending = inner.queue.len() as u64;
            }
            removed
        };

        if removed {
            self.persist_queue().await;
            self.persist_stats().await;
            self.notify_stats_listeners().await;
            debug!(target: "sync::queue", operation_id = %id, "operation synced");
        }
    }

    /// Account for one failed attempt: either exhaust the retry budget
    /// (terminal, stats-only) or bump the counter and hand back the backoff
    /// delay for the next attempt.
    async fn apply_failure(&self, id: &OperationId, error: &anyhow::Error) -> FailureOutcome {
        let outcome = {
            let mut inner = self.inner.write().await;
            let Some(index) = inner.queue.iter().position(|op| &op.id == id) else {
                return FailureOutcome::Gone;
            };

            if inner.queue[index].retries_exhausted() {
                inner.queue.remove(index);
                inner.stats.failed += 1;
                inner.stats.pending = inner.queue.len() as u64;
                FailureOutcome::Terminal
            } else {
                let op = &mut inner.queue[index];
                op.retry_count += 1;
                let delay_ms =
                    self.config.base_delay_ms * 2u64.pow(op.retry_count.saturating_sub(1));
                FailureOutcome::Retry(delay_ms)
            }
        };

        match &outcome {
            FailureOutcome::Terminal => {
                warn!(
                    target: "sync::queue",
                    operation_id = %id,
                    error = %error,
                    "retry budget exhausted; operation failed permanently"
                );
                self.persist_queue().await;
                self.persist_stats().await;
                self.notify_stats_listeners().await;
            }
            FailureOutcome::Retry(delay_ms) => {
                debug!(
                    target: "sync::queue",
                    operation_id = %id,
                    error = %error,
                    delay_ms,
                    "operation failed; retry scheduled"
                );
                self.persist_queue().await;
            }
            FailureOutcome::Gone => {}
        }

        outcome
    }

    /// Arm (or re-arm) the solitary retry lane for one operation. The task
    /// is keyed by id so `dequeue`/`clear` can cancel it deterministically.
    async fn schedule_retry(self: &Arc<Self>, id: OperationId, delay_ms: u64) {
        let handle = tokio::spawn(retry_task(Arc::downgrade(self), id.clone(), delay_ms));
        let mut tasks = self.retry_tasks.lock().await;
        if let Some(previous) = tasks.insert(id, handle) {
            previous.abort();
        }
    }

    async fn cancel_retry(&self, id: &OperationId) {
        if let Some(handle) = self.retry_tasks.lock().await.remove(id) {
            handle.abort();
        }
    }

    async fn idle_report(&self) -> SyncReport {
        SyncReport {
            pending: self.inner.read().await.stats.pending,
            ..SyncReport::default()
        }
    }

    fn record_key(&self, record: &str) -> String {
        format!("{}:{}", self.namespace, record)
    }

    async fn persist_queue(&self) {
        let snapshot: Vec<QueuedOperation> = {
            let inner = self.inner.read().await;
            inner.queue.iter().cloned().collect()
        };
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "sync::queue", error = %err, "failed to serialize queue");
                return;
            }
        };
        if let Err(err) = self.store.set(&self.record_key(QUEUE_RECORD), &payload).await {
            warn!(target: "sync::queue", error = %err, "failed to persist queue; running memory-only");
        }
    }

    async fn persist_stats(&self) {
        let stats = self.inner.read().await.stats.clone();
        let payload = match serde_json::to_string(&stats) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "sync::queue", error = %err, "failed to serialize stats");
                return;
            }
        };
        if let Err(err) = self.store.set(&self.record_key(STATS_RECORD), &payload).await {
            warn!(target: "sync::queue", error = %err, "failed to persist stats");
        }
    }

    async fn notify_stats_listeners(&self) {
        let stats = self.inner.read().await.stats.clone();
        let listeners = self.stats_listeners.read().await;
        for (_, listener) in listeners.iter() {
            listener(&stats);
        }
    }
}

async fn load_record<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    namespace: &str,
    record: &str,
) -> Option<T> {
    let key = format!("{namespace}:{record}");
    match store.get(&key).await {
        Ok(Some(payload)) => match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target: "sync::queue",
                    record,
                    error = %err,
                    "persisted record is invalid; treating as absent"
                );
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!(
                target: "sync::queue",
                record,
                error = %err,
                "failed to load persisted record; starting empty"
            );
            None
        }
    }
}

/// Independent retry lane for one operation: sleep through the backoff,
/// re-check connectivity and queue membership, then attempt. Loops through
/// consecutive backoffs until the operation succeeds, exhausts its budget,
/// goes offline, or disappears from the queue.
async fn retry_task(queue: Weak<OfflineQueue>, id: OperationId, first_delay_ms: u64) {
    let mut delay_ms = first_delay_ms;
    loop {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        let Some(queue) = queue.upgrade() else {
            return;
        };

        // Offline at fire time: leave the item queued for the next natural
        // flush.
        if !queue.monitor.is_online().await {
            debug!(target: "sync::queue", operation_id = %id, "offline at retry; left queued");
            break;
        }

        let op = {
            let inner = queue.inner.read().await;
            inner.queue.iter().find(|op| op.id == id).cloned()
        };
        let Some(op) = op else {
            break;
        };

        match queue.execute_operation(&op).await {
            Ok(_) => {
                queue.finish_success(&id).await;
                break;
            }
            Err(err) => match queue.apply_failure(&id, &err).await {
                FailureOutcome::Retry(next_delay_ms) => {
                    delay_ms = next_delay_ms;
                }
                FailureOutcome::Terminal | FailureOutcome::Gone => break,
            },
        }
    }

    if let Some(queue) = queue.upgrade() {
        queue.retry_tasks.lock().await.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::LatencyProber;
    use crate::domain::entities::{ConnectionTest, RawConnectivityState};
    use crate::infrastructure::network::ChannelConnectivitySource;
    use crate::infrastructure::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct NullProber;

    #[async_trait]
    impl LatencyProber for NullProber {
        async fn probe(&self) -> ConnectionTest {
            ConnectionTest::success(10)
        }
    }

    /// Records execution order; fails operations whose name is listed, for
    /// as many attempts as configured.
    struct RecordingExecutor {
        calls: StdMutex<Vec<String>>,
        failing: StdMutex<HashMap<String, u32>>,
    }

    impl RecordingExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: StdMutex::new(Vec::new()),
                failing: StdMutex::new(HashMap::new()),
            })
        }

        fn fail_times(&self, name: &str, times: u32) {
            self.failing.lock().unwrap().insert(name.to_string(), times);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn call_count(&self, name: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|call| call.as_str() == name)
                .count()
        }
    }

    #[async_trait]
    impl RemoteExecutor for RecordingExecutor {
        async fn execute(
            &self,
            operation: &OperationDescriptor,
            _context: ExecutionContext,
        ) -> anyhow::Result<serde_json::Value> {
            self.calls.lock().unwrap().push(operation.name.clone());

            let mut failing = self.failing.lock().unwrap();
            if let Some(remaining) = failing.get_mut(&operation.name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    anyhow::bail!("simulated backend rejection");
                }
            }
            Ok(serde_json::json!({"ok": true}))
        }
    }

    struct Harness {
        queue: Arc<OfflineQueue>,
        monitor: Arc<NetworkMonitor>,
        executor: Arc<RecordingExecutor>,
        store: Arc<MemoryStore>,
    }

    async fn setup(config: QueueConfig) -> Harness {
        let store = Arc::new(MemoryStore::new());
        setup_with_store(config, store).await
    }

    async fn setup_with_store(config: QueueConfig, store: Arc<MemoryStore>) -> Harness {
        let source = Arc::new(ChannelConnectivitySource::new(
            RawConnectivityState::offline(),
        ));
        let monitor = NetworkMonitor::restore(
            store.clone(),
            source.clone(),
            Arc::new(NullProber),
            Default::default(),
            "test",
        )
        .await;
        let executor = RecordingExecutor::new();
        let queue = OfflineQueue::restore(
            store.clone(),
            executor.clone(),
            monitor.clone(),
            config,
            "test",
        )
        .await;
        queue.bind_network_events().await;

        Harness {
            queue,
            monitor,
            executor,
            store,
        }
    }

    fn descriptor(name: &str) -> OperationDescriptor {
        OperationDescriptor::new(name, serde_json::json!({"n": name}))
    }

    fn with_priority(priority: Priority) -> EnqueueOptions {
        EnqueueOptions {
            priority,
            ..EnqueueOptions::default()
        }
    }

    async fn go_online(harness: &Harness) {
        harness
            .monitor
            .handle_raw_state(RawConnectivityState::wifi(85))
            .await;
    }

    async fn go_offline(harness: &Harness) {
        harness
            .monitor
            .handle_raw_state(RawConnectivityState::offline())
            .await;
    }

    /// Wait until the queue drains or the timeout elapses.
    async fn wait_for_drain(harness: &Harness) {
        for _ in 0..100 {
            if harness.queue.is_empty().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("queue did not drain");
    }

    #[tokio::test]
    async fn enqueue_while_offline_defers_execution() {
        let harness = setup(QueueConfig::default()).await;

        harness
            .queue
            .enqueue(descriptor("create_post"), EnqueueOptions::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(harness.executor.calls().is_empty());
        assert_eq!(harness.queue.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn reconnect_triggers_automatic_flush() {
        let harness = setup(QueueConfig::default()).await;

        harness
            .queue
            .enqueue(descriptor("create_post"), EnqueueOptions::default())
            .await
            .unwrap();
        assert!(harness.executor.calls().is_empty());

        go_online(&harness).await;
        wait_for_drain(&harness).await;
        // Let the cycle run its finalization before inspecting stats.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(harness.executor.calls(), vec!["create_post".to_string()]);
        let stats = harness.queue.stats().await;
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.pending, 0);
        assert!(stats.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn auto_sync_disabled_keeps_queue_untouched_on_reconnect() {
        let config = QueueConfig {
            auto_sync: false,
            ..QueueConfig::default()
        };
        let harness = setup(config).await;

        harness
            .queue
            .enqueue(descriptor("create_post"), EnqueueOptions::default())
            .await
            .unwrap();
        go_online(&harness).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(harness.queue.stats().await.pending, 1);
        // Note: enqueue-while-online still flushes; only the reconnect
        // trigger is gated, so the executor saw nothing here.
        assert!(harness.executor.calls().is_empty());
    }

    #[tokio::test]
    async fn priority_bands_dominate_processing_order() {
        let harness = setup(QueueConfig::default()).await;

        harness
            .queue
            .enqueue(descriptor("low"), with_priority(Priority::Low))
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("medium"), with_priority(Priority::Medium))
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("high"), with_priority(Priority::High))
            .await
            .unwrap();

        go_online(&harness).await;
        wait_for_drain(&harness).await;

        assert_eq!(
            harness.executor.calls(),
            vec!["high".to_string(), "medium".to_string(), "low".to_string()]
        );
    }

    #[tokio::test]
    async fn fifo_within_a_priority_band() {
        let config = QueueConfig {
            batch_size: 1,
            ..QueueConfig::default()
        };
        let harness = setup(config).await;

        harness
            .queue
            .enqueue(descriptor("first"), with_priority(Priority::Medium))
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("second"), with_priority(Priority::Medium))
            .await
            .unwrap();

        go_online(&harness).await;
        wait_for_drain(&harness).await;

        assert_eq!(
            harness.executor.calls(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test]
    async fn full_queue_evicts_oldest_low_priority_item() {
        let config = QueueConfig {
            max_size: 3,
            ..QueueConfig::default()
        };
        let harness = setup(config).await;

        harness
            .queue
            .enqueue(descriptor("old_low"), with_priority(Priority::Low))
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("high"), with_priority(Priority::High))
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("medium"), with_priority(Priority::Medium))
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("new_low"), with_priority(Priority::Low))
            .await
            .unwrap();

        let names: Vec<String> = harness
            .queue
            .pending_operations()
            .await
            .into_iter()
            .map(|op| op.operation.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "high".to_string(),
                "medium".to_string(),
                "new_low".to_string()
            ]
        );
        assert_eq!(harness.queue.stats().await.pending, 3);
    }

    #[tokio::test]
    async fn full_queue_without_evictable_item_rejects() {
        let config = QueueConfig {
            max_size: 2,
            ..QueueConfig::default()
        };
        let harness = setup(config).await;

        harness
            .queue
            .enqueue(descriptor("a"), with_priority(Priority::High))
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("b"), with_priority(Priority::Medium))
            .await
            .unwrap();

        let result = harness
            .queue
            .enqueue(descriptor("c"), with_priority(Priority::Medium))
            .await;
        assert!(matches!(result, Err(QueueError::QueueFull(2))));
        assert_eq!(harness.queue.len().await, 2);
    }

    #[tokio::test]
    async fn retry_exhaustion_counts_each_attempt() {
        let config = QueueConfig {
            base_delay_ms: 20,
            ..QueueConfig::default()
        };
        let harness = setup(config).await;
        harness.executor.fail_times("flaky", u32::MAX);

        harness
            .queue
            .enqueue(
                descriptor("flaky"),
                EnqueueOptions {
                    max_retries: Some(2),
                    ..EnqueueOptions::default()
                },
            )
            .await
            .unwrap();

        go_online(&harness).await;
        // 1 initial + 2 retries with 20ms/40ms backoff.
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(harness.executor.call_count("flaky"), 3);
        let stats = harness.queue.stats().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
        assert!(harness.queue.is_empty().await);
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_retry() {
        let config = QueueConfig {
            base_delay_ms: 20,
            ..QueueConfig::default()
        };
        let harness = setup(config).await;
        harness.executor.fail_times("flaky", 1);

        harness
            .queue
            .enqueue(descriptor("flaky"), EnqueueOptions::default())
            .await
            .unwrap();

        go_online(&harness).await;
        wait_for_drain(&harness).await;

        assert_eq!(harness.executor.call_count("flaky"), 2);
        let stats = harness.queue.stats().await;
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn dequeue_cancels_a_scheduled_retry() {
        let config = QueueConfig {
            base_delay_ms: 80,
            ..QueueConfig::default()
        };
        let harness = setup(config).await;
        harness.executor.fail_times("flaky", u32::MAX);

        let id = harness
            .queue
            .enqueue(descriptor("flaky"), EnqueueOptions::default())
            .await
            .unwrap();

        go_online(&harness).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(harness.executor.call_count("flaky"), 1);

        assert!(harness.queue.dequeue(&id).await);
        tokio::time::sleep(Duration::from_millis(300)).await;

        // The aborted retry never fired again.
        assert_eq!(harness.executor.call_count("flaky"), 1);
        assert!(harness.queue.is_empty().await);
    }

    #[tokio::test]
    async fn retry_fire_while_offline_leaves_item_queued() {
        let config = QueueConfig {
            base_delay_ms: 60,
            ..QueueConfig::default()
        };
        let harness = setup(config).await;
        harness.executor.fail_times("flaky", u32::MAX);

        harness
            .queue
            .enqueue(descriptor("flaky"), EnqueueOptions::default())
            .await
            .unwrap();
        go_online(&harness).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(harness.executor.call_count("flaky"), 1);

        go_offline(&harness).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(harness.executor.call_count("flaky"), 1);
        assert_eq!(harness.queue.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn force_sync_rejects_while_offline() {
        let harness = setup(QueueConfig::default()).await;

        harness
            .queue
            .enqueue(descriptor("create_post"), EnqueueOptions::default())
            .await
            .unwrap();

        let result = harness.queue.force_sync().await;
        assert!(matches!(result, Err(QueueError::Offline)));
    }

    #[tokio::test]
    async fn force_sync_reports_the_cycle() {
        let harness = setup(QueueConfig {
            auto_sync: false,
            ..QueueConfig::default()
        })
        .await;

        go_online(&harness).await;
        harness
            .queue
            .enqueue(descriptor("a"), EnqueueOptions::default())
            .await
            .unwrap();
        wait_for_drain(&harness).await;

        harness
            .queue
            .enqueue(descriptor("b"), EnqueueOptions::default())
            .await
            .unwrap();
        wait_for_drain(&harness).await;

        let report = harness.queue.force_sync().await.unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(report.pending, 0);
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn clear_resets_counters_and_drops_items() {
        let harness = setup(QueueConfig::default()).await;

        harness
            .queue
            .enqueue(descriptor("a"), EnqueueOptions::default())
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("b"), EnqueueOptions::default())
            .await
            .unwrap();

        harness.queue.clear().await;

        assert!(harness.queue.is_empty().await);
        assert_eq!(harness.queue.stats().await, QueueStats::default());
    }

    #[tokio::test]
    async fn queue_survives_restart_through_the_store() {
        let store = Arc::new(MemoryStore::new());
        let harness = setup_with_store(QueueConfig::default(), store.clone()).await;

        harness
            .queue
            .enqueue(descriptor("a"), with_priority(Priority::High))
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("b"), EnqueueOptions::default())
            .await
            .unwrap();

        let restarted = setup_with_store(QueueConfig::default(), store).await;
        assert_eq!(restarted.queue.len().await, 2);
        let stats = restarted.queue.stats().await;
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.total_enqueued, 2);
    }

    #[tokio::test]
    async fn corrupt_queue_record_restores_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set("test:sync_queue", "[{broken").await.unwrap();

        let harness = setup_with_store(QueueConfig::default(), store).await;
        assert!(harness.queue.is_empty().await);
        assert_eq!(harness.queue.stats().await.pending, 0);
    }

    #[tokio::test]
    async fn stats_listeners_observe_mutations() {
        let harness = setup(QueueConfig::default()).await;

        let observed = Arc::new(StdMutex::new(Vec::new()));
        let sink = observed.clone();
        harness
            .queue
            .add_stats_listener(move |stats| {
                sink.lock().unwrap().push(stats.pending);
            })
            .await;

        harness
            .queue
            .enqueue(descriptor("a"), EnqueueOptions::default())
            .await
            .unwrap();
        harness
            .queue
            .enqueue(descriptor("b"), EnqueueOptions::default())
            .await
            .unwrap();

        assert_eq!(observed.lock().unwrap().clone(), vec![1, 2]);
    }

    #[tokio::test]
    async fn filters_by_category_and_priority() {
        let harness = setup(QueueConfig::default()).await;

        harness
            .queue
            .enqueue(
                descriptor("post"),
                EnqueueOptions {
                    category: Some("posts".to_string()),
                    priority: Priority::High,
                    ..EnqueueOptions::default()
                },
            )
            .await
            .unwrap();
        harness
            .queue
            .enqueue(
                descriptor("like"),
                EnqueueOptions {
                    category: Some("reactions".to_string()),
                    ..EnqueueOptions::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(harness.queue.operations_by_category("posts").await.len(), 1);
        assert_eq!(
            harness
                .queue
                .operations_by_priority(Priority::High)
                .await
                .len(),
            1
        );
        assert!(harness
            .queue
            .operations_by_category("missing")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn persisted_records_use_namespaced_keys() {
        let harness = setup(QueueConfig::default()).await;

        harness
            .queue
            .enqueue(descriptor("a"), EnqueueOptions::default())
            .await
            .unwrap();

        assert!(harness.store.get("test:sync_queue").await.unwrap().is_some());
        assert!(harness.store.get("test:sync_stats").await.unwrap().is_some());
        assert!(harness.store.get("test:sync_config").await.unwrap().is_some());
    }
}
