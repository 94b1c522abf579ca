use crate::application::ports::{ConnectivitySource, KeyValueStore, LatencyProber};
use crate::domain::classifier;
use crate::domain::entities::{
    ConnectionTest, NetworkEvent, NetworkEventKind, NetworkQuality, RawConnectivityState,
};
use crate::domain::value_objects::ConnectionSpeed;
use crate::shared::config::MonitorConfig;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

pub type ListenerId = u64;
type QualityListener = Box<dyn Fn(&NetworkQuality) + Send + Sync>;

const EVENTS_RECORD: &str = "network_events";
const TESTS_RECORD: &str = "connection_tests";

/// Aggregate view over the recent connection test history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatsSnapshot {
    /// Rolling mean over the last 10 successful probes within 5 minutes.
    pub average_latency_ms: Option<u64>,
    pub sample_count: usize,
    pub total_tests: usize,
    pub failed_tests: usize,
    pub last_test_at: Option<DateTime<Utc>>,
}

struct MonitorInner {
    current: Option<NetworkQuality>,
    events: VecDeque<NetworkEvent>,
    tests: VecDeque<ConnectionTest>,
    disconnected_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MonitorTasks {
    subscription: Option<JoinHandle<()>>,
    probe_timer: Option<JoinHandle<()>>,
    probe_debounce: Option<JoinHandle<()>>,
}

impl MonitorTasks {
    fn abort_all(&mut self) {
        for handle in [
            self.subscription.take(),
            self.probe_timer.take(),
            self.probe_debounce.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

/// Single source of truth for "are we online enough to flush". Classifies
/// raw platform callbacks, keeps bounded event/test histories, and pushes
/// every new snapshot to registered listeners.
pub struct NetworkMonitor {
    store: Arc<dyn KeyValueStore>,
    source: Arc<dyn ConnectivitySource>,
    prober: Arc<dyn LatencyProber>,
    config: MonitorConfig,
    namespace: String,
    inner: RwLock<MonitorInner>,
    listeners: RwLock<Vec<(ListenerId, QualityListener)>>,
    next_listener_id: AtomicU64,
    started: AtomicBool,
    tasks: Mutex<MonitorTasks>,
}

impl NetworkMonitor {
    /// Build a monitor, reloading persisted histories. A missing or
    /// structurally invalid record means "start empty", never an error.
    pub async fn restore(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn ConnectivitySource>,
        prober: Arc<dyn LatencyProber>,
        config: MonitorConfig,
        namespace: &str,
    ) -> Arc<Self> {
        let events = load_record::<NetworkEvent>(store.as_ref(), namespace, EVENTS_RECORD).await;
        let tests = load_record::<ConnectionTest>(store.as_ref(), namespace, TESTS_RECORD).await;

        Arc::new(Self {
            store,
            source,
            prober,
            config,
            namespace: namespace.to_string(),
            inner: RwLock::new(MonitorInner {
                current: None,
                events,
                tests,
                disconnected_at: None,
            }),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            started: AtomicBool::new(false),
            tasks: Mutex::new(MonitorTasks::default()),
        })
    }

    /// Begin consuming the platform connectivity feed and probing on an
    /// interval. Idempotent.
    pub async fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        // Subscribe before the initial pull so no change slips between them.
        let rx = self.source.subscribe();
        let initial = self.source.fetch_current().await;
        self.handle_raw_state(initial).await;

        let subscription = {
            let monitor = Arc::clone(self);
            let mut rx = rx;
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(raw) => monitor.handle_raw_state(raw).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                target: "network::monitor",
                                skipped,
                                "connectivity feed lagged; resyncing"
                            );
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        let probe_timer = {
            let monitor = Arc::clone(self);
            let period = Duration::from_secs(self.config.probe_interval_secs.max(1));
            tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if monitor.is_online().await {
                        monitor.run_probe().await;
                    }
                }
            })
        };

        let mut tasks = self.tasks.lock().await;
        tasks.subscription = Some(subscription);
        tasks.probe_timer = Some(probe_timer);

        info!(target: "network::monitor", "network monitor started");
    }

    /// Unsubscribe from the platform feed and clear all timers. Idempotent;
    /// no callbacks run after this returns.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.tasks.lock().await.abort_all();
        info!(target: "network::monitor", "network monitor stopped");
    }

    pub async fn current_quality(&self) -> Option<NetworkQuality> {
        self.inner.read().await.current.clone()
    }

    pub async fn is_online(&self) -> bool {
        self.inner
            .read()
            .await
            .current
            .as_ref()
            .map(NetworkQuality::is_online)
            .unwrap_or(false)
    }

    pub async fn events(&self) -> Vec<NetworkEvent> {
        self.inner.read().await.events.iter().cloned().collect()
    }

    pub async fn connection_tests(&self) -> Vec<ConnectionTest> {
        self.inner.read().await.tests.iter().cloned().collect()
    }

    /// Register a listener invoked synchronously, in registration order,
    /// with every new quality snapshot.
    pub async fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NetworkQuality) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .write()
            .await
            .push((id, Box::new(listener)));
        id
    }

    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Manual probe. Fails fast without touching the network while
    /// disconnected; the failure is still recorded as a sample.
    pub async fn test_connection_now(&self) -> ConnectionTest {
        let test = if self.is_online().await {
            self.prober.probe().await
        } else {
            ConnectionTest::failure("no network connection")
        };
        self.record_test(test.clone()).await;
        test
    }

    pub async fn connection_stats(&self) -> ConnectionStatsSnapshot {
        let inner = self.inner.read().await;
        let cutoff = Utc::now() - ChronoDuration::minutes(5);

        let samples: Vec<u64> = inner
            .tests
            .iter()
            .rev()
            .filter(|test| test.success && test.timestamp >= cutoff)
            .take(10)
            .filter_map(|test| test.latency_ms)
            .collect();

        let average_latency_ms = if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<u64>() / samples.len() as u64)
        };

        ConnectionStatsSnapshot {
            average_latency_ms,
            sample_count: samples.len(),
            total_tests: inner.tests.len(),
            failed_tests: inner.tests.iter().filter(|test| !test.success).count(),
            last_test_at: inner.tests.back().map(|test| test.timestamp),
        }
    }

    /// One raw platform callback: classify, derive the event kind, append to
    /// history, persist, notify, and kick probes where the transition calls
    /// for one.
    pub(crate) async fn handle_raw_state(self: &Arc<Self>, raw: RawConnectivityState) {
        let next = classifier::classify(&raw);
        let now = Utc::now();

        let outcome = {
            let mut inner = self.inner.write().await;
            let previous = inner.current.clone();

            // Platforms re-deliver identical states; those are not events.
            if previous.as_ref() == Some(&next) {
                return;
            }

            let kind = match &previous {
                Some(prev) if prev.is_online() == next.is_online() => {
                    if prev.connection_type != next.connection_type {
                        NetworkEventKind::TypeChanged
                    } else {
                        NetworkEventKind::QualityChanged
                    }
                }
                _ => {
                    if next.is_online() {
                        NetworkEventKind::Connected
                    } else {
                        NetworkEventKind::Disconnected
                    }
                }
            };

            let duration_ms = match kind {
                NetworkEventKind::Connected => inner
                    .disconnected_at
                    .take()
                    .map(|since| (now - since).num_milliseconds().max(0) as u64),
                _ => None,
            };
            if kind == NetworkEventKind::Disconnected {
                inner.disconnected_at = Some(now);
            }

            inner.current = Some(next.clone());
            inner.events.push_back(NetworkEvent {
                timestamp: now,
                kind,
                previous,
                current: next.clone(),
                duration_ms,
            });
            while inner.events.len() > self.config.event_history_limit {
                inner.events.pop_front();
            }

            (kind, inner.events.clone())
        };
        let (kind, events) = outcome;

        self.persist_record(EVENTS_RECORD, &events).await;

        info!(
            target: "network::monitor",
            kind = kind.as_str(),
            connection_type = next.connection_type.as_str(),
            online = next.is_online(),
            "connectivity changed"
        );

        self.notify_listeners(&next).await;

        match kind {
            NetworkEventKind::Connected => {
                let monitor = Arc::clone(self);
                tokio::spawn(async move {
                    monitor.run_probe().await;
                });
            }
            NetworkEventKind::TypeChanged if next.is_online() => {
                self.schedule_debounced_probe().await;
            }
            _ => {}
        }
    }

    async fn run_probe(self: &Arc<Self>) {
        let test = self.prober.probe().await;
        self.record_test(test).await;
    }

    // Probing right after a transport change measures the old link; let it
    // settle first, superseding any earlier pending probe.
    async fn schedule_debounced_probe(self: &Arc<Self>) {
        let delay = Duration::from_millis(self.config.type_change_debounce_ms);
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            monitor.run_probe().await;
        });

        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.probe_debounce.replace(handle) {
            previous.abort();
        }
    }

    async fn record_test(&self, test: ConnectionTest) {
        let (tests, refreshed) = {
            let mut inner = self.inner.write().await;
            inner.tests.push_back(test.clone());
            while inner.tests.len() > self.config.test_history_limit {
                inner.tests.pop_front();
            }

            let mut refreshed = None;
            if test.success {
                if let (Some(latency), Some(current)) =
                    (test.latency_ms, inner.current.as_mut())
                {
                    current.latency_ms = Some(latency);
                    current.speed = ConnectionSpeed::from_latency_ms(latency);
                    refreshed = Some(current.clone());
                }
            }

            (inner.tests.clone(), refreshed)
        };

        self.persist_record(TESTS_RECORD, &tests).await;

        debug!(
            target: "network::monitor",
            success = test.success,
            latency_ms = test.latency_ms,
            "connection test recorded"
        );

        // Measured speed/latency refresh the snapshot for listeners, but the
        // event history only chronicles platform-reported transitions.
        if let Some(quality) = refreshed {
            self.notify_listeners(&quality).await;
        }
    }

    async fn notify_listeners(&self, quality: &NetworkQuality) {
        let listeners = self.listeners.read().await;
        for (_, listener) in listeners.iter() {
            listener(quality);
        }
    }

    async fn persist_record<T: Serialize>(&self, record: &str, value: &VecDeque<T>) {
        let key = format!("{}:{}", self.namespace, record);
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "network::monitor", record, error = %err, "failed to serialize history");
                return;
            }
        };
        if let Err(err) = self.store.set(&key, &payload).await {
            warn!(target: "network::monitor", record, error = %err, "failed to persist history");
        }
    }
}

async fn load_record<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    namespace: &str,
    record: &str,
) -> VecDeque<T> {
    let key = format!("{namespace}:{record}");
    match store.get(&key).await {
        Ok(Some(payload)) => match serde_json::from_str(&payload) {
            Ok(values) => values,
            Err(err) => {
                warn!(
                    target: "network::monitor",
                    record,
                    error = %err,
                    "persisted history is invalid; starting empty"
                );
                VecDeque::new()
            }
        },
        Ok(None) => VecDeque::new(),
        Err(err) => {
            warn!(
                target: "network::monitor",
                record,
                error = %err,
                "failed to load persisted history; starting empty"
            );
            VecDeque::new()
        }
    }
}
