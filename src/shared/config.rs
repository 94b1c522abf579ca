use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub queue: QueueConfig,
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Hard cap on pending operations; enforced at enqueue time.
    pub max_size: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub batch_size: usize,
    pub batching_enabled: bool,
    /// Flush automatically on every offline-to-online transition.
    pub auto_sync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub probe_url: String,
    pub probe_timeout_ms: u64,
    pub probe_interval_secs: u64,
    /// Settling delay after a transport-type change before probing.
    pub type_change_debounce_ms: u64,
    pub event_history_limit: usize,
    pub test_history_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    /// Prefix for persisted record keys, so several instances can share a store.
    pub namespace: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            max_retries: 3,
            base_delay_ms: 1000,
            batch_size: 5,
            batching_enabled: true,
            auto_sync: true,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_url: "https://www.google.com/generate_204".to_string(),
            probe_timeout_ms: 5000,
            probe_interval_secs: 30,
            type_change_debounce_ms: 2000,
            event_history_limit: 100,
            test_history_limit: 50,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|dir| dir.join("musubi"))
            .unwrap_or_else(|| std::path::PathBuf::from("./data"));

        Self {
            database_url: format!("sqlite://{}?mode=rwc", data_dir.join("musubi.db").display()),
            namespace: "musubi".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            monitor: MonitorConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
