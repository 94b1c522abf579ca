pub mod network_monitor;
pub mod offline_queue;

pub use network_monitor::{ConnectionStatsSnapshot, ListenerId, NetworkMonitor};
pub use offline_queue::{EnqueueOptions, OfflineQueue};
