pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::{
    ConnectivitySource, ExecutionContext, KeyValueStore, LatencyProber, RemoteExecutor,
};
pub use application::services::{
    ConnectionStatsSnapshot, EnqueueOptions, ListenerId, NetworkMonitor, OfflineQueue,
};
pub use domain::entities::{
    ConnectionTest, NetworkEvent, NetworkEventKind, NetworkQuality, OperationDescriptor,
    QueueStats, QueuedOperation, RawConnectionDetails, RawConnectivityState, SyncReport,
};
pub use domain::value_objects::{
    CellularGeneration, ConnectionSpeed, ConnectionType, OperationId, Priority, SignalStrength,
};
pub use shared::config::{AppConfig, MonitorConfig, QueueConfig, StorageConfig};
pub use shared::error::{QueueError, StoreError};
