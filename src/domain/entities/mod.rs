mod network_event;
mod network_quality;
mod queue_stats;
mod queued_operation;
mod sync_report;

pub use connection_test::ConnectionTest;
pub use network_event::{NetworkEvent, NetworkEventKind};
pub use network_quality::{NetworkQuality, RawConnectionDetails, RawConnectivityState};
pub use queue_stats::QueueStats;
pub use queued_operation::{OperationDescriptor, QueuedOperation};
pub use sync_report::SyncReport;
