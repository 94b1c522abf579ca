pub mod connectivity_source;
pub mod key_value_store;
pub mod latency_prober;
pub mod remote_executor;

pub use connectivity_source::ConnectivitySource;
pub use key_value_store::KeyValueStore;
pub use latency_prober::LatencyProber;
pub use remote_executor::{ExecutionContext, RemoteExecutor};
