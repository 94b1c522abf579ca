mod connectivity;
mod operation_id;
mod priority;

pub use connectivity::{CellularGeneration, ConnectionSpeed, ConnectionType, SignalStrength};
pub use operation_id::OperationId;
pub use priority::Priority;
