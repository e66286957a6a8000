pub mod edges;
pub mod sensors;
pub mod vane;

pub use edges::{listen, EdgeHandlers};
pub use sensors::{SensorSuite, SnapshotFileSensors};
pub use vane::VaneMonitor;
