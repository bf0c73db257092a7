//! Pure progress derivation: run bounds, the dual-clock projector, derived
//! snapshots, and the bounded fault history they carry.

pub mod bounds;
pub mod fault_log;
pub mod projector;
pub mod snapshot;

pub use bounds::RunBounds;
pub use fault_log::{FaultEntry, FaultLog, FAULT_LOG_CAPACITY};
pub use projector::project;
pub use snapshot::Snapshot;
