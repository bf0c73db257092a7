//! Boundary with the external simulation engine: the typed event stream it
//! emits and the single control call it accepts.

pub mod control;
pub mod event;

pub use control::{CancellationControl, ControlFuture, EngineControl};
pub use event::{EngineEvent, RawProgressEvent};
