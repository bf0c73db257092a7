//! Runtime glue that wires configuration, abort handling, telemetry, and the
//! orchestrator that drives a monitored run.

pub mod config;
pub mod fatal;
pub mod orchestrator;
pub mod state;
pub mod telemetry;
