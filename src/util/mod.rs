//! Utility modules for buildwise
//!
//! Currently this holds structured logging setup; the engine itself only
//! emits `tracing` events and leaves subscriber installation to the host.

pub mod logging;

// Re-export commonly used items
pub use logging::{init_default, init_from_env, init_logging, LoggingConfig};
