//! Utility modules shared across the crate.

/// Logging setup and verbosity levels
pub mod log;
