//! Utility modules.

/// Date/time serialization helpers shared by backends.
pub mod datetime;

/// Log sanitization utilities to keep response bodies out of logs.
pub mod log_sanitizer;
