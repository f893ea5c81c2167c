//! # limiquantix Common
//!
//! Shared utilities for limiquantix components.
//!
//! ## Logging
//!
//! ```no_run
//! use limiquantix_common::{init_logging_with_format, LogFormat};
//!
//! init_logging_with_format("info", LogFormat::Json).unwrap();
//! tracing::info!(phase = "updateChecking", "Rendering page");
//! ```

pub mod logging;

// Re-export logging functions
pub use logging::{
    init_logging,
    init_logging_json,
    init_logging_with_format,
    LogFormat,
};
