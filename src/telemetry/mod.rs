//! Structured logging setup for hosts embedding the video core

pub mod logging;

pub use logging::{init_logging, LogConfig, LogError, LogGuard};
