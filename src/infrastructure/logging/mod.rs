//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty formatting on stderr
//! - Rolling JSON log files when a log directory is configured

pub mod logger;

pub use logger::LoggerImpl;
