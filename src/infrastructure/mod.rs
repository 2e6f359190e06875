//! Infrastructure layer module
//!
//! Ambient concerns that sit outside the domain:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//!
//! Storage adapters live under `crate::adapters`.

pub mod config;
pub mod logging;
