//! Domain layer for the Trellis task graph.
//!
//! Pure data contracts (tasks, checklists, links, audit records), the error
//! type, and the ports storage adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, ErrorKind};
