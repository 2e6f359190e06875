//! In-memory graph adapter.
//!
//! Used by the engine's unit tests and by callers that want an ephemeral
//! graph without a database file.

pub mod graph;

pub use graph::{InMemoryGraph, InMemoryGraphTransaction};
