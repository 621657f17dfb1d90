//! Storage capability for neuroflow.
//!
//! Every write is a single-row transaction: it either commits completely or
//! leaves the store untouched.
//!
//! # Main types
//!
//! - [`Storage`]: Async storage trait consumed by the graph, tools and audit worker.
//! - [`SqliteStorage`]: SQLite-backed implementation used in production.
//! - [`InMemoryStorage`]: In-process implementation for tests and ephemeral runs.

/// Persisted entity types.
pub mod entities;
/// SQLite-backed storage.
pub mod sqlite;
/// Storage trait and in-memory implementation.
pub mod store;

pub use entities::{
    CitizenReport, ContactLead, CourseRegistration, EdgeInsert, GraphEdge, GraphNode,
};
pub use sqlite::SqliteStorage;
pub use store::{InMemoryStorage, Storage};
