//! Persistence Layer
//!
//! This module holds the store contract the tree engine consumes and the
//! adapters that implement it:
//!
//! - [`NodeStore`] - async persistence trait (point reads, scans, atomic batches)
//! - [`InMemoryStore`] - HashMap-backed adapter for tests and embedding
//! - [`TursoStore`] over [`DatabaseService`] - libsql/SQLite adapter
//!   (behind the default `turso` feature)

mod memory_store;
pub mod node_store;

#[cfg(feature = "turso")]
mod database;
#[cfg(feature = "turso")]
mod error;
#[cfg(feature = "turso")]
mod turso_store;

pub use memory_store::InMemoryStore;
pub use node_store::{GuardViolation, NodeStore, StoreWrite, WriteGuard};

#[cfg(feature = "turso")]
pub use database::DatabaseService;
#[cfg(feature = "turso")]
pub use error::DatabaseError;
#[cfg(feature = "turso")]
pub use turso_store::TursoStore;
