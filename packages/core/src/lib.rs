//! Catalog Tree Engine
//!
//! This crate manages the two hierarchical trees of the storefront: the
//! product category tree and the site navigation tree. Both are stored as
//! flat node records and rebuilt into nested trees on read.
//!
//! # Architecture
//!
//! - **Flat storage**: nodes keyed by id, hierarchy via `parent_id`
//! - **Validated writes**: cycle, depth and reference checks run before every
//!   write that touches the hierarchy
//! - **Atomic batches**: reorders and multi-node deletes are one store
//!   transaction
//! - **libsql/SQLite**: default store adapter; an in-memory adapter is
//!   always available
//!
//! # Modules
//!
//! - [`models`] - Node record, type tags, mutation inputs, scan filters
//! - [`db`] - Store contract and adapters
//! - [`operations`] - Tree builder and structural validator
//! - [`services`] - `TreeService` and the output formatter
//! - [`config`] - Tree policy configuration

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::{CategoryRefPolicy, OrphanStrategy, TreeConfig};
pub use models::*;
pub use services::*;
