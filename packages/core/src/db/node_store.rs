//! NodeStore Trait - Persistence Abstraction Layer
//!
//! This module defines the `NodeStore` trait that abstracts persistence of
//! tree nodes. The tree service only ever talks to this trait, so the same
//! engine runs over the in-memory adapter and the libsql adapter.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded and networked
//!    backends fit the same contract
//! 2. **Ownership Semantics**: Methods take ownership of values to avoid
//!    unnecessary cloning (caller can clone if needed)
//! 3. **Error Handling**: Uses `anyhow::Result` for flexible error context;
//!    the service layer maps failures onto its own taxonomy
//! 4. **Transactions as data**: A transaction is a `Vec<StoreWrite>` applied
//!    all-or-nothing, which keeps the trait object-safe
//!
//! # Examples
//!
//! ```rust
//! use catalog_tree_core::db::{InMemoryStore, NodeStore};
//! use catalog_tree_core::models::{Node, NodeType};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store: Arc<dyn NodeStore> = Arc::new(InMemoryStore::new());
//! let node = Node::new(NodeType::Department, "Shoes".to_string(), None);
//! let created = store.create_node(node).await?;
//! assert!(store.get_node(&created.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

use crate::models::{DeleteResult, Node, NodeFamily, NodeFilter, NodeUpdate};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Condition checked inside a batch, against the rows as they are when the
/// batch runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteGuard {
    /// `id` has no children
    NoChildren { id: String },
    /// No product is linked to `category_id`
    NoProducts { category_id: String },
    /// No navigation node references `category_id`
    NotReferenced { category_id: String },
}

/// A guard that found matching rows; the batch was rolled back
///
/// Adapters return this as the error of `run_transaction`, so callers can
/// recover it with `anyhow::Error::downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Write guard {guard:?} failed: {found} matching row(s)")]
pub struct GuardViolation {
    pub guard: WriteGuard,
    pub found: usize,
}

/// One write inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    /// Sparse update of an existing node; a missing id aborts the batch
    UpdateNode { id: String, update: NodeUpdate },

    /// Remove a node (idempotent inside the batch)
    DeleteNode { id: String },

    /// Move every product linked to `from_category` onto `to_category`
    /// (`None` leaves the products without a category)
    RelinkProducts {
        from_category: String,
        to_category: Option<String>,
    },

    /// Move every current child of `from_parent` under `to_parent`
    /// (`None` makes them roots)
    ReparentChildren {
        from_parent: String,
        to_parent: Option<String>,
    },

    /// Clear `category_ref` on every navigation node pointing at `category_id`
    ClearCategoryRefs { category_id: String },

    /// Abort the batch with a [`GuardViolation`] unless the condition holds
    Guard(WriteGuard),
}

impl StoreWrite {
    pub fn update(id: impl Into<String>, update: NodeUpdate) -> Self {
        StoreWrite::UpdateNode {
            id: id.into(),
            update,
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        StoreWrite::DeleteNode { id: id.into() }
    }

    pub fn no_children(id: impl Into<String>) -> Self {
        StoreWrite::Guard(WriteGuard::NoChildren { id: id.into() })
    }
}

/// Abstraction layer for node persistence operations
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single store can be shared by
/// concurrent requests behind an `Arc`.
#[async_trait]
pub trait NodeStore: Send + Sync {
    //
    // CORE CRUD OPERATIONS
    //

    /// Create a new node
    ///
    /// The store stamps `created_at` / `updated_at` and returns the stored
    /// record.
    ///
    /// # Errors
    ///
    /// Returns error if the node ID already exists.
    async fn create_node(&self, node: Node) -> Result<Node>;

    /// Get node by ID
    ///
    /// - `Ok(Some(node))` if node exists
    /// - `Ok(None)` if node doesn't exist (not an error)
    async fn get_node(&self, id: &str) -> Result<Option<Node>>;

    /// Sparse update; returns the full updated node
    ///
    /// # Errors
    ///
    /// Returns error if the node doesn't exist.
    async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<Node>;

    /// Delete a single node (no cascading)
    ///
    /// Idempotent: deleting a missing node succeeds with `existed = false`.
    async fn delete_node(&self, id: &str) -> Result<DeleteResult>;

    //
    // QUERYING
    //

    /// Scan nodes matching the filter
    ///
    /// Ordered by `(sort_order, id)` so callers get a stable listing.
    async fn query_nodes(&self, filter: NodeFilter) -> Result<Vec<Node>>;

    /// Highest `sort_order` among the children of `parent_id`
    /// (`None` = roots) in the given family; `None` when the group is empty
    async fn max_sort_order(
        &self,
        family: NodeFamily,
        parent_id: Option<&str>,
    ) -> Result<Option<i64>>;

    /// Number of products linked to each of the given categories
    ///
    /// Categories without products are absent from the map.
    async fn product_counts(&self, category_ids: &[String]) -> Result<HashMap<String, u64>>;

    //
    // TRANSACTIONS
    //

    /// Apply all writes atomically
    ///
    /// Either every write is applied or none is. Writes run in order under
    /// the store's write lock, so set-based writes and guards see rows added
    /// after the caller planned the batch. An `UpdateNode` that targets a
    /// missing id fails the whole batch; a failed guard fails it with a
    /// [`GuardViolation`].
    async fn run_transaction(&self, writes: Vec<StoreWrite>) -> Result<()>;
}
