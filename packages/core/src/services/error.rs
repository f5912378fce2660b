//! Service Layer Error Types
//!
//! The caller-facing error taxonomy of the tree service. Field validation,
//! structural checks and store failures from the lower layers are all mapped
//! onto [`TreeServiceError`] so callers match on one enum.

use crate::config::ConfigError;
use crate::models::{DeletePolicy, NodeFamily, ValidationError};
use crate::operations::TreeOperationError;
use thiserror::Error;

/// Tree service operation errors
#[derive(Error, Debug)]
pub enum TreeServiceError {
    /// Node not found by ID (or it belongs to the other family)
    #[error("Node not found: {id}")]
    NotFound { id: String },

    /// A parent or category reference points at nothing
    #[error("{field} references missing {family} node '{id}'")]
    DanglingReference {
        field: String,
        id: String,
        family: NodeFamily,
    },

    /// The requested parent would make the node its own ancestor
    #[error("Moving '{node_id}' under '{parent_id}' would create a cycle")]
    Cycle { node_id: String, parent_id: String },

    /// The requested placement is deeper than the configured cap
    #[error("Node '{node_id}' would reach depth {depth} (limit {max_depth})")]
    DepthLimitExceeded {
        node_id: String,
        depth: usize,
        max_depth: usize,
    },

    /// Delete blocked by children
    #[error("Node '{id}' has {children} child node(s)")]
    HasChildren { id: String, children: usize },

    /// Delete blocked by linked products
    #[error("Category '{id}' has {products} linked product(s)")]
    HasProducts { id: String, products: u64 },

    /// Delete refused because navigation items point at the category
    #[error("Category '{id}' is referenced by {references} navigation item(s)")]
    ReferencedByNavigation { id: String, references: usize },

    /// Delete policy not available for this family
    #[error("Delete policy {policy:?} is not supported for {family} nodes")]
    UnsupportedPolicy {
        policy: DeletePolicy,
        family: NodeFamily,
    },

    /// Malformed reorder batch
    #[error("Invalid reorder request: {0}")]
    InvalidReorder(String),

    /// Field-level validation failure
    #[error("Node validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Service configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Atomic batch failed and was rolled back
    #[error("Transaction failed: {context}")]
    Transaction { context: String },

    /// Any other store failure
    #[error("Store operation failed: {context}")]
    Store { context: String },
}

impl TreeServiceError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a dangling reference error
    pub fn dangling(field: impl Into<String>, id: impl Into<String>, family: NodeFamily) -> Self {
        Self::DanglingReference {
            field: field.into(),
            id: id.into(),
            family,
        }
    }

    /// Create an invalid reorder error
    pub fn invalid_reorder(msg: impl Into<String>) -> Self {
        Self::InvalidReorder(msg.into())
    }

    /// Wrap a failed atomic batch
    pub fn transaction(err: anyhow::Error) -> Self {
        Self::Transaction {
            context: format!("{:#}", err),
        }
    }

    /// Wrap a store failure with the operation that hit it
    pub fn store(operation: &str, err: anyhow::Error) -> Self {
        Self::Store {
            context: format!("{}: {:#}", operation, err),
        }
    }
}

impl From<TreeOperationError> for TreeServiceError {
    fn from(err: TreeOperationError) -> Self {
        match err {
            TreeOperationError::Cycle { node_id, parent_id } => {
                Self::Cycle { node_id, parent_id }
            }
            TreeOperationError::DanglingReference { field, id, family } => {
                Self::DanglingReference { field, id, family }
            }
            TreeOperationError::DepthLimitExceeded {
                node_id,
                depth,
                max_depth,
            } => Self::DepthLimitExceeded {
                node_id,
                depth,
                max_depth,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_keep_their_fields() {
        let err: TreeServiceError = TreeOperationError::cycle("a", "b").into();
        assert!(matches!(
            err,
            TreeServiceError::Cycle { ref node_id, ref parent_id } if node_id == "a" && parent_id == "b"
        ));

        let err: TreeServiceError =
            TreeOperationError::dangling("categoryRef", "c9", NodeFamily::Category).into();
        assert_eq!(
            err.to_string(),
            "categoryRef references missing CATEGORY node 'c9'"
        );
    }

    #[test]
    fn store_errors_carry_operation_context() {
        let err = TreeServiceError::store("get_node", anyhow::anyhow!("disk on fire"));
        assert_eq!(
            err.to_string(),
            "Store operation failed: get_node: disk on fire"
        );
    }
}
