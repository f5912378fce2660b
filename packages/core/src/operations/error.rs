//! Error types for structural tree checks
//!
//! These errors are raised by the pure functions in [`crate::operations`]
//! when a requested parent or reference would break a tree invariant.

use crate::models::NodeFamily;
use thiserror::Error;

/// Structural invariant violations
///
/// # Examples
///
/// ```rust
/// use catalog_tree_core::operations::TreeOperationError;
///
/// let err = TreeOperationError::Cycle {
///     node_id: "b".to_string(),
///     parent_id: "b".to_string(),
/// };
/// assert!(err.to_string().contains("cycle"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeOperationError {
    /// Placing `node_id` under `parent_id` would make it its own ancestor
    #[error("Moving '{node_id}' under '{parent_id}' would create a cycle")]
    Cycle { node_id: String, parent_id: String },

    /// A referenced id does not exist in the expected family
    #[error("{field} references '{id}' which is not an existing {family} node")]
    DanglingReference {
        field: String,
        id: String,
        family: NodeFamily,
    },

    /// The resulting tree would be deeper than the configured cap
    #[error("Node '{node_id}' would reach depth {depth}, deeper than the limit of {max_depth}")]
    DepthLimitExceeded {
        node_id: String,
        depth: usize,
        max_depth: usize,
    },
}

impl TreeOperationError {
    pub fn cycle(node_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::Cycle {
            node_id: node_id.into(),
            parent_id: parent_id.into(),
        }
    }

    pub fn dangling(field: impl Into<String>, id: impl Into<String>, family: NodeFamily) -> Self {
        Self::DanglingReference {
            field: field.into(),
            id: id.into(),
            family,
        }
    }
}
