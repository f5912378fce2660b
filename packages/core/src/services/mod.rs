//! Business Services
//!
//! - `TreeService` - reads, validated writes, reorder and delete policies for
//!   one tree family
//! - `formatter` - conversion of stored nodes into caller-facing views
//!
//! Services coordinate between the store and the pure tree operations.

pub mod error;
pub mod formatter;
pub mod tree_service;

pub use error::TreeServiceError;
pub use formatter::{
    format_node, format_shallow, format_tree, format_tree_node, CategorySummary, FormatContext,
    NodeView,
};
pub use tree_service::{DeleteOutcome, ListFilter, TreeService, Visibility};
