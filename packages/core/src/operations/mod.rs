//! Tree Operations
//!
//! Pure functions over flat node sets:
//!
//! - [`tree_builder`] - assemble nested trees and shallow listings
//! - [`validator`] - cycle, depth and reference checks run before writes
//!
//! Nothing here touches the store; the tree service fetches the candidate
//! set and hands it in.

pub mod error;
pub mod tree_builder;
pub mod validator;

pub use error::TreeOperationError;
pub use tree_builder::{
    build_shallow, build_tree, count_children, sibling_order, RootFilter, ShallowNode, TreeBuild,
    TreeNode,
};
pub use validator::{
    depth_of, descendants_bottom_up, subtree_height, validate_category_reference,
    validate_new_child, validate_parent_reference, validate_reparent,
};
