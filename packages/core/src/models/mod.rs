//! Data Models
//!
//! This module contains the core data structures shared by both trees:
//!
//! - `Node` - The record for category and navigation nodes
//! - `NodeFamily` / `NodeType` - Closed family and type tags
//! - `NewNode`, `NodeUpdate`, `ReorderItem`, `DeletePolicy` - Mutation inputs
//! - `NodeFilter` - Store scan filter

mod node;
mod node_type;

pub use node::{
    DeletePolicy, DeleteResult, NewNode, Node, NodeFilter, NodeUpdate, ParentFilter, ReorderItem,
    ValidationError,
};
pub use node_type::{NodeFamily, NodeType};
