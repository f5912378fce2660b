//! Node Data Structures
//!
//! This module defines the `Node` record shared by the category tree and the
//! navigation tree, together with the input and filter types used to create,
//! patch and scan nodes.
//!
//! # Architecture
//!
//! - **Flat records**: Nodes live in one store keyed by id; hierarchy is the
//!   `parent_id` relation and is rebuilt on every read
//! - **Two families**: `Category` and `Navigation` nodes share the record shape;
//!   only navigation nodes may carry a `category_ref`
//! - **Sibling ordering**: `sort_order` is only meaningful within one parent
//!
//! # Examples
//!
//! ```rust
//! use catalog_tree_core::models::{Node, NodeType};
//!
//! let shoes = Node::new(NodeType::Department, "Shoes".to_string(), None);
//! let sneakers = Node::new(
//!     NodeType::Collection,
//!     "Sneakers".to_string(),
//!     Some(shoes.id.clone()),
//! );
//! assert!(shoes.is_root());
//! assert!(!sneakers.is_root());
//! ```

use crate::models::{NodeFamily, NodeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for Node fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("Invalid node family: {0}")]
    InvalidFamily(String),

    #[error("Node type '{node_type}' does not belong to the {family} family")]
    TypeFamilyMismatch { node_type: String, family: String },

    #[error("Invalid node ID format: {0}")]
    InvalidId(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Invalid category reference: {0}")]
    InvalidCategoryRef(String),

    #[error("Node ID already exists: {0}")]
    DuplicateId(String),
}

/// A unit of the category tree or the navigation tree
///
/// # Fields
///
/// - `id`: Opaque unique identifier, immutable after creation
/// - `family`: Tree the node belongs to
/// - `name`: Display label (non-empty)
/// - `parent_id`: Parent node in the same family (`None` marks a root)
/// - `sort_order`: Position among siblings, ascending
/// - `is_active`: Visibility flag for storefront-facing reads
/// - `node_type`: Closed type tag, must match `family`
/// - `category_ref`: Navigation only, the category this menu entry points at
/// - `url`: Optional link target for navigation entries
/// - `created_at` / `updated_at`: Stamped by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier
    pub id: String,

    /// Tree family
    pub family: NodeFamily,

    /// Display label
    pub name: String,

    /// Parent node ID (same family)
    pub parent_id: Option<String>,

    /// Position among siblings (lower sorts first)
    pub sort_order: i64,

    /// Visibility flag
    pub is_active: bool,

    /// Type tag
    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Referenced category (navigation nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_ref: Option<String>,

    /// Link target (navigation nodes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Create a new active Node with an auto-generated UUID
    ///
    /// The family is derived from `node_type`; `sort_order` starts at 0.
    pub fn new(node_type: NodeType, name: String, parent_id: Option<String>) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), node_type, name, parent_id)
    }

    /// Create a new active Node with an explicit ID
    pub fn new_with_id(
        id: String,
        node_type: NodeType,
        name: String,
        parent_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            family: node_type.family(),
            name,
            parent_id,
            sort_order: 0,
            is_active: true,
            node_type,
            category_ref: None,
            url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style sort order
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Builder-style category reference
    pub fn with_category_ref(mut self, category_ref: impl Into<String>) -> Self {
        self.category_ref = Some(category_ref.into());
        self
    }

    /// Builder-style visibility flag
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Validate node fields that do not need the rest of the tree
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` or `name` is empty
    /// - `node_type` belongs to another family
    /// - a category node carries a `category_ref`
    /// - the node references itself as parent or category
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }

        if self.node_type.family() != self.family {
            return Err(ValidationError::TypeFamilyMismatch {
                node_type: self.node_type.as_token().to_string(),
                family: self.family.to_string(),
            });
        }

        if let Some(category_ref) = &self.category_ref {
            if self.family != NodeFamily::Navigation {
                return Err(ValidationError::InvalidCategoryRef(
                    "only navigation nodes can reference a category".to_string(),
                ));
            }
            if category_ref == &self.id {
                return Err(ValidationError::InvalidCategoryRef(
                    "node cannot reference itself".to_string(),
                ));
            }
        }

        if let Some(parent_id) = &self.parent_id {
            if parent_id.trim().is_empty() {
                return Err(ValidationError::InvalidParent(
                    "parent id cannot be blank".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// A root has no parent
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Apply a sparse update in place (store-side helper)
    ///
    /// Only provided fields change; `updated_at` is stamped with `now`.
    pub fn apply_update(&mut self, update: &NodeUpdate, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(parent_id) = &update.parent_id {
            self.parent_id = parent_id.clone();
        }
        if let Some(sort_order) = update.sort_order {
            self.sort_order = sort_order;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(node_type) = update.node_type {
            self.node_type = node_type;
        }
        if let Some(category_ref) = &update.category_ref {
            self.category_ref = category_ref.clone();
        }
        if let Some(url) = &update.url {
            self.url = url.clone();
        }
        self.updated_at = now;
    }
}

/// Input for creating a node through the tree service
///
/// `sort_order: None` asks the engine to append after the current last
/// sibling. `id: None` asks for a generated UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub category_ref: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl NewNode {
    /// Minimal input: a type and a name, appended as a root
    pub fn new(node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            parent_id: None,
            sort_order: None,
            is_active: None,
            node_type,
            category_ref: None,
            url: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn with_category_ref(mut self, category_ref: impl Into<String>) -> Self {
        self.category_ref = Some(category_ref.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Custom deserializer for optional fields that accepts both plain values and nulls
///
/// Maps three input formats to the double-Option pattern:
/// - Missing field → None (don't update)
/// - null → Some(None) (set to NULL)
/// - "value" → Some(Some("value")) (set to value)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update structure for PATCH operations
///
/// All fields are optional. Nullable references use the double-Option pattern:
///
/// - `None`: Don't change this field
/// - `Some(None)`: Clear the field
/// - `Some(Some(value))`: Set the field
///
/// # Examples
///
/// ```rust
/// # use catalog_tree_core::models::NodeUpdate;
/// // Rename only
/// let update = NodeUpdate::new().with_name("Footwear");
///
/// // Move to the top level
/// let update = NodeUpdate {
///     parent_id: Some(None),
///     ..Default::default()
/// };
/// assert!(!update.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Uses double-Option pattern (see type docs)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,

    /// Uses double-Option pattern (see type docs)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub category_ref: Option<Option<String>>,

    /// Uses double-Option pattern (see type docs)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub url: Option<Option<String>>,
}

impl NodeUpdate {
    /// Create a new empty NodeUpdate
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set (`Some`) or clear (`None`) the parent
    pub fn with_parent(mut self, parent_id: Option<String>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    /// Set (`Some`) or clear (`None`) the category reference
    pub fn with_category_ref(mut self, category_ref: Option<String>) -> Self {
        self.category_ref = Some(category_ref);
        self
    }

    /// Check if update contains any changes
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.parent_id.is_none()
            && self.sort_order.is_none()
            && self.is_active.is_none()
            && self.node_type.is_none()
            && self.category_ref.is_none()
            && self.url.is_none()
    }
}

/// Result of a delete operation
///
/// Store deletes are idempotent; `existed` reports whether a row was removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResult {
    pub existed: bool,
}

impl DeleteResult {
    pub fn existed() -> Self {
        Self { existed: true }
    }

    pub fn not_found() -> Self {
        Self { existed: false }
    }
}

/// Parent constraint for scans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum ParentFilter {
    /// Only nodes without a parent
    Root,
    /// Only direct children of the given node
    Of(String),
}

/// Filter for store scans
///
/// All set fields are combined with AND; unset fields don't filter.
///
/// # Examples
///
/// ```rust
/// # use catalog_tree_core::models::{NodeFamily, NodeFilter};
/// let active_menu = NodeFilter::for_family(NodeFamily::Navigation).active_only();
/// assert!(active_menu.active_only);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
    pub family: Option<NodeFamily>,
    pub parent: Option<ParentFilter>,
    #[serde(default)]
    pub active_only: bool,
    pub node_type: Option<NodeType>,
    pub ids: Option<Vec<String>>,
    pub category_ref: Option<String>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_family(family: NodeFamily) -> Self {
        Self {
            family: Some(family),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: ParentFilter) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_category_ref(mut self, category_id: impl Into<String>) -> Self {
        self.category_ref = Some(category_id.into());
        self
    }

    /// In-process evaluation of the filter against one node
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(family) = self.family {
            if node.family != family {
                return false;
            }
        }
        match &self.parent {
            Some(ParentFilter::Root) if node.parent_id.is_some() => return false,
            Some(ParentFilter::Of(parent_id)) if node.parent_id.as_ref() != Some(parent_id) => {
                return false
            }
            _ => {}
        }
        if self.active_only && !node.is_active {
            return false;
        }
        if let Some(node_type) = self.node_type {
            if node.node_type != node_type {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&node.id) {
                return false;
            }
        }
        if let Some(category_ref) = &self.category_ref {
            if node.category_ref.as_ref() != Some(category_ref) {
                return false;
            }
        }
        true
    }
}

/// One `(id, sort_order)` pair of a bulk reorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderItem {
    pub id: String,
    pub sort_order: i64,
}

impl ReorderItem {
    pub fn new(id: impl Into<String>, sort_order: i64) -> Self {
        Self {
            id: id.into(),
            sort_order,
        }
    }
}

/// How a delete treats the node's children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeletePolicy {
    /// Refuse while children exist
    #[default]
    Block,
    /// Delete the whole subtree
    CascadeChildren,
    /// Reattach the children elsewhere, then delete
    OrphanChildren,
}

impl DeletePolicy {
    /// Whether the family's domain allows this policy
    ///
    /// Submenus are deleted together with their parent entry, categories are
    /// force-deleted by reattaching their children.
    pub fn is_supported_for(&self, family: NodeFamily) -> bool {
        match self {
            DeletePolicy::Block => true,
            DeletePolicy::CascadeChildren => family == NodeFamily::Navigation,
            DeletePolicy::OrphanChildren => family == NodeFamily::Category,
        }
    }
}
