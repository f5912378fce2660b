//! Output Formatter
//!
//! Converts stored nodes into the caller-facing [`NodeView`] shape: the type
//! tag becomes its kebab token plus label and icon, navigation entries get a
//! summary of the category they point at, and counts are filled in from a
//! [`FormatContext`] prepared by the service. Input is never modified.

use crate::models::{Node, NodeFamily};
use crate::operations::{ShallowNode, TreeNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Summary of the category a navigation entry points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub is_root_category: bool,
    /// `"Category"` for roots, `"Subcategory"` otherwise
    pub label: String,
}

impl CategorySummary {
    pub fn from_category(category: &Node) -> Self {
        let is_root = category.is_root();
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
            is_root_category: is_root,
            label: if is_root { "Category" } else { "Subcategory" }.to_string(),
        }
    }
}

/// Caller-facing node shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: String,
    pub family: NodeFamily,
    pub name: String,
    pub parent_id: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,

    /// Kebab token, e.g. `category-link`
    #[serde(rename = "type")]
    pub node_type: String,
    pub type_label: String,
    pub type_icon: String,

    /// Category nodes only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_root_category: Option<bool>,

    /// Navigation nodes with a resolvable `categoryRef`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategorySummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub children_count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_count: Option<u64>,

    #[serde(default)]
    pub children: Vec<NodeView>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeView {
    /// Nodes in this view, including nested children
    pub fn total_nodes(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(NodeView::total_nodes)
            .sum::<usize>()
    }
}

/// Lookups the formatter needs beyond the node itself
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    /// Categories referenced by navigation nodes, keyed by id
    pub categories: HashMap<String, Node>,
    /// Direct child counts keyed by parent id
    pub children_counts: HashMap<String, usize>,
    /// Linked product counts keyed by category id
    pub product_counts: HashMap<String, u64>,
}

impl FormatContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Node>) -> Self {
        self.categories
            .extend(categories.into_iter().map(|c| (c.id.clone(), c)));
        self
    }

    pub fn with_children_counts(mut self, counts: HashMap<String, usize>) -> Self {
        self.children_counts = counts;
        self
    }

    pub fn with_product_counts(mut self, counts: HashMap<String, u64>) -> Self {
        self.product_counts = counts;
        self
    }
}

/// Format a single node without children
pub fn format_node(node: &Node, context: &FormatContext) -> NodeView {
    with_children(node, Vec::new(), context)
}

fn with_children(node: &Node, children: Vec<NodeView>, context: &FormatContext) -> NodeView {
    let children_count = if children.is_empty() {
        context.children_counts.get(&node.id).copied().unwrap_or(0)
    } else {
        children.len()
    };

    let (is_root_category, product_count, category) = match node.family {
        NodeFamily::Category => (
            Some(node.is_root()),
            Some(context.product_counts.get(&node.id).copied().unwrap_or(0)),
            None,
        ),
        NodeFamily::Navigation => (
            None,
            None,
            node.category_ref
                .as_ref()
                .and_then(|id| context.categories.get(id))
                .map(CategorySummary::from_category),
        ),
    };

    NodeView {
        id: node.id.clone(),
        family: node.family,
        name: node.name.clone(),
        parent_id: node.parent_id.clone(),
        sort_order: node.sort_order,
        is_active: node.is_active,
        node_type: node.node_type.as_token().to_string(),
        type_label: node.node_type.label().to_string(),
        type_icon: node.node_type.icon().to_string(),
        is_root_category,
        category_ref: node.category_ref.clone(),
        category,
        url: node.url.clone(),
        children_count,
        product_count,
        children,
        created_at: node.created_at,
        updated_at: node.updated_at,
    }
}

/// Format a nested tree depth-first
pub fn format_tree(roots: &[TreeNode], context: &FormatContext) -> Vec<NodeView> {
    roots
        .iter()
        .map(|tree| format_tree_node(tree, context))
        .collect()
}

/// Format one subtree depth-first
pub fn format_tree_node(tree: &TreeNode, context: &FormatContext) -> NodeView {
    let children = format_tree(&tree.children, context);
    with_children(&tree.node, children, context)
}

/// Format one-level listings
pub fn format_shallow(items: &[ShallowNode], context: &FormatContext) -> Vec<NodeView> {
    items
        .iter()
        .map(|item| {
            let children = item
                .children
                .iter()
                .map(|child| format_node(child, context))
                .collect::<Vec<_>>();
            let mut view = with_children(&item.node, children, context);
            view.children_count = item.children_count;
            view
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;
    use crate::operations::{build_shallow, build_tree, RootFilter};

    fn category(id: &str, parent: Option<&str>) -> Node {
        Node::new_with_id(
            id.to_string(),
            NodeType::Department,
            format!("Category {}", id),
            parent.map(str::to_string),
        )
    }

    #[test]
    fn formats_type_token_label_and_icon() {
        let node = Node::new_with_id(
            "n1".to_string(),
            NodeType::ExternalLink,
            "Blog".to_string(),
            None,
        );
        let view = format_node(&node, &FormatContext::new());

        assert_eq!(view.node_type, "external-link");
        assert_eq!(view.type_label, NodeType::ExternalLink.label());
        assert_eq!(view.type_icon, NodeType::ExternalLink.icon());
        assert_eq!(view.is_root_category, None);
        assert_eq!(view.product_count, None);
    }

    #[test]
    fn navigation_entry_gets_category_summary() {
        let root = category("c1", None);
        let sub = category("c2", Some("c1"));
        let link = Node::new_with_id(
            "n1".to_string(),
            NodeType::CategoryLink,
            "Shoes".to_string(),
            None,
        )
        .with_category_ref("c2");

        let context = FormatContext::new().with_categories(vec![root, sub]);
        let view = format_node(&link, &context);
        let summary = view.category.expect("category summary");

        assert_eq!(summary.id, "c2");
        assert!(!summary.is_root_category);
        assert_eq!(summary.label, "Subcategory");
    }

    #[test]
    fn unresolvable_category_ref_has_no_summary() {
        let link = Node::new_with_id(
            "n1".to_string(),
            NodeType::CategoryLink,
            "Gone".to_string(),
            None,
        )
        .with_category_ref("missing");
        let view = format_node(&link, &FormatContext::new());
        assert_eq!(view.category_ref.as_deref(), Some("missing"));
        assert!(view.category.is_none());
    }

    #[test]
    fn children_count_prefers_materialized_children() {
        let nodes = vec![category("1", None), category("2", Some("1")), category("3", Some("2"))];
        let build = build_tree(&nodes, &RootFilter::TopLevel, 50);

        let mut counts = HashMap::new();
        counts.insert("1".to_string(), 99);
        counts.insert("3".to_string(), 4);
        let context = FormatContext::new().with_children_counts(counts);

        let views = format_tree(&build.roots, &context);
        assert_eq!(views[0].children_count, 1);
        assert_eq!(views[0].children[0].children_count, 1);
        // leaf falls back to the precomputed count
        assert_eq!(views[0].children[0].children[0].children_count, 4);
    }

    #[test]
    fn category_fields_use_context_counts() {
        let mut products = HashMap::new();
        products.insert("1".to_string(), 12);
        let context = FormatContext::new().with_product_counts(products);

        let root = format_node(&category("1", None), &context);
        assert_eq!(root.is_root_category, Some(true));
        assert_eq!(root.product_count, Some(12));

        let child = format_node(&category("2", Some("1")), &context);
        assert_eq!(child.is_root_category, Some(false));
        assert_eq!(child.product_count, Some(0));
    }

    #[test]
    fn shallow_view_keeps_one_level() {
        let nodes = vec![category("1", None), category("2", Some("1")), category("3", Some("2"))];
        let shallow = build_shallow(&nodes, |n| n.is_root());
        let views = format_shallow(&shallow, &FormatContext::new());

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].children_count, 1);
        assert!(views[0].children[0].children.is_empty());
    }

    #[test]
    fn round_trip_preserves_every_node() {
        let mut nodes = vec![category("root", None)];
        for i in 0..10 {
            nodes.push(category(&format!("a{}", i), Some("root")));
            nodes.push(category(&format!("b{}", i), Some(&format!("a{}", i))));
        }

        let build = build_tree(&nodes, &RootFilter::TopLevel, 50);
        let views = format_tree(&build.roots, &FormatContext::new());
        let total: usize = views.iter().map(NodeView::total_nodes).sum();
        assert_eq!(total, nodes.len());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let view = format_node(&category("1", None), &FormatContext::new());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "department");
        assert_eq!(json["isRootCategory"], true);
        assert_eq!(json["childrenCount"], 0);
        assert!(json.get("parentId").is_some());
    }
}
