//! Tree Builder
//!
//! Turns a flat slice of nodes into nested trees. The hierarchy is never
//! stored as a pointer graph: every read groups the fetched rows by
//! `parent_id` and walks the groups.
//!
//! # Guarantees
//!
//! - Siblings are ordered by `sort_order` ascending, ties by `id`, whatever
//!   the input order
//! - Recursion stops at `max_depth`; nodes not placed (too deep, part of a
//!   cycle, or under a parent missing from the input) come back in
//!   [`TreeBuild::unattached`] instead of being looped over
//! - Each input node appears at most once in the output
//!
//! All functions are pure.

use crate::models::Node;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// A node with its materialized children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub node: Node,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes in this subtree, including the node itself
    pub fn subtree_size(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TreeNode::subtree_size)
            .sum::<usize>()
    }

    /// Ids in depth-first pre-order
    pub fn ids(&self) -> Vec<String> {
        let mut ids = vec![self.node.id.clone()];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}

/// Which nodes start a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RootFilter {
    /// Nodes without a parent
    #[default]
    TopLevel,
    /// Direct children of the given node (subtree view)
    ChildrenOf(String),
    /// Nodes whose parent is absent or not part of the input
    Detached,
}

impl RootFilter {
    fn is_root(&self, node: &Node, present: &HashSet<&str>) -> bool {
        match self {
            RootFilter::TopLevel => node.parent_id.is_none(),
            RootFilter::ChildrenOf(id) => node.parent_id.as_deref() == Some(id.as_str()),
            RootFilter::Detached => match node.parent_id.as_deref() {
                None => true,
                Some(parent) => !present.contains(parent),
            },
        }
    }
}

/// Outcome of [`build_tree`]
#[derive(Debug, Clone, Default)]
pub struct TreeBuild {
    pub roots: Vec<TreeNode>,
    /// Input nodes that were not placed in any tree
    pub unattached: Vec<Node>,
}

impl TreeBuild {
    /// Total number of nodes placed in `roots`
    pub fn placed_count(&self) -> usize {
        self.roots.iter().map(TreeNode::subtree_size).sum()
    }
}

/// A node with one level of children and its direct child count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShallowNode {
    pub node: Node,
    pub children: Vec<Node>,
    pub children_count: usize,
}

/// Sibling ordering: `sort_order` ascending, then `id`
pub fn sibling_order(a: &Node, b: &Node) -> Ordering {
    a.sort_order
        .cmp(&b.sort_order)
        .then_with(|| a.id.cmp(&b.id))
}

/// Group nodes by parent id, each group in sibling order
fn group_by_parent(nodes: &[Node]) -> HashMap<&str, Vec<&Node>> {
    let mut groups: HashMap<&str, Vec<&Node>> = HashMap::new();
    for node in nodes {
        if let Some(parent_id) = node.parent_id.as_deref() {
            groups.entry(parent_id).or_default().push(node);
        }
    }
    for children in groups.values_mut() {
        children.sort_by(|a, b| sibling_order(a, b));
    }
    groups
}

/// Build nested trees from a flat node set
///
/// # Arguments
///
/// * `nodes` - Candidate set already fetched by the caller
/// * `root_filter` - Which nodes start a tree
/// * `max_depth` - Deepest level attached; roots are level 1
///
/// # Examples
///
/// ```rust
/// use catalog_tree_core::models::{Node, NodeType};
/// use catalog_tree_core::operations::{build_tree, RootFilter};
///
/// let a = Node::new_with_id("1".into(), NodeType::Department, "A".into(), None).with_sort_order(1);
/// let b = Node::new_with_id("2".into(), NodeType::Collection, "B".into(), Some("1".into())).with_sort_order(2);
/// let c = Node::new_with_id("3".into(), NodeType::Collection, "C".into(), Some("1".into())).with_sort_order(1);
///
/// let build = build_tree(&[a, b, c], &RootFilter::TopLevel, 50);
/// assert_eq!(build.roots[0].ids(), vec!["1", "3", "2"]);
/// ```
pub fn build_tree(nodes: &[Node], root_filter: &RootFilter, max_depth: usize) -> TreeBuild {
    let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let groups = group_by_parent(nodes);
    let mut placed: HashSet<&str> = HashSet::new();

    let mut roots: Vec<&Node> = nodes
        .iter()
        .filter(|n| root_filter.is_root(n, &present))
        .collect();
    roots.sort_by(|a, b| sibling_order(a, b));

    let mut trees = Vec::with_capacity(roots.len());
    if max_depth > 0 {
        for root in roots {
            if let Some(tree) = attach(root, 1, max_depth, &groups, &mut placed) {
                trees.push(tree);
            }
        }
    }

    let mut unattached: Vec<Node> = nodes
        .iter()
        .filter(|n| !placed.contains(n.id.as_str()))
        .cloned()
        .collect();
    unattached.sort_by(sibling_order);

    TreeBuild {
        roots: trees,
        unattached,
    }
}

fn attach<'a>(
    node: &'a Node,
    depth: usize,
    max_depth: usize,
    groups: &HashMap<&str, Vec<&'a Node>>,
    placed: &mut HashSet<&'a str>,
) -> Option<TreeNode> {
    if !placed.insert(node.id.as_str()) {
        return None;
    }

    let mut children = Vec::new();
    if depth < max_depth {
        if let Some(group) = groups.get(node.id.as_str()) {
            for child in group {
                if let Some(tree) = attach(*child, depth + 1, max_depth, groups, placed) {
                    children.push(tree);
                }
            }
        }
    }

    Some(TreeNode {
        node: node.clone(),
        children,
    })
}

/// Build one level of children for every node accepted by `select`
///
/// Children come from the same input set and are ordered like siblings;
/// `children_count` is the number of direct children in the input.
pub fn build_shallow<F>(nodes: &[Node], select: F) -> Vec<ShallowNode>
where
    F: Fn(&Node) -> bool,
{
    let groups = group_by_parent(nodes);
    let mut selected: Vec<&Node> = nodes.iter().filter(|n| select(n)).collect();
    selected.sort_by(|a, b| sibling_order(a, b));

    selected
        .into_iter()
        .map(|node| {
            let children: Vec<Node> = groups
                .get(node.id.as_str())
                .map(|group| group.iter().map(|c| (*c).clone()).collect())
                .unwrap_or_default();
            ShallowNode {
                node: node.clone(),
                children_count: children.len(),
                children,
            }
        })
        .collect()
}

/// Direct child count per parent id
pub fn count_children(nodes: &[Node]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for node in nodes {
        if let Some(parent_id) = &node.parent_id {
            *counts.entry(parent_id.clone()).or_insert(0) += 1;
        }
    }
    counts
}
