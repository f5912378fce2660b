//! Structural validation for parent and reference changes
//!
//! Every mutation that sets a `parent_id` or a `category_ref` runs through
//! these checks against a freshly fetched family node set before anything is
//! written. The ancestor walk is bounded by `max_depth`, so a store that is
//! already corrupted cannot make validation loop.

use crate::models::{Node, NodeFamily};
use crate::operations::error::TreeOperationError;
use std::collections::{HashMap, HashSet};

/// Parent lookup over a node set
struct ParentIndex<'a> {
    parents: HashMap<&'a str, Option<&'a str>>,
}

impl<'a> ParentIndex<'a> {
    fn new(nodes: &'a [Node]) -> Self {
        Self {
            parents: nodes
                .iter()
                .map(|n| (n.id.as_str(), n.parent_id.as_deref()))
                .collect(),
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// Parent of `id`; `None` for roots and for ids outside the set
    fn parent_of(&self, id: &str) -> Option<&'a str> {
        self.parents.get(id).copied().flatten()
    }
}

/// Check that `parent_id` names an existing node of `family`
///
/// `nodes` must hold the family's nodes; a parent outside that set is
/// dangling even if the id exists in the other family.
pub fn validate_parent_reference(
    parent_id: &str,
    family: NodeFamily,
    nodes: &[Node],
) -> Result<(), TreeOperationError> {
    let found = nodes
        .iter()
        .any(|n| n.id == parent_id && n.family == family);
    if found {
        Ok(())
    } else {
        Err(TreeOperationError::dangling("parentId", parent_id, family))
    }
}

/// Check that `category_id` names an existing category node
pub fn validate_category_reference(
    category_id: &str,
    categories: &[Node],
) -> Result<(), TreeOperationError> {
    let found = categories
        .iter()
        .any(|n| n.id == category_id && n.family == NodeFamily::Category);
    if found {
        Ok(())
    } else {
        Err(TreeOperationError::dangling(
            "categoryRef",
            category_id,
            NodeFamily::Category,
        ))
    }
}

/// Depth of `id` counted from its root (roots are depth 1)
///
/// Returns `None` when `id` is not in `nodes` or the walk exceeds `max_depth`
/// (too deep or caught in a cycle).
pub fn depth_of(id: &str, nodes: &[Node], max_depth: usize) -> Option<usize> {
    let index = ParentIndex::new(nodes);
    if !index.contains(id) {
        return None;
    }

    let mut depth = 1;
    let mut current = id;
    while let Some(parent) = index.parent_of(current) {
        depth += 1;
        if depth > max_depth {
            return None;
        }
        current = parent;
    }
    Some(depth)
}

/// Number of levels in the subtree rooted at `id` (a leaf has height 1)
///
/// Nodes already visited are skipped, so corrupted cycles below `id`
/// terminate.
pub fn subtree_height(id: &str, nodes: &[Node]) -> usize {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        if let Some(parent) = node.parent_id.as_deref() {
            children.entry(parent).or_default().push(node.id.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(id);
    let mut level = vec![id];
    let mut height = 0;

    while !level.is_empty() {
        height += 1;
        let mut next = Vec::new();
        for current in level {
            for child in children.get(current).into_iter().flatten() {
                if visited.insert(*child) {
                    next.push(*child);
                }
            }
        }
        level = next;
    }

    height
}

/// Ids of every descendant of `id`, deepest levels first
///
/// The order is safe for deletion: a node always comes before its parent.
pub fn descendants_bottom_up(id: &str, nodes: &[Node]) -> Vec<String> {
    let mut children: HashMap<&str, Vec<&Node>> = HashMap::new();
    for node in nodes {
        if let Some(parent) = node.parent_id.as_deref() {
            children.entry(parent).or_default().push(node);
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(id);
    let mut levels: Vec<Vec<&str>> = Vec::new();
    let mut level = vec![id];

    loop {
        let mut next = Vec::new();
        for current in &level {
            for child in children.get(current).into_iter().flatten() {
                if visited.insert(child.id.as_str()) {
                    next.push(child.id.as_str());
                }
            }
        }
        if next.is_empty() {
            break;
        }
        levels.push(next.clone());
        level = next;
    }

    levels
        .into_iter()
        .rev()
        .flatten()
        .map(str::to_string)
        .collect()
}

/// Check that a new child placed under `parent_id` stays within `max_depth`
pub fn validate_new_child(
    parent_id: &str,
    nodes: &[Node],
    max_depth: usize,
) -> Result<(), TreeOperationError> {
    match depth_of(parent_id, nodes, max_depth) {
        Some(parent_depth) if parent_depth < max_depth => Ok(()),
        Some(parent_depth) => Err(TreeOperationError::DepthLimitExceeded {
            node_id: parent_id.to_string(),
            depth: parent_depth + 1,
            max_depth,
        }),
        None => Err(TreeOperationError::DepthLimitExceeded {
            node_id: parent_id.to_string(),
            depth: max_depth + 1,
            max_depth,
        }),
    }
}

/// Check that `node_id` may move under `new_parent_id`
///
/// Walks the ancestor chain of the proposed parent: reaching `node_id` means
/// the move would create a cycle, and a walk longer than `max_depth` is
/// treated the same way. Then checks that the moved subtree still fits under
/// the depth cap.
///
/// # Examples
///
/// ```rust
/// use catalog_tree_core::models::{Node, NodeType};
/// use catalog_tree_core::operations::{validate_reparent, TreeOperationError};
///
/// let a = Node::new_with_id("a".into(), NodeType::PageLink, "A".into(), None);
/// let b = Node::new_with_id("b".into(), NodeType::PageLink, "B".into(), Some("a".into()));
/// let nodes = vec![a, b];
///
/// let err = validate_reparent("a", Some("b"), &nodes, 50).unwrap_err();
/// assert!(matches!(err, TreeOperationError::Cycle { .. }));
/// ```
pub fn validate_reparent(
    node_id: &str,
    new_parent_id: Option<&str>,
    nodes: &[Node],
    max_depth: usize,
) -> Result<(), TreeOperationError> {
    let height = subtree_height(node_id, nodes);

    let Some(parent_id) = new_parent_id else {
        return check_depth(node_id, height, max_depth);
    };

    if parent_id == node_id {
        return Err(TreeOperationError::cycle(node_id, parent_id));
    }

    let index = ParentIndex::new(nodes);
    let mut parent_depth = 1;
    let mut current = parent_id;
    loop {
        if current == node_id {
            return Err(TreeOperationError::cycle(node_id, parent_id));
        }
        match index.parent_of(current) {
            Some(next) => {
                parent_depth += 1;
                if parent_depth > max_depth {
                    return Err(TreeOperationError::cycle(node_id, parent_id));
                }
                current = next;
            }
            None => break,
        }
    }

    check_depth(node_id, parent_depth + height, max_depth)
}

fn check_depth(node_id: &str, depth: usize, max_depth: usize) -> Result<(), TreeOperationError> {
    if depth > max_depth {
        Err(TreeOperationError::DepthLimitExceeded {
            node_id: node_id.to_string(),
            depth,
            max_depth,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;

    fn nav(id: &str, parent: Option<&str>) -> Node {
        Node::new_with_id(
            id.to_string(),
            NodeType::PageLink,
            id.to_uppercase(),
            parent.map(str::to_string),
        )
    }

    /// a -> b -> c -> d, plus a separate root x
    fn chain() -> Vec<Node> {
        vec![
            nav("a", None),
            nav("b", Some("a")),
            nav("c", Some("b")),
            nav("d", Some("c")),
            nav("x", None),
        ]
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let err = validate_reparent("b", Some("b"), &chain(), 50).unwrap_err();
        assert_eq!(err, TreeOperationError::cycle("b", "b"));
    }

    #[test]
    fn moving_under_a_descendant_is_a_cycle() {
        let err = validate_reparent("a", Some("d"), &chain(), 50).unwrap_err();
        assert!(matches!(err, TreeOperationError::Cycle { .. }));
    }

    #[test]
    fn moving_to_an_unrelated_branch_is_allowed() {
        assert!(validate_reparent("c", Some("x"), &chain(), 50).is_ok());
        assert!(validate_reparent("c", None, &chain(), 50).is_ok());
    }

    #[test]
    fn reparent_checks_subtree_height_against_cap() {
        // x is depth 1; b's subtree (b, c, d) has height 3
        assert!(validate_reparent("b", Some("x"), &chain(), 4).is_ok());

        let err = validate_reparent("b", Some("x"), &chain(), 3).unwrap_err();
        assert_eq!(
            err,
            TreeOperationError::DepthLimitExceeded {
                node_id: "b".to_string(),
                depth: 4,
                max_depth: 3,
            }
        );
    }

    #[test]
    fn corrupted_ancestor_loop_is_reported_as_cycle() {
        let nodes = vec![nav("p", Some("q")), nav("q", Some("p")), nav("n", None)];
        let err = validate_reparent("n", Some("p"), &nodes, 10).unwrap_err();
        assert!(matches!(err, TreeOperationError::Cycle { .. }));
    }

    #[test]
    fn depth_of_counts_from_root() {
        let nodes = chain();
        assert_eq!(depth_of("a", &nodes, 50), Some(1));
        assert_eq!(depth_of("d", &nodes, 50), Some(4));
        assert_eq!(depth_of("d", &nodes, 3), None);
        assert_eq!(depth_of("missing", &nodes, 50), None);
    }

    #[test]
    fn new_child_respects_cap() {
        let nodes = chain();
        assert!(validate_new_child("c", &nodes, 4).is_ok());
        assert!(matches!(
            validate_new_child("d", &nodes, 4),
            Err(TreeOperationError::DepthLimitExceeded { depth: 5, .. })
        ));
    }

    #[test]
    fn parent_reference_must_be_in_family() {
        let nodes = chain();
        assert!(validate_parent_reference("a", NodeFamily::Navigation, &nodes).is_ok());
        assert!(matches!(
            validate_parent_reference("a", NodeFamily::Category, &nodes),
            Err(TreeOperationError::DanglingReference { .. })
        ));
        assert!(validate_parent_reference("zzz", NodeFamily::Navigation, &nodes).is_err());
    }

    #[test]
    fn category_reference_must_point_at_category() {
        let shoes = Node::new_with_id(
            "shoes".to_string(),
            NodeType::Department,
            "Shoes".to_string(),
            None,
        );
        let categories = vec![shoes];
        assert!(validate_category_reference("shoes", &categories).is_ok());
        assert!(validate_category_reference("hats", &categories).is_err());
        assert!(validate_category_reference("a", &chain()).is_err());
    }

    #[test]
    fn descendants_come_before_their_parents() {
        let nodes = chain();
        assert_eq!(descendants_bottom_up("a", &nodes), vec!["d", "c", "b"]);
        assert!(descendants_bottom_up("x", &nodes).is_empty());
        assert_eq!(subtree_height("a", &nodes), 4);
        assert_eq!(subtree_height("x", &nodes), 1);
    }
}
