//! InMemoryStore - NodeStore Implementation Backed by a HashMap
//!
//! Used by tests and by callers embedding the engine without a database.
//! Transactions stage every write on a copy of the tables and swap the copy
//! in only when the whole batch succeeded, so a failed batch leaves no trace.

use crate::db::node_store::{GuardViolation, NodeStore, StoreWrite, WriteGuard};
use crate::models::{DeleteResult, Node, NodeFamily, NodeFilter, NodeUpdate};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default, Clone)]
struct Tables {
    nodes: HashMap<String, Node>,
    /// product id → category id
    products: HashMap<String, Option<String>>,
}

/// In-memory node store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,

    /// When non-zero, the next transaction fails after this many writes
    fail_after: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with nodes as-is (timestamps are kept)
    pub async fn with_nodes(nodes: Vec<Node>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write().await;
            for node in nodes {
                tables.nodes.insert(node.id.clone(), node);
            }
        }
        store
    }

    /// Link a product to a category (`None` = uncategorized)
    pub async fn link_product(&self, product_id: impl Into<String>, category_id: Option<String>) {
        self.tables
            .write()
            .await
            .products
            .insert(product_id.into(), category_id);
    }

    /// Category currently linked to a product
    pub async fn product_category(&self, product_id: &str) -> Option<Option<String>> {
        self.tables.read().await.products.get(product_id).cloned()
    }

    /// Make the next transaction fail after `writes` writes have been staged
    ///
    /// Test hook for forcing a failure in the middle of a batch.
    pub fn fail_transaction_after(&self, writes: usize) {
        self.fail_after.store(writes.max(1), Ordering::SeqCst);
    }

    /// Number of stored nodes
    pub async fn len(&self) -> usize {
        self.tables.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn apply_write(tables: &mut Tables, write: &StoreWrite) -> Result<()> {
        let now = Utc::now();
        match write {
            StoreWrite::UpdateNode { id, update } => {
                let node = tables
                    .nodes
                    .get_mut(id)
                    .ok_or_else(|| anyhow!("Node not found in transaction: {}", id))?;
                node.apply_update(update, now);
            }
            StoreWrite::DeleteNode { id } => {
                tables.nodes.remove(id);
            }
            StoreWrite::RelinkProducts {
                from_category,
                to_category,
            } => {
                for category in tables.products.values_mut() {
                    if category.as_deref() == Some(from_category.as_str()) {
                        *category = to_category.clone();
                    }
                }
            }
            StoreWrite::ReparentChildren {
                from_parent,
                to_parent,
            } => {
                let update = NodeUpdate::new().with_parent(to_parent.clone());
                for node in tables.nodes.values_mut() {
                    if node.parent_id.as_deref() == Some(from_parent.as_str()) {
                        node.apply_update(&update, now);
                    }
                }
            }
            StoreWrite::ClearCategoryRefs { category_id } => {
                let update = NodeUpdate::new().with_category_ref(None);
                for node in tables.nodes.values_mut() {
                    if node.family == NodeFamily::Navigation
                        && node.category_ref.as_deref() == Some(category_id.as_str())
                    {
                        node.apply_update(&update, now);
                    }
                }
            }
            StoreWrite::Guard(guard) => {
                let found = guard_matches(tables, guard);
                if found > 0 {
                    return Err(GuardViolation {
                        guard: guard.clone(),
                        found,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Rows that break `guard`
fn guard_matches(tables: &Tables, guard: &WriteGuard) -> usize {
    match guard {
        WriteGuard::NoChildren { id } => tables
            .nodes
            .values()
            .filter(|n| n.parent_id.as_deref() == Some(id.as_str()))
            .count(),
        WriteGuard::NoProducts { category_id } => tables
            .products
            .values()
            .filter(|c| c.as_deref() == Some(category_id.as_str()))
            .count(),
        WriteGuard::NotReferenced { category_id } => tables
            .nodes
            .values()
            .filter(|n| {
                n.family == NodeFamily::Navigation
                    && n.category_ref.as_deref() == Some(category_id.as_str())
            })
            .count(),
    }
}

fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl NodeStore for InMemoryStore {
    async fn create_node(&self, mut node: Node) -> Result<Node> {
        let mut tables = self.tables.write().await;
        if tables.nodes.contains_key(&node.id) {
            return Err(anyhow!("Node already exists: {}", node.id));
        }
        let now = Utc::now();
        node.created_at = now;
        node.updated_at = now;
        tables.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.tables.read().await.nodes.get(id).cloned())
    }

    async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<Node> {
        let mut tables = self.tables.write().await;
        let node = tables
            .nodes
            .get_mut(id)
            .ok_or_else(|| anyhow!("Node not found: {}", id))?;
        node.apply_update(&update, Utc::now());
        Ok(node.clone())
    }

    async fn delete_node(&self, id: &str) -> Result<DeleteResult> {
        let removed = self.tables.write().await.nodes.remove(id);
        Ok(if removed.is_some() {
            DeleteResult::existed()
        } else {
            DeleteResult::not_found()
        })
    }

    async fn query_nodes(&self, filter: NodeFilter) -> Result<Vec<Node>> {
        let tables = self.tables.read().await;
        let mut nodes: Vec<Node> = tables
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        sort_nodes(&mut nodes);
        Ok(nodes)
    }

    async fn max_sort_order(
        &self,
        family: NodeFamily,
        parent_id: Option<&str>,
    ) -> Result<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .nodes
            .values()
            .filter(|n| n.family == family && n.parent_id.as_deref() == parent_id)
            .map(|n| n.sort_order)
            .max())
    }

    async fn product_counts(&self, category_ids: &[String]) -> Result<HashMap<String, u64>> {
        let tables = self.tables.read().await;
        let mut counts = HashMap::new();
        for category in tables.products.values().flatten() {
            if category_ids.contains(category) {
                *counts.entry(category.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn run_transaction(&self, writes: Vec<StoreWrite>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let fail_after = self.fail_after.swap(0, Ordering::SeqCst);

        for (applied, write) in writes.iter().enumerate() {
            if fail_after > 0 && applied == fail_after {
                return Err(anyhow!(
                    "Injected transaction failure after {} writes",
                    applied
                ));
            }
            Self::apply_write(&mut staged, write)?;
        }

        *tables = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;

    #[tokio::test]
    async fn failed_transaction_leaves_tables_untouched() {
        let a = Node::new_with_id("a".into(), NodeType::Brand, "A".into(), None);
        let b = Node::new_with_id("b".into(), NodeType::Brand, "B".into(), None);
        let store = InMemoryStore::with_nodes(vec![a, b]).await;

        let result = store
            .run_transaction(vec![
                StoreWrite::update("a", NodeUpdate::new().with_sort_order(9)),
                StoreWrite::update("missing", NodeUpdate::new().with_sort_order(1)),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(store.get_node("a").await.unwrap().unwrap().sort_order, 0);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let a = Node::new_with_id("a".into(), NodeType::Brand, "A".into(), None);
        let store = InMemoryStore::with_nodes(vec![a]).await;
        store.fail_transaction_after(1);

        let writes = vec![
            StoreWrite::update("a", NodeUpdate::new().with_sort_order(3)),
            StoreWrite::update("a", NodeUpdate::new().with_sort_order(4)),
        ];
        assert!(store.run_transaction(writes.clone()).await.is_err());
        assert_eq!(store.get_node("a").await.unwrap().unwrap().sort_order, 0);

        store.run_transaction(writes).await.unwrap();
        assert_eq!(store.get_node("a").await.unwrap().unwrap().sort_order, 4);
    }

    #[tokio::test]
    async fn relink_products_moves_only_matching_category() {
        let store = InMemoryStore::new();
        store.link_product("p1", Some("c1".into())).await;
        store.link_product("p2", Some("c2".into())).await;

        store
            .run_transaction(vec![StoreWrite::RelinkProducts {
                from_category: "c1".into(),
                to_category: None,
            }])
            .await
            .unwrap();

        assert_eq!(store.product_category("p1").await, Some(None));
        assert_eq!(store.product_category("p2").await, Some(Some("c2".into())));
    }

    #[tokio::test]
    async fn reparent_children_moves_every_current_child() {
        let nodes = vec![
            Node::new_with_id("top".into(), NodeType::Department, "Top".into(), None),
            Node::new_with_id("mid".into(), NodeType::Collection, "Mid".into(), Some("top".into())),
            Node::new_with_id("a".into(), NodeType::Brand, "A".into(), Some("mid".into())),
            Node::new_with_id("b".into(), NodeType::Brand, "B".into(), Some("mid".into())),
        ];
        let store = InMemoryStore::with_nodes(nodes).await;

        store
            .run_transaction(vec![
                StoreWrite::ReparentChildren {
                    from_parent: "mid".into(),
                    to_parent: Some("top".into()),
                },
                StoreWrite::no_children("mid"),
                StoreWrite::delete("mid"),
            ])
            .await
            .unwrap();

        for id in ["a", "b"] {
            let node = store.get_node(id).await.unwrap().unwrap();
            assert_eq!(node.parent_id.as_deref(), Some("top"));
        }
        assert!(store.get_node("mid").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_guard_rolls_back_and_reports_violation() {
        let nodes = vec![
            Node::new_with_id("p".into(), NodeType::PageLink, "P".into(), None),
            Node::new_with_id("c".into(), NodeType::PageLink, "C".into(), Some("p".into())),
        ];
        let store = InMemoryStore::with_nodes(nodes).await;

        let err = store
            .run_transaction(vec![
                StoreWrite::update("c", NodeUpdate::new().with_sort_order(7)),
                StoreWrite::no_children("p"),
                StoreWrite::delete("p"),
            ])
            .await
            .unwrap_err();

        let violation = err.downcast_ref::<GuardViolation>().expect("guard violation");
        assert_eq!(violation.guard, WriteGuard::NoChildren { id: "p".into() });
        assert_eq!(violation.found, 1);
        assert!(store.get_node("p").await.unwrap().is_some());
        assert_eq!(store.get_node("c").await.unwrap().unwrap().sort_order, 0);
    }

    #[tokio::test]
    async fn clear_category_refs_touches_only_matching_navigation() {
        let nodes = vec![
            Node::new_with_id("n1".into(), NodeType::CategoryLink, "N1".into(), None)
                .with_category_ref("shoes"),
            Node::new_with_id("n2".into(), NodeType::CategoryLink, "N2".into(), None)
                .with_category_ref("hats"),
        ];
        let store = InMemoryStore::with_nodes(nodes).await;

        store
            .run_transaction(vec![StoreWrite::ClearCategoryRefs {
                category_id: "shoes".into(),
            }])
            .await
            .unwrap();

        assert_eq!(store.get_node("n1").await.unwrap().unwrap().category_ref, None);
        assert_eq!(
            store.get_node("n2").await.unwrap().unwrap().category_ref.as_deref(),
            Some("hats")
        );
    }

    #[tokio::test]
    async fn max_sort_order_is_scoped_to_family_and_parent() {
        let nodes = vec![
            Node::new_with_id("r1".into(), NodeType::Brand, "R1".into(), None).with_sort_order(4),
            Node::new_with_id("c1".into(), NodeType::Brand, "C1".into(), Some("r1".into()))
                .with_sort_order(10),
            Node::new_with_id("n1".into(), NodeType::PageLink, "N1".into(), None)
                .with_sort_order(99),
        ];
        let store = InMemoryStore::with_nodes(nodes).await;

        assert_eq!(
            store.max_sort_order(NodeFamily::Category, None).await.unwrap(),
            Some(4)
        );
        assert_eq!(
            store
                .max_sort_order(NodeFamily::Category, Some("r1"))
                .await
                .unwrap(),
            Some(10)
        );
        assert_eq!(
            store
                .max_sort_order(NodeFamily::Category, Some("c1"))
                .await
                .unwrap(),
            None
        );
    }
}
