//! Tree Service - Mutation Engine and Caller Operations
//!
//! `TreeService` is the single entry point for one tree family. It owns the
//! rules every write must follow:
//!
//! - **Validation first**: field checks, then structural checks (parent in
//!   family, no cycle, depth cap, category reference) against freshly read
//!   nodes, before anything is written
//! - **Sort order**: appended after the last sibling unless the caller picks
//!   a value; values are never renumbered
//! - **Atomic batches**: reorders and multi-node deletes go through one
//!   `run_transaction` call
//! - **Delete policies**: block, cascade (navigation) or orphan (categories),
//!   plus the configured handling of navigation items pointing at a deleted
//!   category
//!
//! The service holds no node state between calls; every operation reads what
//! it needs from the store.
//!
//! # Examples
//!
//! ```rust
//! use catalog_tree_core::config::TreeConfig;
//! use catalog_tree_core::db::InMemoryStore;
//! use catalog_tree_core::models::{NewNode, NodeType};
//! use catalog_tree_core::services::{TreeService, Visibility};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let categories = TreeService::categories(store, TreeConfig::default())?;
//!
//! let shoes = categories.create(NewNode::new(NodeType::Department, "Shoes")).await?;
//! categories
//!     .create(NewNode::new(NodeType::Collection, "Sneakers").with_parent(shoes.id.clone()))
//!     .await?;
//!
//! let tree = categories.get_tree(Visibility::All).await?;
//! assert_eq!(tree[0].children[0].name, "Sneakers");
//! # Ok(())
//! # }
//! ```

use crate::config::{CategoryRefPolicy, OrphanStrategy, TreeConfig};
use crate::db::{GuardViolation, NodeStore, StoreWrite, WriteGuard};
use crate::models::{
    DeletePolicy, NewNode, Node, NodeFamily, NodeFilter, NodeType, NodeUpdate, ParentFilter,
    ReorderItem, ValidationError,
};
use crate::operations::{
    build_shallow, build_tree, count_children, descendants_bottom_up, validate_category_reference,
    validate_new_child, validate_parent_reference, validate_reparent, RootFilter, TreeNode,
};
use crate::services::error::TreeServiceError;
use crate::services::formatter::{format_node, format_shallow, format_tree, FormatContext, NodeView};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Which nodes a tree read includes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    /// Storefront-facing: inactive nodes (and everything under them) are hidden
    #[default]
    ActiveOnly,
    /// Administrative: every node
    All,
}

impl Visibility {
    fn active_only(self) -> bool {
        self == Visibility::ActiveOnly
    }
}

/// Filter for [`TreeService::list_items`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    /// Restrict to roots or to the children of one node
    #[serde(default)]
    pub parent: Option<ParentFilter>,
    #[serde(default, rename = "type")]
    pub node_type: Option<NodeType>,
    #[serde(default)]
    pub active_only: bool,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots() -> Self {
        Self {
            parent: Some(ParentFilter::Root),
            ..Default::default()
        }
    }

    pub fn children_of(parent_id: impl Into<String>) -> Self {
        Self {
            parent: Some(ParentFilter::Of(parent_id.into())),
            ..Default::default()
        }
    }

    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    fn selects(&self, node: &Node) -> bool {
        let filter = NodeFilter {
            parent: self.parent.clone(),
            node_type: self.node_type,
            ..Default::default()
        };
        filter.matches(node)
    }
}

/// What a delete did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Removed node ids, children before parents
    pub deleted_ids: Vec<String>,
    /// Children moved to a new parent, as seen when the delete was planned
    pub reparented_ids: Vec<String>,
    /// Products moved off the deleted category
    pub relinked_products: u64,
    /// Navigation items whose category reference was cleared
    pub cleared_references: Vec<String>,
}

/// Tree operations for one node family
#[derive(Clone)]
pub struct TreeService {
    store: Arc<dyn NodeStore>,
    family: NodeFamily,
    config: Arc<TreeConfig>,
}

impl TreeService {
    /// Create a service for `family`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(
        store: Arc<dyn NodeStore>,
        family: NodeFamily,
        config: TreeConfig,
    ) -> Result<Self, TreeServiceError> {
        config.validate()?;
        Ok(Self {
            store,
            family,
            config: Arc::new(config),
        })
    }

    /// Service for the product category tree
    pub fn categories(
        store: Arc<dyn NodeStore>,
        config: TreeConfig,
    ) -> Result<Self, TreeServiceError> {
        Self::new(store, NodeFamily::Category, config)
    }

    /// Service for the navigation (menu) tree
    pub fn navigation(
        store: Arc<dyn NodeStore>,
        config: TreeConfig,
    ) -> Result<Self, TreeServiceError> {
        Self::new(store, NodeFamily::Navigation, config)
    }

    pub fn family(&self) -> NodeFamily {
        self.family
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    //
    // READS
    //

    /// List nodes with one level of children each
    ///
    /// With `active_only`, nodes under an inactive ancestor are left out, the
    /// same as in [`TreeService::get_tree`].
    pub async fn list_items(&self, filter: ListFilter) -> Result<Vec<NodeView>, TreeServiceError> {
        let visibility = if filter.active_only {
            Visibility::ActiveOnly
        } else {
            Visibility::All
        };
        let nodes = self.visible_nodes(visibility).await?;
        let items = build_shallow(&nodes, |node| filter.selects(node));
        let context = self.format_context(&nodes).await?;

        tracing::debug!(
            "Listed {} {} node(s) with filter {:?}",
            items.len(),
            self.family,
            filter
        );
        Ok(format_shallow(&items, &context))
    }

    /// Full nested tree of the family
    pub async fn get_tree(&self, visibility: Visibility) -> Result<Vec<NodeView>, TreeServiceError> {
        let nodes = self.family_nodes(visibility.active_only()).await?;
        let build = build_tree(&nodes, &RootFilter::TopLevel, self.config.max_depth);

        if !build.unattached.is_empty() {
            tracing::debug!(
                "{} {} node(s) not reachable from a root",
                build.unattached.len(),
                self.family
            );
        }

        let context = self.format_context(&nodes).await?;
        Ok(format_tree(&build.roots, &context))
    }

    /// Nested tree below one node, the node itself at the top
    ///
    /// Under `ActiveOnly` the node must be visible in [`TreeService::get_tree`]:
    /// it and every ancestor up to a root are active.
    pub async fn get_subtree(
        &self,
        id: &str,
        visibility: Visibility,
    ) -> Result<NodeView, TreeServiceError> {
        let nodes = self.visible_nodes(visibility).await?;
        let node = nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| TreeServiceError::not_found(id))?;

        let build = build_tree(
            &nodes,
            &RootFilter::ChildrenOf(id.to_string()),
            self.config.max_depth.saturating_sub(1),
        );
        let context = self.format_context(&nodes).await?;

        let mut view = format_node(&node, &context);
        view.children = format_tree(&build.roots, &context);
        view.children_count = view.children.len();
        Ok(view)
    }

    /// Trees whose top node points at a parent missing from the family
    ///
    /// Empty for a store only ever written through this service; anything
    /// listed here was written around it and is invisible to
    /// [`TreeService::get_tree`].
    pub async fn get_detached(&self) -> Result<Vec<NodeView>, TreeServiceError> {
        let nodes = self.family_nodes(false).await?;
        let build = build_tree(&nodes, &RootFilter::Detached, self.config.max_depth);
        let detached: Vec<TreeNode> = build
            .roots
            .into_iter()
            .filter(|root| root.node.parent_id.is_some())
            .collect();

        if !detached.is_empty() {
            tracing::warn!(
                "{} detached {} tree(s) found",
                detached.len(),
                self.family
            );
        }

        let context = self.format_context(&nodes).await?;
        Ok(format_tree(&detached, &context))
    }

    /// One node with its direct children
    pub async fn get_by_id(&self, id: &str) -> Result<NodeView, TreeServiceError> {
        self.require_node(id).await?;

        let nodes = self.family_nodes(false).await?;
        let items = build_shallow(&nodes, |n| n.id == id);
        let context = self.format_context(&nodes).await?;

        format_shallow(&items, &context)
            .into_iter()
            .next()
            .ok_or_else(|| TreeServiceError::not_found(id))
    }

    //
    // WRITES
    //

    /// Create a node
    ///
    /// # Errors
    ///
    /// - `Validation` for blank names, a type from the other family, a
    ///   category reference on a category, or an id already in use
    /// - `DanglingReference` for a parent or category that doesn't exist
    /// - `Cycle` when a caller-supplied id names itself as parent
    /// - `DepthLimitExceeded` when the parent is already at the depth cap
    pub async fn create(&self, input: NewNode) -> Result<Node, TreeServiceError> {
        self.check_type(input.node_type)?;

        let id = match input.id {
            Some(id) if id.trim().is_empty() => {
                return Err(ValidationError::InvalidId("id cannot be blank".to_string()).into())
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let mut node = Node::new_with_id(id, input.node_type, input.name, input.parent_id);
        node.is_active = input.is_active.unwrap_or(true);
        node.category_ref = input.category_ref;
        node.url = input.url;
        node.validate()?;

        if self.get_node(&node.id).await?.is_some() {
            return Err(ValidationError::DuplicateId(node.id).into());
        }

        if let Some(parent_id) = node.parent_id.as_deref() {
            if parent_id == node.id {
                return Err(TreeServiceError::Cycle {
                    node_id: node.id.clone(),
                    parent_id: parent_id.to_string(),
                });
            }
            let nodes = self.family_nodes(false).await?;
            validate_parent_reference(parent_id, self.family, &nodes)?;
            validate_new_child(parent_id, &nodes, self.config.max_depth)?;
        }

        if let Some(category_ref) = node.category_ref.as_deref() {
            self.check_category_ref(category_ref).await?;
        }

        node.sort_order = match input.sort_order {
            Some(sort_order) => sort_order,
            None => self.next_sort_order(node.parent_id.as_deref()).await?,
        };

        let created = self
            .store
            .create_node(node)
            .await
            .map_err(|e| TreeServiceError::store("create_node", e))?;

        tracing::info!(
            "Created {} node {} ({}) under {:?} at sort order {}",
            self.family,
            created.id,
            created.node_type,
            created.parent_id,
            created.sort_order
        );
        Ok(created)
    }

    /// Apply a partial update
    ///
    /// Only provided fields change. Moving a node runs the cycle and depth
    /// checks; `sort_order` is left alone unless provided.
    pub async fn update(&self, id: &str, update: NodeUpdate) -> Result<Node, TreeServiceError> {
        let existing = self.require_node(id).await?;
        if update.is_empty() {
            return Ok(existing);
        }

        if let Some(node_type) = update.node_type {
            self.check_type(node_type)?;
        }

        let mut candidate = existing.clone();
        candidate.apply_update(&update, existing.updated_at);
        candidate.validate()?;

        if let Some(new_parent) = &update.parent_id {
            if *new_parent != existing.parent_id {
                let nodes = self.family_nodes(false).await?;
                if let Some(parent_id) = new_parent.as_deref() {
                    if parent_id != id {
                        validate_parent_reference(parent_id, self.family, &nodes)?;
                    }
                }
                validate_reparent(id, new_parent.as_deref(), &nodes, self.config.max_depth)?;
            }
        }

        if let Some(Some(category_ref)) = &update.category_ref {
            self.check_category_ref(category_ref).await?;
        }

        let updated = self
            .store
            .update_node(id, update)
            .await
            .map_err(|e| TreeServiceError::store("update_node", e))?;

        tracing::info!("Updated {} node {}", self.family, id);
        Ok(updated)
    }

    /// Set the sort order of several nodes in one transaction
    ///
    /// Parents are not touched. Either every pair is applied or none is.
    ///
    /// # Errors
    ///
    /// - `InvalidReorder` if an id appears twice
    /// - `NotFound` if any id is not a node of this family (nothing written)
    /// - `Transaction` if the store aborts the batch
    pub async fn reorder(&self, items: Vec<ReorderItem>) -> Result<(), TreeServiceError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.id.as_str()) {
                return Err(TreeServiceError::invalid_reorder(format!(
                    "id '{}' appears more than once",
                    item.id
                )));
            }
        }

        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let found: HashSet<String> = self
            .store
            .query_nodes(NodeFilter::for_family(self.family).with_ids(ids))
            .await
            .map_err(|e| TreeServiceError::store("query_nodes", e))?
            .into_iter()
            .map(|node| node.id)
            .collect();

        if let Some(missing) = items.iter().find(|item| !found.contains(&item.id)) {
            return Err(TreeServiceError::not_found(missing.id.clone()));
        }

        let count = items.len();
        let writes = items
            .into_iter()
            .map(|item| StoreWrite::update(item.id, NodeUpdate::new().with_sort_order(item.sort_order)))
            .collect();

        self.store
            .run_transaction(writes)
            .await
            .map_err(TreeServiceError::transaction)?;

        tracing::info!("Reordered {} {} node(s)", count, self.family);
        Ok(())
    }

    /// Delete a node under the given policy
    ///
    /// The delete is planned from a fresh read, then applied as one batch.
    /// Child handling, product relinking and category reference clearing are
    /// set-based writes, and every deleted node is guarded to have no
    /// children when the batch runs, so rows added after planning are either
    /// covered or abort the batch. Nothing is retried: a cascade whose subtree
    /// gained a node fails with `Transaction` and can be issued again.
    ///
    /// # Errors
    ///
    /// - `UnsupportedPolicy` if the family does not allow `policy`
    /// - `NotFound` if the node does not exist
    /// - `HasChildren` / `HasProducts` when `Block` finds dependents
    /// - `ReferencedByNavigation` when deleting a referenced category under
    ///   [`CategoryRefPolicy::Refuse`]
    /// - `Transaction` if the store aborts the batch or the cascaded subtree
    ///   changed after planning
    pub async fn delete(
        &self,
        id: &str,
        policy: DeletePolicy,
    ) -> Result<DeleteOutcome, TreeServiceError> {
        if !policy.is_supported_for(self.family) {
            return Err(TreeServiceError::UnsupportedPolicy {
                policy,
                family: self.family,
            });
        }

        let (writes, outcome) = self.plan_delete(id, policy).await?;

        if let Err(err) = self.store.run_transaction(writes).await {
            let violation = err.downcast_ref::<GuardViolation>().cloned();
            return Err(match violation {
                // a cascade whose subtree changed is a failed batch
                Some(violation) if policy != DeletePolicy::CascadeChildren => {
                    guard_error(violation)
                }
                _ => TreeServiceError::transaction(err),
            });
        }

        tracing::info!(
            "Deleted {} node {} with {:?}: {} removed, {} reparented, {} product(s) relinked, {} reference(s) cleared",
            self.family,
            id,
            policy,
            outcome.deleted_ids.len(),
            outcome.reparented_ids.len(),
            outcome.relinked_products,
            outcome.cleared_references.len()
        );
        Ok(outcome)
    }

    /// Writes for one delete, and the outcome they produce
    ///
    /// `reparented_ids` and `cleared_references` list the rows seen while
    /// planning; the set-based writes also cover rows added since.
    async fn plan_delete(
        &self,
        id: &str,
        policy: DeletePolicy,
    ) -> Result<(Vec<StoreWrite>, DeleteOutcome), TreeServiceError> {
        let node = self.require_node(id).await?;
        let nodes = self.family_nodes(false).await?;
        let children: Vec<&Node> = nodes
            .iter()
            .filter(|n| n.parent_id.as_deref() == Some(id))
            .collect();

        let mut outcome = DeleteOutcome::default();
        let mut writes = Vec::new();

        let product_count = match self.family {
            NodeFamily::Category => self.product_count(id).await?,
            NodeFamily::Navigation => 0,
        };

        match policy {
            DeletePolicy::Block => {
                if !children.is_empty() {
                    return Err(TreeServiceError::HasChildren {
                        id: id.to_string(),
                        children: children.len(),
                    });
                }
                if product_count > 0 {
                    return Err(TreeServiceError::HasProducts {
                        id: id.to_string(),
                        products: product_count,
                    });
                }
                if self.family == NodeFamily::Category {
                    writes.push(StoreWrite::Guard(WriteGuard::NoProducts {
                        category_id: id.to_string(),
                    }));
                }
            }
            DeletePolicy::CascadeChildren => {
                outcome.deleted_ids = descendants_bottom_up(id, &nodes);
            }
            DeletePolicy::OrphanChildren => {
                let new_parent = match self.config.orphan_strategy {
                    OrphanStrategy::PromoteToParent => node.parent_id.clone(),
                    OrphanStrategy::FlattenToRoot => None,
                };
                writes.push(StoreWrite::ReparentChildren {
                    from_parent: id.to_string(),
                    to_parent: new_parent,
                });
                outcome.reparented_ids = children.iter().map(|c| c.id.clone()).collect();

                if self.family == NodeFamily::Category {
                    match self.uncategorized_target(id, &nodes) {
                        Ok(target) => {
                            writes.push(StoreWrite::RelinkProducts {
                                from_category: id.to_string(),
                                to_category: target,
                            });
                            outcome.relinked_products = product_count;
                        }
                        Err(err) if product_count > 0 => return Err(err),
                        Err(_) => writes.push(StoreWrite::Guard(WriteGuard::NoProducts {
                            category_id: id.to_string(),
                        })),
                    }
                }
            }
        }
        outcome.deleted_ids.push(id.to_string());

        if self.family == NodeFamily::Category {
            for category_id in &outcome.deleted_ids {
                let referencing = self.navigation_references(category_id).await?;
                match self.config.category_ref_policy {
                    CategoryRefPolicy::Refuse => {
                        if !referencing.is_empty() {
                            return Err(TreeServiceError::ReferencedByNavigation {
                                id: category_id.clone(),
                                references: referencing.len(),
                            });
                        }
                        writes.push(StoreWrite::Guard(WriteGuard::NotReferenced {
                            category_id: category_id.clone(),
                        }));
                    }
                    CategoryRefPolicy::Nullify => {
                        writes.push(StoreWrite::ClearCategoryRefs {
                            category_id: category_id.clone(),
                        });
                        outcome.cleared_references.extend(referencing);
                    }
                }
            }
        }

        for deleted in &outcome.deleted_ids {
            writes.push(StoreWrite::no_children(deleted.clone()));
            writes.push(StoreWrite::delete(deleted.clone()));
        }

        Ok((writes, outcome))
    }

    //
    // HELPERS
    //

    async fn get_node(&self, id: &str) -> Result<Option<Node>, TreeServiceError> {
        self.store
            .get_node(id)
            .await
            .map_err(|e| TreeServiceError::store("get_node", e))
    }

    /// Node of this family, or `NotFound`
    async fn require_node(&self, id: &str) -> Result<Node, TreeServiceError> {
        match self.get_node(id).await? {
            Some(node) if node.family == self.family => Ok(node),
            _ => Err(TreeServiceError::not_found(id)),
        }
    }

    async fn family_nodes(&self, active_only: bool) -> Result<Vec<Node>, TreeServiceError> {
        let mut filter = NodeFilter::for_family(self.family);
        if active_only {
            filter = filter.active_only();
        }
        self.store
            .query_nodes(filter)
            .await
            .map_err(|e| TreeServiceError::store("query_nodes", e))
    }

    /// Family nodes a read with `visibility` may show
    async fn visible_nodes(&self, visibility: Visibility) -> Result<Vec<Node>, TreeServiceError> {
        let nodes = self.family_nodes(visibility.active_only()).await?;
        if !visibility.active_only() {
            return Ok(nodes);
        }

        let build = build_tree(&nodes, &RootFilter::TopLevel, self.config.max_depth);
        let hidden = nodes.len() - build.placed_count();
        if hidden > 0 {
            tracing::debug!(
                "{} active {} node(s) hidden by an inactive or missing ancestor",
                hidden,
                self.family
            );
        }

        let reachable: HashSet<String> = build.roots.iter().flat_map(TreeNode::ids).collect();
        Ok(nodes
            .into_iter()
            .filter(|n| reachable.contains(&n.id))
            .collect())
    }

    fn check_type(&self, node_type: NodeType) -> Result<(), TreeServiceError> {
        if node_type.family() != self.family {
            return Err(ValidationError::TypeFamilyMismatch {
                node_type: node_type.as_token().to_string(),
                family: self.family.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn check_category_ref(&self, category_id: &str) -> Result<(), TreeServiceError> {
        let categories: Vec<Node> = self.get_node(category_id).await?.into_iter().collect();
        validate_category_reference(category_id, &categories)?;
        Ok(())
    }

    async fn next_sort_order(&self, parent_id: Option<&str>) -> Result<i64, TreeServiceError> {
        let max = self
            .store
            .max_sort_order(self.family, parent_id)
            .await
            .map_err(|e| TreeServiceError::store("max_sort_order", e))?;
        Ok(max.map_or(0, |max| max.saturating_add(1)))
    }

    async fn product_count(&self, category_id: &str) -> Result<u64, TreeServiceError> {
        let counts = self
            .store
            .product_counts(&[category_id.to_string()])
            .await
            .map_err(|e| TreeServiceError::store("product_counts", e))?;
        Ok(counts.get(category_id).copied().unwrap_or(0))
    }

    /// Category that receives the products of `deleted_id`
    fn uncategorized_target(
        &self,
        deleted_id: &str,
        categories: &[Node],
    ) -> Result<Option<String>, TreeServiceError> {
        match &self.config.uncategorized_category_id {
            None => Ok(None),
            Some(target) if target == deleted_id => Err(TreeServiceError::dangling(
                "uncategorizedCategoryId",
                target.clone(),
                NodeFamily::Category,
            )),
            Some(target) => {
                validate_category_reference(target, categories)?;
                Ok(Some(target.clone()))
            }
        }
    }

    /// Navigation ids whose `category_ref` points at `category_id`
    async fn navigation_references(
        &self,
        category_id: &str,
    ) -> Result<Vec<String>, TreeServiceError> {
        let filter = NodeFilter::for_family(NodeFamily::Navigation).with_category_ref(category_id);
        let navigation = self
            .store
            .query_nodes(filter)
            .await
            .map_err(|e| TreeServiceError::store("query_nodes", e))?;
        Ok(navigation.into_iter().map(|n| n.id).collect())
    }

    async fn format_context(&self, nodes: &[Node]) -> Result<FormatContext, TreeServiceError> {
        let context = FormatContext::new().with_children_counts(count_children(nodes));

        match self.family {
            NodeFamily::Category => {
                let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
                let counts = self
                    .store
                    .product_counts(&ids)
                    .await
                    .map_err(|e| TreeServiceError::store("product_counts", e))?;
                Ok(context.with_product_counts(counts))
            }
            NodeFamily::Navigation => {
                let refs: Vec<String> = nodes
                    .iter()
                    .filter_map(|n| n.category_ref.clone())
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect();
                if refs.is_empty() {
                    return Ok(context);
                }
                let categories = self
                    .store
                    .query_nodes(NodeFilter::for_family(NodeFamily::Category).with_ids(refs))
                    .await
                    .map_err(|e| TreeServiceError::store("query_nodes", e))?;
                Ok(context.with_categories(categories))
            }
        }
    }
}

/// Map a failed batch guard onto the caller-facing error
fn guard_error(violation: GuardViolation) -> TreeServiceError {
    match violation.guard {
        WriteGuard::NoChildren { id } => TreeServiceError::HasChildren {
            id,
            children: violation.found,
        },
        WriteGuard::NoProducts { category_id } => TreeServiceError::HasProducts {
            id: category_id,
            products: violation.found as u64,
        },
        WriteGuard::NotReferenced { category_id } => TreeServiceError::ReferencedByNavigation {
            id: category_id,
            references: violation.found,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    async fn navigation() -> (Arc<InMemoryStore>, TreeService) {
        let store = Arc::new(InMemoryStore::new());
        let service = TreeService::navigation(store.clone(), TreeConfig::default()).unwrap();
        (store, service)
    }

    #[tokio::test]
    async fn sort_order_starts_at_zero_and_appends() {
        let (_store, service) = navigation().await;

        let first = service
            .create(NewNode::new(NodeType::PageLink, "Home"))
            .await
            .unwrap();
        let second = service
            .create(NewNode::new(NodeType::PageLink, "About"))
            .await
            .unwrap();
        let pinned = service
            .create(NewNode::new(NodeType::PageLink, "Contact").with_sort_order(-5))
            .await
            .unwrap();
        let child = service
            .create(NewNode::new(NodeType::PageLink, "Team").with_parent(second.id.clone()))
            .await
            .unwrap();

        assert_eq!(first.sort_order, 0);
        assert_eq!(second.sort_order, 1);
        assert_eq!(pinned.sort_order, -5);
        assert_eq!(child.sort_order, 0);
    }

    #[tokio::test]
    async fn other_family_ids_are_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let categories = TreeService::categories(store.clone(), TreeConfig::default()).unwrap();
        let navigation = TreeService::navigation(store, TreeConfig::default()).unwrap();

        let shoes = categories
            .create(NewNode::new(NodeType::Department, "Shoes"))
            .await
            .unwrap();

        assert!(matches!(
            navigation.get_by_id(&shoes.id).await,
            Err(TreeServiceError::NotFound { .. })
        ));
        assert!(matches!(
            navigation
                .create(NewNode::new(NodeType::PageLink, "x").with_parent(shoes.id.clone()))
                .await,
            Err(TreeServiceError::DanglingReference { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_type_of_other_family() {
        let (_store, service) = navigation().await;
        let err = service
            .create(NewNode::new(NodeType::Brand, "Acme"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TreeServiceError::Validation(ValidationError::TypeFamilyMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_duplicate_and_self_parented_ids() {
        let (_store, service) = navigation().await;
        service
            .create(NewNode::new(NodeType::PageLink, "Home").with_id("home"))
            .await
            .unwrap();

        assert!(matches!(
            service
                .create(NewNode::new(NodeType::PageLink, "Again").with_id("home"))
                .await,
            Err(TreeServiceError::Validation(ValidationError::DuplicateId(_)))
        ));
        assert!(matches!(
            service
                .create(
                    NewNode::new(NodeType::PageLink, "Loop")
                        .with_id("loop")
                        .with_parent("loop")
                )
                .await,
            Err(TreeServiceError::Cycle { .. })
        ));
    }

    #[tokio::test]
    async fn empty_update_returns_current_node() {
        let (_store, service) = navigation().await;
        let node = service
            .create(NewNode::new(NodeType::PageLink, "Home"))
            .await
            .unwrap();
        let same = service.update(&node.id, NodeUpdate::new()).await.unwrap();
        assert_eq!(same, node);
    }

    #[tokio::test]
    async fn empty_reorder_is_a_no_op() {
        let (store, service) = navigation().await;
        tokio_test::assert_ok!(service.reorder(Vec::new()).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn duplicate_reorder_ids_are_rejected() {
        let (_store, service) = navigation().await;
        let node = service
            .create(NewNode::new(NodeType::PageLink, "Home"))
            .await
            .unwrap();

        let err = service
            .reorder(vec![
                ReorderItem::new(node.id.clone(), 1),
                ReorderItem::new(node.id.clone(), 2),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, TreeServiceError::InvalidReorder(_)));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let config = TreeConfig {
            max_depth: 0,
            ..Default::default()
        };
        assert!(matches!(
            TreeService::categories(store, config),
            Err(TreeServiceError::InvalidConfig(_))
        ));
    }
}
