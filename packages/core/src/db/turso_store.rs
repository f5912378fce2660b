//! TursoStore - NodeStore Implementation for the libsql Backend
//!
//! This module implements the `NodeStore` trait over [`DatabaseService`].
//!
//! # Design Principles
//!
//! 1. **No business logic**: Validation and policies live in the tree service
//! 2. **Row Conversion**: Handles libsql::Row → Node conversion in one place
//! 3. **Explicit transactions**: `run_transaction` wraps the batch in
//!    `BEGIN IMMEDIATE` / `COMMIT` and issues `ROLLBACK` on any failure
//!
//! # Examples
//!
//! ```rust,no_run
//! use catalog_tree_core::db::{DatabaseService, NodeStore, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/catalog.db")).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db));
//!     let node = store.get_node("node-123").await?;
//!     Ok(())
//! }
//! ```

use crate::db::node_store::{GuardViolation, NodeStore, StoreWrite, WriteGuard};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::{
    DeleteResult, Node, NodeFamily, NodeFilter, NodeType, NodeUpdate, ParentFilter,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::params::Params;
use libsql::{Row, Value};
use std::collections::HashMap;
use std::sync::Arc;

const NODE_COLUMNS: &str = "id, family, name, parent_id, sort_order, is_active, node_type, \
                            category_ref, url, created_at, updated_at";

/// TursoStore implements NodeStore for the libsql backend
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn nullable_text(value: Option<&str>) -> Value {
    match value {
        Some(v) => text(v),
        None => Value::Null,
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339()
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Underlying database service
    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
    /// Rows written by this store use RFC3339
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        Err(anyhow!(
            "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        ))
    }

    /// Convert libsql::Row to Node
    ///
    /// Expected columns are those of [`NODE_COLUMNS`], in order.
    fn row_to_node(row: &Row) -> Result<Node> {
        let id: String = row.get(0).context("Failed to get id")?;
        let family: String = row.get(1).context("Failed to get family")?;
        let name: String = row.get(2).context("Failed to get name")?;
        let parent_id: Option<String> = row.get(3).context("Failed to get parent_id")?;
        let sort_order: i64 = row.get(4).context("Failed to get sort_order")?;
        let is_active: i64 = row.get(5).context("Failed to get is_active")?;
        let node_type: String = row.get(6).context("Failed to get node_type")?;
        let category_ref: Option<String> = row.get(7).context("Failed to get category_ref")?;
        let url: Option<String> = row.get(8).context("Failed to get url")?;
        let created_at_str: String = row.get(9).context("Failed to get created_at")?;
        let updated_at_str: String = row.get(10).context("Failed to get updated_at")?;

        let family: NodeFamily = family
            .parse()
            .map_err(|e| DatabaseError::invalid_row(&id, format!("{}", e)))?;
        let node_type: NodeType = node_type
            .parse()
            .map_err(|e| DatabaseError::invalid_row(&id, format!("{}", e)))?;

        Ok(Node {
            created_at: Self::parse_timestamp(&created_at_str)
                .context("Failed to parse created_at")?,
            updated_at: Self::parse_timestamp(&updated_at_str)
                .context("Failed to parse updated_at")?,
            id,
            family,
            name,
            parent_id,
            sort_order,
            is_active: is_active != 0,
            node_type,
            category_ref,
            url,
        })
    }

    async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await.context("Failed to read row")? {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }

    /// Build the `UPDATE` statement for a sparse update
    ///
    /// `updated_at` is always stamped, even for an otherwise empty update.
    fn update_statement(id: &str, update: &NodeUpdate) -> (String, Vec<Value>) {
        let mut assignments = Vec::new();
        let mut values = Vec::new();

        if let Some(name) = &update.name {
            assignments.push("name = ?");
            values.push(text(name));
        }
        if let Some(parent_id) = &update.parent_id {
            assignments.push("parent_id = ?");
            values.push(nullable_text(parent_id.as_deref()));
        }
        if let Some(sort_order) = update.sort_order {
            assignments.push("sort_order = ?");
            values.push(Value::Integer(sort_order));
        }
        if let Some(is_active) = update.is_active {
            assignments.push("is_active = ?");
            values.push(Value::Integer(i64::from(is_active)));
        }
        if let Some(node_type) = update.node_type {
            assignments.push("node_type = ?");
            values.push(text(node_type.as_stored()));
        }
        if let Some(category_ref) = &update.category_ref {
            assignments.push("category_ref = ?");
            values.push(nullable_text(category_ref.as_deref()));
        }
        if let Some(url) = &update.url {
            assignments.push("url = ?");
            values.push(nullable_text(url.as_deref()));
        }
        assignments.push("updated_at = ?");
        values.push(text(&timestamp_now()));
        values.push(text(id));

        (
            format!(
                "UPDATE tree_nodes SET {} WHERE id = ?",
                assignments.join(", ")
            ),
            values,
        )
    }

    /// Rows that break `guard`, counted inside the open transaction
    async fn guard_matches(conn: &libsql::Connection, guard: &WriteGuard) -> Result<usize> {
        let mut rows = match guard {
            WriteGuard::NoChildren { id } => {
                conn.query(
                    "SELECT COUNT(*) FROM tree_nodes WHERE parent_id = ?",
                    [id.as_str()],
                )
                .await
            }
            WriteGuard::NoProducts { category_id } => {
                conn.query(
                    "SELECT COUNT(*) FROM products WHERE category_id = ?",
                    [category_id.as_str()],
                )
                .await
            }
            WriteGuard::NotReferenced { category_id } => {
                conn.query(
                    "SELECT COUNT(*) FROM tree_nodes WHERE family = ? AND category_ref = ?",
                    (NodeFamily::Navigation.as_str(), category_id.as_str()),
                )
                .await
            }
        }
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to check {:?}: {}", guard, e)))?;

        match rows.next().await.context("Failed to read row")? {
            Some(row) => {
                let count: i64 = row.get(0).context("Failed to get count")?;
                Ok(count.max(0) as usize)
            }
            None => Ok(0),
        }
    }

    async fn apply_write(conn: &libsql::Connection, write: &StoreWrite) -> Result<()> {
        match write {
            StoreWrite::UpdateNode { id, update } => {
                let (sql, values) = Self::update_statement(id, update);
                let affected = conn
                    .execute(&sql, Params::Positional(values))
                    .await
                    .with_context(|| format!("Failed to update node {}", id))?;
                if affected == 0 {
                    return Err(anyhow!("Node not found in transaction: {}", id));
                }
            }
            StoreWrite::DeleteNode { id } => {
                conn.execute("DELETE FROM tree_nodes WHERE id = ?", [id.as_str()])
                    .await
                    .with_context(|| format!("Failed to delete node {}", id))?;
            }
            StoreWrite::RelinkProducts {
                from_category,
                to_category,
            } => {
                conn.execute(
                    "UPDATE products SET category_id = ? WHERE category_id = ?",
                    (to_category.as_deref(), from_category.as_str()),
                )
                .await
                .with_context(|| format!("Failed to relink products of {}", from_category))?;
            }
            StoreWrite::ReparentChildren {
                from_parent,
                to_parent,
            } => {
                conn.execute(
                    "UPDATE tree_nodes SET parent_id = ?, updated_at = ? WHERE parent_id = ?",
                    (
                        to_parent.as_deref(),
                        timestamp_now(),
                        from_parent.as_str(),
                    ),
                )
                .await
                .with_context(|| format!("Failed to reparent children of {}", from_parent))?;
            }
            StoreWrite::ClearCategoryRefs { category_id } => {
                conn.execute(
                    "UPDATE tree_nodes SET category_ref = NULL, updated_at = ?
                     WHERE family = ? AND category_ref = ?",
                    (
                        timestamp_now(),
                        NodeFamily::Navigation.as_str(),
                        category_id.as_str(),
                    ),
                )
                .await
                .with_context(|| format!("Failed to clear references to {}", category_id))?;
            }
            StoreWrite::Guard(guard) => {
                let found = Self::guard_matches(conn, guard).await?;
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

#[async_trait]
impl NodeStore for TursoStore {
    async fn create_node(&self, node: Node) -> Result<Node> {
        let conn = self.db.connect_with_timeout().await?;
        let now = timestamp_now();

        conn.execute(
            &format!(
                "INSERT INTO tree_nodes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                NODE_COLUMNS
            ),
            Params::Positional(vec![
                text(&node.id),
                text(node.family.as_str()),
                text(&node.name),
                nullable_text(node.parent_id.as_deref()),
                Value::Integer(node.sort_order),
                Value::Integer(i64::from(node.is_active)),
                text(node.node_type.as_stored()),
                nullable_text(node.category_ref.as_deref()),
                nullable_text(node.url.as_deref()),
                text(&now),
                text(&now),
            ]),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node: {}", e)))?;

        self.get_node(&node.id)
            .await?
            .ok_or_else(|| anyhow!("Node not found after creation: {}", node.id))
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {} FROM tree_nodes WHERE id = ?", NODE_COLUMNS),
                [id],
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to get node: {}", e)))?;

        match rows.next().await.context("Failed to read row")? {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<Node> {
        let conn = self.db.connect_with_timeout().await?;
        let (sql, values) = Self::update_statement(id, &update);
        let affected = conn
            .execute(&sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to update node: {}", e)))?;

        if affected == 0 {
            return Err(anyhow!("Node not found: {}", id));
        }

        self.get_node(id)
            .await?
            .ok_or_else(|| anyhow!("Node not found after update: {}", id))
    }

    async fn delete_node(&self, id: &str) -> Result<DeleteResult> {
        let conn = self.db.connect_with_timeout().await?;
        let affected = conn
            .execute("DELETE FROM tree_nodes WHERE id = ?", [id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete node: {}", e)))?;

        Ok(if affected > 0 {
            DeleteResult::existed()
        } else {
            DeleteResult::not_found()
        })
    }

    async fn query_nodes(&self, filter: NodeFilter) -> Result<Vec<Node>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(family) = filter.family {
            clauses.push("family = ?".to_string());
            values.push(text(family.as_str()));
        }
        match &filter.parent {
            Some(ParentFilter::Root) => clauses.push("parent_id IS NULL".to_string()),
            Some(ParentFilter::Of(parent_id)) => {
                clauses.push("parent_id = ?".to_string());
                values.push(text(parent_id));
            }
            None => {}
        }
        if filter.active_only {
            clauses.push("is_active = 1".to_string());
        }
        if let Some(node_type) = filter.node_type {
            clauses.push("node_type = ?".to_string());
            values.push(text(node_type.as_stored()));
        }
        if let Some(ids) = &filter.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            clauses.push(format!("id IN ({})", placeholders));
            values.extend(ids.iter().map(|id| text(id)));
        }
        if let Some(category_ref) = &filter.category_ref {
            clauses.push("category_ref = ?".to_string());
            values.push(text(category_ref));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM tree_nodes{} ORDER BY sort_order ASC, id ASC",
            NODE_COLUMNS, where_clause
        );

        let conn = self.db.connect_with_timeout().await?;
        let rows = conn
            .query(&sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query nodes: {}", e)))?;

        Self::collect_nodes(rows).await
    }

    async fn max_sort_order(
        &self,
        family: NodeFamily,
        parent_id: Option<&str>,
    ) -> Result<Option<i64>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = match parent_id {
            Some(parent_id) => {
                conn.query(
                    "SELECT MAX(sort_order) FROM tree_nodes WHERE family = ? AND parent_id = ?",
                    (family.as_str(), parent_id),
                )
                .await
            }
            None => {
                conn.query(
                    "SELECT MAX(sort_order) FROM tree_nodes WHERE family = ? AND parent_id IS NULL",
                    [family.as_str()],
                )
                .await
            }
        }
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to query max sort order: {}", e)))?;

        match rows.next().await.context("Failed to read row")? {
            Some(row) => {
                let max: Option<i64> = row.get(0).context("Failed to get max sort order")?;
                Ok(max)
            }
            None => Ok(None),
        }
    }

    async fn product_counts(&self, category_ids: &[String]) -> Result<HashMap<String, u64>> {
        if category_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; category_ids.len()].join(", ");
        let sql = format!(
            "SELECT category_id, COUNT(*) FROM products WHERE category_id IN ({}) GROUP BY category_id",
            placeholders
        );
        let values = category_ids.iter().map(|id| text(id)).collect();

        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(&sql, Params::Positional(values))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to count products: {}", e))
            })?;

        let mut counts = HashMap::new();
        while let Some(row) = rows.next().await.context("Failed to read row")? {
            let category_id: String = row.get(0).context("Failed to get category_id")?;
            let count: i64 = row.get(1).context("Failed to get count")?;
            counts.insert(category_id, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn run_transaction(&self, writes: Vec<StoreWrite>) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let conn = self.db.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE TRANSACTION", ())
            .await
            .map_err(|e| DatabaseError::transaction("begin", e))?;

        for write in &writes {
            if let Err(e) = Self::apply_write(&conn, write).await {
                if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                    tracing::warn!("Rollback after failed write also failed: {}", rollback_err);
                }
                return Err(e);
            }
        }

        if let Err(e) = conn.execute("COMMIT", ()).await {
            if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                tracing::warn!("Rollback after failed commit also failed: {}", rollback_err);
            }
            return Err(DatabaseError::transaction("commit", e).into());
        }

        tracing::debug!("Committed transaction with {} writes", writes.len());
        Ok(())
    }
}
