//! Database Connection Management
//!
//! This module provides the database connection and schema initialization
//! for the libsql/SQLite store adapter.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Startup schema step**: `CREATE TABLE IF NOT EXISTS` runs once in
//!   [`DatabaseService::new`], never per request
//! - **WAL mode**: Write-Ahead Logging so readers don't block the writer
//! - **Busy timeout**: 5 seconds, the only timeout the tree engine relies on
//!
//! Referential rules (parents, category references, delete policies) are
//! enforced by the tree service, so the schema deliberately has no foreign
//! keys that would cascade behind its back.
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions** so concurrent
//! writers wait on the lock instead of failing with `SQLITE_BUSY`.

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Busy timeout applied to every connection
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Database service for managing libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use catalog_tree_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_service = DatabaseService::new(PathBuf::from("./data/catalog.db")).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Open (or create) the tree database at `db_path`
    ///
    /// Missing parent directories are created, then the schema step runs.
    /// Reopening an existing file leaves its data untouched.
    ///
    /// # Errors
    ///
    /// - `DirectoryCreationFailed` / `PermissionDenied` for the parent directory
    /// - `OpenFailed` if libsql cannot open the file
    /// - `SchemaFailed` if a table or index cannot be created
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::directory(parent.to_path_buf(), e))?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::open_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema().await?;
        tracing::info!("Tree database ready at {}", service.db_path.display());

        Ok(service)
    }

    /// PRAGMAs return rows, so they go through `query()` rather than `execute()`
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Safe to call multiple times.
    ///
    /// # Schema
    ///
    /// - `tree_nodes`: category and navigation nodes (flat, keyed by id)
    /// - `products`: product → category links (the engine only counts and
    ///   relinks them)
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tree_nodes (
                id TEXT PRIMARY KEY,
                family TEXT NOT NULL,
                name TEXT NOT NULL,
                parent_id TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                node_type TEXT NOT NULL,
                category_ref TEXT,
                url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| DatabaseError::schema("create tree_nodes", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category_id TEXT
            )",
            (),
        )
        .await
        .map_err(|e| DatabaseError::schema("create products", e))?;

        self.create_indexes(&conn).await?;

        Ok(())
    }

    async fn create_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_tree_nodes_siblings",
                "CREATE INDEX IF NOT EXISTS idx_tree_nodes_siblings
                 ON tree_nodes(family, parent_id, sort_order)",
            ),
            (
                "idx_tree_nodes_parent",
                "CREATE INDEX IF NOT EXISTS idx_tree_nodes_parent
                 ON tree_nodes(parent_id)",
            ),
            (
                "idx_tree_nodes_category_ref",
                "CREATE INDEX IF NOT EXISTS idx_tree_nodes_category_ref
                 ON tree_nodes(category_ref)",
            ),
            (
                "idx_products_category",
                "CREATE INDEX IF NOT EXISTS idx_products_category
                 ON products(category_id)",
            ),
        ];

        for (name, sql) in indexes {
            conn.execute(sql, ())
                .await
                .map_err(|e| DatabaseError::schema(name, e))?;
        }

        Ok(())
    }

    /// Get a raw connection
    ///
    /// Only use in synchronous, single-threaded contexts; async code should
    /// call [`connect_with_timeout`](Self::connect_with_timeout).
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::Libsql)
    }

    /// Get an async connection with busy timeout configured
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
            .await?;
        Ok(conn)
    }

    /// Link a product to a category (`None` = uncategorized)
    ///
    /// Products belong to the catalog module; this is the minimal write the
    /// tree tooling needs for seeding and tests.
    pub async fn upsert_product(
        &self,
        product_id: &str,
        name: &str,
        category_id: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO products (id, name, category_id) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, category_id = excluded.category_id",
            (product_id, name, category_id),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to upsert product: {}", e)))?;
        Ok(())
    }

    /// Category currently linked to a product (`None` if the product is unknown)
    pub async fn product_category(
        &self,
        product_id: &str,
    ) -> Result<Option<Option<String>>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut rows = conn
            .query("SELECT category_id FROM products WHERE id = ?", [product_id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query product: {}", e)))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => {
                let category: Option<String> = row.get(0)?;
                Ok(Some(category))
            }
            None => Ok(None),
        }
    }
}
