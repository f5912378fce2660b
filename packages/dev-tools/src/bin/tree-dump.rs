//! Tree Dump Binary
//!
//! Opens a libsql tree database, optionally seeds a small sample catalog, and
//! prints both trees as formatted JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Dump the default database
//! cargo run --bin tree-dump
//!
//! # Seed an empty database first, with a custom config
//! TREE_SEED=1 TREE_CONFIG=./tree.json cargo run --bin tree-dump
//! ```
//!
//! # Environment Variables
//!
//! - `TREE_DB_PATH`: Database file (default: `./data/catalog-tree.db`)
//! - `TREE_CONFIG`: Optional JSON file with a `TreeConfig`
//! - `TREE_SEED`: Seed sample data when the database has no nodes
//! - `TREE_ALL`: Include inactive nodes in the dump and warn about trees
//!   whose parent is missing
//! - `RUST_LOG`: Logging level (e.g., "info", "debug")
//!
//! Logs go to stderr so stdout stays valid JSON.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use catalog_tree_core::db::{DatabaseService, NodeStore, TursoStore};
use catalog_tree_core::{NewNode, NodeFilter, NodeType, TreeConfig, TreeService, Visibility};
use serde::Serialize;

#[derive(Serialize)]
struct Dump {
    categories: Vec<catalog_tree_core::NodeView>,
    navigation: Vec<catalog_tree_core::NodeView>,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

async fn seed(
    db: &DatabaseService,
    categories: &TreeService,
    navigation: &TreeService,
) -> anyhow::Result<()> {
    tracing::info!("Seeding sample catalog");

    let apparel = categories
        .create(NewNode::new(NodeType::Department, "Apparel"))
        .await?;
    let shoes = categories
        .create(NewNode::new(NodeType::Collection, "Shoes").with_parent(apparel.id.clone()))
        .await?;
    categories
        .create(NewNode::new(NodeType::Brand, "Acme Runners").with_parent(shoes.id.clone()))
        .await?;
    categories
        .create(NewNode::new(NodeType::Seasonal, "Summer Sale"))
        .await?;

    db.upsert_product("sku-1001", "Trail Runner", Some(shoes.id.as_str()))
        .await?;
    db.upsert_product("sku-1002", "City Sneaker", Some(shoes.id.as_str()))
        .await?;
    db.upsert_product("sku-2001", "Rain Jacket", Some(apparel.id.as_str()))
        .await?;

    navigation
        .create(NewNode::new(NodeType::CustomLink, "Home").with_url("/"))
        .await?;
    let shop = navigation
        .create(NewNode::new(NodeType::CategoryLink, "Shop").with_category_ref(apparel.id.clone()))
        .await?;
    navigation
        .create(
            NewNode::new(NodeType::CategoryLink, "Shoes")
                .with_parent(shop.id.clone())
                .with_category_ref(shoes.id.clone()),
        )
        .await?;
    navigation
        .create(NewNode::new(NodeType::PageLink, "About").with_url("/pages/about"))
        .await?;
    navigation
        .create(
            NewNode::new(NodeType::ExternalLink, "Journal")
                .with_url("https://journal.example.com")
                .with_active(false),
        )
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path: PathBuf = env::var("TREE_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data/catalog-tree.db"));

    let config = match env::var("TREE_CONFIG") {
        Ok(path) => TreeConfig::from_json_file(&path)?,
        Err(_) => TreeConfig::default(),
    };

    tracing::info!("Database: {}", db_path.display());
    tracing::debug!("Config: {:?}", config);

    let db = Arc::new(DatabaseService::new(db_path).await?);
    let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db.clone()));

    let categories = TreeService::categories(store.clone(), config.clone())?;
    let navigation = TreeService::navigation(store.clone(), config)?;

    if env_flag("TREE_SEED") {
        let existing = store.query_nodes(NodeFilter::new()).await?;
        if existing.is_empty() {
            seed(&db, &categories, &navigation).await?;
        } else {
            tracing::warn!(
                "Skipping seed: database already holds {} node(s)",
                existing.len()
            );
        }
    }

    let visibility = if env_flag("TREE_ALL") {
        Visibility::All
    } else {
        Visibility::ActiveOnly
    };

    if visibility == Visibility::All {
        categories.get_detached().await?;
        navigation.get_detached().await?;
    }

    let dump = Dump {
        categories: categories.get_tree(visibility).await?,
        navigation: navigation.get_tree(visibility).await?,
    };

    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
