//! Integration tests for TursoStore (libsql backend)
//!
//! Each test opens a fresh database file in a temporary directory.

#![cfg(feature = "turso")]

use anyhow::Result;
use catalog_tree_core::{
    db::{DatabaseService, GuardViolation, NodeStore, StoreWrite, TursoStore, WriteGuard},
    DeletePolicy, NewNode, Node, NodeFamily, NodeFilter, NodeType, NodeUpdate, ParentFilter,
    ReorderItem, TreeConfig, TreeService, TreeServiceError, Visibility,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Test helper: Create a store on a temporary database
async fn create_test_store() -> Result<(Arc<TursoStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("tree.db");
    let db = Arc::new(DatabaseService::new(db_path).await?);
    Ok((Arc::new(TursoStore::new(db)), temp_dir))
}

#[tokio::test]
async fn test_schema_init_is_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("nested").join("tree.db");

    let first = DatabaseService::new(db_path.clone()).await?;
    first.upsert_product("p1", "Sneaker", None).await?;
    drop(first);

    let second = DatabaseService::new(db_path).await?;
    assert_eq!(second.product_category("p1").await?, Some(None));
    Ok(())
}

#[tokio::test]
async fn test_node_crud_round_trip() -> Result<()> {
    let (store, _temp_dir) = create_test_store().await?;

    let mut node = Node::new_with_id(
        "nav-1".to_string(),
        NodeType::ExternalLink,
        "Blog".to_string(),
        None,
    )
    .with_sort_order(3);
    node.url = Some("https://blog.example.com".to_string());

    store.create_node(node.clone()).await?;
    let fetched = store.get_node("nav-1").await?.expect("node stored");
    assert_eq!(fetched.family, NodeFamily::Navigation);
    assert_eq!(fetched.node_type, NodeType::ExternalLink);
    assert_eq!(fetched.sort_order, 3);
    assert_eq!(fetched.url.as_deref(), Some("https://blog.example.com"));

    let updated = store
        .update_node(
            "nav-1",
            NodeUpdate {
                url: Some(None),
                ..NodeUpdate::new().with_name("Journal")
            },
        )
        .await?;
    assert_eq!(updated.name, "Journal");
    assert_eq!(updated.url, None);
    assert_eq!(updated.sort_order, 3);

    assert!(store.delete_node("nav-1").await?.existed);
    assert!(!store.delete_node("nav-1").await?.existed);
    assert!(store.get_node("nav-1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_query_filters_and_order() -> Result<()> {
    let (store, _temp_dir) = create_test_store().await?;

    store
        .create_node(Node::new_with_id("r".into(), NodeType::PageLink, "R".into(), None))
        .await?;
    for (id, sort) in [("b", 1), ("a", 1), ("c", 0)] {
        store
            .create_node(
                Node::new_with_id(id.into(), NodeType::PageLink, id.into(), Some("r".into()))
                    .with_sort_order(sort),
            )
            .await?;
    }
    store
        .create_node(
            Node::new_with_id("hidden".into(), NodeType::PageLink, "H".into(), Some("r".into()))
                .with_sort_order(5)
                .with_active(false),
        )
        .await?;
    store
        .create_node(Node::new_with_id("cat".into(), NodeType::Brand, "Cat".into(), None))
        .await?;

    let children = store
        .query_nodes(
            NodeFilter::for_family(NodeFamily::Navigation)
                .with_parent(ParentFilter::Of("r".into()))
                .active_only(),
        )
        .await?;
    let ids: Vec<_> = children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a", "b"]);

    let roots = store
        .query_nodes(NodeFilter::new().with_parent(ParentFilter::Root))
        .await?;
    assert_eq!(roots.len(), 2);

    assert_eq!(
        store
            .max_sort_order(NodeFamily::Navigation, Some("r"))
            .await?,
        Some(5)
    );
    assert_eq!(store.max_sort_order(NodeFamily::Category, Some("r")).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_transaction_rolls_back_on_missing_row() -> Result<()> {
    let (store, _temp_dir) = create_test_store().await?;
    store
        .create_node(Node::new_with_id("a".into(), NodeType::PageLink, "A".into(), None))
        .await?;

    let result = store
        .run_transaction(vec![
            StoreWrite::update("a", NodeUpdate::new().with_sort_order(9)),
            StoreWrite::update("missing", NodeUpdate::new().with_sort_order(1)),
        ])
        .await;
    assert!(result.is_err());
    assert_eq!(store.get_node("a").await?.expect("a").sort_order, 0);
    Ok(())
}

#[tokio::test]
async fn test_guarded_batch_sees_rows_inside_transaction() -> Result<()> {
    let (store, _temp_dir) = create_test_store().await?;
    for (id, parent) in [("top", None), ("mid", Some("top")), ("a", Some("mid"))] {
        store
            .create_node(Node::new_with_id(
                id.into(),
                NodeType::Collection,
                id.to_uppercase(),
                parent.map(str::to_string),
            ))
            .await?;
    }
    store
        .create_node(
            Node::new_with_id("menu".into(), NodeType::CategoryLink, "Menu".into(), None)
                .with_category_ref("mid"),
        )
        .await?;

    let err = store
        .run_transaction(vec![StoreWrite::no_children("mid"), StoreWrite::delete("mid")])
        .await
        .unwrap_err();
    let violation = err.downcast_ref::<GuardViolation>().expect("guard violation");
    assert_eq!(violation.guard, WriteGuard::NoChildren { id: "mid".into() });
    assert!(store.get_node("mid").await?.is_some());

    store
        .run_transaction(vec![
            StoreWrite::ReparentChildren {
                from_parent: "mid".to_string(),
                to_parent: Some("top".to_string()),
            },
            StoreWrite::ClearCategoryRefs {
                category_id: "mid".to_string(),
            },
            StoreWrite::Guard(WriteGuard::NotReferenced {
                category_id: "mid".to_string(),
            }),
            StoreWrite::no_children("mid"),
            StoreWrite::delete("mid"),
        ])
        .await?;

    assert!(store.get_node("mid").await?.is_none());
    assert_eq!(
        store.get_node("a").await?.expect("a").parent_id.as_deref(),
        Some("top")
    );
    assert_eq!(store.get_node("menu").await?.expect("menu").category_ref, None);
    Ok(())
}

#[tokio::test]
async fn test_product_counts_and_relink() -> Result<()> {
    let (store, _temp_dir) = create_test_store().await?;
    let db = store.database().clone();
    db.upsert_product("p1", "Runner", Some("shoes")).await?;
    db.upsert_product("p2", "Boot", Some("shoes")).await?;
    db.upsert_product("p3", "Cap", Some("hats")).await?;

    let counts = store
        .product_counts(&["shoes".to_string(), "socks".to_string()])
        .await?;
    assert_eq!(counts.get("shoes"), Some(&2));
    assert_eq!(counts.get("socks"), None);

    store
        .run_transaction(vec![StoreWrite::RelinkProducts {
            from_category: "shoes".to_string(),
            to_category: Some("misc".to_string()),
        }])
        .await?;
    assert_eq!(
        db.product_category("p1").await?,
        Some(Some("misc".to_string()))
    );
    assert_eq!(
        db.product_category("p3").await?,
        Some(Some("hats".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn test_tree_service_over_libsql() -> Result<()> {
    let (store, _temp_dir) = create_test_store().await?;
    let navigation = TreeService::navigation(store.clone(), TreeConfig::default())?;

    navigation
        .create(NewNode::new(NodeType::PageLink, "A").with_id("1").with_sort_order(1))
        .await?;
    navigation
        .create(NewNode::new(NodeType::PageLink, "B").with_id("2").with_parent("1").with_sort_order(2))
        .await?;
    navigation
        .create(NewNode::new(NodeType::PageLink, "C").with_id("3").with_parent("1").with_sort_order(1))
        .await?;

    let tree = navigation.get_tree(Visibility::ActiveOnly).await?;
    let names: Vec<_> = tree[0].children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["C", "B"]);

    let err = navigation
        .reorder(vec![ReorderItem::new("2", 0), ReorderItem::new("ghost", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound { .. }));
    assert_eq!(store.get_node("2").await?.expect("2").sort_order, 2);

    navigation.reorder(vec![ReorderItem::new("2", 0)]).await?;
    let tree = navigation.get_tree(Visibility::ActiveOnly).await?;
    let names: Vec<_> = tree[0].children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["B", "C"]);

    let outcome = navigation.delete("1", DeletePolicy::CascadeChildren).await?;
    assert_eq!(outcome.deleted_ids.len(), 3);
    assert!(navigation.get_tree(Visibility::All).await?.is_empty());
    Ok(())
}
