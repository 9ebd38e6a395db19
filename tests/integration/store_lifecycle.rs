//! End-to-end store lifecycle over a shared in-memory backend.

use doctree::error::StoreError;
use doctree::store::backend::{AccessLevel, StorageBackend};
use doctree::store::memory::MemoryBackend;
use doctree::store::{CachedDoc, DocumentStore};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_edit_cycle_reaches_a_second_reader() {
    let backend = Arc::new(MemoryBackend::new().with_document("config.json", json!({"retries": 3})));
    let mut store = DocumentStore::new(backend.clone());
    store.connect().await.unwrap();

    let mut value = store.get("config.json").await.unwrap();
    value["retries"] = json!(5);
    store.set("config.json", value).await.unwrap();
    let changed = store.push(None).await.unwrap();
    assert_eq!(changed, vec!["config.json".to_string()]);

    let mut reader = DocumentStore::new(backend.clone());
    let synced = reader.get("config.json").await.unwrap();
    assert_eq!(synced["retries"], json!(5));
}

#[tokio::test]
async fn test_push_skips_documents_that_were_only_read() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_document("a.json", json!(1))
            .with_document("b.json", json!(2)),
    );
    let mut store = DocumentStore::new(backend.clone());
    store.get("a.json").await.unwrap();
    store.get("b.json").await.unwrap();
    store.set("a.json", json!(10)).await.unwrap();

    let changed = store.push(None).await.unwrap();
    assert_eq!(changed, vec!["a.json".to_string()]);
}

#[tokio::test]
async fn test_move_copies_and_delete_evicts() {
    let backend = Arc::new(MemoryBackend::new().with_document("a.json", json!({"v": 1})));
    let mut store = DocumentStore::new(backend.clone());

    assert!(store.move_document("a.json", "b.json").await.unwrap());
    let mut reader = DocumentStore::new(backend.clone());
    assert_eq!(reader.get("b.json").await.unwrap(), json!({"v": 1}));
    assert_eq!(reader.get("a.json").await.unwrap(), json!({"v": 1}));

    assert!(store.delete("a.json").await.unwrap());
    assert!(store.cached("a.json").is_none());
    let err = DocumentStore::new(backend.clone())
        .get("a.json")
        .await
        .unwrap_err();
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_extract_attach_detach_roundtrip() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_document("conf/app.json", json!({"app": true}))
            .with_document("conf/db.json", json!({"db": true}))
            .with_document("data/users.json", json!([])),
    );
    let mut store = DocumentStore::new(backend.clone());
    store.get("conf/app.json").await.unwrap();
    store.get("conf/db.json").await.unwrap();
    store.get("data/users.json").await.unwrap();

    let branch = store.extract("conf");
    assert_eq!(branch.root(), "conf");
    assert!(!branch.is_connected());
    assert_eq!(branch.cached_uris(), vec!["app.json", "db.json"]);

    store.attach(branch);
    assert_eq!(store.branches().len(), 1);

    let twin = store.extract("conf");
    let mut detached = store.detach(&twin).unwrap();
    assert!(store.branches().is_empty());

    // Extracted documents answer from cache without a connection.
    let app = detached.get("app.json").await.unwrap();
    assert_eq!(app, json!({"app": true}));
}

#[tokio::test]
async fn test_find_answers_from_cache_until_reset() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_document("a/x.json", json!(1))
            .with_document("b.json", json!(2)),
    );
    let mut store = DocumentStore::new(backend.clone());

    assert_eq!(store.find("a/x.json").await.unwrap(), vec!["a/x.json".to_string()]);
    // Directories discovered by the walk are also addressable.
    assert_eq!(store.find("a").await.unwrap(), vec!["a".to_string()]);

    backend.save_document("c.json", &json!(3)).await.unwrap();
    assert!(store.find("c.json").await.unwrap().is_empty());

    store.reset_loaded();
    assert_eq!(store.find("c.json").await.unwrap(), vec!["c.json".to_string()]);
}

#[tokio::test]
async fn test_find_where_filters_on_uri_and_slot() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_document("notes/today.md", json!("x"))
            .with_document("notes/old.md", json!("y"))
            .with_document("image.png", json!(null)),
    );
    let mut store = DocumentStore::new(backend.clone());
    store.get("notes/today.md").await.unwrap();

    let markdown = store
        .find_where(|uri, _| uri.ends_with(".md"))
        .await
        .unwrap();
    assert_eq!(markdown, vec!["notes/old.md".to_string(), "notes/today.md".to_string()]);

    let loaded = store
        .find_where(|_, doc| matches!(doc, CachedDoc::Loaded(_)))
        .await
        .unwrap();
    assert_eq!(loaded, vec!["notes/today.md".to_string()]);
}

#[tokio::test]
async fn test_write_denial_blocks_set_and_push() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_document("secret.json", json!({"k": 1}))
            .deny("secret.json", AccessLevel::Write),
    );
    let mut store = DocumentStore::new(backend.clone());

    assert_eq!(store.get("secret.json").await.unwrap(), json!({"k": 1}));
    let err = store.set("secret.json", json!({"k": 2})).await.unwrap_err();
    assert!(matches!(err, StoreError::AccessDenied { .. }));
    let err = store.push(Some("secret.json")).await.unwrap_err();
    assert!(matches!(err, StoreError::AccessDenied { .. }));
}
