//! Recursive traversal over realistic trees.

use doctree::store::memory::MemoryBackend;
use doctree::store::{CachedDoc, DocumentStore};
use doctree::traverse::TraverseOptions;
use serde_json::json;
use std::sync::Arc;

fn project_store() -> DocumentStore {
    let backend = MemoryBackend::new()
        .with_document("guide/install.md", json!("install"))
        .with_document("guide/usage.md", json!("usage"))
        .with_document("guide/advanced/tuning.md", json!("tuning"))
        .with_document("readme.md", json!("readme"))
        .with_document("src/main.rs", json!("fn main() {}"));
    DocumentStore::new(Arc::new(backend))
}

#[tokio::test]
async fn test_directories_lead_each_level_then_files_then_subtrees() {
    let mut store = project_store();
    let entries = store
        .read_dir("", TraverseOptions::default())
        .collect()
        .await
        .unwrap();

    let walked: Vec<(&str, u32, bool)> = entries
        .iter()
        .map(|e| (e.name.as_str(), e.depth, e.stat.is_directory))
        .collect();
    assert_eq!(
        walked,
        vec![
            ("guide", 0, true),
            ("src", 0, true),
            ("readme.md", 0, false),
            ("advanced", 1, true),
            ("install.md", 1, false),
            ("usage.md", 1, false),
            ("tuning.md", 2, false),
            ("main.rs", 1, false),
        ]
    );
}

#[tokio::test]
async fn test_filter_prunes_whole_subtrees() {
    let mut store = project_store();
    let options = TraverseOptions::with_filter(|path| !path.contains("advanced"));
    let entries = store.read_dir("", options).collect().await.unwrap();

    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["guide", "src", "readme.md", "install.md", "usage.md", "main.rs"]
    );
}

#[tokio::test]
async fn test_walk_seeds_the_cache_with_sentinels() {
    let mut store = project_store();
    store
        .read_dir("", TraverseOptions::default())
        .collect()
        .await
        .unwrap();

    assert!(matches!(
        store.cached("guide/install.md"),
        Some(CachedDoc::Unloaded)
    ));
    assert!(store.cached_stat("guide").unwrap().is_directory);
    assert_eq!(store.cached_uris().len(), 8);
}

#[tokio::test]
async fn test_symlinked_directory_recursion_is_optional() {
    let backend = MemoryBackend::new()
        .with_document("docs/readme.md", json!("readme"))
        .with_symlinked_directory("docs/current")
        .with_document("docs/current/latest.md", json!("latest"));
    let mut store = DocumentStore::new(Arc::new(backend));

    let entries = store
        .read_dir("docs", TraverseOptions::default())
        .collect()
        .await
        .unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["current", "readme.md", "latest.md"]);

    let options = TraverseOptions {
        skip_symbolic_links: true,
        ..TraverseOptions::default()
    };
    let entries = store.read_dir("docs", options).collect().await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["current", "readme.md"]);
    let current = entries.iter().find(|e| e.name == "current").unwrap();
    assert!(current.stat.is_symbolic_link);
}

#[tokio::test]
async fn test_branch_walk_carries_depth_annotation() {
    let mut store = project_store();
    let entries = store
        .read_branch("guide", 3, TraverseOptions::default())
        .collect()
        .await
        .unwrap();

    assert_eq!(entries[0].name, "advanced");
    assert_eq!(entries[0].depth, 3);
    let tuning = entries.iter().find(|e| e.name == "tuning.md").unwrap();
    assert_eq!(tuning.depth, 4);
    assert_eq!(tuning.parent, "guide/advanced");
}
