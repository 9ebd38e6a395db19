//! Progress-reporting streams over nested trees.

use doctree::store::memory::MemoryBackend;
use doctree::store::DocumentStore;
use doctree::stream::{SortKey, SortOrder, StreamOptions};
use serde_json::json;
use std::sync::Arc;

fn nested_store() -> DocumentStore {
    let backend = MemoryBackend::new()
        .with_document("a/f1.txt", json!("one"))
        .with_document("a/sub/f2.txt", json!("two"))
        .with_document("b/f3.txt", json!("three"));
    DocumentStore::new(Arc::new(backend))
}

#[tokio::test]
async fn test_progress_rises_to_one_over_a_nested_tree() {
    let mut store = nested_store();
    let snapshots = store
        .find_stream("", StreamOptions::default())
        .collect()
        .await
        .unwrap();

    // Walk order: a, b, sub, f1, f2, f3.
    assert_eq!(snapshots.len(), 6);
    let emitted: Vec<&str> = snapshots.iter().map(|s| s.file.name.as_str()).collect();
    assert_eq!(emitted, vec!["a", "b", "sub", "f1.txt", "f2.txt", "f3.txt"]);

    // Directory a completes when the walk descends into a/sub and moves on.
    assert_eq!(snapshots[3].progress, 0.0);
    assert_eq!(snapshots[4].progress, 1.0 / 3.0);
    let last = snapshots.last().unwrap();
    assert_eq!(last.progress, 1.0);
    assert!(last.dirs.values().all(|d| d.fulfilled));

    let dir_paths: Vec<&String> = last.dirs.keys().collect();
    assert_eq!(dir_paths, vec!["a", "a/sub", "b"]);
    let top_names: Vec<&String> = last.top.keys().collect();
    assert_eq!(top_names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_snapshots_accumulate_one_entry_at_a_time() {
    let mut store = nested_store();
    let snapshots = store
        .find_stream("", StreamOptions::default())
        .collect()
        .await
        .unwrap();

    for (index, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.files.len(), index + 1);
    }
}

#[tokio::test]
async fn test_limit_with_descending_names() {
    let mut store = nested_store();
    let options = StreamOptions {
        order: SortOrder::Desc,
        limit: Some(2),
        ..StreamOptions::default()
    };
    let snapshots = store.find_stream("", options).collect().await.unwrap();

    assert_eq!(snapshots.len(), 2);
    let names: Vec<&str> = snapshots[1].files.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
    assert!(snapshots[1].progress < 1.0);
}

#[tokio::test]
async fn test_sort_by_size_puts_directories_last() {
    let backend = MemoryBackend::new()
        .with_document("m/a.txt", json!(1))
        .with_document("m/b.txt", json!("abcdef"));
    let mut store = DocumentStore::new(Arc::new(backend));
    let options = StreamOptions {
        sort_key: SortKey::Size,
        ..StreamOptions::default()
    };
    let snapshots = store.find_stream("", options).collect().await.unwrap();

    let last = snapshots.last().unwrap();
    let names: Vec<&str> = last.files.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "m"]);
    assert_eq!(last.total_size.files, 1 + 8);
    assert_eq!(last.total_size.dirs, 4096);
}

#[tokio::test]
async fn test_stat_errors_persist_in_every_later_snapshot() {
    let backend = MemoryBackend::new()
        .with_document("logs/ok.txt", json!("fine"))
        .with_document("logs/broken.txt", json!("?"))
        .with_stat_error("logs/broken.txt", "stale handle");
    let mut store = DocumentStore::new(Arc::new(backend));
    let snapshots = store
        .find_stream("", StreamOptions::default())
        .collect()
        .await
        .unwrap();

    // logs, broken.txt, ok.txt; the error appears with its entry and
    // stays in the map for the rest of the stream.
    assert!(snapshots[0].errors.is_empty());
    for snapshot in &snapshots[1..] {
        assert_eq!(
            snapshot.errors.get("logs/broken.txt").map(String::as_str),
            Some("stale handle")
        );
    }
}
