//! Path codec behavior over realistic documents.

use doctree::codec::{self, PathCodec};
use proptest::prelude::*;
use serde_json::{json, Value};

#[test]
fn test_document_flattens_and_reconstructs() {
    let doc = json!({
        "name": "doctree",
        "features": [
            {"id": 1, "on": true},
            {"id": 2, "on": false}
        ],
        "limits": {"depth": 99, "dividers": ["/", "."]}
    });

    let flat = codec::flatten(&doc);
    assert_eq!(flat.get("features/[0]/id"), Some(&json!(1)));
    assert_eq!(flat.get("limits/dividers/[1]"), Some(&json!(".")));

    let back = codec::unflatten(&flat).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn test_merge_overlays_settings() {
    let base = json!({
        "server": {"host": "localhost", "port": 8080},
        "tags": ["alpha", "beta"]
    });
    let patch = json!({
        "server": {"port": 9090},
        "tags": ["release"]
    });

    let merged = codec::merge(&base, &patch);
    assert_eq!(merged["server"]["host"], json!("localhost"));
    assert_eq!(merged["server"]["port"], json!(9090));
    // Arrays replace wholesale instead of merging elementwise.
    assert_eq!(merged["tags"], json!(["release"]));
    // Inputs are left untouched.
    assert_eq!(base["server"]["port"], json!(8080));
}

#[test]
fn test_find_value_backs_off_to_nearest_container() {
    let doc = json!({"a": {"b": {"c": 1}}});
    let codec = PathCodec::default();

    let (found, prefix) = codec.find_value("a/b/missing/deep", &doc, false).unwrap();
    assert_eq!(found, &json!({"c": 1}));
    assert_eq!(prefix, vec!["a", "b"]);

    // With scalars skipped an exact hit on a leaf backs off to its parent.
    let (found, prefix) = codec.find_value("a/b/c", &doc, true).unwrap();
    assert_eq!(found, &json!({"c": 1}));
    assert_eq!(prefix, vec!["a", "b"]);
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

/// Non-empty containers of plain keys, so every leaf survives a
/// flatten/unflatten cycle.
fn document() -> impl Strategy<Value = Value> {
    let node = leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z]{1,4}", inner, 1..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    });
    prop_oneof![
        prop::collection::vec(node.clone(), 1..4).prop_map(Value::from),
        prop::collection::btree_map("[a-z]{1,4}", node, 1..4)
            .prop_map(|m| Value::Object(m.into_iter().collect())),
    ]
}

proptest! {
    #[test]
    fn flatten_unflatten_roundtrips(doc in document()) {
        let flat = codec::flatten(&doc);
        let back = codec::unflatten(&flat).unwrap();
        prop_assert_eq!(back, doc);
    }

    #[test]
    fn every_flat_key_reads_back_its_leaf(doc in document()) {
        let flat = codec::flatten(&doc);
        for (key, value) in &flat {
            prop_assert_eq!(codec::find(key, &doc), Some(value));
        }
    }
}
