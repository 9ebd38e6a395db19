//! Storage backend contract.
//!
//! Trait for the injected storage collaborator. The store and traversal
//! layers call only these primitives; persistence layout, transport, and
//! timeout policy all live behind this boundary. Partial backends return
//! a not-implemented error from primitives they cannot serve.

use crate::document::DocumentStat;
use crate::error::StoreError;
use crate::types::Uri;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Access level checked by the backend gate before storage is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
    Delete,
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevel::Read => write!(f, "read"),
            AccessLevel::Write => write!(f, "write"),
            AccessLevel::Delete => write!(f, "delete"),
        }
    }
}

/// Options for a directory listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    /// Depth the caller will annotate the listed children with.
    pub depth: u32,
    /// Skip per-child stat calls; children carry a default stat.
    pub skip_stat: bool,
    /// Leave symbolically linked directories out of recursion.
    pub skip_symbolic_links: bool,
}

/// One immediate child reported by a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedEntry {
    pub name: String,
    pub stat: DocumentStat,
    pub is_directory: bool,
}

/// Storage primitives the document tree is built on.
///
/// `list_dir`, `load_document`, `save_document`, `drop_document`, and
/// `stat_document` are required. The path helpers and the access gate
/// have neutral defaults a backend may override.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List the immediate children of a directory URI, in a stable order.
    async fn list_dir(&self, uri: &str, options: &ListOptions)
        -> Result<Vec<ListedEntry>, StoreError>;

    /// Load the document value stored at a URI.
    async fn load_document(&self, uri: &str) -> Result<Value, StoreError>;

    /// Persist a document value at a URI. Returns whether anything was written.
    async fn save_document(&self, uri: &str, value: &Value) -> Result<bool, StoreError>;

    /// Remove the document at a URI. Returns whether anything was removed.
    async fn drop_document(&self, uri: &str) -> Result<bool, StoreError>;

    /// Stat a URI. Failures may be captured into the stat's error field by
    /// callers that keep enumerating.
    async fn stat_document(&self, uri: &str) -> Result<DocumentStat, StoreError>;

    /// Join URI segments with "/", skipping empties. The first segment keeps
    /// a leading slash so absolute roots survive.
    fn resolve(&self, segments: &[&str]) -> Uri {
        let mut uri = String::new();
        for segment in segments {
            let trimmed = if uri.is_empty() {
                segment.trim_end_matches('/')
            } else {
                segment.trim_matches('/')
            };
            if trimmed.is_empty() {
                continue;
            }
            if !uri.is_empty() {
                uri.push('/');
            }
            uri.push_str(trimmed);
        }
        uri
    }

    /// Express `target` relative to `base`. Targets outside `base` come back
    /// unchanged; `target == base` comes back empty.
    fn relative(&self, base: &str, target: &str) -> Uri {
        if base.is_empty() {
            return target.to_string();
        }
        if target == base {
            return String::new();
        }
        match target
            .strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(rest) => rest.to_string(),
            None => target.to_string(),
        }
    }

    /// Access gate consulted before every storage touch. Default allows all.
    async fn ensure_access(&self, _uri: &str, _level: AccessLevel) -> Result<bool, StoreError> {
        Ok(true)
    }

    /// Establish a connection. Backends that cannot connect report `false`
    /// rather than erroring, so the store can surface it uniformly.
    async fn connect(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    /// Tear down the connection.
    async fn disconnect(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
