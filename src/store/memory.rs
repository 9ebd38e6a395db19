//! In-memory storage backend.
//!
//! Flat document map with implied directories, behind the full backend
//! contract. Ships with builder-style seeding, per-path access denial,
//! and stat fault injection, so stores can be exercised without any real
//! medium. Child listings come back in lexicographic name order.

use crate::document::DocumentStat;
use crate::error::StoreError;
use crate::store::backend::{AccessLevel, ListOptions, ListedEntry, StorageBackend};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Seed timestamp for built documents, advanced per document so mtime
/// ordering is deterministic across runs.
const SEED_BASE_MS: i64 = 1_600_000_000_000;
const SEED_STEP_MS: i64 = 1_000;

#[derive(Debug, Clone)]
struct StoredDocument {
    value: Value,
    mtime_ms: i64,
    size: u64,
}

#[derive(Debug, Default)]
struct MemoryInner {
    documents: BTreeMap<String, StoredDocument>,
    directories: BTreeSet<String>,
}

impl MemoryInner {
    fn directory_exists(&self, uri: &str) -> bool {
        if uri.is_empty() || self.directories.contains(uri) {
            return true;
        }
        let prefix = format!("{}/", uri);
        self.documents.keys().any(|k| k.starts_with(&prefix))
            || self.directories.iter().any(|d| d.starts_with(&prefix))
    }
}

/// Storage backend holding everything in process memory.
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
    denials: Vec<(String, AccessLevel)>,
    stat_errors: BTreeMap<String, String>,
    symlinked: BTreeSet<String>,
    online: bool,
    seed_ms: i64,
}

impl MemoryBackend {
    /// Empty backend with nothing seeded and every access allowed.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            denials: Vec::new(),
            stat_errors: BTreeMap::new(),
            symlinked: BTreeSet::new(),
            online: true,
            seed_ms: SEED_BASE_MS,
        }
    }

    /// Seed a document, creating its parent directories implicitly. The
    /// modify time advances by a fixed step per seeded document.
    pub fn with_document(mut self, uri: impl Into<String>, value: Value) -> Self {
        self.seed_ms += SEED_STEP_MS;
        let mtime_ms = self.seed_ms;
        self.insert_document(uri.into(), value, mtime_ms);
        self
    }

    /// Seed a document with an explicit modify time.
    pub fn with_document_mtime(
        mut self,
        uri: impl Into<String>,
        value: Value,
        mtime_ms: i64,
    ) -> Self {
        self.insert_document(uri.into(), value, mtime_ms);
        self
    }

    /// Seed an empty directory.
    pub fn with_directory(self, uri: impl Into<String>) -> Self {
        self.inner.lock().directories.insert(uri.into());
        self
    }

    /// Seed a directory whose stat reports a symbolic link.
    pub fn with_symlinked_directory(mut self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        self.inner.lock().directories.insert(uri.clone());
        self.symlinked.insert(uri);
        self
    }

    /// Deny one access level for one URI.
    pub fn deny(mut self, uri: impl Into<String>, level: AccessLevel) -> Self {
        self.denials.push((uri.into(), level));
        self
    }

    /// Make stat calls for one URI report a captured error.
    pub fn with_stat_error(mut self, uri: impl Into<String>, message: impl Into<String>) -> Self {
        self.stat_errors.insert(uri.into(), message.into());
        self
    }

    /// Make connection attempts report failure.
    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    fn insert_document(&self, uri: String, value: Value, mtime_ms: i64) {
        let size = document_size(&value);
        self.inner.lock().documents.insert(
            uri,
            StoredDocument {
                value,
                mtime_ms,
                size,
            },
        );
    }

    fn stat_for(&self, inner: &MemoryInner, uri: &str) -> DocumentStat {
        if let Some(doc) = inner.documents.get(uri) {
            return DocumentStat::file(doc.size, doc.mtime_ms);
        }
        let mut stat = DocumentStat::directory(4096, SEED_BASE_MS);
        if self.symlinked.contains(uri) {
            stat.is_symbolic_link = true;
        }
        stat
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn document_size(value: &Value) -> u64 {
    serde_json::to_string(value).map(|s| s.len() as u64).unwrap_or(0)
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_dir(
        &self,
        uri: &str,
        options: &ListOptions,
    ) -> Result<Vec<ListedEntry>, StoreError> {
        let inner = self.inner.lock();
        if !inner.directory_exists(uri) {
            return Err(StoreError::resource(uri, "no such directory"));
        }
        let prefix = if uri.is_empty() {
            String::new()
        } else {
            format!("{}/", uri)
        };

        let mut names: BTreeMap<String, bool> = BTreeMap::new();
        for key in inner.documents.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if rest.is_empty() {
                    continue;
                }
                match rest.split_once('/') {
                    Some((head, _)) => {
                        names.insert(head.to_string(), true);
                    }
                    None => {
                        names.entry(rest.to_string()).or_insert(false);
                    }
                }
            }
        }
        for dir in inner.directories.iter() {
            if let Some(rest) = dir.strip_prefix(&prefix) {
                if rest.is_empty() {
                    continue;
                }
                let head = rest.split('/').next().unwrap_or(rest);
                names.insert(head.to_string(), true);
            }
        }

        let mut listed = Vec::with_capacity(names.len());
        for (name, is_directory) in names {
            let full = if uri.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", uri, name)
            };
            let stat = if let Some(message) = self.stat_errors.get(&full) {
                DocumentStat::with_error(message)
            } else if options.skip_stat {
                DocumentStat::default()
            } else {
                self.stat_for(&inner, &full)
            };
            listed.push(ListedEntry {
                name,
                stat,
                is_directory,
            });
        }
        Ok(listed)
    }

    async fn load_document(&self, uri: &str) -> Result<Value, StoreError> {
        let inner = self.inner.lock();
        inner
            .documents
            .get(uri)
            .map(|doc| doc.value.clone())
            .ok_or_else(|| StoreError::resource(uri, "document not found"))
    }

    async fn save_document(&self, uri: &str, value: &Value) -> Result<bool, StoreError> {
        self.insert_document(
            uri.to_string(),
            value.clone(),
            chrono::Utc::now().timestamp_millis(),
        );
        Ok(true)
    }

    async fn drop_document(&self, uri: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().documents.remove(uri).is_some())
    }

    async fn stat_document(&self, uri: &str) -> Result<DocumentStat, StoreError> {
        if let Some(message) = self.stat_errors.get(uri) {
            return Err(StoreError::resource(uri, message));
        }
        let inner = self.inner.lock();
        if inner.documents.contains_key(uri) || inner.directory_exists(uri) {
            return Ok(self.stat_for(&inner, uri));
        }
        Err(StoreError::resource(uri, "no such document or directory"))
    }

    async fn ensure_access(&self, uri: &str, level: AccessLevel) -> Result<bool, StoreError> {
        let denied = self
            .denials
            .iter()
            .any(|(denied_uri, denied_level)| denied_uri == uri && *denied_level == level);
        Ok(!denied)
    }

    async fn connect(&self) -> Result<bool, StoreError> {
        Ok(self.online)
    }
}
