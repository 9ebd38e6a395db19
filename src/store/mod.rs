//! Document store
//!
//! Cached view over a storage backend: document values and metadata keyed
//! by URI, sibling branch composition, and the connection lifecycle.
//! Caches are populated by `get`/`set`/`stat` and by the traversal layer;
//! `push` writes newer-than-disk documents back through the backend.

pub mod backend;
pub mod memory;

use crate::document::DocumentStat;
use crate::error::StoreError;
use crate::store::backend::{AccessLevel, StorageBackend};
use crate::stream::{FindStream, StreamOptions};
use crate::traverse::{ReadDir, TraverseOptions};
use crate::types::Uri;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Cache slot for one URI. Existence can be known from a listing before
/// the content is ever fetched.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedDoc {
    /// Existence known, content not fetched.
    Unloaded,
    /// Content fetched from the backend or written by a caller.
    Loaded(Value),
}

impl CachedDoc {
    pub fn is_loaded(&self) -> bool {
        matches!(self, CachedDoc::Loaded(_))
    }

    /// The cached value, when loaded.
    pub fn value(&self) -> Option<&Value> {
        match self {
            CachedDoc::Loaded(value) => Some(value),
            CachedDoc::Unloaded => None,
        }
    }
}

/// Construction options for a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Logical base URI of the tree.
    pub root: Uri,
    /// Working directory for relative resolution.
    pub cwd: Uri,
    /// Document text encoding the store is declared to hold. Carried as
    /// configuration; backends that care read it via [`DocumentStore::encoding`].
    pub encoding: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            root: Uri::new(),
            cwd: Uri::new(),
            encoding: default_encoding(),
        }
    }
}

fn default_encoding() -> String {
    "utf8".to_string()
}

/// Cached document tree over an injected storage backend.
///
/// One logical thread of control per store: every cache-mutating
/// operation takes `&mut self`, and traversal suspends on backend I/O
/// one pull at a time. Callers needing concurrent access serialize per
/// instance.
pub struct DocumentStore {
    backend: Arc<dyn StorageBackend>,
    root: Uri,
    cwd: Uri,
    encoding: String,
    connected: bool,
    /// Set once the full tree under `root` has been enumerated.
    loaded: bool,
    data: BTreeMap<Uri, CachedDoc>,
    meta: BTreeMap<Uri, DocumentStat>,
    branches: Vec<DocumentStore>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("root", &self.root)
            .field("cwd", &self.cwd)
            .field("connected", &self.connected)
            .field("loaded", &self.loaded)
            .field("documents", &self.data.len())
            .field("branches", &self.branches.len())
            .finish()
    }
}

impl DocumentStore {
    /// Store with default options over the given backend.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    /// Store with explicit root, cwd, and encoding.
    pub fn with_options(backend: Arc<dyn StorageBackend>, options: StoreOptions) -> Self {
        let encoding = if options.encoding.is_empty() {
            default_encoding()
        } else {
            options.encoding
        };
        Self {
            backend,
            root: options.root,
            cwd: options.cwd,
            encoding,
            connected: false,
            loaded: false,
            data: BTreeMap::new(),
            meta: BTreeMap::new(),
            branches: Vec::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether the one-shot full enumeration has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Allow `find` to enumerate the tree again from scratch.
    pub fn reset_loaded(&mut self) {
        self.loaded = false;
    }

    /// Cache slot for a URI, if the URI is known.
    pub fn cached(&self, uri: &str) -> Option<&CachedDoc> {
        self.data.get(uri)
    }

    /// Cached metadata for a URI, if any.
    pub fn cached_stat(&self, uri: &str) -> Option<&DocumentStat> {
        self.meta.get(uri)
    }

    /// Every URI the store currently knows about, in key order.
    pub fn cached_uris(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// Attached sibling stores.
    pub fn branches(&self) -> &[DocumentStore] {
        &self.branches
    }

    pub(crate) fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.backend)
    }

    /// Check one access level with the backend gate, raising on denial.
    pub(crate) async fn ensure_level(
        &self,
        uri: &str,
        level: AccessLevel,
    ) -> Result<(), StoreError> {
        if self.backend.ensure_access(uri, level).await? {
            Ok(())
        } else {
            Err(StoreError::access_denied(uri, level))
        }
    }

    /// Record a child discovered by traversal. An already loaded value is
    /// kept as is, and its metadata is left alone so a newer in-cache
    /// mtime survives re-listing.
    pub(crate) fn record_listed(&mut self, uri: &str, stat: &DocumentStat) {
        let slot = self
            .data
            .entry(uri.to_string())
            .or_insert(CachedDoc::Unloaded);
        if !slot.is_loaded() {
            self.meta.insert(uri.to_string(), stat.clone());
        }
        trace!(uri = %uri, "recorded listed child");
    }

    /// Establish the backend connection. Idempotent; a backend that cannot
    /// connect leaves the store disconnected rather than erroring.
    pub async fn connect(&mut self) -> Result<bool, StoreError> {
        if self.connected {
            return Ok(true);
        }
        self.connected = self.backend.connect().await?;
        if self.connected {
            debug!(root = %self.root, "store connected");
        }
        Ok(self.connected)
    }

    /// Tear down the backend connection.
    pub async fn disconnect(&mut self) -> Result<(), StoreError> {
        if self.connected {
            self.backend.disconnect().await?;
            self.connected = false;
            debug!(root = %self.root, "store disconnected");
        }
        Ok(())
    }

    /// Connect if needed, then fail if the store is still disconnected.
    /// This is where a backend's inability to connect surfaces.
    pub async fn require_connected(&mut self) -> Result<(), StoreError> {
        if !self.connected {
            self.connect().await?;
        }
        if self.connected {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }

    /// Read a document, loading it through the backend on the first access.
    pub async fn get(&mut self, uri: &str) -> Result<Value, StoreError> {
        self.ensure_level(uri, AccessLevel::Read).await?;
        if let Some(CachedDoc::Loaded(value)) = self.data.get(uri) {
            return Ok(value.clone());
        }
        let value = self.backend.load_document(uri).await?;
        trace!(uri = %uri, "loaded document");
        self.data
            .insert(uri.to_string(), CachedDoc::Loaded(value.clone()));
        Ok(value)
    }

    /// Write a document into the cache and stamp its modify time, keeping
    /// any other cached metadata fields.
    pub async fn set(&mut self, uri: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_level(uri, AccessLevel::Write).await?;
        self.data.insert(uri.to_string(), CachedDoc::Loaded(value));
        let stat = self.meta.entry(uri.to_string()).or_default();
        stat.mtime_ms = Utc::now().timestamp_millis();
        Ok(())
    }

    /// Metadata for a URI, statted through the backend on the first access.
    pub async fn stat(&mut self, uri: &str) -> Result<DocumentStat, StoreError> {
        self.ensure_level(uri, AccessLevel::Read).await?;
        if let Some(stat) = self.meta.get(uri) {
            return Ok(stat.clone());
        }
        let stat = self.backend.stat_document(uri).await?;
        self.meta.insert(uri.to_string(), stat.clone());
        Ok(stat)
    }

    /// Persist every cached document whose cached modify time is strictly
    /// newer than the backend's, returning the URIs written. With a URI
    /// given, only that document is considered.
    pub async fn push(&mut self, uri: Option<&str>) -> Result<Vec<Uri>, StoreError> {
        let candidates: Vec<Uri> = match uri {
            Some(one) => vec![one.to_string()],
            None => self.data.keys().cloned().collect(),
        };
        let mut changed = Vec::new();
        for uri in candidates {
            self.ensure_level(&uri, AccessLevel::Write).await?;
            let value = match self.data.get(&uri) {
                Some(CachedDoc::Loaded(value)) => value.clone(),
                _ => continue,
            };
            let cached_mtime = self.meta.get(&uri).map(|s| s.mtime_ms).unwrap_or(0);
            let disk_mtime = match self.backend.stat_document(&uri).await {
                Ok(stat) => stat.mtime_ms,
                // Not on the backend yet counts as older than any cache.
                Err(e) if e.is_recoverable() => 0,
                Err(e) => return Err(e),
            };
            if cached_mtime > disk_mtime {
                self.backend.save_document(&uri, &value).await?;
                debug!(uri = %uri, "pushed document");
                changed.push(uri);
            }
        }
        Ok(changed)
    }

    /// Copy a document to a new URI through the backend. The source is
    /// read through the cache and left in place.
    pub async fn move_document(&mut self, from: &str, to: &str) -> Result<bool, StoreError> {
        self.ensure_level(to, AccessLevel::Write).await?;
        let value = self.get(from).await?;
        let saved = self.backend.save_document(to, &value).await?;
        debug!(from = %from, to = %to, "moved document");
        Ok(saved)
    }

    /// Remove a document from the backend and evict it from the caches.
    pub async fn delete(&mut self, uri: &str) -> Result<bool, StoreError> {
        self.ensure_level(uri, AccessLevel::Delete).await?;
        let dropped = self.backend.drop_document(uri).await?;
        if dropped {
            self.data.remove(uri);
            self.meta.remove(uri);
            debug!(uri = %uri, "deleted document");
        }
        Ok(dropped)
    }

    /// Register a sibling store. The branch is composed, not copied.
    pub fn attach(&mut self, store: DocumentStore) {
        self.branches.push(store);
    }

    /// Remove the first attached sibling matching the given store's root
    /// and cwd, returning it. `None` when nothing matches.
    pub fn detach(&mut self, store: &DocumentStore) -> Option<DocumentStore> {
        let position = self
            .branches
            .iter()
            .position(|branch| branch.root == store.root && branch.cwd == store.cwd)?;
        Some(self.branches.remove(position))
    }

    /// New disconnected store holding copies of the cache entries under
    /// `prefix + "/"`, with the prefix stripped and the root extended by
    /// it. The source store is left untouched.
    pub fn extract(&self, prefix: &str) -> DocumentStore {
        let needle = format!("{}/", prefix);
        let mut data = BTreeMap::new();
        for (key, value) in &self.data {
            if let Some(rest) = key.strip_prefix(&needle) {
                data.insert(rest.to_string(), value.clone());
            }
        }
        let mut meta = BTreeMap::new();
        for (key, stat) in &self.meta {
            if let Some(rest) = key.strip_prefix(&needle) {
                meta.insert(rest.to_string(), stat.clone());
            }
        }
        DocumentStore {
            backend: Arc::clone(&self.backend),
            root: self.backend.resolve(&[&self.root, prefix]),
            cwd: self.cwd.clone(),
            encoding: self.encoding.clone(),
            connected: false,
            loaded: false,
            data,
            meta,
            branches: Vec::new(),
        }
    }

    /// Walk the subtree rooted at a URI, depth 0 at its direct children.
    pub fn read_dir<'a>(&'a mut self, uri: &str, options: TraverseOptions) -> ReadDir<'a> {
        ReadDir::new(self, uri, 0, options)
    }

    /// Walk a subtree starting at an explicit depth annotation.
    pub fn read_branch<'a>(
        &'a mut self,
        uri: &str,
        depth: u32,
        options: TraverseOptions,
    ) -> ReadDir<'a> {
        ReadDir::new(self, uri, depth, options)
    }

    /// Stream the subtree rooted at a URI with cumulative progress
    /// snapshots.
    pub fn find_stream<'a>(&'a mut self, uri: &str, options: StreamOptions) -> FindStream<'a> {
        FindStream::new(self, uri, options)
    }

    /// Look up a literal URI against the fully enumerated tree. The first
    /// call walks the whole tree once; later calls answer from the cache.
    pub async fn find(&mut self, uri: &str) -> Result<Vec<Uri>, StoreError> {
        self.load_all().await?;
        if self.data.contains_key(uri) {
            Ok(vec![uri.to_string()])
        } else {
            Ok(Vec::new())
        }
    }

    /// Every cached URI matching a predicate over the URI and its cache
    /// slot, after ensuring the tree has been enumerated once.
    pub async fn find_where<F>(&mut self, predicate: F) -> Result<Vec<Uri>, StoreError>
    where
        F: Fn(&str, &CachedDoc) -> bool,
    {
        self.load_all().await?;
        Ok(self
            .data
            .iter()
            .filter(|(uri, doc)| predicate(uri, doc))
            .map(|(uri, _)| uri.clone())
            .collect())
    }

    /// One-shot full enumeration from the root. `loaded` flips only after
    /// the walk completes, so an abandoned or failed walk is retried.
    async fn load_all(&mut self) -> Result<(), StoreError> {
        self.require_connected().await?;
        if self.loaded {
            return Ok(());
        }
        let root = self.root.clone();
        let mut walk = ReadDir::new(self, &root, 0, TraverseOptions::default());
        while walk.next_entry().await?.is_some() {}
        self.loaded = true;
        debug!(root = %self.root, count = self.data.len(), "full tree enumerated");
        Ok(())
    }
}
