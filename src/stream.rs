//! Streaming traversal with progress
//!
//! Wraps the tree walker and folds its entries into cumulative snapshots:
//! a sorted list of everything seen, directory maps, captured stat errors,
//! running size totals, and a completion ratio derived from directory
//! fulfillment. One snapshot per walked document.

use crate::document::DocumentEntry;
use crate::error::StoreError;
use crate::store::DocumentStore;
use crate::traverse::{ReadDir, TraverseOptions};
use crate::types::Uri;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Sort key for the cumulative entry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    Name,
    Mtime,
    Size,
}

/// Sort direction for the cumulative entry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Options for one streaming traversal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    pub sort_key: SortKey,
    pub order: SortOrder,
    /// Stop after this many snapshots, inclusive.
    pub limit: Option<usize>,
}

/// Running byte totals, directories and files kept apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalSize {
    pub dirs: u64,
    pub files: u64,
}

/// Cumulative snapshot emitted per walked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// The entry this snapshot was emitted for.
    pub file: DocumentEntry,
    /// Every entry seen so far, in the configured sort order.
    pub files: Vec<DocumentEntry>,
    /// Every directory seen so far, keyed by full path.
    pub dirs: BTreeMap<Uri, DocumentEntry>,
    /// Directories seen at depth 0, keyed by name.
    pub top: BTreeMap<String, DocumentEntry>,
    /// First captured stat error per path.
    pub errors: BTreeMap<Uri, String>,
    /// Completion ratio in [0, 1].
    pub progress: f64,
    pub total_size: TotalSize,
}

/// Folds walked entries into cumulative snapshots.
#[derive(Debug, Default)]
struct ProgressTracker {
    sort_key: SortKey,
    order: SortOrder,
    entries: Vec<DocumentEntry>,
    fulfilled: BTreeSet<Uri>,
    errors: BTreeMap<Uri, String>,
    total_size: TotalSize,
    previous_parent: Option<Uri>,
}

impl ProgressTracker {
    fn new(sort_key: SortKey, order: SortOrder) -> Self {
        Self {
            sort_key,
            order,
            ..Self::default()
        }
    }

    /// Fold one walked entry and build its snapshot. `at_end` means the
    /// walk has no further entries, which completes every directory seen.
    fn observe(
        &mut self,
        entry: DocumentEntry,
        at_end: bool,
    ) -> Result<StreamEntry, StoreError> {
        self.guard_parent_order(&entry)?;

        if let Some(previous) = self.previous_parent.take() {
            if previous != entry.parent {
                self.mark_fulfilled(&previous);
            }
        }
        self.previous_parent = Some(entry.parent.clone());

        if let Some(error) = &entry.stat.error {
            self.errors
                .entry(entry.path.clone())
                .or_insert_with(|| error.clone());
        }
        if entry.stat.is_directory {
            self.total_size.dirs += entry.stat.size;
        } else {
            self.total_size.files += entry.stat.size;
        }
        self.entries.push(entry.clone());

        if at_end {
            let all: Vec<Uri> = self
                .entries
                .iter()
                .filter(|e| e.stat.is_directory)
                .map(|e| e.path.clone())
                .collect();
            self.fulfilled.extend(all);
        }

        self.sort_entries();
        Ok(self.snapshot(&entry))
    }

    /// A file below the first level must sit under a directory the walk
    /// has already reported; anything else means the feed violated
    /// parent-before-child order.
    fn guard_parent_order(&self, entry: &DocumentEntry) -> Result<(), StoreError> {
        if entry.stat.is_directory || entry.depth == 0 {
            return Ok(());
        }
        let known = self
            .entries
            .iter()
            .any(|e| e.stat.is_directory && e.path == entry.parent);
        if known {
            Ok(())
        } else {
            Err(StoreError::structural(
                entry.path.clone(),
                format!("parent directory {} was never observed", entry.parent),
            ))
        }
    }

    /// Mark one directory fulfilled, then try to complete its top-level
    /// ancestor: a name-prefix match over all nested directories, every
    /// one of which must already be fulfilled.
    fn mark_fulfilled(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        let depth = match self
            .entries
            .iter()
            .find(|e| e.stat.is_directory && e.path == path)
        {
            Some(dir) => dir.depth,
            None => return,
        };
        self.fulfilled.insert(path.to_string());
        trace!(path = %path, "directory fulfilled");
        if depth == 0 {
            return;
        }

        let tops: Vec<(String, Uri)> = self
            .entries
            .iter()
            .filter(|e| e.stat.is_directory && e.depth == 0)
            .map(|e| (e.name.clone(), e.path.clone()))
            .collect();
        for (name, top_path) in tops {
            if !path.starts_with(&name) {
                continue;
            }
            let nested_all_fulfilled = self
                .entries
                .iter()
                .filter(|e| {
                    e.stat.is_directory && e.path != top_path && e.path.starts_with(&name)
                })
                .all(|e| self.fulfilled.contains(&e.path));
            if nested_all_fulfilled {
                self.fulfilled.insert(top_path);
            }
        }
    }

    fn sort_entries(&mut self) {
        let key = self.sort_key;
        let order = self.order;
        self.entries.sort_by(|a, b| {
            let ordering = match key {
                SortKey::Name => a.name.cmp(&b.name),
                SortKey::Mtime => a.stat.mtime_ms.cmp(&b.stat.mtime_ms),
                SortKey::Size => a.stat.size.cmp(&b.stat.size),
            };
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    /// Completion ratio for the entry being emitted. Below depth 0 a
    /// top-level ratio is computed first; the overall directory ratio runs
    /// for every entry and always wins. Consumers rely on the overwrite,
    /// so the ratios only diverge observably in the trace log.
    fn progress_for(&self, depth: u32) -> f64 {
        let total_dirs = self
            .entries
            .iter()
            .filter(|e| e.stat.is_directory)
            .count();
        let fulfilled_dirs = self
            .entries
            .iter()
            .filter(|e| e.stat.is_directory && self.fulfilled.contains(&e.path))
            .count();
        let overall = ratio(fulfilled_dirs, total_dirs);

        if depth > 0 {
            let total_top = self
                .entries
                .iter()
                .filter(|e| e.stat.is_directory && e.depth == 0)
                .count();
            let fulfilled_top = self
                .entries
                .iter()
                .filter(|e| {
                    e.stat.is_directory && e.depth == 0 && self.fulfilled.contains(&e.path)
                })
                .count();
            let top = ratio(fulfilled_top, total_top);
            if (top - overall).abs() > f64::EPSILON {
                trace!(top, overall, "progress ratios diverge, overall wins");
            }
        }
        overall
    }

    fn snapshot(&self, current: &DocumentEntry) -> StreamEntry {
        let mut files = Vec::with_capacity(self.entries.len());
        let mut dirs = BTreeMap::new();
        let mut top = BTreeMap::new();
        for entry in &self.entries {
            let mut entry = entry.clone();
            if entry.stat.is_directory {
                entry.fulfilled = self.fulfilled.contains(&entry.path);
                dirs.insert(entry.path.clone(), entry.clone());
                if entry.depth == 0 {
                    top.insert(entry.name.clone(), entry.clone());
                }
            }
            files.push(entry);
        }
        let mut file = current.clone();
        if file.stat.is_directory {
            file.fulfilled = self.fulfilled.contains(&file.path);
        }
        StreamEntry {
            progress: self.progress_for(file.depth),
            file,
            files,
            dirs,
            top,
            errors: self.errors.clone(),
            total_size: self.total_size.clone(),
        }
    }
}

fn ratio(fulfilled: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        fulfilled as f64 / total as f64
    }
}

/// Suspending stream of cumulative snapshots over a subtree.
///
/// Finite and not restartable. One entry of lookahead detects the end of
/// the walk, so the final snapshot reports every directory fulfilled. A
/// stop forced by `limit` completes nothing.
pub struct FindStream<'a> {
    walk: ReadDir<'a>,
    tracker: ProgressTracker,
    limit: Option<usize>,
    yielded: usize,
    lookahead: Option<DocumentEntry>,
    pending_error: Option<StoreError>,
    finished: bool,
}

impl<'a> FindStream<'a> {
    pub(crate) fn new(store: &'a mut DocumentStore, uri: &str, options: StreamOptions) -> Self {
        Self {
            walk: ReadDir::new(store, uri, 0, TraverseOptions::default()),
            tracker: ProgressTracker::new(options.sort_key, options.order),
            limit: options.limit,
            yielded: 0,
            lookahead: None,
            pending_error: None,
            finished: false,
        }
    }

    /// Next snapshot, or `None` once the walk (or the limit) is exhausted.
    pub async fn next_snapshot(&mut self) -> Result<Option<StreamEntry>, StoreError> {
        if self.finished {
            return Ok(None);
        }
        if let Some(error) = self.pending_error.take() {
            self.finished = true;
            return Err(error);
        }
        if self.limit.map_or(false, |limit| self.yielded >= limit) {
            self.finished = true;
            return Ok(None);
        }

        let current = match self.lookahead.take() {
            Some(entry) => entry,
            None => match self.walk.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(error) => {
                    self.finished = true;
                    return Err(error);
                }
            },
        };

        // One entry of lookahead; a failure here is delivered on the next
        // pull so the current snapshot is not lost.
        match self.walk.next_entry().await {
            Ok(next) => self.lookahead = next,
            Err(error) => {
                self.lookahead = None;
                self.pending_error = Some(error);
            }
        }
        let at_end = self.lookahead.is_none() && self.pending_error.is_none();

        let snapshot = match self.tracker.observe(current, at_end) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                self.finished = true;
                return Err(error);
            }
        };
        self.yielded += 1;
        if at_end {
            self.finished = true;
        }
        Ok(Some(snapshot))
    }

    /// Drain the stream into a vector of snapshots.
    pub async fn collect(mut self) -> Result<Vec<StreamEntry>, StoreError> {
        let mut snapshots = Vec::new();
        while let Some(snapshot) = self.next_snapshot().await? {
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    /// Adapt the pull loop to a standard `Stream` of snapshots.
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEntry, StoreError>> + 'a {
        stream::try_unfold(self, |mut source| async move {
            Ok(source
                .next_snapshot()
                .await?
                .map(|snapshot| (snapshot, source)))
        })
    }
}
