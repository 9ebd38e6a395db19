//! Tree traversal
//!
//! Pull-based walker over a store's subtree. Work items live on an
//! explicit stack so a consumer drives progress one entry at a time;
//! abandoning the walk mid-way is safe and leaves the caches partially
//! populated. Within one directory, child directories come out before
//! files, then each child directory's subtree follows depth-first.

use crate::document::{DocumentEntry, DocumentStat};
use crate::error::StoreError;
use crate::store::backend::{AccessLevel, ListOptions};
use crate::store::DocumentStore;
use crate::types::Uri;
use std::sync::Arc;
use tracing::trace;

/// Path predicate applied to the start URI and every resolved child path.
pub type TraverseFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Options for one walk.
#[derive(Clone, Default)]
pub struct TraverseOptions {
    /// Paths failing the filter are skipped along with their subtrees.
    pub filter: Option<TraverseFilter>,
    /// Do not recurse into symbolically linked directories. Their entries
    /// are still yielded.
    pub skip_symbolic_links: bool,
}

impl TraverseOptions {
    /// Options with just a filter set.
    pub fn with_filter(filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            filter: Some(Arc::new(filter)),
            skip_symbolic_links: false,
        }
    }

    fn accepts(&self, path: &str) -> bool {
        match &self.filter {
            Some(filter) => filter(path),
            None => true,
        }
    }
}

impl std::fmt::Debug for TraverseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraverseOptions")
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("skip_symbolic_links", &self.skip_symbolic_links)
            .finish()
    }
}

enum Work {
    /// Expand the subtree rooted at this URI.
    Visit { uri: Uri, depth: u32 },
    /// Hand this entry to the consumer.
    Emit(DocumentEntry),
}

/// Suspending walk over the subtree rooted at one URI.
///
/// Finite and not restartable: drive it with [`ReadDir::next_entry`] until
/// `None`, or drop it early.
pub struct ReadDir<'a> {
    store: &'a mut DocumentStore,
    options: TraverseOptions,
    stack: Vec<Work>,
}

impl<'a> ReadDir<'a> {
    pub(crate) fn new(
        store: &'a mut DocumentStore,
        uri: &str,
        depth: u32,
        options: TraverseOptions,
    ) -> Self {
        Self {
            store,
            options,
            stack: vec![Work::Visit {
                uri: uri.to_string(),
                depth,
            }],
        }
    }

    /// Next entry in traversal order, or `None` once the walk is done.
    ///
    /// Access denials and non-recoverable backend failures surface here
    /// and end the walk; per-entry stat errors ride along inside the
    /// entry's stat instead.
    pub async fn next_entry(&mut self) -> Result<Option<DocumentEntry>, StoreError> {
        loop {
            let work = match self.stack.pop() {
                Some(work) => work,
                None => return Ok(None),
            };
            match work {
                Work::Emit(entry) => return Ok(Some(entry)),
                Work::Visit { uri, depth } => self.visit(&uri, depth).await?,
            }
        }
    }

    /// Drain the walk into a vector.
    pub async fn collect(mut self) -> Result<Vec<DocumentEntry>, StoreError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn visit(&mut self, uri: &str, depth: u32) -> Result<(), StoreError> {
        self.store.ensure_level(uri, AccessLevel::Read).await?;
        if !self.options.accepts(uri) {
            return Ok(());
        }

        let stat = match self.store.stat(uri).await {
            Ok(stat) => stat,
            Err(e) if e.is_recoverable() => DocumentStat::with_error(e.to_string()),
            Err(e) => return Err(e),
        };

        if !stat.is_directory {
            self.store.record_listed(uri, &stat);
            self.stack
                .push(Work::Emit(DocumentEntry::new("", uri, "", depth, stat)));
            return Ok(());
        }

        let backend = self.store.backend();
        let list_options = ListOptions {
            depth,
            skip_stat: false,
            skip_symbolic_links: self.options.skip_symbolic_links,
        };
        let children = backend.list_dir(uri, &list_options).await?;
        trace!(uri = %uri, count = children.len(), "listed directory");

        let mut dir_entries = Vec::new();
        let mut file_entries = Vec::new();
        for child in children {
            let path = backend.resolve(&[uri, &child.name]);
            if !self.options.accepts(&path) {
                continue;
            }
            self.store.record_listed(&path, &child.stat);
            let entry = DocumentEntry::new(child.name, path, uri, depth, child.stat);
            if entry.stat.is_directory {
                dir_entries.push(entry);
            } else {
                file_entries.push(entry);
            }
        }

        // Pushed in reverse so the pop order is: directory entries in
        // listing order, then buffered files, then each directory's
        // subtree depth-first.
        for dir in dir_entries.iter().rev() {
            if self.options.skip_symbolic_links && dir.stat.is_symbolic_link {
                continue;
            }
            self.stack.push(Work::Visit {
                uri: dir.path.clone(),
                depth: depth + 1,
            });
        }
        for file in file_entries.into_iter().rev() {
            self.stack.push(Work::Emit(file));
        }
        for dir in dir_entries.into_iter().rev() {
            self.stack.push(Work::Emit(dir));
        }
        Ok(())
    }
}
