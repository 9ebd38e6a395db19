//! Document metadata and traversal entries
//!
//! Value types shared by the store and the traversal layers: a stat
//! snapshot for one URI and the per-node entry yielded while walking a
//! tree.

use crate::types::{EpochMillis, Uri};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata snapshot for one URI.
///
/// Timestamps are epoch milliseconds; kind flags are informative, not
/// exclusive. Backends that stat lazily resolve the flags before
/// construction. A failed stat is captured in `error` instead of aborting
/// the operation that requested it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStat {
    pub atime_ms: EpochMillis,
    pub birthtime_ms: EpochMillis,
    pub ctime_ms: EpochMillis,
    pub mtime_ms: EpochMillis,

    pub size: u64,
    pub block_size: u64,
    pub dev: u64,
    pub ino: u64,
    pub nlink: u64,

    pub is_directory: bool,
    pub is_file: bool,
    pub is_symbolic_link: bool,
    pub is_block_device: bool,
    pub is_fifo: bool,
    pub is_socket: bool,

    /// Error captured while obtaining this stat, if any.
    pub error: Option<String>,
}

impl DocumentStat {
    /// Stat for a directory with the given size and modify time.
    pub fn directory(size: u64, mtime_ms: EpochMillis) -> Self {
        Self {
            mtime_ms,
            ctime_ms: mtime_ms,
            size,
            block_size: 4096,
            nlink: 1,
            is_directory: true,
            ..Self::default()
        }
    }

    /// Stat for a regular file with the given size and modify time.
    pub fn file(size: u64, mtime_ms: EpochMillis) -> Self {
        Self {
            mtime_ms,
            ctime_ms: mtime_ms,
            size,
            block_size: 4096,
            nlink: 1,
            is_file: true,
            ..Self::default()
        }
    }

    /// Stat carrying a captured backend error, everything else zeroed.
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Loose existence heuristic: a non-zero block size or modify time was
    /// observed. Distinguishes "not found" and "not yet read" from "empty
    /// but present".
    pub fn exists(&self) -> bool {
        self.block_size > 0 || self.mtime_ms > 0
    }

    /// Access time as a UTC date, when representable.
    pub fn atime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.atime_ms)
    }

    /// Birth time as a UTC date, when representable.
    pub fn birthtime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.birthtime_ms)
    }

    /// Change time as a UTC date, when representable.
    pub fn ctime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ctime_ms)
    }

    /// Modify time as a UTC date, when representable.
    pub fn mtime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.mtime_ms)
    }
}

/// One tree node as seen by the traversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Leaf name. Derived from the last path segment when constructed empty.
    pub name: String,
    /// Full URI of the node.
    pub path: Uri,
    /// URI of the containing directory, empty at the traversal root.
    pub parent: Uri,
    /// 0 = direct child of the traversal root.
    pub depth: u32,
    pub stat: DocumentStat,
    /// Set by the streaming tracker once this directory's children are
    /// exhausted. Never set for files.
    pub fulfilled: bool,
}

impl DocumentEntry {
    /// Build an entry, deriving `name` from `path` when `name` is empty.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<Uri>,
        parent: impl Into<Uri>,
        depth: u32,
        stat: DocumentStat,
    ) -> Self {
        let path = path.into();
        let mut name = name.into();
        if name.is_empty() && !path.is_empty() {
            name = path.rsplit('/').next().unwrap_or_default().to_string();
        }
        Self {
            name,
            path,
            parent: parent.into(),
            depth,
            stat,
            fulfilled: false,
        }
    }
}
