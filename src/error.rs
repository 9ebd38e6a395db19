//! Error types for store operations and path reconstruction.

use crate::store::backend::AccessLevel;
use thiserror::Error;

/// Errors surfaced by store operations and traversal.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend access gate rejected the requested level for a URI.
    #[error("Access denied: {level} on {uri}")]
    AccessDenied { uri: String, level: AccessLevel },

    /// A required backend primitive was invoked on a backend that does not provide it.
    #[error("Operation not implemented by backend: {operation}")]
    NotImplemented { operation: String },

    /// The store could not establish a connection to its backend.
    #[error("Store is not connected")]
    NotConnected,

    /// Traversal or reconstruction observed a tree that contradicts itself.
    #[error("Structural inconsistency at {path}: {reason}")]
    StructuralInconsistency { path: String, reason: String },

    /// A backend primitive failed for one URI.
    #[error("Resource error for {uri}: {reason}")]
    Resource { uri: String, reason: String },

    /// Invalid runtime configuration, including logging setup.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StoreError {
    /// Build an access-denial error for a URI and level.
    pub fn access_denied(uri: impl Into<String>, level: AccessLevel) -> Self {
        StoreError::AccessDenied {
            uri: uri.into(),
            level,
        }
    }

    /// Build a not-implemented error for a named backend operation.
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        StoreError::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Build a structural-inconsistency error for a path.
    pub fn structural(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::StructuralInconsistency {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a resource error for a URI.
    pub fn resource(uri: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        StoreError::Resource {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// The path or URI this error refers to, when it carries one.
    pub fn path(&self) -> Option<&str> {
        match self {
            StoreError::AccessDenied { uri, .. } => Some(uri),
            StoreError::StructuralInconsistency { path, .. } => Some(path),
            StoreError::Resource { uri, .. } => Some(uri),
            StoreError::Codec(
                CodecError::ArrayIndexExpected { key, .. }
                | CodecError::ArrayIndexOutOfRange { key, .. },
            ) => Some(key),
            _ => None,
        }
    }

    /// Whether traversal may record this error per-entry and continue.
    ///
    /// Only resource errors are recoverable; everything else aborts the
    /// in-flight operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Resource { .. })
    }
}

/// Errors raised while reconstructing nested values from flat path maps.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A segment landed in an array container but does not parse as an
    /// array-wrapped index.
    #[error("Cannot reconstruct {key}: segment '{segment}' is not an array index")]
    ArrayIndexExpected { key: String, segment: String },

    /// An array-wrapped index exceeds the reconstruction bound.
    #[error("Cannot reconstruct {key}: array index '{segment}' is out of range")]
    ArrayIndexOutOfRange { key: String, segment: String },
}
