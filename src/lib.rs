//! Doctree: Storage-Agnostic Document Trees
//!
//! Cached document stores over pluggable storage backends, with recursive
//! traversal, progress-reporting streams, and a flat-path codec for nested
//! values.

pub mod codec;
pub mod document;
pub mod error;
pub mod logging;
pub mod store;
pub mod stream;
pub mod traverse;
pub mod types;
