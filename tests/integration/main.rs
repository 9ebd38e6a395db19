//! Integration tests for the doctree document store

mod codec_paths;
mod store_lifecycle;
mod streaming;
mod traversal;
