//! Core types for the document tree engine.

/// Uri: logical path-like key identifying a document within a store
pub type Uri = String;

/// EpochMillis: milliseconds since the Unix epoch
pub type EpochMillis = i64;
