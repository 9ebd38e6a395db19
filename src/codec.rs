//! Path codec
//!
//! Converts between nested values and single-level path-keyed maps.
//! Object keys are joined with a divider token; array indices are wrapped
//! in a bracket token pair. Pure functions, no dependency on the store.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bound on the backtracking search in [`PathCodec::find_value`].
///
/// Limits how many trailing segments may be popped while looking for the
/// nearest materialized ancestor, so malformed paths cannot walk forever.
pub const MAX_DEEP_UNFLATTEN: usize = 99;

/// Largest array index accepted while rebuilding a value.
///
/// Flat keys name indices directly and gaps are filled with nulls, so a
/// single oversized index would otherwise allocate the whole run up to it.
pub const MAX_ARRAY_INDEX: usize = 65_535;

/// Token configuration for path encoding, bound to a codec instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCodec {
    /// Divider between path segments (default: "/")
    #[serde(default = "default_divider")]
    pub divider: String,

    /// Opening and closing tokens wrapping an array index (default: "[", "]")
    #[serde(default = "default_wrapper")]
    pub wrapper: (String, String),
}

fn default_divider() -> String {
    "/".to_string()
}

fn default_wrapper() -> (String, String) {
    ("[".to_string(), "]".to_string())
}

impl Default for PathCodec {
    fn default() -> Self {
        Self {
            divider: default_divider(),
            wrapper: default_wrapper(),
        }
    }
}

impl PathCodec {
    /// Create a codec with explicit divider and array-wrapper tokens.
    pub fn new(
        divider: impl Into<String>,
        open: impl Into<String>,
        close: impl Into<String>,
    ) -> Self {
        Self {
            divider: divider.into(),
            wrapper: (open.into(), close.into()),
        }
    }

    /// Flatten a nested value into a path-keyed map of scalar leaves.
    ///
    /// Keys are visited in the value's own iteration order; the output map
    /// preserves first-visited order. Empty containers produce no keys.
    pub fn flatten(&self, value: &Value) -> Map<String, Value> {
        let mut flat = Map::new();
        self.flatten_into(value, String::new(), &mut flat);
        flat
    }

    fn flatten_into(&self, value: &Value, path: String, flat: &mut Map<String, Value>) {
        match value {
            Value::Object(fields) => {
                for (key, child) in fields {
                    self.flatten_into(child, self.join(&path, key), flat);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    let segment = self.index_segment(index);
                    self.flatten_into(child, self.join(&path, &segment), flat);
                }
            }
            scalar => {
                flat.insert(path, scalar.clone());
            }
        }
    }

    /// Rebuild a nested value from a flat path-keyed map.
    ///
    /// Container kind at each level is decided by looking ahead at the next
    /// segment: an array-wrapped index means the container is an array,
    /// anything else means an object. A non-index segment addressed into an
    /// array container is a reconstruction error, not a coercion.
    pub fn unflatten(&self, flat: &Map<String, Value>) -> Result<Value, CodecError> {
        let mut root = Value::Null;
        for (key, leaf) in flat {
            self.insert_path(&mut root, key, leaf.clone())?;
        }
        if root.is_null() {
            root = Value::Object(Map::new());
        }
        Ok(root)
    }

    fn insert_path(&self, root: &mut Value, key: &str, leaf: Value) -> Result<(), CodecError> {
        let segments: Vec<&str> = key.split(self.divider.as_str()).collect();
        let mut current = root;
        for window in 0..segments.len() {
            let segment = segments[window];
            if window + 1 == segments.len() {
                self.insert_leaf(current, segment, leaf, key)?;
                return Ok(());
            }
            let next_is_index = self.array_index(segments[window + 1]).is_some();
            current = self.descend(current, segment, next_is_index, key)?;
        }
        Ok(())
    }

    /// Address one segment within a container, creating the child container
    /// when the slot is vacant. A scalar in the way is replaced.
    fn descend<'a>(
        &self,
        container: &'a mut Value,
        segment: &str,
        next_is_index: bool,
        key: &str,
    ) -> Result<&'a mut Value, CodecError> {
        let vacant = || {
            if next_is_index {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            }
        };
        match container {
            Value::Array(items) => {
                let index = self.bounded_index(segment, key)?;
                if index >= items.len() {
                    items.resize(index + 1, Value::Null);
                }
                let slot = &mut items[index];
                if !slot.is_object() && !slot.is_array() {
                    *slot = vacant();
                }
                Ok(slot)
            }
            Value::Object(fields) => {
                let field = self.object_key(segment);
                let slot = fields.entry(field).or_insert_with(vacant);
                if !slot.is_object() && !slot.is_array() {
                    *slot = vacant();
                }
                Ok(slot)
            }
            other => {
                // The kind of this container is decided by the segment
                // addressed into it, same lookahead rule one level up.
                *other = if self.array_index(segment).is_some() {
                    Value::Array(Vec::new())
                } else {
                    Value::Object(Map::new())
                };
                self.descend(other, segment, next_is_index, key)
            }
        }
    }

    fn insert_leaf(
        &self,
        container: &mut Value,
        segment: &str,
        leaf: Value,
        key: &str,
    ) -> Result<(), CodecError> {
        match container {
            Value::Array(items) => {
                let index = self.bounded_index(segment, key)?;
                if index >= items.len() {
                    items.resize(index + 1, Value::Null);
                }
                items[index] = leaf;
            }
            Value::Object(fields) => {
                fields.insert(self.object_key(segment), leaf);
            }
            other => {
                *other = if self.array_index(segment).is_some() {
                    Value::Array(Vec::new())
                } else {
                    Value::Object(Map::new())
                };
                return self.insert_leaf(other, segment, leaf, key);
            }
        }
        Ok(())
    }

    /// Look up a divider-joined path inside a value.
    ///
    /// Returns `None` as soon as a segment is missing or the accumulator is
    /// not a container. The result may itself be a container when the path
    /// under-specifies.
    pub fn find<'a>(&self, path: &str, value: &'a Value) -> Option<&'a Value> {
        let segments: Vec<&str> = path.split(self.divider.as_str()).collect();
        self.find_segments(&segments, value)
    }

    /// Look up a pre-split path inside a value.
    pub fn find_segments<'a>(&self, segments: &[&str], value: &'a Value) -> Option<&'a Value> {
        let mut current = value;
        for segment in segments {
            current = match current {
                Value::Object(fields) => match self.array_index(segment) {
                    Some(index) => fields.get(&index.to_string())?,
                    None => fields.get(*segment)?,
                },
                Value::Array(items) => items.get(self.array_index(segment)?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Look up a path, retrying with progressively shorter prefixes.
    ///
    /// Pops the last segment until a value is found, the path is exhausted,
    /// or [`MAX_DEEP_UNFLATTEN`] attempts have been made. With `skip_scalar`
    /// set, scalar hits count as misses and the search keeps shortening.
    /// Returns the value together with the prefix that produced it.
    pub fn find_value<'a>(
        &self,
        path: &str,
        value: &'a Value,
        skip_scalar: bool,
    ) -> Option<(&'a Value, Vec<String>)> {
        let mut segments: Vec<&str> = path.split(self.divider.as_str()).collect();
        for _ in 0..=MAX_DEEP_UNFLATTEN {
            if let Some(found) = self.find_segments(&segments, value) {
                let scalar = !found.is_object() && !found.is_array();
                if !(skip_scalar && scalar) {
                    let prefix = segments.iter().map(|s| s.to_string()).collect();
                    return Some((found, prefix));
                }
            }
            if segments.is_empty() {
                return None;
            }
            segments.pop();
        }
        None
    }

    fn join(&self, path: &str, segment: &str) -> String {
        if path.is_empty() {
            segment.to_string()
        } else {
            format!("{}{}{}", path, self.divider, segment)
        }
    }

    fn index_segment(&self, index: usize) -> String {
        format!("{}{}{}", self.wrapper.0, index, self.wrapper.1)
    }

    /// Parse a segment as an array-wrapped index, e.g. `[3]` with default
    /// tokens. Digits only, no sign, no whitespace.
    fn array_index(&self, segment: &str) -> Option<usize> {
        let inner = segment
            .strip_prefix(self.wrapper.0.as_str())?
            .strip_suffix(self.wrapper.1.as_str())?;
        if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        inner.parse().ok()
    }

    /// Parse a segment addressed into an array container, enforcing
    /// [`MAX_ARRAY_INDEX`] so the gap-filling resize stays bounded.
    fn bounded_index(&self, segment: &str, key: &str) -> Result<usize, CodecError> {
        let index =
            self.array_index(segment)
                .ok_or_else(|| CodecError::ArrayIndexExpected {
                    key: key.to_string(),
                    segment: segment.to_string(),
                })?;
        if index > MAX_ARRAY_INDEX {
            return Err(CodecError::ArrayIndexOutOfRange {
                key: key.to_string(),
                segment: segment.to_string(),
            });
        }
        Ok(index)
    }

    /// Object field name for a segment. Index-pattern segments address the
    /// numeric field name, matching how flattened indices read back out of
    /// plain objects.
    fn object_key(&self, segment: &str) -> String {
        match self.array_index(segment) {
            Some(index) => index.to_string(),
            None => segment.to_string(),
        }
    }
}

/// Deep-merge `source` into a copy of `target`.
///
/// Array values in `source` replace the target value wholesale; object
/// values merge recursively against the existing value, or an empty object
/// when absent or non-object; scalars overwrite. `target` is never mutated.
pub fn merge(target: &Value, source: &Value) -> Value {
    match (target, source) {
        (Value::Object(existing), Value::Object(incoming)) => {
            let mut out = existing.clone();
            for (key, value) in incoming {
                let merged = match value {
                    Value::Array(_) => value.clone(),
                    Value::Object(_) => {
                        let base = out.get(key).cloned().unwrap_or(Value::Object(Map::new()));
                        merge(&base, value)
                    }
                    scalar => scalar.clone(),
                };
                out.insert(key.clone(), merged);
            }
            Value::Object(out)
        }
        _ => source.clone(),
    }
}

/// Flatten with the default codec tokens.
pub fn flatten(value: &Value) -> Map<String, Value> {
    PathCodec::default().flatten(value)
}

/// Unflatten with the default codec tokens.
pub fn unflatten(flat: &Map<String, Value>) -> Result<Value, CodecError> {
    PathCodec::default().unflatten(flat)
}

/// Path lookup with the default codec tokens.
pub fn find<'a>(path: &str, value: &'a Value) -> Option<&'a Value> {
    PathCodec::default().find(path, value)
}

/// Shortening path lookup with the default codec tokens.
pub fn find_value<'a>(
    path: &str,
    value: &'a Value,
    skip_scalar: bool,
) -> Option<(&'a Value, Vec<String>)> {
    PathCodec::default().find_value(path, value, skip_scalar)
}
