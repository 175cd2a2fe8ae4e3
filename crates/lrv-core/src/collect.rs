//! Rebuilds a JSON value from the current state of a tree index.
use serde_json::{Map, Value};

use crate::error::{Result, ReviewError};
use crate::matcher::PathMatcher;
use crate::path::FieldPath;
use crate::tree::TreeIndex;

pub struct TreeCollector<'a> {
    matcher: &'a PathMatcher,
    index: &'a TreeIndex,
}

impl<'a> TreeCollector<'a> {
    pub fn new(matcher: &'a PathMatcher, index: &'a TreeIndex) -> Self {
        Self { matcher, index }
    }

    /// Mirrors the build traversal over `original`.
    ///
    /// Excluded subtrees come back verbatim. Objects keep the original key
    /// set and order. Arrays take their length and elements from the list's
    /// current rows. Any leaf or list the index never bound is an error; no
    /// partial value is produced.
    pub fn collect(&self, original: &Value, path: &FieldPath) -> Result<Value> {
        if self.matcher.is_excluded(path) {
            return Ok(original.clone());
        }
        match original {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    out.insert(key.clone(), self.collect(child, &path.field(key))?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(_) => {
                let list = self
                    .index
                    .list(path)
                    .ok_or_else(|| ReviewError::UnboundPath(path.to_string()))?;
                let items = list
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(i, row)| self.collect(&row.value, &path.index(i)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => self
                .index
                .editor(path)
                .map(|e| e.value())
                .ok_or_else(|| ReviewError::UnboundPath(path.to_string())),
        }
    }
}
