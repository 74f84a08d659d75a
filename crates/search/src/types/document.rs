//! Engine-agnostic document handle.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// One indexed record as returned by `get` or `search`.
///
/// The source is kept as the raw bytes the engine returned; decode it into a
/// typed value with [`Document::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id.
    pub id: String,
    /// Owning index.
    pub index: String,
    /// Raw JSON source bytes.
    pub source: Vec<u8>,
    /// Engine version counter, where the engine has one.
    pub version: Option<i64>,
    /// Relevance score, where the engine reports one.
    pub score: Option<f64>,
    /// Highlighted fragments per field.
    pub highlight: Option<HashMap<String, Vec<String>>>,
    /// Sort values of this hit, usable as a `search_after` cursor.
    pub sort: Option<Vec<Value>>,
}

impl Document {
    /// Creates a document with only id, index, and source set.
    pub fn new(index: impl Into<String>, id: impl Into<String>, source: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            index: index.into(),
            source,
            version: None,
            score: None,
            highlight: None,
            sort: None,
        }
    }

    /// Decodes the source into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.source).map_err(|e| {
            ClientError::serialization(format!(
                "failed to decode document {}/{}: {}",
                self.index, self.id, e
            ))
        })
    }

    /// Parses the source as generic JSON.
    pub fn source_json(&self) -> ClientResult<Value> {
        self.decode()
    }

    /// Returns the source as UTF-8 text.
    pub fn source_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.source).ok()
    }
}
