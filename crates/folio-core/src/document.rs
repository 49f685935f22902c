//! Schemaless documents
//!
//! A document is an opaque JSON object carrying two reserved fields:
//! `_id` (stable identifier) and `_rev` (revision token). `_rev` is never
//! persisted inside the stored bytes; it is derived on read from the
//! versionstamp of the document key, so the two can never disagree.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FolioError, Result};
use crate::version::Versionstamp;

/// Reserved field holding the document identifier
pub const ID_FIELD: &str = "_id";

/// Reserved field holding the revision token
pub const REV_FIELD: &str = "_rev";

/// A schemaless JSON document
///
/// Newtype around `serde_json::Map` providing reserved-field handling and
/// direct access to the underlying map via `Deref`/`DerefMut`.
///
/// # Examples
///
/// ```
/// use folio_core::Document;
/// use serde_json::json;
///
/// let doc = Document::from_value(json!({
///     "_id": "alice",
///     "type": "user",
///     "name": "Alice",
/// })).unwrap();
///
/// assert_eq!(doc.id(), Some("alice"));
/// assert_eq!(doc["name"], json!("Alice"));
/// assert!(doc.rev().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Document(Map::new())
    }

    /// Create a document from a JSON value
    ///
    /// Fails unless the value is a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Document(map)),
            other => Err(FolioError::serialization(format!(
                "document must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Consume the document, returning a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// The document identifier, if `_id` is present and a string
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// The revision token, if `_rev` is present and a string
    pub fn rev(&self) -> Option<&str> {
        self.0.get(REV_FIELD).and_then(Value::as_str)
    }

    /// True if the payload carries a `_rev` field of any shape
    pub fn has_rev(&self) -> bool {
        self.0.contains_key(REV_FIELD)
    }

    /// Overwrite `_id` with the stored key's identifier
    pub fn set_id(&mut self, id: &str) {
        self.0
            .insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    }

    /// Overwrite `_rev` with the key's versionstamp
    pub fn set_rev(&mut self, rev: &Versionstamp) {
        self.0
            .insert(REV_FIELD.to_string(), Value::String(rev.as_str().to_string()));
    }

    /// Remove any client-supplied `_rev` from the payload
    pub fn strip_rev(&mut self) {
        self.0.remove(REV_FIELD);
    }

    /// Serialize to compact JSON bytes for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(FolioError::from)
    }

    /// Deserialize from stored JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let map: Map<String, Value> = serde_json::from_slice(bytes)?;
        Ok(Document(map))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Deref for Document {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Document(map)
    }
}
