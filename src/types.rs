use crate::errors::DbError;
use bson::Document as BsonDocument;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of identifiers produced by [`DocumentId::generate`].
pub const AUTO_ID_LEN: usize = 20;

/// Identifier of a document within its collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random 20-character alphanumeric id, the same alphabet Firestore auto-IDs use.
    #[must_use]
    pub fn generate() -> Self {
        let id: String =
            rand::rng().sample_iter(&Alphanumeric).take(AUTO_ID_LEN).map(char::from).collect();
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads a document id out of a field value. Non-empty strings are used
    /// as is, integers by their decimal form; nothing else names a document.
    #[must_use]
    pub fn from_bson(v: &bson::Bson) -> Option<Self> {
        match v {
            bson::Bson::String(s) if !s.is_empty() => Some(Self(s.clone())),
            bson::Bson::Int32(i) => Some(Self(i.to_string())),
            bson::Bson::Int64(i) => Some(Self(i.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<DocumentId> for bson::Bson {
    fn from(id: DocumentId) -> Self {
        Self::String(id.0)
    }
}

/// Handle for an open store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Convert a `serde_json::Value` that must be an object into a `bson::Document`.
///
/// # Errors
/// Returns `InvalidArgument` when the value is not an object and `Bson` when a
/// value cannot be represented.
pub fn json_to_fields(val: &serde_json::Value) -> Result<BsonDocument, DbError> {
    let obj = val.as_object().ok_or_else(|| DbError::invalid("expected JSON object"))?;
    BsonDocument::try_from(obj.clone()).map_err(|e| DbError::Bson(e.to_string()))
}

/// Parse a JSON string into a `bson::Document`. The JSON must be a top-level object.
///
/// # Errors
/// Propagates JSON syntax errors and the errors of [`json_to_fields`].
pub fn parse_fields(json: &str) -> Result<BsonDocument, DbError> {
    let val: serde_json::Value = serde_json::from_str(json)?;
    json_to_fields(&val)
}

/// Parse a single JSON scalar/array into a field value.
///
/// # Errors
/// Propagates JSON syntax errors; fails with `Bson` for unrepresentable values.
pub fn parse_value(json: &str) -> Result<bson::Bson, DbError> {
    let val: serde_json::Value = serde_json::from_str(json)?;
    bson::Bson::try_from(val).map_err(|e| DbError::Bson(e.to_string()))
}
