use super::core::Document;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};

/// Result of reading one document reference.
///
/// A snapshot always has an id; it only has data when the document exists.
/// An existing document with no fields is still `exists() == true`.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    id: DocumentId,
    document: Option<Document>,
    pub read_time: DateTime<Utc>,
}

impl DocumentSnapshot {
    #[must_use]
    pub fn found(document: Document) -> Self {
        Self { id: document.id.clone(), document: Some(document), read_time: Utc::now() }
    }

    #[must_use]
    pub fn missing(id: DocumentId) -> Self {
        Self { id, document: None, read_time: Utc::now() }
    }

    #[must_use]
    pub const fn id(&self) -> &DocumentId {
        &self.id
    }

    #[must_use]
    pub const fn exists(&self) -> bool {
        self.document.is_some()
    }

    #[must_use]
    pub fn data(&self) -> Option<&BsonDocument> {
        self.document.as_ref().map(|d| &d.data)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.data().and_then(|d| d.get(field))
    }

    #[must_use]
    pub const fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    #[must_use]
    pub fn into_document(self) -> Option<Document> {
        self.document
    }
}
