use super::{DocumentStore, SetOptions, StoreQuery};
use crate::document::DocumentSnapshot;
use crate::errors::DbError;
use crate::types::DocumentId;
use bson::Document as BsonDocument;

/// Handle on a named collection of a store.
pub struct CollectionRef<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    name: String,
}

impl<'a, S: DocumentStore + ?Sized> CollectionRef<'a, S> {
    pub fn new(store: &'a S, name: impl Into<String>) -> Self {
        Self { store, name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn document(&self, id: impl Into<DocumentId>) -> DocumentRef<'a, S> {
        DocumentRef { store: self.store, collection: self.name.clone(), id: id.into() }
    }

    /// Reference to a document under a freshly generated id. Nothing is written.
    #[must_use]
    pub fn new_document(&self) -> DocumentRef<'a, S> {
        let id = self.store.new_document_id(&self.name);
        DocumentRef { store: self.store, collection: self.name.clone(), id }
    }

    #[must_use]
    pub fn query(&self) -> StoreQuery {
        StoreQuery::new(self.name.clone())
    }

    pub fn documents(&self, query: &StoreQuery) -> Result<Vec<DocumentSnapshot>, DbError> {
        self.store.run_query(query)
    }
}

/// Handle on one document of a collection.
pub struct DocumentRef<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: String,
    id: DocumentId,
}

impl<S: DocumentStore + ?Sized> DocumentRef<'_, S> {
    #[must_use]
    pub const fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn snapshot(&self) -> Result<DocumentSnapshot, DbError> {
        self.store.get(&self.collection, &self.id)
    }

    pub fn set(&self, fields: BsonDocument) -> Result<(), DbError> {
        self.store.set(&self.collection, &self.id, fields, SetOptions::default())
    }

    pub fn set_merge(&self, fields: BsonDocument) -> Result<(), DbError> {
        self.store.set(&self.collection, &self.id, fields, SetOptions::merge())
    }

    pub fn delete(&self) -> Result<(), DbError> {
        self.store.delete(&self.collection, &self.id)
    }
}
