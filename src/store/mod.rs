//! Document-store client contract and its in-process backend.
//!
//! The query builder only talks to [`DocumentStore`]. A network client for a
//! managed document database implements the same trait; [`MemoryStore`]
//! implements it in process with the same filter, ordering and cursor rules.

mod eval;
mod memory;
mod reference;

pub use eval::{compare_bson, compare_docs, eval_all, eval_predicate, project_fields};
pub use memory::{MemoryStore, StoreStats};
pub use reference::{CollectionRef, DocumentRef};

use crate::document::DocumentSnapshot;
use crate::errors::DbError;
use crate::query::{Predicate, SortSpec};
use crate::types::{DocumentId, TransactionId};
use bson::Document as BsonDocument;

/// Write mode for [`DocumentStore::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Overwrite only the supplied fields instead of replacing the document.
    pub merge: bool,
}

impl SetOptions {
    #[must_use]
    pub const fn merge() -> Self {
        Self { merge: true }
    }
}

/// A query as the store sees it: AND-ed filters, ordering, an optional
/// start-after cursor, a limit and a projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    pub collection: String,
    pub filters: Vec<Predicate>,
    pub order_by: Vec<SortSpec>,
    pub start_after: Option<DocumentSnapshot>,
    pub limit: Option<usize>,
    pub projection: Option<Vec<String>>,
}

impl StoreQuery {
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), ..Self::default() }
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    #[must_use]
    pub fn order_by(mut self, sort: SortSpec) -> Self {
        self.order_by.push(sort);
        self
    }

    #[must_use]
    pub fn start_after(mut self, snapshot: DocumentSnapshot) -> Self {
        self.start_after = Some(snapshot);
        self
    }

    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Operations the query layer needs from a document-store client.
///
/// Implementations own atomicity and id generation; callers never retry.
pub trait DocumentStore: Send + Sync {
    /// Fresh identifier for a new document in `collection`.
    fn new_document_id(&self, _collection: &str) -> DocumentId {
        DocumentId::generate()
    }

    fn get(&self, collection: &str, id: &DocumentId) -> Result<DocumentSnapshot, DbError>;

    fn set(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: BsonDocument,
        options: SetOptions,
    ) -> Result<(), DbError>;

    /// Deleting a document that does not exist succeeds.
    fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), DbError>;

    fn run_query(&self, query: &StoreQuery) -> Result<Vec<DocumentSnapshot>, DbError>;

    fn begin_transaction(&self) -> Result<TransactionId, DbError>;

    fn commit(&self, tx: TransactionId) -> Result<(), DbError>;

    fn rollback(&self, tx: TransactionId) -> Result<(), DbError>;
}
