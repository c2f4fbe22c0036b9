//! Typed records on top of the query builder.
//!
//! A [`Model`] is any serde type bound to a collection. [`Record`] tracks
//! whether it was loaded from the store and which fields changed since, so
//! `save` can insert or merge-write only the dirty fields.

use bson::{Bson, Document as BsonDocument};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::connection::Connection;
use crate::errors::DbError;
use crate::query::QueryBuilder;
use crate::store::DocumentStore;
use crate::types::{DocumentId, json_to_fields};

pub trait Model: Serialize + DeserializeOwned {
    /// Collection name before the connection prefix is applied.
    const COLLECTION: &'static str;
    /// Field holding the document id.
    const KEY: &'static str = crate::query::DEFAULT_KEY;
}

/// Callbacks around [`Record::save`]. `creating`/`updating` may change the
/// model or veto the write by returning an error.
pub trait ModelHooks<M> {
    fn creating(&self, _model: &mut M) -> Result<(), DbError> {
        Ok(())
    }
    fn created(&self, _model: &M) {}
    fn updating(&self, _model: &mut M) -> Result<(), DbError> {
        Ok(())
    }
    fn updated(&self, _model: &M) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<M> ModelHooks<M> for NoHooks {}

fn to_fields<M: Serialize>(model: &M) -> Result<BsonDocument, DbError> {
    json_to_fields(&serde_json::to_value(model)?)
}

fn from_fields<M: DeserializeOwned>(fields: BsonDocument) -> Result<M, DbError> {
    Ok(serde_json::from_value(Bson::Document(fields).into_relaxed_extjson())?)
}

fn query<M: Model, S: DocumentStore + ?Sized>(conn: &Connection<S>) -> QueryBuilder<S> {
    conn.table_with_key(M::COLLECTION, M::KEY)
}

#[derive(Debug, Clone)]
pub struct Record<M> {
    pub model: M,
    exists: bool,
    original: BsonDocument,
}

impl<M: Model> Record<M> {
    /// A record not yet written.
    pub fn new(model: M) -> Self {
        Self { model, exists: false, original: BsonDocument::new() }
    }

    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    /// Id held in the model's key field, if any.
    ///
    /// # Errors
    /// Serialization failures.
    pub fn key(&self) -> Result<Option<DocumentId>, DbError> {
        Ok(to_fields(&self.model)?.get(M::KEY).and_then(DocumentId::from_bson))
    }

    /// Fields added or changed since the record was loaded or last saved.
    /// Fields the model no longer serializes come back as `Null`, so a merge
    /// write clears them.
    ///
    /// # Errors
    /// Serialization failures.
    pub fn dirty(&self) -> Result<BsonDocument, DbError> {
        let current = to_fields(&self.model)?;
        let mut out: BsonDocument = self
            .original
            .keys()
            .filter(|k| !current.contains_key(k.as_str()) && k.as_str() != M::KEY)
            .filter(|k| !matches!(self.original.get(k.as_str()), Some(Bson::Null)))
            .map(|k| (k.clone(), Bson::Null))
            .collect();
        for (k, v) in current {
            if self.original.get(&k) != Some(&v) {
                out.insert(k, v);
            }
        }
        Ok(out)
    }

    /// Inserts a new record or merge-writes the dirty fields of an existing
    /// one. Returns `false` when there was nothing to write.
    ///
    /// # Errors
    /// Hook vetoes, a stored record without a key, serialization and store
    /// failures.
    pub fn save<S: DocumentStore + ?Sized>(
        &mut self,
        conn: &Connection<S>,
        hooks: &dyn ModelHooks<M>,
    ) -> Result<bool, DbError> {
        if !self.exists {
            hooks.creating(&mut self.model)?;
            let mut fields = to_fields(&self.model)?;
            let id = query::<M, S>(conn).insert(fields.clone())?;
            if fields.get(M::KEY).and_then(DocumentId::from_bson).is_none() {
                fields.insert(M::KEY, id);
                self.model = from_fields(fields.clone())?;
            }
            self.original = fields;
            self.exists = true;
            hooks.created(&self.model);
            return Ok(true);
        }

        if self.dirty()?.is_empty() {
            return Ok(false);
        }
        hooks.updating(&mut self.model)?;
        let dirty = self.dirty()?;
        let id = self.key()?.ok_or_else(|| {
            DbError::invalid(format!("{} record has no {} value", M::COLLECTION, M::KEY))
        })?;
        query::<M, S>(conn).where_eq(M::KEY, id)?.update(dirty)?;
        self.original = to_fields(&self.model)?;
        hooks.updated(&self.model);
        Ok(true)
    }

    /// Loads the record stored under `id`.
    ///
    /// # Errors
    /// `NotFound` when there is none; deserialization and store failures.
    pub fn find_or_fail<S: DocumentStore + ?Sized>(
        conn: &Connection<S>,
        id: impl Into<DocumentId>,
    ) -> Result<Self, DbError> {
        let fields = query::<M, S>(conn).find(id)?.into_fields();
        Ok(Self { model: from_fields(fields.clone())?, exists: true, original: fields })
    }

    /// Deletes the stored record. The in-memory model is kept.
    ///
    /// # Errors
    /// `InvalidArgument` when the model has no key; store failures.
    pub fn delete<S: DocumentStore + ?Sized>(&mut self, conn: &Connection<S>) -> Result<(), DbError> {
        let id = self.key()?;
        query::<M, S>(conn).delete(id)?;
        self.exists = false;
        self.original = BsonDocument::new();
        Ok(())
    }
}
