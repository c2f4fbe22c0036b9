use std::sync::Arc;
use std::time::Instant;

use bson::{Bson, Document as BsonDocument};

use super::cursor::Cursor;
use super::types::{Operator, Order, Predicate, SortSpec, WhereClause};
use crate::document::Document;
use crate::errors::DbError;
use crate::logger::AUDIT_TARGET;
use crate::store::{CollectionRef, DocumentStore, StoreQuery};
use crate::types::DocumentId;
use crate::utils::devlog;

pub const DEFAULT_KEY: &str = "id";

/// Builds a query against one collection and runs it against a store.
///
/// Every builder call returns a new builder; terminal calls (`get`, `count`,
/// `insert`, `paginate`, ...) consume it. Clone a builder to branch it.
pub struct QueryBuilder<S: DocumentStore + ?Sized> {
    pub(super) store: Arc<S>,
    pub(super) collection: String,
    pub(super) key_name: String,
    filters: Vec<Predicate>,
    wheres: Vec<WhereClause>,
    order_by: Vec<SortSpec>,
    limit: Option<usize>,
    projection: Option<Vec<String>>,
}

impl<S: DocumentStore + ?Sized> Clone for QueryBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            key_name: self.key_name.clone(),
            filters: self.filters.clone(),
            wheres: self.wheres.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            projection: self.projection.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> std::fmt::Debug for QueryBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("collection", &self.collection)
            .field("key_name", &self.key_name)
            .field("filters", &self.filters)
            .field("wheres", &self.wheres)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("projection", &self.projection)
            .finish_non_exhaustive()
    }
}

impl<S: DocumentStore + ?Sized> QueryBuilder<S> {
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            key_name: DEFAULT_KEY.to_string(),
            filters: Vec::new(),
            wheres: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            projection: None,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key_name
    }

    #[must_use]
    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    /// Field holding the primary key (`"id"` unless changed).
    #[must_use]
    pub fn key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = name.into();
        self
    }

    /// Adds `field <op> value`. `=` is sent as `==`.
    ///
    /// # Errors
    /// `InvalidArgument` for operators the store does not support, and for
    /// list operators (`in`, `not-in`, `array-contains-any`) given a
    /// non-array or empty operand.
    pub fn where_op(
        mut self,
        field: impl Into<String>,
        op: &str,
        value: impl Into<Bson>,
    ) -> Result<Self, DbError> {
        let operator = Operator::parse(op)?;
        let predicate = Predicate::new(field, operator, value);
        if operator.takes_list() {
            match &predicate.value {
                Bson::Array(values) if values.is_empty() => {
                    return Err(DbError::invalid(format!(
                        "'{operator}' on {} needs at least one value",
                        predicate.field
                    )));
                }
                Bson::Array(_) => {}
                other => {
                    return Err(DbError::invalid(format!(
                        "'{operator}' on {} needs an array operand, got {other}",
                        predicate.field
                    )));
                }
            }
        }
        if let (Operator::In, Bson::Array(values)) = (operator, &predicate.value) {
            self.wheres.push(WhereClause::In {
                field: predicate.field.clone(),
                values: values.clone(),
            });
        } else {
            self.wheres.push(WhereClause::Basic(predicate.clone()));
        }
        self.filters.push(predicate);
        Ok(self)
    }

    /// Shorthand for `where_op(field, "==", value)`.
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Result<Self, DbError> {
        self.where_op(field, "==", value)
    }

    /// One equality clause per entry, in entry order.
    pub fn where_all(mut self, fields: BsonDocument) -> Result<Self, DbError> {
        for (field, value) in fields {
            self = self.where_eq(field, value)?;
        }
        Ok(self)
    }

    /// Adds `field in [values]`.
    ///
    /// # Errors
    /// `InvalidArgument` when `values` is empty.
    pub fn where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Result<Self, DbError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let field = field.into();
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(DbError::invalid(format!("where_in on {field} needs at least one value")));
        }
        self.filters.push(Predicate::new(field.clone(), Operator::In, values.clone()));
        self.wheres.push(WhereClause::In { field, values });
        Ok(self)
    }

    /// Negated where-in requests are not supported; use `where_op(field, "not-in", ...)`
    /// for the store's own operator.
    ///
    /// # Errors
    /// Always `InvalidArgument`.
    pub fn where_not_in<I, V>(self, field: impl Into<String>, _values: I) -> Result<Self, DbError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Err(DbError::invalid(format!(
            "the document store does not support \"where not in\" queries (field {})",
            field.into()
        )))
    }

    /// Builds a group on a fresh builder for the same collection and merges
    /// its clauses into this one. Groups are AND-ed like every other clause.
    pub fn where_nested<F>(mut self, build: F) -> Result<Self, DbError>
    where
        F: FnOnce(Self) -> Result<Self, DbError>,
    {
        let fresh =
            Self::new(Arc::clone(&self.store), self.collection.clone()).key_name(self.key_name.clone());
        let group = build(fresh)?;
        self.filters.extend(group.filters);
        self.wheres.push(WhereClause::Nested(group.wheres));
        Ok(self)
    }

    /// Equality constraints that narrow the query without counting as where
    /// clauses; they never name documents for `update` or `delete`.
    #[must_use]
    pub fn scope(mut self, fields: BsonDocument) -> Self {
        for (field, value) in fields {
            self.filters.push(Predicate::new(field, Operator::Equal, value));
        }
        self
    }

    #[must_use]
    pub fn select<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.projection = if fields.is_empty() || fields.iter().any(|f| f == "*") {
            None
        } else {
            Some(fields)
        };
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push(SortSpec { field: field.into(), order });
        self
    }

    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// The query this builder would send.
    #[must_use]
    pub fn to_store_query(&self) -> StoreQuery {
        StoreQuery {
            collection: self.collection.clone(),
            filters: self.filters.clone(),
            order_by: self.order_by.clone(),
            start_after: None,
            limit: self.limit,
            projection: self.projection.clone(),
        }
    }

    /// Document ids named by `key == value` and `key in [...]` clauses,
    /// nested groups included, first occurrence order, no duplicates.
    #[must_use]
    pub fn identifiers(&self) -> Vec<DocumentId> {
        let mut out = Vec::new();
        collect_ids(&self.wheres, &self.key_name, &mut out);
        out
    }

    pub(super) fn run(&self, op: &str, query: &StoreQuery) -> Result<Cursor, DbError> {
        let started = Instant::now();
        log::debug!(
            "{op} {}: [{}] order={:?} limit={:?}",
            query.collection,
            query.filters.iter().map(ToString::to_string).collect::<Vec<_>>().join(" AND "),
            query.order_by,
            query.limit
        );
        let snapshots = self.store.run_query(query)?;
        devlog::bench(op, &query.collection, started, snapshots.len());
        Ok(Cursor::new(snapshots))
    }

    /// Runs the query and yields existing documents lazily.
    pub fn cursor(self) -> Result<Cursor, DbError> {
        let q = self.to_store_query();
        self.run("get", &q)
    }

    /// Existing documents matching the query, in store order unless ordered.
    pub fn get(self) -> Result<Vec<Document>, DbError> {
        Ok(self.cursor()?.to_vec())
    }

    pub fn first(self) -> Result<Option<Document>, DbError> {
        let q = self.to_store_query().limit(1);
        Ok(self.run("first", &q)?.next())
    }

    /// Whether any document matches. Reads at most one document.
    pub fn exists(self) -> Result<bool, DbError> {
        let q = self.to_store_query().limit(1);
        Ok(self.run("exists", &q)?.next().is_some())
    }

    /// Number of matching documents.
    ///
    /// This reads every matching document and counts on the client; cost
    /// grows linearly with the result size. There is no store-side aggregate.
    pub fn count(self) -> Result<usize, DbError> {
        let q = self.to_store_query();
        Ok(self.run("count", &q)?.count())
    }

    /// Direct lookup by id.
    ///
    /// # Errors
    /// `NotFound` when no document exists under `id`.
    pub fn find(self, id: impl Into<DocumentId>) -> Result<Document, DbError> {
        let id = id.into();
        let snap = CollectionRef::new(&*self.store, self.collection.clone())
            .document(id.clone())
            .snapshot()?;
        snap.into_document()
            .ok_or_else(|| DbError::NotFound { collection: self.collection.clone(), id: id.0 })
    }

    /// Resolves the id for a new document. A present key field is kept as the
    /// caller wrote it; an absent or null one is filled with a store-generated id.
    fn id_for(&self, values: &mut BsonDocument) -> Result<DocumentId, DbError> {
        match values.get(&self.key_name).filter(|v| !matches!(v, Bson::Null)) {
            Some(v) => DocumentId::from_bson(v).ok_or_else(|| {
                DbError::invalid(format!(
                    "{} value {v} cannot name a document in {}",
                    self.key_name, self.collection
                ))
            }),
            None => {
                let id = self.store.new_document_id(&self.collection);
                values.insert(self.key_name.clone(), id.clone());
                Ok(id)
            }
        }
    }

    /// Writes `values` as a new document and returns its id. The id comes from
    /// the key field when present, otherwise from the store, in which case it
    /// is also written into the key field.
    ///
    /// # Errors
    /// `InvalidArgument` when the key field holds a value that is not a
    /// string or integer.
    pub fn insert(self, mut values: BsonDocument) -> Result<DocumentId, DbError> {
        let id = self.id_for(&mut values)?;
        CollectionRef::new(&*self.store, self.collection.clone()).document(id.clone()).set(values)?;
        log::info!(target: AUDIT_TARGET, "insert {}/{id}", self.collection);
        Ok(id)
    }

    /// Inserts every record whose id is not taken yet and returns how many
    /// were written. Existing documents are left untouched. A failing record
    /// is logged and skipped; the rest of the batch still runs.
    pub fn insert_or_ignore(self, records: Vec<BsonDocument>) -> usize {
        let col = CollectionRef::new(&*self.store, self.collection.clone());
        let mut inserted = 0usize;
        for mut values in records {
            let id = match self.id_for(&mut values) {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("insert_or_ignore {}: {e}", self.collection);
                    continue;
                }
            };
            match col.document(id.clone()).snapshot() {
                Ok(snap) if snap.exists() => continue,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("insert_or_ignore {}/{id}: existence check failed: {e}", self.collection);
                    continue;
                }
            }
            match col.document(id.clone()).set(values) {
                Ok(()) => {
                    log::info!(target: AUDIT_TARGET, "insert {}/{id}", self.collection);
                    inserted += 1;
                }
                Err(e) => log::warn!("insert_or_ignore {}/{id}: write failed: {e}", self.collection),
            }
        }
        inserted
    }

    /// Merge-writes `values` into every document named by the where clauses
    /// and returns how many were written.
    ///
    /// # Errors
    /// `InvalidArgument` when no clause names a document; nothing is written.
    pub fn update(self, values: BsonDocument) -> Result<usize, DbError> {
        let ids = self.identifiers();
        if ids.is_empty() {
            return Err(DbError::invalid(format!(
                "update on {} needs a {} equality or where_in clause",
                self.collection, self.key_name
            )));
        }
        let col = CollectionRef::new(&*self.store, self.collection.clone());
        for id in &ids {
            col.document(id.clone()).set_merge(values.clone())?;
            log::info!(target: AUDIT_TARGET, "update {}/{id}", self.collection);
        }
        Ok(ids.len())
    }

    /// Deletes every document named by the where clauses, plus `id` when given.
    ///
    /// # Errors
    /// `InvalidArgument` when no document is named.
    pub fn delete(mut self, id: Option<DocumentId>) -> Result<usize, DbError> {
        if let Some(id) = id {
            let key = self.key_name.clone();
            self = self.where_eq(key, id)?;
        }
        let ids = self.identifiers();
        if ids.is_empty() {
            return Err(DbError::invalid(format!(
                "delete on {} needs a {} equality or where_in clause",
                self.collection, self.key_name
            )));
        }
        let col = CollectionRef::new(&*self.store, self.collection.clone());
        for id in &ids {
            col.document(id.clone()).delete()?;
            log::info!(target: AUDIT_TARGET, "delete {}/{id}", self.collection);
        }
        Ok(ids.len())
    }
}

fn collect_ids(wheres: &[WhereClause], key: &str, out: &mut Vec<DocumentId>) {
    fn push_unique(id: Option<DocumentId>, out: &mut Vec<DocumentId>) {
        if let Some(id) = id
            && !out.contains(&id)
        {
            out.push(id);
        }
    }
    for w in wheres {
        match w {
            WhereClause::Basic(p) if p.field == key && p.operator == Operator::Equal => {
                push_unique(DocumentId::from_bson(&p.value), out);
            }
            WhereClause::In { field, values } if field == key => {
                for v in values {
                    push_unique(DocumentId::from_bson(v), out);
                }
            }
            WhereClause::Nested(inner) => collect_ids(inner, key, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bson::doc;

    fn builder() -> (Arc<MemoryStore>, QueryBuilder<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), QueryBuilder::new(store, "users"))
    }

    #[test]
    fn relational_equals_is_translated() {
        let (_, q) = builder();
        let q = q.where_op("name", "=", "ada").unwrap();
        assert_eq!(q.to_store_query().filters[0].operator.as_str(), "==");
    }

    #[test]
    fn unsupported_operator_is_rejected() {
        let (_, q) = builder();
        assert!(matches!(q.where_op("age", "<>", 3), Err(DbError::InvalidArgument(_))));
    }

    #[test]
    fn list_operators_need_arrays() {
        let (_, q) = builder();
        assert!(q.clone().where_op("age", "in", 3).is_err());
        assert!(q.clone().where_op("tags", "array-contains-any", Vec::<Bson>::new()).is_err());
        assert!(q.where_op("age", "not-in", vec![1, 2]).is_ok());
    }

    #[test]
    fn identifiers_come_from_key_clauses_only() {
        let (_, q) = builder();
        let q = q
            .where_eq("id", "a")
            .unwrap()
            .where_eq("name", "b")
            .unwrap()
            .where_op("id", ">", "c")
            .unwrap()
            .where_nested(|g| g.where_in("id", ["d", "a"]))
            .unwrap()
            .scope(doc! {"id": "scoped"});
        let ids: Vec<String> = q.identifiers().iter().map(ToString::to_string).collect();
        assert_eq!(ids, ["a", "d"]);
    }

    #[test]
    fn custom_key_name_drives_extraction() {
        let (_, q) = builder();
        let q = q.key_name("uid").where_eq("uid", "u1").unwrap().where_eq("id", "x").unwrap();
        assert_eq!(q.identifiers(), vec![DocumentId::from("u1")]);
    }

    #[test]
    fn nested_group_filters_are_appended() {
        let (_, q) = builder();
        let q = q
            .where_eq("team", "red")
            .unwrap()
            .where_nested(|g| g.where_op("age", ">=", 18)?.where_op("age", "<", 65))
            .unwrap();
        let sq = q.to_store_query();
        assert_eq!(sq.filters.len(), 3);
        assert_eq!(sq.filters[0].field, "team");
        assert!(matches!(q.wheres()[1], WhereClause::Nested(ref inner) if inner.len() == 2));
    }

    #[test]
    fn select_star_means_no_projection() {
        let (_, q) = builder();
        assert!(q.clone().select(["*"]).to_store_query().projection.is_none());
        assert_eq!(q.select(["name"]).to_store_query().projection, Some(vec!["name".to_string()]));
    }

    #[test]
    fn branches_do_not_share_state() {
        let (_, base) = builder();
        let base = base.where_eq("team", "red").unwrap();
        let a = base.clone().where_eq("age", 1).unwrap();
        let b = base.where_eq("age", 2).unwrap();
        assert_eq!(a.to_store_query().filters.len(), 2);
        assert_eq!(b.to_store_query().filters[1].value, Bson::Int32(2));
    }
}
