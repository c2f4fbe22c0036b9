use super::eval::{compare_docs, eval_all, get_path, project_fields};
use super::{DocumentStore, SetOptions, StoreQuery};
use crate::document::{Document, DocumentSnapshot};
use crate::errors::DbError;
use crate::query::{MAX_IN_SET, SortSpec};
use crate::types::{DocumentId, TransactionId, json_to_fields};
use bson::{Bson, Document as BsonDocument};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

type Collections = HashMap<String, BTreeMap<DocumentId, Document>>;

/// Call and read counters, the same quantities a hosted store bills for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub queries: u64,
    pub lookups: u64,
    pub documents_read: u64,
    pub writes: u64,
    pub deletes: u64,
}

impl StoreStats {
    #[must_use]
    pub const fn calls(&self) -> u64 {
        self.queries + self.lookups + self.writes + self.deletes
    }
}

#[derive(Default)]
struct Faults {
    offline: bool,
    failing_writes: HashSet<DocumentId>,
}

/// In-process document store.
///
/// Documents of a collection are kept in id order, which is also the natural
/// result order of an unordered query. One transaction may be open at a time;
/// rolling it back restores the state captured when it began.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    savepoint: Mutex<Option<(TransactionId, Collections)>>,
    stats: Mutex<StoreStats>,
    query_log: Mutex<Vec<StoreQuery>>,
    faults: RwLock<Faults>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds documents without touching statistics. The `key` field of each
    /// record supplies its id; records without one get a generated id, which
    /// is also written into the record.
    pub fn seed(&self, collection: &str, key: &str, records: Vec<BsonDocument>) -> Vec<DocumentId> {
        let mut cols = self.collections.write();
        let col = cols.entry(collection.to_string()).or_default();
        records
            .into_iter()
            .map(|mut fields| {
                let id = fields.get(key).and_then(DocumentId::from_bson).unwrap_or_else(|| {
                    let id = DocumentId::generate();
                    fields.insert(key, id.clone());
                    id
                });
                col.insert(id.clone(), Document::new(id.clone(), fields));
                id
            })
            .collect()
    }

    /// Loads a JSON fixture of the form `{"collection": [{...}, ...], ...}`.
    ///
    /// # Errors
    /// I/O and JSON errors, or `InvalidArgument` when the layout is wrong.
    pub fn load_fixture(&self, path: &Path, key: &str) -> Result<usize, DbError> {
        let text = std::fs::read_to_string(path)?;
        let root: serde_json::Value = serde_json::from_str(&text)?;
        let obj = root
            .as_object()
            .ok_or_else(|| DbError::invalid("fixture must be a JSON object of collections"))?;
        let mut loaded = 0usize;
        for (name, docs) in obj {
            let arr = docs.as_array().ok_or_else(|| {
                DbError::invalid(format!("fixture collection {name} must be an array"))
            })?;
            let records = arr.iter().map(json_to_fields).collect::<Result<Vec<_>, _>>()?;
            loaded += self.seed(name, key, records).len();
        }
        log::info!("loaded {loaded} fixture documents from {}", path.display());
        Ok(loaded)
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        *self.stats.lock()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = StoreStats::default();
        self.query_log.lock().clear();
    }

    /// Queries executed since creation or the last [`reset_stats`](Self::reset_stats).
    #[must_use]
    pub fn query_log(&self) -> Vec<StoreQuery> {
        self.query_log.lock().clone()
    }

    /// Makes every call fail with a store error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.faults.write().offline = offline;
    }

    /// Makes writes to `id` (in any collection) fail with a store error.
    pub fn fail_writes_to(&self, id: impl Into<DocumentId>) {
        self.faults.write().failing_writes.insert(id.into());
    }

    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn check_online(&self) -> Result<(), DbError> {
        if self.faults.read().offline {
            return Err(DbError::Store("UNAVAILABLE: store is offline".into()));
        }
        Ok(())
    }

    fn check_writable(&self, id: &DocumentId) -> Result<(), DbError> {
        self.check_online()?;
        if self.faults.read().failing_writes.contains(id) {
            return Err(DbError::Store(format!("ABORTED: write to {id} rejected")));
        }
        Ok(())
    }
}

fn validate_query(query: &StoreQuery) -> Result<(), DbError> {
    for p in &query.filters {
        if let (true, Bson::Array(values)) = (p.operator.takes_list(), &p.value)
            && values.len() > MAX_IN_SET
        {
            return Err(DbError::Store(format!(
                "INVALID_ARGUMENT: '{}' supports up to {MAX_IN_SET} comparison values",
                p.operator
            )));
        }
    }
    if let Some(snap) = &query.start_after
        && !snap.exists()
    {
        return Err(DbError::Store(format!(
            "INVALID_ARGUMENT: cannot start after missing document {}",
            snap.id()
        )));
    }
    Ok(())
}

// Position relative to a cursor: ordered fields first, document id last.
fn cmp_to_cursor(doc: &Document, at: &BsonDocument, at_id: &DocumentId, sort: &[SortSpec]) -> Ordering {
    compare_docs(&doc.data, at, sort).then_with(|| doc.id.cmp(at_id))
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &DocumentId) -> Result<DocumentSnapshot, DbError> {
        self.check_online()?;
        let found = self.collections.read().get(collection).and_then(|c| c.get(id)).cloned();
        let mut stats = self.stats.lock();
        stats.lookups += 1;
        Ok(match found {
            Some(doc) => {
                stats.documents_read += 1;
                DocumentSnapshot::found(doc)
            }
            None => DocumentSnapshot::missing(id.clone()),
        })
    }

    fn set(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: BsonDocument,
        options: SetOptions,
    ) -> Result<(), DbError> {
        self.check_writable(id)?;
        let mut cols = self.collections.write();
        let col = cols.entry(collection.to_string()).or_default();
        match col.get_mut(id) {
            Some(doc) if options.merge => doc.merge(fields),
            Some(doc) => doc.replace(fields),
            None => {
                col.insert(id.clone(), Document::new(id.clone(), fields));
            }
        }
        self.stats.lock().writes += 1;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> Result<(), DbError> {
        self.check_writable(id)?;
        if let Some(col) = self.collections.write().get_mut(collection) {
            col.remove(id);
        }
        self.stats.lock().deletes += 1;
        Ok(())
    }

    fn run_query(&self, query: &StoreQuery) -> Result<Vec<DocumentSnapshot>, DbError> {
        self.check_online()?;
        validate_query(query)?;
        self.query_log.lock().push(query.clone());

        let cols = self.collections.read();
        let mut docs: Vec<&Document> = cols
            .get(&query.collection)
            .map(|c| c.values().filter(|d| eval_all(&d.data, &query.filters)).collect())
            .unwrap_or_default();

        if !query.order_by.is_empty() {
            // Ordering on a field excludes documents that lack it.
            docs.retain(|d| query.order_by.iter().all(|s| get_path(&d.data, &s.field).is_some()));
            docs.sort_by(|a, b| compare_docs(&a.data, &b.data, &query.order_by));
        }

        if let Some(cursor) = &query.start_after {
            let at = cursor.data().cloned().unwrap_or_default();
            docs.retain(|d| {
                cmp_to_cursor(d, &at, cursor.id(), &query.order_by) == Ordering::Greater
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        let out: Vec<DocumentSnapshot> = docs
            .into_iter()
            .take(limit)
            .map(|d| {
                let mut d = d.clone();
                if let Some(fields) = &query.projection {
                    d.data = project_fields(&d.data, fields);
                }
                DocumentSnapshot::found(d)
            })
            .collect();

        let mut stats = self.stats.lock();
        stats.queries += 1;
        stats.documents_read += out.len() as u64;
        Ok(out)
    }

    fn begin_transaction(&self) -> Result<TransactionId, DbError> {
        self.check_online()?;
        let mut sp = self.savepoint.lock();
        if let Some((open, _)) = sp.as_ref() {
            return Err(DbError::Transaction(format!("transaction {open} already in progress")));
        }
        let tx = TransactionId::new();
        *sp = Some((tx, self.collections.read().clone()));
        Ok(tx)
    }

    fn commit(&self, tx: TransactionId) -> Result<(), DbError> {
        let mut sp = self.savepoint.lock();
        match sp.as_ref() {
            Some((open, _)) if *open == tx => {
                *sp = None;
                Ok(())
            }
            _ => Err(DbError::Transaction(format!("transaction {tx} is not open"))),
        }
    }

    fn rollback(&self, tx: TransactionId) -> Result<(), DbError> {
        let mut sp = self.savepoint.lock();
        match sp.take() {
            Some((open, saved)) if open == tx => {
                *self.collections.write() = saved;
                Ok(())
            }
            other => {
                *sp = other;
                Err(DbError::Transaction(format!("transaction {tx} is not open")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Operator, Predicate};
    use bson::doc;

    fn store_with(n: i32) -> MemoryStore {
        let s = MemoryStore::new();
        let recs = (0..n).map(|i| doc! {"id": format!("d{i:02}"), "n": i}).collect();
        s.seed("c", "id", recs);
        s
    }

    #[test]
    fn natural_order_is_by_id() {
        let s = MemoryStore::new();
        s.seed("c", "id", vec![doc! {"id": "b"}, doc! {"id": "a"}, doc! {"id": "c"}]);
        let ids: Vec<String> = s
            .run_query(&StoreQuery::new("c"))
            .unwrap()
            .iter()
            .map(|x| x.id().to_string())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn limit_bounds_documents_read() {
        let s = store_with(10);
        let out = s.run_query(&StoreQuery::new("c").limit(1)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(s.stats().documents_read, 1);
    }

    #[test]
    fn start_after_with_descending_order() {
        let s = store_with(5);
        let q = StoreQuery::new("c").order_by(SortSpec::desc("n"));
        let cursor = s.get("c", &"d03".into()).unwrap();
        let out = s.run_query(&q.start_after(cursor)).unwrap();
        let ns: Vec<i32> = out.iter().map(|d| d.data().unwrap().get_i32("n").unwrap()).collect();
        assert_eq!(ns, [2, 1, 0]);
    }

    #[test]
    fn order_by_excludes_documents_without_the_field() {
        let s = MemoryStore::new();
        s.seed("c", "id", vec![doc! {"id": "a", "k": 1}, doc! {"id": "b"}]);
        let out = s.run_query(&StoreQuery::new("c").order_by(SortSpec::asc("k"))).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn oversized_in_set_is_rejected() {
        let s = store_with(1);
        let values: Vec<i32> = (0..=MAX_IN_SET as i32).collect();
        let q = StoreQuery::new("c").filter(Predicate::new("n", Operator::In, values));
        assert!(matches!(s.run_query(&q), Err(DbError::Store(_))));
    }

    #[test]
    fn merge_and_replace_writes() {
        let s = store_with(1);
        let id = DocumentId::from("d00");
        s.set("c", &id, doc! {"extra": true}, SetOptions::merge()).unwrap();
        let merged = s.get("c", &id).unwrap();
        assert_eq!(merged.get("n"), Some(&Bson::Int32(0)));
        s.set("c", &id, doc! {"only": 1}, SetOptions::default()).unwrap();
        let replaced = s.get("c", &id).unwrap();
        assert!(replaced.get("n").is_none());
        assert_eq!(s.stats().writes, 2);
    }

    #[test]
    fn rollback_restores_savepoint() {
        let s = store_with(2);
        let tx = s.begin_transaction().unwrap();
        s.delete("c", &"d00".into()).unwrap();
        s.set("c", &"new".into(), doc! {"n": 9}, SetOptions::default()).unwrap();
        assert!(s.begin_transaction().is_err());
        s.rollback(tx).unwrap();
        assert_eq!(s.len("c"), 2);
        assert!(!s.get("c", &"new".into()).unwrap().exists());
        assert!(s.commit(tx).is_err());
    }

    #[test]
    fn offline_store_fails_every_call() {
        let s = store_with(1);
        s.set_offline(true);
        assert!(matches!(s.run_query(&StoreQuery::new("c")), Err(DbError::Store(_))));
        assert!(s.get("c", &"d00".into()).is_err());
        s.clear_faults();
        assert!(s.get("c", &"d00".into()).unwrap().exists());
    }
}
