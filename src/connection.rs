use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ConnectionConfig;
use crate::errors::DbError;
use crate::query::{DEFAULT_KEY, QueryBuilder};
use crate::store::{DocumentStore, MemoryStore};
use crate::types::TransactionId;

/// A configured handle on a document store.
///
/// Hands out [`QueryBuilder`]s for prefixed collections and tracks at most one
/// open transaction.
pub struct Connection<S: DocumentStore + ?Sized = dyn DocumentStore> {
    store: Arc<S>,
    config: ConnectionConfig,
    transaction: Mutex<Option<TransactionId>>,
}

impl<S: DocumentStore + ?Sized> Connection<S> {
    pub fn new(store: Arc<S>, config: ConnectionConfig) -> Self {
        log::info!(
            "connection opened: project={} database={} prefix='{}'",
            config.project_id.as_deref().unwrap_or("-"),
            config.database,
            config.prefix
        );
        Self { store, config, transaction: Mutex::new(None) }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    #[must_use]
    pub fn collection_name(&self, table: &str) -> String {
        self.config.collection_name(table)
    }

    /// Query builder for `table`, with the configured prefix applied.
    #[must_use]
    pub fn table(&self, table: &str) -> QueryBuilder<S> {
        QueryBuilder::new(Arc::clone(&self.store), self.collection_name(table))
    }

    /// Like [`table`](Self::table) with a custom primary-key field.
    #[must_use]
    pub fn table_with_key(&self, table: &str, key: &str) -> QueryBuilder<S> {
        let q = self.table(table);
        if key == DEFAULT_KEY { q } else { q.key_name(key) }
    }

    /// # Errors
    /// `Transaction` when one is already open on this connection; store errors
    /// propagate.
    pub fn begin_transaction(&self) -> Result<TransactionId, DbError> {
        let mut slot = self.transaction.lock();
        if let Some(open) = *slot {
            return Err(DbError::Transaction(format!("transaction {open} is already open")));
        }
        let tx = self.store.begin_transaction()?;
        log::debug!("begin transaction {tx}");
        *slot = Some(tx);
        Ok(tx)
    }

    /// Commits the open transaction. Without one this does nothing.
    pub fn commit(&self) -> Result<(), DbError> {
        let Some(tx) = self.transaction.lock().take() else {
            return Ok(());
        };
        log::debug!("commit transaction {tx}");
        self.store.commit(tx)
    }

    /// Rolls back the open transaction. Without one this does nothing.
    pub fn rollback(&self) -> Result<(), DbError> {
        let Some(tx) = self.transaction.lock().take() else {
            return Ok(());
        };
        log::debug!("rollback transaction {tx}");
        self.store.rollback(tx)
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.lock().is_some()
    }

    /// Runs `f` inside a transaction: commit on `Ok`, rollback on `Err`.
    ///
    /// # Errors
    /// The error of `f` (after rolling back), or a begin/commit failure.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.begin_transaction()?;
        match f(self) {
            Ok(v) => {
                self.commit()?;
                Ok(v)
            }
            Err(e) => {
                if let Err(rb) = self.rollback() {
                    log::error!("rollback after failed transaction body also failed: {rb}");
                }
                Err(e)
            }
        }
    }
}

impl Connection<MemoryStore> {
    /// Connection on a fresh in-process store, seeded from `config.fixture`
    /// when set.
    ///
    /// # Errors
    /// Fixture read or parse failures.
    pub fn in_memory(config: ConnectionConfig) -> Result<Self, DbError> {
        let store = MemoryStore::new();
        if let Some(path) = &config.fixture {
            let n = store.load_fixture(path, DEFAULT_KEY)?;
            log::info!("seeded {n} documents from {}", path.display());
        }
        Ok(Self::new(Arc::new(store), config))
    }

    /// Same store, type-erased.
    #[must_use]
    pub fn into_dyn(self) -> Connection {
        let store: Arc<dyn DocumentStore> = self.store;
        Connection { store, config: self.config, transaction: self.transaction }
    }
}
