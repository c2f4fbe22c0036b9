//! Query builder for a schemaless document store.
//!
//! A [`Connection`] hands out [`QueryBuilder`]s per collection. Builders
//! accumulate predicates, ordering, limits and projections, translate them
//! into store queries, and run them against any [`DocumentStore`]. Pagination
//! is cursor based (start after the last document seen). The shipped backend
//! is the in-process [`MemoryStore`].

pub mod cli;
pub mod config;
pub mod connection;
pub mod document;
pub mod errors;
pub mod logger;
pub mod model;
pub mod query;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use document::{Document, DocumentSnapshot};
pub use errors::DbError;
pub use model::{Model, ModelHooks, NoHooks, Record};
pub use query::{Order, Page, PageRequest, QueryBuilder};
pub use store::{DocumentStore, MemoryStore};
pub use types::DocumentId;

/// Resolves configuration (environment and config files) and opens an
/// in-memory connection.
///
/// # Errors
/// Configuration and fixture errors.
pub fn init() -> Result<Connection<MemoryStore>, DbError> {
    let cfg = config::load_config(config::ConfigLayer::default(), None)?;
    Connection::in_memory(cfg)
}
