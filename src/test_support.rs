#![cfg(test)]

// Seeded stores and fixtures for unit tests.
use std::path::{Path, PathBuf};

use bson::doc;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::store::MemoryStore;

/// In-memory connection whose `users` collection holds u1..u5
/// (ages 20, 30, ..., 60, alternating teams).
pub fn users_connection() -> Connection<MemoryStore> {
    let conn = Connection::in_memory(ConnectionConfig::default()).expect("in-memory connection");
    let users = (1..=5)
        .map(|i| {
            doc! {
                "id": format!("u{i}"),
                "name": format!("user{i}"),
                "age": i * 10 + 10,
                "team": if i % 2 == 0 { "blue" } else { "red" },
            }
        })
        .collect();
    let _ = conn.store().seed("users", "id", users);
    conn
}

/// Writes a JSON fixture (`{"collection": [docs...]}`) into `dir`.
pub fn write_fixture(dir: &Path, json: &str) -> PathBuf {
    let p = dir.join("fixture.json");
    std::fs::write(&p, json).expect("write fixture");
    p
}
