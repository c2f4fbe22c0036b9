#![allow(dead_code)]

use bson::{Document as BsonDocument, doc};
use firestore_driver::{Connection, ConnectionConfig, MemoryStore};

pub fn connection() -> Connection<MemoryStore> {
    Connection::in_memory(ConnectionConfig::default()).unwrap()
}

pub fn connection_with_prefix(prefix: &str) -> Connection<MemoryStore> {
    let cfg = ConnectionConfig { prefix: prefix.to_string(), ..ConnectionConfig::default() };
    Connection::in_memory(cfg).unwrap()
}

pub fn user(id: &str, name: &str, age: i32, team: &str) -> BsonDocument {
    doc! { "id": id, "name": name, "age": age, "team": team }
}

/// `users` with u01..u{n}, ages 18.., teams alternating red/blue.
pub fn seeded(n: usize) -> Connection<MemoryStore> {
    let conn = connection();
    let records = (1..=n)
        .map(|i| {
            let team = if i % 2 == 0 { "blue" } else { "red" };
            user(&format!("u{i:02}"), &format!("user{i}"), 17 + i as i32, team)
        })
        .collect();
    let _ = conn.store().seed("users", "id", records);
    conn.store().reset_stats();
    conn
}

pub fn ids(docs: &[firestore_driver::Document]) -> Vec<String> {
    docs.iter().map(|d| d.id.to_string()).collect()
}
