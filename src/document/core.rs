use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Metadata {
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self { create_time: now, update_time: now }
    }

    pub fn touch(&mut self) {
        self.update_time = Utc::now();
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored document: its id within the collection and its fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    #[must_use]
    pub fn new(id: DocumentId, data: BsonDocument) -> Self {
        Self { id, data, metadata: Metadata::new() }
    }

    #[must_use]
    pub const fn fields(&self) -> &BsonDocument {
        &self.data
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.data.get(field)
    }

    #[must_use]
    pub fn into_fields(self) -> BsonDocument {
        self.data
    }

    /// Replaces every field, keeping `create_time`.
    pub fn replace(&mut self, data: BsonDocument) {
        self.data = data;
        self.metadata.touch();
    }

    /// Overwrites only the given fields; other fields are left as they are.
    pub fn merge(&mut self, data: BsonDocument) {
        for (k, v) in data {
            self.data.insert(k, v);
        }
        self.metadata.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn merge_preserves_unspecified_fields() {
        let mut d = Document::new("a".into(), doc! {"x": 1, "y": 2});
        let created = d.metadata.create_time;
        d.merge(doc! {"y": 5, "z": true});
        assert_eq!(d.data, doc! {"x": 1, "y": 5, "z": true});
        assert_eq!(d.metadata.create_time, created);
        assert!(d.metadata.update_time >= created);
    }

    #[test]
    fn replace_drops_old_fields() {
        let mut d = Document::new("a".into(), doc! {"x": 1, "y": 2});
        d.replace(doc! {"y": 3});
        assert!(d.get("x").is_none());
        assert_eq!(d.data.get_i32("y").unwrap(), 3);
    }
}
