use crate::document::{Document, DocumentSnapshot};

/// Iterates the existing documents of a query result in store order.
#[derive(Debug, Clone)]
pub struct Cursor {
    snapshots: Vec<DocumentSnapshot>,
    pos: usize,
}

impl Cursor {
    #[must_use]
    pub const fn new(snapshots: Vec<DocumentSnapshot>) -> Self {
        Self { snapshots, pos: 0 }
    }

    pub fn advance(&mut self) -> Option<Document> {
        while self.pos < self.snapshots.len() {
            let snap = &self.snapshots[self.pos];
            self.pos += 1;
            if let Some(doc) = snap.document() {
                return Some(doc.clone());
            }
        }
        None
    }

    /// Snapshots not yet consumed, missing ones included.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.snapshots.len() - self.pos
    }

    #[must_use]
    pub fn to_vec(mut self) -> Vec<Document> {
        let rest = self.snapshots.split_off(self.pos);
        rest.into_iter().filter_map(DocumentSnapshot::into_document).collect()
    }
}

impl Iterator for Cursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
