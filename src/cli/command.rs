use bson::Bson;

use crate::query::Order;
use crate::types::DocumentId;

/// `field op value` as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereArg {
    pub field: String,
    pub op: String,
    pub value: Bson,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Limit-1 read against `collection` (the configured health-check
    /// collection when `None`).
    HealthCheck {
        collection: Option<String>,
    },
    Get {
        collection: String,
        wheres: Vec<WhereArg>,
        order_by: Vec<(String, Order)>,
        limit: Option<usize>,
        select: Vec<String>,
    },
    Count {
        collection: String,
        wheres: Vec<WhereArg>,
    },
    Find {
        collection: String,
        id: DocumentId,
    },
    Paginate {
        collection: String,
        wheres: Vec<WhereArg>,
        per_page: usize,
        page: Option<usize>,
        after: Option<DocumentId>,
    },
}
