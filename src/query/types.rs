use crate::errors::DbError;
use bson::Bson;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on values accepted by `in`, `not-in` and `array-contains-any`.
pub const MAX_IN_SET: usize = 30;
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_SORT_FIELDS: usize = 8;

/// Comparison operators understood by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    LessThan,
    LessThanOrEqual,
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl Operator {
    pub const ALL: [Self; 9] = [
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::Equal,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::ArrayContains,
        Self::ArrayContainsAny,
        Self::In,
        Self::NotIn,
    ];

    /// Store-native spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Equal => "==",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
            Self::In => "in",
            Self::NotIn => "not-in",
        }
    }

    /// Operators whose operand is a list of candidate values.
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::ArrayContainsAny)
    }

    /// Parses a builder operator. The relational `=` is accepted as `==`;
    /// anything outside the store's operator set is rejected.
    ///
    /// # Errors
    /// `InvalidArgument` for unsupported operators.
    pub fn parse(op: &str) -> Result<Self, DbError> {
        let op = op.trim();
        if op == "=" {
            return Ok(Self::Equal);
        }
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == op)
            .ok_or_else(|| DbError::invalid(format!("unsupported operator: {op:?}")))
    }
}

impl FromStr for Operator {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field filter sent to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Bson,
}

impl Predicate {
    #[must_use]
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Bson>) -> Self {
        Self { field: field.into(), operator, value: value.into() }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }
}

/// Bookkeeping for where calls, kept alongside the store filters so that
/// mutations can recover the identifiers they target.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Basic(Predicate),
    In { field: String, values: Vec<Bson> },
    Nested(Vec<WhereClause>),
}
