use bson::Bson;

use super::command::WhereArg;
use super::runner::OutputMode;
use crate::document::Document;
use crate::errors::DbError;
use crate::query::Order;
use crate::types::parse_value;

/// Parses `field:op:value`. The value is read as JSON; anything that is not
/// valid JSON is taken as a plain string, so `name:==:ada` works unquoted.
///
/// # Errors
/// `InvalidArgument` when a part is missing.
pub fn parse_where(s: &str) -> Result<WhereArg, DbError> {
    let mut parts = s.splitn(3, ':');
    let (Some(field), Some(op), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(DbError::invalid(format!("expected field:op:value, got '{s}'")));
    };
    if field.is_empty() || op.is_empty() {
        return Err(DbError::invalid(format!("expected field:op:value, got '{s}'")));
    }
    let value = parse_value(raw).unwrap_or_else(|_| Bson::String(raw.to_string()));
    Ok(WhereArg { field: field.to_string(), op: op.to_string(), value })
}

/// Parses `field` or `field:asc|desc`.
///
/// # Errors
/// `InvalidArgument` for an unknown direction.
pub fn parse_order(s: &str) -> Result<(String, Order), DbError> {
    match s.rsplit_once(':') {
        None => Ok((s.to_string(), Order::Asc)),
        Some((field, dir)) => match dir.to_ascii_lowercase().as_str() {
            "asc" => Ok((field.to_string(), Order::Asc)),
            "desc" => Ok((field.to_string(), Order::Desc)),
            other => Err(DbError::invalid(format!("unknown sort direction '{other}'"))),
        },
    }
}

#[must_use]
pub fn parse_output_mode(s: Option<&str>) -> OutputMode {
    match s.map(str::to_ascii_lowercase).as_deref() {
        Some("json") => OutputMode::Json,
        Some("plain") => OutputMode::Plain,
        _ => OutputMode::Human,
    }
}

pub(super) fn document_json(doc: &Document) -> serde_json::Value {
    Bson::Document(doc.data.clone()).into_relaxed_extjson()
}
