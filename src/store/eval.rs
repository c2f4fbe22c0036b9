use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use crate::query::{MAX_IN_SET, Operator, Order, Predicate, SortSpec};
use crate::query::types::{MAX_PATH_DEPTH, MAX_SORT_FIELDS};

/// Evaluates one predicate with document-store semantics: a missing field never
/// matches, and range operators only match values of the same type class.
pub fn eval_predicate(doc: &BsonDocument, p: &Predicate) -> bool {
    let Some(v) = get_path(doc, &p.field) else {
        return false;
    };
    match p.operator {
        Operator::Equal => values_equal(v, &p.value),
        Operator::LessThan => comparable(v, &p.value) == Some(Ordering::Less),
        Operator::LessThanOrEqual => {
            matches!(comparable(v, &p.value), Some(Ordering::Less | Ordering::Equal))
        }
        Operator::GreaterThan => comparable(v, &p.value) == Some(Ordering::Greater),
        Operator::GreaterThanOrEqual => {
            matches!(comparable(v, &p.value), Some(Ordering::Greater | Ordering::Equal))
        }
        Operator::ArrayContains => match v {
            Bson::Array(items) => items.iter().any(|x| values_equal(x, &p.value)),
            _ => false,
        },
        Operator::ArrayContainsAny => match (v, &p.value) {
            (Bson::Array(items), Bson::Array(wanted)) => {
                items.iter().any(|x| is_in_set(x, wanted))
            }
            _ => false,
        },
        Operator::In => match &p.value {
            Bson::Array(set) => is_in_set(v, set),
            _ => false,
        },
        Operator::NotIn => match &p.value {
            Bson::Array(set) => !matches!(v, Bson::Null) && !is_in_set(v, set),
            _ => false,
        },
    }
}

pub fn eval_all(doc: &BsonDocument, filters: &[Predicate]) -> bool {
    filters.iter().all(|p| eval_predicate(doc, p))
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().take(MAX_IN_SET).any(|x| values_equal(x, v))
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return compare_numbers(a, b) == Ordering::Equal;
    }
    if let (Some(x), Some(y)) = (as_millis(a), as_millis(b)) {
        return x == y;
    }
    a == b
}

/// Ordering between two values of the same type class; `None` across classes.
fn comparable(a: &Bson, b: &Bson) -> Option<Ordering> {
    if type_rank(a) == type_rank(b) { Some(compare_bson(a, b)) } else { None }
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    let mut depth = 0usize;
    while let Some(part) = parts.next() {
        depth += 1;
        if depth > MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            Bson::Document(d) => cur = d,
            _ => return None,
        }
    }
    None
}

/// Compares two documents by the given sort fields. A missing field sorts first.
pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

fn as_i64(x: &Bson) -> Option<i64> {
    match x {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

// Integer pairs compare exactly; f64 only once a double or decimal is involved.
fn compare_numbers(a: &Bson, b: &Bson) -> Ordering {
    match (as_i64(a), as_i64(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => as_f64_num(a).total_cmp(&as_f64_num(b)),
    }
}

fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Total order over field values: numbers compare numerically across widths,
/// otherwise values order by type class first.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return compare_numbers(a, b);
    }
    if let (Some(x), Some(y)) = (as_millis(a), as_millis(b)) {
        return x.cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::Array(x), Bson::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let o = compare_bson(l, r);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Both timestamp kinds on one millisecond axis. `Timestamp` only carries
// seconds plus an increment, so its increment does not affect the order.
fn as_millis(v: &Bson) -> Option<i64> {
    match v {
        Bson::DateTime(d) => Some(d.timestamp_millis()),
        Bson::Timestamp(t) => Some(i64::from(t.time) * 1000),
        _ => None,
    }
}

// Firestore's cross-type ordering: null < bool < number < timestamp < string < ...
fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null | Bson::Undefined => 0,
        Bson::Boolean(_) => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::DateTime(_) | Bson::Timestamp(_) => 3,
        Bson::String(_) | Bson::Symbol(_) => 4,
        Bson::Binary(_) => 5,
        Bson::ObjectId(_) => 6,
        Bson::Array(_) => 8,
        Bson::Document(_) => 9,
        _ => 10,
    }
}

pub fn project_fields(doc: &BsonDocument, fields: &[String]) -> BsonDocument {
    let mut out = BsonDocument::new();
    for f in fields {
        if let Some(v) = doc.get(f) {
            out.insert(f.clone(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn p(field: &str, op: Operator, value: impl Into<Bson>) -> Predicate {
        Predicate::new(field, op, value)
    }

    #[test]
    fn equality_is_numeric_across_widths() {
        let d = doc! {"n": 3i64};
        assert!(eval_predicate(&d, &p("n", Operator::Equal, 3i32)));
        assert!(eval_predicate(&d, &p("n", Operator::Equal, 3.0f64)));
        assert!(!eval_predicate(&d, &p("n", Operator::Equal, "3")));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let big = 1i64 << 53;
        let d = doc! {"n": big};
        assert!(!eval_predicate(&d, &p("n", Operator::Equal, big + 1)));
        assert!(eval_predicate(&d, &p("n", Operator::Equal, big)));
        assert!(eval_predicate(&d, &p("n", Operator::LessThan, big + 1)));
        assert!(!eval_predicate(&d, &p("n", Operator::In, vec![big + 1, big - 1])));
        assert_eq!(compare_bson(&Bson::Int64(i64::MAX), &Bson::Int64(i64::MAX - 1)), Ordering::Greater);
        assert_eq!(compare_bson(&Bson::Int32(7), &Bson::Int64(7)), Ordering::Equal);
    }

    #[test]
    fn datetime_and_timestamp_order_on_one_axis() {
        let dt = Bson::DateTime(bson::DateTime::from_millis(5_000));
        let early = Bson::Timestamp(bson::Timestamp { time: 4, increment: 0 });
        let late = Bson::Timestamp(bson::Timestamp { time: 6, increment: 0 });
        assert_eq!(compare_bson(&dt, &early), Ordering::Greater);
        assert_eq!(compare_bson(&dt, &late), Ordering::Less);
        let d = doc! {"at": dt};
        assert!(!eval_predicate(&d, &p("at", Operator::GreaterThanOrEqual, late.clone())));
        assert!(eval_predicate(&d, &p("at", Operator::LessThanOrEqual, late)));
    }

    #[test]
    fn range_operators_do_not_cross_types() {
        let d = doc! {"age": 30};
        assert!(eval_predicate(&d, &p("age", Operator::GreaterThan, 18)));
        assert!(!eval_predicate(&d, &p("age", Operator::GreaterThan, "18")));
        assert!(!eval_predicate(&d, &p("age", Operator::LessThan, "zzz")));
        assert!(eval_predicate(&d, &p("age", Operator::LessThanOrEqual, 30.0)));
    }

    #[test]
    fn missing_field_never_matches() {
        let d = doc! {"x": 1};
        for op in Operator::ALL {
            let value = if op.takes_list() { Bson::Array(vec![Bson::Int32(9)]) } else { 9.into() };
            assert!(!eval_predicate(&d, &p("y", op, value)), "{op}");
        }
    }

    #[test]
    fn array_operators() {
        let d = doc! {"tags": ["a", "b"]};
        assert!(eval_predicate(&d, &p("tags", Operator::ArrayContains, "b")));
        assert!(!eval_predicate(&d, &p("tags", Operator::ArrayContains, "c")));
        assert!(eval_predicate(&d, &p("tags", Operator::ArrayContainsAny, vec!["c", "a"])));
        assert!(!eval_predicate(&d, &p("tags", Operator::ArrayContainsAny, vec!["c"])));
    }

    #[test]
    fn in_and_not_in() {
        let d = doc! {"state": "CA", "none": Bson::Null};
        assert!(eval_predicate(&d, &p("state", Operator::In, vec!["NY", "CA"])));
        assert!(!eval_predicate(&d, &p("state", Operator::NotIn, vec!["NY", "CA"])));
        assert!(eval_predicate(&d, &p("state", Operator::NotIn, vec!["NY"])));
        assert!(!eval_predicate(&d, &p("none", Operator::NotIn, vec!["NY"])));
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        let d = doc! {"addr": {"city": "Oslo"}};
        assert!(eval_predicate(&d, &p("addr.city", Operator::Equal, "Oslo")));
        assert!(!eval_predicate(&d, &p("addr.city.x", Operator::Equal, "Oslo")));
    }

    #[test]
    fn compare_docs_missing_sorts_first() {
        let sort = [SortSpec::asc("k")];
        assert_eq!(compare_docs(&doc! {}, &doc! {"k": 1}, &sort), Ordering::Less);
        assert_eq!(
            compare_docs(&doc! {"k": 2}, &doc! {"k": 1}, &[SortSpec::desc("k")]),
            Ordering::Less
        );
    }
}
