mod common;

use bson::{Bson, doc};
use common::{ids, seeded};
use firestore_driver::query::{Operator, Order, WhereClause};
use firestore_driver::utils::devlog;
use firestore_driver::DbError;

#[test]
fn relational_equals_reaches_store_as_double_equals() {
    let conn = seeded(4);
    let docs = conn.table("users").where_op("team", "=", "red").unwrap().get().unwrap();
    assert_eq!(ids(&docs), ["u01", "u03"]);
    let log = conn.store().query_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].filters[0].operator, Operator::Equal);
    assert_eq!(log[0].filters[0].operator.as_str(), "==");
}

#[test]
fn empty_where_in_fails_without_store_call() {
    let conn = seeded(3);
    let err = conn.table("users").where_in("id", Vec::<String>::new()).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
    assert_eq!(conn.store().stats().calls(), 0);
}

#[test]
fn where_not_in_is_always_rejected() {
    let conn = seeded(3);
    let err = conn.table("users").where_not_in("id", ["u01"]).unwrap_err();
    assert!(matches!(err, DbError::InvalidArgument(_)));
}

#[test]
fn exists_reads_at_most_one_document() {
    let conn = seeded(10);
    assert!(conn.table("users").where_op("age", ">", 20).unwrap().exists().unwrap());
    let stats = conn.store().stats();
    assert_eq!(stats.queries, 1);
    assert!(stats.documents_read <= 1);
    assert!(!conn.table("users").where_eq("team", "green").unwrap().exists().unwrap());
}

#[test]
fn count_reads_every_match() {
    let conn = seeded(9);
    let n = conn.table("users").where_eq("team", "red").unwrap().count().unwrap();
    assert_eq!(n, 5);
    assert_eq!(conn.store().stats().documents_read, 5);
}

#[test]
fn range_and_ordering() {
    let conn = seeded(6);
    let docs = conn
        .table("users")
        .where_op("age", ">=", 19)
        .unwrap()
        .where_op("age", "<", 22)
        .unwrap()
        .order_by("age", Order::Desc)
        .get()
        .unwrap();
    assert_eq!(ids(&docs), ["u04", "u03", "u02"]);
}

#[test]
fn range_filters_do_not_cross_types() {
    let conn = common::connection();
    let _ = conn.store().seed(
        "mixed",
        "id",
        vec![doc! {"id": "a", "v": 5}, doc! {"id": "b", "v": "7"}, doc! {"id": "c", "v": 9.5}],
    );
    let docs = conn.table("mixed").where_op("v", ">", 1).unwrap().get().unwrap();
    assert_eq!(ids(&docs), ["a", "c"]);
}

#[test]
fn array_operators() {
    let conn = common::connection();
    let _ = conn.store().seed(
        "posts",
        "id",
        vec![
            doc! {"id": "p1", "tags": ["rust", "db"]},
            doc! {"id": "p2", "tags": ["go"]},
            doc! {"id": "p3", "tags": []},
        ],
    );
    let q = conn.table("posts");
    let hits = q.clone().where_op("tags", "array-contains", "db").unwrap().get().unwrap();
    assert_eq!(ids(&hits), ["p1"]);
    let hits = q
        .where_op("tags", "array-contains-any", vec!["go", "rust"])
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(ids(&hits), ["p1", "p2"]);
}

#[test]
fn not_in_skips_missing_and_null_fields() {
    let conn = common::connection();
    let _ = conn.store().seed(
        "c",
        "id",
        vec![
            doc! {"id": "a", "k": 1},
            doc! {"id": "b", "k": 2},
            doc! {"id": "c", "k": Bson::Null},
            doc! {"id": "d"},
        ],
    );
    let docs = conn.table("c").where_op("k", "not-in", vec![1]).unwrap().get().unwrap();
    assert_eq!(ids(&docs), ["b"]);
}

#[test]
fn in_set_over_limit_is_a_store_error() {
    let conn = seeded(2);
    let values: Vec<i32> = (0..31).collect();
    let err = conn.table("users").where_in("age", values).unwrap().get().unwrap_err();
    assert!(matches!(err, DbError::Store(_)));
}

#[test]
fn nested_groups_are_anded_and_tracked() {
    let conn = seeded(8);
    let q = conn
        .table("users")
        .where_eq("team", "blue")
        .unwrap()
        .where_nested(|g| g.where_op("age", ">", 19)?.where_op("age", "<=", 23))
        .unwrap();
    assert!(matches!(q.wheres().last(), Some(WhereClause::Nested(inner)) if inner.len() == 2));
    let docs = q.get().unwrap();
    assert_eq!(ids(&docs), ["u04", "u06"]);
}

#[test]
fn projection_keeps_selected_fields() {
    let conn = seeded(2);
    let docs = conn.table("users").select(["name"]).get().unwrap();
    assert_eq!(docs[0].data.keys().collect::<Vec<_>>(), ["name"]);
    let docs = conn.table("users").select(["*"]).get().unwrap();
    assert!(docs[0].data.contains_key("age"));
}

#[test]
fn first_and_find() {
    let conn = seeded(3);
    let first = conn.table("users").order_by("age", Order::Desc).first().unwrap().unwrap();
    assert_eq!(first.id.as_str(), "u03");
    let found = conn.table("users").find("u02").unwrap();
    assert_eq!(found.get("name"), Some(&Bson::String("user2".into())));
    let err = conn.table("users").find("zz").unwrap_err();
    assert!(matches!(err, DbError::NotFound { ref collection, ref id } if collection == "users" && id == "zz"));
}

#[test]
fn scope_narrows_without_naming_documents() {
    let conn = seeded(4);
    let q = conn.table("users").scope(doc! {"team": "red"});
    assert!(q.identifiers().is_empty());
    assert_eq!(q.count().unwrap(), 2);
}

#[test]
fn prefix_is_applied_to_collections() {
    let conn = common::connection_with_prefix("t_");
    let id = conn.table("users").insert(doc! {"name": "x"}).unwrap();
    assert!(conn.store().collection_names().contains(&"t_users".to_string()));
    assert!(conn.table("users").find(id).is_ok());
}

#[test]
fn bench_lines_are_emitted_per_store_query() {
    let conn = seeded(3);
    let _g = devlog::enable_thread_sink();
    let _ = conn.table("users").limit(2).get().unwrap();
    let _ = conn.table("users").count().unwrap();
    let recs = devlog::bench_records();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["op"], "get");
    assert_eq!(recs[0]["result_count"], 2);
    assert_eq!(recs[1]["op"], "count");
    assert_eq!(recs[1]["collection"], "users");
}
