#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sqlcraft::{
    BatchFallback, Connection, Dialect, Entity, MappingError, MockHandle, Model, Operation,
    OrmError, Query, Record, SqlValue, Statement,
};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Entity)]
#[orm(table = "test")]
struct Test {
    #[orm(column)]
    id: Uuid,
    #[orm(column)]
    name: String,
    #[orm(column)]
    created_at: Option<DateTime<Utc>>,
    #[orm(column)]
    updated_at: Option<DateTime<Utc>>,
    note: String,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "labels")]
struct Label {
    #[orm(column)]
    name: String,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "daily", view = "SELECT name FROM daily_{region}")]
struct Daily {
    #[orm(column)]
    name: String,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "maybe")]
struct Maybe {
    #[orm(column)]
    id: Option<Uuid>,
    #[orm(column)]
    name: String,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "slugs")]
struct Slug {
    #[orm(column)]
    id: String,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "counters")]
struct Counter {
    #[orm(column)]
    id: i64,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "stamped")]
struct Stamped {
    #[orm(column)]
    id: Uuid,
    #[orm(column)]
    created_at: DateTime<Utc>,
    #[orm(column)]
    updated_at: DateTime<Utc>,
}

fn connection(dialect: Dialect) -> (Connection, MockHandle) {
    let mock = MockHandle::new();
    (Connection::from_handle(dialect, mock.clone()), mock)
}

fn named(name: &str) -> Test {
    Test {
        name: name.to_string(),
        ..Default::default()
    }
}

fn row(id: Uuid, name: &str) -> Record {
    Record::from_pairs([
        ("id", SqlValue::Uuid(id)),
        ("name", SqlValue::from(name)),
        ("created_at", SqlValue::Null),
        ("updated_at", SqlValue::Null),
    ])
}

#[tokio::test]
async fn create_writes_tagged_columns_in_order() {
    let (conn, mock) = connection(Dialect::MySql);
    let mut t = named("asdf");
    conn.create(Model::one(&mut t)).await.unwrap();

    let executed = mock.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].sql,
        "INSERT INTO test (id,name,created_at,updated_at) VALUES(?,?,?,?)"
    );
    assert_eq!(executed[0].args[0], SqlValue::Uuid(t.id));
    assert!(!t.id.is_nil());
    assert!(t.created_at.is_some());
    assert!(t.note.is_empty());
}

#[tokio::test]
async fn placeholders_are_translated_per_dialect() {
    let (pg, pg_mock) = connection(Dialect::Postgres);
    pg.create(Model::one(&mut named("a"))).await.unwrap();
    assert_eq!(
        pg_mock.last_sql().unwrap(),
        "INSERT INTO test (id,name,created_at,updated_at) VALUES($1,$2,$3,$4)"
    );

    let (ms, ms_mock) = connection(Dialect::MsSql);
    ms.create(Model::one(&mut named("a"))).await.unwrap();
    assert_eq!(
        ms_mock.last_sql().unwrap(),
        "INSERT INTO test (id,name,created_at,updated_at) VALUES(@p1,@p2,@p3,@p4)"
    );
}

#[tokio::test]
async fn bulk_insert_shares_one_prefix() {
    let (conn, mock) = connection(Dialect::Snowflake);
    let mut rows = vec![named("a"), named("b")];
    conn.create_many(Model::many(&mut rows)).await.unwrap();

    assert_eq!(
        mock.last_sql().unwrap(),
        "INSERT INTO test (id,name,created_at,updated_at) VALUES(?,?,?,?),(?,?,?,?)"
    );
    assert_ne!(rows[0].id, rows[1].id);

    conn.create_many_temp(Model::many(&mut rows)).await.unwrap();
    assert!(mock.last_sql().unwrap().starts_with("INSERT INTO test_TEMP"));
}

#[tokio::test]
async fn unsupported_operations_are_typed_errors() {
    let (conn, mock) = connection(Dialect::Postgres);
    let err = conn.create_update(Model::one(&mut named("a"))).await.unwrap_err();
    assert!(err.is_unsupported());
    assert!(matches!(
        err,
        OrmError::Unsupported {
            dialect: "postgres",
            operation: Operation::CreateUpdate
        }
    ));

    let err = conn
        .create_many_update(Model::many(&mut vec![named("a")]))
        .await
        .unwrap_err();
    assert!(err.is_unsupported());

    let (mysql, _) = connection(Dialect::MySql);
    let err = mysql
        .create_many_temp(Model::many(&mut vec![named("a")]))
        .await
        .unwrap_err();
    assert!(err.is_unsupported());

    let (mock_conn, _) = connection(Dialect::Mock);
    assert!(!mock_conn.supports(Operation::SelectOne));
    assert!(mock_conn
        .truncate(Model::one(&mut named("a")))
        .await
        .unwrap_err()
        .is_unsupported());

    assert!(mock.executed().is_empty());
}

#[tokio::test]
async fn upsert_on_mysql() {
    let (conn, mock) = connection(Dialect::MySql);
    conn.create_update(Model::one(&mut named("a"))).await.unwrap();
    assert!(mock
        .last_sql()
        .unwrap()
        .ends_with(") ON DUPLICATE KEY UPDATE id=VALUES(id),name=VALUES(name),created_at=VALUES(created_at),updated_at=VALUES(updated_at)"));
}

#[tokio::test]
async fn update_and_destroy() {
    let (conn, mock) = connection(Dialect::Odbc);
    let id = Uuid::new_v4();
    let mut t = Test {
        id,
        ..named("renamed")
    };

    conn.update(Model::one(&mut t)).await.unwrap();
    assert_eq!(
        mock.last_sql().unwrap(),
        "UPDATE test SET name = ?, updated_at = ? WHERE id=?"
    );
    assert!(t.updated_at.is_some());

    conn.destroy(Model::one(&mut t)).await.unwrap();
    let last = mock.executed().pop().unwrap();
    assert_eq!(last.sql, "DELETE FROM test WHERE id=?");
    assert_eq!(last.args, vec![SqlValue::Uuid(id)]);

    let mut rows = vec![t.clone(), Test { id: Uuid::new_v4(), ..named("b") }];
    conn.destroy_many(Model::many(&mut rows)).await.unwrap();
    assert_eq!(mock.last_sql().unwrap(), "DELETE FROM test WHERE id IN (?,?)");

    conn.truncate(Model::one(&mut t)).await.unwrap();
    assert_eq!(mock.last_sql().unwrap(), "TRUNCATE TABLE test");
}

#[tokio::test]
async fn update_touching_no_rows_is_no_rows() {
    let (conn, mock) = connection(Dialect::MySql);
    mock.set_affected(0);
    let id = Uuid::new_v4();
    let err = conn
        .update(Model::one(&mut Test { id, ..named("a") }))
        .await
        .unwrap_err();
    assert!(err.is_no_rows());
    assert!(err.to_string().contains(&format!("id='{id}'")));
}

#[tokio::test]
async fn destroy_many_without_identity_names_the_field() {
    let (conn, mock) = connection(Dialect::MySql);
    let mut labels = vec![Label { name: "a".into() }];
    let err = conn.destroy_many(Model::many(&mut labels)).await.unwrap_err();
    assert!(matches!(
        err,
        OrmError::Mapping(MappingError::MissingIdentity { table: "labels" })
    ));
    assert!(err.to_string().contains("identity field named `id`"));
    assert!(mock.executed().is_empty());
}

#[tokio::test]
async fn unset_nullable_identity_is_missing() {
    let (conn, mock) = connection(Dialect::MySql);
    let missing = |err: OrmError| {
        matches!(
            err,
            OrmError::Mapping(MappingError::MissingIdentity { table: "maybe" })
        )
    };

    let mut one = Maybe::default();
    assert!(missing(conn.destroy(Model::one(&mut one)).await.unwrap_err()));
    assert!(missing(conn.update(Model::one(&mut one)).await.unwrap_err()));

    let mut rows = vec![Maybe::default(), Maybe::default()];
    assert!(missing(
        conn.destroy_many(Model::many(&mut rows)).await.unwrap_err()
    ));

    let id = Uuid::new_v4();
    let mut partial = vec![
        Maybe {
            id: Some(id),
            ..Default::default()
        },
        Maybe::default(),
    ];
    assert!(missing(
        conn.destroy_many(Model::many(&mut partial)).await.unwrap_err()
    ));
    assert!(mock.executed().is_empty());

    conn.create(Model::one(&mut one)).await.unwrap();
    assert!(one.id.is_some());
    conn.destroy(Model::one(&mut one)).await.unwrap();
    let last = mock.executed().pop().unwrap();
    assert_eq!(last.sql, "DELETE FROM maybe WHERE id=?");
    assert_eq!(last.args, vec![SqlValue::Uuid(one.id.unwrap())]);
}

#[tokio::test]
async fn destroy_many_requires_uuid_identity() {
    let (conn, mock) = connection(Dialect::Snowflake);

    let mut slugs = vec![Slug { id: "a".into() }, Slug { id: "b".into() }];
    let err = conn.destroy_many(Model::many(&mut slugs)).await.unwrap_err();
    assert!(matches!(
        err,
        OrmError::Mapping(MappingError::IdentityNotUuid {
            table: "slugs",
            column: "id"
        })
    ));
    assert!(err.is_mapping());

    let mut counters = vec![Counter { id: 1 }, Counter { id: 2 }];
    let err = conn
        .destroy_many(Model::many(&mut counters))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Mapping(MappingError::IdentityNotUuid {
            table: "counters",
            ..
        })
    ));
    assert!(mock.executed().is_empty());

    // single deletes only need an identity, not a UUID
    conn.destroy(Model::one(&mut Counter { id: 7 })).await.unwrap();
    assert_eq!(mock.executed()[0].args, vec![SqlValue::Int(7)]);
}

#[tokio::test]
async fn create_many_prepares_every_row() {
    let (conn, mock) = connection(Dialect::MySql);
    let before = Utc::now();

    let mut rows = vec![named("a"), named("b"), named("c")];
    conn.create_many(Model::many(&mut rows)).await.unwrap();
    for row in &rows {
        assert!(!row.id.is_nil());
        let created = row.created_at.expect("created_at touched");
        let updated = row.updated_at.expect("updated_at touched");
        assert!(before <= created);
        assert!(created <= updated);
    }
    assert_ne!(rows[0].id, rows[1].id);
    assert_ne!(rows[1].id, rows[2].id);

    let mut stamped = vec![Stamped::default(), Stamped::default()];
    conn.create_many(Model::many(&mut stamped)).await.unwrap();
    for row in &stamped {
        assert!(!row.id.is_nil());
        assert!(before <= row.created_at);
        assert!(row.created_at <= row.updated_at);
    }

    let last = mock.executed().pop().unwrap();
    assert_eq!(
        last.sql,
        "INSERT INTO stamped (id,created_at,updated_at) VALUES(?,?,?),(?,?,?)"
    );
    assert_eq!(last.args[1], SqlValue::from(stamped[0].created_at));
}

#[tokio::test]
async fn driver_failures_carry_the_statement() {
    let (conn, mock) = connection(Dialect::MySql);
    mock.fail_on("INSERT INTO test");
    let err = conn.create(Model::one(&mut named("boom"))).await.unwrap_err();
    match err {
        OrmError::Execution { statement, source } => {
            assert!(statement.starts_with("INSERT INTO test (id,name,created_at,updated_at) VALUES('"));
            assert!(statement.contains("'boom'"));
            assert!(matches!(*source, OrmError::Driver(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn failed_batch_fails_by_default() {
    let (conn, mock) = connection(Dialect::MySql);
    mock.fail_on("),(");
    let err = conn
        .create_many(Model::many(&mut vec![named("a"), named("b")]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Execution { .. }));
    assert_eq!(mock.executed().len(), 1);
}

#[tokio::test]
async fn row_by_row_fallback_retries_each_row() {
    let mock = MockHandle::new();
    let conn = Connection::from_handle(Dialect::MySql, mock.clone())
        .with_batch_fallback(BatchFallback::RowByRow);
    mock.fail_on("),(");

    let mut rows = vec![named("a"), named("b")];
    conn.create_many(Model::many(&mut rows)).await.unwrap();

    let executed = mock.executed();
    assert_eq!(executed.len(), 3);
    assert_eq!(executed[1].args[0], SqlValue::Uuid(rows[0].id));
    assert_eq!(executed[2].args[0], SqlValue::Uuid(rows[1].id));
}

#[tokio::test]
async fn row_by_row_fallback_stops_at_first_failing_row() {
    let mock = MockHandle::new();
    let conn = Connection::from_handle(Dialect::MySql, mock.clone())
        .with_batch_fallback(BatchFallback::RowByRow);
    mock.fail_on("INSERT INTO test");

    let err = conn
        .create_many(Model::many(&mut vec![named("a"), named("b"), named("c")]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Execution { .. }));
    // batch + first row
    assert_eq!(mock.executed().len(), 2);
}

#[tokio::test]
async fn select_many_uses_limit_after_order_by() {
    let (conn, mock) = connection(Dialect::MySql);
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    mock.push_rows(vec![row(a, "x"), row(b, "y")]);

    let mut out: Vec<Test> = Vec::new();
    let query = Query::new()
        .filter("name <> ?", ["z"])
        .order_by("name")
        .limit(5);
    conn.select_many(Model::many(&mut out), &query).await.unwrap();

    assert_eq!(
        mock.last_sql().unwrap(),
        "SELECT id,name,created_at,updated_at FROM test WHERE name <> ? ORDER BY name LIMIT 5"
    );
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].id, a);
    assert_eq!(out[1].name, "y");
    assert!(out[0].note.is_empty());
}

#[tokio::test]
async fn select_on_mssql_uses_top() {
    let (conn, mock) = connection(Dialect::MsSql);
    let id = Uuid::new_v4();
    mock.push_rows(vec![row(id, "first")]);

    let mut t = Test::default();
    let query = Query::new().filter("name = ?", ["first"]).limit(1);
    conn.select_one(Model::one(&mut t), &query).await.unwrap();

    assert_eq!(
        mock.last_sql().unwrap(),
        "SELECT TOP 1 id,name,created_at,updated_at FROM test WHERE name = @p1"
    );
    assert_eq!(t.id, id);
    assert_eq!(t.name, "first");
}

#[tokio::test]
async fn select_one_without_rows_is_no_rows() {
    let (conn, _mock) = connection(Dialect::Postgres);
    let mut t = Test::default();
    let err = conn
        .select_one(Model::one(&mut t), &Query::new())
        .await
        .unwrap_err();
    assert!(err.is_no_rows());
}

#[tokio::test]
async fn in_lists_expand_before_translation() {
    let (conn, mock) = connection(Dialect::Postgres);
    let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let mut out: Vec<Test> = Vec::new();
    let query = Query::new()
        .filter("id IN (?)", [SqlValue::from(ids.clone())])
        .filter("name = ?", ["x"]);
    conn.select_many(Model::many(&mut out), &query).await.unwrap();

    let last = mock.executed().pop().unwrap();
    assert_eq!(
        last.sql,
        "SELECT id,name,created_at,updated_at FROM test WHERE id IN ($1, $2, $3) AND name = $4"
    );
    assert_eq!(last.args.len(), 4);
    assert_eq!(last.args[2], SqlValue::Uuid(ids[2]));
}

#[tokio::test]
async fn empty_in_list_is_rejected() {
    let (conn, mock) = connection(Dialect::MySql);
    let mut out: Vec<Test> = Vec::new();
    let query = Query::new().filter("id IN (?)", [SqlValue::List(Vec::new())]);
    let err = conn
        .select_many(Model::many(&mut out), &query)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidQuery(_)));
    assert!(mock.executed().is_empty());
}

#[tokio::test]
async fn raw_query_overrides_composition() {
    let (conn, mock) = connection(Dialect::MySql);
    let mut out: Vec<Test> = Vec::new();
    let query = Query::raw("SELECT * FROM test WHERE name LIKE ?", ["a%"]).limit(3);
    conn.select_many(Model::many(&mut out), &query).await.unwrap();
    assert_eq!(
        mock.last_sql().unwrap(),
        "SELECT * FROM test WHERE name LIKE ?"
    );
}

#[tokio::test]
async fn sql_view_fills_collection() {
    let (conn, mock) = connection(Dialect::Snowflake);
    mock.push_rows(vec![
        Record::from_pairs([("name", "a")]),
        Record::from_pairs([("name", "b")]),
    ]);
    let format = HashMap::from([("region".to_string(), "eu".to_string())]);

    let mut out: Vec<Daily> = Vec::new();
    conn.sql_view(Model::many(&mut out), Some(&format)).await.unwrap();
    assert_eq!(mock.last_sql().unwrap(), "SELECT name FROM daily_eu");
    assert_eq!(out.len(), 2);

    let mut labels: Vec<Label> = Vec::new();
    let err = conn
        .sql_view(Model::many(&mut labels), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::Mapping(MappingError::MissingSqlView { table: "labels" })
    ));
}

#[tokio::test]
async fn passthrough_exec_and_named_exec() {
    let (conn, mock) = connection(Dialect::Postgres);
    let mut stmt = Statement::new("DELETE FROM test WHERE name = ");
    stmt.push_bind("x");
    conn.exec(&stmt).await.unwrap();
    assert_eq!(mock.last_sql().unwrap(), "DELETE FROM test WHERE name = $1");

    let params = HashMap::from([
        ("name".to_string(), SqlValue::from("n")),
        ("id".to_string(), SqlValue::Uuid(Uuid::nil())),
    ]);
    conn.named_exec("UPDATE test SET name = :name WHERE id = :id", &params)
        .await
        .unwrap();
    let last = mock.executed().pop().unwrap();
    assert_eq!(last.sql, "UPDATE test SET name = $1 WHERE id = $2");
    assert_eq!(last.args[0], SqlValue::from("n"));

    let written = conn
        .write_tuples("INSERT INTO labels (name) VALUES", &["('a')".to_string(), "('b')".to_string()])
        .await
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(
        mock.last_sql().unwrap(),
        "INSERT INTO labels (name) VALUES('a'),('b')"
    );
}

#[tokio::test]
async fn debug_flag_reaches_the_handle() {
    let (conn, mock) = connection(Dialect::MySql);
    assert!(!conn.debug());
    conn.set_debug(true);
    assert!(sqlcraft::DbHandle::debug(&mock));
    conn.close().await.unwrap();
    assert!(mock.is_closed());
    assert!(conn.ping().await.is_err());
}
