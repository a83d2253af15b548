// tests/session/session_test.rs
use std::sync::Arc;

use catdb::alias::{Alias, Slot};
use catdb::constraint::{Constraint, Constraints, Operator};
use catdb::db::{Connection, SqliteConnection, Value};
use catdb::informativity::Requestable;
use catdb::planner::SelectRequest;
use catdb::schema::{Column, Schema, Table};
use catdb::{Error, Session};

fn shop() -> Schema {
    Schema::new(
        "shop",
        vec![
            Table::new("customers")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("name", "text"))
                .with_column(Column::new("country", "text")),
            Table::new("stores")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("city", "text")),
            Table::new("orders")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("customer_id", "integer").references("customers", "id"))
                .with_column(Column::new("store_id", "integer").references("stores", "id"))
                .with_column(Column::new("status", "text")),
        ],
        vec![],
    )
}

fn seeded() -> SqliteConnection {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT, country TEXT);
         CREATE TABLE stores (id INTEGER PRIMARY KEY, city TEXT);
         CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, store_id INTEGER, status TEXT);
         INSERT INTO customers VALUES (1, 'Ann', 'US'), (2, 'Bob', 'US'), (3, 'Cy', 'FR');
         INSERT INTO stores VALUES (1, 'Boston'), (2, 'Lyon'), (3, 'Boston');
         INSERT INTO orders VALUES
            (1, 1, 1, 'shipped'),
            (2, 1, 2, 'shipped'),
            (3, 2, 1, 'shipped'),
            (4, 3, 2, 'pending'),
            (5, 2, 2, 'shipped');",
    )
    .unwrap();
    conn
}

fn session() -> Session<SqliteConnection> {
    Session::new(seeded(), Arc::new(shop())).unwrap().with_seed(11)
}

fn orders() -> Alias {
    Alias::table("orders")
}

fn customers() -> Alias {
    Alias::table("customers")
}

fn requestable(session: &Session<SqliteConnection>) -> Requestable {
    session.requestable([orders(), customers(), Alias::table("stores")].iter())
}

#[test]
fn test_requestable_skips_keys() {
    let session = session();
    let requestable = requestable(&session);
    assert_eq!(requestable.columns(&orders()), ["status"]);
    assert_eq!(requestable.columns(&customers()), ["name", "country"]);
    assert!(requestable.columns(&Alias::table("products")).is_empty());
}

#[test]
fn test_conversation_picks_join_then_slot() {
    let mut session = session();
    session.build_informativity().unwrap();
    let requestable = requestable(&session);
    let target = orders();

    // Nothing joined yet: look for a table, answered from the baseline.
    let none = Constraints::new();
    assert!(session.should_join_next_table(&target, &[], &none, &requestable));
    let table = session
        .best_join_table(&target, &[], &none, &requestable)
        .unwrap();
    assert_eq!(table, Some(customers()));

    // customers joined and narrowed to the US: 4 orders, all shipped, two
    // customers with two orders each.
    let joined = vec![customers()];
    let constraints = Constraints::new().with(customers(), "country", Constraint::eq("US"));
    assert!(!session.should_join_next_table(&target, &joined, &constraints, &requestable));
    let slot = session
        .next_slot(&target, &joined, &constraints, &requestable)
        .unwrap();
    assert_eq!(slot, Some(Slot::new(customers(), "name")));
}

#[test]
fn test_should_join_once_scope_is_answered() {
    let session = session();
    let requestable = requestable(&session);
    let constraints = Constraints::new()
        .with(orders(), "status", Constraint::eq("shipped"))
        .with(customers(), "name", Constraint::eq("Ann"))
        .with(customers(), "country", Constraint::eq("US"));
    assert!(session.should_join_next_table(&orders(), &[customers()], &constraints, &requestable));
}

#[test]
fn test_best_join_table_probes_joined_scope() {
    let mut session = session();
    session.build_informativity().unwrap();
    let requestable = requestable(&session);
    let constraints = Constraints::new().with(customers(), "country", Constraint::eq("US"));

    let table = session
        .best_join_table(&orders(), &[customers()], &constraints, &requestable)
        .unwrap();
    assert_eq!(table, Some(Alias::table("stores")));

    // The probe table does not outlive the decision.
    let conn = session.connection().unwrap();
    let rows = conn
        .query(
            "SELECT name FROM sqlite_master WHERE name = 'matches__probe'",
            &[],
        )
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_dont_care_columns_are_not_asked_again() {
    let mut session = session();
    session.build_informativity().unwrap();
    let requestable = requestable(&session);
    let constraints = Constraints::new()
        .with(customers(), "name", Constraint::dont_care())
        .with(orders(), "status", Constraint::dont_care());

    let slot = session
        .next_slot(&orders(), &[customers()], &constraints, &requestable)
        .unwrap();
    assert_eq!(slot, Some(Slot::new(customers(), "country")));
}

#[test]
fn test_next_slot_without_options() {
    let mut session = session();
    session.build_informativity().unwrap();
    let requestable = Requestable::new();
    let slot = session
        .next_slot(&orders(), &[], &Constraints::new(), &requestable)
        .unwrap();
    assert_eq!(slot, None);
}

#[test]
fn test_select_into_replaces_previous_table() {
    let mut session = session();
    let constraints = Constraints::new().with(customers(), "country", Constraint::eq("US"));
    let request = SelectRequest::new(orders()).constraints(constraints);

    let plan = session.select_into(&request, "us_orders", false).unwrap();
    assert!(plan.joined.contains(&customers()));
    session.select_into(&request, "us_orders", false).unwrap();

    let conn = session.connection().unwrap();
    let rows = conn.query("SELECT COUNT(*) AS n FROM us_orders", &[]).unwrap();
    assert_eq!(rows[0]["n"], Value::Int(4));
}

#[test]
fn test_select_into_rejects_bad_names() {
    let mut session = session();
    let err = session
        .select_into(&SelectRequest::new(orders()), "", false)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier(_)));
}

#[test]
fn test_select_and_select_one() {
    let mut session = session();
    let constraints = Constraints::new().with(orders(), "status", Constraint::eq("pending"));
    let rows = session
        .select(&SelectRequest::new(orders()).constraints(constraints))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["orders__id"], Value::Int(4));

    let first = session
        .select_one(&SelectRequest::new(customers()))
        .unwrap()
        .unwrap();
    assert_eq!(first["customers__name"], Value::from("Ann"));
}

#[test]
fn test_sample_respects_constraints() {
    let mut session = session();
    let constraints = Constraints::new().with(customers(), "country", Constraint::eq("FR"));
    for _ in 0..5 {
        let row = session.sample(&orders(), &constraints).unwrap().unwrap();
        assert_eq!(row["orders__id"], Value::Int(4));
    }
}

#[test]
fn test_join_candidates_and_constraints() {
    let session = session();
    assert_eq!(
        session.join_candidates(&orders(), true),
        vec![customers(), Alias::table("stores")]
    );
    assert!(session.join_candidates(&customers(), true).is_empty());
    assert_eq!(session.join_candidates(&customers(), false), vec![orders()]);

    let constraint = session
        .build_constraint(vec![Value::from("US"), Value::from("FR")], "IN", false)
        .unwrap();
    assert_eq!(constraint.operator, Operator::In);
    assert!(session.build_constraint(vec![], "LIKE", false).is_err());
}

#[test]
fn test_can_cast_on_sqlite() {
    let mut session = session();
    assert!(session.can_cast(&Value::from("12"), "INTEGER").unwrap());
    assert!(session.can_cast(&Value::Null, "INTEGER").unwrap());
    assert!(matches!(
        session.can_cast(&Value::from("1"), "INTEGER); DROP TABLE orders; --"),
        Err(Error::InvalidIdentifier(_))
    ));
}
