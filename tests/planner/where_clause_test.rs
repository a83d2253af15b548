// tests/planner/where_clause_test.rs
use catdb::alias::Alias;
use catdb::constraint::{Constraint, Constraints, Operator, DONT_CARE};
use catdb::db::{Connection, SqliteConnection, Value};
use catdb::graph::DependencyGraph;
use catdb::planner::{build_where, BoundValue, JoinPlanner, SelectRequest};
use catdb::schema::{Column, Schema, Table};
use catdb::sql::Dialect;

fn products() -> Alias {
    Alias::table("products")
}

fn catalog() -> Schema {
    Schema::new(
        "catalog",
        vec![Table::new("products")
            .with_primary_key(&["id"])
            .with_column(Column::new("id", "integer").not_null())
            .with_column(Column::new("name", "text"))
            .with_column(Column::new("colour", "text"))
            .with_column(Column::new("price", "integer"))
            .with_column(Column::new("list_price", "integer"))],
        vec![],
    )
}

fn seeded() -> SqliteConnection {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, colour TEXT, price INTEGER, list_price INTEGER);
         INSERT INTO products VALUES
            (1, 'mug', 'red', 8, 10),
            (2, 'cap', 'blue', 15, 15),
            (3, 'scarf', 'red', 20, 25),
            (4, 'pen', NULL, 2, 2);",
    )
    .unwrap();
    conn
}

fn names(conn: &mut SqliteConnection, constraints: Constraints) -> Vec<Value> {
    let schema = catalog();
    let graph = DependencyGraph::from_schema(&schema);
    let plan = JoinPlanner::new(&schema, &graph)
        .plan(&SelectRequest::new(products()).constraints(constraints))
        .unwrap();
    let sql = plan.to_sql(conn.dialect());
    conn.query(&sql, &plan.values())
        .unwrap()
        .into_iter()
        .map(|row| row["products__name"].clone())
        .collect()
}

#[test]
fn test_dont_care_marker_is_a_no_op() {
    let constraint = Constraint::build(vec![Value::from(DONT_CARE)], Operator::Eq, false);
    assert!(constraint.is_dont_care());

    let constraints = Constraints::new().with(products(), "colour", constraint);
    assert!(!constraints.has_real());
    assert!(constraints.is_constrained(&products(), "colour"));

    let clause = build_where(&constraints, &[products()]);
    assert!(clause.condition.is_none());
    assert!(clause.params.is_empty());

    let mut conn = seeded();
    assert_eq!(names(&mut conn, constraints).len(), 4);
}

#[test]
fn test_constraints_outside_join_are_ignored() {
    let constraints =
        Constraints::new().with(Alias::table("suppliers"), "name", Constraint::eq("acme"));
    let clause = build_where(&constraints, &[products()]);
    assert!(clause.condition.is_none());
}

#[test]
fn test_scalar_and_list_parameters() {
    let constraints = Constraints::new()
        .with(
            products(),
            "colour",
            Constraint::in_list(vec![Value::from("red"), Value::from("blue")]),
        )
        .with(
            products(),
            "price",
            Constraint::build(vec![Value::Int(10)], Operator::Gte, false),
        );
    let clause = build_where(&constraints, &[products()]);

    assert_eq!(
        clause.condition.as_ref().unwrap().to_sql(Dialect::Sqlite),
        "\"products\".\"colour\" IN (?1, ?2) AND \"products\".\"price\" >= ?3"
    );
    assert_eq!(clause.params[0].name, "param0");
    assert_eq!(
        clause.params[0].value,
        BoundValue::List(vec![Value::from("red"), Value::from("blue")])
    );
    assert_eq!(clause.params[1].name, "param1");
    assert_eq!(clause.params[1].value, BoundValue::Scalar(Value::Int(10)));
    assert_eq!(
        clause.values(),
        vec![Value::from("red"), Value::from("blue"), Value::Int(10)]
    );

    let mut conn = seeded();
    assert_eq!(
        names(&mut conn, constraints),
        vec![Value::from("cap"), Value::from("scarf")]
    );
}

#[test]
fn test_same_column_constrained_twice() {
    let constraints = Constraints::new()
        .with(
            products(),
            "price",
            Constraint::build(vec![Value::Int(5)], Operator::Gt, false),
        )
        .with(
            products(),
            "price",
            Constraint::build(vec![Value::Int(20)], Operator::Lt, false),
        );

    let mut conn = seeded();
    assert_eq!(
        names(&mut conn, constraints),
        vec![Value::from("mug"), Value::from("cap")]
    );
}

#[test]
fn test_reference_compares_against_column() {
    let constraint = Constraint::build(
        vec![Value::from("products__list_price")],
        Operator::Eq,
        true,
    );
    let constraints = Constraints::new().with(products(), "price", constraint);
    let clause = build_where(&constraints, &[products()]);
    assert!(clause.params.is_empty());

    let mut conn = seeded();
    assert_eq!(
        names(&mut conn, constraints),
        vec![Value::from("cap"), Value::from("pen")]
    );
}

#[test]
fn test_mixed_dont_care_and_value() {
    let constraint = Constraint::build(
        vec![Value::from(DONT_CARE), Value::from("red")],
        Operator::In,
        false,
    );
    assert!(!constraint.is_dont_care());
    let constraints = Constraints::new().with(products(), "colour", constraint);

    let mut conn = seeded();
    assert_eq!(
        names(&mut conn, constraints),
        vec![Value::from("mug"), Value::from("scarf")]
    );
}
