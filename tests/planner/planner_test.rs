// tests/planner/planner_test.rs
use catdb::alias::Alias;
use catdb::constraint::{Constraint, Constraints, Operator};
use catdb::db::Value;
use catdb::graph::DependencyGraph;
use catdb::planner::{JoinPlanner, SelectRequest, SelectSpec};
use catdb::schema::{Column, Schema, Table};
use catdb::sql::Dialect;
use indexmap::IndexMap;

fn id_table(name: &str) -> Table {
    Table::new(name)
        .with_primary_key(&["id"])
        .with_column(Column::new("id", "integer").not_null())
}

/// orders references customers twice; customers reference countries.
fn shop() -> Schema {
    Schema::new(
        "shop",
        vec![
            id_table("countries").with_column(Column::new("name", "text")),
            id_table("customers")
                .with_column(Column::new("name", "text"))
                .with_column(Column::new("country_id", "integer").references("countries", "id")),
            id_table("orders")
                .with_column(Column::new("billing_id", "integer").references("customers", "id"))
                .with_column(Column::new("shipping_id", "integer").references("customers", "id"))
                .with_column(Column::new("status", "text")),
        ],
        vec![],
    )
}

fn billing(table: &str) -> Alias {
    Alias::via("orders", "billing_id", table)
}

fn shipping(table: &str) -> Alias {
    Alias::via("orders", "shipping_id", table)
}

#[test]
fn test_no_joins_selects_target_only() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);
    let planner = JoinPlanner::new(&schema, &graph);

    let order = planner.order_joins(&Alias::table("orders"), &[]);
    assert_eq!(order.aliases, vec![Alias::table("orders")]);
    assert!(order.unreachable.is_empty());
}

#[test]
fn test_same_table_joined_twice_through_different_keys() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);
    let request = SelectRequest::new(Alias::table("orders"))
        .join(billing("customers"))
        .join(shipping("customers"));
    let plan = JoinPlanner::new(&schema, &graph).plan(&request).unwrap();

    assert_eq!(
        plan.joined,
        vec![
            Alias::table("orders"),
            billing("customers"),
            shipping("customers")
        ]
    );
    let sql = plan.to_sql(Dialect::Postgres);
    assert!(sql.contains(
        "LEFT JOIN \"customers\" AS \"orders__billing_id___customers\" ON \"orders\".\"billing_id\" = \"orders__billing_id___customers\".\"id\""
    ));
    assert!(sql.contains(
        "LEFT JOIN \"customers\" AS \"orders__shipping_id___customers\" ON \"orders\".\"shipping_id\" = \"orders__shipping_id___customers\".\"id\""
    ));
    assert!(sql.contains(
        "\"orders__billing_id___customers\".\"name\" AS \"orders__billing_id___customers__name\""
    ));
}

#[test]
fn test_prefix_carries_along_multi_hop_path() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);
    let planner = JoinPlanner::new(&schema, &graph);

    let order = planner.order_joins(&Alias::table("orders"), &[shipping("countries")]);
    assert_eq!(
        order.aliases,
        vec![
            Alias::table("orders"),
            shipping("customers"),
            shipping("countries")
        ]
    );

    let plan = planner
        .plan(&SelectRequest::new(Alias::table("orders")).join(shipping("countries")))
        .unwrap();
    assert!(plan.dropped_aliases.is_empty());
    assert!(plan.to_sql(Dialect::Postgres).contains(
        "ON \"orders__shipping_id___customers\".\"country_id\" = \"orders__shipping_id___countries\".\"id\""
    ));
}

#[test]
fn test_constraint_on_prefixed_alias_filters_that_branch() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);
    let constraints = Constraints::new()
        .with(billing("countries"), "name", Constraint::eq("France"))
        .with(Alias::table("orders"), "status", Constraint::dont_care());
    let plan = JoinPlanner::new(&schema, &graph)
        .plan(&SelectRequest::new(Alias::table("orders")).constraints(constraints))
        .unwrap();

    let sql = plan.to_sql(Dialect::Sqlite);
    assert!(sql.contains("WHERE \"orders__billing_id___countries\".\"name\" = ?1"));
    assert!(!sql.contains("\"status\" ="));
    assert_eq!(plan.values(), vec![Value::from("France")]);
}

#[test]
fn test_unreachable_table_is_dropped_not_fatal() {
    let mut schema = shop();
    schema.tables.push(id_table("audit_log"));
    let graph = DependencyGraph::from_schema(&schema);
    let constraints =
        Constraints::new().with(Alias::table("audit_log"), "id", Constraint::eq(1i64));
    let plan = JoinPlanner::new(&schema, &graph)
        .plan(&SelectRequest::new(Alias::table("orders")).constraints(constraints))
        .unwrap();

    assert_eq!(plan.dropped_aliases, vec![Alias::table("audit_log")]);
    assert_eq!(plan.joined, vec![Alias::table("orders")]);
    assert!(plan.params.is_empty());
}

#[test]
fn test_distinct_on_per_dialect() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);
    let request = SelectRequest::new(Alias::table("orders"))
        .spec(SelectSpec::DistinctOn("status".into()))
        .unordered();
    let plan = JoinPlanner::new(&schema, &graph).plan(&request).unwrap();

    let postgres = plan.to_sql(Dialect::Postgres);
    assert!(postgres.starts_with(
        "SELECT DISTINCT ON (\"orders\".\"status\")\n  \"orders\".\"status\" AS \"orders__status\""
    ));

    let sqlite = plan.to_sql(Dialect::Sqlite);
    assert!(!sqlite.contains("DISTINCT ON"));
    assert!(sqlite.ends_with("GROUP BY \"orders\".\"status\""));
}

#[test]
fn test_explicit_columns() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);
    let mut columns = IndexMap::new();
    columns.insert(billing("customers"), vec!["name".to_string()]);
    columns.insert(Alias::table("orders"), vec!["status".to_string()]);
    let request = SelectRequest::new(Alias::table("orders"))
        .join(billing("customers"))
        .spec(SelectSpec::Columns(columns))
        .unordered();
    let plan = JoinPlanner::new(&schema, &graph).plan(&request).unwrap();

    assert!(plan.to_sql(Dialect::Postgres).starts_with(
        "SELECT\n  \"orders__billing_id___customers\".\"name\" AS \"orders__billing_id___customers__name\",\n  \"orders\".\"status\" AS \"orders__status\"\nFROM"
    ));
}

#[test]
fn test_unknown_column_in_spec_fails() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);
    let request = SelectRequest::new(Alias::table("orders"))
        .spec(SelectSpec::DistinctOn("colour".into()));
    let result = JoinPlanner::new(&schema, &graph).plan(&request);
    assert!(matches!(
        result,
        Err(catdb::Error::UnknownColumn { .. })
    ));
}

#[test]
fn test_self_join_through_foreign_key() {
    let schema = Schema::new(
        "staff",
        vec![id_table("employees")
            .with_column(Column::new("name", "text"))
            .with_column(Column::new("manager_id", "integer").references("employees", "id"))],
        vec![],
    );
    let graph = DependencyGraph::from_schema(&schema);
    let managers = Alias::via("employees", "manager_id", "employees");
    let request = SelectRequest::new(Alias::table("employees")).join(managers.clone());
    let plan = JoinPlanner::new(&schema, &graph).plan(&request).unwrap();

    assert_eq!(plan.joined, vec![Alias::table("employees"), managers]);
    assert!(plan.dropped_aliases.is_empty());
    assert!(plan.to_sql(Dialect::Postgres).contains(
        "LEFT JOIN \"employees\" AS \"employees__manager_id___employees\" ON \"employees\".\"manager_id\" = \"employees__manager_id___employees\".\"id\""
    ));
}

#[test]
fn test_referenced_alias_is_joined() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);
    let constraints = Constraints::new().with(
        Alias::table("orders"),
        "status",
        Constraint::build(vec![Value::from("countries__name")], Operator::Eq, true),
    );
    let request = SelectRequest::new(Alias::table("orders")).constraints(constraints);
    let plan = JoinPlanner::new(&schema, &graph).plan(&request).unwrap();

    assert!(plan.joined.contains(&Alias::table("countries")));
    assert!(plan.dropped_aliases.is_empty());
    assert!(plan
        .to_sql(Dialect::Postgres)
        .contains("\"orders\".\"status\" = \"countries\".\"name\""));
    assert!(plan.params.is_empty());
}

#[test]
fn test_reference_to_unreachable_alias_is_dropped() {
    let mut schema = shop();
    schema.tables.push(id_table("suppliers").with_column(Column::new("name", "text")));
    let graph = DependencyGraph::from_schema(&schema);
    let constraints = Constraints::new()
        .with(
            Alias::table("orders"),
            "status",
            Constraint::build(vec![Value::from("suppliers__name")], Operator::Eq, true),
        )
        .with(Alias::table("orders"), "id", Constraint::eq(7i64));
    let request = SelectRequest::new(Alias::table("orders")).constraints(constraints);
    let plan = JoinPlanner::new(&schema, &graph).plan(&request).unwrap();

    assert_eq!(plan.dropped_aliases, vec![Alias::table("suppliers")]);
    let sql = plan.to_sql(Dialect::Postgres);
    assert!(!sql.contains("suppliers"));
    assert!(sql.contains("\"orders\".\"id\" = $1"));
    assert_eq!(plan.values(), vec![Value::Int(7)]);
}
