// tests/graph/candidates_test.rs
use catdb::alias::Alias;
use catdb::graph::DependencyGraph;
use catdb::schema::{Column, Schema, Table};

fn a(name: &str) -> Alias {
    Alias::table(name)
}

fn id_table(name: &str) -> Table {
    Table::new(name)
        .with_primary_key(&["id"])
        .with_column(Column::new("id", "integer"))
}

/// students - enrollments - courses, with enrollments a mapping table.
fn school() -> Schema {
    Schema::new(
        "school",
        vec![
            id_table("students").with_column(Column::new("name", "text")),
            id_table("courses").with_column(Column::new("title", "text")),
            Table::new("enrollments")
                .with_primary_key(&["student_id", "course_id"])
                .with_column(Column::new("student_id", "integer").references("students", "id"))
                .with_column(Column::new("course_id", "integer").references("courses", "id"))
                .with_column(Column::new("grade", "text")),
        ],
        vec![],
    )
}

/// orders references customers twice and stores once.
fn shop() -> Schema {
    Schema::new(
        "shop",
        vec![
            id_table("customers").with_column(Column::new("name", "text")),
            id_table("stores").with_column(Column::new("city", "text")),
            id_table("orders")
                .with_column(Column::new("billing_id", "integer").references("customers", "id"))
                .with_column(Column::new("shipping_id", "integer").references("customers", "id"))
                .with_column(Column::new("store_id", "integer").references("stores", "id")),
        ],
        vec![],
    )
}

#[test]
fn test_mapping_table_is_transparent() {
    let schema = school();
    assert!(schema.is_mapping_table("enrollments"));
    let graph = DependencyGraph::from_schema(&schema);

    let candidates = graph.join_candidates(&[a("students")], schema.mapping_tables(), false);
    assert_eq!(candidates, vec![a("courses")]);

    let candidates = graph.join_candidates(&[a("courses")], schema.mapping_tables(), false);
    assert_eq!(candidates, vec![a("students")]);
}

#[test]
fn test_mapping_table_crossed_in_directed_mode() {
    let schema = school();
    let graph = DependencyGraph::from_schema(&schema);

    // students holds no foreign key, so nothing is reachable from it directed.
    assert!(graph
        .join_candidates(&[a("students")], schema.mapping_tables(), true)
        .is_empty());
}

#[test]
fn test_multiple_foreign_keys_get_prefixed_aliases() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);

    let candidates = graph.join_candidates(&[a("orders")], schema.mapping_tables(), true);
    assert_eq!(
        candidates,
        vec![
            Alias::via("orders", "billing_id", "customers"),
            Alias::via("orders", "shipping_id", "customers"),
            a("stores"),
        ]
    );
    assert_eq!(
        candidates
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        vec![
            "orders__billing_id___customers",
            "orders__shipping_id___customers",
            "stores"
        ]
    );
}

#[test]
fn test_referenced_side_sees_holder_once() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);

    assert_eq!(
        graph.join_candidates(&[a("customers")], schema.mapping_tables(), false),
        vec![a("orders")]
    );
    assert!(graph
        .join_candidates(&[a("customers")], schema.mapping_tables(), true)
        .is_empty());
}

#[test]
fn test_inputs_are_not_candidates() {
    let schema = shop();
    let graph = DependencyGraph::from_schema(&schema);

    let candidates = graph.join_candidates(
        &[a("orders"), a("stores")],
        schema.mapping_tables(),
        false,
    );
    assert!(!candidates.contains(&a("stores")));
    assert!(!candidates.contains(&a("orders")));
    assert_eq!(candidates.len(), 2);
}
