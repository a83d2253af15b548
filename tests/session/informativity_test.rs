// tests/session/informativity_test.rs
use std::sync::Arc;

use catdb::alias::{Alias, Slot};
use catdb::cache::{BaselineCache, CacheKey};
use catdb::constraint::{Constraint, Constraints};
use catdb::db::SqliteConnection;
use catdb::informativity::{column_entropy, normalized_entropy, InformativityCache, Requestable};
use catdb::schema::{Column, Schema, Table};
use catdb::Session;

fn survey() -> Schema {
    Schema::new(
        "survey",
        vec![Table::new("answers")
            .with_primary_key(&["id"])
            .with_column(Column::new("id", "integer").not_null())
            .with_column(Column::new("constant", "text"))
            .with_column(Column::new("unique_tag", "text"))
            .with_column(Column::new("mirror_tag", "text"))
            .with_column(Column::new("half", "text"))],
        vec![],
    )
}

fn seeded() -> SqliteConnection {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE answers (id INTEGER PRIMARY KEY, constant TEXT, unique_tag TEXT, mirror_tag TEXT, half TEXT);
         INSERT INTO answers VALUES
            (1, 'x', 'a', 'a', 'p'),
            (2, 'x', 'b', 'b', 'p'),
            (3, 'x', 'c', 'c', 'q'),
            (4, 'x', 'd', 'd', 'q');",
    )
    .unwrap();
    conn
}

fn answers() -> Alias {
    Alias::table("answers")
}

#[test]
fn test_entropy_bounds() {
    assert_eq!(normalized_entropy(&[]), 0.0);
    assert_eq!(normalized_entropy(&[1]), 0.0);
    assert_eq!(normalized_entropy(&[7]), 0.0);
    assert!((normalized_entropy(&[1, 1, 1, 1]) - 1.0).abs() < 1e-9);
    assert!((normalized_entropy(&[2, 2]) - 0.5).abs() < 1e-9);
}

#[test]
fn test_column_entropy_extremes() {
    let mut conn = seeded();
    assert_eq!(column_entropy(&mut conn, "answers", "constant").unwrap(), 0.0);
    let unique = column_entropy(&mut conn, "answers", "unique_tag").unwrap();
    assert!((unique - 1.0).abs() < 1e-9);
}

#[test]
fn test_baseline_skips_primary_keys() {
    let mut session = Session::new(seeded(), Arc::new(survey())).unwrap();
    let baseline = session.build_informativity().unwrap();
    let columns: Vec<&str> = baseline
        .table("answers")
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(columns, ["constant", "unique_tag", "mirror_tag", "half"]);
    assert!(baseline.get("answers", "id").is_none());
}

#[test]
fn test_ties_are_broken_among_the_best_only() {
    let requestable = Requestable::new().with(
        answers(),
        &["constant", "unique_tag", "mirror_tag", "half"],
    );
    let mut picked = std::collections::BTreeSet::new();
    for seed in 0..16 {
        let mut session = Session::new(seeded(), Arc::new(survey()))
            .unwrap()
            .with_seed(seed);
        session.build_informativity().unwrap();
        let slot = session
            .next_slot(&answers(), &[], &Constraints::new(), &requestable)
            .unwrap()
            .unwrap();
        picked.insert(slot.column);
    }
    assert!(picked.iter().all(|c| c == "unique_tag" || c == "mirror_tag"));
}

#[test]
fn test_seeded_sessions_agree() {
    let requestable = Requestable::new().with(answers(), &["unique_tag", "mirror_tag"]);
    let pick = |seed| {
        let mut session = Session::new(seeded(), Arc::new(survey()))
            .unwrap()
            .with_seed(seed);
        session.build_informativity().unwrap();
        session
            .next_slot(&answers(), &[], &Constraints::new(), &requestable)
            .unwrap()
    };
    assert_eq!(pick(3), pick(3));
}

#[test]
fn test_slot_from_injected_baseline() {
    let mut baseline = InformativityCache::new();
    baseline.insert("answers", "half", 0.9);
    baseline.insert("answers", "constant", 0.1);

    let mut session = Session::new(seeded(), Arc::new(survey())).unwrap();
    session.set_informativity(baseline);
    let requestable = Requestable::new().with(answers(), &["constant", "half", "unique_tag"]);
    let slot = session
        .next_slot(&answers(), &[], &Constraints::new(), &requestable)
        .unwrap();
    assert_eq!(slot, Some(Slot::new(answers(), "half")));
}

#[test]
fn test_baseline_round_trips_through_cache() {
    let cache = BaselineCache::open_in_memory().unwrap();
    let schema = Arc::new(survey());

    let mut first = Session::new(seeded(), schema.clone()).unwrap();
    let built = first.load_or_build_informativity(&cache).unwrap().clone();
    assert_eq!(cache.stats().unwrap().entry_count, 1);

    let hash = CacheKey::schema_hash(&schema).unwrap();
    let stored: InformativityCache = cache
        .get(&CacheKey::informativity(&hash, false))
        .unwrap()
        .unwrap();
    assert_eq!(stored, built);

    // An empty database proves the second session reads the cache.
    let mut second = Session::new(SqliteConnection::open_in_memory().unwrap(), schema).unwrap();
    let loaded = second.load_or_build_informativity(&cache).unwrap();
    assert_eq!(loaded, &built);
}

#[test]
fn test_changed_schema_misses_cache() {
    let cache = BaselineCache::open_in_memory().unwrap();
    let mut session = Session::new(seeded(), Arc::new(survey())).unwrap();
    session.load_or_build_informativity(&cache).unwrap();

    let mut changed = survey();
    changed.tables[0].columns.pop();
    let old = CacheKey::schema_hash(&survey()).unwrap();
    let new = CacheKey::schema_hash(&changed).unwrap();
    assert_ne!(old, new);
    assert!(cache
        .get::<InformativityCache>(&CacheKey::informativity(&new, false))
        .unwrap()
        .is_none());
}

/// pets reference an owner, a vet and a food; Oslo owners have pets 1-4.
fn clinic() -> Schema {
    Schema::new(
        "clinic",
        vec![
            Table::new("owners")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("city", "text")),
            Table::new("vets")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("name", "text")),
            Table::new("foods")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("brand", "text")),
            Table::new("pets")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("owner_id", "integer").references("owners", "id"))
                .with_column(Column::new("vet_id", "integer").references("vets", "id"))
                .with_column(Column::new("food_id", "integer").references("foods", "id"))
                .with_column(Column::new("species", "text"))
                .with_column(Column::new("colour", "text")),
        ],
        vec![],
    )
}

fn clinic_db() -> SqliteConnection {
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE owners (id INTEGER PRIMARY KEY, city TEXT);
         CREATE TABLE vets (id INTEGER PRIMARY KEY, name TEXT);
         CREATE TABLE foods (id INTEGER PRIMARY KEY, brand TEXT);
         CREATE TABLE pets (id INTEGER PRIMARY KEY, owner_id INTEGER, vet_id INTEGER,
                            food_id INTEGER, species TEXT, colour TEXT);
         INSERT INTO owners VALUES (1, 'Oslo'), (2, 'Oslo'), (3, 'Rome');
         INSERT INTO vets VALUES (1, 'Ada'), (2, 'Bo');
         INSERT INTO foods VALUES (1, 'Acme'), (2, 'Bolt'), (3, 'Crux'), (4, 'Dune');
         INSERT INTO pets VALUES
            (1, 1, 1, 1, 'cat', 'black'),
            (2, 1, 1, 2, 'cat', 'white'),
            (3, 2, 1, 3, 'cat', 'grey'),
            (4, 2, 2, 4, 'dog', 'black'),
            (5, 3, 2, 1, 'dog', 'black'),
            (6, 3, 2, 1, 'bird', 'white');",
    )
    .unwrap();
    conn
}

fn pets() -> Alias {
    Alias::table("pets")
}

fn owners() -> Alias {
    Alias::table("owners")
}

fn in_oslo() -> Constraints {
    Constraints::new().with(owners(), "city", Constraint::eq("Oslo"))
}

#[test]
fn test_next_slot_profiles_narrowed_result() {
    // Over all pets species and colour split alike; among the four Oslo pets
    // colour (2/1/1) beats species (3/1). The baseline favours species.
    let mut baseline = InformativityCache::new();
    baseline.insert("pets", "species", 0.9);
    baseline.insert("pets", "colour", 0.1);
    let requestable = Requestable::new()
        .with(pets(), &["species", "colour"])
        .with(owners(), &["city"]);

    for seed in 0..8 {
        let mut session = Session::new(clinic_db(), Arc::new(clinic()))
            .unwrap()
            .with_seed(seed);
        session.set_informativity(baseline.clone());
        let slot = session
            .next_slot(&pets(), &[owners()], &in_oslo(), &requestable)
            .unwrap();
        assert_eq!(slot, Some(Slot::new(pets(), "colour")));
    }
}

#[test]
fn test_best_join_table_ranks_all_candidates() {
    // vets come first in candidate order but split the Oslo pets 3/1; every
    // Oslo pet eats a different food.
    let mut baseline = InformativityCache::new();
    baseline.insert("vets", "name", 1.0);
    baseline.insert("foods", "brand", 0.1);
    let requestable = Requestable::new()
        .with(Alias::table("vets"), &["name"])
        .with(Alias::table("foods"), &["brand"]);

    let mut session = Session::new(clinic_db(), Arc::new(clinic())).unwrap();
    session.set_informativity(baseline);
    let table = session
        .best_join_table(&pets(), &[owners()], &in_oslo(), &requestable)
        .unwrap();
    assert_eq!(table, Some(Alias::table("foods")));
}

#[test]
fn test_next_slot_with_long_slot_keys() {
    let schema = Schema::new(
        "stock",
        vec![
            Table::new("employees")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("home_region", "text"))
                .with_column(Column::new("grade", "text")),
            Table::new("warehouse_inventory_adjustments")
                .with_primary_key(&["id"])
                .with_column(Column::new("id", "integer").not_null())
                .with_column(Column::new("approved_by", "integer").references("employees", "id"))
                .with_column(Column::new("reason", "text")),
        ],
        vec![],
    );
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE employees (id INTEGER PRIMARY KEY, home_region TEXT, grade TEXT);
         CREATE TABLE warehouse_inventory_adjustments (id INTEGER PRIMARY KEY, approved_by INTEGER, reason TEXT);
         INSERT INTO employees VALUES (1, 'north', 'senior'), (2, 'south', 'senior'), (3, 'north', 'junior');
         INSERT INTO warehouse_inventory_adjustments VALUES
            (1, 1, 'damage'), (2, 1, 'damage'), (3, 2, 'damage'), (4, 3, 'theft');",
    )
    .unwrap();

    let target = Alias::table("warehouse_inventory_adjustments");
    let approvers = Alias::via("warehouse_inventory_adjustments", "approved_by", "employees");
    assert!(approvers.slot("home_region").len() > 63);
    let requestable = Requestable::new()
        .with(target.clone(), &["reason"])
        .with(approvers.clone(), &["home_region", "grade"]);
    let constraints = Constraints::new().with(approvers.clone(), "grade", Constraint::eq("senior"));

    let mut session = Session::new(conn, Arc::new(schema)).unwrap();
    let slot = session
        .next_slot(&target, &[approvers.clone()], &constraints, &requestable)
        .unwrap();
    assert_eq!(slot, Some(Slot::new(approvers, "home_region")));
}
