// tests/graph/alias_test.rs
use catdb::alias::{decode_base_table, decode_fk_prefix, slot_key, Alias, Slot};

#[test]
fn test_prefixed_alias_decodes_to_its_parts() {
    let alias = Alias::encode(Some("orders"), Some("billing_id"), "customers");
    let encoded = alias.to_string();

    assert_eq!(encoded, "orders__billing_id___customers");
    assert_eq!(decode_base_table(&encoded), "customers");
    assert_eq!(decode_fk_prefix(&encoded), Some(("orders", "billing_id")));
    assert_eq!(Alias::parse(&encoded), alias);
}

#[test]
fn test_bare_alias_has_no_prefix() {
    let alias = Alias::encode(None, Some("billing_id"), "customers");
    let encoded = alias.to_string();

    assert_eq!(encoded, "customers");
    assert_eq!(decode_base_table(&encoded), "customers");
    assert_eq!(decode_fk_prefix(&encoded), None);
    assert!(!Alias::parse(&encoded).is_prefixed());
}

#[test]
fn test_with_prefix_keeps_base_table() {
    let billing = Alias::via("orders", "billing_id", "customers");
    let country = Alias::table("countries").with_prefix(billing.prefix());

    assert_eq!(country.to_string(), "orders__billing_id___countries");
    assert_eq!(country.with_prefix(None), Alias::table("countries"));
}

#[test]
fn test_slot_keys() {
    assert_eq!(slot_key("orders", "status"), "orders__status");

    let slot = Slot::parse("orders__shipping_id___customers__name").unwrap();
    assert_eq!(slot.alias, Alias::via("orders", "shipping_id", "customers"));
    assert_eq!(slot.column, "name");
    assert_eq!(slot.key(), "orders__shipping_id___customers__name");

    assert_eq!(
        Slot::parse("customers__country"),
        Some(Slot::new(Alias::table("customers"), "country"))
    );
    assert_eq!(Slot::parse("customers"), None);
}

#[test]
fn test_alias_serializes_as_string() {
    let alias = Alias::via("orders", "billing_id", "customers");
    let json = serde_json::to_string(&alias).unwrap();
    assert_eq!(json, "\"orders__billing_id___customers\"");

    let back: Alias = serde_json::from_str(&json).unwrap();
    assert_eq!(back, alias);
}
