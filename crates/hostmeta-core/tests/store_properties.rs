use std::collections::BTreeMap;
use std::fs;

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use hostmeta_core::{InventoryStore, MergeBatch, MetadataRecord};

fn leaf_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("JSON has no NaN or infinity", |f| f.is_finite())
            .prop_map(Value::from),
        "[a-z0-9 ._-]{0,12}".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    leaf_value().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn record() -> impl Strategy<Value = MetadataRecord> {
    prop::collection::btree_map("[a-z_]{1,10}", json_value(), 0..6)
        .prop_map(|m| MetadataRecord::from(m.into_iter().collect::<Map<String, Value>>()))
}

fn hosts() -> impl Strategy<Value = BTreeMap<String, MetadataRecord>> {
    prop::collection::btree_map("node[0-9]{1,3}", record(), 0..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn persist_then_reload_round_trips(hosts in hosts()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");

        let mut store = InventoryStore::load(&path).unwrap();
        for (host, record) in &hosts {
            store.add_host(host.clone(), record.clone());
        }
        store.persist().unwrap();

        let reloaded = InventoryStore::load(&path).unwrap();
        prop_assert_eq!(reloaded.list_hosts(), store.list_hosts());
        for host in store.list_hosts() {
            prop_assert_eq!(reloaded.get_record(&host).unwrap(), store.get_record(&host).unwrap());
        }
    }

    #[test]
    fn key_lookup_partitions_hosts(hosts in hosts(), key in "[a-z_]{1,10}") {
        let dir = tempfile::tempdir().unwrap();
        let mut store = InventoryStore::load(dir.path().join("servers.json")).unwrap();
        for (host, record) in hosts {
            store.add_host(host, record);
        }

        let lookup = store.get_key_across_hosts(&key);

        for miss in &lookup.misses {
            prop_assert!(!lookup.matches.contains_key(miss));
        }
        let mut all: Vec<String> = lookup.matches.keys().cloned().collect();
        all.extend(lookup.misses.iter().cloned());
        all.sort();
        prop_assert_eq!(all, store.list_hosts());
    }

    #[test]
    fn add_host_is_full_replacement(first in record(), second in record()) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = InventoryStore::load(dir.path().join("servers.json")).unwrap();

        store.add_host("node01", first);
        store.add_host("node01", second.clone());

        prop_assert_eq!(store.get_record("node01").unwrap(), &second);
    }

    #[test]
    fn combine_flat_is_idempotent(
        a in prop::collection::btree_map("[a-z]{1,4}", json_value(), 0..5),
        b in prop::collection::btree_map("[a-z]{1,4}", json_value(), 0..5),
    ) {
        let mut batch = MergeBatch::new();
        batch.push(a.into_iter().collect());
        batch.push(b.into_iter().collect());
        let merged = batch.combine_flat().clone();

        let mut again = MergeBatch::new();
        again.push(merged.clone());
        prop_assert_eq!(again.combine_flat(), &merged);
    }
}

#[test]
fn floats_survive_persist_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("servers.json");
    let values = [394_301.338_356_336_75, 0.1, 1e-300, 123_456.789_012_345_67, f64::MAX];

    let mut store = InventoryStore::load(&path).unwrap();
    for (i, v) in values.iter().enumerate() {
        store.add_host(format!("node{i:02}"), MetadataRecord::new().with("load", json!(v)));
    }
    store.persist().unwrap();

    let reloaded = InventoryStore::load(&path).unwrap();
    for (i, v) in values.iter().enumerate() {
        let host = format!("node{i:02}");
        assert_eq!(reloaded.get_value(&host, "load").unwrap().as_f64(), Some(*v));
    }
}

#[test]
fn fresh_store_at_conventional_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("servers.json");

    let store = InventoryStore::load(&path).unwrap();

    assert!(path.exists());
    assert_eq!(store.list_hosts(), vec!["structure"]);
    assert_eq!(
        store.get_keys("structure").unwrap(),
        vec![
            "collection_time",
            "comment",
            "mounts",
            "network",
            "storage",
            "users",
            "vms"
        ]
    );
}

#[test]
fn collected_snapshots_merge_into_store() {
    let dir = tempfile::tempdir().unwrap();
    let snapshots = dir.path().join("snapshots");
    fs::create_dir(&snapshots).unwrap();
    fs::write(
        snapshots.join("h1.json"),
        json!({"h1": {"cpu": "x"}}).to_string(),
    )
    .unwrap();
    fs::write(
        snapshots.join("h2.json"),
        json!({"h2": {"cpu": "y"}}).to_string(),
    )
    .unwrap();
    fs::write(snapshots.join("README.txt"), "ignored").unwrap();

    let mut batch = MergeBatch::read_directory(&snapshots).unwrap();
    let merged = batch.combine_flat().clone();
    batch.write(&dir.path().join("merged.json")).unwrap();

    let mut store = InventoryStore::load(dir.path().join("servers.json")).unwrap();
    store.import(&merged).unwrap();
    store.persist().unwrap();

    let reloaded = InventoryStore::load(dir.path().join("servers.json")).unwrap();
    assert_eq!(reloaded.list_hosts(), vec!["h1", "h2", "structure"]);
    assert_eq!(reloaded.get_value("h2", "cpu").unwrap(), &json!("y"));

    let merged_store = InventoryStore::load(dir.path().join("merged.json")).unwrap();
    assert_eq!(merged_store.list_hosts(), vec!["h1", "h2"]);
}
