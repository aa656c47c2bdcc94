//! Property tests: the array form and the keyed-map form of the same
//! collection normalize to the same tasks, and null padding never matters.

use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::json;
use studiobot_proto::{member, task};

fn status_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("todo"), Just("inprogress"), Just("done")]
}

/// Collections keyed by id, so both serialized forms are constructible.
fn collection_strategy() -> impl Strategy<Value = BTreeMap<String, (String, &'static str)>> {
    proptest::collection::btree_map(
        "[a-z][a-z0-9]{0,8}",
        ("[A-Za-z ]{1,20}", status_strategy()),
        1..8,
    )
}

fn array_form(entries: &BTreeMap<String, (String, &'static str)>) -> serde_json::Value {
    let items: Vec<serde_json::Value> = entries
        .iter()
        .map(|(id, (title, status))| json!({"id": id, "title": title, "status": status}))
        .collect();
    serde_json::Value::Array(items)
}

fn map_form(entries: &BTreeMap<String, (String, &'static str)>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(id, (title, status))| (id.clone(), json!({"title": title, "status": status})))
        .collect();
    serde_json::Value::Object(map)
}

proptest! {
    #[test]
    fn map_and_array_forms_normalize_identically(entries in collection_strategy()) {
        let from_array = task::normalize(&array_form(&entries)).unwrap();
        let from_map = task::normalize(&map_form(&entries)).unwrap();
        // The array is built in key order, so the sequences line up exactly.
        prop_assert_eq!(from_array, from_map);
    }

    #[test]
    fn null_slots_never_change_the_result(
        entries in collection_strategy(),
        pad in 0usize..4,
    ) {
        let plain = task::normalize(&array_form(&entries)).unwrap();

        let serde_json::Value::Array(mut items) = array_form(&entries) else {
            unreachable!();
        };
        for i in 0..pad {
            items.insert(i * 2 % (items.len() + 1), serde_json::Value::Null);
        }
        items.push(serde_json::Value::Null);
        let padded = task::normalize(&serde_json::Value::Array(items)).unwrap();

        prop_assert_eq!(plain, padded);
    }

    #[test]
    fn member_forms_normalize_identically(
        entries in proptest::collection::btree_map(
            "[a-z][a-z0-9]{0,8}",
            "[A-Za-z ]{1,20}",
            1..8,
        )
    ) {
        let array: Vec<serde_json::Value> = entries
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect();
        let map: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|(id, name)| (id.clone(), json!({"name": name})))
            .collect();

        let from_array = member::normalize(&serde_json::Value::Array(array)).unwrap();
        let from_map = member::normalize(&serde_json::Value::Object(map)).unwrap();
        prop_assert_eq!(from_array, from_map);
    }

    #[test]
    fn normalized_ids_are_never_empty(entries in collection_strategy()) {
        for t in task::normalize(&map_form(&entries)).unwrap() {
            prop_assert!(!t.id.is_empty());
        }
    }
}
