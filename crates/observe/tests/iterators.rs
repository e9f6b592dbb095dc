mod common;

use common::{json, observe};
use deep_observe::{Key, Options, Value};

fn state_with_map() -> Value {
    let raw = json(serde_json::json!({}));
    raw.set(
        "m",
        Value::new_map([
            (Value::from("k"), json(serde_json::json!({"x": 1}))),
            (Value::from("j"), json(serde_json::json!({"x": 2}))),
        ]),
    )
    .unwrap();
    raw
}

#[test]
fn map_entries_yield_observed_values() {
    let (state, log) = observe(state_with_map(), Options::default());
    let map = state.get("m");

    let entries: Vec<Value> = map.invoke("entries", []).unwrap().as_iter().unwrap().collect();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].get(Key::index(0)).as_str(), Some("k"));
    let second = entries[1].get(Key::index(1));
    assert!(second.is_observed());

    second.set("x", 5).unwrap();
    assert_eq!(log.paths(), vec!["m.j.x"]);
}

#[test]
fn map_values_are_keyed_by_their_entry() {
    let (state, log) = observe(state_with_map(), Options::default());

    let values: Vec<Value> = state
        .get("m")
        .invoke("values", [])
        .unwrap()
        .as_iter()
        .unwrap()
        .collect();
    values[0].set("x", 3).unwrap();

    assert_eq!(log.paths(), vec!["m.k.x"]);
}

#[test]
fn map_keys_pass_primitives_through() {
    let (state, log) = observe(state_with_map(), Options::default());

    let keys: Vec<String> = state
        .get("m")
        .invoke("keys", [])
        .unwrap()
        .as_iter()
        .unwrap()
        .map(|key| key.display_string())
        .collect();

    assert_eq!(keys, vec!["k", "j"]);
    assert!(log.is_empty());
}

#[test]
fn set_members_are_observed() {
    let raw = json(serde_json::json!({}));
    raw.set("s", Value::new_set([json(serde_json::json!({"n": 1}))])).unwrap();
    let (state, log) = observe(raw, Options::default());

    let member = state
        .get("s")
        .invoke("values", [])
        .unwrap()
        .as_iter()
        .unwrap()
        .next()
        .unwrap();
    assert!(member.is_observed());

    member.set("n", 2).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log.last().path.keys()[0], Key::from("s"));
}

#[test]
fn iteration_tracks_live_contents() {
    let (state, _log) = observe(state_with_map(), Options::default());
    let map = state.get("m");

    let mut keys = map.invoke("keys", []).unwrap().as_iter().unwrap();
    assert_eq!(keys.next().map(|k| k.display_string()), Some("k".to_string()));
    map.invoke("set", [Value::from("late"), Value::from(1)]).unwrap();

    let rest: Vec<String> = keys.map(|k| k.display_string()).collect();
    assert_eq!(rest, vec!["j", "late"]);
}
