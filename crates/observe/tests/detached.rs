mod common;

use common::{json, observe};
use deep_observe::{Options, Path, Value};

#[test]
fn replaced_child_is_detached_when_ignoring() {
    let options = Options::new().ignore_detached(true);
    let (state, log) = observe(json(serde_json::json!({"a": {"b": 1}})), options);
    let old = state.get("a");

    state.set("a", json(serde_json::json!({"b": 10}))).unwrap();
    assert_eq!(log.paths(), vec!["a"]);

    old.set("b", 2).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(old.get("b").as_number(), Some(2.0));

    state.get("a").set("b", 11).unwrap();
    assert_eq!(log.paths(), vec!["a", "a.b"]);
}

#[test]
fn replaced_child_keeps_reporting_by_default() {
    let (state, log) = observe(json(serde_json::json!({"a": {"b": 1}})), Options::default());
    let old = state.get("a");

    state.set("a", Value::from(0)).unwrap();
    old.set("b", 2).unwrap();

    assert_eq!(log.paths(), vec!["a", "a.b"]);
}

#[test]
fn deleted_child_is_detached_when_ignoring() {
    let options = Options::new().ignore_detached(true);
    let (state, log) = observe(json(serde_json::json!({"a": {"b": {"c": 1}}})), options);
    let removed = state.get("a");
    let grandchild = removed.get("b");

    state.delete("a").unwrap();
    removed.set("b", 2).unwrap();
    grandchild.set("c", 2).unwrap();

    assert_eq!(log.paths(), vec!["a"]);
}

#[test]
fn detached_reads_are_not_wrapped_when_ignoring() {
    let options = Options::new().ignore_detached(true);
    let (state, _log) = observe(json(serde_json::json!({"a": {"b": {}}})), options);
    let old = state.get("a");

    state.set("a", Value::Null).unwrap();

    assert!(!old.get("b").is_observed());
}

#[test]
fn moved_child_reports_at_its_new_path() {
    let raw = json(serde_json::json!({"a": {"n": 1}, "b": null}));
    let (state, log) = observe(raw.clone(), Options::new().ignore_detached(true));

    state.set("b", raw.get("a")).unwrap();
    state.delete("a").unwrap();
    state.get("b").set("n", 2).unwrap();

    assert_eq!(log.paths(), vec!["b", "a", "b.n"]);
}

#[test]
fn deleted_child_reports_at_its_last_path_by_default() {
    let (state, log) = observe(json(serde_json::json!({"a": {"b": 1}, "b": 0})), Options::default());
    let removed = state.get("a");

    state.delete("a").unwrap();
    removed.set("b", 5).unwrap();

    assert_eq!(log.paths(), vec!["a", "a.b"]);
    assert_eq!(state.get("b").as_number(), Some(0.0));
    assert_eq!(removed.as_observed().unwrap().path(), Some(Path::text("a")));
}
