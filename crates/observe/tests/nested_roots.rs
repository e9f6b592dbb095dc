mod common;

use common::{json, observe};
use deep_observe::{unsubscribe, unwrap, Options, Value};

#[test]
fn writes_through_the_outer_root_notify_both() {
    let (inner, inner_log) = observe(json(serde_json::json!({"a": {"b": 1}})), Options::default());
    let (outer, outer_log) = observe(inner.clone(), Options::new().path_as_array(true));

    outer.get("a").set("b", 2).unwrap();

    assert_eq!(inner_log.paths(), vec!["a.b"]);
    assert_eq!(outer_log.paths(), vec!["a.b"]);
    assert!(outer_log.last().path.is_array());
    assert!(unwrap(&outer).is_observed());
}

#[test]
fn writes_through_the_inner_root_only_notify_inner() {
    let (inner, inner_log) = observe(json(serde_json::json!({"n": 1})), Options::default());
    let (_outer, outer_log) = observe(inner.clone(), Options::default());

    inner.set("n", 2).unwrap();

    assert_eq!(inner_log.len(), 1);
    assert!(outer_log.is_empty());
}

#[test]
fn calls_through_the_outer_root_notify_both() {
    let (inner, inner_log) = observe(json(serde_json::json!({"list": [1]})), Options::default());
    let (outer, outer_log) = observe(inner, Options::default());

    outer.get("list").invoke("push", [Value::from(2)]).unwrap();

    assert_eq!(inner_log.paths(), vec!["list"]);
    assert_eq!(outer_log.paths(), vec!["list"]);
    assert_eq!(outer_log.last().previous.to_json(), serde_json::json!([1]));
}

#[test]
fn unsubscribing_the_inner_root_leaves_the_outer_running() {
    let (inner, inner_log) = observe(json(serde_json::json!({"a": {"b": 1}})), Options::default());
    let (outer, outer_log) = observe(inner.clone(), Options::default());

    unsubscribe(&inner);
    outer.get("a").set("b", 2).unwrap();

    assert!(inner_log.is_empty());
    assert_eq!(outer_log.paths(), vec!["a.b"]);
}

#[test]
fn outer_root_ignoring_detached_still_sees_nested_writes() {
    let (inner, inner_log) = observe(json(serde_json::json!({"a": {"b": 1}})), Options::default());
    let (outer, outer_log) = observe(inner.clone(), Options::new().ignore_detached(true));

    let a = outer.get("a");
    assert!(a.is_observed());
    a.set("b", 2).unwrap();

    assert_eq!(inner_log.paths(), vec!["a.b"]);
    assert_eq!(outer_log.paths(), vec!["a.b"]);

    outer.set("a", json(serde_json::json!({"b": 3}))).unwrap();
    a.set("b", 4).unwrap();
    assert_eq!(outer_log.paths(), vec!["a.b", "a"]);
}
