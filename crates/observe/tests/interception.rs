mod common;

use common::{json, observe};
use deep_observe::{
    unwrap, Function, Key, ObserveError, Options, Path, PropertyDescriptor, Symbol, Value,
};

#[test]
fn nested_write_reports_path_value_and_previous() {
    let (state, log) = observe(json(serde_json::json!({"a": {"b": 1}})), Options::default());

    state.get("a").set("b", 2).unwrap();

    assert_eq!(log.len(), 1);
    let change = log.last();
    assert_eq!(change.path, "a.b");
    assert_eq!(change.value.as_number(), Some(2.0));
    assert_eq!(change.previous.as_number(), Some(1.0));
    assert!(change.apply.is_none());
}

#[test]
fn equal_writes_are_silent() {
    let (state, log) = observe(json(serde_json::json!({"n": 1, "s": "x"})), Options::default());

    state.set("n", 1).unwrap();
    state.set("s", "x").unwrap();
    assert!(log.is_empty());

    state.set("n", f64::NAN).unwrap();
    state.set("n", f64::NAN).unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn creating_a_property_with_undefined_is_reported() {
    let (state, log) = observe(json(serde_json::json!({})), Options::default());

    state.set("fresh", Value::Undefined).unwrap();

    assert_eq!(log.paths(), vec!["fresh"]);
    assert!(log.last().previous.is_undefined());
}

#[test]
fn custom_equality_suppresses_writes() {
    let options = Options::new().equals(|a, b| a.as_number().map(f64::floor) == b.as_number().map(f64::floor));
    let (state, log) = observe(json(serde_json::json!({"n": 1.2})), options);

    state.set("n", 1.7).unwrap();
    assert!(log.is_empty());
    assert_eq!(state.get("n").as_number(), Some(1.2));

    state.set("n", 2.1).unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn wrappers_are_stable_and_transparent() {
    let raw = json(serde_json::json!({"a": {"b": 1}, "list": [1, 2]}));
    let (state, _log) = observe(raw.clone(), Options::default());

    let first = state.get("a");
    let second = state.get("a");
    assert!(first.as_observed().unwrap().ptr_eq(second.as_observed().unwrap()));
    assert_eq!(first, second);

    assert!(Value::is(&unwrap(&first), &raw.get("a")));
    assert!(Value::is(&unwrap(&state), &raw));
    assert_eq!(state.get("list").len(), 2);
    assert_eq!(state.get("a").get("b").as_number(), Some(1.0));
    assert_eq!(state.keys(), vec![Key::from("a"), Key::from("list")]);
    assert_eq!(state.to_json(), raw.to_json());
}

#[test]
fn wrapper_records_its_path() {
    let (state, _log) = observe(json(serde_json::json!({"a": {"b": {}}})), Options::default());

    let inner = state.get("a").get("b");
    assert_eq!(inner.as_observed().unwrap().path(), Some(Path::text("a.b")));
    assert_eq!(state.as_observed().unwrap().path(), Some(Path::text("")));
}

#[test]
fn stored_wrappers_are_unwrapped() {
    let raw = json(serde_json::json!({"a": {"b": 1}}));
    let (state, _log) = observe(raw.clone(), Options::default());

    state.set("copy", state.get("a")).unwrap();

    assert!(!raw.get("copy").is_observed());
    assert!(Value::is(&raw.get("copy"), &raw.get("a")));
}

#[test]
fn delete_reports_previous_and_skips_missing_keys() {
    let (state, log) = observe(json(serde_json::json!({"a": 1})), Options::default());

    state.delete("missing").unwrap();
    assert!(log.is_empty());

    state.delete("a").unwrap();
    assert_eq!(log.paths(), vec!["a"]);
    assert!(log.last().value.is_undefined());
    assert_eq!(log.last().previous.as_number(), Some(1.0));
    assert!(!state.has("a"));
}

#[test]
fn sequence_index_writes_use_index_keys() {
    let (state, log) = observe(json(serde_json::json!({"list": [1, 2]})), Options::default());

    state.get("list").set(Key::index(1), 5).unwrap();

    assert_eq!(log.paths(), vec!["list.1"]);
    assert_eq!(state.to_json(), serde_json::json!({"list": [1, 5]}));
}

#[test]
fn far_sequence_writes_fail_instead_of_growing() {
    let (state, log) = observe(json(serde_json::json!({"list": [1, 2]})), Options::default());
    let list = state.get("list");

    assert_eq!(list.set(4_294_967_294usize, 1), Err(ObserveError::InvalidLength));
    assert_eq!(list.set("length", 4_000_000_000u64), Err(ObserveError::InvalidLength));
    assert_eq!(list.set("length", -1), Err(ObserveError::InvalidLength));

    assert!(log.is_empty());
    assert_eq!(state.to_json(), serde_json::json!({"list": [1, 2]}));
}

#[test]
fn array_paths_keep_segments() {
    let options = Options::new().path_as_array(true);
    let (state, log) = observe(json(serde_json::json!({"a": {"b.c": 1}})), options);

    state.get("a").set("b.c", 2).unwrap();

    assert_eq!(log.last().path, Path::from_keys(["a", "b.c"]));
}

#[test]
fn ignored_keys_are_written_silently() {
    let options = Options::new()
        .ignore_underscores(true)
        .ignore_keys(["skip"])
        .ignore_symbols(true);
    let (state, log) = observe(json(serde_json::json!({"_private": {"x": 1}})), options);

    state.set("_hidden", 1).unwrap();
    state.set("skip", 1).unwrap();
    state.set(Symbol::new("tag"), 1).unwrap();
    assert!(log.is_empty());
    assert_eq!(state.get("_hidden").as_number(), Some(1.0));

    assert!(!state.get("_private").is_observed());

    state.set("shown", 1).unwrap();
    assert_eq!(log.paths(), vec!["shown"]);
}

#[test]
fn shallow_roots_only_report_top_level_writes() {
    let options = Options::new().is_shallow(true);
    let (state, log) = observe(json(serde_json::json!({"a": {"b": 1}})), options);

    let nested = state.get("a");
    assert!(!nested.is_observed());
    nested.set("b", 2).unwrap();
    assert!(log.is_empty());

    state.set("a", 3).unwrap();
    assert_eq!(log.paths(), vec!["a"]);
}

#[test]
fn symbol_keys_appear_in_paths() {
    let tag = Symbol::new("tag");
    let (state, log) = observe(json(serde_json::json!({})), Options::new().path_as_array(true));

    state.set(tag.clone(), 1).unwrap();

    assert_eq!(log.last().path.keys(), vec![Key::from(tag)]);
}

#[test]
fn getters_see_the_wrapper() {
    let raw = json(serde_json::json!({"x": 2}));
    let getter = Function::new("double", |this, _| {
        Ok(Value::from(this.get("x").as_number().unwrap_or(0.0) * 2.0))
    });
    let setter = Function::new("double", |this, args| {
        let half = args.first().and_then(Value::as_number).unwrap_or(0.0) / 2.0;
        this.set("x", half)?;
        Ok(Value::Undefined)
    });
    raw.define_property("double", PropertyDescriptor::accessor(Some(getter), Some(setter)))
        .unwrap();
    let (state, log) = observe(raw, Options::default());

    assert_eq!(state.get("double").as_number(), Some(4.0));

    state.set("double", 10).unwrap();
    assert_eq!(log.paths(), vec!["x", "double"]);
    assert_eq!(state.get("x").as_number(), Some(5.0));
}

#[test]
fn define_property_is_reported_once() {
    let (state, log) = observe(json(serde_json::json!({})), Options::default());

    let descriptor = PropertyDescriptor::data(1).writable(true).enumerable(true).configurable(true);
    state.define_property("a", descriptor.clone()).unwrap();
    state.define_property("a", descriptor).unwrap();

    assert_eq!(log.paths(), vec!["a"]);
    assert_eq!(log.last().value.as_number(), Some(1.0));
}

#[test]
fn read_only_properties_refuse_writes() {
    let raw = json(serde_json::json!({}));
    raw.define_property(
        "fixed",
        PropertyDescriptor::data(1).writable(false).configurable(false),
    )
    .unwrap();
    let (state, log) = observe(raw, Options::default());

    assert!(state.set("fixed", 2).is_err());
    assert!(state.delete("fixed").is_err());
    assert!(log.is_empty());
    assert_eq!(state.get("fixed").as_number(), Some(1.0));
}

#[test]
fn primitives_are_returned_unwrapped() {
    let (value, log) = observe(Value::from(3), Options::default());
    assert_eq!(value.as_number(), Some(3.0));
    assert!(!value.is_observed());
    assert!(log.is_empty());
}
