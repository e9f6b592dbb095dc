mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{json, observe};
use deep_observe::{ObserveError, Options, Value};
use proptest::prelude::*;

#[test]
fn rejected_write_is_not_applied() {
    let options = Options::new().on_validate(|_, change| change.path != "locked");
    let (state, log) = observe(json(serde_json::json!({"locked": 1, "open": 1})), options);

    let err = state.set("locked", 2).unwrap_err();
    assert_eq!(err, ObserveError::Rejected { path: "locked".into() });
    assert!(state.delete("locked").is_err());
    assert_eq!(state.get("locked").as_number(), Some(1.0));
    assert!(log.is_empty());

    state.set("open", 2).unwrap();
    assert_eq!(log.paths(), vec!["open"]);
}

#[test]
fn validator_sees_the_prospective_change() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let options = Options::new().on_validate(move |root, change| {
        sink.borrow_mut().push((
            change.path.to_string(),
            change.value.to_json(),
            change.previous.to_json(),
            root.get("a").get("b").to_json(),
        ));
        true
    });
    let (state, _log) = observe(json(serde_json::json!({"a": {"b": 1}})), options);

    state.get("a").set("b", 2).unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![(
            "a.b".to_string(),
            serde_json::json!(2),
            serde_json::json!(1),
            serde_json::json!(1),
        )]
    );
}

#[test]
fn rejected_call_is_rolled_back() {
    let options = Options::new().on_validate(|_, change| change.apply.is_none());
    let (state, log) = observe(json(serde_json::json!({"list": [3, 1, 2]})), options);
    let list = state.get("list");

    assert!(matches!(
        list.invoke("sort", []),
        Err(ObserveError::Rejected { .. })
    ));
    assert!(list.invoke("push", [Value::from(9)]).is_err());

    assert_eq!(state.to_json(), serde_json::json!({"list": [3, 1, 2]}));
    assert!(log.is_empty());
}

#[test]
fn rejected_record_method_reverts_nested_writes() {
    let raw = json(serde_json::json!({"a": {"b": 1}, "list": [1]}));
    raw.set(
        "scramble",
        Value::function("scramble", |this, _| {
            this.get("a").set("b", 5)?;
            this.get("a").set("b", 6)?;
            this.set("c", 1)?;
            this.get("list").invoke("push", [Value::from(2)])?;
            this.get("a").delete("b")?;
            Ok(Value::Undefined)
        }),
    )
    .unwrap();
    let options = Options::new().on_validate(|_, change| change.apply.is_none());
    let (state, log) = observe(raw, options);

    assert!(state.invoke("scramble", []).is_err());

    assert_eq!(
        state.to_json(),
        serde_json::json!({"a": {"b": 1}, "list": [1]})
    );
    assert!(log.is_empty());
}

#[test]
fn accepted_record_method_reports_nested_previous() {
    let raw = json(serde_json::json!({"a": {"b": 1}}));
    raw.set(
        "touch",
        Value::function("touch", |this, _| {
            this.get("a").set("b", 2)?;
            Ok(Value::Undefined)
        }),
    )
    .unwrap();
    let options = Options::new().on_validate(|_, _| true);
    let (state, log) = observe(raw.clone(), options);

    state.invoke("touch", []).unwrap();

    assert_eq!(log.len(), 1);
    let change = log.last();
    assert_eq!(change.previous.get("a").get("b").as_number(), Some(1.0));
    assert!(!Value::is(&change.previous.get("a"), &raw.get("a")));
    assert_eq!(raw.get("a").get("b").as_number(), Some(2.0));
}

#[derive(Debug, Clone)]
enum ListOp {
    Push(i32),
    Pop,
    Shift,
    Unshift(i32),
    Reverse,
    Sort,
    Splice(usize, usize, i32),
    Write(usize, i32),
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        any::<i32>().prop_map(ListOp::Push),
        Just(ListOp::Pop),
        Just(ListOp::Shift),
        any::<i32>().prop_map(ListOp::Unshift),
        Just(ListOp::Reverse),
        Just(ListOp::Sort),
        (0usize..6, 0usize..4, any::<i32>()).prop_map(|(s, d, v)| ListOp::Splice(s, d, v)),
        (0usize..6, any::<i32>()).prop_map(|(i, v)| ListOp::Write(i, v)),
    ]
}

fn apply(list: &Value, op: &ListOp) -> Result<(), ObserveError> {
    match op {
        ListOp::Push(v) => list.invoke("push", [Value::from(*v)]).map(drop),
        ListOp::Pop => list.invoke("pop", []).map(drop),
        ListOp::Shift => list.invoke("shift", []).map(drop),
        ListOp::Unshift(v) => list.invoke("unshift", [Value::from(*v)]).map(drop),
        ListOp::Reverse => list.invoke("reverse", []).map(drop),
        ListOp::Sort => list.invoke("sort", []).map(drop),
        ListOp::Splice(start, delete, v) => list
            .invoke(
                "splice",
                [Value::from(*start), Value::from(*delete), Value::from(*v)],
            )
            .map(drop),
        ListOp::Write(index, v) => list.set(*index, *v),
    }
}

proptest! {
    #[test]
    fn rejected_operations_leave_no_trace(
        items in prop::collection::vec(any::<i32>(), 0..6),
        ops in prop::collection::vec(list_op(), 1..12),
    ) {
        let initial = serde_json::json!({ "list": items });
        let options = Options::new().on_validate(|_, _| false);
        let (state, log) = observe(json(initial.clone()), options);
        let list = state.get("list");

        for op in &ops {
            let _ = apply(&list, op);
            prop_assert_eq!(state.to_json(), initial.clone());
        }
        prop_assert!(log.is_empty());
    }

    #[test]
    fn accepted_operations_match_the_raw_graph(
        items in prop::collection::vec(any::<i32>(), 0..6),
        ops in prop::collection::vec(list_op(), 1..12),
    ) {
        let initial = serde_json::json!({ "list": items });
        let raw = json(initial.clone());
        let shadow = json(initial);
        let (state, _log) = observe(raw, Options::new().on_validate(|_, _| true));
        let list = state.get("list");
        let shadow_list = shadow.get("list");

        for op in &ops {
            apply(&list, op).unwrap();
            apply(&shadow_list, op).unwrap();
            prop_assert_eq!(state.to_json(), shadow.to_json());
        }
    }
}
