//! Built-in container methods and the tables that classify them.
//!
//! Every method body is written against a receiver `this: &Value`, so the
//! same code runs on a raw container or, in details mode, through a
//! wrapper where each write it makes is intercepted.

pub(crate) mod collection;
pub(crate) mod date;
mod object;
mod sequence;
mod weak;

use deep_observe_path::Key;

use crate::error::ObserveError;
use crate::smart_clone::Diff;
use crate::value::{Function, Kind, Value};

const IMMUTABLE_OBJECT_METHODS: &[&str] = &[
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "toLocaleString",
    "toString",
    "valueOf",
];

const IMMUTABLE_ARRAY_METHODS: &[&str] =
    &["concat", "includes", "indexOf", "join", "keys", "lastIndexOf"];

const MUTABLE_ARRAY_METHODS: &[(&str, Diff)] = &[
    ("push", Diff::Certain),
    ("pop", Diff::Certain),
    ("shift", Diff::Certain),
    ("unshift", Diff::Certain),
    ("copyWithin", Diff::Sequence),
    ("reverse", Diff::Sequence),
    ("sort", Diff::Sequence),
    ("splice", Diff::Sequence),
    ("flat", Diff::Sequence),
    ("fill", Diff::Sequence),
];

const COLLECTION_ITERATOR_METHODS: &[&str] = &["keys", "values", "entries"];

const IMMUTABLE_SET_METHODS: &[&str] = &["has", "toString"];

const MUTABLE_SET_METHODS: &[&str] = &["add", "clear", "delete", "forEach"];

const IMMUTABLE_MAP_METHODS: &[&str] = &["has", "toString", "get"];

const MUTABLE_MAP_METHODS: &[&str] = &["set", "clear", "delete", "forEach"];

/// Whether calling `method` on a `kind` container is tracked as one
/// container-level change.
pub(crate) fn is_handled(kind: Kind, method: &str) -> bool {
    match kind {
        Kind::Record => IMMUTABLE_OBJECT_METHODS.contains(&method),
        Kind::Sequence => {
            IMMUTABLE_OBJECT_METHODS.contains(&method)
                || IMMUTABLE_ARRAY_METHODS.contains(&method)
                || MUTABLE_ARRAY_METHODS.iter().any(|(name, _)| *name == method)
        }
        Kind::Set => {
            IMMUTABLE_SET_METHODS.contains(&method)
                || MUTABLE_SET_METHODS.contains(&method)
                || COLLECTION_ITERATOR_METHODS.contains(&method)
        }
        Kind::Map => {
            IMMUTABLE_MAP_METHODS.contains(&method)
                || MUTABLE_MAP_METHODS.contains(&method)
                || COLLECTION_ITERATOR_METHODS.contains(&method)
        }
        Kind::Date | Kind::WeakSet | Kind::WeakMap => true,
        Kind::Opaque => false,
    }
}

/// How a handled mutating method's effect is detected. `None` for methods
/// that never change anything.
pub(crate) fn mutation_diff(kind: Kind, method: &str) -> Option<Diff> {
    match kind {
        Kind::Sequence => MUTABLE_ARRAY_METHODS
            .iter()
            .find(|(name, _)| *name == method)
            .map(|(_, diff)| *diff),
        Kind::Set if MUTABLE_SET_METHODS.contains(&method) => Some(Diff::Set),
        Kind::Map if MUTABLE_MAP_METHODS.contains(&method) => Some(Diff::Map),
        _ => None,
    }
}

/// A function stored under `method` on the innermost record of `target`.
pub(crate) fn user_method(target: &Value, method: &str) -> Option<Function> {
    let object = target.underlying()?;
    if object.kind() != Kind::Record {
        return None;
    }
    match object.get(&Key::from(method), target) {
        Value::Function(function) => Some(function),
        _ => None,
    }
}

/// Calls `method` on `target` with `this` as the receiver.
pub(crate) fn call(
    target: &Value,
    this: &Value,
    method: &str,
    args: &[Value],
) -> Result<Value, ObserveError> {
    if let Some(function) = user_method(target, method) {
        return function.call(this, args);
    }
    let Some(object) = target.underlying() else {
        return Err(not_callable(method));
    };
    let specific = match object.kind() {
        Kind::Sequence => sequence::call(this, &object, method, args),
        Kind::Set => collection::call_set(this, &object, method, args),
        Kind::Map => collection::call_map(this, &object, method, args),
        Kind::Date => date::call(&object, method, args),
        Kind::WeakSet | Kind::WeakMap => weak::call(this, &object, method, args),
        Kind::Record | Kind::Opaque => None,
    };
    specific
        .or_else(|| object::call(this, &object, method, args))
        .unwrap_or_else(|| Err(not_callable(method)))
}

pub(crate) fn not_callable(method: &str) -> ObserveError {
    ObserveError::NotCallable {
        method: method.to_string(),
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Unwraps a callback argument.
fn callback<'a>(args: &'a [Value], method: &str) -> Result<&'a Function, ObserveError> {
    args.first()
        .and_then(Value::as_function)
        .ok_or_else(|| not_callable(&format!("{method} callback")))
}
