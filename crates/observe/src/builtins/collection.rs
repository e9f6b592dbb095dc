//! Set and map methods. These always operate on the raw container.

use crate::builtins::{arg, callback};
use crate::error::ObserveError;
use crate::iter::{collection_iter, IterKind};
use crate::value::{Composite, Object, Value};

pub(crate) fn call_set(
    this: &Value,
    object: &Object,
    method: &str,
    args: &[Value],
) -> Option<Result<Value, ObserveError>> {
    let result = match method {
        "has" => Ok(Value::Bool(with_set(object, |set| set.contains(&arg(args, 0))))),
        "add" => {
            with_set(object, |set| set.insert(arg(args, 0)));
            Ok(this.clone())
        }
        "delete" => Ok(Value::Bool(with_set(object, |set| {
            set.shift_remove(&arg(args, 0))
        }))),
        "clear" => {
            with_set(object, |set| set.clear());
            Ok(Value::Undefined)
        }
        "forEach" => for_each(this, object, args, "forEach"),
        "keys" | "values" => Ok(Value::Iterator(collection_iter(object.clone(), IterKind::Values))),
        "entries" => Ok(Value::Iterator(collection_iter(object.clone(), IterKind::Entries))),
        _ => return None,
    };
    Some(result)
}

pub(crate) fn call_map(
    this: &Value,
    object: &Object,
    method: &str,
    args: &[Value],
) -> Option<Result<Value, ObserveError>> {
    let result = match method {
        "has" => Ok(Value::Bool(with_map(object, |map| map.contains_key(&arg(args, 0))))),
        "get" => Ok(with_map(object, |map| map.get(&arg(args, 0)).cloned()).unwrap_or_default()),
        "set" => {
            with_map(object, |map| map.insert(arg(args, 0), arg(args, 1)));
            Ok(this.clone())
        }
        "delete" => Ok(Value::Bool(
            with_map(object, |map| map.shift_remove(&arg(args, 0))).is_some(),
        )),
        "clear" => {
            with_map(object, |map| map.clear());
            Ok(Value::Undefined)
        }
        "forEach" => for_each(this, object, args, "forEach"),
        "keys" => Ok(Value::Iterator(collection_iter(object.clone(), IterKind::Keys))),
        "values" => Ok(Value::Iterator(collection_iter(object.clone(), IterKind::Values))),
        "entries" => Ok(Value::Iterator(collection_iter(object.clone(), IterKind::Entries))),
        _ => return None,
    };
    Some(result)
}

fn with_set<R: Default>(
    object: &Object,
    f: impl FnOnce(&mut indexmap::IndexSet<Value>) -> R,
) -> R {
    match &mut *object.borrow_mut() {
        Composite::Set(set) => f(set),
        _ => R::default(),
    }
}

fn with_map<R: Default>(
    object: &Object,
    f: impl FnOnce(&mut indexmap::IndexMap<Value, Value>) -> R,
) -> R {
    match &mut *object.borrow_mut() {
        Composite::Map(map) => f(map),
        _ => R::default(),
    }
}

/// Visits entries in order, re-reading the container between callbacks so
/// entries added during iteration are visited too.
fn for_each(
    this: &Value,
    object: &Object,
    args: &[Value],
    method: &str,
) -> Result<Value, ObserveError> {
    let visit = callback(args, method)?.clone();
    let mut index = 0;
    loop {
        let entry = match &*object.borrow() {
            Composite::Set(set) => set.get_index(index).map(|item| (item.clone(), item.clone())),
            Composite::Map(map) => map.get_index(index).map(|(k, v)| (k.clone(), v.clone())),
            _ => None,
        };
        let Some((key, value)) = entry else {
            return Ok(Value::Undefined);
        };
        visit.call(&Value::Undefined, &[value, key, this.clone()])?;
        index += 1;
    }
}
