//! Weak set and weak map methods. Keys must be objects.

use crate::builtins::arg;
use crate::error::ObserveError;
use crate::value::{Composite, Object, Value};

pub(super) fn call(
    this: &Value,
    object: &Object,
    method: &str,
    args: &[Value],
) -> Option<Result<Value, ObserveError>> {
    let key = arg(args, 0).underlying();
    let mut composite = object.borrow_mut();
    let result = match (&mut *composite, method) {
        (Composite::WeakSet(table), "add") => match key {
            Some(key) => {
                table.insert(&key, ());
                Ok(this.clone())
            }
            None => Err(ObserveError::InvalidWeakKey),
        },
        (Composite::WeakMap(table), "set") => match key {
            Some(key) => {
                table.insert(&key, arg(args, 1));
                Ok(this.clone())
            }
            None => Err(ObserveError::InvalidWeakKey),
        },
        (Composite::WeakMap(table), "get") => Ok(key
            .and_then(|key| table.get(&key).cloned())
            .unwrap_or_default()),
        (Composite::WeakSet(table), "has") => {
            Ok(Value::Bool(key.is_some_and(|key| table.contains(&key))))
        }
        (Composite::WeakMap(table), "has") => {
            Ok(Value::Bool(key.is_some_and(|key| table.contains(&key))))
        }
        (Composite::WeakSet(table), "delete") => {
            Ok(Value::Bool(key.is_some_and(|key| table.remove(&key))))
        }
        (Composite::WeakMap(table), "delete") => {
            Ok(Value::Bool(key.is_some_and(|key| table.remove(&key))))
        }
        _ => return None,
    };
    Some(result)
}
