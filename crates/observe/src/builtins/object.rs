//! Methods every container answers to.

use crate::builtins::arg;
use crate::error::ObserveError;
use crate::value::{Object, Value};

pub(super) fn call(
    this: &Value,
    object: &Object,
    method: &str,
    args: &[Value],
) -> Option<Result<Value, ObserveError>> {
    let result = match method {
        "hasOwnProperty" => Value::Bool(object.own_property(&arg(args, 0).to_property_key()).is_some()),
        "isPrototypeOf" => Value::Bool(false),
        "propertyIsEnumerable" => Value::Bool(
            object
                .own_property(&arg(args, 0).to_property_key())
                .and_then(|d| d.enumerable)
                .unwrap_or(false),
        ),
        "toString" | "toLocaleString" => Value::from(this.display_string()),
        "valueOf" => this.clone(),
        _ => return None,
    };
    Some(Ok(result))
}
