use std::fmt;

use deep_observe_path::Key;
use serde_json::{Map, Number};

use crate::value::{Composite, Kind, Object, Slot, Value};

impl Value {
    /// Builds a fresh graph from JSON. Objects keep their key order.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => {
                Value::new_sequence(items.iter().map(Value::from_json))
            }
            serde_json::Value::Object(map) => {
                Value::new_record(map.iter().map(|(k, v)| (k.as_str(), Value::from_json(v))))
            }
        }
    }

    /// JSON snapshot of the graph, looking through wrappers.
    ///
    /// Sets become arrays, maps become objects keyed by the key's string
    /// form, dates become their millisecond value. Undefined record
    /// properties are skipped; cycles and non-JSON values become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        to_json(self, &mut Vec::new())
    }
}

fn to_json(value: &Value, visiting: &mut Vec<usize>) -> serde_json::Value {
    match value {
        Value::Undefined | Value::Function(_) | Value::Iterator(_) => serde_json::Value::Null,
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Symbol(symbol) => serde_json::Value::String(symbol.to_string()),
        Value::Object(_) | Value::Observed(_) => {
            let Some(object) = value.underlying() else {
                return serde_json::Value::Null;
            };
            if visiting.contains(&object.id()) {
                return serde_json::Value::Null;
            }
            visiting.push(object.id());
            let json = object_to_json(&object, visiting);
            visiting.pop();
            json
        }
    }
}

fn object_to_json(object: &Object, visiting: &mut Vec<usize>) -> serde_json::Value {
    let receiver = Value::Object(object.clone());
    match object.kind() {
        Kind::Record => {
            let mut out = Map::new();
            for key in object.keys() {
                let value = object.get(&key, &receiver);
                if value.is_undefined() || matches!(value, Value::Function(_)) {
                    continue;
                }
                out.insert(key.to_string(), to_json(&value, visiting));
            }
            serde_json::Value::Object(out)
        }
        Kind::Sequence | Kind::Set => {
            let items: Vec<Value> = match &*object.borrow() {
                Composite::Sequence(items) => items.clone(),
                Composite::Set(set) => set.iter().cloned().collect(),
                _ => Vec::new(),
            };
            serde_json::Value::Array(items.iter().map(|item| to_json(item, visiting)).collect())
        }
        Kind::Map => {
            let entries: Vec<(Value, Value)> = match &*object.borrow() {
                Composite::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                _ => Vec::new(),
            };
            let mut out = Map::new();
            for (key, value) in entries {
                out.insert(key.to_property_key().to_string(), to_json(&value, visiting));
            }
            serde_json::Value::Object(out)
        }
        Kind::Date => match &*object.borrow() {
            Composite::Date(millis) => number_to_json(*millis),
            _ => serde_json::Value::Null,
        },
        Kind::WeakSet | Kind::WeakMap => serde_json::Value::Object(Map::new()),
        Kind::Opaque => serde_json::Value::Null,
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

/// Structural equality through wrappers. Reference cycles compare equal
/// when both sides revisit the same pair.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    deep_equal_inner(a, b, &mut Vec::new())
}

fn deep_equal_inner(a: &Value, b: &Value, seen: &mut Vec<(usize, usize)>) -> bool {
    let (oa, ob) = match (a.underlying(), b.underlying()) {
        (Some(oa), Some(ob)) => (oa, ob),
        (None, None) => return a == b,
        _ => return false,
    };
    if oa.ptr_eq(&ob) || seen.contains(&(oa.id(), ob.id())) {
        return true;
    }
    if oa.kind() != ob.kind() {
        return false;
    }
    seen.push((oa.id(), ob.id()));
    let equal = match (&*oa.borrow(), &*ob.borrow()) {
        (Composite::Record(ra), Composite::Record(rb)) => {
            let enumerable = |(key, property): (&Key, &crate::value::Property)| {
                property.enumerable.then(|| (key.clone(), property.slot.clone()))
            };
            let pa: Vec<(Key, Slot)> = ra.iter().filter_map(enumerable).collect();
            let pb: Vec<(Key, Slot)> = rb.iter().filter_map(enumerable).collect();
            pa.len() == pb.len()
                && pa.iter().all(|(key, slot)| {
                    pb.iter()
                        .find(|(other, _)| other == key)
                        .is_some_and(|(_, other)| slot_equal(slot, other, seen))
                })
        }
        (Composite::Sequence(xa), Composite::Sequence(xb)) => {
            xa.len() == xb.len() && xa.iter().zip(xb).all(|(x, y)| deep_equal_inner(x, y, seen))
        }
        (Composite::Set(sa), Composite::Set(sb)) => {
            sa.len() == sb.len() && sa.iter().all(|item| sb.contains(item))
        }
        (Composite::Map(ma), Composite::Map(mb)) => {
            ma.len() == mb.len()
                && ma
                    .iter()
                    .all(|(k, v)| mb.get(k).is_some_and(|w| deep_equal_inner(v, w, seen)))
        }
        (Composite::Date(x), Composite::Date(y)) => {
            Value::is(&Value::Number(*x), &Value::Number(*y))
        }
        _ => false,
    };
    seen.pop();
    equal
}

fn slot_equal(a: &Slot, b: &Slot, seen: &mut Vec<(usize, usize)>) -> bool {
    match (a, b) {
        (Slot::Data { value: x, .. }, Slot::Data { value: y, .. }) => deep_equal_inner(x, y, seen),
        (Slot::Accessor { get: ga, set: sa }, Slot::Accessor { get: gb, set: sb }) => {
            super::object::same_function(ga, gb) && super::object::same_function(sa, sb)
        }
        _ => false,
    }
}

// ── Debug ───────────────────────────────────────────────────────────────

const DEBUG_DEPTH: usize = 4;

struct Shown<'a>(&'a Value, usize);

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Shown(self, DEBUG_DEPTH).fmt(f)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        object_debug(self, DEBUG_DEPTH, f)
    }
}

impl fmt::Debug for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Shown(value, depth) = *self;
        match value {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&super::number_to_string(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Symbol(symbol) => write!(f, "{symbol:?}"),
            Value::Function(function) => write!(f, "{function:?}"),
            Value::Iterator(_) => f.write_str("Iterator"),
            Value::Object(object) => object_debug(object, depth, f),
            Value::Observed(observed) => {
                write!(f, "Observed(")?;
                Shown(observed.target(), depth).fmt(f)?;
                write!(f, ")")
            }
        }
    }
}

fn object_debug(object: &Object, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if depth == 0 {
        return write!(f, "{} {{ .. }}", object.kind().name());
    }
    let Ok(composite) = object.try_borrow() else {
        return f.write_str("Object { <borrowed> }");
    };
    let next = depth - 1;
    match &*composite {
        Composite::Record(record) => {
            let mut map = f.debug_map();
            for (key, property) in record.iter() {
                match &property.slot {
                    Slot::Data { value, .. } => map.entry(key, &Shown(value, next)),
                    Slot::Accessor { .. } => map.entry(key, &format_args!("[accessor]")),
                };
            }
            map.finish()
        }
        Composite::Sequence(items) => f
            .debug_list()
            .entries(items.iter().map(|item| Shown(item, next)))
            .finish(),
        Composite::Set(set) => {
            write!(f, "Set ")?;
            f.debug_set().entries(set.iter().map(|item| Shown(item, next))).finish()
        }
        Composite::Map(map) => {
            write!(f, "Map ")?;
            f.debug_map()
                .entries(map.iter().map(|(k, v)| (Shown(k, next), Shown(v, next))))
                .finish()
        }
        Composite::Date(millis) => write!(f, "Date({})", super::number_to_string(*millis)),
        Composite::WeakSet(table) => write!(f, "WeakSet({})", table.len()),
        Composite::WeakMap(table) => write!(f, "WeakMap({})", table.len()),
        Composite::Opaque(_) => f.write_str("Opaque"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip_keeps_order_and_integers() {
        let source = json!({"z": 1, "a": [1, 2.5, null, "s"], "m": {"t": true}});
        let value = Value::from_json(&source);
        assert_eq!(value.to_json(), source);
        assert_eq!(
            value.keys().iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["z", "a", "m"]
        );
    }

    #[test]
    fn test_to_json_collections_and_cycles() {
        let root = Value::new_record([
            ("set", Value::new_set([Value::from(1), Value::from("x")])),
            ("map", Value::new_map([(Value::from(1), Value::from(true))])),
            ("when", Value::new_date(5.0)),
            ("gone", Value::Undefined),
        ]);
        root.set("me", root.clone()).unwrap();
        assert_eq!(
            root.to_json(),
            json!({"set": [1, "x"], "map": {"1": true}, "when": 5, "me": null})
        );
    }

    #[test]
    fn test_deep_equal_handles_cycles() {
        let a = Value::new_record([("n", Value::from(1))]);
        a.set("self", a.clone()).unwrap();
        let b = Value::new_record([("n", Value::from(1))]);
        b.set("self", b.clone()).unwrap();
        assert!(deep_equal(&a, &b));
        b.set("n", 2).unwrap();
        assert!(!deep_equal(&a, &b));
    }

    #[test]
    fn test_debug_is_depth_limited() {
        let leaf = Value::new_sequence([Value::from(1)]);
        let mut value = leaf;
        for _ in 0..10 {
            value = Value::new_sequence([value]);
        }
        let text = format!("{value:?}");
        assert!(text.contains("Array { .. }"));
    }
}
