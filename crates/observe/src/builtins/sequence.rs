//! Sequence methods.
//!
//! Mutating methods read and write through `this` one index at a time, so
//! through a wrapper in details mode every step is reported.

use std::cmp::Ordering;

use deep_observe_path::Key;

use crate::builtins::{arg, callback};
use crate::error::ObserveError;
use crate::iter::{collection_iter, IterKind};
use crate::value::{Kind, Object, Value};

pub(super) fn call(
    this: &Value,
    object: &Object,
    method: &str,
    args: &[Value],
) -> Option<Result<Value, ObserveError>> {
    let result = match method {
        "push" => push(this, args),
        "pop" => pop(this),
        "shift" => shift(this),
        "unshift" => unshift(this, args),
        "splice" => splice(this, args),
        "reverse" => reverse(this),
        "sort" => sort(this, args),
        "fill" => fill(this, args),
        "copyWithin" => copy_within(this, args),
        "flat" => Ok(flat(this, args)),
        "concat" => Ok(concat(this, args)),
        "includes" => Ok(includes(this, args)),
        "indexOf" => Ok(index_of(this, args)),
        "lastIndexOf" => Ok(last_index_of(this, args)),
        "join" => Ok(join(this, args)),
        "slice" => Ok(slice(this, args)),
        "at" => Ok(at(this, args)),
        "keys" => Ok(Value::Iterator(collection_iter(object.clone(), IterKind::Keys))),
        "values" => Ok(Value::Iterator(collection_iter(object.clone(), IterKind::Values))),
        "entries" => Ok(Value::Iterator(collection_iter(object.clone(), IterKind::Entries))),
        "forEach" | "map" | "filter" | "find" | "findIndex" | "some" | "every" => {
            iterate(this, method, args)
        }
        _ => return None,
    };
    Some(result)
}

fn length(this: &Value) -> usize {
    this.len()
}

fn element(this: &Value, index: usize) -> Value {
    this.get(Key::index(index))
}

fn put(this: &Value, index: usize, value: Value) -> Result<(), ObserveError> {
    this.set(Key::index(index), value)
}

fn remove(this: &Value, index: usize) -> Result<(), ObserveError> {
    this.delete(Key::index(index))
}

fn set_length(this: &Value, len: usize) -> Result<(), ObserveError> {
    this.set("length", len)
}

fn integer(value: &Value) -> f64 {
    let n = value.to_number();
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// Resolves a possibly negative index argument against `len`. A missing
/// argument yields `default`.
fn relative(args: &[Value], index: usize, len: usize, default: usize) -> usize {
    match args.get(index) {
        None | Some(Value::Undefined) => default,
        Some(value) => {
            let n = integer(value);
            if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                n.min(len as f64) as usize
            }
        }
    }
}

fn push(this: &Value, items: &[Value]) -> Result<Value, ObserveError> {
    let len = length(this);
    for (offset, item) in items.iter().enumerate() {
        put(this, len + offset, item.clone())?;
    }
    set_length(this, len + items.len())?;
    Ok(Value::from(len + items.len()))
}

fn pop(this: &Value) -> Result<Value, ObserveError> {
    let len = length(this);
    if len == 0 {
        set_length(this, 0)?;
        return Ok(Value::Undefined);
    }
    let last = element(this, len - 1);
    remove(this, len - 1)?;
    set_length(this, len - 1)?;
    Ok(last)
}

fn shift(this: &Value) -> Result<Value, ObserveError> {
    let len = length(this);
    if len == 0 {
        set_length(this, 0)?;
        return Ok(Value::Undefined);
    }
    let first = element(this, 0);
    for index in 1..len {
        put(this, index - 1, element(this, index))?;
    }
    remove(this, len - 1)?;
    set_length(this, len - 1)?;
    Ok(first)
}

fn unshift(this: &Value, items: &[Value]) -> Result<Value, ObserveError> {
    let len = length(this);
    let count = items.len();
    if count > 0 {
        for index in (0..len).rev() {
            put(this, index + count, element(this, index))?;
        }
        for (offset, item) in items.iter().enumerate() {
            put(this, offset, item.clone())?;
        }
    }
    set_length(this, len + count)?;
    Ok(Value::from(len + count))
}

fn splice(this: &Value, args: &[Value]) -> Result<Value, ObserveError> {
    let len = length(this);
    let start = relative(args, 0, len, 0);
    let delete_count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => (integer(&args[1]).max(0.0) as usize).min(len - start),
    };
    let items = args.get(2..).unwrap_or_default();
    let removed: Vec<Value> = (start..start + delete_count)
        .map(|index| element(this, index))
        .collect();

    let count = items.len();
    if count < delete_count {
        for index in start..len - delete_count {
            put(this, index + count, element(this, index + delete_count))?;
        }
        for index in (len - delete_count + count..len).rev() {
            remove(this, index)?;
        }
    } else if count > delete_count {
        for index in (start..len - delete_count).rev() {
            put(this, index + count, element(this, index + delete_count))?;
        }
    }
    for (offset, item) in items.iter().enumerate() {
        put(this, start + offset, item.clone())?;
    }
    set_length(this, len - delete_count + count)?;
    Ok(Value::new_sequence(removed))
}

fn reverse(this: &Value) -> Result<Value, ObserveError> {
    let len = length(this);
    let (mut lower, mut upper) = (0, len.saturating_sub(1));
    while lower < upper {
        let low = element(this, lower);
        let high = element(this, upper);
        put(this, lower, high)?;
        put(this, upper, low)?;
        lower += 1;
        upper -= 1;
    }
    Ok(this.clone())
}

fn sort(this: &Value, args: &[Value]) -> Result<Value, ObserveError> {
    let len = length(this);
    let comparator = args.first().and_then(Value::as_function).cloned();
    let (items, holes): (Vec<Value>, Vec<Value>) =
        (0..len).map(|index| element(this, index)).partition(|item| !item.is_undefined());
    let mut compare = |a: &Value, b: &Value| -> Result<Ordering, ObserveError> {
        match &comparator {
            Some(compare) => Ok(compare
                .call(&Value::Undefined, &[a.clone(), b.clone()])?
                .to_number()
                .partial_cmp(&0.0)
                .unwrap_or(Ordering::Equal)),
            None => Ok(a.display_string().cmp(&b.display_string())),
        }
    };
    let items = merge_sort(items, &mut compare)?;
    for (index, item) in items.into_iter().chain(holes).enumerate() {
        put(this, index, item)?;
    }
    Ok(this.clone())
}

/// Stable merge sort that accepts comparators which are not a total order.
/// The first comparator error aborts the sort.
fn merge_sort<F>(mut items: Vec<Value>, compare: &mut F) -> Result<Vec<Value>, ObserveError>
where
    F: FnMut(&Value, &Value) -> Result<Ordering, ObserveError>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        if compare(b, a)? == Ordering::Less {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn fill(this: &Value, args: &[Value]) -> Result<Value, ObserveError> {
    let len = length(this);
    let value = arg(args, 0);
    let start = relative(args, 1, len, 0);
    let end = relative(args, 2, len, len);
    for index in start..end {
        put(this, index, value.clone())?;
    }
    Ok(this.clone())
}

fn copy_within(this: &Value, args: &[Value]) -> Result<Value, ObserveError> {
    let len = length(this);
    let to = relative(args, 0, len, 0);
    let from = relative(args, 1, len, 0);
    let end = relative(args, 2, len, len);
    let count = end.saturating_sub(from).min(len - to);
    let copied: Vec<Value> = (from..from + count).map(|index| element(this, index)).collect();
    for (offset, item) in copied.into_iter().enumerate() {
        put(this, to + offset, item)?;
    }
    Ok(this.clone())
}

fn flat(this: &Value, args: &[Value]) -> Value {
    let depth = match args.first() {
        None | Some(Value::Undefined) => 1.0,
        Some(value) => integer(value),
    };
    let mut out = Vec::new();
    flatten_into(this, depth, &mut out);
    Value::new_sequence(out)
}

fn flatten_into(source: &Value, depth: f64, out: &mut Vec<Value>) {
    for index in 0..length(source) {
        let item = element(source, index);
        if depth >= 1.0 && item.kind() == Some(Kind::Sequence) {
            flatten_into(&item, depth - 1.0, out);
        } else {
            out.push(item);
        }
    }
}

fn concat(this: &Value, args: &[Value]) -> Value {
    let mut out: Vec<Value> = (0..length(this)).map(|index| element(this, index)).collect();
    for item in args {
        if item.kind() == Some(Kind::Sequence) {
            out.extend((0..length(item)).map(|index| element(item, index)));
        } else {
            out.push(item.clone());
        }
    }
    Value::new_sequence(out)
}

/// Search arguments may arrive wrapped while the stored items are raw, or
/// the other way around, so both sides are compared by their innermost
/// identity.
fn same_item(a: &Value, b: &Value, strict: bool) -> bool {
    if let (Some(x), Some(y)) = (a.underlying(), b.underlying()) {
        return x.ptr_eq(&y);
    }
    if strict {
        Value::strict_equals(a, b)
    } else {
        a == b
    }
}

fn includes(this: &Value, args: &[Value]) -> Value {
    let len = length(this);
    let needle = arg(args, 0);
    let start = relative(args, 1, len, 0);
    Value::Bool((start..len).any(|index| same_item(&element(this, index), &needle, false)))
}

fn index_of(this: &Value, args: &[Value]) -> Value {
    let len = length(this);
    let needle = arg(args, 0);
    let start = relative(args, 1, len, 0);
    let found = (start..len).find(|&index| same_item(&element(this, index), &needle, true));
    found.map_or(Value::from(-1), Value::from)
}

fn last_index_of(this: &Value, args: &[Value]) -> Value {
    let len = length(this);
    if len == 0 {
        return Value::from(-1);
    }
    let needle = arg(args, 0);
    let from = match args.get(1) {
        None => (len - 1) as f64,
        Some(value) => {
            let n = integer(value);
            if n < 0.0 {
                len as f64 + n
            } else {
                n.min((len - 1) as f64)
            }
        }
    };
    if from < 0.0 {
        return Value::from(-1);
    }
    let found = (0..=from as usize)
        .rev()
        .find(|&index| same_item(&element(this, index), &needle, true));
    found.map_or(Value::from(-1), Value::from)
}

fn join(this: &Value, args: &[Value]) -> Value {
    let separator = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(value) => value.display_string(),
    };
    let parts: Vec<String> = (0..length(this))
        .map(|index| match element(this, index) {
            Value::Undefined | Value::Null => String::new(),
            item => item.display_string(),
        })
        .collect();
    Value::from(parts.join(&separator))
}

fn slice(this: &Value, args: &[Value]) -> Value {
    let len = length(this);
    let start = relative(args, 0, len, 0);
    let end = relative(args, 1, len, len);
    Value::new_sequence((start..end.max(start)).map(|index| element(this, index)))
}

fn at(this: &Value, args: &[Value]) -> Value {
    let len = length(this) as f64;
    let n = integer(&arg(args, 0));
    let index = if n < 0.0 { len + n } else { n };
    if index < 0.0 || index >= len {
        return Value::Undefined;
    }
    element(this, index as usize)
}

fn iterate(this: &Value, method: &str, args: &[Value]) -> Result<Value, ObserveError> {
    let visit = callback(args, method)?;
    let len = length(this);
    let mut mapped = Vec::new();
    let mut kept = Vec::new();
    for index in 0..len {
        let item = element(this, index);
        let result = visit.call(
            &Value::Undefined,
            &[item.clone(), Value::from(index), this.clone()],
        )?;
        let truthy = is_truthy(&result);
        match method {
            "map" => mapped.push(result),
            "filter" if truthy => kept.push(item),
            "find" if truthy => return Ok(item),
            "findIndex" if truthy => return Ok(Value::from(index)),
            "some" if truthy => return Ok(Value::Bool(true)),
            "every" if !truthy => return Ok(Value::Bool(false)),
            _ => {}
        }
    }
    Ok(match method {
        "map" => Value::new_sequence(mapped),
        "filter" => Value::new_sequence(kept),
        "findIndex" => Value::from(-1),
        "some" => Value::Bool(false),
        "every" => Value::Bool(true),
        _ => Value::Undefined,
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
