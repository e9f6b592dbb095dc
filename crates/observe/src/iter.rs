//! Lazy iterators over containers, and their wrapped form.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use deep_observe_path::{Key, Path};

use crate::observed::Context;
use crate::value::{Composite, Object, Value};

/// A shared, lazily-advanced iterator of values.
///
/// Cloning shares the cursor: advancing one clone advances them all.
#[derive(Clone)]
pub struct ValueIter(Rc<RefCell<Box<dyn Iterator<Item = Value>>>>);

impl ValueIter {
    pub fn new(iter: impl Iterator<Item = Value> + 'static) -> Self {
        Self(Rc::new(RefCell::new(Box::new(iter))))
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.0.borrow_mut().next()
    }
}

impl fmt::Debug for ValueIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueIter")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IterKind {
    Keys,
    Values,
    Entries,
}

/// Iterates a sequence, set or map in order, reading live state on each
/// step. Entries are `[key, value]` pairs; set entries repeat the member.
pub(crate) fn collection_iter(object: Object, kind: IterKind) -> ValueIter {
    let mut index = 0;
    let iter = std::iter::from_fn(move || {
        let item = match &*object.borrow() {
            Composite::Sequence(items) => items.get(index).map(|item| (Value::from(index), item.clone())),
            Composite::Set(set) => set.get_index(index).map(|item| (item.clone(), item.clone())),
            Composite::Map(map) => map.get_index(index).map(|(k, v)| (k.clone(), v.clone())),
            _ => None,
        };
        index += 1;
        item.map(|(key, value)| match kind {
            IterKind::Keys => key,
            IterKind::Values => value,
            IterKind::Entries => Value::new_sequence([key, value]),
        })
    });
    ValueIter::new(iter.fuse())
}

/// Wraps an iterator produced by a set or map method so that yielded
/// containers come back observed, at `base` joined with the entry's key.
pub(crate) fn wrap_iterator(
    ctx: &Rc<Context>,
    iter: ValueIter,
    method: &str,
    target: &Value,
    base: Path,
) -> ValueIter {
    let ctx = Rc::clone(ctx);
    let target = target.clone();
    match method {
        "entries" => ValueIter::new(iter.map(move |entry| {
            let key = entry.get(Key::index(0));
            let value = entry.get(Key::index(1));
            let property = key.to_property_key();
            let key = ctx.prepare_value(key, &target, &property, Some(&base));
            let value = ctx.prepare_value(value, &target, &property, Some(&base));
            Value::new_sequence([key, value])
        })),
        "values" => {
            let mut keys = match target.underlying() {
                Some(object) => collection_iter(object, IterKind::Keys),
                None => ValueIter::new(std::iter::empty()),
            };
            ValueIter::new(iter.map(move |value| {
                let property = keys
                    .next()
                    .map(|key| key.to_property_key())
                    .unwrap_or_else(|| Key::from(""));
                ctx.prepare_value(value, &target, &property, Some(&base))
            }))
        }
        _ => ValueIter::new(iter.map(move |key| {
            let property = key.to_property_key();
            ctx.prepare_value(key, &target, &property, Some(&base))
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_entries_are_pairs() {
        let map = Value::new_map([(Value::from("a"), Value::from(1)), (Value::from("b"), Value::from(2))]);
        let entries: Vec<_> = collection_iter(map.underlying().unwrap(), IterKind::Entries)
            .map(|pair| pair.to_json())
            .collect();
        assert_eq!(entries, vec![serde_json::json!(["a", 1]), serde_json::json!(["b", 2])]);
    }

    #[test]
    fn test_iteration_reads_live_state_and_stays_done() {
        let list = Value::new_sequence([Value::from(1)]);
        let mut values = collection_iter(list.underlying().unwrap(), IterKind::Values);
        list.set(1, 2).unwrap();
        assert_eq!(values.next().and_then(|v| v.as_number()), Some(1.0));
        assert_eq!(values.next().and_then(|v| v.as_number()), Some(2.0));
        assert!(values.next().is_none());
        list.set(2, 3).unwrap();
        assert!(values.next().is_none());
    }

    #[test]
    fn test_clones_share_the_cursor() {
        let set = Value::new_set([Value::from("x"), Value::from("y")]);
        let mut a = collection_iter(set.underlying().unwrap(), IterKind::Keys);
        let mut b = a.clone();
        assert_eq!(a.next().and_then(|v| v.as_str().map(String::from)), Some("x".into()));
        assert_eq!(b.next().and_then(|v| v.as_str().map(String::from)), Some("y".into()));
    }
}
