//! Per-root memo of wrappers, paths and property descriptors.
//!
//! Entries are keyed by target identity and hold only weak references, so
//! the cache never keeps a target or its wrapper alive. Dead entries are
//! pruned when the table grows.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use deep_observe_path::{Key, Path};

use crate::observed::{Context, Node, Observed};
use crate::options::Equals;
use crate::value::{resolve_path, PropertyDescriptor, Value, WeakObject};

const MIN_PRUNE_AT: usize = 64;

enum WeakTarget {
    Object(WeakObject),
    Observed(Weak<Node>),
}

impl WeakTarget {
    fn of(value: &Value) -> Option<(usize, WeakTarget)> {
        match value {
            Value::Object(object) => Some((object.id(), WeakTarget::Object(object.downgrade()))),
            Value::Observed(observed) => {
                Some((observed.id(), WeakTarget::Observed(observed.downgrade())))
            }
            _ => None,
        }
    }

    fn is_alive(&self) -> bool {
        match self {
            WeakTarget::Object(weak) => weak.is_alive(),
            WeakTarget::Observed(weak) => weak.strong_count() > 0,
        }
    }
}

struct Entry {
    target: WeakTarget,
    wrapper: Weak<Node>,
    path: Option<Path>,
    descriptors: HashMap<Key, PropertyDescriptor>,
}

pub(crate) struct Cache {
    equals: Equals,
    entries: RefCell<HashMap<usize, Entry>>,
    prune_at: Cell<usize>,
    unsubscribed: Cell<bool>,
}

impl Cache {
    pub fn new(equals: Equals) -> Self {
        Self {
            equals,
            entries: RefCell::new(HashMap::new()),
            prune_at: Cell::new(MIN_PRUNE_AT),
            unsubscribed: Cell::new(false),
        }
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribed.get()
    }

    /// Drops every memo; all later lookups report nothing.
    pub fn unsubscribe(&self) {
        self.unsubscribed.set(true);
        self.entries.borrow_mut().clear();
    }

    fn with_entry<R>(
        &self,
        value: &Value,
        create: bool,
        f: impl FnOnce(&mut Entry) -> R,
    ) -> Option<R> {
        let (id, target) = WeakTarget::of(value)?;
        let mut entries = self.entries.borrow_mut();
        if entries.get(&id).is_some_and(|entry| !entry.target.is_alive()) {
            entries.remove(&id);
        }
        if !entries.contains_key(&id) {
            if !create {
                return None;
            }
            if entries.len() >= self.prune_at.get() {
                entries.retain(|_, entry| entry.target.is_alive());
                self.prune_at.set((entries.len() * 2).max(MIN_PRUNE_AT));
            }
            entries.insert(
                id,
                Entry {
                    target,
                    wrapper: Weak::new(),
                    path: None,
                    descriptors: HashMap::new(),
                },
            );
        }
        entries.get_mut(&id).map(f)
    }

    /// Returns the memoized wrapper of `value`, creating it on first use,
    /// and records `path` as its current location.
    pub fn get_wrapper(&self, ctx: &Rc<Context>, value: &Value, path: Path) -> Value {
        if self.is_unsubscribed() {
            return value.clone();
        }
        if let Value::Observed(observed) = value {
            if observed.belongs_to(ctx) {
                self.set_path(observed.target(), path);
                return value.clone();
            }
        }
        let existing = self
            .with_entry(value, true, |entry| {
                entry.path = Some(path.clone());
                entry.wrapper.upgrade()
            })
            .flatten();
        if let Some(node) = existing {
            return Value::Observed(Observed::from_node(node));
        }
        tracing::trace!(path = %path, kind = value.type_name(), "wrapping value");
        let observed = Observed::new(Rc::clone(ctx), value.clone());
        self.with_entry(value, true, |entry| entry.wrapper = observed.downgrade());
        Value::Observed(observed)
    }

    pub fn get_path(&self, value: &Value) -> Option<Path> {
        if self.is_unsubscribed() {
            return None;
        }
        self.with_entry(value, false, |entry| entry.path.clone()).flatten()
    }

    pub fn set_path(&self, value: &Value, path: Path) {
        if !self.is_unsubscribed() {
            self.with_entry(value, true, |entry| entry.path = Some(path));
        }
    }

    /// A node is detached when its recorded path no longer leads to it from
    /// the root, or when it has no recorded path at all. Containers compare
    /// by their innermost object, so a node of a nested root matches the raw
    /// value its path resolves to.
    pub fn is_detached(&self, target: &Value, root: &Value) -> bool {
        let Some(path) = self.get_path(target) else {
            return true;
        };
        let resolved = resolve_path(root, &path);
        match (target.underlying(), resolved.underlying()) {
            (Some(ours), Some(found)) => !ours.ptr_eq(&found),
            _ => !Value::is(target, &resolved),
        }
    }

    pub fn get_own_descriptor(&self, target: &Value, key: &Key) -> Option<PropertyDescriptor> {
        if self.is_unsubscribed() {
            return target.own_property_descriptor(key);
        }
        if let Some(Some(cached)) =
            self.with_entry(target, false, |entry| entry.descriptors.get(key).cloned())
        {
            return Some(cached);
        }
        let descriptor = target.own_property_descriptor(key)?;
        self.with_entry(target, true, |entry| {
            entry.descriptors.insert(key.clone(), descriptor.clone())
        });
        Some(descriptor)
    }

    /// Non-configurable, non-writable properties must be returned unwrapped.
    pub fn is_get_invariant(&self, target: &Value, key: &Key) -> bool {
        self.get_own_descriptor(target, key)
            .is_some_and(|d| d.configurable != Some(true) && d.writable != Some(true))
    }

    pub fn is_same_descriptor(&self, a: &PropertyDescriptor, target: &Value, key: &Key) -> bool {
        let Some(b) = self.get_own_descriptor(target, key) else {
            return false;
        };
        let same_value = match (&a.value, &b.value) {
            (Some(x), Some(y)) => Value::is(x, y),
            (None, None) => true,
            (Some(x), None) | (None, Some(x)) => x.is_undefined(),
        };
        let same_fn = |x: &Option<crate::value::Function>, y: &Option<crate::value::Function>| {
            match (x, y) {
                (Some(x), Some(y)) => x.ptr_eq(y),
                (None, None) => true,
                _ => false,
            }
        };
        same_value
            && a.writable.unwrap_or(false) == b.writable.unwrap_or(false)
            && a.enumerable.unwrap_or(false) == b.enumerable.unwrap_or(false)
            && a.configurable.unwrap_or(false) == b.configurable.unwrap_or(false)
            && same_fn(&a.get, &b.get)
            && same_fn(&a.set, &b.set)
    }

    /// Writes `key` unless the value is unchanged and the key exists.
    /// Setters run with `receiver` as `this`.
    pub fn set_property(
        &self,
        target: &Value,
        key: &Key,
        value: Value,
        receiver: &Value,
        previous: &Value,
    ) -> bool {
        if (self.equals)(previous, &value) && target.has_key(key) {
            return true;
        }
        let has_setter = self
            .get_own_descriptor(target, key)
            .is_some_and(|d| d.set.is_some());
        let written = if has_setter {
            target.set_with_receiver(key, value.clone(), receiver)
        } else {
            target.set_key(key.clone(), value.clone()).is_ok()
        };
        if written && !self.is_unsubscribed() {
            self.with_entry(target, false, |entry| {
                if let Some(descriptor) = entry.descriptors.get_mut(key) {
                    if !descriptor.is_accessor() {
                        descriptor.value = Some(value);
                    }
                }
            });
        }
        written
    }

    pub fn define_property(
        &self,
        target: &Value,
        key: &Key,
        descriptor: PropertyDescriptor,
    ) -> bool {
        if target.define_property(key, descriptor).is_err() {
            return false;
        }
        if !self.is_unsubscribed() {
            let current = target.own_property_descriptor(key);
            self.with_entry(target, true, |entry| match current {
                Some(current) => {
                    entry.descriptors.insert(key.clone(), current);
                }
                None => {
                    entry.descriptors.remove(key);
                }
            });
        }
        true
    }

    /// Deletes `key`. The removed value keeps its last recorded path, so
    /// later writes to it report where it used to live.
    pub fn delete_property(&self, target: &Value, key: &Key) -> bool {
        if target.delete_key(key).is_err() {
            return false;
        }
        if !self.is_unsubscribed() {
            self.with_entry(target, false, |entry| entry.descriptors.remove(key));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> Cache {
        Cache::new(Rc::new(Value::is))
    }

    #[test]
    fn test_paths_are_forgotten_after_unsubscribe() {
        let cache = cache();
        let value = Value::new_record([("a", Value::from(1))]);
        cache.set_path(&value, Path::text("x"));
        assert_eq!(cache.get_path(&value), Some(Path::text("x")));
        cache.unsubscribe();
        assert_eq!(cache.get_path(&value), None);
        cache.set_path(&value, Path::text("y"));
        assert_eq!(cache.get_path(&value), None);
    }

    #[test]
    fn test_descriptor_cache_tracks_writes() {
        let cache = cache();
        let target = Value::new_record([("a", Value::from(1))]);
        let key = Key::from("a");
        assert!(cache.get_own_descriptor(&target, &key).is_some());
        assert!(cache.set_property(&target, &key, Value::from(2), &target, &Value::from(1)));
        let cached = cache.get_own_descriptor(&target, &key).unwrap();
        assert_eq!(cached.value.and_then(|v| v.as_number()), Some(2.0));
    }

    #[test]
    fn test_detached_after_replacement() {
        let cache = cache();
        let child = Value::new_record([("n", Value::from(1))]);
        let root = Value::new_record([("child", child.clone())]);
        cache.set_path(&child, Path::text("child"));
        assert!(!cache.is_detached(&child, &root));
        root.set("child", Value::from(0)).unwrap();
        assert!(cache.is_detached(&child, &root));
    }

    #[test]
    fn test_dead_entries_are_replaced() {
        let cache = cache();
        for _ in 0..(MIN_PRUNE_AT * 3) {
            let value = Value::new_sequence([]);
            cache.set_path(&value, Path::text("tmp"));
        }
        assert!(cache.entries.borrow().len() <= MIN_PRUNE_AT * 2);
    }
}
