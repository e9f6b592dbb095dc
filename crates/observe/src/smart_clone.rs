//! Snapshot stack for observed method calls.
//!
//! While a method runs on a container, writes made inside its subtree are
//! folded into a lazily-deepened copy of the container instead of being
//! reported one by one. When the call ends the top record tells whether
//! anything changed, offers the copy as the `previous` value and can undo
//! the call if a validator rejects it.

use std::cell::RefCell;
use std::collections::HashSet;

use deep_observe_path::{Key, Path};
use indexmap::{IndexMap, IndexSet};

use crate::options::Equals;
use crate::value::{resolve_path, Composite, Kind, Object, Value};

/// How a method's effect is detected once it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Diff {
    /// Always reports a change.
    Certain,
    /// Compares items with the pre-call baseline.
    Sequence,
    /// Compares membership and member contents.
    Set,
    /// Compares entries and value contents.
    Map,
}

/// A member of a set or an entry of a map, with a one-level copy of the
/// member's own contents when it is a container.
struct Member {
    key: Value,
    value: Value,
    contents: Option<Composite>,
}

impl Member {
    fn new(key: Value, value: Value) -> Self {
        let contents = match &value {
            Value::Object(object) if object.kind().is_container() => Some(object.borrow().clone()),
            _ => None,
        };
        Self {
            key,
            value,
            contents,
        }
    }

    fn contents_changed(&self) -> bool {
        match (&self.value, &self.contents) {
            (Value::Object(object), Some(snapshot)) => !object.borrow().shallow_eq(snapshot),
            _ => false,
        }
    }

    fn restore_contents(&self) {
        if let (Value::Object(object), Some(snapshot)) = (&self.value, &self.contents) {
            if !object.borrow().shallow_eq(snapshot) {
                object.restore(snapshot);
            }
        }
    }
}

enum Snapshot {
    /// Records and sequences.
    Tree { clone: Object, baseline: Composite },
    /// Sets and maps.
    Collection { clone: Object, members: Vec<Member> },
    Date { clone: Object, time: f64 },
    WeakSet { key: Option<Object>, had: bool },
    WeakMap { key: Option<Object>, had: bool, value: Value },
    Opaque,
}

impl Snapshot {
    fn take(object: &Object, args: &[Value], cloned: &mut HashSet<usize>) -> Snapshot {
        let baseline = object.borrow().clone();
        let mut register = |copy: Object| {
            cloned.insert(copy.id());
            copy
        };
        match baseline {
            Composite::Record(_) | Composite::Sequence(_) => Snapshot::Tree {
                clone: register(Object::new(baseline.clone())),
                baseline,
            },
            Composite::Set(items) => {
                let members = items.iter().map(|item| Member::new(item.clone(), item.clone())).collect();
                let copies: IndexSet<Value> =
                    items.iter().map(|item| shallow_clone(item, &mut register)).collect();
                Snapshot::Collection {
                    clone: register(Object::new(Composite::Set(copies))),
                    members,
                }
            }
            Composite::Map(entries) => {
                let members = entries
                    .iter()
                    .map(|(key, value)| Member::new(key.clone(), value.clone()))
                    .collect();
                let copies: IndexMap<Value, Value> = entries
                    .iter()
                    .map(|(key, value)| (key.clone(), shallow_clone(value, &mut register)))
                    .collect();
                Snapshot::Collection {
                    clone: register(Object::new(Composite::Map(copies))),
                    members,
                }
            }
            Composite::Date(time) => Snapshot::Date {
                clone: register(Object::new(Composite::Date(time))),
                time,
            },
            Composite::WeakSet(table) => {
                let key = args.first().and_then(Value::underlying);
                let had = key.as_ref().is_some_and(|key| table.contains(key));
                Snapshot::WeakSet { key, had }
            }
            Composite::WeakMap(table) => {
                let key = args.first().and_then(Value::underlying);
                let value = key.as_ref().and_then(|key| table.get(key).cloned());
                Snapshot::WeakMap {
                    had: value.is_some(),
                    value: value.unwrap_or_default(),
                    key,
                }
            }
            Composite::Opaque(_) => Snapshot::Opaque,
        }
    }

    fn clone_object(&self) -> Option<Object> {
        match self {
            Snapshot::Tree { clone, .. }
            | Snapshot::Collection { clone, .. }
            | Snapshot::Date { clone, .. } => Some(clone.clone()),
            _ => None,
        }
    }
}

fn shallow_clone(value: &Value, register: &mut impl FnMut(Object) -> Object) -> Value {
    match value {
        Value::Object(object)
            if !matches!(object.kind(), Kind::Opaque | Kind::WeakSet | Kind::WeakMap) =>
        {
            Value::Object(register(object.shallow_copy()))
        }
        other => other.clone(),
    }
}

enum Undo {
    Write {
        parent: Path,
        key: Key,
        previous: Value,
    },
    Nested {
        target: Value,
        record: CloneRecord,
    },
}

impl Undo {
    fn revert(self, receiver: &Value) {
        match self {
            Undo::Write {
                parent,
                key,
                previous,
            } => {
                let Some(holder) = resolve_path(receiver, &parent).underlying() else {
                    return;
                };
                if previous.is_undefined() {
                    holder.delete(&key);
                } else {
                    holder.set(&key, previous, &Value::Object(holder.clone()));
                }
            }
            Undo::Nested { target, record } => record.undo(&target),
        }
    }
}

/// Snapshot of one in-flight method call.
pub(crate) struct CloneRecord {
    path: Path,
    snapshot: Snapshot,
    diff: Option<Diff>,
    changed: bool,
    log: Option<Vec<Undo>>,
    restored: HashSet<Path>,
    cloned: HashSet<usize>,
}

impl CloneRecord {
    /// The pre-call copy reported as `previous`. Weak collections have none.
    pub fn previous(&self) -> Value {
        self.snapshot
            .clone_object()
            .map(Value::Object)
            .unwrap_or_default()
    }

    pub fn is_changed(&self, target: &Value, equals: &Equals) -> bool {
        let Some(object) = target.underlying() else {
            return self.changed;
        };
        match &self.snapshot {
            Snapshot::Date { time, .. } => {
                let now = match &*object.borrow() {
                    Composite::Date(now) => *now,
                    _ => f64::NAN,
                };
                !equals(&Value::Number(*time), &Value::Number(now))
            }
            Snapshot::WeakSet { key: Some(key), had } => match &*object.borrow() {
                Composite::WeakSet(table) => table.contains(key) != *had,
                _ => false,
            },
            Snapshot::WeakMap {
                key: Some(key),
                value,
                ..
            } => match &*object.borrow() {
                Composite::WeakMap(table) => {
                    !Value::is(value, &table.get(key).cloned().unwrap_or_default())
                }
                _ => false,
            },
            Snapshot::WeakSet { key: None, .. } | Snapshot::WeakMap { key: None, .. } => false,
            Snapshot::Tree { baseline, .. } => match self.diff {
                Some(Diff::Certain) => true,
                Some(Diff::Sequence) => !object.borrow().shallow_eq(baseline),
                _ => self.changed,
            },
            Snapshot::Collection { members, .. } => match self.diff {
                Some(Diff::Certain) => true,
                Some(Diff::Set | Diff::Map) => collection_changed(&object, members),
                _ => self.changed,
            },
            Snapshot::Opaque => self.changed,
        }
    }

    /// Reverts the call: replays logged writes newest first, then restores
    /// the receiver's own contents.
    pub fn undo(self, target: &Value) {
        let Some(object) = target.underlying() else {
            return;
        };
        if let Some(log) = self.log {
            for entry in log.into_iter().rev() {
                entry.revert(target);
            }
        }
        match self.snapshot {
            Snapshot::Tree { baseline, .. } => object.restore(&baseline),
            Snapshot::Collection { members, .. } => {
                let rebuilt = match object.kind() {
                    Kind::Set => Composite::Set(members.iter().map(|m| m.key.clone()).collect()),
                    Kind::Map => Composite::Map(
                        members
                            .iter()
                            .map(|m| (m.key.clone(), m.value.clone()))
                            .collect(),
                    ),
                    _ => return,
                };
                object.restore(&rebuilt);
                for member in &members {
                    member.restore_contents();
                }
            }
            Snapshot::Date { time, .. } => object.restore(&Composite::Date(time)),
            Snapshot::WeakSet { key: Some(key), had } => {
                if let Composite::WeakSet(table) = &mut *object.borrow_mut() {
                    if had {
                        table.insert(&key, ());
                    } else {
                        table.remove(&key);
                    }
                }
            }
            Snapshot::WeakMap {
                key: Some(key),
                had,
                value,
            } => {
                if let Composite::WeakMap(table) = &mut *object.borrow_mut() {
                    if had {
                        table.insert(&key, value);
                    } else {
                        table.remove(&key);
                    }
                }
            }
            _ => {}
        }
    }

    /// Puts `previous` at `parent.key` inside the copy, copying containers
    /// along the way. Only the first write to a location counts, and writes
    /// beneath an already restored location are ignored.
    fn restore(&mut self, parent: &Path, key: &Key, previous: Value) {
        let mut keys = parent.keys();
        for end in 1..=keys.len() {
            if self.restored.contains(&Path::Segments(keys[..end].to_vec())) {
                return;
            }
        }
        keys.push(key.clone());
        if !self.restored.insert(Path::Segments(keys)) {
            return;
        }
        let Some(mut holder) = self.snapshot.clone_object() else {
            return;
        };
        for step in parent.keys() {
            let Value::Object(child) = holder.peek(&step) else {
                return;
            };
            if !child.kind().is_container() {
                return;
            }
            if self.cloned.contains(&child.id()) {
                holder = child;
            } else {
                let copy = child.shallow_copy();
                self.cloned.insert(copy.id());
                holder.force_set(&step, Value::Object(copy.clone()));
                holder = copy;
            }
        }
        if previous.is_undefined() {
            holder.force_delete(key);
        } else {
            holder.force_set(key, previous);
        }
    }
}

fn collection_changed(object: &Object, members: &[Member]) -> bool {
    match &*object.borrow() {
        Composite::Set(set) => {
            set.len() != members.len()
                || members
                    .iter()
                    .any(|m| !set.contains(&m.key) || m.contents_changed())
        }
        Composite::Map(map) => {
            map.len() != members.len()
                || members.iter().any(|m| match map.get(&m.key) {
                    Some(value) => !Value::is(value, &m.value) || m.contents_changed(),
                    None => true,
                })
        }
        _ => false,
    }
}

/// Stack of in-flight method calls for one root.
pub(crate) struct SmartClone {
    stack: RefCell<Vec<CloneRecord>>,
    keep_log: bool,
}

impl SmartClone {
    /// `keep_log` records every buffered write so a rejected call can be
    /// undone; it is only needed when a validator is installed.
    pub fn new(keep_log: bool) -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            keep_log,
        }
    }

    /// Whether `path` lies inside the receiver subtree of the innermost
    /// in-flight call.
    pub fn covers(&self, path: &Path) -> bool {
        self.stack
            .borrow()
            .last()
            .is_some_and(|record| path.strip_prefix(&record.path).is_some())
    }

    pub fn start(&self, target: &Value, path: Path, args: &[Value], diff: Option<Diff>) {
        let mut cloned = HashSet::new();
        let snapshot = match target.underlying() {
            Some(object) => Snapshot::take(&object, args, &mut cloned),
            None => Snapshot::Opaque,
        };
        tracing::trace!(path = %path, depth = self.stack.borrow().len(), "snapshot taken");
        self.stack.borrow_mut().push(CloneRecord {
            path,
            snapshot,
            diff,
            changed: false,
            log: self.keep_log.then(Vec::new),
            restored: HashSet::new(),
            cloned,
        });
    }

    pub fn stop(&self) -> Option<CloneRecord> {
        self.stack.borrow_mut().pop()
    }

    /// Buffers a write at `full_path` whose old value was `previous`.
    pub fn update(&self, full_path: &Path, previous: Value) {
        let mut stack = self.stack.borrow_mut();
        let Some(record) = stack.last_mut() else {
            return;
        };
        let Some(relative) = full_path.strip_prefix(&record.path) else {
            return;
        };
        record.changed = true;
        if relative.is_root() {
            return;
        }
        let key = relative.last();
        let parent = relative.initial();
        if let Some(log) = &mut record.log {
            log.push(Undo::Write {
                parent: parent.clone(),
                key: key.clone(),
                previous: previous.clone(),
            });
        }
        record.restore(&parent, &key, previous);
    }

    /// Buffers a completed nested call on a container at `full_path`.
    pub fn absorb(&self, full_path: &Path, target: Value, nested: CloneRecord, previous: Value) {
        let mut stack = self.stack.borrow_mut();
        let Some(record) = stack.last_mut() else {
            return;
        };
        let Some(relative) = full_path.strip_prefix(&record.path) else {
            return;
        };
        record.changed = true;
        if !relative.is_root() {
            record.restore(&relative.initial(), &relative.last(), previous);
        }
        if let Some(log) = &mut record.log {
            log.push(Undo::Nested {
                target,
                record: nested,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    fn equals() -> Equals {
        Rc::new(Value::is)
    }

    #[test]
    fn test_first_write_wins_in_copy() {
        let clones = SmartClone::new(true);
        let target = Value::new_record([("a", Value::from(1))]);
        clones.start(&target, Path::text(""), &[], None);
        target.set("a", 2).unwrap();
        clones.update(&Path::text("a"), Value::from(1));
        target.set("a", 3).unwrap();
        clones.update(&Path::text("a"), Value::from(2));
        let record = clones.stop().unwrap();
        assert!(record.is_changed(&target, &equals()));
        assert_eq!(record.previous().get("a").as_number(), Some(1.0));
    }

    #[test]
    fn test_nested_copy_leaves_live_graph_alone() {
        let clones = SmartClone::new(false);
        let inner = Value::new_record([("x", Value::from(1))]);
        let target = Value::new_record([("inner", inner.clone())]);
        clones.start(&target, Path::text("root"), &[], None);
        inner.set("x", 2).unwrap();
        clones.update(&Path::text("root.inner.x"), Value::from(1));
        let record = clones.stop().unwrap();
        let previous = record.previous();
        assert_eq!(previous.get("inner").get("x").as_number(), Some(1.0));
        assert_eq!(inner.get("x").as_number(), Some(2.0));
        assert!(!Value::is(&previous.get("inner"), &inner));
    }

    #[test]
    fn test_sequence_diff_and_undo() {
        let clones = SmartClone::new(true);
        let target = Value::new_sequence([Value::from(3), Value::from(1), Value::from(2)]);
        clones.start(&target, Path::text("list"), &[], Some(Diff::Sequence));
        target.underlying().unwrap().restore(&Composite::Sequence(vec![
            Value::from(1),
            Value::from(2),
            Value::from(3),
        ]));
        let record = clones.stop().unwrap();
        assert!(record.is_changed(&target, &equals()));
        record.undo(&target);
        assert_eq!(target.to_json(), serde_json::json!([3, 1, 2]));
    }

    #[test]
    fn test_set_content_change_is_detected() {
        let clones = SmartClone::new(true);
        let member = Value::new_record([("n", Value::from(1))]);
        let target = Value::new_set([member.clone()]);
        clones.start(&target, Path::text(""), &[], Some(Diff::Set));
        member.set("n", 2).unwrap();
        let record = clones.stop().unwrap();
        assert!(record.is_changed(&target, &equals()));
        record.undo(&target);
        assert_eq!(member.get("n").as_number(), Some(1.0));
    }

    #[test]
    fn test_covers_is_segment_aware() {
        let clones = SmartClone::new(false);
        let target = Value::new_record(Vec::<(&str, Value)>::new());
        clones.start(&target, Path::text("a"), &[], None);
        assert!(clones.covers(&Path::text("a")));
        assert!(clones.covers(&Path::text("a.b")));
        assert!(!clones.covers(&Path::text("ab")));
        assert!(clones.stop().is_some());
        assert!(clones.stop().is_none());
    }
}
