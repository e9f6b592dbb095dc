//! Shared mutable containers and their property-level operations.
//!
//! Everything here is "raw": no interception, no notifications. The engine
//! builds on these primitives and every undo and snapshot goes through them.

use std::any::Any;
use std::cell::{BorrowError, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use deep_observe_path::Key;
use indexmap::{IndexMap, IndexSet};

use crate::value::{Function, Value};

/// Container kind of an [`Object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Record,
    Sequence,
    Set,
    Map,
    Date,
    WeakSet,
    WeakMap,
    Opaque,
}

impl Kind {
    /// Kinds the engine wraps and tracks. Opaque payloads are returned as-is.
    pub fn is_container(self) -> bool {
        !matches!(self, Kind::Opaque)
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Record => "Object",
            Kind::Sequence => "Array",
            Kind::Set => "Set",
            Kind::Map => "Map",
            Kind::Date => "Date",
            Kind::WeakSet => "WeakSet",
            Kind::WeakMap => "WeakMap",
            Kind::Opaque => "Opaque",
        }
    }
}

/// Storage slot of a record property.
#[derive(Debug, Clone)]
pub enum Slot {
    Data { value: Value, writable: bool },
    Accessor { get: Option<Function>, set: Option<Function> },
}

#[derive(Debug, Clone)]
pub struct Property {
    pub slot: Slot,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Property {
    /// A writable, enumerable, configurable data property.
    pub fn data(value: Value) -> Self {
        Self {
            slot: Slot::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    fn from_descriptor(desc: &PropertyDescriptor) -> Self {
        let slot = if desc.is_accessor() {
            Slot::Accessor {
                get: desc.get.clone(),
                set: desc.set.clone(),
            }
        } else {
            Slot::Data {
                value: desc.value.clone().unwrap_or_default(),
                writable: desc.writable.unwrap_or(false),
            }
        };
        Self {
            slot,
            enumerable: desc.enumerable.unwrap_or(false),
            configurable: desc.configurable.unwrap_or(false),
        }
    }
}

/// Partial property description, as passed to `define_property` and
/// returned by `own_property_descriptor`.
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub get: Option<Function>,
    pub set: Option<Function>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// Fully-permissive data descriptor.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            writable: Some(true),
            enumerable: Some(true),
            configurable: Some(true),
            ..Self::default()
        }
    }

    pub fn accessor(get: Option<Function>, set: Option<Function>) -> Self {
        Self {
            get,
            set,
            enumerable: Some(true),
            configurable: Some(true),
            ..Self::default()
        }
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub(crate) fn of(property: &Property) -> Self {
        match &property.slot {
            Slot::Data { value, writable } => Self {
                value: Some(value.clone()),
                writable: Some(*writable),
                enumerable: Some(property.enumerable),
                configurable: Some(property.configurable),
                ..Self::default()
            },
            Slot::Accessor { get, set } => Self {
                get: get.clone(),
                set: set.clone(),
                enumerable: Some(property.enumerable),
                configurable: Some(property.configurable),
                ..Self::default()
            },
        }
    }
}

/// Keyed properties with attributes, in insertion order.
#[derive(Debug, Clone)]
pub struct Record {
    props: IndexMap<Key, Property>,
    extensible: bool,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    pub fn new() -> Self {
        Self {
            props: IndexMap::new(),
            extensible: true,
        }
    }

    pub fn insert(&mut self, key: impl Into<Key>, value: Value) {
        self.props.insert(key.into(), Property::data(value));
    }

    pub fn get(&self, key: &Key) -> Option<&Property> {
        self.props.get(key)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Property)> {
        self.props.iter()
    }

    /// Makes every property read-only and non-configurable and forbids new
    /// properties.
    pub fn freeze(&mut self) {
        self.extensible = false;
        for property in self.props.values_mut() {
            property.configurable = false;
            if let Slot::Data { writable, .. } = &mut property.slot {
                *writable = false;
            }
        }
    }
}

/// Entries of a weak collection, keyed by object identity.
#[derive(Debug, Clone)]
pub struct WeakTable<V> {
    entries: HashMap<usize, (WeakObject, V)>,
}

impl<V> Default for WeakTable<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V: Clone> WeakTable<V> {
    pub fn get(&self, key: &Object) -> Option<&V> {
        self.entries
            .get(&key.id())
            .filter(|(weak, _)| weak.is_alive())
            .map(|(_, value)| value)
    }

    pub fn contains(&self, key: &Object) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: &Object, value: V) {
        self.entries.retain(|_, (weak, _)| weak.is_alive());
        self.entries.insert(key.id(), (key.downgrade(), value));
    }

    pub fn remove(&mut self, key: &Object) -> bool {
        self.entries.remove(&key.id()).is_some_and(|(weak, _)| weak.is_alive())
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|(weak, _)| weak.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payload of an [`Object`].
#[derive(Debug, Clone)]
pub enum Composite {
    Record(Record),
    Sequence(Vec<Value>),
    Set(IndexSet<Value>),
    Map(IndexMap<Value, Value>),
    /// Milliseconds since the Unix epoch. NaN is an invalid date.
    Date(f64),
    WeakSet(WeakTable<()>),
    WeakMap(WeakTable<Value>),
    Opaque(Rc<dyn Any>),
}

impl Composite {
    pub fn kind(&self) -> Kind {
        match self {
            Composite::Record(_) => Kind::Record,
            Composite::Sequence(_) => Kind::Sequence,
            Composite::Set(_) => Kind::Set,
            Composite::Map(_) => Kind::Map,
            Composite::Date(_) => Kind::Date,
            Composite::WeakSet(_) => Kind::WeakSet,
            Composite::WeakMap(_) => Kind::WeakMap,
            Composite::Opaque(_) => Kind::Opaque,
        }
    }

    /// One-level comparison: children compare by identity.
    pub fn shallow_eq(&self, other: &Composite) -> bool {
        match (self, other) {
            (Composite::Record(a), Composite::Record(b)) => {
                a.props.len() == b.props.len()
                    && a.props.iter().all(|(key, pa)| {
                        b.props.get(key).is_some_and(|pb| match (&pa.slot, &pb.slot) {
                            (Slot::Data { value: va, .. }, Slot::Data { value: vb, .. }) => {
                                Value::is(va, vb)
                            }
                            (
                                Slot::Accessor { get: ga, set: sa },
                                Slot::Accessor { get: gb, set: sb },
                            ) => same_function(ga, gb) && same_function(sa, sb),
                            _ => false,
                        })
                    })
            }
            (Composite::Sequence(a), Composite::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Value::is(x, y))
            }
            (Composite::Set(a), Composite::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (Composite::Map(a), Composite::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, va)| b.get(key).is_some_and(|vb| Value::is(va, vb)))
            }
            (Composite::Date(a), Composite::Date(b)) => {
                Value::is(&Value::Number(*a), &Value::Number(*b))
            }
            (Composite::WeakSet(a), Composite::WeakSet(b)) => a.len() == b.len(),
            (Composite::WeakMap(a), Composite::WeakMap(b)) => a.len() == b.len(),
            (Composite::Opaque(a), Composite::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

pub(crate) fn same_function(a: &Option<Function>, b: &Option<Function>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

/// A shared, mutable container with pointer identity.
#[derive(Clone)]
pub struct Object(Rc<RefCell<Composite>>);

/// Non-owning handle to an [`Object`].
#[derive(Debug, Clone)]
pub struct WeakObject(Weak<RefCell<Composite>>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Object {
    pub fn new(composite: Composite) -> Self {
        Self(Rc::new(RefCell::new(composite)))
    }

    pub fn kind(&self) -> Kind {
        self.0.borrow().kind()
    }

    /// Address-based identity, stable for the lifetime of the object.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    pub fn borrow(&self) -> Ref<'_, Composite> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Composite> {
        self.0.borrow_mut()
    }

    pub(crate) fn try_borrow(&self) -> Result<Ref<'_, Composite>, BorrowError> {
        self.0.try_borrow()
    }

    /// Freezes a record. Other kinds are left untouched.
    pub fn freeze(&self) {
        if let Composite::Record(record) = &mut *self.0.borrow_mut() {
            record.freeze();
        }
    }

    /// Element count: properties, items, members or entries.
    pub fn len(&self) -> usize {
        match &*self.0.borrow() {
            Composite::Record(record) => record.len(),
            Composite::Sequence(items) => items.len(),
            Composite::Set(set) => set.len(),
            Composite::Map(map) => map.len(),
            Composite::WeakSet(table) => table.len(),
            Composite::WeakMap(table) => table.len(),
            Composite::Date(_) | Composite::Opaque(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads `key`, running a getter with `receiver` as `this`.
    pub(crate) fn get(&self, key: &Key, receiver: &Value) -> Value {
        let getter = {
            let composite = self.0.borrow();
            match &*composite {
                Composite::Record(record) => match record.props.get(key).map(|p| &p.slot) {
                    Some(Slot::Data { value, .. }) => return value.clone(),
                    Some(Slot::Accessor { get: Some(get), .. }) => get.clone(),
                    _ => return Value::Undefined,
                },
                Composite::Sequence(items) => {
                    if key == "length" {
                        return Value::from(items.len());
                    }
                    return key
                        .as_index()
                        .and_then(|index| items.get(index).cloned())
                        .unwrap_or_default();
                }
                Composite::Set(set) if key == "size" => return Value::from(set.len()),
                Composite::Map(map) if key == "size" => return Value::from(map.len()),
                _ => return Value::Undefined,
            }
        };
        match getter.call(receiver, &[]) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "getter failed; reading as undefined");
                Value::Undefined
            }
        }
    }

    /// Data value of `key` without running accessors.
    pub(crate) fn peek(&self, key: &Key) -> Value {
        match &*self.0.borrow() {
            Composite::Record(record) => match record.props.get(key).map(|p| &p.slot) {
                Some(Slot::Data { value, .. }) => value.clone(),
                _ => Value::Undefined,
            },
            Composite::Sequence(items) => key
                .as_index()
                .and_then(|index| items.get(index).cloned())
                .unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Writes `key`, running a setter with `receiver` as `this`. Returns
    /// `false` when the write is refused.
    pub(crate) fn set(&self, key: &Key, value: Value, receiver: &Value) -> bool {
        let setter = {
            let mut composite = self.0.borrow_mut();
            match &mut *composite {
                Composite::Record(record) => match record.props.get_mut(key) {
                    Some(Property {
                        slot: Slot::Data { value: slot, writable },
                        ..
                    }) => {
                        if !*writable {
                            return false;
                        }
                        *slot = value;
                        return true;
                    }
                    Some(Property {
                        slot: Slot::Accessor { set, .. },
                        ..
                    }) => match set {
                        Some(set) => set.clone(),
                        None => return false,
                    },
                    None => {
                        if !record.extensible {
                            return false;
                        }
                        record.props.insert(key.clone(), Property::data(value));
                        return true;
                    }
                },
                Composite::Sequence(items) => return write_item(items, key, value),
                _ => return false,
            }
        };
        match setter.call(receiver, &[value]) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "setter failed");
                false
            }
        }
    }

    /// Overwrites or inserts a data value regardless of attributes.
    pub(crate) fn force_set(&self, key: &Key, value: Value) {
        match &mut *self.0.borrow_mut() {
            Composite::Record(record) => match record.props.get_mut(key) {
                Some(Property {
                    slot: Slot::Data { value: slot, .. },
                    ..
                }) => *slot = value,
                _ => {
                    record.props.insert(key.clone(), Property::data(value));
                }
            },
            Composite::Sequence(items) => {
                write_item(items, key, value);
            }
            _ => {}
        }
    }

    pub(crate) fn force_delete(&self, key: &Key) {
        match &mut *self.0.borrow_mut() {
            Composite::Record(record) => {
                record.props.shift_remove(key);
            }
            Composite::Sequence(items) => {
                if let Some(item) = key.as_index().and_then(|index| items.get_mut(index)) {
                    *item = Value::Undefined;
                }
            }
            _ => {}
        }
    }

    /// Removes `key`. Deleting an absent key succeeds; deleting a
    /// non-configurable one fails.
    pub(crate) fn delete(&self, key: &Key) -> bool {
        match &mut *self.0.borrow_mut() {
            Composite::Record(record) => match record.props.get(key) {
                None => true,
                Some(property) if property.configurable => {
                    record.props.shift_remove(key);
                    true
                }
                Some(_) => false,
            },
            Composite::Sequence(items) => {
                if key == "length" {
                    return false;
                }
                if let Some(item) = key.as_index().and_then(|index| items.get_mut(index)) {
                    *item = Value::Undefined;
                }
                true
            }
            Composite::Set(_) | Composite::Map(_) => key != "size",
            _ => true,
        }
    }

    pub(crate) fn has(&self, key: &Key) -> bool {
        match &*self.0.borrow() {
            Composite::Record(record) => record.props.contains_key(key),
            Composite::Sequence(items) => {
                key == "length" || key.as_index().is_some_and(|index| index < items.len())
            }
            Composite::Set(_) | Composite::Map(_) => key == "size",
            _ => false,
        }
    }

    pub(crate) fn own_property(&self, key: &Key) -> Option<PropertyDescriptor> {
        match &*self.0.borrow() {
            Composite::Record(record) => record.props.get(key).map(PropertyDescriptor::of),
            Composite::Sequence(items) => {
                if key == "length" {
                    return Some(PropertyDescriptor {
                        value: Some(Value::from(items.len())),
                        writable: Some(true),
                        enumerable: Some(false),
                        configurable: Some(false),
                        ..PropertyDescriptor::default()
                    });
                }
                let index = key.as_index()?;
                items.get(index).map(|item| PropertyDescriptor::data(item.clone()))
            }
            _ => None,
        }
    }

    /// Creates or reconfigures `key`. Returns `false` when the change is
    /// not allowed by the existing attributes.
    pub(crate) fn define_own_property(&self, key: &Key, desc: &PropertyDescriptor) -> bool {
        let mut composite = self.0.borrow_mut();
        match &mut *composite {
            Composite::Record(record) => {
                let Some(existing) = record.props.get_mut(key) else {
                    if !record.extensible {
                        return false;
                    }
                    record.props.insert(key.clone(), Property::from_descriptor(desc));
                    return true;
                };
                if !existing.configurable && !compatible(existing, desc) {
                    return false;
                }
                if desc.is_accessor() {
                    let (old_get, old_set) = match &existing.slot {
                        Slot::Accessor { get, set } => (get.clone(), set.clone()),
                        Slot::Data { .. } => (None, None),
                    };
                    existing.slot = Slot::Accessor {
                        get: desc.get.clone().or(old_get),
                        set: desc.set.clone().or(old_set),
                    };
                } else if desc.value.is_some() || desc.writable.is_some() {
                    existing.slot = match &existing.slot {
                        Slot::Data { value, writable } => Slot::Data {
                            value: desc.value.clone().unwrap_or_else(|| value.clone()),
                            writable: desc.writable.unwrap_or(*writable),
                        },
                        Slot::Accessor { .. } => Slot::Data {
                            value: desc.value.clone().unwrap_or_default(),
                            writable: desc.writable.unwrap_or(false),
                        },
                    };
                }
                if let Some(enumerable) = desc.enumerable {
                    existing.enumerable = enumerable;
                }
                if let Some(configurable) = desc.configurable {
                    existing.configurable = configurable;
                }
                true
            }
            Composite::Sequence(items) => {
                if desc.is_accessor() {
                    return false;
                }
                match &desc.value {
                    Some(value) => write_item(items, key, value.clone()),
                    None => key == "length" || key.as_index().is_some(),
                }
            }
            _ => false,
        }
    }

    /// Enumerable own keys, in order.
    pub(crate) fn keys(&self) -> Vec<Key> {
        match &*self.0.borrow() {
            Composite::Record(record) => record
                .props
                .iter()
                .filter(|(_, property)| property.enumerable)
                .map(|(key, _)| key.clone())
                .collect(),
            Composite::Sequence(items) => (0..items.len()).map(Key::index).collect(),
            _ => Vec::new(),
        }
    }

    /// New object holding a one-level copy of this one.
    pub(crate) fn shallow_copy(&self) -> Object {
        Object::new(self.0.borrow().clone())
    }

    /// Replaces the payload with `snapshot`.
    pub(crate) fn restore(&self, snapshot: &Composite) {
        *self.0.borrow_mut() = snapshot.clone();
    }

    /// Whether writing `value` at `key` is a length a sequence cannot take.
    pub(crate) fn is_bad_length(&self, key: &Key, value: &Value) -> bool {
        if !matches!(&*self.0.borrow(), Composite::Sequence(_)) {
            return false;
        }
        if key == "length" {
            return value.as_number().and_then(dense_length).is_none();
        }
        key.as_index().is_some_and(|index| index >= MAX_SEQUENCE_LEN)
    }
}

/// Non-configurable properties only accept descriptors that leave them
/// observably unchanged.
fn compatible(existing: &Property, desc: &PropertyDescriptor) -> bool {
    if desc.configurable == Some(true) {
        return false;
    }
    if desc.enumerable.is_some_and(|enumerable| enumerable != existing.enumerable) {
        return false;
    }
    match &existing.slot {
        Slot::Data { value, writable } => {
            if desc.is_accessor() {
                return false;
            }
            if !*writable {
                if desc.writable == Some(true) {
                    return false;
                }
                if let Some(new_value) = &desc.value {
                    if !Value::is(new_value, value) {
                        return false;
                    }
                }
            }
            true
        }
        Slot::Accessor { get, set } => {
            if desc.value.is_some() || desc.writable.is_some() {
                return false;
            }
            (desc.get.is_none() || same_function(&desc.get, get))
                && (desc.set.is_none() || same_function(&desc.set, set))
        }
    }
}

/// Sequences are dense, so they refuse to grow past this many items.
const MAX_SEQUENCE_LEN: usize = 1 << 24;

fn write_item(items: &mut Vec<Value>, key: &Key, value: Value) -> bool {
    if key == "length" {
        return match value.as_number().and_then(dense_length) {
            Some(len) => {
                items.resize(len, Value::Undefined);
                true
            }
            None => false,
        };
    }
    let Some(index) = key.as_index().filter(|index| *index < MAX_SEQUENCE_LEN) else {
        return false;
    };
    if index >= items.len() {
        items.resize(index + 1, Value::Undefined);
    }
    items[index] = value;
    true
}

/// Accepts non-negative integral lengths below 2^32.
pub(crate) fn valid_length(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0 && n < 4_294_967_296.0).then_some(n as usize)
}

fn dense_length(n: f64) -> Option<usize> {
    valid_length(n).filter(|len| *len <= MAX_SEQUENCE_LEN)
}
