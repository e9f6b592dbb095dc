//! Dynamic value model.
//!
//! [`Value`] is the uniform currency of the engine: primitives, native
//! functions, shared containers ([`Object`]) and observation wrappers
//! ([`Observed`]). Every property-level operation dispatches on the variant,
//! so a wrapper can stand in anywhere a container is accepted.

mod function;
mod json;
mod object;

pub use function::Function;
pub use json::deep_equal;
pub use object::{
    Composite, Kind, Object, Property, PropertyDescriptor, Record, Slot, WeakObject, WeakTable,
};

pub(crate) use object::valid_length;

use std::hash::{Hash, Hasher};
use std::rc::Rc;

use deep_observe_path::{Key, Path, Symbol};
use indexmap::{IndexMap, IndexSet};

use crate::builtins;
use crate::error::ObserveError;
use crate::iter::ValueIter;
use crate::observed::Observed;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Symbol),
    Function(Function),
    Object(Object),
    Observed(Observed),
    Iterator(ValueIter),
}

// ── Construction ────────────────────────────────────────────────────────

impl Value {
    pub fn new_record<K: Into<Key>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        let mut record = Record::new();
        for (key, value) in entries {
            record.insert(key, value);
        }
        Value::Object(Object::new(Composite::Record(record)))
    }

    pub fn new_sequence(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Object(Object::new(Composite::Sequence(items.into_iter().collect())))
    }

    pub fn new_set(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Object(Object::new(Composite::Set(items.into_iter().collect())))
    }

    pub fn new_map(entries: impl IntoIterator<Item = (Value, Value)>) -> Value {
        let map: IndexMap<Value, Value> = entries.into_iter().collect();
        Value::Object(Object::new(Composite::Map(map)))
    }

    /// A date at `millis` since the Unix epoch.
    pub fn new_date(millis: f64) -> Value {
        Value::Object(Object::new(Composite::Date(millis)))
    }

    pub fn new_weak_set() -> Value {
        Value::Object(Object::new(Composite::WeakSet(WeakTable::default())))
    }

    pub fn new_weak_map() -> Value {
        Value::Object(Object::new(Composite::WeakMap(WeakTable::default())))
    }

    /// An object the engine never wraps or tracks.
    pub fn new_opaque<T: 'static>(payload: T) -> Value {
        Value::Object(Object::new(Composite::Opaque(Rc::new(payload))))
    }

    pub fn function<F>(name: impl Into<String>, body: F) -> Value
    where
        F: Fn(&Value, &[Value]) -> Result<Value, ObserveError> + 'static,
    {
        Value::Function(Function::new(name, body))
    }
}

// ── Inspection ──────────────────────────────────────────────────────────

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The object held directly by this value, not looking through wrappers.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// A handle to the iterator, sharing its cursor.
    pub fn as_iter(&self) -> Option<ValueIter> {
        match self {
            Value::Iterator(iter) => Some(iter.clone()),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    /// The innermost object, looking through any number of wrappers.
    pub fn underlying(&self) -> Option<Object> {
        match self {
            Value::Object(object) => Some(object.clone()),
            Value::Observed(observed) => observed.target().underlying(),
            _ => None,
        }
    }

    /// Container kind of the innermost object.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Object(object) => Some(object.kind()),
            Value::Observed(observed) => observed.target().kind(),
            _ => None,
        }
    }

    pub fn is_observed(&self) -> bool {
        matches!(self, Value::Observed(_))
    }

    /// Identity of reference values: objects, wrappers, functions and
    /// iterators.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(object) => Some(object.id()),
            Value::Observed(observed) => Some(observed.id()),
            Value::Function(function) => Some(function.id()),
            Value::Iterator(iter) => Some(iter.id()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Function(_) => "function",
            Value::Iterator(_) => "iterator",
            Value::Object(_) | Value::Observed(_) => self.kind().map_or("object", Kind::name),
        }
    }
}

// ── Property operations ─────────────────────────────────────────────────

impl Value {
    /// Reads a property. Through a wrapper, container results come back
    /// wrapped.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        self.get_key(&key.into())
    }

    /// Writes a property.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), ObserveError> {
        self.set_key(key.into(), value.into())
    }

    pub fn delete(&self, key: impl Into<Key>) -> Result<(), ObserveError> {
        self.delete_key(&key.into())
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.has_key(&key.into())
    }

    pub fn define_property(
        &self,
        key: impl Into<Key>,
        descriptor: PropertyDescriptor,
    ) -> Result<(), ObserveError> {
        let key = key.into();
        match self {
            Value::Object(object) => {
                if object.define_own_property(&key, &descriptor) {
                    Ok(())
                } else {
                    Err(ObserveError::Redefine {
                        key: key.to_string(),
                    })
                }
            }
            Value::Observed(observed) => observed.define_property(key, descriptor),
            _ => Err(ObserveError::NotAnObject {
                operation: "define a property",
            }),
        }
    }

    pub fn own_property_descriptor(&self, key: impl Into<Key>) -> Option<PropertyDescriptor> {
        let key = key.into();
        match self {
            Value::Object(object) => object.own_property(&key),
            Value::Observed(observed) => observed.target().own_property_descriptor(key),
            _ => None,
        }
    }

    /// Enumerable own keys of a record, or the indices of a sequence.
    pub fn keys(&self) -> Vec<Key> {
        self.underlying().map(|object| object.keys()).unwrap_or_default()
    }

    /// `length` of a sequence or string, `size` of a set or map, otherwise 0.
    pub fn len(&self) -> usize {
        let size = match self.kind() {
            Some(Kind::Set | Kind::Map) => self.get("size"),
            _ => self.get("length"),
        };
        size.as_number().and_then(valid_length).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `method` with `self` as receiver. Built-in container methods
    /// and function-valued record properties are both callable.
    pub fn invoke(
        &self,
        method: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<Value, ObserveError> {
        let args: Vec<Value> = args.into_iter().collect();
        self.invoke_with(method, &args)
    }

    pub(crate) fn get_key(&self, key: &Key) -> Value {
        match self {
            Value::Object(object) => object.get(key, self),
            Value::Observed(observed) => observed.get(key),
            Value::String(s) if key == "length" => Value::from(s.encode_utf16().count()),
            _ => Value::Undefined,
        }
    }

    pub(crate) fn set_key(&self, key: Key, value: Value) -> Result<(), ObserveError> {
        match self {
            Value::Object(object) => {
                if object.is_bad_length(&key, &value) {
                    Err(ObserveError::InvalidLength)
                } else if object.set(&key, value, self) {
                    Ok(())
                } else {
                    Err(ObserveError::ReadOnly {
                        key: key.to_string(),
                    })
                }
            }
            Value::Observed(observed) => observed.set(key, value),
            _ => Err(ObserveError::NotAnObject {
                operation: "set a property",
            }),
        }
    }

    /// Fails when `value` at `key` is a length the innermost sequence
    /// cannot take.
    pub(crate) fn check_length(&self, key: &Key, value: &Value) -> Result<(), ObserveError> {
        match self.underlying() {
            Some(object) if object.is_bad_length(key, value) => Err(ObserveError::InvalidLength),
            _ => Ok(()),
        }
    }

    /// Raw write that runs setters against `receiver`.
    pub(crate) fn set_with_receiver(&self, key: &Key, value: Value, receiver: &Value) -> bool {
        match self {
            Value::Object(object) => object.set(key, value, receiver),
            Value::Observed(observed) => observed.set(key.clone(), value).is_ok(),
            _ => false,
        }
    }

    pub(crate) fn delete_key(&self, key: &Key) -> Result<(), ObserveError> {
        match self {
            Value::Object(object) => {
                if object.delete(key) {
                    Ok(())
                } else {
                    Err(ObserveError::NotConfigurable {
                        key: key.to_string(),
                    })
                }
            }
            Value::Observed(observed) => observed.delete(key),
            _ => Err(ObserveError::NotAnObject {
                operation: "delete a property",
            }),
        }
    }

    pub(crate) fn has_key(&self, key: &Key) -> bool {
        match self {
            Value::Object(object) => object.has(key),
            Value::Observed(observed) => observed.target().has_key(key),
            _ => false,
        }
    }

    pub(crate) fn invoke_with(&self, method: &str, args: &[Value]) -> Result<Value, ObserveError> {
        match self {
            Value::Observed(observed) => observed.invoke(method, args),
            Value::Object(_) => builtins::call(self, self, method, args),
            _ => Err(ObserveError::NotCallable {
                method: method.to_string(),
            }),
        }
    }
}

/// Follows `path` from `root` with raw reads. Set members and map entries
/// are addressed by the property-key text of their key.
pub(crate) fn resolve_path(root: &Value, path: &Path) -> Value {
    let mut current = root.clone();
    for key in path.keys() {
        current = step(&current, &key);
        if current.is_undefined() {
            break;
        }
    }
    current
}

fn step(value: &Value, key: &Key) -> Value {
    let Some(object) = value.underlying() else {
        return Value::Undefined;
    };
    let found = match &*object.borrow() {
        Composite::Set(set) => Some(
            set.iter()
                .find(|item| &item.to_property_key() == key)
                .cloned()
                .unwrap_or_default(),
        ),
        Composite::Map(map) => Some(
            map.iter()
                .find(|(k, _)| &k.to_property_key() == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
        ),
        _ => None,
    };
    match found {
        Some(found) => found,
        None => object.get(key, &Value::Object(object.clone())),
    }
}

// ── Conversions ─────────────────────────────────────────────────────────

impl Value {
    /// Property key form: strings and symbols as-is, everything else by its
    /// string form.
    pub fn to_property_key(&self) -> Key {
        match self {
            Value::String(s) => Key::Str(s.to_string()),
            Value::Symbol(symbol) => Key::Symbol(symbol.clone()),
            other => Key::Str(other.display_string()),
        }
    }

    /// String conversion used by `join`, `toString` and the default sort.
    pub fn display_string(&self) -> String {
        display(self, 0)
    }

    pub(crate) fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Null => 0.0,
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Observed(_) | Value::Object(_) => match self.underlying().map(|o| o.kind()) {
                Some(Kind::Date) => builtins::date::time_of(self),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }
}

const MAX_DISPLAY_DEPTH: usize = 32;

fn display(value: &Value, depth: usize) -> String {
    match value {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::String(s) => s.to_string(),
        Value::Symbol(symbol) => symbol.to_string(),
        Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
        Value::Iterator(_) => "[object Iterator]".into(),
        Value::Object(_) | Value::Observed(_) => {
            let Some(object) = value.underlying() else {
                return String::new();
            };
            let kind = object.kind();
            match kind {
                Kind::Sequence => {
                    if depth >= MAX_DISPLAY_DEPTH {
                        return String::new();
                    }
                    let items = match &*object.borrow() {
                        Composite::Sequence(items) => items.clone(),
                        _ => Vec::new(),
                    };
                    items
                        .iter()
                        .map(|item| match item {
                            Value::Undefined | Value::Null => String::new(),
                            item => display(item, depth + 1),
                        })
                        .collect::<Vec<_>>()
                        .join(",")
                }
                Kind::Date => builtins::date::iso_string(builtins::date::time_of(value))
                    .unwrap_or_else(|| "Invalid Date".into()),
                kind => format!("[object {}]", kind.name()),
            }
        }
    }
}

/// Number formatting with integral values printed without a fraction.
pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).into()
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

macro_rules! from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(symbol: Symbol) -> Self {
        Value::Symbol(symbol)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Value::Observed(observed)
    }
}

impl From<ValueIter> for Value {
    fn from(iter: ValueIter) -> Self {
        Value::Iterator(iter)
    }
}

impl From<&Key> for Value {
    fn from(key: &Key) -> Self {
        match key {
            Key::Str(s) => Value::from(s.as_str()),
            Key::Symbol(symbol) => Value::Symbol(symbol.clone()),
        }
    }
}

impl From<IndexSet<Value>> for Value {
    fn from(set: IndexSet<Value>) -> Self {
        Value::Object(Object::new(Composite::Set(set)))
    }
}

// ── Equality ────────────────────────────────────────────────────────────

impl Value {
    /// Same-value comparison: NaN equals NaN, +0 and -0 differ, reference
    /// values compare by identity.
    pub fn is(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                if x.is_nan() && y.is_nan() {
                    true
                } else if *x == 0.0 && *y == 0.0 {
                    x.is_sign_negative() == y.is_sign_negative()
                } else {
                    x == y
                }
            }
            _ => a == b,
        }
    }

    /// Strict equality: NaN differs from itself, +0 equals -0.
    pub fn strict_equals(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x == y,
            _ => a == b,
        }
    }
}

/// Same-value-zero: the equality used for set members and map keys.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Function(_), Value::Function(_))
            | (Value::Object(_), Value::Object(_))
            | (Value::Observed(_), Value::Observed(_))
            | (Value::Iterator(_), Value::Iterator(_)) => self.identity() == other.identity(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                let canonical = if n.is_nan() {
                    f64::NAN
                } else if *n == 0.0 {
                    0.0
                } else {
                    *n
                };
                canonical.to_bits().hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::Symbol(symbol) => symbol.hash(state),
            _ => self.identity().hash(state),
        }
    }
}
