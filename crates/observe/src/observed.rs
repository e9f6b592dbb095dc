//! Observation wrappers and the per-root context that drives them.
//!
//! An [`Observed`] value stands in for a container: reads come back
//! wrapped, writes are validated, committed and reported, and method calls
//! on containers are snapshotted so they produce one change for the whole
//! call.

use std::fmt;
use std::rc::{Rc, Weak};

use deep_observe_path::{Key, Path};

use crate::builtins;
use crate::cache::Cache;
use crate::error::ObserveError;
use crate::iter::wrap_iterator;
use crate::options::Options;
use crate::smart_clone::SmartClone;
use crate::value::{Kind, PropertyDescriptor, Value};

/// A reported mutation.
#[derive(Debug, Clone)]
pub struct Change {
    /// Location of the change, in the mode chosen by `path_as_array`. A
    /// write to a node that was removed from the tree reports the location
    /// the node last had.
    pub path: Path,
    pub value: Value,
    pub previous: Value,
    /// Set when the change was produced by a container method call.
    pub apply: Option<ApplyData>,
}

/// The method call behind a container-level change.
#[derive(Debug, Clone)]
pub struct ApplyData {
    pub name: String,
    pub args: Vec<Value>,
    pub result: Value,
}

pub(crate) type ChangeHandler = Rc<dyn Fn(&Value, &Change)>;

pub(crate) struct Context {
    root: Value,
    options: Options,
    cache: Cache,
    clones: SmartClone,
    on_change: ChangeHandler,
}

pub(crate) struct Node {
    target: Value,
    ctx: Rc<Context>,
}

/// A wrapper observing one container of an observed graph.
///
/// Obtained from [`wrap`](crate::wrap) or by reading through another
/// wrapper. Wrappers are memoized: the same container reached from the same
/// root always yields the same wrapper while it is alive.
#[derive(Clone)]
pub struct Observed(Rc<Node>);

pub(crate) fn observe(root: Value, on_change: ChangeHandler, options: Options) -> Value {
    if !is_wrappable(&root) {
        return root;
    }
    tracing::debug!(kind = root.type_name(), ?options, "observing root");
    let ctx = Rc::new(Context {
        cache: Cache::new(Rc::clone(&options.equals)),
        clones: SmartClone::new(options.on_validate.is_some()),
        root,
        options,
        on_change,
    });
    ctx.root_wrapper()
}

fn is_wrappable(value: &Value) -> bool {
    match value {
        Value::Object(object) => object.kind().is_container(),
        Value::Observed(_) => true,
        _ => false,
    }
}

impl Context {
    fn root_path(&self) -> Path {
        Path::root(self.options.path_as_array)
    }

    fn root_wrapper(self: &Rc<Self>) -> Value {
        self.cache.get_wrapper(self, &self.root, self.root_path())
    }

    fn owns(&self, observed: &Observed) -> bool {
        std::ptr::eq(Rc::as_ptr(&observed.0.ctx), self)
    }

    /// Strips a wrapper belonging to this root; anything else is kept.
    fn unwrap_own(&self, value: Value) -> Value {
        match value {
            Value::Observed(observed) if self.owns(&observed) => observed.0.target.clone(),
            other => other,
        }
    }

    fn ignores(&self, key: &Key) -> bool {
        self.cache.is_unsubscribed() || self.options.ignores(key)
    }

    fn is_detached(&self, target: &Value) -> bool {
        self.cache.is_detached(target, &self.root)
    }

    /// Recorded path of `target`, or the root path for a value this root has
    /// never placed.
    fn path_of(&self, target: &Value) -> Path {
        self.cache
            .get_path(target)
            .unwrap_or_else(|| self.root_path())
    }

    /// Wraps a value read from `target[key]` unless it must stay raw.
    pub(crate) fn prepare_value(
        self: &Rc<Self>,
        value: Value,
        target: &Value,
        key: &Key,
        base: Option<&Path>,
    ) -> Value {
        if !is_wrappable(&value)
            || key == "constructor"
            || self.options.is_shallow
            || self.ignores(key)
            || self.cache.is_get_invariant(target, key)
            || (self.options.ignore_detached && self.is_detached(target))
        {
            return value;
        }
        let base = base.cloned().unwrap_or_else(|| self.path_of(target));
        self.cache.get_wrapper(self, &value, base.concat(key))
    }

    fn validate(
        self: &Rc<Self>,
        path: &Path,
        value: &Value,
        previous: &Value,
        apply: Option<&ApplyData>,
    ) -> bool {
        let Some(validator) = self.options.on_validate.clone() else {
            return true;
        };
        if self.clones.covers(path) {
            return true;
        }
        let change = Change {
            path: path.clone(),
            value: value.clone(),
            previous: previous.clone(),
            apply: apply.cloned(),
        };
        let accepted = validator(&self.root_wrapper(), &change);
        if !accepted {
            tracing::debug!(path = %path, "validator rejected change");
        }
        accepted
    }

    fn emit(self: &Rc<Self>, change: Change) {
        tracing::trace!(path = %change.path, method = change.apply.as_ref().map(|a| a.name.as_str()), "change");
        let root = self.root_wrapper();
        (self.on_change)(&root, &change);
    }

    /// Reports a committed write to `target[key]`, or buffers it into the
    /// in-flight call that covers it.
    fn record_write(self: &Rc<Self>, target: &Value, key: &Key, value: Value, previous: Value) {
        if self.ignores(key) || (self.options.ignore_detached && self.is_detached(target)) {
            return;
        }
        let path = self.path_of(target).concat(key);
        if self.clones.covers(&path) {
            self.clones.update(&path, previous);
            return;
        }
        self.emit(Change {
            path,
            value,
            previous,
            apply: None,
        });
    }
}

impl Observed {
    pub(crate) fn new(ctx: Rc<Context>, target: Value) -> Self {
        Observed(Rc::new(Node { target, ctx }))
    }

    pub(crate) fn from_node(node: Rc<Node>) -> Self {
        Observed(node)
    }

    pub(crate) fn downgrade(&self) -> Weak<Node> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn belongs_to(&self, ctx: &Rc<Context>) -> bool {
        Rc::ptr_eq(&self.0.ctx, ctx)
    }

    /// The wrapped value: a raw container, or the wrapper of another root.
    pub fn target(&self) -> &Value {
        &self.0.target
    }

    /// Last recorded location, `None` once unsubscribed.
    pub fn path(&self) -> Option<Path> {
        self.0.ctx.cache.get_path(&self.0.target)
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.0.ctx.cache.is_unsubscribed()
    }

    pub fn ptr_eq(&self, other: &Observed) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn this(&self) -> Value {
        Value::Observed(self.clone())
    }

    pub(crate) fn get(&self, key: &Key) -> Value {
        let Node { target, ctx } = &*self.0;
        let value = match target {
            Value::Object(object) => object.get(key, &self.this()),
            other => other.get_key(key),
        };
        ctx.prepare_value(value, target, key, None)
    }

    pub(crate) fn set(&self, key: Key, value: Value) -> Result<(), ObserveError> {
        let Node { target, ctx } = &*self.0;
        let value = ctx.unwrap_own(value);
        if ctx.cache.is_unsubscribed() {
            return target.set_key(key, value);
        }
        let previous = target.get_key(&key);
        if (ctx.options.equals)(&previous, &value) && target.has_key(&key) {
            return Ok(());
        }
        target.check_length(&key, &value)?;
        let path = ctx.path_of(target).concat(&key);
        if !ctx.validate(&path, &value, &previous, None) {
            return Err(ObserveError::Rejected {
                path: path.to_string(),
            });
        }
        if !ctx
            .cache
            .set_property(target, &key, value.clone(), &self.this(), &previous)
        {
            return Err(ObserveError::ReadOnly {
                key: key.to_string(),
            });
        }
        ctx.record_write(target, &key, value, previous);
        Ok(())
    }

    pub(crate) fn delete(&self, key: &Key) -> Result<(), ObserveError> {
        let Node { target, ctx } = &*self.0;
        if ctx.cache.is_unsubscribed() {
            return target.delete_key(key);
        }
        if !target.has_key(key) {
            return Ok(());
        }
        let previous = target.get_key(key);
        let path = ctx.path_of(target).concat(key);
        if !ctx.validate(&path, &Value::Undefined, &previous, None) {
            return Err(ObserveError::Rejected {
                path: path.to_string(),
            });
        }
        if !ctx.cache.delete_property(target, key) {
            return Err(ObserveError::NotConfigurable {
                key: key.to_string(),
            });
        }
        ctx.record_write(target, key, Value::Undefined, previous);
        Ok(())
    }

    pub(crate) fn define_property(
        &self,
        key: Key,
        mut descriptor: PropertyDescriptor,
    ) -> Result<(), ObserveError> {
        let Node { target, ctx } = &*self.0;
        descriptor.value = descriptor.value.map(|value| ctx.unwrap_own(value));
        if ctx.cache.is_unsubscribed() {
            return target.define_property(key, descriptor);
        }
        if ctx.cache.is_same_descriptor(&descriptor, target, &key) {
            return Ok(());
        }
        let previous = target.get_key(&key);
        let value = descriptor.value.clone().unwrap_or_default();
        let path = ctx.path_of(target).concat(&key);
        if !ctx.validate(&path, &value, &previous, None) {
            return Err(ObserveError::Rejected {
                path: path.to_string(),
            });
        }
        if !ctx.cache.define_property(target, &key, descriptor) {
            return Err(ObserveError::Redefine {
                key: key.to_string(),
            });
        }
        ctx.record_write(target, &key, value, previous);
        Ok(())
    }

    /// Calls `method` on the wrapped container.
    ///
    /// Tracked calls (handled built-ins and record methods) run inside a
    /// snapshot; when they change the container, one change is reported at
    /// the container's path with the pre-call copy as `previous`.
    pub(crate) fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, ObserveError> {
        let Node { target, ctx } = &*self.0;
        if ctx.cache.is_unsubscribed() {
            return target.invoke_with(method, args);
        }
        let Some(kind) = target.kind().filter(|kind| kind.is_container()) else {
            return target.invoke_with(method, args);
        };
        let this = self.this();
        let user_method = builtins::user_method(target, method).is_some();
        let handled = !user_method && builtins::is_handled(kind, method);

        if ctx.options.details.includes(method) && matches!(kind, Kind::Record | Kind::Sequence) {
            return builtins::call(target, &this, method, args);
        }
        if !user_method && !handled {
            return target.invoke_with(method, args);
        }

        let apply_path = ctx.path_of(target);
        let diff = if handled {
            builtins::mutation_diff(kind, method)
        } else {
            None
        };
        ctx.clones.start(target, apply_path.clone(), args, diff);
        let outcome = if handled {
            let raw_args: Vec<Value> = args.iter().map(|arg| ctx.unwrap_own(arg.clone())).collect();
            target.invoke_with(method, &raw_args)
        } else {
            builtins::call(target, &this, method, args)
        };
        let record = ctx.clones.stop();
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(method, error = %err, "observed call failed");
                return Err(err);
            }
        };

        let result = if handled && is_wrappable(&result) {
            let mut result_path = apply_path.clone();
            if kind == Kind::Map && method == "get" {
                if let Some(key) = args.first() {
                    result_path = result_path.concat(&key.to_property_key());
                }
            }
            ctx.cache.get_wrapper(ctx, &result, result_path)
        } else {
            result
        };

        if let Some(record) = record {
            if record.is_changed(target, &ctx.options.equals) {
                let previous = record.previous();
                if ctx.clones.covers(&apply_path) {
                    ctx.clones.absorb(&apply_path, target.clone(), record, previous);
                } else {
                    let apply = ApplyData {
                        name: method.to_string(),
                        args: args.to_vec(),
                        result: result.clone(),
                    };
                    if !ctx.validate(&apply_path, target, &previous, Some(&apply)) {
                        tracing::debug!(method, path = %apply_path, "rolling back rejected call");
                        record.undo(target);
                        return Err(ObserveError::Rejected {
                            path: apply_path.to_string(),
                        });
                    }
                    ctx.emit(Change {
                        path: apply_path.clone(),
                        value: target.clone(),
                        previous,
                        apply: Some(apply),
                    });
                }
            }
        }

        if matches!(kind, Kind::Set | Kind::Map) {
            if let Value::Iterator(iter) = result {
                return Ok(Value::Iterator(wrap_iterator(
                    ctx, iter, method, target, apply_path,
                )));
            }
        }
        Ok(result)
    }

    /// Ends observation when called on the root wrapper. Returns the raw
    /// root, or this wrapper unchanged when it is not the root.
    pub(crate) fn unsubscribe(&self) -> Value {
        let Node { target, ctx } = &*self.0;
        if !Value::is(target, &ctx.root) {
            return self.this();
        }
        if !ctx.cache.is_unsubscribed() {
            ctx.cache.unsubscribe();
            tracing::debug!("unsubscribed");
        }
        target.clone()
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("path", &self.path())
            .field("target", &self.0.target)
            .finish()
    }
}
