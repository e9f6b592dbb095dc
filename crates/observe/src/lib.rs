//! Deep mutation observation for dynamic object graphs.
//!
//! [`wrap`] puts a root container behind an observation wrapper. Every
//! nested container read through it comes back wrapped too, so writes at
//! any depth are validated, committed and reported with their path, value
//! and previous value. Method calls on containers (`push`, `sort`,
//! `Map.set`, user methods stored on records, ...) are reported once per
//! call at the container's path, with a pre-call copy as `previous`.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use deep_observe::{wrap, Options, Value};
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&log);
//! let state = wrap(
//!     Value::new_record([("a", Value::new_record([("b", Value::from(1))]))]),
//!     move |_, change| sink.borrow_mut().push(change.path.to_string()),
//!     Options::default(),
//! );
//!
//! state.get("a").set("b", 2).unwrap();
//! state.get("a").set("b", 2).unwrap();
//! assert_eq!(*log.borrow(), vec!["a.b".to_string()]);
//! ```

mod builtins;
mod cache;
pub mod error;
pub mod iter;
mod observed;
pub mod options;
pub mod replay;
mod smart_clone;
pub mod value;

use std::rc::Rc;

pub use deep_observe_path::{Key, Path, PathError, Symbol};
pub use error::ObserveError;
pub use iter::ValueIter;
pub use observed::{ApplyData, Change, Observed};
pub use options::{Details, DetailsConfig, ObserveConfig, Options};
pub use value::{
    deep_equal, Composite, Function, Kind, Object, PropertyDescriptor, Value,
};

/// Observes `root`, calling `on_change` with the root wrapper and the
/// change after every committed mutation.
///
/// Values that cannot hold properties are returned unchanged. Wrapping an
/// already observed value creates an independent root on top of it; both
/// roots are notified of writes made through the outer one.
pub fn wrap<F>(root: Value, on_change: F, options: Options) -> Value
where
    F: Fn(&Value, &Change) + 'static,
{
    observed::observe(root, Rc::new(on_change), options)
}

/// The value behind a wrapper, or `value` itself when it is not wrapped.
pub fn unwrap(value: &Value) -> Value {
    match value {
        Value::Observed(observed) => observed.target().clone(),
        other => other.clone(),
    }
}

/// Ends observation of a root.
///
/// Called with a root wrapper, it permanently silences the root and returns
/// the raw value; later calls return the same raw value. Any other value is
/// returned unchanged, including non-root wrappers.
pub fn unsubscribe(value: &Value) -> Value {
    match value {
        Value::Observed(observed) => observed.unsubscribe(),
        other => other.clone(),
    }
}
