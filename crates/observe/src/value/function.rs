use std::fmt;
use std::rc::Rc;

use crate::error::ObserveError;
use crate::value::Value;

type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, ObserveError>;

/// A named native callable.
///
/// Stored on a record, a function acts as a method: invoking it through a
/// wrapper passes the wrapper as `this`, so writes made by the method are
/// observed.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    body: Rc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, ObserveError> + 'static,
    {
        Self {
            name: Rc::from(name.into()),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, ObserveError> {
        (self.body)(this, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        self.id() == other.id()
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.body) as *const () as usize
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}
