#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use deep_observe::{wrap, Change, Options, Value};

/// Notifications received by one observed root, in order.
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<Change>>>);

impl Log {
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Change {
        self.0.borrow()[index].clone()
    }

    pub fn last(&self) -> Change {
        self.0.borrow().last().cloned().expect("no change recorded")
    }

    pub fn paths(&self) -> Vec<String> {
        self.0.borrow().iter().map(|c| c.path.to_string()).collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

pub fn observe(root: Value, options: Options) -> (Value, Log) {
    let log = Log::default();
    let sink = Rc::clone(&log.0);
    let state = wrap(root, move |_, change| sink.borrow_mut().push(change.clone()), options);
    (state, log)
}

pub fn json(value: serde_json::Value) -> Value {
    Value::from_json(&value)
}
