//! Scripted replay of mutations against an observed JSON document.
//!
//! Core logic of the `observe-replay` binary: a [`Script`] holds an initial
//! state, options and a list of operations. Running it wraps the state,
//! applies each operation through the wrapper and collects every change
//! notification in order.

use std::cell::RefCell;
use std::rc::Rc;

use deep_observe_path::{Key, Path};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ObserveError;
use crate::options::{ObserveConfig, Options};
use crate::value::Value;
use crate::{unsubscribe, wrap, Change};

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("invalid script: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state must be an object or an array")]
    NotAContainer,
}

// ── Script ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub state: serde_json::Value,
    #[serde(default)]
    pub options: ObserveConfig,
    #[serde(default)]
    pub ops: Vec<Op>,
    /// Dotted paths whose changes the validator rejects.
    #[serde(default)]
    pub reject: Vec<String>,
}

/// One step of a script. Paths are dotted and relative to the root; `""`
/// names the root itself.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Op {
    Set {
        path: String,
        value: serde_json::Value,
    },
    Delete {
        path: String,
    },
    Call {
        #[serde(default)]
        path: String,
        method: String,
        #[serde(default)]
        args: Vec<serde_json::Value>,
    },
    Unsubscribe,
}

// ── Output ──────────────────────────────────────────────────────────────

/// A change notification in JSON form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    /// A string, or an array of segments when `path_as_array` is on.
    pub path: serde_json::Value,
    pub value: serde_json::Value,
    pub previous: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ChangeRecord {
    fn of(change: &Change) -> Self {
        let path = match &change.path {
            Path::Text(text) => serde_json::Value::String(text.clone()),
            Path::Segments(keys) => keys
                .iter()
                .map(|key| serde_json::Value::String(key.to_segment()))
                .collect(),
        };
        Self {
            path,
            value: change.value.to_json(),
            previous: change.previous.to_json(),
            method: change.apply.as_ref().map(|apply| apply.name.clone()),
        }
    }
}

/// An operation that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub op: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub changes: Vec<ChangeRecord>,
    pub state: serde_json::Value,
    pub failures: Vec<Failure>,
}

// ── Replay ──────────────────────────────────────────────────────────────

/// Parses and runs a JSON script.
pub fn run_str(script: &str) -> Result<Outcome, ReplayError> {
    let script: Script = serde_json::from_str(script)?;
    run(script)
}

pub fn run(script: Script) -> Result<Outcome, ReplayError> {
    if !(script.state.is_object() || script.state.is_array()) {
        return Err(ReplayError::NotAContainer);
    }
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);

    let mut options = Options::from(script.options);
    if !script.reject.is_empty() {
        let reject = script.reject;
        options = options.on_validate(move |_, change| {
            !reject.iter().any(|path| change.path == path.as_str())
        });
    }

    let mut root = wrap(
        Value::from_json(&script.state),
        move |_, change| sink.borrow_mut().push(ChangeRecord::of(change)),
        options,
    );

    let mut failures = Vec::new();
    for (index, op) in script.ops.into_iter().enumerate() {
        tracing::debug!(index, ?op, "applying");
        if let Err(err) = apply(&mut root, op) {
            tracing::debug!(index, error = %err, "operation failed");
            failures.push(Failure {
                op: index,
                error: err.to_string(),
            });
        }
    }

    let state = root.to_json();
    let changes = changes.borrow().clone();
    Ok(Outcome {
        changes,
        state,
        failures,
    })
}

fn apply(root: &mut Value, op: Op) -> Result<(), ObserveError> {
    match op {
        Op::Set { path, value } => {
            let (parent, key) = split(root, &path)?;
            parent.set(key, Value::from_json(&value))
        }
        Op::Delete { path } => {
            let (parent, key) = split(root, &path)?;
            parent.delete(key)
        }
        Op::Call { path, method, args } => {
            let target = resolve(root, &Path::text(path));
            target
                .invoke(&method, args.iter().map(Value::from_json))
                .map(|_| ())
        }
        Op::Unsubscribe => {
            *root = unsubscribe(root);
            Ok(())
        }
    }
}

fn resolve(root: &Value, path: &Path) -> Value {
    path.keys()
        .iter()
        .fold(root.clone(), |current, key| current.get(key))
}

/// The holder of the last segment of `path`, and that segment.
fn split(root: &Value, path: &str) -> Result<(Value, Key), ObserveError> {
    let path = Path::text(path);
    if path.is_root() {
        return Err(ObserveError::NotAnObject {
            operation: "write the root",
        });
    }
    Ok((resolve(root, &path.initial()), path.last()))
}
