//! Per-root observation options and their serde-loadable form.

use std::fmt;
use std::rc::Rc;

use deep_observe_path::Key;
use serde::Deserialize;

use crate::observed::Change;
use crate::value::Value;

/// Equality used to suppress no-op writes and to diff dates.
pub type Equals = Rc<dyn Fn(&Value, &Value) -> bool>;

/// Veto hook: receives the root wrapper and the prospective change; `false`
/// rejects it.
pub type Validator = Rc<dyn Fn(&Value, &Change) -> bool>;

/// Which method calls report their writes one by one instead of as a
/// single container change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Details {
    #[default]
    Off,
    All,
    Methods(Vec<String>),
}

impl Details {
    pub fn includes(&self, method: &str) -> bool {
        match self {
            Details::Off => false,
            Details::All => true,
            Details::Methods(methods) => methods.iter().any(|m| m == method),
        }
    }
}

/// Options for [`wrap`](crate::wrap).
#[derive(Clone)]
pub struct Options {
    pub(crate) equals: Equals,
    pub(crate) is_shallow: bool,
    pub(crate) path_as_array: bool,
    pub(crate) ignore_symbols: bool,
    pub(crate) ignore_underscores: bool,
    pub(crate) ignore_keys: Option<Vec<Key>>,
    pub(crate) ignore_detached: bool,
    pub(crate) details: Details,
    pub(crate) on_validate: Option<Validator>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            equals: Rc::new(Value::is),
            is_shallow: false,
            path_as_array: false,
            ignore_symbols: false,
            ignore_underscores: false,
            ignore_keys: None,
            ignore_detached: false,
            details: Details::Off,
            on_validate: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the same-value default equality.
    pub fn equals(mut self, equals: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        self.equals = Rc::new(equals);
        self
    }

    /// Only direct properties of the root are observed.
    pub fn is_shallow(mut self, shallow: bool) -> Self {
        self.is_shallow = shallow;
        self
    }

    /// Report paths as key lists instead of dotted strings.
    pub fn path_as_array(mut self, as_array: bool) -> Self {
        self.path_as_array = as_array;
        self
    }

    pub fn ignore_symbols(mut self, ignore: bool) -> Self {
        self.ignore_symbols = ignore;
        self
    }

    /// Ignore keys starting with `_`.
    pub fn ignore_underscores(mut self, ignore: bool) -> Self {
        self.ignore_underscores = ignore;
        self
    }

    pub fn ignore_keys<K: Into<Key>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.ignore_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Stop reporting changes to nodes no longer reachable from the root.
    pub fn ignore_detached(mut self, ignore: bool) -> Self {
        self.ignore_detached = ignore;
        self
    }

    pub fn details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn on_validate(mut self, validator: impl Fn(&Value, &Change) -> bool + 'static) -> Self {
        self.on_validate = Some(Rc::new(validator));
        self
    }

    pub(crate) fn ignores(&self, key: &Key) -> bool {
        (self.ignore_symbols && key.is_symbol())
            || (self.ignore_underscores && key.starts_with('_'))
            || self
                .ignore_keys
                .as_ref()
                .is_some_and(|keys| keys.contains(key))
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("is_shallow", &self.is_shallow)
            .field("path_as_array", &self.path_as_array)
            .field("ignore_symbols", &self.ignore_symbols)
            .field("ignore_underscores", &self.ignore_underscores)
            .field("ignore_keys", &self.ignore_keys)
            .field("ignore_detached", &self.ignore_detached)
            .field("details", &self.details)
            .field("on_validate", &self.on_validate.is_some())
            .finish_non_exhaustive()
    }
}

/// `details` as written in a config file: a flag or a method list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DetailsConfig {
    Flag(bool),
    Methods(Vec<String>),
}

impl Default for DetailsConfig {
    fn default() -> Self {
        DetailsConfig::Flag(false)
    }
}

impl From<DetailsConfig> for Details {
    fn from(config: DetailsConfig) -> Self {
        match config {
            DetailsConfig::Flag(false) => Details::Off,
            DetailsConfig::Flag(true) => Details::All,
            DetailsConfig::Methods(methods) => Details::Methods(methods),
        }
    }
}

/// Data-only subset of [`Options`], loadable from JSON or TOML.
///
/// Field names accept both `snake_case` and the `camelCase` spelling.
/// Closures (`equals`, `on_validate`) can only be set in code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ObserveConfig {
    #[serde(alias = "isShallow")]
    pub is_shallow: bool,
    #[serde(alias = "pathAsArray")]
    pub path_as_array: bool,
    #[serde(alias = "ignoreSymbols")]
    pub ignore_symbols: bool,
    #[serde(alias = "ignoreUnderscores")]
    pub ignore_underscores: bool,
    #[serde(alias = "ignoreKeys")]
    pub ignore_keys: Option<Vec<String>>,
    #[serde(alias = "ignoreDetached")]
    pub ignore_detached: bool,
    pub details: DetailsConfig,
}

impl From<ObserveConfig> for Options {
    fn from(config: ObserveConfig) -> Self {
        let options = Options::new()
            .is_shallow(config.is_shallow)
            .path_as_array(config.path_as_array)
            .ignore_symbols(config.ignore_symbols)
            .ignore_underscores(config.ignore_underscores)
            .ignore_detached(config.ignore_detached)
            .details(config.details.into());
        match config.ignore_keys {
            Some(keys) => options.ignore_keys(keys),
            None => options,
        }
    }
}
