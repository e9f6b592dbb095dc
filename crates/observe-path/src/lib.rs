//! Path model for observed object graphs.
//!
//! A [`Path`] names a location inside a wrapped graph. It is either an
//! ordered list of [`Key`]s or a single `.`-delimited string; the engine picks
//! one mode per root and every operation preserves it.
//!
//! # Example
//!
//! ```
//! use deep_observe_path::{Key, Path};
//!
//! let path = Path::root(false).concat(&Key::from("a")).concat(&Key::from("b"));
//! assert_eq!(path, "a.b");
//! assert_eq!(path.last(), Key::from("b"));
//! assert_eq!(path.initial(), "a");
//! assert_eq!(path.after(&Path::text("a")), "b");
//! ```

mod key;
mod path;

pub use key::{escape_description, unescape_description, Key, PathError, Symbol};
pub use path::{Path, PATH_SEPARATOR};
