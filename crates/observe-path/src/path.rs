//! Location of a node inside an observed graph.

use std::fmt;

use crate::Key;

/// Delimiter used by text-mode paths.
pub const PATH_SEPARATOR: char = '.';

/// A location inside the graph: a key list or a dotted string.
///
/// All operations are pure and keep the mode of `self`. Operations that
/// take a second path convert it to `self`'s mode first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Path {
    Segments(Vec<Key>),
    Text(String),
}

impl Path {
    /// The empty path in the requested mode.
    pub fn root(as_array: bool) -> Self {
        if as_array {
            Path::Segments(Vec::new())
        } else {
            Path::Text(String::new())
        }
    }

    pub fn text(path: impl Into<String>) -> Self {
        Path::Text(path.into())
    }

    pub fn from_keys<K: Into<Key>>(keys: impl IntoIterator<Item = K>) -> Self {
        Path::Segments(keys.into_iter().map(Into::into).collect())
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Path::Segments(_))
    }

    pub fn is_root(&self) -> bool {
        match self {
            Path::Segments(keys) => keys.is_empty(),
            Path::Text(s) => s.is_empty(),
        }
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        match self {
            Path::Segments(keys) => keys.len(),
            Path::Text(s) if s.is_empty() => 0,
            Path::Text(s) => s.split(PATH_SEPARATOR).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// Appends `key`. The empty string key leaves the path unchanged.
    pub fn concat(&self, key: &Key) -> Path {
        if key.is_empty() {
            return self.clone();
        }
        match self {
            Path::Segments(keys) => {
                let mut keys = keys.clone();
                keys.push(key.clone());
                Path::Segments(keys)
            }
            Path::Text(s) => {
                let mut out = s.clone();
                if !out.is_empty() {
                    out.push(PATH_SEPARATOR);
                }
                out.push_str(&key.to_segment());
                Path::Text(out)
            }
        }
    }

    /// Drops the last segment.
    pub fn initial(&self) -> Path {
        match self {
            Path::Segments(keys) => {
                let end = keys.len().saturating_sub(1);
                Path::Segments(keys[..end].to_vec())
            }
            Path::Text(s) => match s.rfind(PATH_SEPARATOR) {
                Some(index) => Path::Text(s[..index].to_string()),
                None => Path::Text(String::new()),
            },
        }
    }

    /// The last segment, or the empty string key for the empty path.
    pub fn last(&self) -> Key {
        match self {
            Path::Segments(keys) => keys.last().cloned().unwrap_or_else(|| Key::from("")),
            Path::Text(s) => match s.rfind(PATH_SEPARATOR) {
                Some(index) => Key::from_segment(&s[index + 1..]),
                None => Key::from_segment(s),
            },
        }
    }

    /// The part of `self` that follows `prefix`.
    ///
    /// Drops as many leading segments as `prefix` spans without checking
    /// that they match; see [`Path::strip_prefix`] for the checked form.
    pub fn after(&self, prefix: &Path) -> Path {
        match self {
            Path::Segments(keys) => {
                let start = prefix.len().min(keys.len());
                Path::Segments(keys[start..].to_vec())
            }
            Path::Text(s) => {
                let prefix = prefix.to_string();
                if prefix.is_empty() {
                    return self.clone();
                }
                let start = (prefix.len() + 1).min(s.len());
                Path::Text(s.get(start..).unwrap_or_default().to_string())
            }
        }
    }

    /// Returns the remainder when `prefix` covers the leading segments of
    /// `self`, comparing whole segments.
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        let keys = self.keys();
        let prefix_keys = prefix.keys();
        if prefix_keys.len() > keys.len() || keys[..prefix_keys.len()] != prefix_keys[..] {
            return None;
        }
        let rest = keys[prefix_keys.len()..].to_vec();
        Some(match self {
            Path::Segments(_) => Path::Segments(rest),
            Path::Text(_) => Path::Segments(rest).to_text(),
        })
    }

    /// Calls `visit` once per segment, in order.
    pub fn walk(&self, mut visit: impl FnMut(Key)) {
        match self {
            Path::Segments(keys) => {
                for key in keys {
                    visit(key.clone());
                }
            }
            Path::Text(s) => {
                if s.is_empty() {
                    return;
                }
                for segment in s.split(PATH_SEPARATOR) {
                    visit(Key::from_segment(segment));
                }
            }
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        let mut out = Vec::with_capacity(self.len());
        self.walk(|key| out.push(key));
        out
    }

    pub fn to_text(&self) -> Path {
        Path::Text(self.to_string())
    }

    pub fn to_segments(&self) -> Path {
        Path::Segments(self.keys())
    }
}

impl FromIterator<Key> for Path {
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        Path::Segments(iter.into_iter().collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Text(s) => f.write_str(s),
            Path::Segments(keys) => {
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{PATH_SEPARATOR}")?;
                    }
                    f.write_str(&key.to_segment())?;
                }
                Ok(())
            }
        }
    }
}

impl PartialEq<str> for Path {
    fn eq(&self, other: &str) -> bool {
        match self {
            Path::Text(s) => s == other,
            Path::Segments(_) => self.to_string() == other,
        }
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl PartialEq<[&str]> for Path {
    fn eq(&self, other: &[&str]) -> bool {
        let keys = self.keys();
        keys.len() == other.len() && keys.iter().zip(other).all(|(k, o)| k == o)
    }
}
