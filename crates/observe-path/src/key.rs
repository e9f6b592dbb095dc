//! Property keys and symbols.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("segment `{0}` is not a symbol")]
    NotSymbol(String),
    #[error("symbol segment `{0}` has an invalid id")]
    InvalidSymbolId(String),
}

/// Escapes a symbol description for use inside a dotted path.
///
/// `~` becomes `~0` and `.` becomes `~1`, so the separator never appears
/// inside a rendered symbol.
///
/// # Example
///
/// ```
/// use deep_observe_path::escape_description;
///
/// assert_eq!(escape_description("a.b"), "a~1b");
/// assert_eq!(escape_description("x~y"), "x~0y");
/// assert_eq!(escape_description("plain"), "plain");
/// ```
pub fn escape_description(description: &str) -> String {
    if !description.contains('.') && !description.contains('~') {
        return description.to_string();
    }
    // Order matters: ~ must be escaped before .
    description.replace('~', "~0").replace('.', "~1")
}

/// Reverses [`escape_description`].
pub fn unescape_description(description: &str) -> String {
    if !description.contains('~') {
        return description.to_string();
    }
    description.replace("~1", ".").replace("~0", "~")
}

/// A unique, non-string property key.
///
/// Two symbols are equal only when they share an id, regardless of their
/// descriptions.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Option<Arc<str>>,
}

impl Symbol {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: Some(Arc::from(description.into())),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Renders the symbol as a path segment: `Symbol(<desc>)#<id>`.
    pub fn to_text(&self) -> String {
        let desc = self.description.as_deref().map(escape_description).unwrap_or_default();
        format!("Symbol({desc})#{}", self.id)
    }

    /// Parses the form produced by [`Symbol::to_text`].
    ///
    /// # Example
    ///
    /// ```
    /// use deep_observe_path::Symbol;
    ///
    /// let sym = Symbol::new("meta.data");
    /// let back = Symbol::from_text(&sym.to_text()).unwrap();
    /// assert_eq!(back, sym);
    /// assert_eq!(back.description(), Some("meta.data"));
    /// assert!(Symbol::from_text("plain").is_err());
    /// ```
    pub fn from_text(text: &str) -> Result<Self, PathError> {
        let rest = text
            .strip_prefix("Symbol(")
            .ok_or_else(|| PathError::NotSymbol(text.to_string()))?;
        let (desc, id) = rest
            .rsplit_once(")#")
            .ok_or_else(|| PathError::NotSymbol(text.to_string()))?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PathError::NotSymbol(text.to_string()));
        }
        let id = id
            .parse::<u64>()
            .map_err(|_| PathError::InvalidSymbolId(text.to_string()))?;
        let description = if desc.is_empty() {
            None
        } else {
            Some(Arc::from(unescape_description(desc)))
        };
        Ok(Self { id, description })
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description.as_deref().unwrap_or(""))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self, self.id)
    }
}

/// A property key: a string or a [`Symbol`].
///
/// Sequence indices are string keys in canonical decimal form (`"0"`, `"1"`).
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(String),
    Symbol(Symbol),
}

impl Key {
    pub fn index(index: usize) -> Self {
        Key::Str(index.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            Key::Symbol(_) => None,
        }
    }

    /// Returns the array index this key denotes, if it is a canonical one.
    pub fn as_index(&self) -> Option<usize> {
        let s = self.as_str()?;
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return None;
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let n = s.parse::<u32>().ok()?;
        (n != u32::MAX).then_some(n as usize)
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Key::Symbol(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Key::Str(s) if s.is_empty())
    }

    pub fn starts_with(&self, c: char) -> bool {
        matches!(self, Key::Str(s) if s.starts_with(c))
    }

    /// Text used for this key inside a dotted path.
    pub fn to_segment(&self) -> String {
        match self {
            Key::Str(s) => s.clone(),
            Key::Symbol(sym) => sym.to_text(),
        }
    }

    /// Parses a dotted-path segment, recognising the symbol form.
    pub fn from_segment(segment: &str) -> Self {
        match Symbol::from_text(segment) {
            Ok(sym) => Key::Symbol(sym),
            Err(_) => Key::Str(segment.to_string()),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<&String> for Key {
    fn from(value: &String) -> Self {
        Key::Str(value.clone())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::index(value)
    }
}

impl From<Symbol> for Key {
    fn from(value: Symbol) -> Self {
        Key::Symbol(value)
    }
}

impl From<&Key> for Key {
    fn from(value: &Key) -> Self {
        value.clone()
    }
}

impl PartialEq<str> for Key {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Key {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Symbol(sym) => fmt::Display::fmt(sym, f),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => write!(f, "{s:?}"),
            Key::Symbol(sym) => fmt::Debug::fmt(sym, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_indices() {
        assert_eq!(Key::from("0").as_index(), Some(0));
        assert_eq!(Key::from("42").as_index(), Some(42));
        assert_eq!(Key::from("042").as_index(), None);
        assert_eq!(Key::from("-1").as_index(), None);
        assert_eq!(Key::from("1.5").as_index(), None);
        assert_eq!(Key::from("").as_index(), None);
        assert_eq!(Key::from("4294967295").as_index(), None);
        assert_eq!(Key::Symbol(Symbol::new("0")).as_index(), None);
    }

    #[test]
    fn test_symbol_identity_ignores_description() {
        let a = Symbol::new("same");
        let b = Symbol::new("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.to_string(), "Symbol(same)");
    }

    #[test]
    fn test_segment_roundtrip_for_symbols() {
        let anon = Symbol::anonymous();
        assert_eq!(Key::from_segment(&Key::Symbol(anon.clone()).to_segment()), Key::Symbol(anon));

        let dotted = Symbol::new("x.~y");
        let segment = Key::Symbol(dotted.clone()).to_segment();
        assert!(!segment.contains('.'));
        assert_eq!(Key::from_segment(&segment), Key::Symbol(dotted));
    }

    #[test]
    fn test_symbol_text_rejects_malformed_ids() {
        assert!(matches!(Symbol::from_text("Symbol(a)#"), Err(PathError::NotSymbol(_))));
        assert!(matches!(Symbol::from_text("Symbol(a)#x1"), Err(PathError::NotSymbol(_))));
        assert!(matches!(
            Symbol::from_text("Symbol(a)#99999999999999999999999"),
            Err(PathError::InvalidSymbolId(_))
        ));
    }
}
