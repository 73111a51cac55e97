//! Type definitions for document paths.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// A single step in a document path.
///
/// Serializes the same way paths are written in JSON: keys as strings,
/// indices as numbers, and keyed steps as `{"_key": "..."}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object field name.
    Key(String),
    /// Positional array index.
    Index(usize),
    /// Array item addressed by its stable `_key`, independent of position.
    Keyed {
        #[serde(rename = "_key")]
        key: String,
    },
}

impl PathSegment {
    pub fn key(name: impl Into<String>) -> Self {
        PathSegment::Key(name.into())
    }

    pub fn keyed(key: impl Into<String>) -> Self {
        PathSegment::Keyed { key: key.into() }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, PathSegment::Key(_))
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PathSegment::Index(_))
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self, PathSegment::Keyed { .. })
    }

    /// Returns the field name for `Key` segments.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Returns the item key for `Keyed` segments.
    pub fn as_item_key(&self) -> Option<&str> {
        match self {
            PathSegment::Keyed { key } => Some(key),
            _ => None,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Key(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Key(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

/// An ordered sequence of path segments. The empty path addresses the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn new(segments: Vec<PathSegment>) -> Self {
        Path(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn into_segments(self) -> Vec<PathSegment> {
        self.0
    }

    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<PathSegment>) -> Path {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(segment.into());
        Path(segments)
    }

    /// The path without its last segment, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            return None;
        }
        Some(Path(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// True if `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        prefix.0.len() <= self.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// True if this path is strictly below `parent`.
    pub fn is_child_of(&self, parent: &Path) -> bool {
        parent.0.len() < self.0.len() && self.starts_with(parent)
    }
}

impl Deref for Path {
    type Target = [PathSegment];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Path(segments)
    }
}

impl FromIterator<PathSegment> for Path {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathSegment;
    type IntoIter = std::slice::Iter<'a, PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── String form ───────────────────────────────────────────────────────────

pub(crate) fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

pub(crate) fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) if is_identifier(k) => f.write_str(k),
            PathSegment::Key(k) => {
                f.write_str("[")?;
                write_quoted(f, k)?;
                f.write_str("]")
            }
            PathSegment::Index(i) => write!(f, "[{i}]"),
            PathSegment::Keyed { key } => {
                f.write_str("[_key==")?;
                write_quoted(f, key)?;
                f.write_str("]")
            }
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                if let PathSegment::Key(k) = segment {
                    if is_identifier(k) {
                        f.write_str(".")?;
                    }
                }
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
