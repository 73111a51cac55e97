//! Document paths.
//!
//! A path is an ordered list of segments: object keys, positional array
//! indices, or keyed segments that address an array item by its stable
//! `_key` rather than by position.
//!
//! # Example
//!
//! ```
//! use structdiff_path::{get, parse_path, PathSegment};
//!
//! let path = parse_path(r#"body[_key=="b1"].text"#).unwrap();
//! assert_eq!(path[1], PathSegment::keyed("b1"));
//!
//! let doc = serde_json::json!({"body": [{"_key": "b1", "text": "hi"}]});
//! assert_eq!(get(&doc, &path), Some(&serde_json::json!("hi")));
//! assert_eq!(path.to_string(), r#"body[_key=="b1"].text"#);
//! ```

use thiserror::Error;

pub mod types;
pub use types::{Path, PathSegment};

pub mod parse;
pub use parse::parse_path;

mod get;
pub use get::{get, get_mut, index_of_key, resolve_index, KEY_ATTRIBUTE};

/// Errors from parsing or resolving a path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("unexpected character {found:?} at {pos}")]
    UnexpectedChar { found: char, pos: usize },
    #[error("unexpected end of path")]
    UnexpectedEnd,
    #[error("invalid index: {0}")]
    InvalidIndex(String),
    #[error("unsupported filter attribute: {0}")]
    UnsupportedFilter(String),
    #[error("path too long")]
    PathTooLong,
    #[error("path has no parent")]
    NoParent,
}

/// Check if two paths are equal. Keyed segments compare by key only.
pub fn is_path_equal(p1: &[PathSegment], p2: &[PathSegment]) -> bool {
    p1 == p2
}

/// Get the parent path of a given path.
///
/// # Errors
///
/// Returns an error if the path is the root.
pub fn parent(path: &Path) -> Result<Path, PathError> {
    path.parent().ok_or(PathError::NoParent)
}
