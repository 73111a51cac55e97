//! structdiff: structural document diff and revision timeline.
//!
//! Computes typed, navigable diffs between two JSON document snapshots,
//! reconciles rich-text ("portable text") blocks into mark-aware runs, and
//! organizes a document's transaction history into a browsable timeline
//! that can diff any two points of it.
//!
//! ```
//! use serde_json::json;
//! use structdiff::diff::{diff_values, DiffAction};
//!
//! let d = diff_values(&json!({"title": "A"}), &json!({"title": "B"}));
//! assert_eq!(d.action(), DiffAction::Changed);
//! ```

// Leaf modules (no internal deps)
pub mod error;
pub mod text;
pub mod value;
pub mod config;

pub mod schema;
pub mod diff;
pub mod portable_text;
pub mod change_list;

pub mod mutation;
pub mod timeline;
pub mod history;

pub mod cli;

pub use structdiff_path::{Path, PathSegment};

pub use config::HistoryConfig;
pub use diff::{diff, diff_document, diff_values, Annotation, Diff, DiffAction, DiffOptions, DocumentDiff};
pub use error::{ConfigError, HistoryError, MutationError, SchemaError};
pub use history::{DocumentEvent, HistoryController, HistorySource};
pub use schema::{Schema, SchemaType};
pub use timeline::{Chunk, ChunkType, TimeRef, Timeline, TimelineState};
pub use value::DocumentPair;
