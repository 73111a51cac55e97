//! Per-path attribution of changes.
//!
//! A range diff compares two snapshots that may be many chunks apart. To
//! credit each change to the chunk that made it, the caller records the
//! diff of every chunk in the range, oldest first, into an
//! [`Attribution`]; a later chunk overwrites the entries of an earlier
//! one. The engine then looks up each changed node by its path.

use std::collections::HashMap;

use structdiff_path::Path;

use super::types::{Annotation, Diff};

/// Annotations keyed by the path of the node they were recorded for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attribution {
    by_path: HashMap<Path, Annotation>,
}

impl Attribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Credit every changed node of `diff` to `annotation`.
    pub fn record(&mut self, diff: &Diff, annotation: &Annotation) {
        self.record_at(&Path::root(), diff, annotation);
    }

    fn record_at(&mut self, path: &Path, diff: &Diff, annotation: &Annotation) {
        if !diff.is_changed() {
            return;
        }
        self.by_path.insert(path.clone(), annotation.clone());
        match diff {
            Diff::Object(obj) => {
                for (name, child) in &obj.fields {
                    self.record_at(&path.child(name.as_str()), child, annotation);
                }
            }
            Diff::Array(arr) => {
                for item in &arr.items {
                    self.record_at(&path.child(item.path_segment()), &item.diff, annotation);
                }
            }
            _ => {}
        }
    }

    /// The annotation recorded at `path`, or at its nearest recorded
    /// ancestor.
    pub fn lookup(&self, path: &Path) -> Option<&Annotation> {
        (0..=path.len()).rev().find_map(|len| {
            self.by_path.get(&Path::new(path[..len].to_vec()))
        })
    }
}
