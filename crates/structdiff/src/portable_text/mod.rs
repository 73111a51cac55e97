//! Portable-text reconciliation.
//!
//! The generic diff treats every span of a block as an opaque array item,
//! so it cannot say that a word became bold or that a link now covers
//! half of a sentence. The reconciler re-derives that from a token diff of
//! the two sides and produces [`Run`]s: contiguous text or inline objects,
//! each with its edit action and the marks that apply to it.

mod reconcile;
mod summary;
mod symbolize;

use serde::Serialize;

pub use reconcile::{ActiveMark, InlineObjectRun, MarkKind, Run, TextRun, UnknownRun};
pub use summary::{child_changes, display_children, ChildChange};

use crate::diff::{DiffAction, ObjectDiff};
use crate::schema::SchemaType;

/// The reconciled form of one block diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableTextDiff {
    pub action: DiffAction,
    pub is_changed: bool,
    /// True when only marks changed; `diff` then carries only the `marks`
    /// fields of the children.
    pub marks_only: bool,
    pub diff: ObjectDiff,
    pub runs: Vec<Run>,
    pub children: Vec<ChildChange>,
}

impl PortableTextDiff {
    /// Runs that changed text, marks or inline objects.
    pub fn changed_runs(&self) -> impl Iterator<Item = &Run> {
        self.runs.iter().filter(|r| r.is_changed())
    }
}

/// Reconcile the generic diff of one block.
pub fn reconcile_block(block: &ObjectDiff, schema_type: Option<&SchemaType>) -> PortableTextDiff {
    let runs = reconcile::reconcile_runs(block, schema_type);
    let children = child_changes(block);
    let marks_only = reconcile::is_marks_only(block);
    let diff = if marks_only {
        reconcile::strip_to_marks(block)
    } else {
        block.clone()
    };
    PortableTextDiff {
        action: block.action,
        is_changed: block.is_changed,
        marks_only,
        diff,
        runs,
        children,
    }
}
