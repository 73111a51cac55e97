//! Per-child change summaries for a block.

use serde::Serialize;
use serde_json::Value;

use super::symbolize::{child_key, is_span, mark_defs, span_marks, span_text};
use crate::diff::{ArrayDiff, Diff, DiffAction, ItemDiff, ObjectDiff};
use crate::value::{item_key, type_name};

/// A human-readable change to one block child.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChildChange {
    #[serde(rename_all = "camelCase")]
    TextAdded { key: String, text: String },
    #[serde(rename_all = "camelCase")]
    TextRemoved { key: String, text: String },
    #[serde(rename_all = "camelCase")]
    TextChanged { key: String, from: String, to: String },
    #[serde(rename_all = "camelCase")]
    DecoratorAdded { key: String, mark: String },
    #[serde(rename_all = "camelCase")]
    DecoratorRemoved { key: String, mark: String },
    #[serde(rename_all = "camelCase")]
    AnnotationAdded { key: String, mark: String, mark_def: Value },
    #[serde(rename_all = "camelCase")]
    AnnotationRemoved { key: String, mark: String, mark_def: Value },
    #[serde(rename_all = "camelCase")]
    InlineObjectAdded { key: String, type_name: Option<String> },
    #[serde(rename_all = "camelCase")]
    InlineObjectChanged { key: String, type_name: Option<String> },
    #[serde(rename_all = "camelCase")]
    InlineObjectRemoved { key: String, type_name: Option<String> },
    #[serde(rename_all = "camelCase")]
    Unknown { key: String },
}

impl ChildChange {
    pub fn key(&self) -> &str {
        match self {
            ChildChange::TextAdded { key, .. }
            | ChildChange::TextRemoved { key, .. }
            | ChildChange::TextChanged { key, .. }
            | ChildChange::DecoratorAdded { key, .. }
            | ChildChange::DecoratorRemoved { key, .. }
            | ChildChange::AnnotationAdded { key, .. }
            | ChildChange::AnnotationRemoved { key, .. }
            | ChildChange::InlineObjectAdded { key, .. }
            | ChildChange::InlineObjectChanged { key, .. }
            | ChildChange::InlineObjectRemoved { key, .. }
            | ChildChange::Unknown { key } => key,
        }
    }
}

fn find_def<'a>(defs: &'a [Value], mark: &str) -> Option<&'a Value> {
    defs.iter().find(|d| item_key(d) == Some(mark))
}

fn mark_change(key: &str, mark: &str, added: bool, defs: &[Value]) -> ChildChange {
    let key = key.to_string();
    let mark = mark.to_string();
    match (find_def(defs, &mark), added) {
        (Some(def), true) => ChildChange::AnnotationAdded {
            key,
            mark,
            mark_def: def.clone(),
        },
        (Some(def), false) => ChildChange::AnnotationRemoved {
            key,
            mark,
            mark_def: def.clone(),
        },
        (None, true) => ChildChange::DecoratorAdded { key, mark },
        (None, false) => ChildChange::DecoratorRemoved { key, mark },
    }
}

fn summarize_item(
    item: &ItemDiff,
    from_defs: &[Value],
    to_defs: &[Value],
    out: &mut Vec<ChildChange>,
) {
    let value = item.diff.to_value().or(item.diff.from_value());
    let index = item.to_index.or(item.from_index).unwrap_or_default();
    let key = value.map_or_else(|| format!("#{index}"), |v| child_key(v, index));

    let Some(value) = value.filter(|v| v.is_object()) else {
        out.push(ChildChange::Unknown { key });
        return;
    };

    if !is_span(value) {
        let type_name = type_name(value).map(str::to_string);
        match item.diff.action() {
            DiffAction::Added => out.push(ChildChange::InlineObjectAdded { key, type_name }),
            DiffAction::Removed => out.push(ChildChange::InlineObjectRemoved { key, type_name }),
            DiffAction::Changed => out.push(ChildChange::InlineObjectChanged { key, type_name }),
            DiffAction::Unchanged => {}
        }
        return;
    }

    match (item.diff.from_value(), item.diff.to_value()) {
        (None, Some(to)) => {
            out.push(ChildChange::TextAdded {
                key: key.clone(),
                text: span_text(to).to_string(),
            });
            for mark in span_marks(to) {
                out.push(mark_change(&key, mark, true, to_defs));
            }
        }
        (Some(from), None) => out.push(ChildChange::TextRemoved {
            key,
            text: span_text(from).to_string(),
        }),
        (Some(from), Some(to)) => {
            let Diff::Object(ObjectDiff { fields, .. }) = &item.diff else {
                out.push(ChildChange::Unknown { key });
                return;
            };
            if fields.get("text").is_some_and(Diff::is_changed) {
                out.push(ChildChange::TextChanged {
                    key: key.clone(),
                    from: span_text(from).to_string(),
                    to: span_text(to).to_string(),
                });
            }
            let from_marks = span_marks(from);
            let to_marks = span_marks(to);
            for mark in to_marks.iter().filter(|m| !from_marks.contains(m)) {
                out.push(mark_change(&key, mark, true, to_defs));
            }
            for mark in from_marks.iter().filter(|m| !to_marks.contains(m)) {
                out.push(mark_change(&key, mark, false, from_defs));
            }
        }
        (None, None) => {}
    }
}

/// Summarize every changed child of a block diff, in display order.
pub fn child_changes(block: &ObjectDiff) -> Vec<ChildChange> {
    let Some(children) = block.fields.get("children").and_then(Diff::as_array) else {
        return Vec::new();
    };
    let from_defs = mark_defs(block.from_value.as_ref());
    let to_defs = mark_defs(block.to_value.as_ref());
    let mut out = Vec::new();
    for item in display_children(children) {
        if item.diff.is_changed() {
            summarize_item(item, from_defs, to_defs, &mut out);
        }
    }
    out
}

/// The new-side children with removed children re-inserted at their former
/// index, for rendering deletions inline.
pub fn display_children(children: &ArrayDiff) -> Vec<&ItemDiff> {
    let mut present: Vec<&ItemDiff> = children.items.iter().filter(|i| i.to_index.is_some()).collect();
    present.sort_by_key(|i| i.to_index);
    let mut removed: Vec<&ItemDiff> = children.items.iter().filter(|i| i.to_index.is_none()).collect();
    removed.sort_by_key(|i| i.from_index);
    for item in removed {
        let at = item.from_index.unwrap_or(present.len()).min(present.len());
        present.insert(at, item);
    }
    present
}
