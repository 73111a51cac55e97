//! Flattened change list.
//!
//! Turns a document diff into the list a review panel shows: one entry per
//! changed field, grouped under the objects that contain them, each with
//! the patch that would undo it.

use serde::Serialize;
use structdiff_path::{Path, PathSegment};

use crate::diff::{ArrayDiff, Diff, DiffAction, ItemDiff};
use crate::mutation::{InsertPosition, PatchOp};
use crate::schema::{SchemaType, TypeKind, BLOCK_TYPE_NAME};
use crate::value::{is_reserved_attribute, item_key, type_name};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub path: Path,
    pub title: String,
    pub diff: Diff,
    /// Operations restoring the old value.
    pub revert: Vec<PatchOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupChange {
    pub path: Path,
    pub title: String,
    pub changes: Vec<ChangeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeNode {
    Field(FieldChange),
    Group(GroupChange),
}

impl ChangeNode {
    pub fn path(&self) -> &Path {
        match self {
            ChangeNode::Field(f) => &f.path,
            ChangeNode::Group(g) => &g.path,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ChangeNode::Field(f) => &f.title,
            ChangeNode::Group(g) => &g.title,
        }
    }

    /// The patch operations that undo this change.
    pub fn revert(&self) -> Vec<PatchOp> {
        match self {
            ChangeNode::Field(f) => f.revert.clone(),
            ChangeNode::Group(g) => g.changes.iter().flat_map(ChangeNode::revert).collect(),
        }
    }

    /// Field leaves in display order.
    pub fn fields(&self) -> Vec<&FieldChange> {
        match self {
            ChangeNode::Field(f) => vec![f],
            ChangeNode::Group(g) => g.changes.iter().flat_map(ChangeNode::fields).collect(),
        }
    }
}

/// Build the change list of a document diff.
pub fn build_change_list(diff: &Diff, schema_type: Option<&SchemaType>) -> Vec<ChangeNode> {
    let mut out = Vec::new();
    collect_object(&Path::root(), diff, schema_type, &mut out);
    out
}

/// Operations undoing every change of a list.
pub fn revert_all(changes: &[ChangeNode]) -> Vec<PatchOp> {
    changes.iter().flat_map(ChangeNode::revert).collect()
}

fn collect_object(path: &Path, diff: &Diff, schema_type: Option<&SchemaType>, out: &mut Vec<ChangeNode>) {
    let Some(object) = diff.as_object() else {
        return;
    };
    for (name, child) in &object.fields {
        if !child.is_changed() || is_reserved_attribute(name) {
            continue;
        }
        let field = schema_type.and_then(|t| t.field(name));
        let title = field.map_or(name.as_str(), |f| f.display_title()).to_string();
        let child_type = field.map(|f| &f.field_type);
        let child_path = path.child(name.as_str());
        if let Some(node) = build_node(child_path, title, child, child_type) {
            out.push(node);
        }
    }
}

fn is_group_type(schema_type: Option<&SchemaType>) -> bool {
    match schema_type {
        Some(t) => t.kind == TypeKind::Object && !t.is_portable_text(),
        None => true,
    }
}

fn build_node(path: Path, title: String, diff: &Diff, schema_type: Option<&SchemaType>) -> Option<ChangeNode> {
    match diff {
        Diff::Object(object)
            if object.action == DiffAction::Changed
                && is_group_type(schema_type)
                && object.to_value.as_ref().and_then(type_name) != Some(BLOCK_TYPE_NAME) =>
        {
            let mut changes = Vec::new();
            collect_object(&path, diff, schema_type, &mut changes);
            (!changes.is_empty()).then_some(ChangeNode::Group(GroupChange { path, title, changes }))
        }
        Diff::Array(array) if array.action == DiffAction::Changed && array.items.iter().any(has_key) => {
            let changes = collect_items(&path, &title, array, schema_type);
            (!changes.is_empty()).then_some(ChangeNode::Group(GroupChange { path, title, changes }))
        }
        _ => Some(ChangeNode::Field(FieldChange {
            revert: revert_value(&path, diff),
            path,
            title,
            diff: diff.clone(),
        })),
    }
}

fn has_key(item: &ItemDiff) -> bool {
    item.diff.to_value().or(item.diff.from_value()).and_then(item_key).is_some()
}

fn collect_items(path: &Path, title: &str, array: &ArrayDiff, schema_type: Option<&SchemaType>) -> Vec<ChangeNode> {
    let mut out = Vec::new();
    for item in &array.items {
        if !item.diff.is_changed() {
            continue;
        }
        let value = item.diff.to_value().or(item.diff.from_value());
        let item_type = schema_type.zip(value).and_then(|(t, v)| t.item_type(v));
        let item_title = item_type
            .map(|t| t.display_title().to_string())
            .or_else(|| value.and_then(type_name).map(str::to_string))
            .unwrap_or_else(|| format!("{title} item"));
        let item_path = path.child(item.path_segment());
        let node = match item.diff.action() {
            DiffAction::Removed => Some(ChangeNode::Field(FieldChange {
                revert: revert_removed_item(path, array, item),
                path: item_path,
                title: item_title,
                diff: item.diff.clone(),
            })),
            _ => build_node(item_path, item_title, &item.diff, item_type),
        };
        out.extend(node);
    }
    out
}

fn revert_value(path: &Path, diff: &Diff) -> Vec<PatchOp> {
    match (diff.action(), diff.from_value()) {
        (DiffAction::Added, _) | (_, None) => vec![PatchOp::unset(path.clone())],
        (_, Some(from)) => vec![PatchOp::set(path.clone(), from.clone())],
    }
}

/// Re-insert a removed array item after its nearest former predecessor
/// that still exists, or at the front.
fn revert_removed_item(array_path: &Path, array: &ArrayDiff, removed: &ItemDiff) -> Vec<PatchOp> {
    let Some(value) = removed.diff.from_value() else {
        return Vec::new();
    };
    let from_index = removed.from_index.unwrap_or_default();
    let anchor = array
        .items
        .iter()
        .filter(|i| i.to_index.is_some() && i.from_index.is_some_and(|f| f < from_index))
        .max_by_key(|i| i.from_index);
    let (position, segment) = match anchor {
        Some(prev) => (InsertPosition::After, prev.path_segment()),
        None => (InsertPosition::Before, PathSegment::Index(0)),
    };
    vec![PatchOp::Insert {
        position,
        path: array_path.child(segment),
        items: vec![value.clone()],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_values;
    use crate::mutation::apply_ops;
    use crate::schema::Field;
    use serde_json::json;

    #[test]
    fn nested_objects_become_groups() {
        let from = json!({"_rev": "1", "title": "a", "meta": {"x": 1, "y": 2}});
        let to = json!({"_rev": "2", "title": "b", "meta": {"x": 1, "y": 3}});
        let list = build_change_list(&diff_values(&from, &to), None);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].path().to_string(), "title");
        match &list[1] {
            ChangeNode::Group(g) => {
                assert_eq!(g.changes.len(), 1);
                assert_eq!(g.changes[0].path().to_string(), "meta.y");
            }
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn titles_from_schema() {
        let t = SchemaType::object("post", vec![Field::new("title", SchemaType::string()).with_title("Title")]);
        let d = crate::diff::diff(Some(&json!({"title": "a"})), Some(&json!({"title": "b"})), Some(&t), &Default::default());
        let list = build_change_list(&d, Some(&t));
        assert_eq!(list[0].title(), "Title");
    }

    #[test]
    fn revert_restores_from_value() {
        let from = json!({"title": "a", "gone": true, "list": [{"_key": "a", "v": 1}, {"_key": "b", "v": 2}, {"_key": "c"}]});
        let to = json!({"title": "b", "added": 1, "list": [{"_key": "a", "v": 1}, {"_key": "c"}, {"_key": "d"}]});
        let list = build_change_list(&diff_values(&from, &to), None);
        let restored = apply_ops(&to, &revert_all(&list)).unwrap();
        assert_eq!(restored, from);
    }

    #[test]
    fn removed_first_item_goes_to_front() {
        let from = json!({"l": [{"_key": "a"}, {"_key": "b"}]});
        let to = json!({"l": [{"_key": "b"}]});
        let list = build_change_list(&diff_values(&from, &to), None);
        let ops = revert_all(&list);
        assert_eq!(apply_ops(&to, &ops).unwrap(), from);
    }
}
