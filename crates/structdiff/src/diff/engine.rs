//! Recursive structural differ.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use structdiff_path::{Path, PathSegment};
use tracing::debug;

use super::array::match_items;
use super::types::{
    Annotation, ArrayDiff, Diff, DiffAction, ItemDiff, ObjectDiff, ScalarDiff, SegmentAction,
    StringDiff, StringSegment, TypeChangeDiff,
};
use super::DiffOptions;
use crate::schema::{SchemaType, BLOCK_TYPE_NAME};
use crate::text::{diff_str, PatchOpType};
use crate::value::{type_name, values_equal, JsonKind};

/// One step from a node to a child in the diff tree being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Field(String),
    /// Position in the parent's `items`, which stays unambiguous where an
    /// index path segment may not.
    Item(usize),
}

/// A portable-text block found while diffing, with its declared type.
pub(crate) struct BlockSite<'s> {
    pub path: Path,
    pub trail: Vec<Step>,
    pub schema_type: Option<&'s SchemaType>,
}

/// Follow `trail` down from `root`.
pub(crate) fn locate<'d>(root: &'d Diff, trail: &[Step]) -> Option<&'d Diff> {
    trail.iter().try_fold(root, |node, step| match (node, step) {
        (Diff::Object(obj), Step::Field(name)) => obj.fields.get(name),
        (Diff::Array(arr), Step::Item(i)) => arr.items.get(*i).map(|item| &item.diff),
        _ => None,
    })
}

pub(crate) struct Differ<'o, 's> {
    options: &'o DiffOptions<'s>,
    trail: Vec<Step>,
    pub blocks: Vec<BlockSite<'s>>,
}

impl<'o, 's> Differ<'o, 's> {
    pub fn new(options: &'o DiffOptions<'s>) -> Self {
        Self {
            options,
            trail: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// The per-path attribution when one was recorded, else the range-wide
    /// annotation. Unchanged nodes carry none.
    fn annotation_for(&self, path: &Path, action: DiffAction) -> Option<Annotation> {
        if !action.is_changed() {
            return None;
        }
        self.options
            .attribution
            .and_then(|a| a.lookup(path))
            .or(self.options.annotation.as_ref())
            .cloned()
    }

    /// Diff one node. `declared` is false when the parent object type does
    /// not declare this field.
    pub fn diff(
        &mut self,
        path: &Path,
        from: Option<&Value>,
        to: Option<&Value>,
        schema_type: Option<&'s SchemaType>,
        declared: bool,
    ) -> Diff {
        let from_kind = from.map(JsonKind::of);
        let to_kind = to.map(JsonKind::of);

        let kind_mismatch = schema_type.is_some_and(|t| {
            from_kind.is_some_and(|k| !t.accepts(k)) || to_kind.is_some_and(|k| !t.accepts(k))
        });
        let schema_mismatch = !declared || kind_mismatch;
        if schema_mismatch {
            debug!(path = %path, "value disagrees with declared schema type");
        }

        match (from_kind, to_kind) {
            (Some(fk), Some(tk)) if fk != tk => {
                let action = DiffAction::Changed;
                Diff::TypeChange(TypeChangeDiff {
                    action,
                    is_changed: true,
                    from_value: from.cloned(),
                    to_value: to.cloned(),
                    from_type: fk,
                    to_type: tk,
                    annotation: self.annotation_for(path, action),
                    schema_mismatch,
                })
            }
            (None, None) => Diff::Null(ScalarDiff {
                action: DiffAction::Unchanged,
                is_changed: false,
                from_value: None,
                to_value: None,
                annotation: None,
                schema_mismatch,
            }),
            _ => {
                let kind = to_kind.or(from_kind).unwrap_or(JsonKind::Null);
                // A kind mismatch means the declared type tells us nothing
                // about the children.
                let child_type = if kind_mismatch { None } else { schema_type };
                match kind {
                    JsonKind::Object => self.diff_object(
                        path,
                        from.and_then(Value::as_object),
                        to.and_then(Value::as_object),
                        from,
                        to,
                        child_type,
                        schema_mismatch,
                    ),
                    JsonKind::Array => self.diff_array(
                        path,
                        from.and_then(Value::as_array),
                        to.and_then(Value::as_array),
                        from,
                        to,
                        child_type,
                        schema_mismatch,
                    ),
                    JsonKind::String => self.diff_string(path, from, to, schema_mismatch),
                    JsonKind::Number => Diff::Number(self.diff_scalar(path, from, to, schema_mismatch)),
                    JsonKind::Boolean => Diff::Boolean(self.diff_scalar(path, from, to, schema_mismatch)),
                    JsonKind::Null => Diff::Null(self.diff_scalar(path, from, to, schema_mismatch)),
                }
            }
        }
    }

    fn is_block(&self, value: Option<&Value>, schema_type: Option<&SchemaType>) -> bool {
        if !self.options.portable_text {
            return false;
        }
        match schema_type {
            Some(t) => t.is_portable_text(),
            None => value.and_then(type_name) == Some(BLOCK_TYPE_NAME),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn diff_object(
        &mut self,
        path: &Path,
        from: Option<&Map<String, Value>>,
        to: Option<&Map<String, Value>>,
        from_value: Option<&Value>,
        to_value: Option<&Value>,
        schema_type: Option<&'s SchemaType>,
        schema_mismatch: bool,
    ) -> Diff {
        let mut keys: Vec<&String> = Vec::new();
        if let Some(from) = from {
            keys.extend(from.keys());
        }
        if let Some(to) = to {
            keys.extend(to.keys().filter(|k| !from.is_some_and(|f| f.contains_key(*k))));
        }

        let mut fields = IndexMap::with_capacity(keys.len());
        for key in keys {
            let field_type = schema_type.and_then(|t| t.field(key)).map(|f| &f.field_type);
            let declared = schema_type.is_none_or(|t| t.allows_field(key));
            self.trail.push(Step::Field(key.clone()));
            let child = self.diff(
                &path.child(key.as_str()),
                from.and_then(|m| m.get(key)),
                to.and_then(|m| m.get(key)),
                field_type,
                declared,
            );
            self.trail.pop();
            fields.insert(key.clone(), child);
        }

        let all_unchanged = fields.values().all(|d: &Diff| !d.is_changed());
        let action = DiffAction::from_presence(from_value, to_value, all_unchanged);

        if self.is_block(to_value.or(from_value), schema_type) {
            self.blocks.push(BlockSite {
                path: path.clone(),
                trail: self.trail.clone(),
                schema_type,
            });
        }

        Diff::Object(ObjectDiff {
            action,
            is_changed: action.is_changed(),
            from_value: from_value.cloned(),
            to_value: to_value.cloned(),
            annotation: self.annotation_for(path, action),
            schema_mismatch,
            fields,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn diff_array(
        &mut self,
        path: &Path,
        from: Option<&Vec<Value>>,
        to: Option<&Vec<Value>>,
        from_value: Option<&Value>,
        to_value: Option<&Value>,
        schema_type: Option<&'s SchemaType>,
        schema_mismatch: bool,
    ) -> Diff {
        let empty = Vec::new();
        let from_items = from.unwrap_or(&empty);
        let to_items = to.unwrap_or(&empty);

        let mut items = Vec::with_capacity(from_items.len().max(to_items.len()));
        for m in match_items(from_items, to_items) {
            let from_item = m.from_index.map(|i| &from_items[i]);
            let to_item = m.to_index.map(|j| &to_items[j]);
            let item_type = schema_type.and_then(|t| {
                to_item
                    .or(from_item)
                    .and_then(|item| t.item_type(item))
            });
            let segment = match to_item.or(from_item).and_then(crate::value::item_key) {
                Some(key) => PathSegment::keyed(key),
                None => PathSegment::Index(m.to_index.or(m.from_index).unwrap_or(0)),
            };
            self.trail.push(Step::Item(items.len()));
            let diff = self.diff(&path.child(segment), from_item, to_item, item_type, true);
            self.trail.pop();
            let has_moved = matches!((m.from_index, m.to_index), (Some(i), Some(j)) if i != j);
            items.push(ItemDiff {
                diff,
                from_index: m.from_index,
                to_index: m.to_index,
                has_moved,
            });
        }

        let unchanged = from_items.len() == to_items.len()
            && items.iter().all(|item| !item.diff.is_changed() && !item.has_moved);
        let action = DiffAction::from_presence(from_value, to_value, unchanged);

        Diff::Array(ArrayDiff {
            action,
            is_changed: action.is_changed(),
            from_value: from_value.cloned(),
            to_value: to_value.cloned(),
            annotation: self.annotation_for(path, action),
            schema_mismatch,
            items,
        })
    }

    fn diff_string(
        &self,
        path: &Path,
        from: Option<&Value>,
        to: Option<&Value>,
        schema_mismatch: bool,
    ) -> Diff {
        let from_text = from.and_then(Value::as_str).unwrap_or("");
        let to_text = to.and_then(Value::as_str).unwrap_or("");
        let action = DiffAction::from_presence(from, to, from_text == to_text);
        let annotation = self.annotation_for(path, action);

        let segments = diff_str(from_text, to_text)
            .into_iter()
            .map(|(op, text)| {
                let action = match op {
                    PatchOpType::Eql => SegmentAction::Unchanged,
                    PatchOpType::Del => SegmentAction::Removed,
                    PatchOpType::Ins => SegmentAction::Added,
                };
                StringSegment {
                    action,
                    text,
                    annotation: if action == SegmentAction::Unchanged {
                        None
                    } else {
                        annotation.clone()
                    },
                }
            })
            .collect();

        Diff::String(StringDiff {
            action,
            is_changed: action.is_changed(),
            from_value: from.cloned(),
            to_value: to.cloned(),
            annotation,
            schema_mismatch,
            segments,
        })
    }

    fn diff_scalar(
        &self,
        path: &Path,
        from: Option<&Value>,
        to: Option<&Value>,
        schema_mismatch: bool,
    ) -> ScalarDiff {
        let equal = matches!((from, to), (Some(a), Some(b)) if values_equal(a, b));
        let action = DiffAction::from_presence(from, to, equal);
        ScalarDiff {
            action,
            is_changed: action.is_changed(),
            from_value: from.cloned(),
            to_value: to.cloned(),
            annotation: self.annotation_for(path, action),
            schema_mismatch,
        }
    }
}
