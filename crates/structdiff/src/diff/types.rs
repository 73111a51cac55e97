//! Diff node types.
//!
//! A diff tree is a closed tagged union with one variant per JSON kind,
//! plus `TypeChange` for values whose kind differs between the two sides.
//! Nodes are immutable once returned; anything that needs an edited tree
//! clones the nodes it changes.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use structdiff_path::PathSegment;

use crate::value::{item_key, JsonKind};

/// How a node changed between the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffAction {
    Added,
    Removed,
    Changed,
    Unchanged,
}

impl DiffAction {
    /// Classify by presence alone; callers decide `Changed` vs `Unchanged`
    /// when both sides are present.
    pub fn from_presence(from: Option<&Value>, to: Option<&Value>, equal: bool) -> Self {
        match (from, to) {
            (None, Some(_)) => DiffAction::Added,
            (Some(_), None) => DiffAction::Removed,
            _ if equal => DiffAction::Unchanged,
            _ => DiffAction::Changed,
        }
    }

    pub fn is_changed(&self) -> bool {
        *self != DiffAction::Unchanged
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiffAction::Added => "added",
            DiffAction::Removed => "removed",
            DiffAction::Changed => "changed",
            DiffAction::Unchanged => "unchanged",
        }
    }
}

/// Attribution for a change. Opaque to the engine: it is threaded through
/// from the caller and stamped onto the nodes a change produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

impl Annotation {
    pub fn new(author: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            author: author.into(),
            timestamp,
            chunk_id: None,
        }
    }

    pub fn with_chunk(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Diff of two objects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDiff {
    pub action: DiffAction,
    pub is_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(skip_serializing_if = "is_false")]
    pub schema_mismatch: bool,
    /// One child per field present on at least one side.
    pub fields: IndexMap<String, Diff>,
}

/// Diff of two arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayDiff {
    pub action: DiffAction,
    pub is_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(skip_serializing_if = "is_false")]
    pub schema_mismatch: bool,
    /// One entry per item across both sides, in `toValue` order with
    /// removed items interleaved at their former position.
    pub items: Vec<ItemDiff>,
}

/// One array item and its position on each side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDiff {
    pub diff: Diff,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_index: Option<usize>,
    pub has_moved: bool,
}

impl ItemDiff {
    /// The segment addressing this item: its `_key` when it has one, else
    /// its current (or former, if removed) index.
    pub fn path_segment(&self) -> PathSegment {
        let value = self.diff.to_value().or(self.diff.from_value());
        if let Some(key) = value.and_then(item_key) {
            return PathSegment::keyed(key);
        }
        PathSegment::Index(self.to_index.or(self.from_index).unwrap_or(0))
    }
}

/// Diff of two strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringDiff {
    pub action: DiffAction,
    pub is_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(skip_serializing_if = "is_false")]
    pub schema_mismatch: bool,
    pub segments: Vec<StringSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentAction {
    Unchanged,
    Removed,
    Added,
}

impl SegmentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentAction::Unchanged => "unchanged",
            SegmentAction::Removed => "removed",
            SegmentAction::Added => "added",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringSegment {
    pub action: SegmentAction,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

/// Diff of two numbers, booleans, or nulls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarDiff {
    pub action: DiffAction,
    pub is_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(skip_serializing_if = "is_false")]
    pub schema_mismatch: bool,
}

/// A value replaced wholesale by one of a different JSON kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeChangeDiff {
    pub action: DiffAction,
    pub is_changed: bool,
    pub from_value: Option<Value>,
    pub to_value: Option<Value>,
    pub from_type: JsonKind,
    pub to_type: JsonKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(skip_serializing_if = "is_false")]
    pub schema_mismatch: bool,
}

/// A diff node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Diff {
    Object(ObjectDiff),
    Array(ArrayDiff),
    String(StringDiff),
    Number(ScalarDiff),
    Boolean(ScalarDiff),
    Null(ScalarDiff),
    TypeChange(TypeChangeDiff),
}

macro_rules! each_variant {
    ($self:expr, $d:ident => $body:expr) => {
        match $self {
            Diff::Object($d) => $body,
            Diff::Array($d) => $body,
            Diff::String($d) => $body,
            Diff::Number($d) => $body,
            Diff::Boolean($d) => $body,
            Diff::Null($d) => $body,
            Diff::TypeChange($d) => $body,
        }
    };
}

impl Diff {
    pub fn action(&self) -> DiffAction {
        each_variant!(self, d => d.action)
    }

    pub fn is_changed(&self) -> bool {
        each_variant!(self, d => d.is_changed)
    }

    pub fn from_value(&self) -> Option<&Value> {
        each_variant!(self, d => d.from_value.as_ref())
    }

    pub fn to_value(&self) -> Option<&Value> {
        each_variant!(self, d => d.to_value.as_ref())
    }

    pub fn annotation(&self) -> Option<&Annotation> {
        each_variant!(self, d => d.annotation.as_ref())
    }

    pub fn schema_mismatch(&self) -> bool {
        each_variant!(self, d => d.schema_mismatch)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Diff::Object(_) => "object",
            Diff::Array(_) => "array",
            Diff::String(_) => "string",
            Diff::Number(_) => "number",
            Diff::Boolean(_) => "boolean",
            Diff::Null(_) => "null",
            Diff::TypeChange(_) => "typeChange",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectDiff> {
        match self {
            Diff::Object(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayDiff> {
        match self {
            Diff::Array(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringDiff> {
        match self {
            Diff::String(d) => Some(d),
            _ => None,
        }
    }

    /// Navigate to the descendant at `path`. Keyed segments match array
    /// items by `_key` on either side; index segments match the current
    /// index, or the former index for removed items.
    pub fn get(&self, path: &[PathSegment]) -> Option<&Diff> {
        let mut current = self;
        for segment in path {
            current = match (current, segment) {
                (Diff::Object(obj), PathSegment::Key(k)) => obj.fields.get(k)?,
                (Diff::Array(arr), PathSegment::Keyed { key }) => {
                    &arr.items
                        .iter()
                        .find(|item| {
                            item.diff.to_value().and_then(item_key) == Some(key)
                                || item.diff.from_value().and_then(item_key) == Some(key)
                        })?
                        .diff
                }
                (Diff::Array(arr), PathSegment::Index(i)) => {
                    &arr.items
                        .iter()
                        .find(|item| item.to_index == Some(*i))
                        .or_else(|| {
                            arr.items
                                .iter()
                                .find(|item| item.to_index.is_none() && item.from_index == Some(*i))
                        })?
                        .diff
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

impl ArrayDiff {
    /// Rebuild `toValue` from the items.
    pub fn collect_to_values(&self) -> Vec<Value> {
        let mut items: Vec<(usize, Value)> = self
            .items
            .iter()
            .filter_map(|item| Some((item.to_index?, item.diff.to_value()?.clone())))
            .collect();
        items.sort_by_key(|(idx, _)| *idx);
        items.into_iter().map(|(_, v)| v).collect()
    }

    /// Rebuild `fromValue` from the items.
    pub fn collect_from_values(&self) -> Vec<Value> {
        let mut items: Vec<(usize, Value)> = self
            .items
            .iter()
            .filter_map(|item| Some((item.from_index?, item.diff.from_value()?.clone())))
            .collect();
        items.sort_by_key(|(idx, _)| *idx);
        items.into_iter().map(|(_, v)| v).collect()
    }
}

impl StringDiff {
    /// Concatenation of unchanged and removed segments.
    pub fn from_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.action != SegmentAction::Added)
            .map(|s| s.text.as_str())
            .collect()
    }

    /// Concatenation of unchanged and added segments.
    pub fn to_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.action != SegmentAction::Removed)
            .map(|s| s.text.as_str())
            .collect()
    }
}
