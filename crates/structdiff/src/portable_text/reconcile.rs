//! Mark-aware runs over a block diff.
//!
//! The token sequences of both sides are diffed, then walked left to right
//! with two mark stacks: one tracking marks open on the new side (equal and
//! inserted tokens), one tracking marks open on the old side (equal and
//! deleted tokens). A character's marks are the union of both stacks; a
//! mark open on only one side was added or removed around that text.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::symbolize::{children, child_key, find_child, is_span, mark_defs, symbolize, Symbolized, Token};
use crate::diff::{Annotation, ArrayDiff, Diff, DiffAction, ItemDiff, ObjectDiff, SegmentAction};
use crate::schema::SchemaType;
use crate::text::{diff_tokens, PatchOpType};
use crate::value::{item_key, type_name};

/// What a mark name refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MarkKind {
    /// A plain formatting mark such as `strong`.
    Decorator,
    /// A mark referencing an entry of the block's `markDefs`.
    Annotation {
        #[serde(rename = "markDef")]
        mark_def: Value,
    },
}

/// A mark applied to a run, and whether this diff added or removed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMark {
    pub name: String,
    pub kind: MarkKind,
    pub state: SegmentAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub action: SegmentAction,
    pub text: String,
    pub marks: Vec<ActiveMark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineObjectRun {
    pub action: DiffAction,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

/// Content whose mark or inline reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownRun {
    pub action: SegmentAction,
    pub text: String,
    pub symbol: String,
}

/// One contiguous piece of reconciled block content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Run {
    Text(TextRun),
    InlineObject(InlineObjectRun),
    Unknown(UnknownRun),
}

impl Run {
    pub fn is_changed(&self) -> bool {
        match self {
            Run::Text(t) => {
                t.action != SegmentAction::Unchanged
                    || t.marks.iter().any(|m| m.state != SegmentAction::Unchanged)
            }
            Run::InlineObject(o) => o.action.is_changed(),
            Run::Unknown(u) => u.action != SegmentAction::Unchanged,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    From,
    To,
}

fn segment_action(op: PatchOpType) -> SegmentAction {
    match op {
        PatchOpType::Eql => SegmentAction::Unchanged,
        PatchOpType::Del => SegmentAction::Removed,
        PatchOpType::Ins => SegmentAction::Added,
    }
}

fn remove_last(stack: &mut Vec<String>, name: &str) {
    if let Some(pos) = stack.iter().rposition(|m| m == name) {
        stack.remove(pos);
    }
}

struct Walker<'a> {
    block: &'a ObjectDiff,
    children_diff: Option<&'a ArrayDiff>,
    schema_type: Option<&'a SchemaType>,
    from_stack: Vec<String>,
    to_stack: Vec<String>,
    /// Resolved marks for the current stacks, per edit type.
    marks_cache: Option<(PatchOpType, Result<Vec<ActiveMark>, String>)>,
    runs: Vec<Run>,
}

impl<'a> Walker<'a> {
    fn side_block(&self, side: Side) -> Option<&'a Value> {
        match side {
            Side::From => self.block.from_value.as_ref(),
            Side::To => self.block.to_value.as_ref(),
        }
    }

    fn open(&mut self, op: PatchOpType, name: &str) {
        if op != PatchOpType::Ins {
            self.from_stack.push(name.to_string());
        }
        if op != PatchOpType::Del {
            self.to_stack.push(name.to_string());
        }
        self.marks_cache = None;
    }

    fn close(&mut self, op: PatchOpType, name: &str) {
        if op != PatchOpType::Ins {
            remove_last(&mut self.from_stack, name);
        }
        if op != PatchOpType::Del {
            remove_last(&mut self.to_stack, name);
        }
        self.marks_cache = None;
    }

    /// Resolve a mark name against the markDefs of `side`, then the
    /// declared decorators. Without a schema any unmatched name is taken
    /// to be a decorator.
    fn resolve_mark(&self, name: &str, side: Side) -> Option<MarkKind> {
        let defs = mark_defs(self.side_block(side));
        if let Some(def) = defs.iter().find(|d| item_key(d) == Some(name)) {
            return Some(MarkKind::Annotation {
                mark_def: def.clone(),
            });
        }
        match self.schema_type {
            Some(t) if !t.is_decorator(name) => None,
            _ => Some(MarkKind::Decorator),
        }
    }

    fn compute_marks(&self, op: PatchOpType) -> Result<Vec<ActiveMark>, String> {
        let mut names: Vec<(&String, SegmentAction, Side)> = Vec::new();
        match op {
            PatchOpType::Eql => {
                for name in &self.to_stack {
                    let state = if self.from_stack.contains(name) {
                        SegmentAction::Unchanged
                    } else {
                        SegmentAction::Added
                    };
                    names.push((name, state, Side::To));
                }
                for name in &self.from_stack {
                    if !self.to_stack.contains(name) {
                        names.push((name, SegmentAction::Removed, Side::From));
                    }
                }
            }
            PatchOpType::Ins => {
                names.extend(self.to_stack.iter().map(|n| (n, SegmentAction::Unchanged, Side::To)));
            }
            PatchOpType::Del => {
                names.extend(self.from_stack.iter().map(|n| (n, SegmentAction::Unchanged, Side::From)));
            }
        }

        let mut marks: Vec<ActiveMark> = Vec::with_capacity(names.len());
        for (name, state, side) in names {
            if marks.iter().any(|m| &m.name == name) {
                continue;
            }
            let kind = self.resolve_mark(name, side).ok_or_else(|| name.clone())?;
            marks.push(ActiveMark {
                name: name.clone(),
                kind,
                state,
            });
        }
        Ok(marks)
    }

    /// The generic diff of the child at `index` on `side`.
    fn child_diff(&self, index: usize, side: Side) -> Option<&'a ItemDiff> {
        self.children_diff?.items.iter().find(|item| match side {
            Side::From => item.from_index == Some(index),
            Side::To => item.to_index == Some(index),
        })
    }

    fn push_char(&mut self, op: PatchOpType, c: char, owner: usize) {
        let side = if op == PatchOpType::Del { Side::From } else { Side::To };
        let cached = matches!(&self.marks_cache, Some((cached_op, _)) if *cached_op == op);
        if !cached {
            self.marks_cache = Some((op, self.compute_marks(op)));
        }
        let Some((_, resolved)) = &self.marks_cache else {
            return;
        };
        let action = segment_action(op);

        let marks = match resolved {
            Ok(marks) => marks.clone(),
            Err(symbol) => {
                let symbol = symbol.clone();
                if let Some(Run::Unknown(last)) = self.runs.last_mut() {
                    if last.action == action && last.symbol == symbol {
                        last.text.push(c);
                        return;
                    }
                }
                warn!(mark = %symbol, "unresolved mark in portable text block");
                self.runs.push(Run::Unknown(UnknownRun {
                    action,
                    text: c.to_string(),
                    symbol,
                }));
                return;
            }
        };

        let child = self.child_diff(owner, side);
        let child_key = children(self.side_block(side))
            .get(owner)
            .map(|v| child_key(v, owner));

        if let Some(Run::Text(last)) = self.runs.last_mut() {
            if last.action == action && last.marks == marks && last.child_key == child_key {
                last.text.push(c);
                return;
            }
        }

        let changed = action != SegmentAction::Unchanged
            || marks.iter().any(|m| m.state != SegmentAction::Unchanged);
        let annotation = if changed {
            child
                .and_then(|item| item.diff.annotation())
                .or(self.block.annotation.as_ref())
                .cloned()
        } else {
            None
        };
        self.runs.push(Run::Text(TextRun {
            action,
            text: c.to_string(),
            marks,
            child_key,
            annotation,
        }));
    }

    fn push_inline(&mut self, op: PatchOpType, key: String) {
        let side = if op == PatchOpType::Del { Side::From } else { Side::To };
        let Some((index, value)) = find_child(children(self.side_block(side)), &key) else {
            warn!(key = %key, "unresolved inline object in portable text block");
            self.runs.push(Run::Unknown(UnknownRun {
                action: segment_action(op),
                text: String::new(),
                symbol: key,
            }));
            return;
        };
        let item = self.child_diff(index, side);
        let action = match op {
            PatchOpType::Ins => DiffAction::Added,
            PatchOpType::Del => DiffAction::Removed,
            PatchOpType::Eql => item.map_or(DiffAction::Unchanged, |i| i.diff.action()),
        };
        let annotation = if action.is_changed() {
            item.and_then(|i| i.diff.annotation())
                .or(self.block.annotation.as_ref())
                .cloned()
        } else {
            None
        };
        self.runs.push(Run::InlineObject(InlineObjectRun {
            action,
            key,
            type_name: type_name(value).map(str::to_string),
            diff: item.map(|i| i.diff.clone()),
            annotation,
        }));
    }
}

fn owner_at(side: &Symbolized, pos: usize) -> usize {
    side.owners.get(pos).copied().unwrap_or_default()
}

/// Compute the reconciled runs of a block diff.
pub(crate) fn reconcile_runs(block: &ObjectDiff, schema_type: Option<&SchemaType>) -> Vec<Run> {
    let from = symbolize(block.from_value.as_ref());
    let to = symbolize(block.to_value.as_ref());
    let patch = diff_tokens(&from.tokens, &to.tokens);

    let mut walker = Walker {
        block,
        children_diff: block.fields.get("children").and_then(Diff::as_array),
        schema_type,
        from_stack: Vec::new(),
        to_stack: Vec::new(),
        marks_cache: None,
        runs: Vec::new(),
    };

    let (mut fi, mut ti) = (0usize, 0usize);
    for (op, tokens) in patch {
        for token in tokens {
            let owner = match op {
                PatchOpType::Del => owner_at(&from, fi),
                _ => owner_at(&to, ti),
            };
            match token {
                Token::MarkStart(name) => walker.open(op, &name),
                Token::MarkEnd(name) => walker.close(op, &name),
                Token::Char(c) => walker.push_char(op, c, owner),
                Token::Inline(key) => walker.push_inline(op, key),
            }
            match op {
                PatchOpType::Eql => {
                    fi += 1;
                    ti += 1;
                }
                PatchOpType::Del => fi += 1,
                PatchOpType::Ins => ti += 1,
            }
        }
    }
    walker.runs
}

/// Block fields a marks-only edit may touch.
const MARK_FIELDS: [&str; 2] = ["children", "markDefs"];

fn item_is_span(item: &ItemDiff) -> bool {
    item.diff.to_value().or(item.diff.from_value()).is_some_and(is_span)
}

/// True when both sides carry the same text and inline objects, so any
/// change is confined to marks. Spans may be split or merged along the
/// way; inline objects and other block fields must be untouched.
pub(crate) fn is_marks_only(block: &ObjectDiff) -> bool {
    if !block.is_changed || block.from_value.is_none() || block.to_value.is_none() {
        return false;
    }
    let other_fields_changed = block
        .fields
        .iter()
        .any(|(name, d)| d.is_changed() && !MARK_FIELDS.contains(&name.as_str()));
    if other_fields_changed {
        return false;
    }
    if let Some(Diff::Array(children)) = block.fields.get("children") {
        if children.items.iter().any(|item| item.diff.is_changed() && !item_is_span(item)) {
            return false;
        }
    }
    let from = symbolize(block.from_value.as_ref());
    let to = symbolize(block.to_value.as_ref());
    from.content().eq(to.content()) && from.tokens != to.tokens
}

/// Strip a block diff down to its mark changes: matched spans keep only
/// their `marks` field, and spans that exist on one side only are dropped
/// since their text is carried by a neighbour on the other side. Inline
/// objects are kept as they are.
pub(crate) fn strip_to_marks(block: &ObjectDiff) -> ObjectDiff {
    let mut out = block.clone();
    let Some(Diff::Array(children)) = out.fields.get_mut("children") else {
        return out;
    };
    children
        .items
        .retain(|item| !item_is_span(item) || (item.from_index.is_some() && item.to_index.is_some()));
    for item in &mut children.items {
        if !item_is_span(item) {
            continue;
        }
        if let Diff::Object(child) = &mut item.diff {
            child.fields.retain(|name, _| name == "marks");
            let changed = child.fields.values().any(Diff::is_changed);
            child.action = if changed { DiffAction::Changed } else { DiffAction::Unchanged };
            child.is_changed = changed;
            if !changed {
                child.annotation = None;
            }
        }
    }
    out
}
