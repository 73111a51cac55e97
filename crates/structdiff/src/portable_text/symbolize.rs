//! Token projection of a block.
//!
//! Each side of a block is flattened into one token sequence: a span
//! contributes its marks as paired start/end tokens around one token per
//! character, and any other child contributes a single inline token
//! carrying its key. Tokens are structured values, so user text can never
//! be mistaken for a boundary and a diff segment can never split one.

use serde_json::Value;

use crate::schema::SPAN_TYPE_NAME;
use crate::value::{item_key, type_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    MarkStart(String),
    MarkEnd(String),
    Char(char),
    Inline(String),
}

impl Token {
    /// True for tokens that make up the visible content of a block.
    pub fn is_content(&self) -> bool {
        matches!(self, Token::Char(_) | Token::Inline(_))
    }
}

/// A tokenized block side. `owners[i]` is the index of the child that
/// produced `tokens[i]`.
#[derive(Debug, Default)]
pub(crate) struct Symbolized {
    pub tokens: Vec<Token>,
    pub owners: Vec<usize>,
}

impl Symbolized {
    fn push(&mut self, token: Token, owner: usize) {
        self.tokens.push(token);
        self.owners.push(owner);
    }

    /// The content tokens only, used to detect marks-only edits.
    pub fn content(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.is_content())
    }
}

/// The `children` of a block value, empty when missing.
pub(crate) fn children(block: Option<&Value>) -> &[Value] {
    block
        .and_then(|b| b.get("children"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// The `markDefs` of a block value, empty when missing.
pub(crate) fn mark_defs(block: Option<&Value>) -> &[Value] {
    block
        .and_then(|b| b.get("markDefs"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// True for text spans. Untyped children with a string `text` count too.
pub(crate) fn is_span(child: &Value) -> bool {
    match type_name(child) {
        Some(name) => name == SPAN_TYPE_NAME,
        None => child.get("text").is_some_and(Value::is_string),
    }
}

pub(crate) fn span_text(child: &Value) -> &str {
    child.get("text").and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn span_marks(child: &Value) -> Vec<&str> {
    child
        .get("marks")
        .and_then(Value::as_array)
        .map(|marks| marks.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Identifier of a child: its `_key`, or `#<index>` for unkeyed children.
pub(crate) fn child_key(child: &Value, index: usize) -> String {
    match item_key(child) {
        Some(key) => key.to_string(),
        None => format!("#{index}"),
    }
}

/// Find a child by the identifier produced by [`child_key`].
pub(crate) fn find_child<'a>(children: &'a [Value], key: &str) -> Option<(usize, &'a Value)> {
    children
        .iter()
        .enumerate()
        .find(|(i, child)| child_key(child, *i) == key)
}

pub(crate) fn symbolize(block: Option<&Value>) -> Symbolized {
    let mut out = Symbolized::default();
    for (i, child) in children(block).iter().enumerate() {
        if is_span(child) {
            let marks = span_marks(child);
            for mark in &marks {
                out.push(Token::MarkStart(mark.to_string()), i);
            }
            for c in span_text(child).chars() {
                out.push(Token::Char(c), i);
            }
            for mark in marks.iter().rev() {
                out.push(Token::MarkEnd(mark.to_string()), i);
            }
        } else {
            out.push(Token::Inline(child_key(child, i)), i);
        }
    }
    out
}
