//! Document value helpers.
//!
//! Documents are plain `serde_json::Value` trees. A handful of attributes
//! are reserved: `_id`, `_type`, `_rev` on documents and `_key` on array
//! items.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use structdiff_path::KEY_ATTRIBUTE;

pub const ID_ATTRIBUTE: &str = "_id";
pub const TYPE_ATTRIBUTE: &str = "_type";
pub const REV_ATTRIBUTE: &str = "_rev";

/// Prefix marking the draft variant of a published document id.
pub const DRAFTS_PREFIX: &str = "drafts.";

/// Runtime JSON kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JsonKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl JsonKind {
    pub fn of(value: &Value) -> JsonKind {
        match value {
            Value::Object(_) => JsonKind::Object,
            Value::Array(_) => JsonKind::Array,
            Value::String(_) => JsonKind::String,
            Value::Number(_) => JsonKind::Number,
            Value::Bool(_) => JsonKind::Boolean,
            Value::Null => JsonKind::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonKind::Object => "object",
            JsonKind::Array => "array",
            JsonKind::String => "string",
            JsonKind::Number => "number",
            JsonKind::Boolean => "boolean",
            JsonKind::Null => "null",
        }
    }
}

/// Deep equality where numbers compare by numeric value, so `1` equals `1.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// True for attributes managed by the content store (`_id`, `_key`, ...),
/// which are never declared in schemas.
pub fn is_reserved_attribute(name: &str) -> bool {
    name.starts_with('_')
}

/// The `_type` of an object value.
pub fn type_name(value: &Value) -> Option<&str> {
    value.get(TYPE_ATTRIBUTE).and_then(Value::as_str)
}

/// The `_key` of an array item.
pub fn item_key(value: &Value) -> Option<&str> {
    value.get(KEY_ATTRIBUTE).and_then(Value::as_str)
}

/// True when every item is an object carrying a string `_key`.
pub fn is_keyed_array(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|item| item_key(item).is_some())
}

pub fn is_draft_id(id: &str) -> bool {
    id.starts_with(DRAFTS_PREFIX)
}

pub fn draft_id(id: &str) -> String {
    if is_draft_id(id) {
        id.to_string()
    } else {
        format!("{DRAFTS_PREFIX}{id}")
    }
}

pub fn published_id(id: &str) -> &str {
    id.strip_prefix(DRAFTS_PREFIX).unwrap_or(id)
}

/// The draft and published variants of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<Value>,
}

impl DocumentPair {
    pub fn new(draft: Option<Value>, published: Option<Value>) -> Self {
        Self { draft, published }
    }

    /// The value an editor sees: the draft if one exists, else the published
    /// document.
    pub fn displayed(&self) -> Option<&Value> {
        self.draft.as_ref().or(self.published.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.draft.is_none() && self.published.is_none()
    }

    /// The slot for a document id: the draft for `drafts.` ids, else the
    /// published document.
    pub fn slot(&self, id: &str) -> &Option<Value> {
        if is_draft_id(id) {
            &self.draft
        } else {
            &self.published
        }
    }

    pub fn slot_mut(&mut self, id: &str) -> &mut Option<Value> {
        if is_draft_id(id) {
            &mut self.draft
        } else {
            &mut self.published
        }
    }

    /// The `_rev` of the displayed document.
    pub fn revision(&self) -> Option<&str> {
        self.displayed()
            .and_then(|doc| doc.get(REV_ATTRIBUTE))
            .and_then(Value::as_str)
    }
}
