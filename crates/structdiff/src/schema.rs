//! Schema registry.
//!
//! The diff engine consults declared types for two things: routing
//! rich-text blocks through the portable-text reconciler, and flagging
//! values whose shape disagrees with the declaration. A missing schema is
//! never fatal; diffing proceeds structurally.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::value::{is_reserved_attribute, type_name, JsonKind};

/// Type name conventionally used for portable-text blocks.
pub const BLOCK_TYPE_NAME: &str = "block";
/// Type name of text spans inside a block.
pub const SPAN_TYPE_NAME: &str = "span";

/// Storage kind of a schema type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    Object,
    Array,
    String,
    Number,
    Boolean,
    /// A portable-text block: an object with `children` and `markDefs`.
    Block,
    /// A reference to another document, stored as an object.
    Reference,
    /// Accepts any value without flagging.
    Any,
}

/// A declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: TypeKind,
    /// Object fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    /// Array member types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub of: Vec<SchemaType>,
    /// Block decorators (mark names with no extra data, e.g. `strong`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    /// Block annotation types (mark definitions, e.g. `link`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<SchemaType>,
}

/// A named object field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub field_type: SchemaType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: SchemaType) -> Self {
        Self {
            name: name.into(),
            title: None,
            field_type,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The display title, falling back to the field name.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

impl SchemaType {
    fn bare(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            title: None,
            kind,
            fields: Vec::new(),
            of: Vec::new(),
            decorators: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn string() -> Self {
        Self::bare("string", TypeKind::String)
    }

    pub fn number() -> Self {
        Self::bare("number", TypeKind::Number)
    }

    pub fn boolean() -> Self {
        Self::bare("boolean", TypeKind::Boolean)
    }

    pub fn any() -> Self {
        Self::bare("any", TypeKind::Any)
    }

    pub fn reference() -> Self {
        Self::bare("reference", TypeKind::Reference)
    }

    pub fn object(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Self::bare(name, TypeKind::Object)
        }
    }

    pub fn array(of: Vec<SchemaType>) -> Self {
        Self {
            of,
            ..Self::bare("array", TypeKind::Array)
        }
    }

    /// A portable-text block type with the given decorators, annotation
    /// types, and inline object types.
    pub fn block(
        decorators: Vec<String>,
        annotations: Vec<SchemaType>,
        inline_types: Vec<SchemaType>,
    ) -> Self {
        Self {
            decorators,
            annotations,
            of: inline_types,
            ..Self::bare(BLOCK_TYPE_NAME, TypeKind::Block)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// True if a value of `kind` is a valid instance of this type.
    pub fn accepts(&self, kind: JsonKind) -> bool {
        match self.kind {
            TypeKind::Object | TypeKind::Block | TypeKind::Reference => kind == JsonKind::Object,
            TypeKind::Array => kind == JsonKind::Array,
            TypeKind::String => kind == JsonKind::String,
            TypeKind::Number => kind == JsonKind::Number,
            TypeKind::Boolean => kind == JsonKind::Boolean,
            TypeKind::Any => true,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True if `name` may appear on values of this type without being
    /// flagged. Blocks, references and untyped values are open.
    pub fn allows_field(&self, name: &str) -> bool {
        match self.kind {
            TypeKind::Object => is_reserved_attribute(name) || self.field(name).is_some(),
            _ => true,
        }
    }

    /// The declared array member type matching `item`: by `_type` name
    /// first, then by storage kind.
    pub fn item_type(&self, item: &Value) -> Option<&SchemaType> {
        if let Some(name) = type_name(item) {
            if let Some(t) = self.of.iter().find(|t| t.name == name) {
                return Some(t);
            }
        }
        let kind = JsonKind::of(item);
        self.of.iter().find(|t| t.accepts(kind) && type_name(item).is_none())
    }

    /// True if values of this type should be diffed as portable text.
    pub fn is_portable_text(&self) -> bool {
        self.kind == TypeKind::Block || (self.kind == TypeKind::Object && self.name == BLOCK_TYPE_NAME)
    }

    pub fn is_decorator(&self, mark: &str) -> bool {
        self.decorators.iter().any(|d| d == mark)
    }

    /// The declared inline object type for a block child `_type`.
    pub fn inline_type(&self, name: &str) -> Option<&SchemaType> {
        self.of.iter().find(|t| t.name == name)
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// Registry of document types, keyed by type name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    types: IndexMap<String, SchemaType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a JSON array of type definitions.
    pub fn from_json(value: Value) -> Result<Self, SchemaError> {
        let types: Vec<SchemaType> = serde_json::from_value(value)?;
        let mut schema = Schema::new();
        for t in types {
            if schema.types.contains_key(&t.name) {
                return Err(SchemaError::DuplicateType(t.name));
            }
            schema.register(t);
        }
        Ok(schema)
    }

    pub fn from_json_str(src: &str) -> Result<Self, SchemaError> {
        Self::from_json(serde_json::from_str(src)?)
    }

    /// Register a type, replacing any previous type with the same name.
    pub fn register(&mut self, schema_type: SchemaType) {
        self.types.insert(schema_type.name.clone(), schema_type);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaType> {
        self.types.get(name)
    }

    /// The declared type of a document, resolved from its `_type`.
    pub fn type_of(&self, document: &Value) -> Option<&SchemaType> {
        type_name(document).and_then(|name| self.get(name))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
