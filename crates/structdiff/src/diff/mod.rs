//! Structural diff engine.
//!
//! [`diff`] compares two document values and returns a typed [`Diff`] tree.
//! Objects recurse over the union of their keys, arrays match items by
//! `_key` before falling back to position, strings produce character
//! segments, and everything else compares by value.
//!
//! [`diff_document`] additionally routes every portable-text block it finds
//! through the reconciler in [`crate::portable_text`].

mod array;
mod attribution;
mod engine;
pub mod types;

use serde::Serialize;
use serde_json::Value;
use structdiff_path::Path;

pub use attribution::Attribution;
pub use types::*;

use crate::portable_text::{reconcile_block, PortableTextDiff};
use crate::schema::{Schema, SchemaType};
use engine::{locate, Differ};

/// Options threaded through one diff computation.
#[derive(Debug, Clone)]
pub struct DiffOptions<'s> {
    /// Registry used to resolve the document type when none is given.
    pub schema: Option<&'s Schema>,
    /// Attribution stamped onto every changed node without a per-path
    /// entry in `attribution`.
    pub annotation: Option<Annotation>,
    /// Per-path attribution, consulted before `annotation`.
    pub attribution: Option<&'s Attribution>,
    /// Route portable-text blocks through the reconciler.
    pub portable_text: bool,
}

impl Default for DiffOptions<'_> {
    fn default() -> Self {
        Self {
            schema: None,
            annotation: None,
            attribution: None,
            portable_text: true,
        }
    }
}

impl<'s> DiffOptions<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: &'s Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn with_attribution(mut self, attribution: &'s Attribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    pub fn with_portable_text(mut self, enabled: bool) -> Self {
        self.portable_text = enabled;
        self
    }

    fn root_type(&self, from: Option<&Value>, to: Option<&Value>) -> Option<&'s SchemaType> {
        let schema = self.schema?;
        to.and_then(|v| schema.type_of(v))
            .or_else(|| from.and_then(|v| schema.type_of(v)))
    }
}

/// Diff two values. An absent side is treated as "not present", so
/// `diff(None, Some(v), ..)` reports `v` as added.
///
/// When `schema_type` is `None` the type is looked up in
/// `options.schema` by the document's `_type`.
pub fn diff<'s>(
    from: Option<&Value>,
    to: Option<&Value>,
    schema_type: Option<&'s SchemaType>,
    options: &DiffOptions<'s>,
) -> Diff {
    let schema_type = schema_type.or_else(|| options.root_type(from, to));
    Differ::new(options).diff(&Path::root(), from, to, schema_type, true)
}

/// Diff two present values with default options.
pub fn diff_values(from: &Value, to: &Value) -> Diff {
    diff(Some(from), Some(to), None, &DiffOptions::default())
}

/// A reconciled portable-text block located in a document diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDiff {
    pub path: Path,
    pub diff: PortableTextDiff,
}

/// A document diff with its portable-text blocks reconciled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDiff {
    pub root: Diff,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockDiff>,
}

impl DocumentDiff {
    pub fn is_changed(&self) -> bool {
        self.root.is_changed()
    }

    /// The reconciled block at `path`, if that path holds a block.
    pub fn block(&self, path: &Path) -> Option<&PortableTextDiff> {
        self.blocks.iter().find(|b| &b.path == path).map(|b| &b.diff)
    }
}

/// Diff two documents and reconcile every portable-text block found.
pub fn diff_document<'s>(
    from: Option<&Value>,
    to: Option<&Value>,
    schema_type: Option<&'s SchemaType>,
    options: &DiffOptions<'s>,
) -> DocumentDiff {
    let schema_type = schema_type.or_else(|| options.root_type(from, to));
    let mut differ = Differ::new(options);
    let root = differ.diff(&Path::root(), from, to, schema_type, true);

    let mut blocks = Vec::with_capacity(differ.blocks.len());
    for site in differ.blocks {
        let Some(object) = locate(&root, &site.trail).and_then(Diff::as_object) else {
            continue;
        };
        blocks.push(BlockDiff {
            diff: reconcile_block(object, site.schema_type),
            path: site.path,
        });
    }
    DocumentDiff { root, blocks }
}
