//! Mutation and patch operation types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use structdiff_path::Path;

use crate::value::ID_ATTRIBUTE;

/// Where `Insert` places its items relative to the addressed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertPosition {
    Before,
    After,
    Replace,
}

/// One operation of a document patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PatchOp {
    /// Write `value` at `path`, creating missing intermediate objects.
    Set { path: Path, value: Value },
    /// Like `Set`, but only when nothing exists at `path`.
    SetIfMissing { path: Path, value: Value },
    /// Remove the value at `path`. Missing paths are ignored.
    Unset { path: Path },
    /// Insert `items` relative to the array item at `path`.
    Insert {
        position: InsertPosition,
        path: Path,
        items: Vec<Value>,
    },
    Inc { path: Path, amount: f64 },
    Dec { path: Path, amount: f64 },
}

impl PatchOp {
    pub fn path(&self) -> &Path {
        match self {
            PatchOp::Set { path, .. }
            | PatchOp::SetIfMissing { path, .. }
            | PatchOp::Unset { path }
            | PatchOp::Insert { path, .. }
            | PatchOp::Inc { path, .. }
            | PatchOp::Dec { path, .. } => path,
        }
    }

    pub fn set(path: Path, value: Value) -> Self {
        PatchOp::Set { path, value }
    }

    pub fn unset(path: Path) -> Self {
        PatchOp::Unset { path }
    }
}

/// A patch targeting one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    pub id: String,
    pub ops: Vec<PatchOp>,
}

/// A write against the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutation {
    Create(Value),
    CreateIfNotExists(Value),
    CreateOrReplace(Value),
    Delete { id: String },
    Patch(DocumentPatch),
}

impl Mutation {
    /// The id of the document this mutation writes, if it names one.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Mutation::Create(doc) | Mutation::CreateIfNotExists(doc) | Mutation::CreateOrReplace(doc) => {
                doc.get(ID_ATTRIBUTE).and_then(Value::as_str)
            }
            Mutation::Delete { id } => Some(id),
            Mutation::Patch(patch) => Some(&patch.id),
        }
    }

    pub fn patch(id: impl Into<String>, ops: Vec<PatchOp>) -> Self {
        Mutation::Patch(DocumentPatch { id: id.into(), ops })
    }
}
