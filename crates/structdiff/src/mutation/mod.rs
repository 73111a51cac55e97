//! Document mutations.
//!
//! History records carry the mutations a transaction performed. Folding
//! them onto a [`DocumentPair`](crate::value::DocumentPair) reconstructs
//! the document at any point of its history.

pub mod apply;
pub mod types;

pub use apply::{apply_mutation, apply_op, apply_ops};
pub use types::{DocumentPatch, InsertPosition, Mutation, PatchOp};
