//! Grouping transactions into chunks.

use std::collections::BTreeSet;
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Transaction;
use crate::value::DocumentPair;

/// The authoring event a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkType {
    Create,
    EditDraft,
    Publish,
    Unpublish,
    DiscardDraft,
    Delete,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Create => "create",
            ChunkType::EditDraft => "editDraft",
            ChunkType::Publish => "publish",
            ChunkType::Unpublish => "unpublish",
            ChunkType::DiscardDraft => "discardDraft",
            ChunkType::Delete => "delete",
        }
    }

    /// Only edits merge with their neighbours.
    fn merges(&self) -> bool {
        *self == ChunkType::EditDraft
    }
}

/// Classify a transaction from the pair before and after it.
pub fn classify(before: &DocumentPair, after: &DocumentPair) -> ChunkType {
    let had_draft = before.draft.is_some();
    let had_published = before.published.is_some();
    let has_draft = after.draft.is_some();
    let has_published = after.published.is_some();

    if before.is_empty() && !after.is_empty() {
        ChunkType::Create
    } else if !before.is_empty() && after.is_empty() {
        ChunkType::Delete
    } else if had_published && !has_published && has_draft {
        ChunkType::Unpublish
    } else if had_draft && !has_draft && has_published {
        if before.published == after.published {
            ChunkType::DiscardDraft
        } else {
            ChunkType::Publish
        }
    } else if !had_published && has_published {
        ChunkType::Publish
    } else {
        ChunkType::EditDraft
    }
}

/// A grouped run of consecutive transactions.
///
/// `id` is the id of the chunk's newest transaction, so the snapshot after
/// a chunk never changes once the chunk exists. `index` counts from the
/// newest loaded chunk (0) backwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub authors: BTreeSet<String>,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub index: usize,
    /// Positions of the chunk's transactions in the timeline's
    /// oldest-first transaction list.
    #[serde(skip)]
    pub(crate) transactions: Range<usize>,
}

impl Chunk {
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

/// Group oldest-first `transactions` with their types into chunks,
/// returned oldest-first with `index` unset.
pub(crate) fn group(
    transactions: &[Transaction],
    types: &[ChunkType],
    window: chrono::Duration,
) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    for (i, (tx, chunk_type)) in transactions.iter().zip(types).enumerate() {
        if let Some(last) = chunks.last_mut() {
            let joins = chunk_type.merges()
                && last.chunk_type == *chunk_type
                && last.authors.len() == 1
                && last.authors.contains(&tx.author)
                && tx.timestamp - last.end_timestamp <= window;
            if joins {
                last.id = tx.id.clone();
                last.end_timestamp = tx.timestamp;
                last.transactions.end = i + 1;
                continue;
            }
        }
        chunks.push(Chunk {
            id: tx.id.clone(),
            chunk_type: *chunk_type,
            authors: BTreeSet::from([tx.author.clone()]),
            start_timestamp: tx.timestamp,
            end_timestamp: tx.timestamp,
            index: 0,
            transactions: i..i + 1,
        });
    }
    chunks
}
