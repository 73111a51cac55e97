//! Document revision timeline.
//!
//! A [`Timeline`] holds the loaded part of one document's history: raw
//! transactions (oldest first), the snapshot they start from, and the
//! chunks derived from them (newest first, `index` 0 = newest).
//!
//! The timeline performs no I/O. A fetch is a pair of calls:
//! [`Timeline::begin_fetch`] hands out a [`FetchRequest`], and the result
//! comes back through [`Timeline::complete_fetch`] or
//! [`Timeline::fail_fetch`]. Only the most recent request is accepted;
//! a response to a superseded request is dropped.

mod chunk;
mod time_ref;
mod transaction;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

pub use chunk::{classify, Chunk, ChunkType};
pub use time_ref::{TimeRef, LAST_PUBLISHED, LATEST};
pub use transaction::Transaction;

use crate::config::HistoryConfig;
use crate::error::HistoryError;
use crate::value::{published_id, DocumentPair};

/// Loading state of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimelineState {
    /// Nothing loaded yet.
    Empty,
    /// A backward page fetch is in flight.
    LoadingMore,
    /// At least one chunk is loaded and older history may exist.
    Loaded,
    /// The document's origin has been reached.
    Exhausted,
}

/// A request for one page of older history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: u64,
    pub document_id: String,
    /// Opaque cursor from the previous page; `None` starts from now.
    pub before: Option<String>,
    pub limit: usize,
}

/// One page of history, as returned by the history source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    /// Transactions of this page, oldest first.
    pub transactions: Vec<Transaction>,
    /// The document pair as it was before the page's first transaction.
    pub base: DocumentPair,
    /// True when the page reaches the document's first transaction.
    pub exhausted: bool,
    /// Cursor for the next older page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// One chunk's share of a replayed span of transactions.
#[derive(Debug, Clone)]
pub struct ChunkStep<'a> {
    pub chunk: &'a Chunk,
    /// The newest transaction of the share.
    pub last: &'a Transaction,
    pub before: DocumentPair,
    pub after: DocumentPair,
}

/// Outcome of resolving a [`TimeRef`] against the loaded chunks.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Found(&'a Chunk),
    /// The reference may point at history that is not loaded yet.
    NeedsMore,
    /// The reference names nothing in the document's history.
    NotFound,
}

impl<'a> Resolution<'a> {
    pub fn chunk(&self) -> Option<&'a Chunk> {
        match self {
            Resolution::Found(chunk) => Some(chunk),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Timeline {
    document_id: String,
    config: HistoryConfig,
    base: DocumentPair,
    transactions: Vec<Transaction>,
    /// Newest first.
    chunks: Vec<Chunk>,
    exhausted: bool,
    cursor: Option<String>,
    pending: Option<u64>,
    next_request: u64,
}

impl Timeline {
    pub fn new(document_id: &str, config: HistoryConfig) -> Self {
        Self {
            document_id: published_id(document_id).to_string(),
            config,
            base: DocumentPair::default(),
            transactions: Vec::new(),
            chunks: Vec::new(),
            exhausted: false,
            cursor: None,
            pending: None,
            next_request: 0,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn state(&self) -> TimelineState {
        if self.pending.is_some() {
            TimelineState::LoadingMore
        } else if self.exhausted {
            TimelineState::Exhausted
        } else if self.chunks.is_empty() {
            TimelineState::Empty
        } else {
            TimelineState::Loaded
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Loaded chunks, newest first.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Loaded transactions, oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The transactions folded into `chunk`, oldest first.
    pub fn chunk_transactions(&self, chunk: &Chunk) -> &[Transaction] {
        self.transactions.get(chunk.transactions.clone()).unwrap_or(&[])
    }

    /// True if fewer than `count` chunks are loaded and older history may
    /// still exist.
    pub fn needs_more(&self, count: usize) -> bool {
        !self.exhausted && self.chunks.len() < count
    }

    // ── Fetching ──────────────────────────────────────────────────────────

    /// Start a fetch of the next older page. Returns `None` once the
    /// history is exhausted. A request issued while another is pending
    /// supersedes it.
    pub fn begin_fetch(&mut self) -> Option<FetchRequest> {
        if self.exhausted {
            return None;
        }
        self.next_request += 1;
        let id = self.next_request;
        if let Some(stale) = self.pending.replace(id) {
            debug!(stale, id, "superseding pending history fetch");
        }
        debug!(id, document = %self.document_id, before = ?self.cursor, "fetching history page");
        Some(FetchRequest {
            id,
            document_id: self.document_id.clone(),
            before: self.cursor.clone(),
            limit: self.config.page_size,
        })
    }

    /// Apply a fetched page. Returns `Ok(false)` when the response belongs
    /// to a superseded request and was dropped.
    pub fn complete_fetch(&mut self, request_id: u64, page: HistoryPage) -> Result<bool, HistoryError> {
        if self.pending != Some(request_id) {
            debug!(request_id, "dropping stale history page");
            return Ok(false);
        }
        self.pending = None;

        let known: HashSet<&str> = self.transactions.iter().map(|t| t.id.as_str()).collect();
        let mut merged: Vec<Transaction> = page
            .transactions
            .into_iter()
            .filter(|t| !known.contains(t.id.as_str()))
            .collect();
        let added = merged.len();
        merged.extend(self.transactions.iter().cloned());
        merged.sort_by_key(|t| t.timestamp);

        let chunks = self.derive(&page.base, &merged)?;
        self.base = page.base;
        self.transactions = merged;
        self.chunks = chunks;
        self.cursor = page.next_cursor;
        if page.exhausted {
            info!(document = %self.document_id, chunks = self.chunks.len(), "history exhausted");
            self.exhausted = true;
        }
        debug!(request_id, added, chunks = self.chunks.len(), "history page applied");
        Ok(true)
    }

    /// Record a failed fetch. The timeline keeps what it had and the next
    /// fetch retries from the same cursor.
    pub fn fail_fetch(&mut self, request_id: u64) {
        if self.pending == Some(request_id) {
            self.pending = None;
        }
    }

    /// Append a transaction observed on the live document. Chunks are
    /// re-derived; ids of existing chunks other than the newest one are
    /// unaffected.
    pub fn append_live(&mut self, transaction: Transaction) -> Result<(), HistoryError> {
        if self.transactions.iter().any(|t| t.id == transaction.id) {
            return Ok(());
        }
        let mut merged = self.transactions.clone();
        merged.push(transaction);
        merged.sort_by_key(|t| t.timestamp);
        self.chunks = self.derive(&self.base, &merged)?;
        self.transactions = merged;
        Ok(())
    }

    /// Fold `transactions` onto `base`, classify each one and group them
    /// into newest-first chunks.
    fn derive(&self, base: &DocumentPair, transactions: &[Transaction]) -> Result<Vec<Chunk>, HistoryError> {
        let mut pair = base.clone();
        let mut types = Vec::with_capacity(transactions.len());
        for tx in transactions {
            let before = pair.clone();
            Self::apply(tx, &mut pair)?;
            let chunk_type = classify(&before, &pair);
            if self.config.enable_trace {
                trace!(tx = %tx.id, author = %tx.author, kind = chunk_type.as_str(), "folded transaction");
            }
            types.push(chunk_type);
        }
        let mut chunks = chunk::group(transactions, &types, self.config.chunk_window());
        chunks.reverse();
        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.index = index;
        }
        Ok(chunks)
    }

    // ── Resolution ────────────────────────────────────────────────────────

    fn not_loaded(&self) -> Resolution<'_> {
        if self.exhausted {
            Resolution::NotFound
        } else {
            Resolution::NeedsMore
        }
    }

    /// Resolve a reference against the loaded chunks.
    pub fn resolve(&self, time_ref: &TimeRef) -> Resolution<'_> {
        let found = match time_ref {
            TimeRef::Latest => self.chunks.first(),
            TimeRef::LastPublished => self.chunks.iter().find(|c| c.chunk_type == ChunkType::Publish),
            TimeRef::Id(id) => self.chunk_by_id(id),
            TimeRef::Time(t) => match self.chunks.last() {
                Some(oldest) if *t < oldest.start_timestamp => None,
                _ => self.chunks.iter().find(|c| c.start_timestamp <= *t),
            },
        };
        let resolution = match found {
            Some(chunk) => Resolution::Found(chunk),
            None => self.not_loaded(),
        };
        debug!(time_ref = %time_ref, resolution = ?resolution.chunk().map(|c| &c.id), "resolved time ref");
        resolution
    }

    /// The chunk with this id, or the chunk containing a transaction with
    /// this id.
    pub fn chunk_by_id(&self, id: &str) -> Option<&Chunk> {
        if let Some(chunk) = self.chunks.iter().find(|c| c.id == id) {
            return Some(chunk);
        }
        let position = self.transactions.iter().position(|t| t.id == id)?;
        self.chunks.iter().find(|c| c.transactions.contains(&position))
    }

    /// Position of a loaded transaction in the oldest-first list.
    pub fn transaction_position(&self, id: &str) -> Option<usize> {
        self.transactions.iter().position(|t| t.id == id)
    }

    // ── Snapshots ─────────────────────────────────────────────────────────

    fn apply(tx: &Transaction, pair: &mut DocumentPair) -> Result<(), HistoryError> {
        tx.apply(pair).map_err(|source| HistoryError::Apply {
            id: tx.id.clone(),
            source,
        })
    }

    /// The document pair after the `count` oldest loaded transactions.
    pub fn replay(&self, count: usize) -> Result<DocumentPair, HistoryError> {
        let mut pair = self.base.clone();
        for tx in self.transactions.iter().take(count) {
            Self::apply(tx, &mut pair)?;
        }
        Ok(pair)
    }

    /// Replay the transactions at positions `start..end`, split by chunk,
    /// oldest first.
    pub fn replay_chunks(&self, start: usize, end: usize) -> Result<Vec<ChunkStep<'_>>, HistoryError> {
        let mut pair = self.replay(start)?;
        let mut steps = Vec::new();
        for chunk in self.chunks.iter().rev() {
            let share = chunk.transactions.start.max(start)..chunk.transactions.end.min(end);
            let txs = self.transactions.get(share).unwrap_or(&[]);
            let Some(last) = txs.last() else { continue };
            let before = pair.clone();
            for tx in txs {
                Self::apply(tx, &mut pair)?;
            }
            steps.push(ChunkStep {
                chunk,
                last,
                before,
                after: pair.clone(),
            });
        }
        Ok(steps)
    }

    /// The document pair right after `chunk`'s last transaction.
    pub fn snapshot_at(&self, chunk: &Chunk) -> Result<DocumentPair, HistoryError> {
        self.replay(chunk.transactions.end)
    }

    /// The document pair right before `chunk`'s first transaction.
    pub fn snapshot_before(&self, chunk: &Chunk) -> Result<DocumentPair, HistoryError> {
        self.replay(chunk.transactions.start)
    }

    /// The document pair after every loaded transaction.
    pub fn latest_snapshot(&self) -> Result<DocumentPair, HistoryError> {
        self.replay(self.transactions.len())
    }
}
