//! The history controller of one document pane.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::source::{DocumentEvent, HistorySource};
use crate::config::HistoryConfig;
use crate::diff::{diff, diff_document, Annotation, Attribution, DiffOptions, DocumentDiff};
use crate::error::HistoryError;
use crate::mutation::Mutation;
use crate::schema::Schema;
use crate::timeline::{Chunk, Resolution, TimeRef, Timeline};
use crate::value::{draft_id, DocumentPair, ID_ATTRIBUTE, REV_ATTRIBUTE};

/// The two chunks a range resolved to. `rev: None` is the live document.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRange {
    pub since: Option<Chunk>,
    pub rev: Option<Chunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Endpoint {
    Chunk(String),
    /// The live document at a given event count.
    Current(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RangeKey {
    since: String,
    rev: Endpoint,
}

/// Selection state and lazily computed diffs over a [`Timeline`].
///
/// The controller exclusively owns its timeline. Every operation that
/// fetches takes `&mut self`, so fetches for one pane never overlap; if a
/// pending `update` future is dropped, the next fetch supersedes it.
pub struct HistoryController {
    timeline: Timeline,
    source: Arc<dyn HistorySource>,
    schema: Arc<Schema>,
    cancel: CancellationToken,
    closed: bool,
    since: Option<TimeRef>,
    rev: Option<TimeRef>,
    /// The transaction that ended each end's chunk when the selection
    /// first resolved. Live edits merging into that chunk stay outside
    /// the selection.
    since_pin: Option<String>,
    rev_pin: Option<String>,
    current: Option<DocumentPair>,
    version: u64,
    load_more: bool,
    error: Option<HistoryError>,
    memo: HashMap<RangeKey, Arc<DocumentDiff>>,
}

impl HistoryController {
    pub fn new(
        document_id: &str,
        source: Arc<dyn HistorySource>,
        schema: Arc<Schema>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            timeline: Timeline::new(document_id, config),
            source,
            schema,
            cancel: CancellationToken::new(),
            closed: false,
            since: None,
            rev: None,
            since_pin: None,
            rev_pin: None,
            current: None,
            version: 0,
            load_more: false,
            error: None,
            memo: HashMap::new(),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn since_ref(&self) -> Option<&TimeRef> {
        self.since.as_ref()
    }

    pub fn rev_ref(&self) -> Option<&TimeRef> {
        self.rev.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.timeline.is_loading()
    }

    /// The last fetch failure, cleared by the next successful fetch.
    pub fn error(&self) -> Option<&HistoryError> {
        self.error.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.cancel.is_cancelled()
    }

    /// A token that tears the controller down when cancelled, usable while
    /// an `update` is awaiting.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel any in-flight fetch and release cached diffs.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.closed = true;
        self.memo.clear();
    }

    fn ensure_open(&self) -> Result<(), HistoryError> {
        if self.is_closed() {
            Err(HistoryError::Closed)
        } else {
            Ok(())
        }
    }

    // ── Fetching ──────────────────────────────────────────────────────────

    /// Fetch one older page. Returns whether new chunks were loaded.
    async fn fetch_once(&mut self) -> Result<bool, HistoryError> {
        let Some(request) = self.timeline.begin_fetch() else {
            return Ok(false);
        };
        let source = Arc::clone(&self.source);
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.timeline.fail_fetch(request.id);
                self.closed = true;
                debug!(id = request.id, "history fetch cancelled");
                return Err(HistoryError::Cancelled);
            }
            result = source.fetch_page(&request) => result,
        };

        let loaded = self.timeline.len();
        let outcome = match result {
            Ok(page) => self.timeline.complete_fetch(request.id, page),
            Err(err) => {
                self.timeline.fail_fetch(request.id);
                Err(err)
            }
        };
        match outcome {
            Ok(_) => {
                self.error = None;
                Ok(self.timeline.len() > loaded)
            }
            Err(err) => {
                warn!(error = %err, document = %self.timeline.document_id(), "history fetch failed");
                self.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Make sure at least `fetch_at_least` chunks are loaded and that the
    /// selected range resolves, fetching older pages as needed. A no-op
    /// when both already hold.
    pub async fn update(&mut self, fetch_at_least: usize) -> Result<(), HistoryError> {
        self.ensure_open()?;
        let target = if self.load_more {
            fetch_at_least.max(self.timeline.len() + 1)
        } else {
            fetch_at_least
        };
        while self.timeline.needs_more(target) {
            if !self.fetch_once().await? && !self.timeline.is_exhausted() {
                debug!("history page added no chunks");
                break;
            }
        }
        self.load_more = false;
        self.load_for_range().await?;
        self.pin_range();
        Ok(())
    }

    /// Fetch older pages until the selected range resolves, the history
    /// is exhausted, or the configured number of rounds is spent.
    async fn load_for_range(&mut self) -> Result<(), HistoryError> {
        let mut rounds = 0;
        while self.range_needs_more() && rounds < self.timeline.config().max_fetch_rounds {
            rounds += 1;
            if !self.fetch_once().await? && self.timeline.is_exhausted() {
                break;
            }
        }
        Ok(())
    }

    /// Toggle whether the next `update` loads one more page than it
    /// strictly needs.
    pub fn set_load_more(&mut self, load_more: bool) {
        self.load_more = load_more;
    }

    pub fn load_more(&self) -> bool {
        self.load_more
    }

    // ── Range selection ───────────────────────────────────────────────────

    /// Select a new range and load enough history to resolve it. Returns
    /// `None` when a reference cannot be resolved.
    pub async fn set_range(
        &mut self,
        since: Option<TimeRef>,
        rev: Option<TimeRef>,
    ) -> Result<Option<ResolvedRange>, HistoryError> {
        self.ensure_open()?;
        self.since = since;
        self.rev = rev.filter(|r| *r != TimeRef::Latest);
        self.since_pin = None;
        self.rev_pin = None;
        debug!(since = ?self.since, rev = ?self.rev, "range selected");
        self.load_for_range().await?;
        self.pin_range();
        Ok(self.range())
    }

    /// Pin each resolved end of the range that is not pinned yet.
    fn pin_range(&mut self) {
        if self.since_pin.is_none() {
            self.since_pin = self.since_chunk().map(|chunk| chunk.id);
        }
        if self.rev_pin.is_none() {
            self.rev_pin = self.rev_chunk().map(|chunk| chunk.id);
        }
    }

    /// The transaction closing `chunk` for the current selection: the
    /// pinned one while it still lies in `chunk`, else the chunk's newest.
    /// Returns its id and the number of transactions up to and including
    /// it.
    fn boundary(&self, chunk: &Chunk, pin: Option<&str>) -> (String, usize) {
        pin.and_then(|id| {
            let position = self.timeline.transaction_position(id)?;
            chunk
                .transactions
                .contains(&position)
                .then(|| (id.to_string(), position + 1))
        })
        .unwrap_or_else(|| (chunk.id.clone(), chunk.transactions.end))
    }

    fn range_needs_more(&self) -> bool {
        [&self.since, &self.rev]
            .into_iter()
            .flatten()
            .any(|r| self.timeline.resolve(r) == Resolution::NeedsMore)
    }

    fn resolve_ref(&self, time_ref: Option<&TimeRef>) -> Option<Option<Chunk>> {
        match time_ref {
            None => Some(None),
            Some(r) => self.timeline.resolve(r).chunk().cloned().map(Some),
        }
    }

    /// The selected range against the loaded chunks, or `None` if either
    /// end does not resolve.
    pub fn range(&self) -> Option<ResolvedRange> {
        Some(ResolvedRange {
            since: self.resolve_ref(self.since.as_ref())?,
            rev: self.resolve_ref(self.rev.as_ref())?,
        })
    }

    fn rev_chunk(&self) -> Option<Chunk> {
        self.resolve_ref(self.rev.as_ref()).flatten()
    }

    fn since_chunk(&self) -> Option<Chunk> {
        self.resolve_ref(self.since.as_ref()).flatten()
    }

    /// The range that results from picking `chunk` as the new "since".
    /// A since at or after the current rev moves rev back to current.
    pub fn find_range_for_new_since(&self, chunk: &Chunk) -> (Option<TimeRef>, Option<TimeRef>) {
        let since = Some(TimeRef::Id(chunk.id.clone()));
        match self.rev_chunk() {
            Some(rev) if chunk.index <= rev.index => (since, None),
            _ => (since, self.rev.clone()),
        }
    }

    /// The range that results from picking `chunk` as the new "rev".
    /// Picking the newest chunk selects current; a since at or after the
    /// new rev moves to the chunk just before it.
    pub fn find_range_for_new_rev(&self, chunk: &Chunk) -> (Option<TimeRef>, Option<TimeRef>) {
        let rev = (chunk.index != 0).then(|| TimeRef::Id(chunk.id.clone()));
        let since = match self.since_chunk() {
            Some(since) if since.index <= chunk.index => self
                .timeline
                .chunk(chunk.index + 1)
                .map(|older| TimeRef::Id(older.id.clone())),
            _ => self.since.clone(),
        };
        (since, rev)
    }

    /// True when rev points at a historical revision rather than the live
    /// document.
    pub fn on_older_revision(&self) -> bool {
        self.rev.is_some()
    }

    /// True when a "since" is selected, so a changes panel has something
    /// to show.
    pub fn changes_panel_active(&self) -> bool {
        self.since.is_some()
    }

    // ── Snapshots and diffs ───────────────────────────────────────────────

    fn current_pair(&self) -> Result<DocumentPair, HistoryError> {
        match &self.current {
            Some(pair) => Ok(pair.clone()),
            None => self.timeline.latest_snapshot(),
        }
    }

    fn rev_pair(&self, rev: Option<(String, usize)>) -> Result<DocumentPair, HistoryError> {
        match rev {
            Some((_, end)) => self.timeline.replay(end),
            None => self.current_pair(),
        }
    }

    fn rev_boundary(&self, range: &ResolvedRange) -> Option<(String, usize)> {
        range
            .rev
            .as_ref()
            .map(|chunk| self.boundary(chunk, self.rev_pin.as_deref()))
    }

    /// The document as of rev: the historical snapshot, or the live value.
    pub fn displayed(&self) -> Option<Value> {
        let range = self.range()?;
        let pair = self.rev_pair(self.rev_boundary(&range)).ok()?;
        pair.displayed().cloned()
    }

    /// Attribution for changes the loaded history cannot account for,
    /// such as a live snapshot that arrived without its transaction.
    fn fallback_annotation(&self, range: &ResolvedRange) -> Option<Annotation> {
        let chunk = range.rev.as_ref().or(self.timeline.chunk(0))?;
        let last = self.timeline.chunk_transactions(chunk).last()?;
        Some(Annotation::new(last.author.clone(), chunk.end_timestamp).with_chunk(chunk.id.clone()))
    }

    /// Credit every change made by the transactions at `start..end` to the
    /// chunk that made it, newer chunks overriding older ones.
    fn attribution(&self, start: usize, end: usize) -> Result<Attribution, HistoryError> {
        let options = DiffOptions::new()
            .with_schema(&self.schema)
            .with_portable_text(false);
        let mut attribution = Attribution::new();
        for step in self.timeline.replay_chunks(start, end)? {
            let annotation = Annotation::new(step.last.author.clone(), step.last.timestamp)
                .with_chunk(step.chunk.id.clone());
            let chunk_diff = diff(step.before.displayed(), step.after.displayed(), None, &options);
            attribution.record(&chunk_diff, &annotation);
        }
        Ok(attribution)
    }

    /// The diff between the snapshot after "since" and rev. Computed once
    /// per resolved range; live events never alter a returned diff.
    pub fn current_object_diff(&mut self) -> Option<Arc<DocumentDiff>> {
        self.pin_range();
        let range = self.range()?;
        let since = range.since.as_ref()?;
        let (since_id, since_end) = self.boundary(since, self.since_pin.as_deref());
        let rev = self.rev_boundary(&range);
        let key = RangeKey {
            since: since_id,
            rev: match &rev {
                Some((id, _)) => Endpoint::Chunk(id.clone()),
                None => Endpoint::Current(self.version),
            },
        };
        if let Some(diff) = self.memo.get(&key) {
            return Some(Arc::clone(diff));
        }

        let rev_end = rev.as_ref().map_or(self.timeline.transactions().len(), |(_, end)| *end);
        let computed = self.timeline.replay(since_end).and_then(|from| {
            let to = self.rev_pair(rev)?;
            let attribution = self.attribution(since_end, rev_end)?;
            Ok((from, to, attribution))
        });
        let (from, to, attribution) = match computed {
            Ok(parts) => parts,
            Err(err) => {
                warn!(error = %err, "could not reconstruct range snapshots");
                return None;
            }
        };

        let mut options = DiffOptions::new()
            .with_schema(&self.schema)
            .with_attribution(&attribution);
        if let Some(annotation) = self.fallback_annotation(&range) {
            options = options.with_annotation(annotation);
        }
        let diff = Arc::new(diff_document(from.displayed(), to.displayed(), None, &options));
        debug!(since = %key.since, rev = ?key.rev, changed = diff.is_changed(), "computed range diff");
        self.memo.insert(key, Arc::clone(&diff));
        Some(diff)
    }

    /// A mutation that restores the displayed historical revision as the
    /// draft. `None` when rev is current.
    pub fn restore_mutation(&self) -> Option<Mutation> {
        if !self.on_older_revision() {
            return None;
        }
        let mut doc = self.displayed()?;
        let obj = doc.as_object_mut()?;
        obj.insert(
            ID_ATTRIBUTE.to_string(),
            Value::String(draft_id(self.timeline.document_id())),
        );
        obj.shift_remove(REV_ATTRIBUTE);
        Some(Mutation::CreateOrReplace(doc))
    }

    // ── Live document ─────────────────────────────────────────────────────

    /// Feed an event from the document store subscription.
    pub fn handle_event(&mut self, event: DocumentEvent) -> Result<(), HistoryError> {
        self.ensure_open()?;
        match event {
            DocumentEvent::Snapshot { pair } => {
                self.current = Some(pair);
            }
            DocumentEvent::Mutation { transaction } => {
                self.pin_range();
                if let Some(pair) = self.current.as_mut() {
                    transaction.apply(pair).map_err(|source| HistoryError::Apply {
                        id: transaction.id.clone(),
                        source,
                    })?;
                }
                if !self.timeline.is_empty() || self.timeline.is_exhausted() {
                    self.timeline.append_live(transaction)?;
                }
            }
        }
        self.version += 1;
        let version = self.version;
        self.memo
            .retain(|key, _| !matches!(key.rev, Endpoint::Current(v) if v != version));
        Ok(())
    }
}
