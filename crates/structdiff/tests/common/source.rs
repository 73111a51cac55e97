use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use structdiff::timeline::{FetchRequest, HistoryPage, Transaction};
use structdiff::{DocumentPair, HistoryError, HistorySource};

/// In-memory history backed by a full oldest-first transaction list.
///
/// Cursors are the stringified index of the oldest transaction already
/// served.
pub struct MemorySource {
    transactions: Vec<Transaction>,
    fail_next: AtomicUsize,
    calls: AtomicUsize,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MemorySource {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            fail_next: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `n` fetches fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn page(&self, request: &FetchRequest) -> HistoryPage {
        let end = request
            .before
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(self.transactions.len());
        let start = end.saturating_sub(request.limit);
        let mut base = DocumentPair::default();
        for tx in &self.transactions[..start] {
            tx.apply(&mut base).unwrap();
        }
        HistoryPage {
            transactions: self.transactions[start..end].to_vec(),
            base,
            exhausted: start == 0,
            next_cursor: (start > 0).then(|| start.to_string()),
        }
    }
}

#[async_trait]
impl HistorySource for MemorySource {
    async fn fetch_page(&self, request: &FetchRequest) -> Result<HistoryPage, HistoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let failing = self.fail_next.load(Ordering::SeqCst);
        if failing > 0 {
            self.fail_next.store(failing - 1, Ordering::SeqCst);
            return Err(HistoryError::Fetch("history service unavailable".to_string()));
        }
        tokio::task::yield_now().await;
        Ok(self.page(request))
    }
}

/// A source whose fetches never complete.
pub struct StalledSource;

#[async_trait]
impl HistorySource for StalledSource {
    async fn fetch_page(&self, _request: &FetchRequest) -> Result<HistoryPage, HistoryError> {
        futures::future::pending().await
    }
}
