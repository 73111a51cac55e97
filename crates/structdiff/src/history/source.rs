//! Boundary with the document store and its history service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::timeline::{FetchRequest, HistoryPage, Transaction};
use crate::value::DocumentPair;

/// Backward-paginated access to a document's transaction history.
///
/// Pages are requested newest first; each page lists its transactions
/// oldest first and carries the document pair as it was before them.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_page(&self, request: &FetchRequest) -> Result<HistoryPage, HistoryError>;
}

/// An event from the live document store subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentEvent {
    /// The full current value of the document pair.
    Snapshot { pair: DocumentPair },
    /// A transaction committed against the document.
    Mutation { transaction: Transaction },
}
