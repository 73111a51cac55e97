//! History controller.
//!
//! Ties a [`Timeline`](crate::timeline::Timeline) to an external history
//! source and the live document, tracks the user's selected range, and
//! computes the diff for it on demand.

mod controller;
mod source;

pub use controller::{HistoryController, ResolvedRange};
pub use source::{DocumentEvent, HistorySource};
