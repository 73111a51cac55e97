//! Raw history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MutationError;
use crate::mutation::{apply_mutation, Mutation};
use crate::value::{DocumentPair, REV_ATTRIBUTE};

/// One committed transaction against a document pair. `id` is the
/// revision the transaction produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub mutations: Vec<Mutation>,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        author: impl Into<String>,
        mutations: Vec<Mutation>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            author: author.into(),
            mutations,
        }
    }

    /// Fold this transaction onto `pair`. Every document the transaction
    /// wrote gets its `_rev` set to the transaction id.
    pub fn apply(&self, pair: &mut DocumentPair) -> Result<(), MutationError> {
        for mutation in &self.mutations {
            apply_mutation(pair, mutation)?;
            let Some(id) = mutation.document_id() else {
                continue;
            };
            if let Some(Value::Object(doc)) = pair.slot_mut(id) {
                doc.insert(REV_ATTRIBUTE.to_string(), Value::String(self.id.clone()));
            }
        }
        Ok(())
    }
}
