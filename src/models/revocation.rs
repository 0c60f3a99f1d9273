// src/models/revocation.rs
//! Revocation entry data model.

use serde::{Deserialize, Serialize};

use crate::storage::record_store::StoredEntry;

/// Marks a credential identifier as revoked from `revoked_at` onwards.
///
/// Entries are only ever appended. The presence of an identifier, regardless of
/// how many entries name it, means the credential is revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    /// Identifier of the revoked credential
    pub id: String,

    /// Revocation time in epoch milliseconds
    #[serde(rename = "ts")]
    pub revoked_at: i64,
}

impl RevocationEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            revoked_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl StoredEntry for RevocationEntry {
    fn key(&self) -> &str {
        &self.id
    }
}
