// src/services/revocation.rs
//! Revocation registry.
//!
//! An append-only set of revoked credential identifiers. There is no
//! un-revoke: once an identifier is in the set it stays there.

use log::info;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{VcError, VcResult};
use crate::models::revocation::RevocationEntry;
use crate::storage::record_store::RecordStore;

/// Acknowledgement of a revocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevocationAck {
    /// The identifier now revoked
    pub acknowledged: String,
}

/// Registry of revoked credentials backed by a revocation entry collection.
pub struct RevocationRegistry {
    store: Arc<dyn RecordStore<RevocationEntry>>,
    /// Serializes check-then-append so one identifier yields one entry
    write_lock: Mutex<()>,
}

impl RevocationRegistry {
    /// Creates a registry over the given collection.
    pub fn new(store: Arc<dyn RecordStore<RevocationEntry>>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Revokes `credential_id`. Revoking an already revoked identifier
    /// succeeds without writing anything.
    ///
    /// # Errors
    /// - [`VcError::MissingIdentifier`] if the identifier is empty
    /// - [`VcError::StoreIo`] if the collection cannot be read or written
    pub async fn revoke(&self, credential_id: &str) -> VcResult<RevocationAck> {
        let credential_id = credential_id.trim();
        if credential_id.is_empty() {
            return Err(VcError::MissingIdentifier);
        }

        let _guard = self.write_lock.lock().await;
        if self.store.contains(credential_id).await? {
            info!("Credential {} already revoked", credential_id);
        } else {
            self.store.append(RevocationEntry::now(credential_id)).await?;
            info!("Revoked credential {}", credential_id);
        }

        Ok(RevocationAck {
            acknowledged: credential_id.to_string(),
        })
    }

    /// Whether `credential_id` is revoked. Always reads the collection.
    /// Identifiers are trimmed the same way [`revoke`](Self::revoke) trims them.
    pub async fn is_revoked(&self, credential_id: &str) -> VcResult<bool> {
        self.store.contains(credential_id.trim()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record_store::MemoryStore;
    use tokio_test::{assert_err, assert_ok};

    fn registry() -> (RevocationRegistry, Arc<MemoryStore<RevocationEntry>>) {
        let store = Arc::new(MemoryStore::new());
        (RevocationRegistry::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_revoke_then_is_revoked() {
        let (registry, _) = registry();
        assert!(!registry.is_revoked("vc-1").await.unwrap());

        let ack = assert_ok!(registry.revoke("vc-1").await);
        assert_eq!(ack.acknowledged, "vc-1");
        assert!(registry.is_revoked("vc-1").await.unwrap());
        assert!(!registry.is_revoked("vc-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent_and_monotonic() {
        let (registry, store) = registry();
        for _ in 0..3 {
            assert_ok!(registry.revoke("vc-1").await);
            assert!(registry.is_revoked("vc-1").await.unwrap());
        }
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_trims_like_revoke() {
        let (registry, store) = registry();
        assert_ok!(registry.revoke("  vc-7 ").await);
        assert!(registry.is_revoked("vc-7").await.unwrap());
        assert!(registry.is_revoked(" vc-7\n").await.unwrap());

        assert_ok!(registry.revoke("vc-7").await);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_identifier() {
        let (registry, store) = registry();
        let err = assert_err!(registry.revoke("   ").await);
        assert!(matches!(err, VcError::MissingIdentifier));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_revocations_of_different_ids() {
        let (registry, store) = registry();
        let registry = Arc::new(registry);

        let mut handles = Vec::new();
        for i in 0..10 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.revoke(&format!("vc-{}", i)).await
            }));
        }
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }

        assert_eq!(store.list().await.unwrap().len(), 10);
    }
}
