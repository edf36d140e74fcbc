// src/storage/credential_ledger.rs
//! Credential identifiers already handed to the upload queue.
//!
//! The authority stores each credential once per `jti` and acknowledges a
//! batch by how many items it newly stored. Queuing the same credential twice
//! would leave a batch that can never be fully confirmed, so scans of an
//! already recorded credential only add a scan event.

use crate::errors::StoreError;
use crate::storage::key_value::{retrieve_json, store_json, KeyValueStore};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Store key of the ledger
pub const CREDENTIAL_LEDGER_KEY: &str = "credential_ledger";

/// Persisted set of `jti` values whose credential was queued at least once.
pub struct CredentialLedger {
    store: Arc<dyn KeyValueStore>,
    seen: Mutex<BTreeSet<String>>,
}

impl CredentialLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            seen: Mutex::new(BTreeSet::new()),
        }
    }

    /// Replaces the in-memory set with the persisted one.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let mut seen = self.seen.lock().await;
        *seen = retrieve_json(self.store.as_ref(), CREDENTIAL_LEDGER_KEY)
            .await?
            .unwrap_or_default();
        debug!("Loaded {} known credentials", seen.len());
        Ok(seen.len())
    }

    pub async fn contains(&self, jti: &str) -> bool {
        self.seen.lock().await.contains(jti)
    }

    /// Adds `jti` and persists the set.
    ///
    /// # Returns
    /// `true` if `jti` was not recorded before
    pub async fn record(&self, jti: &str) -> Result<bool, StoreError> {
        let mut seen = self.seen.lock().await;
        if !seen.insert(jti.to_string()) {
            return Ok(false);
        }
        if let Err(e) = store_json(self.store.as_ref(), CREDENTIAL_LEDGER_KEY, &*seen).await {
            seen.remove(jti);
            return Err(e);
        }
        Ok(true)
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut seen = self.seen.lock().await;
        self.store.clear(CREDENTIAL_LEDGER_KEY).await?;
        seen.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_record_is_idempotent_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CredentialLedger::new(store.clone());

        assert!(ledger.record("c1").await.unwrap());
        assert!(!ledger.record("c1").await.unwrap());
        assert!(ledger.record("c2").await.unwrap());
        assert_eq!(ledger.len().await, 2);

        let reloaded = CredentialLedger::new(store);
        assert_eq!(reloaded.load().await.unwrap(), 2);
        assert!(reloaded.contains("c1").await);
    }

    #[tokio::test]
    async fn test_failed_write_forgets_entry() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CredentialLedger::new(store.clone());
        store.set_read_only(true);

        assert!(ledger.record("c1").await.is_err());
        assert!(!ledger.contains("c1").await);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = Arc::new(MemoryStore::new());
        let ledger = CredentialLedger::new(store.clone());
        ledger.record("c1").await.unwrap();

        ledger.clear().await.unwrap();
        assert!(ledger.is_empty().await);
        assert!(store.is_empty());
    }
}
