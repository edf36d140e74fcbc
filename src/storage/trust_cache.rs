// src/storage/trust_cache.rs
//! Last-synchronized trust and revocation data.
//!
//! Holds at most one snapshot of each dataset. Readers get an `Arc` to an
//! immutable [`CacheSnapshot`]; `replace` persists a new snapshot and then
//! swaps the reference, so a reader never observes a bundle from one sync and
//! a revocation list from another.
//!
//! The three datasets are persisted together as a single blob: the keyed
//! store only guarantees crash consistency per write.

use crate::errors::StoreError;
use crate::models::{RevocationList, RevokedKeySet, TrustBundle};
use crate::storage::key_value::{retrieve_json, store_json, KeyValueStore};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Store key holding the persisted snapshot
pub const SNAPSHOT_KEY: &str = "trust_cache";

static EMPTY_BUNDLE: TrustBundle = TrustBundle {
    version: 0,
    issued_at: DateTime::<Utc>::UNIX_EPOCH,
    issuers: Vec::new(),
};
static EMPTY_SET: BTreeSet<String> = BTreeSet::new();

/// One consistent view of the trust material.
///
/// Every field is `None` until the first successful sync.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub trust_bundle: Option<TrustBundle>,
    pub revocations: Option<RevocationList>,
    pub revoked_keys: Option<RevokedKeySet>,
}

impl CacheSnapshot {
    pub fn new(trust_bundle: TrustBundle, revocations: RevocationList, revoked_keys: RevokedKeySet) -> Self {
        Self {
            trust_bundle: Some(trust_bundle),
            revocations: Some(revocations),
            revoked_keys: Some(revoked_keys),
        }
    }

    /// `true` before the first sync (or after a reset)
    pub fn is_empty(&self) -> bool {
        self.trust_bundle.is_none() && self.revocations.is_none() && self.revoked_keys.is_none()
    }

    /// The cached bundle, or an empty bundle that resolves no keys.
    pub fn trust_bundle(&self) -> &TrustBundle {
        self.trust_bundle.as_ref().unwrap_or(&EMPTY_BUNDLE)
    }

    pub fn revoked_credentials(&self) -> &BTreeSet<String> {
        self.revocations
            .as_ref()
            .map(|list| &list.revoked_jti)
            .unwrap_or(&EMPTY_SET)
    }

    pub fn revoked_keys(&self) -> &BTreeSet<String> {
        self.revoked_keys
            .as_ref()
            .map(|set| &set.revoked_kids)
            .unwrap_or(&EMPTY_SET)
    }
}

/// Trust & revocation cache backed by a keyed store.
pub struct TrustCache {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Arc<CacheSnapshot>>,
}

impl TrustCache {
    /// Creates an empty cache. Call [`TrustCache::load`] to pick up persisted data.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(CacheSnapshot::default())),
        }
    }

    /// Reads the last persisted snapshot into memory.
    ///
    /// An absent blob yields the empty snapshot.
    pub async fn load(&self) -> Result<Arc<CacheSnapshot>, StoreError> {
        let loaded: Option<CacheSnapshot> = retrieve_json(self.store.as_ref(), SNAPSHOT_KEY).await?;
        let snapshot = Arc::new(loaded.unwrap_or_default());
        match snapshot.trust_bundle.as_ref() {
            Some(bundle) => info!(
                "Loaded trust cache: bundle v{} with {} keys",
                bundle.version,
                bundle.issuers.len()
            ),
            None => debug!("No persisted trust cache; starting empty"),
        }
        self.swap(snapshot.clone());
        Ok(snapshot)
    }

    /// Current in-memory snapshot.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Persists `snapshot` and makes it current.
    ///
    /// If persisting fails the in-memory snapshot is left untouched.
    pub async fn replace(&self, snapshot: CacheSnapshot) -> Result<(), StoreError> {
        store_json(self.store.as_ref(), SNAPSHOT_KEY, &snapshot).await?;
        self.swap(Arc::new(snapshot));
        Ok(())
    }

    /// Drops all cached trust data, persisted and in memory.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.store.clear(SNAPSHOT_KEY).await?;
        self.swap(Arc::new(CacheSnapshot::default()));
        info!("Trust cache reset");
        Ok(())
    }

    fn swap(&self, snapshot: Arc<CacheSnapshot>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}
