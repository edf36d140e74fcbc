// src/services/engine.rs
//! Offline Verifier Engine
//!
//! Composition of the verifier, the trust cache, both event queues and the
//! sync orchestrator behind the handful of calls presentation code needs:
//! - Scan-time verification against the cached trust data
//! - Recording scans and observed credentials for later upload
//! - Triggering a sync cycle and reading its outcome
//!
//! Verification never waits on a running sync: it reads whichever cache
//! snapshot is current when the call starts.

use crate::errors::{StoreError, SyncError};
use crate::models::{PendingCredential, ScanEvent};
use crate::remote::{ConnectivityProbe, SyncEndpoint};
use crate::services::sync_orchestrator::{SyncContext, SyncOrchestrator, SyncReport, SyncState};
use crate::services::verifier::{verify_with_options, VerifyOptions, VerifyResult};
use crate::storage::{
    CacheSnapshot, CredentialLedger, CredentialQueue, KeyValueStore, ScanQueue, TrustCache, CREDENTIAL_QUEUE_KEY,
    SCAN_QUEUE_KEY,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Tunables of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on every individual remote call during sync
    pub request_timeout: Duration,
    pub verify_options: VerifyOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            verify_options: VerifyOptions::default(),
        }
    }
}

/// Number of items waiting in each queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSizes {
    pub credentials: usize,
    pub scans: usize,
}

/// Offline verification engine.
///
/// Owns all shared mutable state (cache and queues); construct one per
/// device with [`OfflineVerifier::open`].
pub struct OfflineVerifier {
    cache: Arc<TrustCache>,
    credentials: Arc<CredentialQueue>,
    scans: Arc<ScanQueue>,
    ledger: CredentialLedger,
    /// Serializes `record_scan` so a credential is queued at most once
    recording: Mutex<()>,
    orchestrator: SyncOrchestrator,
    verify_options: VerifyOptions,
}

impl OfflineVerifier {
    /// Builds the engine and loads persisted cache and queues from `store`.
    ///
    /// # Arguments
    /// * `store` - Durable keyed store holding the cache snapshot and both queues
    /// * `endpoint` - Remote synchronization endpoint
    /// * `probe` - Connectivity probe consulted at the start of every sync
    /// * `config` - Timeouts and verification options
    ///
    /// # Errors
    /// Returns `Err` if persisted data exists but cannot be read or decoded
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        endpoint: Arc<dyn SyncEndpoint>,
        probe: Arc<dyn ConnectivityProbe>,
        config: EngineConfig,
    ) -> Result<Self, StoreError> {
        let cache = Arc::new(TrustCache::new(store.clone()));
        let credentials = Arc::new(CredentialQueue::new(CREDENTIAL_QUEUE_KEY, store.clone()));
        let scans = Arc::new(ScanQueue::new(SCAN_QUEUE_KEY, store.clone()));
        let ledger = CredentialLedger::new(store);

        cache.load().await?;
        let pending_credentials = credentials.load().await?;
        let pending_scans = scans.load().await?;
        ledger.load().await?;
        info!(
            "Offline verifier ready: {} credentials and {} scans pending upload",
            pending_credentials, pending_scans
        );

        let orchestrator = SyncOrchestrator::new(
            SyncContext {
                probe,
                endpoint,
                cache: cache.clone(),
                credentials: credentials.clone(),
                scans: scans.clone(),
            },
            config.request_timeout,
        );

        Ok(Self {
            cache,
            credentials,
            scans,
            ledger,
            recording: Mutex::new(()),
            orchestrator,
            verify_options: config.verify_options,
        })
    }

    /// Verifies `token` at `now` (Unix seconds) against the current cache snapshot.
    pub fn verify(&self, token: &str, now: i64) -> VerifyResult {
        let snapshot = self.cache.snapshot();
        verify_with_options(
            token,
            snapshot.trust_bundle(),
            snapshot.revoked_credentials(),
            snapshot.revoked_keys(),
            now,
            self.verify_options,
        )
    }

    /// Appends a scan event; returns the new queue length.
    pub async fn enqueue_scan(&self, event: ScanEvent) -> Result<usize, StoreError> {
        self.scans.enqueue(event).await
    }

    /// Appends an observed credential; returns the new queue length.
    pub async fn enqueue_credential(&self, credential: PendingCredential) -> Result<usize, StoreError> {
        self.credentials.enqueue(credential).await
    }

    /// Verifies `token` and queues what the authority needs to hear about it.
    ///
    /// When the token yields a `jti`, a scan event carrying the verification
    /// outcome is queued, preceded by the raw credential the first time that
    /// `jti` is seen on this device. Later scans of the same credential only
    /// add scan events.
    ///
    /// Rejected tokens (forged, unknown issuer, revoked) are queued as well,
    /// with `verified: false` on the scan. The authority stores a scan as a
    /// reference to its credential, and rejected presentations are what it
    /// audits. Tokens too malformed to carry a `jti` are only verified;
    /// there is nothing a scan could reference.
    pub async fn record_scan(&self, token: &str, scanned_at: DateTime<Utc>) -> Result<VerifyResult, StoreError> {
        let result = self.verify(token, scanned_at.timestamp());
        let Some(jti) = result.jti().map(str::to_owned) else {
            warn!("Scan not recorded: token carries no credential identifier");
            return Ok(result);
        };

        let _recording = self.recording.lock().await;
        if self.ledger.contains(&jti).await {
            debug!("Credential {} already queued once; recording scan only", jti);
        } else {
            self.enqueue_credential(PendingCredential::new(token.trim(), scanned_at))
                .await?;
            self.ledger.record(&jti).await?;
        }
        self.enqueue_scan(ScanEvent::new(jti, result.is_verified(), scanned_at))
            .await?;
        Ok(result)
    }

    /// Runs one sync cycle; see [`SyncOrchestrator::request_sync`].
    pub async fn request_sync(&self) -> Result<SyncReport, SyncError> {
        self.orchestrator.request_sync().await
    }

    pub async fn queue_sizes(&self) -> QueueSizes {
        QueueSizes {
            credentials: self.credentials.len().await,
            scans: self.scans.len().await,
        }
    }

    /// Trust data currently used for verification
    pub fn cache_snapshot(&self) -> Arc<CacheSnapshot> {
        self.cache.snapshot()
    }

    pub fn last_sync_error(&self) -> Option<SyncError> {
        self.orchestrator.last_error()
    }

    /// Receiver following the sync state machine
    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.orchestrator.subscribe()
    }

    /// Drops cached trust data and every queued item.
    ///
    /// Refused with [`SyncError::InProgress`] while a sync cycle runs.
    pub async fn reset(&self) -> Result<(), SyncError> {
        let _hold = self.orchestrator.try_hold().ok_or(SyncError::InProgress)?;
        let persist = |e: StoreError| SyncError::Persist(e.to_string());
        self.cache.reset().await.map_err(persist)?;
        self.credentials.clear().await.map_err(persist)?;
        self.scans.clear().await.map_err(persist)?;
        self.ledger.clear().await.map_err(persist)?;
        info!("Local trust data and queues cleared");
        Ok(())
    }
}
