// src/services/sync_orchestrator.rs
//! Sync cycle: probe, download, persist, upload.
//!
//! ```text
//! Idle → Probing → Downloading → Persisting → Uploading → Idle
//!            └──────────┴─────────────┴────────────┴──→ Error → Idle
//! ```
//!
//! - At most one cycle runs at a time. A request arriving while a cycle holds
//!   the lock is refused with [`SyncError::InProgress`]; it never cancels the
//!   running cycle.
//! - Downloads run concurrently and are all-or-nothing: if any of the three
//!   fails, nothing is persisted and the queues are not touched.
//! - Credentials are uploaded before scans (the authority stores scans as
//!   references to credentials). A failed credential batch means the scan
//!   batch is never sent.
//! - Queue items are removed only after the authority confirmed the whole
//!   batch. Nothing is retried automatically; the caller decides when to sync
//!   again.

use crate::errors::{RemoteError, SyncError, UploadStage};
use crate::models::BatchAck;
use crate::remote::{ConnectivityProbe, SyncEndpoint};
use crate::storage::{CacheSnapshot, CredentialQueue, ScanQueue, TrustCache};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard};

/// Phase of the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Idle,
    Probing,
    Downloading,
    Persisting,
    Uploading,
    Error,
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub trust_bundle_version: i64,
    pub trusted_keys: usize,
    pub revocation_version: i64,
    pub revoked_credentials: usize,
    pub revoked_keys: usize,
    pub credentials_uploaded: usize,
    pub scans_uploaded: usize,
}

/// Everything the orchestrator reads from or writes to.
pub struct SyncContext {
    pub probe: Arc<dyn ConnectivityProbe>,
    pub endpoint: Arc<dyn SyncEndpoint>,
    pub cache: Arc<TrustCache>,
    pub credentials: Arc<CredentialQueue>,
    pub scans: Arc<ScanQueue>,
}

/// Coordinates sync cycles between the local stores and the authority.
pub struct SyncOrchestrator {
    ctx: SyncContext,
    request_timeout: Duration,
    cycle_lock: Mutex<()>,
    state: watch::Sender<SyncState>,
    last_error: StdMutex<Option<SyncError>>,
}

/// Holds the cycle lock; returns the state machine to `Idle` on every exit
/// path, including when the cycle future is dropped mid-flight.
struct CycleGuard<'a> {
    _lock: MutexGuard<'a, ()>,
    state: &'a watch::Sender<SyncState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(SyncState::Idle);
    }
}

/// Upload progress within one cycle, used to build `SyncError::Upload`.
#[derive(Default)]
struct UploadProgress {
    confirmed: usize,
    attempted: usize,
}

impl SyncOrchestrator {
    /// Creates an orchestrator.
    ///
    /// # Arguments
    /// * `ctx` - Probe, endpoint, cache and queues shared with the rest of the engine
    /// * `request_timeout` - Bound on every individual remote call
    pub fn new(ctx: SyncContext, request_timeout: Duration) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            ctx,
            request_timeout,
            cycle_lock: Mutex::new(()),
            state,
            last_error: StdMutex::new(None),
        }
    }

    /// Current state of the machine
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Error of the most recent cycle, `None` if it succeeded or none ran yet
    pub fn last_error(&self) -> Option<SyncError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    /// Blocks new cycles for as long as the guard lives. `None` while a cycle runs.
    pub fn try_hold(&self) -> Option<MutexGuard<'_, ()>> {
        self.cycle_lock.try_lock().ok()
    }

    /// Runs one sync cycle.
    ///
    /// # Returns
    /// - `Ok(SyncReport)` when download, persist and all uploads succeeded
    /// - `Err(SyncError::InProgress)` if another cycle is running (last error untouched)
    /// - `Err(..)` for any failed stage; the same error is kept as last error
    pub async fn request_sync(&self) -> Result<SyncReport, SyncError> {
        let lock = match self.cycle_lock.try_lock() {
            Ok(lock) => lock,
            Err(_) => {
                warn!("Sync requested while a cycle is running; ignoring");
                return Err(SyncError::InProgress);
            }
        };
        let _guard = CycleGuard {
            _lock: lock,
            state: &self.state,
        };
        self.set_last_error(None);

        let outcome = self.run_cycle().await;
        match &outcome {
            Ok(report) => info!(
                "Sync complete: bundle v{}, revocations v{}, uploaded {} credentials and {} scans",
                report.trust_bundle_version,
                report.revocation_version,
                report.credentials_uploaded,
                report.scans_uploaded
            ),
            Err(e) => {
                self.transition(SyncState::Error);
                error!("Sync failed: {}", e);
                self.set_last_error(Some(e.clone()));
            }
        }
        outcome
    }

    async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        self.transition(SyncState::Probing);
        let online = tokio::time::timeout(self.request_timeout, self.ctx.probe.is_online())
            .await
            .unwrap_or(false);
        if !online {
            return Err(SyncError::NoConnectivity);
        }

        self.transition(SyncState::Downloading);
        let (bundle, revocations, revoked_keys) = tokio::try_join!(
            self.bounded(self.ctx.endpoint.fetch_trust_bundle()),
            self.bounded(self.ctx.endpoint.fetch_revocations()),
            self.bounded(self.ctx.endpoint.fetch_revoked_keys()),
        )
        .map_err(|e| SyncError::Download(e.to_string()))?;
        if !bundle.has_unique_keys() {
            return Err(SyncError::Download(
                "trust bundle lists the same (issuer, kid) pair twice".to_string(),
            ));
        }
        debug!(
            "Downloaded bundle v{} ({} keys), revocations v{} ({} entries), {} revoked keys",
            bundle.version,
            bundle.issuers.len(),
            revocations.version,
            revocations.revoked_jti.len(),
            revoked_keys.revoked_kids.len()
        );

        let mut report = SyncReport {
            trust_bundle_version: bundle.version,
            trusted_keys: bundle.issuers.len(),
            revocation_version: revocations.version,
            revoked_credentials: revocations.revoked_jti.len(),
            revoked_keys: revoked_keys.revoked_kids.len(),
            ..SyncReport::default()
        };

        self.transition(SyncState::Persisting);
        self.ctx
            .cache
            .replace(CacheSnapshot::new(bundle, revocations, revoked_keys))
            .await
            .map_err(|e| SyncError::Persist(e.to_string()))?;

        self.transition(SyncState::Uploading);
        let mut progress = UploadProgress::default();

        let credentials = self.ctx.credentials.peek_all().await;
        if !credentials.is_empty() {
            let ack = self.bounded(self.ctx.endpoint.upload_credentials(&credentials)).await;
            self.check_ack(UploadStage::Credentials, credentials.len(), ack, &mut progress)?;
            self.ctx
                .credentials
                .acknowledge(credentials.len())
                .await
                .map_err(|e| SyncError::Persist(format!("credentials uploaded but queue not updated: {e}")))?;
            progress.confirmed += credentials.len();
            report.credentials_uploaded = credentials.len();
        }

        let scans = self.ctx.scans.peek_all().await;
        if !scans.is_empty() {
            let ack = self.bounded(self.ctx.endpoint.upload_scans(&scans)).await;
            self.check_ack(UploadStage::Scans, scans.len(), ack, &mut progress)?;
            self.ctx
                .scans
                .acknowledge(scans.len())
                .await
                .map_err(|e| SyncError::Persist(format!("scans uploaded but queue not updated: {e}")))?;
            report.scans_uploaded = scans.len();
        }

        Ok(report)
    }

    /// Turns a batch response into an error unless every item was stored.
    fn check_ack(
        &self,
        stage: UploadStage,
        submitted: usize,
        ack: Result<BatchAck, RemoteError>,
        progress: &mut UploadProgress,
    ) -> Result<(), SyncError> {
        progress.attempted += submitted;
        let message = match ack {
            Ok(ack) if ack.confirms(submitted) => {
                debug!("Authority stored {}/{} {}", ack.uploaded, ack.total, stage);
                return Ok(());
            }
            Ok(ack) => format!(
                "authority stored {}/{} of {} submitted items",
                ack.uploaded, ack.total, submitted
            ),
            Err(e) => e.to_string(),
        };
        Err(SyncError::Upload {
            stage,
            confirmed: progress.confirmed,
            attempted: progress.attempted,
            message,
        })
    }

    /// Applies the per-call timeout; an elapsed timeout counts as a transport failure.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T, RemoteError>>) -> Result<T, RemoteError> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.request_timeout)),
        }
    }

    fn transition(&self, next: SyncState) {
        debug!("Sync state -> {:?}", next);
        self.state.send_replace(next);
    }

    fn set_last_error(&self, value: Option<SyncError>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}
