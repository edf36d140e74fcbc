// src/errors.rs
//! Error taxonomy for verification, local persistence, the remote endpoint
//! and sync cycles.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which revocation list rejected a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationScope {
    Credential,
    Key,
}

impl fmt::Display for RevocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevocationScope::Credential => f.write_str("credential"),
            RevocationScope::Key => f.write_str("key"),
        }
    }
}

/// Reason a token failed offline verification.
///
/// Always returned inside `VerifyResult::Failed`; the display string is meant
/// to be shown to the operator as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum VerifyErrorKind {
    #[error("malformed token: {0}")]
    Format(String),
    #[error("missing claim: {0}")]
    MissingClaim(&'static str),
    #[error("credential is not yet valid")]
    NotYetValid,
    #[error("credential has expired")]
    Expired,
    #[error("signing key not found in trust bundle")]
    KeyNotFound,
    #[error("revoked {0}")]
    Revoked(RevocationScope),
    #[error("invalid signature")]
    SignatureInvalid,
}

/// Failures of the durable keyed store and of blob encoding.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid store key: {0}")]
    InvalidKey(String),
    #[error("failed to encode blob: {0}")]
    Encode(String),
    #[error("failed to decode blob: {0}")]
    Decode(String),
}

/// Failures talking to the remote synchronization endpoint.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            RemoteError::Status { status: status.as_u16() }
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Which batch an upload failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Credentials,
    Scans,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStage::Credentials => f.write_str("credentials"),
            UploadStage::Scans => f.write_str("scans"),
        }
    }
}

/// Outcome of a failed or refused sync request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Another sync cycle holds the cycle lock; nothing was done.
    #[error("a sync cycle is already running")]
    InProgress,
    #[error("no network connectivity")]
    NoConnectivity,
    #[error("download failed: {0}")]
    Download(String),
    #[error("failed to persist trust data: {0}")]
    Persist(String),
    /// `confirmed` items were acknowledged and removed from the queues during
    /// this cycle; `attempted` counts every item submitted, including the
    /// failed batch, which stays queued.
    #[error("{stage} upload failed after {confirmed}/{attempted} items confirmed: {message}")]
    Upload {
        stage: UploadStage,
        confirmed: usize,
        attempted: usize,
        message: String,
    },
}
