// src/remote/sync_client.rs
//! Client for the remote synchronization endpoint.
//!
//! The endpoint serves the authoritative trust datasets and accepts batched
//! uploads of locally recorded activity:
//! - `GET  /trust-bundle`          → [`TrustBundle`]
//! - `GET  /revocations`           → [`RevocationList`]
//! - `GET  /issuers/keys/revoked`  → [`RevokedKeySet`]
//! - `POST /credentials/batch`     → [`BatchAck`]
//! - `POST /scans/batch`           → [`BatchAck`]
//!
//! Bodies are JSON with camelCase field names. Timeouts are applied by the
//! caller (see the sync orchestrator); this client only adds a transport-level
//! ceiling so a dead socket cannot hang forever.

use crate::errors::RemoteError;
use crate::models::{BatchAck, PendingCredential, RevocationList, RevokedKeySet, ScanEvent, TrustBundle};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Operations the sync orchestrator needs from the authority.
#[async_trait]
pub trait SyncEndpoint: Send + Sync {
    async fn fetch_trust_bundle(&self) -> Result<TrustBundle, RemoteError>;

    async fn fetch_revocations(&self) -> Result<RevocationList, RemoteError>;

    async fn fetch_revoked_keys(&self) -> Result<RevokedKeySet, RemoteError>;

    /// Uploads raw credentials; they must reach the authority before any scan
    /// referencing them.
    async fn upload_credentials(&self, credentials: &[PendingCredential]) -> Result<BatchAck, RemoteError>;

    async fn upload_scans(&self, scans: &[ScanEvent]) -> Result<BatchAck, RemoteError>;
}

#[derive(Serialize)]
struct CredentialBatch<'a> {
    credentials: &'a [PendingCredential],
}

#[derive(Serialize)]
struct ScanBatch<'a> {
    scans: &'a [ScanEvent],
}

/// HTTP implementation of [`SyncEndpoint`].
///
/// Attaches `Authorization: Bearer <token>` to every call when a token is set.
#[derive(Clone)]
pub struct HttpSyncEndpoint {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpSyncEndpoint {
    /// Creates a client for the endpoint at `base_url`.
    ///
    /// # Arguments
    /// * `base_url` - Endpoint root, e.g. `https://vc.example.org` (trailing `/` optional)
    /// * `timeout` - Transport-level ceiling for a single request
    ///
    /// # Errors
    /// Returns `Err` if the underlying HTTP client cannot be built (TLS backend failure)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteError::from)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: None,
        })
    }

    /// Attaches a bearer credential to every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        debug!("GET {}", path);
        let response = self
            .authorize(self.client.get(self.url(path)))
            .send()
            .await?
            .error_for_status()?;
        response.json::<T>().await.map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, RemoteError> {
        debug!("POST {}", path);
        let response = self
            .authorize(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        response.json::<T>().await.map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SyncEndpoint for HttpSyncEndpoint {
    async fn fetch_trust_bundle(&self) -> Result<TrustBundle, RemoteError> {
        self.get_json("/trust-bundle").await
    }

    async fn fetch_revocations(&self) -> Result<RevocationList, RemoteError> {
        self.get_json("/revocations").await
    }

    async fn fetch_revoked_keys(&self) -> Result<RevokedKeySet, RemoteError> {
        self.get_json("/issuers/keys/revoked").await
    }

    async fn upload_credentials(&self, credentials: &[PendingCredential]) -> Result<BatchAck, RemoteError> {
        self.post_json("/credentials/batch", &CredentialBatch { credentials })
            .await
    }

    async fn upload_scans(&self, scans: &[ScanEvent]) -> Result<BatchAck, RemoteError> {
        self.post_json("/scans/batch", &ScanBatch { scans }).await
    }
}
