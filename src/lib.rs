// src/lib.rs
//! # Offline Verifier
//!
//! Verifies signed credentials without network access and reconciles locally
//! recorded activity with a remote authority once connectivity returns.
//!
//! ## Layers
//! 1. **Models**: trust bundle, revocation data, queued events, token records
//! 2. **Services**: the pure verifier, the sync orchestrator and the engine facade
//! 3. **Storage**: keyed blob store, trust cache and event queues
//! 4. **Remote**: sync endpoint client and connectivity probe

pub mod errors;
pub mod models;
pub mod remote;
pub mod services;
pub mod settings;
pub mod storage;
pub mod utils;

pub use errors::{RemoteError, RevocationScope, StoreError, SyncError, UploadStage, VerifyErrorKind};
pub use services::{EngineConfig, OfflineVerifier, QueueSizes, SyncReport, SyncState, VerifyOptions, VerifyResult};
pub use settings::Settings;
