// src/services/mod.rs
//! Verification, sync coordination and the engine tying them together.

pub mod engine;
pub mod sync_orchestrator;
pub mod verifier;

pub use engine::{EngineConfig, OfflineVerifier, QueueSizes};
pub use sync_orchestrator::{SyncContext, SyncOrchestrator, SyncReport, SyncState};
pub use verifier::{verify, verify_with_options, VerifyOptions, VerifyResult, EXPIRES_SOON};
