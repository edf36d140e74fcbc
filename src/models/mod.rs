// src/models/mod.rs
//! Data structures shared by the verifier, the local stores and the sync client.

pub mod events;
pub mod token;
pub mod trust;

pub use events::{BatchAck, PendingCredential, ScanEvent};
pub use token::{TokenHeader, TokenPayload};
pub use trust::{Alg, RevocationList, RevokedKeySet, TrustBundle, TrustBundleItem};
