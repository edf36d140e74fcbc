// src/storage/mod.rs
//! Local persistence: the keyed blob store and the structures kept in it.

pub mod credential_ledger;
pub mod event_queue;
pub mod key_value;
pub mod trust_cache;

pub use credential_ledger::{CredentialLedger, CREDENTIAL_LEDGER_KEY};
pub use event_queue::{CredentialQueue, EventQueue, ScanQueue, CREDENTIAL_QUEUE_KEY, SCAN_QUEUE_KEY};
pub use key_value::{FileStore, KeyValueStore, MemoryStore};
pub use trust_cache::{CacheSnapshot, TrustCache};
