// src/remote/mod.rs
//! Collaborators on the network side: the sync endpoint and the reachability probe.

pub mod connectivity;
pub mod sync_client;

pub use connectivity::{ConnectivityProbe, HttpConnectivityProbe, StaticProbe};
pub use sync_client::{HttpSyncEndpoint, SyncEndpoint};
