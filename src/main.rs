// src/main.rs

//! # Offline Verifier - Main Entry Point
//!
//! Composition root: wires the file-backed store, the HTTP sync endpoint and
//! the connectivity probe into an [`OfflineVerifier`] and runs one command.
//!
//! ## Commands
//! - `sync`: run one sync cycle
//! - `scan <token>...`: verify tokens now and queue them for upload
//! - `verify <token>...`: verify tokens now without recording anything
//! - `status` (default): cached trust data and queue sizes
//! - `reset`: drop cached trust data and queued items
//!
//! ## Environment
//! - `OFFLINE_VERIFIER_ENDPOINT_URL`: authority root URL (required)
//! - `OFFLINE_VERIFIER_BEARER_TOKEN`: (Optional) bearer credential
//! - `OFFLINE_VERIFIER_DATA_DIR`: (Optional) local store, default `./offline-data`
//! - `RUST_LOG`: log verbosity

use anyhow::{bail, Context};
use chrono::Utc;
use dotenv::dotenv;
use log::info;
use offline_verifier::remote::{HttpConnectivityProbe, HttpSyncEndpoint};
use offline_verifier::storage::FileStore;
use offline_verifier::utils::time::now_unix;
use offline_verifier::{OfflineVerifier, Settings, VerifyResult};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::new().context("failed to load settings")?;
    let engine = build_engine(&settings).await?;

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "status".to_string());
    let tokens: Vec<String> = args.collect();

    match command.as_str() {
        "sync" => {
            let report = engine.request_sync().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "scan" | "verify" => {
            if tokens.is_empty() {
                bail!("usage: offline-verifier {command} <token>...");
            }
            for token in &tokens {
                let result = if command == "scan" {
                    engine.record_scan(token, Utc::now()).await?
                } else {
                    engine.verify(token, now_unix())
                };
                print_result(&result);
            }
        }
        "status" => {
            let snapshot = engine.cache_snapshot();
            let sizes = engine.queue_sizes().await;
            println!(
                "trust bundle v{} ({} keys), revocations v{} ({} credentials, {} keys)",
                snapshot.trust_bundle().version,
                snapshot.trust_bundle().issuers.len(),
                snapshot.revocations.as_ref().map_or(0, |r| r.version),
                snapshot.revoked_credentials().len(),
                snapshot.revoked_keys().len()
            );
            println!("pending: {} credentials, {} scans", sizes.credentials, sizes.scans);
        }
        "reset" => engine.reset().await?,
        other => bail!("unknown command {other:?}; expected sync, scan, verify, status or reset"),
    }
    Ok(())
}

async fn build_engine(settings: &Settings) -> anyhow::Result<OfflineVerifier> {
    let store = FileStore::open(&settings.data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", settings.data_dir.display()))?;

    let mut endpoint = HttpSyncEndpoint::new(&settings.endpoint_url, settings.request_timeout())?;
    if let Some(token) = &settings.bearer_token {
        endpoint = endpoint.with_bearer_token(token.clone());
    }
    let probe = HttpConnectivityProbe::new(&settings.endpoint_url, settings.probe_timeout())?;

    info!("Using endpoint {} and data directory {}", endpoint.base_url(), store.root().display());
    let engine = OfflineVerifier::open(
        Arc::new(store),
        Arc::new(endpoint),
        Arc::new(probe),
        settings.engine_config(),
    )
    .await?;
    Ok(engine)
}

fn print_result(result: &VerifyResult) {
    match result {
        VerifyResult::Verified { jti, warnings, .. } if warnings.is_empty() => println!("VALID   {jti}"),
        VerifyResult::Verified { jti, warnings, .. } => println!("VALID   {jti} ({})", warnings.join(", ")),
        VerifyResult::Failed { reason, .. } => {
            println!("INVALID {} ({reason})", result.jti().unwrap_or("-"))
        }
    }
}
