// src/remote/connectivity.rs
//! Network reachability checks used before a sync cycle starts.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Reports whether the sync endpoint can currently be reached.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probes `GET <base_url>/health` and treats any 2xx answer as online.
#[derive(Clone)]
pub struct HttpConnectivityProbe {
    client: Client,
    health_url: String,
}

impl HttpConnectivityProbe {
    /// Builds a probe that gives up after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            health_url: format!("{}/health", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn is_online(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health probe failed: {}", e);
                false
            }
        }
    }
}

/// Probe with a manually set answer, e.g. a forced offline mode.
#[derive(Debug)]
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_probe_toggles() {
        let probe = StaticProbe::new(false);
        assert!(!probe.is_online().await);
        probe.set_online(true);
        assert!(probe.is_online().await);
    }

    #[tokio::test]
    async fn test_http_probe_offline_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpConnectivityProbe::new(&format!("http://{addr}/"), Duration::from_millis(500)).unwrap();
        assert_eq!(probe.health_url, format!("http://{addr}/health"));
        assert!(!probe.is_online().await);
    }
}
