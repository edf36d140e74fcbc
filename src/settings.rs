// src/settings.rs
//! Runtime configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. `offline-verifier.toml` in the working directory (optional)
//! 3. Environment variables prefixed `OFFLINE_VERIFIER_`, e.g.
//!    `OFFLINE_VERIFIER_ENDPOINT_URL`
//!
//! The binary loads `.env` before reading settings, so variables defined
//! there behave like real environment variables.

use crate::services::engine::EngineConfig;
use crate::services::verifier::VerifyOptions;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PREFIX: &str = "OFFLINE_VERIFIER";
pub const CONFIG_FILE: &str = "offline-verifier";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Root URL of the remote synchronization endpoint
    pub endpoint_url: String,
    /// Sent as `Authorization: Bearer <token>` on every endpoint call
    #[serde(default)]
    pub bearer_token: Option<String>,
    pub request_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Directory of the file-backed keyed store
    pub data_dir: PathBuf,
    #[serde(default)]
    pub expiry_warning_secs: Option<i64>,
}

impl Settings {
    /// Loads settings from the default file and the process environment.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_sources(Some(CONFIG_FILE), Environment::with_prefix(ENV_PREFIX))
    }

    /// Loads settings from an optional config file (name without extension)
    /// and the given environment source.
    pub fn from_sources(file: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("request_timeout_secs", 15)?
            .set_default("probe_timeout_secs", 3)?
            .set_default("data_dir", "./offline-data")?;
        if let Some(name) = file {
            builder = builder.add_source(File::with_name(name).required(false));
        }
        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(ConfigError::Message("endpoint_url must not be empty".into()));
        }
        if self.request_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(ConfigError::Message("timeouts must be at least one second".into()));
        }
        if matches!(self.expiry_warning_secs, Some(secs) if secs < 0) {
            return Err(ConfigError::Message("expiry_warning_secs must not be negative".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            request_timeout: self.request_timeout(),
            verify_options: VerifyOptions {
                expiry_warning_secs: self.expiry_warning_secs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults_apply() {
        let settings = Settings::from_sources(
            None,
            env(&[("OFFLINE_VERIFIER_ENDPOINT_URL", "https://authority.example")]),
        )
        .unwrap();

        assert_eq!(settings.endpoint_url, "https://authority.example");
        assert_eq!(settings.request_timeout(), Duration::from_secs(15));
        assert_eq!(settings.probe_timeout(), Duration::from_secs(3));
        assert_eq!(settings.data_dir, PathBuf::from("./offline-data"));
        assert_eq!(settings.bearer_token, None);
        assert_eq!(settings.engine_config().verify_options.expiry_warning_secs, None);
    }

    #[test]
    fn test_environment_overrides() {
        let settings = Settings::from_sources(
            None,
            env(&[
                ("OFFLINE_VERIFIER_ENDPOINT_URL", "http://10.0.0.2:8080"),
                ("OFFLINE_VERIFIER_BEARER_TOKEN", "secret"),
                ("OFFLINE_VERIFIER_REQUEST_TIMEOUT_SECS", "30"),
                ("OFFLINE_VERIFIER_EXPIRY_WARNING_SECS", "600"),
                ("UNRELATED", "ignored"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.bearer_token.as_deref(), Some("secret"));
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.engine_config().verify_options.expiry_warning_secs, Some(600));
    }

    #[test]
    fn test_endpoint_is_required() {
        assert!(Settings::from_sources(None, env(&[])).is_err());
        assert!(Settings::from_sources(None, env(&[("OFFLINE_VERIFIER_ENDPOINT_URL", " ")])).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Settings::from_sources(
            None,
            env(&[
                ("OFFLINE_VERIFIER_ENDPOINT_URL", "http://localhost"),
                ("OFFLINE_VERIFIER_PROBE_TIMEOUT_SECS", "0"),
            ]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verifier.toml");
        std::fs::write(
            &path,
            "endpoint_url = \"http://file.example\"\ndata_dir = \"/var/lib/verifier\"\n",
        )
        .unwrap();
        let name = dir.path().join("verifier");

        let settings = Settings::from_sources(
            name.to_str(),
            env(&[("OFFLINE_VERIFIER_DATA_DIR", "/tmp/override")]),
        )
        .unwrap();

        assert_eq!(settings.endpoint_url, "http://file.example");
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/override"));
    }
}
