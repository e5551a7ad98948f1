//! Configuration
//!
//! TOML file with environment overrides. Every field has a default, so an
//! absent file is not an error.
//!
//! ## Resolution
//! 1. an explicit path (`--config FILE`), which must exist
//! 2. the path in `CRYPTDESK_CONFIG`, which must exist
//! 3. `./cryptdesk.toml`, if present
//! 4. built-in defaults
//!
//! ## Environment Variables
//! - `CRYPTDESK_CONFIG`: config file path
//! - `CRYPTDESK_SERVICE_URL`: overrides `service.url`
//! - `CRYPTDESK_TIMEOUT_SECS`: overrides `service.timeout_secs`
//!
//! ## Example
//! ```toml
//! [service]
//! url = "http://127.0.0.1:5000"
//! timeout_secs = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::client::HttpCryptoService;
use crate::error::{CryptdeskError, ErrorCategory, ErrorKind, Result};

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_CONFIG_FILE: &str = "cryptdesk.toml";

pub const ENV_CONFIG: &str = "CRYPTDESK_CONFIG";
pub const ENV_SERVICE_URL: &str = "CRYPTDESK_SERVICE_URL";
pub const ENV_TIMEOUT_SECS: &str = "CRYPTDESK_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Base URL; `/encrypt` and `/decrypt` are resolved against it.
    pub url: String,
    /// Per-request timeout. `None` waits for the service indefinitely.
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVICE_URL.to_string(),
            timeout_secs: None,
            user_agent: concat!("cryptdesk/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ServiceConfig {
    /// Build the HTTP client this configuration describes.
    pub fn client(&self) -> Result<HttpCryptoService> {
        let mut builder = HttpCryptoService::builder(&self.url).user_agent(&self.user_agent);
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

impl Config {
    /// Load using the process environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |name| std::env::var(name).ok())
    }

    /// Load using `env` as the environment lookup.
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let required = explicit
            .map(Path::to_path_buf)
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from));

        let mut config = match required {
            Some(path) => Self::from_file(&path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    debug!("no config file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(env)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CryptdeskError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Config,
                format!("failed to read config {}", path.display()),
                e,
            )
        })?;
        let config = Self::from_toml(&text)
            .map_err(|e| e.with_context(format!("invalid config {}", path.display())))?;
        debug!(path = %path.display(), "configuration loaded from file");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            CryptdeskError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Config,
                format!("invalid configuration: {}", e.message()),
                e,
            )
        })
    }

    /// Apply `CRYPTDESK_*` overrides on top of file values.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = env(ENV_SERVICE_URL) {
            self.service.url = url;
        }
        if let Some(raw) = env(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                CryptdeskError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Config,
                    format!(
                        "{} must be a whole number of seconds, got {:?}",
                        ENV_TIMEOUT_SECS, raw
                    ),
                    e,
                )
            })?;
            self.service.timeout_secs = Some(secs);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.service.url, "http://127.0.0.1:5000");
        assert_eq!(config.service.timeout_secs, None);
        assert!(config.service.user_agent.starts_with("cryptdesk/"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("[service]\ntimeout_secs = 5\n").unwrap();
        assert_eq!(config.service.url, DEFAULT_SERVICE_URL);
        assert_eq!(config.service.timeout_secs, Some(5));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_toml("[service]\nurll = \"http://x\"\n").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Config));
    }

    #[test]
    fn test_explicit_file_and_env_override() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cryptdesk.toml");
        fs::write(&path, "[service]\nurl = \"http://file:1\"\ntimeout_secs = 9\n").unwrap();

        let config = Config::load_with(Some(path.as_path()), env_from(&[])).unwrap();
        assert_eq!(config.service.url, "http://file:1");

        let config = Config::load_with(
            Some(path.as_path()),
            env_from(&[(ENV_SERVICE_URL, "http://env:2"), (ENV_TIMEOUT_SECS, "3")]),
        )
        .unwrap();
        assert_eq!(config.service.url, "http://env:2");
        assert_eq!(config.service.timeout_secs, Some(3));
    }

    #[test]
    fn test_config_path_from_env() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("other.toml");
        fs::write(&path, "[service]\nurl = \"http://other:7\"\n").unwrap();

        let config =
            Config::load_with(None, env_from(&[(ENV_CONFIG, path.to_str().unwrap())])).unwrap();
        assert_eq!(config.service.url, "http://other:7");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let absent = temp_dir.path().join("absent.toml");
        let err = Config::load_with(Some(absent.as_path()), env_from(&[])).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Config));
    }

    #[test]
    fn test_bad_timeout_env_is_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(env_from(&[(ENV_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Config));
    }

    #[test]
    fn test_client_from_config() {
        let service = ServiceConfig::default().client().unwrap();
        assert_eq!(service.base_url().as_str(), "http://127.0.0.1:5000/");

        let bad = ServiceConfig {
            url: "::".into(),
            ..ServiceConfig::default()
        };
        assert!(bad.client().is_err());
    }
}
