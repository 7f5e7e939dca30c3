//! Client configuration for fage
//!
//! Stored in `<config_dir>/fage/config.toml`. A missing file yields defaults;
//! a malformed one is an error so typos don't silently point at the wrong API.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Where the API redirects the browser after a platform OAuth flow
pub const DEFAULT_RETURN_ADDRESS: &str = "127.0.0.1:3001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FageConfig {
    /// Base URL of the dashboard API, including the `/api` prefix
    pub api_url: String,

    /// Local address the OAuth return listener binds to
    pub return_address: SocketAddr,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// How long `connect` waits for the browser to come back
    pub connect_timeout_secs: u64,

    /// Override for the session token file
    pub token_path: Option<PathBuf>,
}

impl Default for FageConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            return_address: SocketAddr::from(([127, 0, 0, 1], 3001)),
            request_timeout_secs: 30,
            connect_timeout_secs: 300,
            token_path: None,
        }
    }
}

impl FageConfig {
    /// `<config_dir>/fage/config.toml`
    pub fn default_path() -> Result<PathBuf, CoreError> {
        dirs::config_dir()
            .map(|dir| dir.join("fage").join("config.toml"))
            .ok_or(CoreError::DirectoryNotFound { kind: "config" })
    }

    /// Load from `path`; defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CoreError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = toml::from_str(&content).map_err(|e| CoreError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;

        debug!(path = %path.display(), api_url = %config.api_url, "Config loaded");
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), CoreError> {
        let invalid = |message: &str| CoreError::InvalidConfig {
            path: path.to_path_buf(),
            message: message.to_string(),
        };

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(invalid("api_url must start with http:// or https://"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs must be greater than 0"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(invalid("connect_timeout_secs must be greater than 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = FageConfig::load(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, FageConfig::default());
        assert_eq!(config.return_address.to_string(), DEFAULT_RETURN_ADDRESS);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "api_url = \"https://fage.example.com/api\"\nrequest_timeout_secs = 5\n",
        )
        .unwrap();

        let config = FageConfig::load(&path).unwrap();
        assert_eq!(config.api_url, "https://fage.example.com/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout_secs, 300);
    }

    #[test]
    fn test_malformed_file_is_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = [").unwrap();

        assert!(matches!(
            FageConfig::load(&path),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"ftp://example.com\"\n").unwrap();

        let err = FageConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("api_url"));
    }
}
