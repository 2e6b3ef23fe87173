//! TOML configuration for a recovery run.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backdate::BackdateOffset;
use crate::error::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanFinderConfig {
    /// Offset added to `NotBefore` to reconstruct issuance time.
    pub backdate: BackdateOffset,
    #[serde(default = "default_workers")]
    pub workers: usize,
    pub storage: StorageConfig,
    pub ocsp_generator: RemoteServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Remote(RemoteServiceConfig),
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteServiceConfig {
    pub url: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl RemoteServiceConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: default_timeout(),
        }
    }
}

/// Parse configuration text.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or a value is out of range.
pub fn parse_config(content: &str) -> Result<OrphanFinderConfig> {
    let config: OrphanFinderConfig = toml::from_str(content)?;
    if config.workers == 0 {
        bail!("workers must be at least 1");
    }
    if let StorageConfig::Remote(remote) = &config.storage {
        validate_url("storage.url", &remote.url)?;
    }
    validate_url("ocsp_generator.url", &config.ocsp_generator.url)?;
    Ok(config)
}

/// Read and parse the configuration file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn load_config(path: &Path) -> Result<OrphanFinderConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_config(&content).with_context(|| {
        let code = ErrorCode::ConfigParseError;
        format!("{code}: {} {}", code.message(), path.display())
    })
}

fn validate_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        bail!("{field} must be an http:// or https:// URL, got '{url}'")
    }
}

const fn default_workers() -> usize {
    1
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
