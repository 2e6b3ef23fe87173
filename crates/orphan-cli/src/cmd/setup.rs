//! Config-to-collaborator wiring shared by both subcommands.

use std::path::Path;

use anyhow::{Context, Result};
use orphan_core::config::{OrphanFinderConfig, StorageConfig, load_config};
use orphan_core::ocsp::OcspGenerator;
use orphan_core::storage::CertificateStorage;
use orphan_core::storage::sqlite::SqliteStorage;
use tracing::debug;

use crate::remote::{RemoteOcspGenerator, RemoteStorage};

/// Loaded configuration plus the clients it describes.
pub struct Session {
    pub config: OrphanFinderConfig,
    pub storage: Box<dyn CertificateStorage>,
    pub ocsp: Box<dyn OcspGenerator>,
}

pub fn open_session(config_path: &Path) -> Result<Session> {
    let config = load_config(config_path)?;

    let storage: Box<dyn CertificateStorage> = match &config.storage {
        StorageConfig::Remote(remote) => {
            debug!(url = %remote.url, timeout = ?remote.timeout, "using remote storage");
            Box::new(RemoteStorage::new(remote))
        }
        StorageConfig::Sqlite { path } => {
            debug!(path = %path.display(), "using sqlite storage");
            Box::new(
                SqliteStorage::open(path)
                    .with_context(|| format!("open sqlite storage {}", path.display()))?,
            )
        }
    };
    let ocsp = Box::new(RemoteOcspGenerator::new(&config.ocsp_generator));

    Ok(Session {
        config,
        storage,
        ocsp,
    })
}
