//! SQLite-backed [`CertificateStorage`].
//!
//! Runtime defaults follow the other SQLite stores in this workspace:
//! - `journal_mode = WAL` so concurrent recovery runs can read while one writes
//! - `busy_timeout = 5s` to ride out transient lock contention

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use rusqlite::{Connection, OptionalExtension, params};

use super::schema;
use super::{
    AddCertificateRequest, AddPrecertificateRequest, CertificateStorage, StorageError,
    StoredRecord,
};
use crate::classify;
use crate::orphan::OrphanType;

/// Busy timeout used for storage connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Certificate storage on a single SQLite connection.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database, apply pragmas and migrate the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring or migrating fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create storage directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("open storage database {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate or migrate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory storage database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        configure_connection(&conn).context("configure sqlite pragmas")?;
        schema::migrate(&mut conn).context("apply storage migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored records of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRequest`] for [`OrphanType::Unknown`],
    /// or a backend failure.
    pub fn count(&self, typ: OrphanType) -> Result<u64, StorageError> {
        let table = table_for(typ)?;
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(backend)?;
        u64::try_from(count).map_err(|err| StorageError::Backend(err.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Backend("sqlite connection lock poisoned".to_string()))
    }

    fn get(&self, typ: OrphanType, serial: &str) -> Result<StoredRecord, StorageError> {
        let table = table_for(typ)?;
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT serial, reg_id, der FROM {table} WHERE serial = ?1"),
            params![serial],
            |row| {
                Ok(StoredRecord {
                    serial: row.get(0)?,
                    reg_id: row.get(1)?,
                    der: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(backend)?
        .ok_or_else(|| StorageError::NotFound(serial.to_string()))
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn table_for(typ: OrphanType) -> Result<&'static str, StorageError> {
    match typ {
        OrphanType::Certificate => Ok("certificates"),
        OrphanType::Precertificate => Ok("precertificates"),
        OrphanType::Unknown => Err(StorageError::InvalidRequest(
            "no table for unknown orphan type".to_string(),
        )),
    }
}

fn serial_of(der: &[u8]) -> Result<String, StorageError> {
    classify::parse_certificate(der)
        .map(|cert| cert.serial)
        .map_err(|err| StorageError::InvalidRequest(err.to_string()))
}

fn backend(err: rusqlite::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Only a primary-key collision means the serial is already stored; other
/// constraint failures are backend errors.
fn insert_error(err: rusqlite::Error, serial: &str) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            StorageError::Duplicate(serial.to_string())
        }
        _ => backend(err),
    }
}

impl CertificateStorage for SqliteStorage {
    fn add_certificate(&self, req: &AddCertificateRequest<'_>) -> Result<String, StorageError> {
        let serial = serial_of(req.der)?;
        let issued_at = req.issued.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO certificates (serial, reg_id, der, ocsp_response, issued_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![serial, req.reg_id, req.der, req.ocsp_response, issued_at],
        )
        .map_err(|err| insert_error(err, &serial))?;
        Ok(serial)
    }

    fn add_precertificate(&self, req: &AddPrecertificateRequest<'_>) -> Result<(), StorageError> {
        let serial = serial_of(req.der)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO precertificates (serial, reg_id, der, ocsp_response, issued_ns)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![serial, req.reg_id, req.der, req.ocsp_response, req.issued_nanos],
        )
        .map_err(|err| insert_error(err, &serial))?;
        Ok(())
    }

    fn get_certificate(&self, serial: &str) -> Result<StoredRecord, StorageError> {
        self.get(OrphanType::Certificate, serial)
    }

    fn get_precertificate(&self, serial: &str) -> Result<StoredRecord, StorageError> {
        self.get(OrphanType::Precertificate, serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_sets_wal_and_busy_timeout() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested/orphans.sqlite3");
        let storage = SqliteStorage::open(&path).expect("open storage");

        let conn = storage.lock().expect("lock");
        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );
    }

    #[test]
    fn lookup_of_missing_serial_is_not_found() {
        let storage = SqliteStorage::open_in_memory().expect("open storage");
        let err = storage
            .get_certificate(&"0".repeat(36))
            .expect_err("empty store");
        assert!(err.is_not_found());
        assert_eq!(storage.count(OrphanType::Certificate), Ok(0));
    }

    #[test]
    fn insert_rejects_non_certificate_der() {
        let storage = SqliteStorage::open_in_memory().expect("open storage");
        let err = storage
            .add_precertificate(&AddPrecertificateRequest {
                der: &[0x01, 0x02],
                reg_id: 1,
                ocsp_response: &[],
                issued_nanos: 0,
            })
            .expect_err("garbage DER");
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[test]
    fn only_primary_key_collisions_are_duplicates() {
        let storage = SqliteStorage::open_in_memory().expect("open storage");
        let conn = storage.lock().expect("lock");
        let insert = |serial: &str| {
            conn.execute(
                "INSERT INTO certificates (serial, reg_id, der, ocsp_response, issued_at)
                 VALUES (?1, 1, x'30', x'30', '2020-01-01T00:00:00Z')",
                params![serial],
            )
            .map(|_| ())
        };

        let serial = "0".repeat(36);
        insert(&serial).expect("first insert");
        let duplicate = insert(&serial).expect_err("primary key collision");
        assert_eq!(
            insert_error(duplicate, &serial),
            StorageError::Duplicate(serial.clone())
        );

        let short = insert("0a").expect_err("check constraint");
        assert!(matches!(
            insert_error(short, "0a"),
            StorageError::Backend(_)
        ));
    }

    #[test]
    fn unknown_type_has_no_table() {
        let storage = SqliteStorage::open_in_memory().expect("open storage");
        assert!(matches!(
            storage.count(OrphanType::Unknown),
            Err(StorageError::InvalidRequest(_))
        ));
    }
}
