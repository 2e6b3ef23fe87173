//! SQLite schema for the local storage backend.
//!
//! - `certificates` holds final certificates, issuance time as RFC 3339 text
//! - `precertificates` holds precertificates, issuance time as integer
//!   nanoseconds since the Unix epoch
//!
//! Both tables key on the canonical serial so a second insert for the same
//! serial fails with a constraint violation.

use rusqlite::{Connection, types::Type};

/// Migration v1: certificate and precertificate tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS certificates (
    serial TEXT PRIMARY KEY,
    reg_id INTEGER NOT NULL,
    der BLOB NOT NULL,
    ocsp_response BLOB NOT NULL,
    issued_at TEXT NOT NULL,
    CHECK (length(serial) >= 36)
);

CREATE TABLE IF NOT EXISTS precertificates (
    serial TEXT PRIMARY KEY,
    reg_id INTEGER NOT NULL,
    der BLOB NOT NULL,
    ocsp_response BLOB NOT NULL,
    issued_ns INTEGER NOT NULL,
    CHECK (length(serial) >= 36)
);
";

/// Migration v2: registration lookups.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_certificates_reg_id
    ON certificates(reg_id);

CREATE INDEX IF NOT EXISTS idx_precertificates_reg_id
    ON precertificates(reg_id);
";

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1_SQL), (2, MIGRATION_V2_SQL)];

/// Read `PRAGMA user_version` and convert it to a Rust `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the version value cannot be
/// represented as `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}
