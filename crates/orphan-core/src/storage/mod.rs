//! Storage collaborator contract and local backends.
//!
//! The recovery pipeline talks to storage only through
//! [`CertificateStorage`]. Lookups are keyed by the canonical serial string;
//! inserts carry the DER, the owning registration, a fresh OCSP response and
//! the reconstructed issuance time.

pub mod schema;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored certificate or precertificate as returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Canonical serial string.
    pub serial: String,
    /// Registration that owns the record.
    pub reg_id: i64,
    /// Raw DER.
    #[serde(with = "hex::serde")]
    pub der: Vec<u8>,
}

/// Insert request for a final certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCertificateRequest<'a> {
    pub der: &'a [u8],
    pub reg_id: i64,
    pub ocsp_response: &'a [u8],
    pub issued: DateTime<Utc>,
}

/// Insert request for a precertificate.
///
/// Precertificate storage keys issuance time as integer nanoseconds since
/// the Unix epoch rather than a structured timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPrecertificateRequest<'a> {
    pub der: &'a [u8],
    pub reg_id: i64,
    pub ocsp_response: &'a [u8],
    pub issued_nanos: i64,
}

/// Errors reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No record exists for the serial.
    #[error("no record found for serial {0}")]
    NotFound(String),

    /// The insert collided with an existing record (uniqueness constraint).
    #[error("record already exists for serial {0}")]
    Duplicate(String),

    /// The backend rejected the request as invalid.
    #[error("invalid storage request: {0}")]
    InvalidRequest(String),

    /// Transport or backend failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Operations the recovery pipeline needs from storage.
pub trait CertificateStorage: Send + Sync {
    /// Insert a final certificate, returning the stored serial.
    ///
    /// # Errors
    ///
    /// [`StorageError::Duplicate`] if the serial is already recorded, or any
    /// other backend failure.
    fn add_certificate(&self, req: &AddCertificateRequest<'_>) -> Result<String, StorageError>;

    /// Insert a precertificate.
    ///
    /// # Errors
    ///
    /// As for [`CertificateStorage::add_certificate`].
    fn add_precertificate(&self, req: &AddPrecertificateRequest<'_>) -> Result<(), StorageError>;

    /// Look up a final certificate by canonical serial.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] if absent, or any other backend failure.
    fn get_certificate(&self, serial: &str) -> Result<StoredRecord, StorageError>;

    /// Look up a precertificate by canonical serial.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] if absent, or any other backend failure.
    fn get_precertificate(&self, serial: &str) -> Result<StoredRecord, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_predicates() {
        assert!(StorageError::NotFound("01".into()).is_not_found());
        assert!(!StorageError::NotFound("01".into()).is_duplicate());
        assert!(StorageError::Duplicate("01".into()).is_duplicate());
        assert!(!StorageError::Backend("down".into()).is_not_found());
    }

    #[test]
    fn stored_record_serializes_der_as_hex() {
        let record = StoredRecord {
            serial: "0a".into(),
            reg_id: 7,
            der: vec![0x30, 0x01],
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["der"], "3001");
    }
}
