//! Type-dispatched insert of a recovered orphan.

use chrono::{DateTime, Utc};

use crate::orphan::OrphanType;
use crate::storage::{
    AddCertificateRequest, AddPrecertificateRequest, CertificateStorage, StorageError,
};

/// Everything needed to write one recovered orphan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistRequest<'a> {
    pub orphan_type: OrphanType,
    pub der: &'a [u8],
    pub reg_id: i64,
    pub ocsp_response: &'a [u8],
    pub issued: DateTime<Utc>,
}

/// Non-error insert outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    /// A new record was written.
    Stored,
    /// Storage rejected the insert as a duplicate; another writer got there
    /// first.
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    #[error("issued time {0} cannot be expressed as nanoseconds since the epoch")]
    IssuedOutOfRange(DateTime<Utc>),

    #[error("cannot store orphan of unknown type")]
    UnknownType,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Insert the orphan through the type-appropriate storage call.
///
/// Precertificate storage takes issuance time as integer nanoseconds, so the
/// conversion happens here and nowhere earlier. A uniqueness violation is
/// reported as [`Persisted::AlreadyExists`], not an error.
///
/// # Errors
///
/// Returns [`PersistError`] for any failure other than a duplicate.
pub fn persist(
    storage: &dyn CertificateStorage,
    req: &PersistRequest<'_>,
) -> Result<Persisted, PersistError> {
    let result = match req.orphan_type {
        OrphanType::Certificate => storage
            .add_certificate(&AddCertificateRequest {
                der: req.der,
                reg_id: req.reg_id,
                ocsp_response: req.ocsp_response,
                issued: req.issued,
            })
            .map(|_| ()),
        OrphanType::Precertificate => {
            let issued_nanos = req
                .issued
                .timestamp_nanos_opt()
                .ok_or(PersistError::IssuedOutOfRange(req.issued))?;
            storage.add_precertificate(&AddPrecertificateRequest {
                der: req.der,
                reg_id: req.reg_id,
                ocsp_response: req.ocsp_response,
                issued_nanos,
            })
        }
        OrphanType::Unknown => return Err(PersistError::UnknownType),
    };

    match result {
        Ok(()) => Ok(Persisted::Stored),
        Err(StorageError::Duplicate(_)) => Ok(Persisted::AlreadyExists),
        Err(err) => Err(err.into()),
    }
}
