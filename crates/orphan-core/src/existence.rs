//! Duplicate avoidance: is this candidate already recorded?

use crate::orphan::OrphanType;
use crate::storage::{CertificateStorage, StorageError};

/// Result of an existence lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    /// Storage already records the serial; recovery is a no-op.
    AlreadyExists,
    /// Storage has no record; the only outcome that permits persistence.
    NotFound,
    /// The lookup itself failed.
    LookupFailed(StorageError),
}

/// Look the serial up in the store matching `typ`.
///
/// [`OrphanType::Unknown`] cannot be looked up and reports
/// [`Existence::LookupFailed`].
#[must_use]
pub fn check_existence(
    storage: &dyn CertificateStorage,
    serial: &str,
    typ: OrphanType,
) -> Existence {
    let lookup = match typ {
        OrphanType::Certificate => storage.get_certificate(serial),
        OrphanType::Precertificate => storage.get_precertificate(serial),
        OrphanType::Unknown => {
            return Existence::LookupFailed(StorageError::InvalidRequest(
                "unknown orphan type".to_string(),
            ));
        }
    };

    match lookup {
        Ok(_) => Existence::AlreadyExists,
        Err(StorageError::NotFound(_)) => Existence::NotFound,
        Err(err) => Existence::LookupFailed(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doubles::MemoryStorage;

    const SERIAL: &str = "000000000000000000000000000000000abc";

    #[test]
    fn empty_store_reports_not_found() {
        let storage = MemoryStorage::new();
        assert_eq!(
            check_existence(&storage, SERIAL, OrphanType::Certificate),
            Existence::NotFound
        );
        assert_eq!(storage.lookups(), 1);
    }

    #[test]
    fn lookup_targets_store_for_type() {
        let storage = MemoryStorage::new();
        storage.seed(OrphanType::Precertificate, SERIAL, 1);

        assert_eq!(
            check_existence(&storage, SERIAL, OrphanType::Precertificate),
            Existence::AlreadyExists
        );
        assert_eq!(
            check_existence(&storage, SERIAL, OrphanType::Certificate),
            Existence::NotFound
        );
    }

    #[test]
    fn backend_errors_are_lookup_failures() {
        let storage = MemoryStorage::new();
        storage.fail_lookups(StorageError::Backend("connection refused".into()));
        assert_eq!(
            check_existence(&storage, SERIAL, OrphanType::Certificate),
            Existence::LookupFailed(StorageError::Backend("connection refused".into()))
        );
    }

    #[test]
    fn unknown_type_never_reaches_storage() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            check_existence(&storage, SERIAL, OrphanType::Unknown),
            Existence::LookupFailed(StorageError::InvalidRequest(_))
        ));
        assert_eq!(storage.lookups(), 0);
    }
}
