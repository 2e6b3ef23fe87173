//! Deterministic in-memory collaborators.
//!
//! [`MemoryStorage`] and [`ScriptedOcspGenerator`] stand in for the storage
//! and signing authorities in tests and dry runs. Both record every call
//! and can be scripted to fail.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::classify;
use crate::ocsp::{GenerateOcspRequest, OcspError, OcspGenerator};
use crate::orphan::OrphanType;
use crate::storage::{
    AddCertificateRequest, AddPrecertificateRequest, CertificateStorage, StorageError,
    StoredRecord,
};

/// Issuance time as it reached storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedIssued {
    At(DateTime<Utc>),
    Nanos(i64),
}

/// A record held by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub reg_id: i64,
    pub der: Vec<u8>,
    pub ocsp_response: Vec<u8>,
    pub issued: Option<RecordedIssued>,
}

#[derive(Debug, Default)]
struct StorageState {
    certificates: BTreeMap<String, MemoryRecord>,
    precertificates: BTreeMap<String, MemoryRecord>,
    lookup_failure: Option<StorageError>,
    insert_failure: Option<StorageError>,
    lookups: usize,
    inserts: usize,
}

impl StorageState {
    fn table(&mut self, typ: OrphanType) -> Option<&mut BTreeMap<String, MemoryRecord>> {
        match typ {
            OrphanType::Certificate => Some(&mut self.certificates),
            OrphanType::Precertificate => Some(&mut self.precertificates),
            OrphanType::Unknown => None,
        }
    }

    fn lookup(&mut self, typ: OrphanType, serial: &str) -> Result<StoredRecord, StorageError> {
        self.lookups += 1;
        if let Some(err) = &self.lookup_failure {
            return Err(err.clone());
        }
        self.table(typ)
            .and_then(|table| table.get(serial))
            .map(|record| StoredRecord {
                serial: serial.to_string(),
                reg_id: record.reg_id,
                der: record.der.clone(),
            })
            .ok_or_else(|| StorageError::NotFound(serial.to_string()))
    }

    fn insert(
        &mut self,
        typ: OrphanType,
        der: &[u8],
        record: MemoryRecord,
    ) -> Result<String, StorageError> {
        self.inserts += 1;
        if let Some(err) = &self.insert_failure {
            return Err(err.clone());
        }
        let serial = classify::parse_certificate(der)
            .map_err(|err| StorageError::InvalidRequest(err.to_string()))?
            .serial;
        let table = self
            .table(typ)
            .ok_or_else(|| StorageError::InvalidRequest("unknown orphan type".to_string()))?;
        if table.contains_key(&serial) {
            return Err(StorageError::Duplicate(serial));
        }
        table.insert(serial.clone(), record);
        Ok(serial)
    }
}

/// In-memory [`CertificateStorage`] with scripted failures.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<StorageState>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StorageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pretend a record for `serial` was stored by an earlier run.
    pub fn seed(&self, typ: OrphanType, serial: &str, reg_id: i64) {
        if let Some(table) = self.state().table(typ) {
            table.insert(
                serial.to_string(),
                MemoryRecord {
                    reg_id,
                    der: Vec::new(),
                    ocsp_response: Vec::new(),
                    issued: None,
                },
            );
        }
    }

    /// Make every subsequent lookup fail with `err`.
    pub fn fail_lookups(&self, err: StorageError) {
        self.state().lookup_failure = Some(err);
    }

    /// Make every subsequent insert fail with `err`.
    pub fn fail_inserts(&self, err: StorageError) {
        self.state().insert_failure = Some(err);
    }

    /// Number of lookups performed.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.state().lookups
    }

    /// Number of inserts attempted, successful or not.
    #[must_use]
    pub fn inserts(&self) -> usize {
        self.state().inserts
    }

    /// Number of records held for `typ`.
    #[must_use]
    pub fn stored(&self, typ: OrphanType) -> usize {
        self.state().table(typ).map_or(0, |table| table.len())
    }

    /// The record held for `serial`, if any.
    #[must_use]
    pub fn record(&self, typ: OrphanType, serial: &str) -> Option<MemoryRecord> {
        self.state()
            .table(typ)
            .and_then(|table| table.get(serial).cloned())
    }
}

impl CertificateStorage for MemoryStorage {
    fn add_certificate(&self, req: &AddCertificateRequest<'_>) -> Result<String, StorageError> {
        self.state().insert(
            OrphanType::Certificate,
            req.der,
            MemoryRecord {
                reg_id: req.reg_id,
                der: req.der.to_vec(),
                ocsp_response: req.ocsp_response.to_vec(),
                issued: Some(RecordedIssued::At(req.issued)),
            },
        )
    }

    fn add_precertificate(&self, req: &AddPrecertificateRequest<'_>) -> Result<(), StorageError> {
        self.state()
            .insert(
                OrphanType::Precertificate,
                req.der,
                MemoryRecord {
                    reg_id: req.reg_id,
                    der: req.der.to_vec(),
                    ocsp_response: req.ocsp_response.to_vec(),
                    issued: Some(RecordedIssued::Nanos(req.issued_nanos)),
                },
            )
            .map(|_| ())
    }

    fn get_certificate(&self, serial: &str) -> Result<StoredRecord, StorageError> {
        self.state().lookup(OrphanType::Certificate, serial)
    }

    fn get_precertificate(&self, serial: &str) -> Result<StoredRecord, StorageError> {
        self.state().lookup(OrphanType::Precertificate, serial)
    }
}

#[derive(Debug, Default)]
struct GeneratorState {
    requests: Vec<GenerateOcspRequest>,
    failure: Option<OcspError>,
}

/// [`OcspGenerator`] returning a fixed response or a scripted failure.
#[derive(Debug)]
pub struct ScriptedOcspGenerator {
    response: Vec<u8>,
    state: Mutex<GeneratorState>,
}

impl ScriptedOcspGenerator {
    /// Always answer with `response`.
    #[must_use]
    pub fn new(response: impl Into<Vec<u8>>) -> Self {
        Self {
            response: response.into(),
            state: Mutex::default(),
        }
    }

    /// Always fail with `err`.
    #[must_use]
    pub fn failing(err: OcspError) -> Self {
        let generator = Self::new(Vec::new());
        generator.fail_with(err);
        generator
    }

    /// Make every subsequent call fail with `err`.
    pub fn fail_with(&self, err: OcspError) {
        self.state().failure = Some(err);
    }

    fn state(&self) -> MutexGuard<'_, GeneratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of generation requests received.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.state().requests.len()
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<GenerateOcspRequest> {
        self.state().requests.clone()
    }
}

impl OcspGenerator for ScriptedOcspGenerator {
    fn generate_ocsp(&self, req: &GenerateOcspRequest) -> Result<Vec<u8>, OcspError> {
        let mut state = self.state();
        state.requests.push(req.clone());
        match &state.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.response.clone()),
        }
    }
}
