//! Reconciliation driver.
//!
//! Runs each candidate through classify → existence check → OCSP
//! regeneration → backdating → persistence. Two entry points share that
//! pipeline:
//!
//! - [`Reconciler::run_batch`] scans a CA log, isolates failures per line and
//!   always returns a [`Tally`].
//! - [`Reconciler::recover`] handles a single DER with a caller-supplied
//!   registration id and surfaces any failure as a [`CandidateError`].
//!
//! Candidates are independent. Batch mode may fan out over a bounded number
//! of worker threads, each keeping its own [`Tally`] that is merged once all
//! workers finish. Concurrent inserts of the same serial resolve through the
//! storage uniqueness rule, never through locking here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::AUDIT_TARGET;
use crate::backdate::{BackdateError, BackdateOffset};
use crate::classify::{self, ClassifyError};
use crate::error::ErrorCode;
use crate::existence::{Existence, check_existence};
use crate::ocsp::{self, OcspError, OcspGenerator};
use crate::orphan::OrphanType;
use crate::persist::{self, PersistError, PersistRequest, Persisted};
use crate::scan::{MalformedLine, ScanResult, scan_line};
use crate::storage::{CertificateStorage, StorageError};
use crate::tally::{Outcome, Tally};

/// A candidate that made it through the pipeline without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    pub serial: String,
    pub orphan_type: OrphanType,
    /// Reconstructed issuance time; `None` when the existence check
    /// short-circuited.
    pub issued_at: Option<DateTime<Utc>>,
    pub disposition: Persisted,
}

/// Why a candidate was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CandidateError {
    #[error(transparent)]
    Malformed(#[from] MalformedLine),

    #[error(transparent)]
    Parse(#[from] ClassifyError),

    #[error("existing {orphan_type} lookup failed for serial {serial}: {source}")]
    LookupFailed {
        orphan_type: OrphanType,
        serial: String,
        source: StorageError,
    },

    #[error("couldn't generate OCSP for {orphan_type} {serial}: {source}")]
    OcspGenerationFailed {
        orphan_type: OrphanType,
        serial: String,
        source: OcspError,
    },

    #[error("couldn't compute issued time for {orphan_type} {serial}: {source}")]
    IssuedTime {
        orphan_type: OrphanType,
        serial: String,
        source: BackdateError,
    },

    #[error("failed to store {orphan_type} {serial}: {source}")]
    PersistFailed {
        orphan_type: OrphanType,
        serial: String,
        source: PersistError,
    },
}

impl CandidateError {
    /// Classification reached before the failure.
    #[must_use]
    pub const fn orphan_type(&self) -> OrphanType {
        match self {
            Self::Malformed(_) | Self::Parse(_) => OrphanType::Unknown,
            Self::LookupFailed { orphan_type, .. }
            | Self::OcspGenerationFailed { orphan_type, .. }
            | Self::IssuedTime { orphan_type, .. }
            | Self::PersistFailed { orphan_type, .. } => *orphan_type,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Malformed(_) => ErrorCode::MalformedCandidate,
            Self::Parse(_) => ErrorCode::CertificateParse,
            Self::LookupFailed { .. } => ErrorCode::LookupFailed,
            Self::OcspGenerationFailed { .. } => ErrorCode::OcspGenerationFailed,
            Self::IssuedTime { .. }
            | Self::PersistFailed {
                source: PersistError::IssuedOutOfRange(_),
                ..
            } => ErrorCode::IssuedTimeOutOfRange,
            Self::PersistFailed {
                source: PersistError::UnknownType,
                ..
            } => ErrorCode::UnknownOrphanType,
            Self::PersistFailed { .. } => ErrorCode::PersistFailed,
        }
    }

    /// Parse failures are ordinary errors; everything else goes to the
    /// audit channel.
    #[must_use]
    pub const fn is_audit(&self) -> bool {
        !matches!(self, Self::Parse(_))
    }
}

/// Emit the diagnostic for an abandoned candidate.
pub fn report_failure(err: &CandidateError, context: &str) {
    let code = err.code();
    let hint = code.hint().unwrap_or_default();
    if err.is_audit() {
        error!(target: AUDIT_TARGET, %code, hint, orphan_type = %err.orphan_type(), "{err}, [{context}]");
    } else {
        error!(%code, hint, orphan_type = %err.orphan_type(), "{err}, [{context}]");
    }
}

/// Pipeline over a storage and a signing authority with a fixed backdate.
#[derive(Clone, Copy)]
pub struct Reconciler<'a> {
    storage: &'a dyn CertificateStorage,
    ocsp: &'a dyn OcspGenerator,
    backdate: BackdateOffset,
    workers: usize,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(
        storage: &'a dyn CertificateStorage,
        ocsp: &'a dyn OcspGenerator,
        backdate: BackdateOffset,
    ) -> Self {
        Self {
            storage,
            ocsp,
            backdate,
            workers: 1,
        }
    }

    /// Process batch lines on up to `workers` threads (minimum one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub const fn backdate(&self) -> BackdateOffset {
        self.backdate
    }

    /// Recover one DER for `reg_id`.
    ///
    /// An already-recorded serial, found either by the existence check or by
    /// an insert collision, is a successful [`Persisted::AlreadyExists`].
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError`] for every other failure. No stage retries.
    pub fn recover(&self, der: &[u8], reg_id: i64) -> Result<Recovered, CandidateError> {
        let (cert, orphan_type) = classify::classify(der)?;
        let serial = cert.serial;

        match check_existence(self.storage, &serial, orphan_type) {
            Existence::NotFound => {}
            Existence::AlreadyExists => {
                return Ok(Recovered {
                    serial,
                    orphan_type,
                    issued_at: None,
                    disposition: Persisted::AlreadyExists,
                });
            }
            Existence::LookupFailed(source) => {
                return Err(CandidateError::LookupFailed {
                    orphan_type,
                    serial,
                    source,
                });
            }
        }

        let ocsp_response = match ocsp::regenerate(self.ocsp, der) {
            Ok(response) => response,
            Err(source) => {
                return Err(CandidateError::OcspGenerationFailed {
                    orphan_type,
                    serial,
                    source,
                });
            }
        };

        let issued = match self.backdate.issued_time(cert.not_before) {
            Ok(issued) => issued,
            Err(source) => {
                return Err(CandidateError::IssuedTime {
                    orphan_type,
                    serial,
                    source,
                });
            }
        };

        debug!(
            %serial,
            %orphan_type,
            not_before = %cert.not_before,
            %issued,
            reg_id,
            "storing recovered orphan"
        );

        let request = PersistRequest {
            orphan_type,
            der,
            reg_id,
            ocsp_response: &ocsp_response,
            issued,
        };
        match persist::persist(self.storage, &request) {
            Ok(disposition) => Ok(Recovered {
                serial,
                orphan_type,
                issued_at: Some(issued),
                disposition,
            }),
            Err(source) => Err(CandidateError::PersistFailed {
                orphan_type,
                serial,
                source,
            }),
        }
    }

    /// Scan and, if it is an orphan record, recover one log line.
    ///
    /// Never fails: every problem is reported as a diagnostic and folded into
    /// the returned [`Outcome`].
    #[must_use]
    pub fn process_line(&self, line: &str) -> Outcome {
        let candidate = match scan_line(line) {
            ScanResult::NoMatch => return Outcome::unmatched(),
            ScanResult::Malformed(reason) => {
                report_failure(&CandidateError::from(reason), line);
                return Outcome::abandoned(OrphanType::Unknown);
            }
            ScanResult::Candidate(candidate) => candidate,
        };

        match self.recover(&candidate.der, candidate.reg_id) {
            Ok(Recovered {
                disposition: Persisted::Stored,
                orphan_type,
                ..
            }) => Outcome::stored(orphan_type),
            Ok(Recovered {
                disposition: Persisted::AlreadyExists,
                orphan_type,
                serial,
                ..
            }) => {
                info!(%serial, %orphan_type, "{orphan_type} already exists in storage, [{line}]");
                Outcome::abandoned(orphan_type)
            }
            Err(err) => {
                report_failure(&err, line);
                Outcome::abandoned(err.orphan_type())
            }
        }
    }

    /// Process every non-empty line of a CA log and return the counters.
    #[must_use]
    pub fn run_batch(&self, log: &str) -> Tally {
        let lines: Vec<&str> = log.lines().filter(|line| !line.is_empty()).collect();
        let workers = self.workers.min(lines.len());

        let tally = if workers <= 1 {
            self.drain(&lines, &AtomicUsize::new(0))
        } else {
            self.run_workers(&lines, workers)
        };

        tally.log_summary();
        tally
    }

    fn run_workers(&self, lines: &[&str], workers: usize) -> Tally {
        let next = AtomicUsize::new(0);
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| scope.spawn(|| self.drain(lines, &next)))
                .collect();

            let mut tally = Tally::default();
            for handle in handles {
                match handle.join() {
                    Ok(worker_tally) => tally.merge(worker_tally),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            tally
        })
    }

    fn drain(&self, lines: &[&str], next: &AtomicUsize) -> Tally {
        let mut tally = Tally::default();
        while let Some(line) = lines.get(next.fetch_add(1, Ordering::Relaxed)) {
            tally.record(self.process_line(line));
        }
        tally
    }
}
