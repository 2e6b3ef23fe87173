//! Orphan candidate extraction from CA log text.
//!
//! A line is an orphan candidate when it carries one of the orphaning labels
//! and a `cert=` payload marker. Candidate lines are then expected to carry:
//!
//! ```text
//! ... orphaning precertificate ... cert=[<lowercase hex DER>] ... regID=[<digits>] ...
//! ```
//!
//! Scanning never fails: every line resolves to a [`ScanResult`]. The label
//! only selects lines; the orphan type is decided later from the DER itself.

use std::num::ParseIntError;
use std::sync::LazyLock;

use regex::Regex;

use crate::orphan::OrphanType;

/// Marker that must precede the hex DER payload.
pub const DER_MARKER: &str = "cert=";

static DER_PAYLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"cert=\[([0-9a-f]+)\]").expect("DER payload pattern is valid")
});

static REG_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"regID=\[([0-9]+)\]").expect("regID pattern is valid"));

/// An orphan candidate extracted from a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCandidate {
    /// Decoded DER bytes of the orphaned certificate or precertificate.
    pub der: Vec<u8>,
    /// Registration that requested the issuance.
    pub reg_id: i64,
}

/// Why a line that looked like an orphan record could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedLine {
    #[error("didn't match regex for cert")]
    MissingDer,

    #[error("couldn't decode hex: {0}")]
    InvalidHex(String),

    #[error("regID variable is empty")]
    MissingRegId,

    #[error("couldn't parse regID: {0}")]
    InvalidRegId(#[from] ParseIntError),
}

/// Tri-state outcome of scanning one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// Not an orphan record; skip silently.
    NoMatch,
    /// Looked like an orphan record but fields were unusable.
    Malformed(MalformedLine),
    /// A well-formed candidate.
    Candidate(LogCandidate),
}

impl ScanResult {
    /// Returns `true` when the line carried the orphan markers.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// Returns `true` if the line carries an orphaning label and the DER marker.
#[must_use]
pub fn has_orphan_markers(line: &str) -> bool {
    let labelled = OrphanType::RECOVERABLE
        .iter()
        .filter_map(|typ| typ.orphaning_label())
        .any(|label| line.contains(label));
    labelled && line.contains(DER_MARKER)
}

/// Scan one log line for an orphan candidate.
#[must_use]
pub fn scan_line(line: &str) -> ScanResult {
    if !has_orphan_markers(line) {
        return ScanResult::NoMatch;
    }

    match extract(line) {
        Ok(candidate) => ScanResult::Candidate(candidate),
        Err(reason) => ScanResult::Malformed(reason),
    }
}

fn extract(line: &str) -> Result<LogCandidate, MalformedLine> {
    let der_hex = DER_PAYLOAD
        .captures(line)
        .and_then(|caps| caps.get(1))
        .ok_or(MalformedLine::MissingDer)?;
    let der = hex::decode(der_hex.as_str())
        .map_err(|err| MalformedLine::InvalidHex(err.to_string()))?;

    let reg_raw = REG_ID
        .captures(line)
        .and_then(|caps| caps.get(1))
        .ok_or(MalformedLine::MissingRegId)?;
    let reg_id = reg_raw.as_str().parse::<i64>()?;

    Ok(LogCandidate { der, reg_id })
}
