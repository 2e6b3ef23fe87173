//! Per-run outcome accounting.

use serde::Serialize;
use tracing::info;

use crate::orphan::OrphanType;

/// What happened to one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// The input was recognised as an orphan record.
    pub matched: bool,
    /// A new record was durably written this run.
    pub stored: bool,
    /// Classification, [`OrphanType::Unknown`] if it never got that far.
    pub orphan_type: OrphanType,
}

impl Outcome {
    /// Input was not an orphan record.
    #[must_use]
    pub const fn unmatched() -> Self {
        Self {
            matched: false,
            stored: false,
            orphan_type: OrphanType::Unknown,
        }
    }

    /// Recognised but not persisted, for any reason.
    #[must_use]
    pub const fn abandoned(orphan_type: OrphanType) -> Self {
        Self {
            matched: true,
            stored: false,
            orphan_type,
        }
    }

    /// Recognised and newly stored.
    #[must_use]
    pub const fn stored(orphan_type: OrphanType) -> Self {
        Self {
            matched: true,
            stored: true,
            orphan_type,
        }
    }
}

/// Found/added counters for each recoverable type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub certificates_found: u64,
    pub certificates_added: u64,
    pub precertificates_found: u64,
    pub precertificates_added: u64,
}

impl Tally {
    /// Count one outcome. Unmatched outcomes and matched outcomes of unknown
    /// type are not counted.
    pub fn record(&mut self, outcome: Outcome) {
        if !outcome.matched {
            return;
        }

        let (found, added) = match outcome.orphan_type {
            OrphanType::Certificate => (&mut self.certificates_found, &mut self.certificates_added),
            OrphanType::Precertificate => (
                &mut self.precertificates_found,
                &mut self.precertificates_added,
            ),
            // The failure behind an unclassified match was already reported.
            OrphanType::Unknown => return,
        };

        *found += 1;
        if outcome.stored {
            *added += 1;
        }
    }

    /// Fold another worker's counters into this one.
    pub const fn merge(&mut self, other: Self) {
        self.certificates_found += other.certificates_found;
        self.certificates_added += other.certificates_added;
        self.precertificates_found += other.precertificates_found;
        self.precertificates_added += other.precertificates_added;
    }

    /// `(found, added)` for a recoverable type; zeros for unknown.
    #[must_use]
    pub const fn counts(&self, typ: OrphanType) -> (u64, u64) {
        match typ {
            OrphanType::Certificate => (self.certificates_found, self.certificates_added),
            OrphanType::Precertificate => (self.precertificates_found, self.precertificates_added),
            OrphanType::Unknown => (0, 0),
        }
    }

    /// Emit the run summary at info level.
    pub fn log_summary(&self) {
        for typ in OrphanType::RECOVERABLE {
            let (found, added) = self.counts(typ);
            info!("Found {found} {typ} orphans and added {added} to the database");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_outcomes_are_ignored() {
        let mut tally = Tally::default();
        tally.record(Outcome::unmatched());
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn unknown_type_is_not_counted() {
        let mut tally = Tally::default();
        tally.record(Outcome::abandoned(OrphanType::Unknown));
        assert_eq!(tally, Tally::default());
    }

    #[test]
    fn found_and_added_are_tracked_per_type() {
        let mut tally = Tally::default();
        tally.record(Outcome::stored(OrphanType::Certificate));
        tally.record(Outcome::abandoned(OrphanType::Certificate));
        tally.record(Outcome::stored(OrphanType::Precertificate));

        assert_eq!(tally.counts(OrphanType::Certificate), (2, 1));
        assert_eq!(tally.counts(OrphanType::Precertificate), (1, 1));
        assert_eq!(tally.counts(OrphanType::Unknown), (0, 0));
    }

    #[test]
    fn merge_adds_all_counters() {
        let mut left = Tally {
            certificates_found: 1,
            certificates_added: 1,
            precertificates_found: 2,
            precertificates_added: 0,
        };
        left.merge(Tally {
            certificates_found: 3,
            certificates_added: 2,
            precertificates_found: 1,
            precertificates_added: 1,
        });
        assert_eq!(
            left,
            Tally {
                certificates_found: 4,
                certificates_added: 3,
                precertificates_found: 3,
                precertificates_added: 1,
            }
        );
    }
}
