//! Orphan classification tags.
//!
//! The string form doubles as the label the CA writes when it orphans an
//! issuance (`orphaning certificate`, `orphaning precertificate`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of orphaned issuance record.
///
/// Derived from the parsed DER only. The label in a log line is a filter,
/// never a source of truth for the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanType {
    /// No certificate was available to classify.
    #[default]
    Unknown,
    /// A final certificate.
    Certificate,
    /// A precertificate carrying the CT poison extension.
    Precertificate,
}

/// Error returned when parsing an unknown orphan type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOrphanType {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownOrphanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown orphan type '{}': expected certificate or precertificate",
            self.raw
        )
    }
}

impl std::error::Error for UnknownOrphanType {}

impl OrphanType {
    /// Types that can be recovered, in log-label order.
    pub const RECOVERABLE: [Self; 2] = [Self::Certificate, Self::Precertificate];

    /// Return the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Certificate => "certificate",
            Self::Precertificate => "precertificate",
        }
    }

    /// The label the CA writes when orphaning this type, or `None` for
    /// [`OrphanType::Unknown`].
    #[must_use]
    pub const fn orphaning_label(self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Certificate => Some("orphaning certificate"),
            Self::Precertificate => Some("orphaning precertificate"),
        }
    }
}

impl fmt::Display for OrphanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrphanType {
    type Err = UnknownOrphanType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certificate" => Ok(Self::Certificate),
            "precertificate" => Ok(Self::Precertificate),
            _ => Err(UnknownOrphanType { raw: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_log_vocabulary() {
        assert_eq!(OrphanType::Unknown.to_string(), "unknown");
        assert_eq!(OrphanType::Certificate.to_string(), "certificate");
        assert_eq!(OrphanType::Precertificate.to_string(), "precertificate");
    }

    #[test]
    fn labels_embed_display_name() {
        for typ in OrphanType::RECOVERABLE {
            let label = typ.orphaning_label().expect("recoverable types have labels");
            assert_eq!(label, format!("orphaning {typ}"));
        }
        assert!(OrphanType::Unknown.orphaning_label().is_none());
    }

    #[test]
    fn unknown_is_not_parseable() {
        let err = "unknown".parse::<OrphanType>().expect_err("unknown is not a recoverable type");
        assert_eq!(err.raw, "unknown");
        assert_eq!(
            "precertificate".parse::<OrphanType>(),
            Ok(OrphanType::Precertificate)
        );
    }
}
