//! Stable error-code catalogue for diagnostics.

use std::fmt;

/// Machine-readable error codes for candidate and run failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MalformedCandidate,
    CertificateParse,
    UnknownOrphanType,
    LookupFailed,
    OcspGenerationFailed,
    IssuedTimeOutOfRange,
    PersistFailed,
}

impl ErrorCode {
    /// All codes in catalogue order.
    pub const ALL: [Self; 8] = [
        Self::ConfigParseError,
        Self::MalformedCandidate,
        Self::CertificateParse,
        Self::UnknownOrphanType,
        Self::LookupFailed,
        Self::OcspGenerationFailed,
        Self::IssuedTimeOutOfRange,
        Self::PersistFailed,
    ];

    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::MalformedCandidate => "E2001",
            Self::CertificateParse => "E2002",
            Self::UnknownOrphanType => "E2003",
            Self::LookupFailed => "E3001",
            Self::OcspGenerationFailed => "E3002",
            Self::IssuedTimeOutOfRange => "E4001",
            Self::PersistFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::MalformedCandidate => "Orphan log line is malformed",
            Self::CertificateParse => "Orphan DER does not parse as a certificate",
            Self::UnknownOrphanType => "Orphan type could not be determined",
            Self::LookupFailed => "Existing record lookup failed",
            Self::OcspGenerationFailed => "OCSP response generation failed",
            Self::IssuedTimeOutOfRange => "Issued time is out of range",
            Self::PersistFailed => "Failed to store orphan",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in the TOML config file and retry."),
            Self::MalformedCandidate => {
                Some("Check that the line carries cert=[<hex>] and regID=[<digits>].")
            }
            Self::CertificateParse | Self::UnknownOrphanType => None,
            Self::LookupFailed | Self::OcspGenerationFailed | Self::PersistFailed => {
                Some("Re-run recovery once the remote service is healthy; it is safe to repeat.")
            }
            Self::IssuedTimeOutOfRange => Some("Check the configured backdate offset."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
