//! Fresh OCSP evidence for recovered records.
//!
//! Recovery only restores issuance records, never revocations, so every
//! request asks the signing authority for a `good` response with a zero
//! reason and zero revocation time.

use serde::{Deserialize, Serialize};

/// OCSP certificate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcspStatus {
    Good,
    Revoked,
}

impl OcspStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Revoked => "revoked",
        }
    }
}

/// Request to the signing authority for a signed OCSP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOcspRequest {
    #[serde(with = "hex::serde")]
    pub cert_der: Vec<u8>,
    pub status: OcspStatus,
    pub reason: i32,
    pub revoked_at: i64,
}

impl GenerateOcspRequest {
    /// A `good` status request for the given DER.
    #[must_use]
    pub fn good(cert_der: &[u8]) -> Self {
        Self {
            cert_der: cert_der.to_vec(),
            status: OcspStatus::Good,
            reason: 0,
            revoked_at: 0,
        }
    }
}

/// Failure talking to the signing authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OcspError {
    #[error("signing authority unavailable: {0}")]
    Unavailable(String),

    #[error("signing authority refused request: {0}")]
    Rejected(String),

    #[error("malformed response from signing authority: {0}")]
    MalformedResponse(String),
}

/// Signing-authority operations the recovery pipeline needs.
pub trait OcspGenerator: Send + Sync {
    /// Produce a signed OCSP response for the request.
    ///
    /// # Errors
    ///
    /// Returns [`OcspError`] if the authority is unreachable or refuses.
    fn generate_ocsp(&self, req: &GenerateOcspRequest) -> Result<Vec<u8>, OcspError>;
}

/// Request a fresh `good` OCSP response for `der`.
///
/// No retry is attempted; a failed candidate is recovered by re-running.
///
/// # Errors
///
/// Propagates the generator's [`OcspError`].
pub fn regenerate(generator: &dyn OcspGenerator, der: &[u8]) -> Result<Vec<u8>, OcspError> {
    generator.generate_ocsp(&GenerateOcspRequest::good(der))
}
