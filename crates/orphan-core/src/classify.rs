//! DER parsing and certificate/precertificate classification.

use chrono::{DateTime, Utc};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::orphan::OrphanType;

/// RFC 6962 §3.1 precertificate poison extension.
pub const CT_POISON_OID: &str = "1.3.6.1.4.1.11129.2.4.3";

/// Width of the canonical serial string used as the storage key.
pub const SERIAL_HEX_WIDTH: usize = 36;

/// The fields of a decoded certificate the recovery pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCertificate {
    /// Canonical serial string (see [`serial_to_string`]).
    pub serial: String,
    /// Validity start.
    pub not_before: DateTime<Utc>,
    /// Dotted OIDs of every extension, in certificate order.
    pub extension_oids: Vec<String>,
}

impl ParsedCertificate {
    /// Returns `true` if the CT poison extension is present.
    #[must_use]
    pub fn has_ct_poison(&self) -> bool {
        self.extension_oids.iter().any(|oid| oid == CT_POISON_OID)
    }
}

/// Errors produced while decoding an orphan's DER.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("failed to parse orphan DER: {0}")]
    Der(String),

    #[error("failed to parse orphan DER: {0} trailing bytes after certificate")]
    TrailingData(usize),

    #[error("certificate NotBefore ({0}s since epoch) is not representable")]
    NotBeforeOutOfRange(i64),
}

/// Render a certificate serial the way storage keys it: lowercase hex of
/// the unsigned magnitude, zero-padded to [`SERIAL_HEX_WIDTH`] characters.
///
/// Longer serials are rendered without padding.
#[must_use]
pub fn serial_to_string(raw_serial: &[u8]) -> String {
    let encoded = hex::encode(raw_serial);
    let digits = encoded.trim_start_matches('0');
    format!("{digits:0>SERIAL_HEX_WIDTH$}")
}

/// Decode DER into a [`ParsedCertificate`].
///
/// # Errors
///
/// Returns [`ClassifyError`] if the bytes are not exactly one X.509
/// certificate.
pub fn parse_certificate(der: &[u8]) -> Result<ParsedCertificate, ClassifyError> {
    let (rest, cert) =
        X509Certificate::from_der(der).map_err(|err| ClassifyError::Der(err.to_string()))?;
    if !rest.is_empty() {
        return Err(ClassifyError::TrailingData(rest.len()));
    }

    let seconds = cert.validity().not_before.timestamp();
    let not_before = DateTime::from_timestamp(seconds, 0)
        .ok_or(ClassifyError::NotBeforeOutOfRange(seconds))?;

    Ok(ParsedCertificate {
        serial: serial_to_string(cert.raw_serial()),
        not_before,
        extension_oids: cert
            .extensions()
            .iter()
            .map(|ext| ext.oid.to_id_string())
            .collect(),
    })
}

/// [`OrphanType::Precertificate`] if the poison extension is present,
/// [`OrphanType::Certificate`] otherwise, [`OrphanType::Unknown`] for no
/// certificate at all.
#[must_use]
pub fn orphan_type_for(cert: Option<&ParsedCertificate>) -> OrphanType {
    match cert {
        None => OrphanType::Unknown,
        Some(cert) if cert.has_ct_poison() => OrphanType::Precertificate,
        Some(_) => OrphanType::Certificate,
    }
}

/// Parse and classify in one step.
///
/// # Errors
///
/// Propagates [`parse_certificate`] failures.
pub fn classify(der: &[u8]) -> Result<(ParsedCertificate, OrphanType), ClassifyError> {
    let cert = parse_certificate(der)?;
    let typ = orphan_type_for(Some(&cert));
    Ok((cert, typ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rcgen::{CertificateParams, CustomExtension, KeyPair, SerialNumber, date_time_ymd};

    fn self_signed(serial: &[u8], poisoned: bool) -> Vec<u8> {
        let mut params =
            CertificateParams::new(vec!["orphan.example.com".to_string()]).expect("params");
        params.not_before = date_time_ymd(2020, 1, 1);
        params.serial_number = Some(SerialNumber::from_slice(serial));
        if poisoned {
            let mut poison = CustomExtension::from_oid_content(
                &[1, 3, 6, 1, 4, 1, 11129, 2, 4, 3],
                vec![0x05, 0x00],
            );
            poison.set_criticality(true);
            params.custom_extensions.push(poison);
        }
        let key = KeyPair::generate().expect("key pair");
        params.self_signed(&key).expect("self-signed").der().to_vec()
    }

    #[test]
    fn serial_is_zero_padded_lowercase_hex() {
        assert_eq!(serial_to_string(&[0x01, 0xAB]), format!("{:0>36}", "1ab"));
        assert_eq!(serial_to_string(&[0x00, 0x80]), format!("{:0>36}", "80"));
        assert_eq!(serial_to_string(&[]), "0".repeat(36));
    }

    #[test]
    fn long_serial_is_not_truncated() {
        let raw = [0xff; 20];
        assert_eq!(serial_to_string(&raw), "ff".repeat(20));
    }

    #[test]
    fn certificate_without_poison_is_certificate() {
        let der = self_signed(&[0x10, 0x01], false);
        let (cert, typ) = classify(&der).expect("classify");
        assert_eq!(typ, OrphanType::Certificate);
        assert_eq!(cert.serial, format!("{:0>36}", "1001"));
        assert_eq!(
            cert.not_before,
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn poisoned_certificate_is_precertificate() {
        let der = self_signed(&[0x10, 0x02], true);
        let (cert, typ) = classify(&der).expect("classify");
        assert_eq!(typ, OrphanType::Precertificate);
        assert!(cert.has_ct_poison());
    }

    #[test]
    fn absent_certificate_is_unknown() {
        assert_eq!(orphan_type_for(None), OrphanType::Unknown);
    }

    #[test]
    fn garbage_fails_to_parse() {
        let err = classify(&[0x30, 0x03, 0x01, 0x02]).expect_err("not a certificate");
        assert!(matches!(err, ClassifyError::Der(_)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut der = self_signed(&[0x10, 0x03], false);
        der.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(classify(&der), Err(ClassifyError::TrailingData(2)));
    }
}
