//! Shared builders for integration tests: real DER certificates and CA log
//! lines in the format the issuing CA writes them.
#![allow(dead_code)]

use rcgen::{CertificateParams, CustomExtension, KeyPair, SerialNumber, date_time_ymd};

/// `NotBefore` of every fixture certificate: 2020-01-01T00:00:00Z.
pub const NOT_BEFORE_UNIX: i64 = 1_577_836_800;

const CT_POISON_ARCS: &[u64] = &[1, 3, 6, 1, 4, 1, 11129, 2, 4, 3];

fn build(serial: u64, poisoned: bool) -> Vec<u8> {
    let mut params =
        CertificateParams::new(vec![format!("orphan-{serial}.example.com")]).expect("params");
    params.not_before = date_time_ymd(2020, 1, 1);
    params.not_after = date_time_ymd(2020, 4, 1);

    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    params.serial_number = Some(SerialNumber::from_slice(&bytes[first..]));

    if poisoned {
        let mut poison = CustomExtension::from_oid_content(CT_POISON_ARCS, vec![0x05, 0x00]);
        poison.set_criticality(true);
        params.custom_extensions.push(poison);
    }

    let key = KeyPair::generate().expect("key pair");
    params.self_signed(&key).expect("self-signed").der().to_vec()
}

/// DER of a final certificate with the given serial.
pub fn certificate(serial: u64) -> Vec<u8> {
    build(serial, false)
}

/// DER of a precertificate (CT poison present) with the given serial.
pub fn precertificate(serial: u64) -> Vec<u8> {
    build(serial, true)
}

/// Canonical storage key for a fixture serial.
pub fn serial_key(serial: u64) -> String {
    format!("{serial:036x}")
}

fn orphan_line(label: &str, der: &[u8], reg_id: i64) -> String {
    format!(
        "Jan  1 00:00:07 ca1 boulder-ca[2043]: 3 boulder-ca [AUDIT] Failed RPC to store at SA, \
         {label}: serial=[{}] cert=[{}] err=[context deadline exceeded], regID=[{reg_id}], orderID=[0]",
        hex::encode(&der[..4]),
        hex::encode(der),
    )
}

/// A CA log line reporting an orphaned certificate.
pub fn cert_line(der: &[u8], reg_id: i64) -> String {
    orphan_line("orphaning certificate", der, reg_id)
}

/// A CA log line reporting an orphaned precertificate.
pub fn precert_line(der: &[u8], reg_id: i64) -> String {
    orphan_line("orphaning precertificate", der, reg_id)
}

/// Lines the CA writes that are not orphan records.
pub const NOISE: &[&str] = &[
    "Jan  1 00:00:01 ca1 boulder-ca[2043]: 6 boulder-ca Signing precertificate: serial=[04]",
    "Jan  1 00:00:02 ca1 boulder-ca[2043]: 6 boulder-ca [AUDIT] Signing success: cert=[3082]",
    "Jan  1 00:00:03 ca1 boulder-ca[2043]: 4 boulder-ca orphaning certificate without payload",
];
