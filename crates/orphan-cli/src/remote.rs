//! Live HTTP clients for the storage and signing-authority services.
//!
//! Both speak JSON with binary fields hex-encoded. Lookups:
//!
//! ```text
//! GET  {url}/certificates/{serial}     -> StoredRecord | 404
//! GET  {url}/precertificates/{serial}  -> StoredRecord | 404
//! POST {url}/certificates              -> {"serial": ...} | 409
//! POST {url}/precertificates           -> {} | 409
//! POST {url}/ocsp                      -> {"response": "<hex>"}
//! ```

use chrono::{DateTime, Utc};
use orphan_core::classify;
use orphan_core::config::RemoteServiceConfig;
use orphan_core::ocsp::{GenerateOcspRequest, OcspError, OcspGenerator};
use orphan_core::storage::{
    AddCertificateRequest, AddPrecertificateRequest, CertificateStorage, StorageError,
    StoredRecord,
};
use serde::{Deserialize, Serialize};

const USER_AGENT: &str = concat!("orphan-finder/", env!("CARGO_PKG_VERSION"));

fn agent(config: &RemoteServiceConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .build()
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

#[derive(Debug, Serialize)]
struct AddCertificateBody {
    der: String,
    reg_id: i64,
    ocsp_response: String,
    issued: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct AddPrecertificateBody {
    der: String,
    reg_id: i64,
    ocsp_response: String,
    issued_ns: i64,
}

#[derive(Debug, Deserialize)]
struct AddCertificateReply {
    serial: String,
}

#[derive(Debug, Deserialize)]
struct OcspReply {
    #[serde(with = "hex::serde")]
    response: Vec<u8>,
}

/// Map a non-success HTTP status from the storage service.
fn storage_status_error(status: u16, body: &str, subject: &str) -> StorageError {
    match status {
        404 => StorageError::NotFound(subject.to_string()),
        409 => StorageError::Duplicate(subject.to_string()),
        400 | 422 => StorageError::InvalidRequest(format!("HTTP {status}: {}", body.trim())),
        _ => StorageError::Backend(format!("HTTP {status}: {}", body.trim())),
    }
}

fn storage_error(err: ureq::Error, subject: &str) -> StorageError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            storage_status_error(status, &body, subject)
        }
        ureq::Error::Transport(transport) => StorageError::Backend(transport.to_string()),
    }
}

fn ocsp_status_error(status: u16, body: &str) -> OcspError {
    let detail = format!("HTTP {status}: {}", body.trim());
    if (400..500).contains(&status) {
        OcspError::Rejected(detail)
    } else {
        OcspError::Unavailable(detail)
    }
}

/// Serial used to label insert failures; the DER was parsed upstream so
/// this only falls back for inputs the pipeline would never send.
fn insert_subject(der: &[u8]) -> String {
    classify::parse_certificate(der).map_or_else(|_| "<unparseable>".to_string(), |c| c.serial)
}

/// [`CertificateStorage`] backed by the storage service.
#[derive(Debug, Clone)]
pub struct RemoteStorage {
    agent: ureq::Agent,
    base: String,
}

impl RemoteStorage {
    #[must_use]
    pub fn new(config: &RemoteServiceConfig) -> Self {
        Self {
            agent: agent(config),
            base: config.url.clone(),
        }
    }

    fn get(&self, collection: &str, serial: &str) -> Result<StoredRecord, StorageError> {
        let url = endpoint(&self.base, &format!("{collection}/{serial}"));
        self.agent
            .get(&url)
            .call()
            .map_err(|err| storage_error(err, serial))?
            .into_json::<StoredRecord>()
            .map_err(|err| StorageError::Backend(format!("decode {url}: {err}")))
    }

    fn post<T: Serialize>(
        &self,
        collection: &str,
        body: &T,
        der: &[u8],
    ) -> Result<ureq::Response, StorageError> {
        self.agent
            .post(&endpoint(&self.base, collection))
            .send_json(body)
            .map_err(|err| storage_error(err, &insert_subject(der)))
    }
}

impl CertificateStorage for RemoteStorage {
    fn add_certificate(&self, req: &AddCertificateRequest<'_>) -> Result<String, StorageError> {
        let body = AddCertificateBody {
            der: hex::encode(req.der),
            reg_id: req.reg_id,
            ocsp_response: hex::encode(req.ocsp_response),
            issued: req.issued,
        };
        let reply = self
            .post("certificates", &body, req.der)?
            .into_json::<AddCertificateReply>()
            .map_err(|err| StorageError::Backend(format!("decode add-certificate reply: {err}")))?;
        Ok(reply.serial)
    }

    fn add_precertificate(&self, req: &AddPrecertificateRequest<'_>) -> Result<(), StorageError> {
        let body = AddPrecertificateBody {
            der: hex::encode(req.der),
            reg_id: req.reg_id,
            ocsp_response: hex::encode(req.ocsp_response),
            issued_ns: req.issued_nanos,
        };
        self.post("precertificates", &body, req.der).map(|_| ())
    }

    fn get_certificate(&self, serial: &str) -> Result<StoredRecord, StorageError> {
        self.get("certificates", serial)
    }

    fn get_precertificate(&self, serial: &str) -> Result<StoredRecord, StorageError> {
        self.get("precertificates", serial)
    }
}

/// [`OcspGenerator`] backed by the signing authority.
#[derive(Debug, Clone)]
pub struct RemoteOcspGenerator {
    agent: ureq::Agent,
    url: String,
}

impl RemoteOcspGenerator {
    #[must_use]
    pub fn new(config: &RemoteServiceConfig) -> Self {
        Self {
            agent: agent(config),
            url: endpoint(&config.url, "ocsp"),
        }
    }
}

impl OcspGenerator for RemoteOcspGenerator {
    fn generate_ocsp(&self, req: &GenerateOcspRequest) -> Result<Vec<u8>, OcspError> {
        let response = self.agent.post(&self.url).send_json(req).map_err(|err| match err {
            ureq::Error::Status(status, response) => {
                ocsp_status_error(status, &response.into_string().unwrap_or_default())
            }
            ureq::Error::Transport(transport) => OcspError::Unavailable(transport.to_string()),
        })?;

        let reply = response
            .into_json::<OcspReply>()
            .map_err(|err| OcspError::MalformedResponse(err.to_string()))?;
        if reply.response.is_empty() {
            return Err(OcspError::MalformedResponse(
                "empty OCSP response".to_string(),
            ));
        }
        Ok(reply.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://sa:9095/", "certificates/01"),
            "http://sa:9095/certificates/01"
        );
        assert_eq!(endpoint("http://ca:9096", "ocsp"), "http://ca:9096/ocsp");
    }

    #[test]
    fn storage_statuses_map_to_lookup_semantics() {
        assert_eq!(
            storage_status_error(404, "", "0a"),
            StorageError::NotFound("0a".into())
        );
        assert_eq!(
            storage_status_error(409, "exists", "0a"),
            StorageError::Duplicate("0a".into())
        );
        assert!(matches!(
            storage_status_error(400, "bad der", "0a"),
            StorageError::InvalidRequest(_)
        ));
        assert_eq!(
            storage_status_error(503, " overloaded\n", "0a"),
            StorageError::Backend("HTTP 503: overloaded".into())
        );
    }

    #[test]
    fn ocsp_client_errors_are_rejections() {
        assert!(matches!(
            ocsp_status_error(403, "forbidden"),
            OcspError::Rejected(_)
        ));
        assert!(matches!(
            ocsp_status_error(502, ""),
            OcspError::Unavailable(_)
        ));
    }

    #[test]
    fn request_bodies_use_hex_and_typed_timestamps() {
        let issued = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap();
        let cert = serde_json::to_value(AddCertificateBody {
            der: hex::encode([0x30, 0x82]),
            reg_id: 7,
            ocsp_response: hex::encode([0x01]),
            issued,
        })
        .unwrap();
        assert_eq!(cert["der"], "3082");
        assert_eq!(cert["issued"], "2020-01-01T01:00:00Z");

        let precert = serde_json::to_value(AddPrecertificateBody {
            der: String::new(),
            reg_id: 7,
            ocsp_response: String::new(),
            issued_ns: issued.timestamp_nanos_opt().unwrap(),
        })
        .unwrap();
        assert_eq!(precert["issued_ns"], 1_577_840_400_000_000_000_i64);
    }

    #[test]
    fn unreachable_storage_is_backend_failure() {
        let storage = RemoteStorage::new(&RemoteServiceConfig::new("http://127.0.0.1:9"));
        assert!(matches!(
            storage.get_certificate("01"),
            Err(StorageError::Backend(_))
        ));
    }
}
