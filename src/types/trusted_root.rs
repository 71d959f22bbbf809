use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sigstore `TrustedRoot` document, as published by a TUF repository or a
/// `trusted_root.jsonl` fixture. One JSON object can carry several
/// certificate authorities / log instances covering different validity
/// windows, e.g. across a root key rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedRoot {
    pub media_type: String,
    #[serde(default)]
    pub tlogs: Vec<TransparencyLogInstance>,
    #[serde(default)]
    pub certificate_authorities: Vec<CertificateAuthority>,
    #[serde(default)]
    pub ctlogs: Vec<TransparencyLogInstance>,
    #[serde(default)]
    pub timestamp_authorities: Vec<TimestampAuthority>,
    /// Bare public-key signers the bundle format's `publicKey.hint` variant
    /// resolves against: no certificate involved, just a key hint looked up
    /// directly in trust material.
    #[serde(default)]
    pub public_keys: Vec<PublicKeyEntry>,
}

/// One entry of the trust material's public-key index: `hint → {key,
/// key_details, valid_for}`. `hint` is caller/deployment-defined (Sigstore
/// itself doesn't standardize a bare-public-key signer flow); this crate
/// matches it as an opaque string against the bundle's `publicKey.hint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEntry {
    pub hint: String,
    pub raw_bytes: Option<String>, // base64-encoded SPKI DER
    #[serde(default)]
    pub key_details: Option<String>,
    #[serde(default)]
    pub valid_for: Option<ValidityPeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthority {
    pub subject: AuthoritySubject,
    #[serde(default)]
    pub uri: String,
    pub cert_chain: CertChain,
    pub valid_for: ValidityPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampAuthority {
    pub subject: AuthoritySubject,
    #[serde(default)]
    pub uri: String,
    pub cert_chain: CertChain,
    pub valid_for: ValidityPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritySubject {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub common_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertChain {
    pub certificates: Vec<RawCertificate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCertificate {
    pub raw_bytes: String, // base64-encoded DER
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityPeriod {
    pub start: Option<String>, // RFC3339
    pub end: Option<String>,   // RFC3339
}

impl ValidityPeriod {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let after_start = self
            .start
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|start| at >= start)
            .unwrap_or(true);
        let before_end = self
            .end
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|end| at <= end)
            .unwrap_or(true);
        after_start && before_end
    }

    pub fn start_unix(&self) -> i64 {
        self.start
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp())
            .unwrap_or(i64::MIN)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogInstance {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub hash_algorithm: Option<String>,
    pub public_key: TrustedPublicKey,
    pub log_id: LogId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedPublicKey {
    pub raw_bytes: Option<String>, // base64-encoded SPKI DER
    #[serde(default)]
    pub key_details: Option<String>,
    #[serde(default)]
    pub valid_for: Option<ValidityPeriod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogId {
    pub key_id: String, // base64-encoded
}
