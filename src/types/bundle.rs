use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};

/// Media types a bundle's `mediaType` field is allowed to carry. Only the
/// version suffix changes the required-fields rules (see
/// [`Bundle::validate_shape`]); the `json;version=` segment itself is not
/// otherwise interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleVersion {
    V0_1,
    V0_2,
    V0_3,
}

impl BundleVersion {
    pub fn parse(media_type: &str) -> Option<Self> {
        if media_type.contains("0.3") {
            Some(BundleVersion::V0_3)
        } else if media_type.contains("0.2") {
            Some(BundleVersion::V0_2)
        } else if media_type.contains("0.1") {
            Some(BundleVersion::V0_1)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub media_type: String,
    pub verification_material: VerificationMaterial,
    #[serde(flatten)]
    pub content: BundleContent,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMaterial {
    #[serde(flatten)]
    pub key_material: KeyMaterial,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tlog_entries: Vec<TransparencyLogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_verification_data: Option<TimestampVerificationData>,
}

/// Exactly one of `certificate` (deprecated, v0.1 single-cert form),
/// `x509CertificateChain`, or `publicKey` must be present. This is
/// Sigstore's canonical "oneof content" pattern, modeled here as a real enum
/// rather than a bag of optional fields.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum KeyMaterial {
    Certificate { raw_bytes_b64: String },
    X509CertificateChain { certificates_b64: Vec<String> },
    PublicKey { hint: Option<String> },
}

impl KeyMaterial {
    /// Decodes DER certificates in leaf-to-root order, or an empty vec for
    /// the `publicKey` variant.
    pub fn certificates_der(&self) -> Result<Vec<Vec<u8>>, base64::DecodeError> {
        match self {
            KeyMaterial::Certificate { raw_bytes_b64 } => Ok(vec![BASE64.decode(raw_bytes_b64)?]),
            KeyMaterial::X509CertificateChain { certificates_b64 } => {
                certificates_b64.iter().map(|c| BASE64.decode(c)).collect()
            }
            KeyMaterial::PublicKey { .. } => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKeyMaterial {
    certificate: Option<RawCertificate>,
    x509_certificate_chain: Option<RawCertificateChain>,
    public_key: Option<RawPublicKeyHint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCertificate {
    raw_bytes: String,
}

#[derive(Debug, Deserialize)]
struct RawCertificateChain {
    certificates: Vec<RawCertificate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPublicKeyHint {
    hint: Option<String>,
}

impl<'de> Deserialize<'de> for KeyMaterial {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawKeyMaterial::deserialize(deserializer)?;
        let present = [
            raw.certificate.is_some(),
            raw.x509_certificate_chain.is_some(),
            raw.public_key.is_some(),
        ]
        .into_iter()
        .filter(|p| *p)
        .count();

        if present != 1 {
            return Err(D::Error::custom(format!(
                "verificationMaterial must carry exactly one of certificate, \
                 x509CertificateChain, publicKey; found {present}"
            )));
        }

        if let Some(cert) = raw.certificate {
            return Ok(KeyMaterial::Certificate {
                raw_bytes_b64: cert.raw_bytes,
            });
        }
        if let Some(chain) = raw.x509_certificate_chain {
            return Ok(KeyMaterial::X509CertificateChain {
                certificates_b64: chain.certificates.into_iter().map(|c| c.raw_bytes).collect(),
            });
        }
        let key = raw.public_key.expect("exactly-one check above");
        Ok(KeyMaterial::PublicKey { hint: key.hint })
    }
}

/// Exactly one of `messageSignature` or `dsseEnvelope` must be present at
/// the top level of the bundle.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BundleContent {
    MessageSignature(MessageSignatureContent),
    DsseEnvelope(DsseEnvelope),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBundleContent {
    message_signature: Option<MessageSignatureContent>,
    dsse_envelope: Option<DsseEnvelope>,
}

impl<'de> Deserialize<'de> for BundleContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawBundleContent::deserialize(deserializer)?;
        match (raw.message_signature, raw.dsse_envelope) {
            (Some(ms), None) => Ok(BundleContent::MessageSignature(ms)),
            (None, Some(env)) => Ok(BundleContent::DsseEnvelope(env)),
            (None, None) => Err(D::Error::custom(
                "bundle must carry exactly one of messageSignature, dsseEnvelope; found 0",
            )),
            (Some(_), Some(_)) => Err(D::Error::custom(
                "bundle must carry exactly one of messageSignature, dsseEnvelope; found 2",
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSignatureContent {
    pub message_digest: MessageDigest,
    pub signature: String, // base64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDigest {
    pub algorithm: String, // e.g. "SHA2_256"
    pub digest: String,    // base64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DsseEnvelope {
    pub payload: String, // base64
    pub payload_type: String,
    pub signatures: Vec<DsseSignature>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DsseSignature {
    pub sig: String, // base64
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyid: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampVerificationData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rfc3161_timestamps: Vec<Rfc3161Timestamp>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rfc3161Timestamp {
    pub signed_timestamp: String, // base64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogEntry {
    #[serde(default)]
    pub log_index: String,
    pub log_id: LogId,
    pub kind_version: KindVersion,
    pub integrated_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusion_promise: Option<InclusionPromise>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusion_proof: Option<InclusionProof>,
    pub canonicalized_body: String, // base64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogId {
    pub key_id: String, // base64
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KindVersion {
    pub kind: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionPromise {
    pub signed_entry_timestamp: String, // base64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub log_index: String,
    pub root_hash: String, // base64
    pub tree_size: String,
    pub hashes: Vec<String>, // base64
    pub checkpoint: Checkpoint,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub envelope: String,
}

impl Bundle {
    pub fn version(&self) -> Option<BundleVersion> {
        BundleVersion::parse(&self.media_type)
    }

    pub fn parse_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(content: &str, key_material: &str) -> String {
        format!(
            r#"{{
                "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
                "verificationMaterial": {{
                    {key_material},
                    "tlogEntries": []
                }},
                {content}
            }}"#
        )
    }

    #[test]
    fn accepts_single_certificate_and_message_signature() {
        let json = sample_json(
            r#""messageSignature": {"messageDigest": {"algorithm": "SHA2_256", "digest": "AAAA"}, "signature": "AAAA"}"#,
            r#""certificate": {"rawBytes": "AAAA"}"#,
        );
        let bundle: Bundle = serde_json::from_str(&json).unwrap();
        assert!(matches!(bundle.content, BundleContent::MessageSignature(_)));
        assert!(matches!(
            bundle.verification_material.key_material,
            KeyMaterial::Certificate { .. }
        ));
    }

    #[test]
    fn rejects_both_key_material_variants() {
        let json = sample_json(
            r#""messageSignature": {"messageDigest": {"algorithm": "SHA2_256", "digest": "AAAA"}, "signature": "AAAA"}"#,
            r#""certificate": {"rawBytes": "AAAA"}, "publicKey": {"hint": "abc"}"#,
        );
        assert!(serde_json::from_str::<Bundle>(&json).is_err());
    }

    #[test]
    fn rejects_neither_content_variant() {
        let json = format!(
            r#"{{
                "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
                "verificationMaterial": {{ "certificate": {{"rawBytes": "AAAA"}}, "tlogEntries": [] }}
            }}"#
        );
        assert!(serde_json::from_str::<Bundle>(&json).is_err());
    }

    #[test]
    fn version_is_parsed_from_media_type() {
        assert_eq!(
            BundleVersion::parse("application/vnd.dev.sigstore.bundle.v0.3+json"),
            Some(BundleVersion::V0_3)
        );
        assert_eq!(
            BundleVersion::parse("application/vnd.dev.sigstore.bundle+json;version=0.1"),
            Some(BundleVersion::V0_1)
        );
        assert_eq!(BundleVersion::parse("application/octet-stream"), None);
    }
}
