use chrono::{DateTime, Utc};
use tracing::debug;

use crate::crypto::hash::{constant_time_eq, sha256, sha384};
use crate::crypto::signature::PublicKey;
use crate::error::{TimestampError, VerificationError};
use crate::parser::certificate::parse_der_certificate;
use crate::parser::rfc3161::parse_rfc3161_timestamp;
use crate::types::CertificateChain;
use crate::verifier::certificate::{verify_certificate_chain, verify_tsa_leaf_eku, LeafRole};

const OID_SHA256: &str = "2.16.840.1.101.3.4.2.1";
const OID_SHA384: &str = "2.16.840.1.101.3.4.2.2";

pub struct TsaVerificationOutcome {
    pub time: DateTime<Utc>,
}

/// Verifies one embedded RFC 3161 timestamp token end to end: the message
/// imprint matches what it claims to attest to, the signing certificate
/// chains to a trusted timestamping authority and carries the exclusive
/// `id-kp-timeStamping` EKU RFC 3161 requires, `genTime` falls inside that
/// certificate's validity window, and the CMS signature itself verifies.
pub fn verify_rfc3161_timestamp(
    token_der: &[u8],
    attested_bytes: &[u8],
    tsa_candidates: &[CertificateChain],
) -> Result<TsaVerificationOutcome, VerificationError> {
    let token = parse_rfc3161_timestamp(token_der).map_err(VerificationError::from)?;

    let expected_digest = hash_with_oid(&token.tst_info.message_imprint.hash_algorithm_oid, attested_bytes)?;
    if !constant_time_eq(&expected_digest, &token.tst_info.message_imprint.hashed_message) {
        return Err(TimestampError::MessageImprintMismatch.into());
    }

    let mut last_err: Option<VerificationError> = None;
    for candidate in tsa_candidates {
        let leaf_der = token
            .embedded_certificates
            .first()
            .cloned()
            .unwrap_or_else(|| candidate.leaf.clone());

        if verify_tsa_leaf_eku(&leaf_der).is_err() {
            last_err = Some(TimestampError::InvalidTsaExtendedKeyUsage.into());
            continue;
        }

        let chain_candidate = CertificateChain {
            leaf: Vec::new(),
            intermediates: candidate.intermediates.clone(),
            root: candidate.root.clone(),
        };

        match verify_certificate_chain(
            &leaf_der,
            std::slice::from_ref(&chain_candidate),
            token.tst_info.gen_time,
            LeafRole::TimeStamping,
        ) {
            Ok((chain, _hashes)) => {
                let leaf_cert = match parse_der_certificate(&chain.leaf) {
                    Ok(c) => c,
                    Err(e) => {
                        last_err = Some(e.into());
                        continue;
                    }
                };
                if !constant_time_eq(&sha256(&chain.leaf), &token.signing_cert_hash) {
                    last_err = Some(TimestampError::SigningCertificateMismatch.into());
                    continue;
                }

                let public_key = match PublicKey::from_certificate(&leaf_cert) {
                    Ok(k) => k,
                    Err(e) => {
                        last_err = Some(e.into());
                        continue;
                    }
                };
                match public_key.verify(&token.signed_content, &token.signature) {
                    Ok(()) => {
                        debug!(gen_time = %token.tst_info.gen_time, "RFC3161 timestamp verified");
                        return Ok(TsaVerificationOutcome {
                            time: token.tst_info.gen_time,
                        });
                    }
                    Err(_) => {
                        last_err = Some(TimestampError::InvalidSignature.into());
                        continue;
                    }
                }
            }
            Err(e) => {
                last_err = Some(match e {
                    crate::error::CertificateError::SigningTimeOutsideValidity { .. } => {
                        TimestampError::TsaCertNotValidAtGenTime.into()
                    }
                    other => other.into(),
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| TimestampError::UntrustedTsaChain.into()))
}

fn hash_with_oid(oid: &str, data: &[u8]) -> Result<Vec<u8>, TimestampError> {
    match oid {
        OID_SHA256 => Ok(sha256(data).to_vec()),
        OID_SHA384 => Ok(sha384(data).to_vec()),
        other => Err(TimestampError::Rfc3161Parse(format!(
            "unsupported message imprint hash algorithm {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_with_oid_rejects_unknown_algorithm() {
        let err = hash_with_oid("1.2.3.4", b"data").unwrap_err();
        assert!(matches!(err, TimestampError::Rfc3161Parse(_)));
    }

    #[test]
    fn hash_with_oid_computes_sha256() {
        let digest = hash_with_oid(OID_SHA256, b"hello world").unwrap();
        assert_eq!(digest, sha256(b"hello world").to_vec());
    }
}
