use base64::prelude::*;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::crypto::merkle::compute_leaf_hash;
use crate::error::VerificationError;
use crate::types::{BundleContent, TransparencyLogEntry, TrustedRoot};
use crate::verifier::checkpoint::verify_inclusion_proof_and_checkpoint;
use crate::verifier::set::verify_inclusion_promise;
use crate::verifier::tlog_body::verify_tlog_body;

/// What a single transparency log entry contributed to a verification run,
/// once its body, inclusion promise, and inclusion proof have all checked
/// out against trust material.
pub struct TlogVerificationOutcome {
    pub log_id: String,
    pub integrated_time: DateTime<Utc>,
}

/// Verifies one transparency log entry in full: its canonicalized body
/// matches what the bundle actually signed, its inclusion promise (if
/// present) is a genuine SET from a trusted log, and its inclusion proof
/// (if present) folds up to a root the log itself checkpointed and signed.
pub fn verify_tlog_entry(
    entry: &TransparencyLogEntry,
    content: &BundleContent,
    leaf_cert_der: &[u8],
    signature: &[u8],
    trusted_root: &TrustedRoot,
) -> Result<TlogVerificationOutcome, VerificationError> {
    let canonicalized_body = BASE64_STANDARD
        .decode(&entry.canonicalized_body)
        .map_err(|e| VerificationError::InvalidBundleFormat(e.to_string()))?;

    verify_tlog_body(
        &entry.kind_version,
        &canonicalized_body,
        content,
        leaf_cert_der,
        signature,
    )?;

    if entry.inclusion_promise.is_some() {
        verify_inclusion_promise(entry, &trusted_root.tlogs)?;
    }

    if let Some(proof) = &entry.inclusion_proof {
        let leaf_hash = compute_leaf_hash(&canonicalized_body);
        verify_inclusion_proof_and_checkpoint(proof, leaf_hash, &trusted_root.tlogs)?;
    }

    let integrated_time: i64 = entry
        .integrated_time
        .parse()
        .map_err(|_| crate::error::TimestampError::InvalidIntegratedTime)?;
    let integrated_time = DateTime::from_timestamp(integrated_time, 0)
        .ok_or(crate::error::TimestampError::InvalidIntegratedTime)?;

    debug!(log_id = %entry.log_id.key_id, log_index = %entry.log_index, "transparency log entry verified");

    Ok(TlogVerificationOutcome {
        log_id: entry.log_id.key_id.clone(),
        integrated_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KindVersion, LogId};

    #[test]
    fn rejects_unparseable_canonicalized_body() {
        let entry = TransparencyLogEntry {
            log_index: "0".into(),
            log_id: LogId { key_id: String::new() },
            kind_version: KindVersion {
                kind: "hashedrekord".into(),
                version: "0.0.1".into(),
            },
            integrated_time: "1700000000".into(),
            inclusion_promise: None,
            inclusion_proof: None,
            canonicalized_body: "not base64!!".into(),
        };
        let content = BundleContent::MessageSignature(crate::types::MessageSignatureContent {
            message_digest: crate::types::MessageDigest {
                algorithm: "SHA2_256".into(),
                digest: String::new(),
            },
            signature: String::new(),
        });
        let trusted_root = TrustedRoot {
            media_type: String::new(),
            tlogs: vec![],
            certificate_authorities: vec![],
            ctlogs: vec![],
            timestamp_authorities: vec![],
            public_keys: vec![],
        };
        let err = verify_tlog_entry(&entry, &content, &[], &[], &trusted_root).unwrap_err();
        assert!(matches!(err, VerificationError::InvalidBundleFormat(_)));
    }
}
