use base64::prelude::*;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::crypto::signature::PublicKey;
use crate::error::InclusionPromiseError;
use crate::types::{TransparencyLogEntry, TransparencyLogInstance};

/// The JSON object Rekor actually signs to produce a Signed Entry Timestamp:
/// `{"body", "integratedTime", "logIndex", "logID"}` in RFC 8785 canonical
/// form. `logID` here is the log's key hash rendered as lowercase hex, the
/// same shape Rekor's own API returns it in, even though the bundle format
/// carries it as base64 in `LogId.keyId`.
#[derive(Serialize)]
struct SetPayload {
    body: String,
    #[serde(rename = "integratedTime")]
    integrated_time: i64,
    #[serde(rename = "logIndex")]
    log_index: i64,
    #[serde(rename = "logID")]
    log_id: String,
}

/// Verifies a transparency log entry's inclusion promise: that the log
/// identified by `entry.log_id` actually signed this exact
/// `(body, integratedTime, logIndex, logID)` tuple. This is the promise a
/// log makes the instant it accepts an entry, before it's folded into a
/// Merkle tree — distinct from (and usually checked before) the inclusion
/// proof itself.
pub fn verify_inclusion_promise(
    entry: &TransparencyLogEntry,
    tlogs: &[TransparencyLogInstance],
) -> Result<(), InclusionPromiseError> {
    let promise = entry
        .inclusion_promise
        .as_ref()
        .ok_or_else(|| InclusionPromiseError::UnknownLogId(hex_log_id(entry)))?;

    let log_id_bytes = BASE64_STANDARD
        .decode(&entry.log_id.key_id)
        .map_err(|e| InclusionPromiseError::CanonicalizationError(e.to_string()))?;

    let tlog = tlogs
        .iter()
        .find(|t| {
            BASE64_STANDARD
                .decode(&t.log_id.key_id)
                .map(|id| id == log_id_bytes)
                .unwrap_or(false)
        })
        .ok_or_else(|| InclusionPromiseError::UnknownLogId(hex::encode(&log_id_bytes)))?;

    let integrated_time: i64 = entry
        .integrated_time
        .parse()
        .map_err(|_| InclusionPromiseError::CanonicalizationError("integratedTime is not an integer".into()))?;
    let integrated_at: DateTime<Utc> = Utc
        .timestamp_opt(integrated_time, 0)
        .single()
        .ok_or_else(|| InclusionPromiseError::CanonicalizationError("integratedTime out of range".into()))?;

    if let Some(valid_for) = &tlog.public_key.valid_for {
        if !valid_for.contains(integrated_at) {
            return Err(InclusionPromiseError::LogNotValidAtTime(integrated_at.to_rfc3339()));
        }
    }

    let log_index: i64 = entry
        .log_index
        .parse()
        .map_err(|_| InclusionPromiseError::CanonicalizationError("logIndex is not an integer".into()))?;

    let payload = SetPayload {
        body: entry.canonicalized_body.clone(),
        integrated_time,
        log_index,
        log_id: hex::encode(&log_id_bytes),
    };

    let canonical = serde_json_canonicalizer::to_vec(&payload)
        .map_err(|e| InclusionPromiseError::CanonicalizationError(e.to_string()))?;

    let key_der = tlog
        .public_key
        .raw_bytes
        .as_ref()
        .ok_or_else(|| InclusionPromiseError::UnknownLogId(hex::encode(&log_id_bytes)))?;
    let key_der = BASE64_STANDARD
        .decode(key_der)
        .map_err(|e| InclusionPromiseError::CanonicalizationError(e.to_string()))?;
    let public_key =
        PublicKey::from_public_key_der(&key_der).map_err(|_| InclusionPromiseError::InvalidSignature)?;

    let signature = BASE64_STANDARD
        .decode(&promise.signed_entry_timestamp)
        .map_err(|e| InclusionPromiseError::CanonicalizationError(e.to_string()))?;

    public_key
        .verify(&canonical, &signature)
        .map_err(|_| InclusionPromiseError::InvalidSignature)
}

fn hex_log_id(entry: &TransparencyLogEntry) -> String {
    BASE64_STANDARD
        .decode(&entry.log_id.key_id)
        .map(|b| hex::encode(b))
        .unwrap_or_else(|_| entry.log_id.key_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_payload_field_order_is_stable() {
        let payload = SetPayload {
            body: "Zm9v".into(),
            integrated_time: 1700000000,
            log_index: 42,
            log_id: "abcd".into(),
        };
        let canonical = serde_json_canonicalizer::to_string(&payload).unwrap();
        assert_eq!(
            canonical,
            r#"{"body":"Zm9v","integratedTime":1700000000,"logID":"abcd","logIndex":42}"#
        );
    }
}
