use std::path::Path;

use base64::prelude::*;

use crate::error::VerificationError;
use crate::parser::rfc3161::parse_rfc3161_timestamp;
use crate::parser::timestamp::parse_integrated_time;
use crate::types::Bundle;

pub fn parse_bundle_from_path(path: &Path) -> Result<Bundle, VerificationError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| VerificationError::InvalidBundleFormat(e.to_string()))?;
    parse_bundle_from_str(&contents)
}

pub fn parse_bundle_from_bytes(bytes: &[u8]) -> Result<Bundle, VerificationError> {
    let bundle =
        Bundle::parse_json(bytes).map_err(|e| VerificationError::InvalidBundleFormat(e.to_string()))?;
    validate_bundle(&bundle)?;
    Ok(bundle)
}

pub fn parse_bundle_from_str(json: &str) -> Result<Bundle, VerificationError> {
    parse_bundle_from_bytes(json.as_bytes())
}

fn validate_bundle(bundle: &Bundle) -> Result<(), VerificationError> {
    if bundle.version().is_none() {
        return Err(VerificationError::InvalidBundleFormat(format!(
            "unsupported media type: {}",
            bundle.media_type
        )));
    }
    Ok(())
}

pub fn decode_base64(input: &str) -> Result<Vec<u8>, VerificationError> {
    BASE64_STANDARD
        .decode(input)
        .map_err(|e| VerificationError::InvalidBundleFormat(e.to_string()))
}

/// Extracts the earliest timestamp a bundle declares, in Unix seconds:
/// the RFC 3161 token's `genTime` if one is present, otherwise the first
/// transparency log entry's `integratedTime`. Used before full verification
/// to pick which generation of trust material to check the certificate
/// chain against; the declared value carries no weight on its own; it is
/// only as trustworthy as the proof that is checked against it later.
pub fn extract_bundle_timestamp(bundle: &Bundle) -> Result<i64, VerificationError> {
    if let Some(timestamp_data) = &bundle.verification_material.timestamp_verification_data {
        if let Some(rfc3161) = timestamp_data.rfc3161_timestamps.first() {
            let timestamp_der = decode_base64(&rfc3161.signed_timestamp)?;
            let parsed = parse_rfc3161_timestamp(&timestamp_der).map_err(|e| {
                VerificationError::InvalidBundleFormat(format!("failed to parse timestamp: {e}"))
            })?;
            return Ok(parsed.tst_info.gen_time.timestamp());
        }
    }

    if let Some(entry) = bundle.verification_material.tlog_entries.first() {
        let dt = parse_integrated_time(&entry.integrated_time).map_err(|e| {
            VerificationError::InvalidBundleFormat(format!("failed to parse integrated time: {e}"))
        })?;
        return Ok(dt.timestamp());
    }

    Err(VerificationError::InvalidBundleFormat(
        "no RFC3161 timestamp or transparency log integrated time found".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle(media_type: &str) -> String {
        format!(
            r#"{{
                "mediaType": "{media_type}",
                "verificationMaterial": {{
                    "certificate": {{"rawBytes": "AAAA"}},
                    "tlogEntries": []
                }},
                "messageSignature": {{"messageDigest": {{"algorithm": "SHA2_256", "digest": "AAAA"}}, "signature": "AAAA"}}
            }}"#
        )
    }

    #[test]
    fn rejects_unsupported_media_type() {
        let json = sample_bundle("application/octet-stream");
        assert!(parse_bundle_from_str(&json).is_err());
    }

    #[test]
    fn accepts_known_bundle_media_type() {
        let json = sample_bundle("application/vnd.dev.sigstore.bundle.v0.3+json");
        assert!(parse_bundle_from_str(&json).is_ok());
    }

    #[test]
    fn extract_bundle_timestamp_falls_back_to_integrated_time() {
        let json = r#"{
            "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
            "verificationMaterial": {
                "certificate": {"rawBytes": "AAAA"},
                "tlogEntries": [{
                    "logIndex": "1",
                    "logId": {"keyId": "AAAA"},
                    "kindVersion": {"kind": "hashedrekord", "version": "0.0.1"},
                    "integratedTime": "1700000000",
                    "canonicalizedBody": "AAAA"
                }]
            },
            "messageSignature": {"messageDigest": {"algorithm": "SHA2_256", "digest": "AAAA"}, "signature": "AAAA"}
        }"#;
        let bundle = parse_bundle_from_str(json).unwrap();
        assert_eq!(extract_bundle_timestamp(&bundle).unwrap(), 1700000000);
    }
}
