use base64::prelude::*;
use chrono::{DateTime, Utc};

use crate::error::CertificateError;
use crate::types::TransparencyLogInstance;

/// The fields of one `SignedCertificateTimestamp` (RFC 6962 section 3.2)
/// needed to match it against a trusted CT log. The SCT's own signature is
/// deliberately not decoded here: verifying it requires reconstructing the
/// precertificate TBS (poison extension swapped for the issuing CA's SCT
/// list, if any) and is out of scope for this structural check — see
/// DESIGN.md.
pub struct ParsedSct {
    pub log_id: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Parses a `SignedCertificateTimestampList` (the raw contents of the
/// X.509v3 SCT-list extension, OID `1.3.6.1.4.1.11129.2.4.2`): a 2-byte
/// overall length followed by repeated `{2-byte length, SCT}` entries.
pub fn parse_sct_list(data: &[u8]) -> Result<Vec<ParsedSct>, CertificateError> {
    if data.len() < 2 {
        return Err(CertificateError::ParseError("SCT list truncated".into()));
    }
    let total_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let mut rest = data
        .get(2..2 + total_len)
        .ok_or_else(|| CertificateError::ParseError("SCT list length exceeds extension data".into()))?;

    let mut scts = Vec::new();
    while !rest.is_empty() {
        if rest.len() < 2 {
            return Err(CertificateError::ParseError("truncated SCT entry length".into()));
        }
        let entry_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        let entry = rest
            .get(2..2 + entry_len)
            .ok_or_else(|| CertificateError::ParseError("truncated SCT entry".into()))?;
        scts.push(parse_one_sct(entry)?);
        rest = &rest[2 + entry_len..];
    }
    Ok(scts)
}

fn parse_one_sct(entry: &[u8]) -> Result<ParsedSct, CertificateError> {
    const VERSION_LEN: usize = 1;
    const LOG_ID_LEN: usize = 32;
    const TIMESTAMP_LEN: usize = 8;
    if entry.len() < VERSION_LEN + LOG_ID_LEN + TIMESTAMP_LEN {
        return Err(CertificateError::ParseError("SCT entry too short".into()));
    }
    let log_id = entry[VERSION_LEN..VERSION_LEN + LOG_ID_LEN].to_vec();
    let ts_start = VERSION_LEN + LOG_ID_LEN;
    let timestamp_ms = u64::from_be_bytes(entry[ts_start..ts_start + TIMESTAMP_LEN].try_into().unwrap());
    let timestamp = DateTime::from_timestamp(
        (timestamp_ms / 1000) as i64,
        ((timestamp_ms % 1000) * 1_000_000) as u32,
    )
    .ok_or_else(|| CertificateError::ParseError("SCT timestamp out of range".into()))?;
    Ok(ParsedSct { log_id, timestamp })
}

/// Counts how many `scts` match a trusted CT log by `logID` and fall inside
/// that log's validity window, if one is declared.
pub fn count_valid_scts(scts: &[ParsedSct], ctlogs: &[TransparencyLogInstance]) -> usize {
    scts.iter()
        .filter(|sct| {
            ctlogs.iter().any(|log| {
                log_id_matches(&log.log_id.key_id, &sct.log_id)
                    && log
                        .public_key
                        .valid_for
                        .as_ref()
                        .map(|v| v.contains(sct.timestamp))
                        .unwrap_or(true)
            })
        })
        .count()
}

fn log_id_matches(key_id_b64: &str, raw_log_id: &[u8]) -> bool {
    BASE64_STANDARD
        .decode(key_id_b64)
        .map(|decoded| decoded == raw_log_id)
        .unwrap_or(false)
}
