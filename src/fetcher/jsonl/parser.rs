use base64::prelude::*;
use chrono::{DateTime, Utc};

use crate::error::VerificationError;
use crate::types::{CertChain, CertificateChain, TrustedRoot};

/// Loads one or more `TrustedRoot` documents from JSONL content (one JSON
/// object per line). Real deployments publish a single line; tests and
/// fixtures sometimes concatenate several snapshots to exercise rotation.
pub fn load_trusted_root_from_jsonl(content: &str) -> Result<Vec<TrustedRoot>, VerificationError> {
    let mut roots = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let root: TrustedRoot = serde_json::from_str(line).map_err(|e| {
            VerificationError::InvalidBundleFormat(format!(
                "failed to parse JSONL line {}: {e}",
                line_num + 1
            ))
        })?;

        roots.push(root);
    }

    if roots.is_empty() {
        return Err(VerificationError::InvalidBundleFormat(
            "no trust bundles found in JSONL content".to_string(),
        ));
    }

    Ok(roots)
}

/// Returns every certificate authority chain, across all supplied roots,
/// whose validity window covers `check_time`. The caller (certificate chain
/// verification) tries each candidate in turn rather than guessing a single
/// "right" one up front, since a root's own issuer CN doesn't reliably say
/// which CA entry it was issued under.
pub fn select_certificate_authorities(
    roots: &[TrustedRoot],
    check_time: DateTime<Utc>,
) -> Result<Vec<CertificateChain>, VerificationError> {
    let mut candidates: Vec<(CertificateChain, i64)> = Vec::new();

    for root in roots {
        for ca in &root.certificate_authorities {
            if !ca.valid_for.contains(check_time) {
                continue;
            }
            candidates.push((extract_ca_chain(&ca.cert_chain)?, ca.valid_for.start_unix()));
        }
    }

    if candidates.is_empty() {
        return Err(VerificationError::InvalidBundleFormat(format!(
            "no certificate authority in trust material is valid at {check_time}"
        )));
    }

    // Most specific / most recently rotated CA first.
    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(candidates.into_iter().map(|(chain, _)| chain).collect())
}

/// Returns every timestamp authority chain across all supplied roots,
/// without filtering by validity window: an RFC3161 token's own `genTime`
/// is what actually has to fall inside the TSA leaf's validity period, and
/// that isn't known until the token itself is parsed, so candidate
/// selection here can't narrow by time the way CA selection does.
pub fn select_all_timestamp_authorities(roots: &[TrustedRoot]) -> Result<Vec<CertificateChain>, VerificationError> {
    let mut candidates = Vec::new();
    for root in roots {
        for tsa in &root.timestamp_authorities {
            candidates.push(extract_tsa_chain(&tsa.cert_chain)?);
        }
    }
    if candidates.is_empty() {
        return Err(VerificationError::InvalidBundleFormat(
            "no timestamp authority in trust material".to_string(),
        ));
    }
    Ok(candidates)
}

pub fn select_timestamp_authorities(
    roots: &[TrustedRoot],
    check_time: DateTime<Utc>,
) -> Result<Vec<CertificateChain>, VerificationError> {
    let mut candidates: Vec<(CertificateChain, i64)> = Vec::new();

    for root in roots {
        for tsa in &root.timestamp_authorities {
            if !tsa.valid_for.contains(check_time) {
                continue;
            }
            candidates.push((extract_tsa_chain(&tsa.cert_chain)?, tsa.valid_for.start_unix()));
        }
    }

    if candidates.is_empty() {
        return Err(VerificationError::InvalidBundleFormat(format!(
            "no timestamp authority in trust material is valid at {check_time}"
        )));
    }

    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(candidates.into_iter().map(|(chain, _)| chain).collect())
}

/// Fulcio-style chains never carry the leaf in trust material: the bundle
/// supplies it. `cert_chain` is `[intermediate..., root]`.
fn extract_ca_chain(cert_chain: &CertChain) -> Result<CertificateChain, VerificationError> {
    let der_certs = decode_chain(cert_chain)?;
    let root = der_certs
        .last()
        .cloned()
        .ok_or_else(|| VerificationError::InvalidBundleFormat("certificate chain is empty".into()))?;
    let intermediates = der_certs[..der_certs.len().saturating_sub(1)].to_vec();
    Ok(CertificateChain {
        leaf: Vec::new(),
        intermediates,
        root,
    })
}

/// TSA chains carry their own leaf (the signing certificate): `cert_chain`
/// is `[leaf, intermediates..., root]`, or just `[leaf]` for a self-signed
/// TSA certificate.
fn extract_tsa_chain(cert_chain: &CertChain) -> Result<CertificateChain, VerificationError> {
    let der_certs = decode_chain(cert_chain)?;
    match der_certs.len() {
        0 => Err(VerificationError::InvalidBundleFormat(
            "certificate chain is empty".into(),
        )),
        1 => Ok(CertificateChain {
            leaf: der_certs[0].clone(),
            intermediates: Vec::new(),
            root: der_certs[0].clone(),
        }),
        _ => Ok(CertificateChain {
            leaf: der_certs[0].clone(),
            intermediates: der_certs[1..der_certs.len() - 1].to_vec(),
            root: der_certs.last().unwrap().clone(),
        }),
    }
}

fn decode_chain(cert_chain: &CertChain) -> Result<Vec<Vec<u8>>, VerificationError> {
    cert_chain
        .certificates
        .iter()
        .map(|c| {
            BASE64_STANDARD
                .decode(&c.raw_bytes)
                .map_err(|e| VerificationError::InvalidBundleFormat(format!("bad certificate base64: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_jsonl_is_rejected() {
        assert!(load_trusted_root_from_jsonl("").is_err());
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(load_trusted_root_from_jsonl("not a json").is_err());
    }

    #[test]
    fn whitespace_only_lines_are_skipped() {
        assert!(load_trusted_root_from_jsonl("   \n\t\n  ").is_err());
    }
}
