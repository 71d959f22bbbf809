use x509_parser::oid_registry::Oid;
use x509_parser::prelude::*;

use crate::error::CertificateError;
use crate::parser::certificate::{extract_issuer_cn, extract_subject_alt_names};
use crate::types::SignerIdentity;

// Fulcio OIDC extension OIDs, arc 1.3.6.1.4.1.57264.1.*
const OID_ISSUER_V2: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 8];
const OID_SOURCE_REPOSITORY_URI: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 12];
const OID_SOURCE_REPOSITORY_REF: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 14];

// Legacy (v1) GitHub Actions OIDs, kept for certificates issued before the
// v2 claims were introduced.
const OID_ISSUER_V1: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 1];
const OID_GITHUB_WORKFLOW_TRIGGER: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 2];
const OID_GITHUB_WORKFLOW_SHA: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 3];
const OID_GITHUB_WORKFLOW_NAME: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 4];
const OID_GITHUB_WORKFLOW_REPOSITORY: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 5];
const OID_GITHUB_WORKFLOW_REF: [u64; 9] = [1, 3, 6, 1, 4, 1, 57264, 1, 6];

/// Recovers a [`SignerIdentity`] from a leaf certificate's subject
/// alternative names and Fulcio custom extensions. Returns `Ok` with mostly
/// empty fields for a certificate that carries none of these (e.g. a
/// non-Fulcio signing cert) — this is data extraction, not a validity check.
pub fn extract_signer_identity(cert: &X509Certificate) -> Result<SignerIdentity, CertificateError> {
    let mut identity = SignerIdentity {
        issuer_cn: extract_issuer_cn(cert),
        san: extract_subject_alt_names(cert)?,
        ..Default::default()
    };

    for ext in cert.extensions() {
        let oid = &ext.oid;
        let value = extract_string_from_extension(ext)?;

        if let Some(v) = &value {
            identity.extensions.push((oid.to_id_string(), v.clone()));
        }

        if oid_equals(oid, &OID_ISSUER_V2) || oid_equals(oid, &OID_ISSUER_V1) {
            identity.oidc_issuer = value;
        } else if oid_equals(oid, &OID_SOURCE_REPOSITORY_URI) {
            identity.source_repository_uri = value;
        } else if oid_equals(oid, &OID_SOURCE_REPOSITORY_REF) {
            identity.source_repository_ref = value;
        } else if oid_equals(oid, &OID_GITHUB_WORKFLOW_TRIGGER) {
            identity.workflow_trigger = value;
        } else if oid_equals(oid, &OID_GITHUB_WORKFLOW_SHA) {
            identity.workflow_sha = value;
        } else if oid_equals(oid, &OID_GITHUB_WORKFLOW_NAME) {
            identity.workflow_name = value;
        } else if oid_equals(oid, &OID_GITHUB_WORKFLOW_REPOSITORY) {
            identity.workflow_repository = value;
        } else if oid_equals(oid, &OID_GITHUB_WORKFLOW_REF) {
            identity.workflow_ref = value;
        }
    }

    Ok(identity)
}

fn oid_equals(oid: &Oid, expected: &[u64]) -> bool {
    let Some(mut iter) = oid.iter() else {
        return false;
    };
    for &expected_val in expected {
        match iter.next() {
            Some(val) if val == expected_val => continue,
            _ => return false,
        }
    }
    iter.next().is_none()
}

/// x509-parser already strips the OCTET STRING wrapper, so `ext.value` holds
/// the inner bytes directly: typically a DER-encoded UTF8String/IA5String,
/// occasionally a raw UTF-8 string for non-conformant issuers.
fn extract_string_from_extension(ext: &X509Extension) -> Result<Option<String>, CertificateError> {
    let bytes = ext.value;

    if bytes.is_empty() {
        return Ok(None);
    }

    if bytes.len() > 2 {
        let tag = bytes[0];
        let len = bytes[1] as usize;
        // UTF8String (0x0C), IA5String (0x16), PrintableString (0x13)
        if matches!(tag, 0x0C | 0x16 | 0x13) && len + 2 <= bytes.len() {
            if let Ok(s) = std::str::from_utf8(&bytes[2..2 + len]) {
                return Ok(Some(s.to_string()));
            }
        }
    }

    Ok(std::str::from_utf8(bytes).ok().map(|s| s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_equals_rejects_prefix_match() {
        let oid = Oid::from(&[1, 3, 6, 1, 4, 1, 57264, 1, 8, 1]).unwrap();
        assert!(!oid_equals(&oid, &OID_ISSUER_V2));
    }

    #[test]
    fn oid_equals_matches_exact() {
        let oid = Oid::from(&[1, 3, 6, 1, 4, 1, 57264, 1, 8]).unwrap();
        assert!(oid_equals(&oid, &OID_ISSUER_V2));
    }
}
