use std::collections::HashSet;

use base64::prelude::*;
use tracing::{debug, trace};
use x509_parser::certificate::X509Certificate;

use crate::crypto::signature::PublicKey;
use crate::error::{CertificateError, PublicKeyError, TimestampError, VerificationError};
use crate::fetcher::jsonl::{
    load_trusted_root_from_jsonl, select_all_timestamp_authorities, select_certificate_authorities,
};
use crate::parser::certificate::{extract_sct_list, parse_der_certificate};
use crate::parser::identity::extract_signer_identity;
use crate::types::{
    Bundle, KeyMaterial, PublicKeyEntry, TimestampSource, TrustedRoot, VerificationResult, VerifiedTimestamp,
    VerifierConfig,
};
use crate::verifier::certificate::{verify_certificate_chain, LeafRole};
use crate::verifier::ctlog::{count_valid_scts, parse_sct_list};
use crate::verifier::policy::enforce_identity_policy;
use crate::verifier::signature::verify_content_signature;
use crate::verifier::timestamp::verify_rfc3161_timestamp;
use crate::verifier::transparency::verify_tlog_entry;

/// Offline verifier for Sigstore bundles, holding the trust material (CAs,
/// transparency logs, TSAs, bare public-key signers) a set of `verify` calls
/// are checked against. Build once per trust root generation and reuse
/// across bundles.
pub struct Verifier {
    trusted_roots: Vec<TrustedRoot>,
}

impl Verifier {
    pub fn new(trusted_roots: Vec<TrustedRoot>) -> Self {
        Self { trusted_roots }
    }

    pub fn from_jsonl(jsonl: &str) -> Result<Self, VerificationError> {
        Ok(Self::new(load_trusted_root_from_jsonl(jsonl)?))
    }

    /// Verifies a bundle's signature, transparency log entries, embedded
    /// timestamps, certificate chain (or public-key trust window), and
    /// identity policy against this verifier's trust material, enforcing
    /// `config`'s thresholds.
    ///
    /// The order matters: the content signature is verified against the key
    /// material the bundle itself carries first (no trust needed to check a
    /// signature verifies); every timestamp is then independently verified
    /// against its own evidence (a log's SET, an RFC3161 token's own
    /// `genTime`); only once `check_time` — the earliest of those verified
    /// timestamps — exists is the certificate chain or public-key validity
    /// window evaluated. There is no wall-clock fallback: a bundle with no
    /// verifiable timestamp evidence at all is rejected outright, since
    /// nothing would tell us what time to evaluate trust material validity at.
    ///
    /// `artifact` is the raw bytes the bundle signs; it's required when the
    /// bundle carries a detached `messageSignature` (a DSSE envelope embeds
    /// its own payload and ignores this argument).
    pub fn verify(
        &self,
        bundle: &Bundle,
        artifact: Option<&[u8]>,
        config: &VerifierConfig,
    ) -> Result<VerificationResult, VerificationError> {
        let key_material = &bundle.verification_material.key_material;

        // Step 1: resolve the key material to a `PublicKey` and the raw
        // bytes a transparency log body would carry to describe it. Nothing
        // here is trusted yet — that's established in step 4, once a
        // check_time exists to evaluate validity windows against.
        let (public_key, key_material_der, cert_leaf_der) = match key_material {
            KeyMaterial::Certificate { .. } | KeyMaterial::X509CertificateChain { .. } => {
                let certs = key_material
                    .certificates_der()
                    .map_err(|e| VerificationError::InvalidBundleFormat(e.to_string()))?;
                let leaf_der = certs.first().cloned().ok_or_else(|| {
                    VerificationError::InvalidBundleFormat("no certificate in key material".into())
                })?;
                let leaf_cert = parse_der_certificate(&leaf_der)?;
                let public_key = PublicKey::from_certificate(&leaf_cert)?;
                (public_key, leaf_der.clone(), Some(leaf_der))
            }
            KeyMaterial::PublicKey { hint } => {
                let hint = hint.clone().unwrap_or_default();
                let entry = self
                    .find_public_key(&hint)
                    .ok_or_else(|| PublicKeyError::UnknownHint(hint.clone()))?;
                let raw_bytes = entry
                    .raw_bytes
                    .as_ref()
                    .ok_or_else(|| PublicKeyError::UnknownHint(hint.clone()))?;
                let key_der = BASE64_STANDARD
                    .decode(raw_bytes)
                    .map_err(|e| VerificationError::InvalidBundleFormat(format!("bad public key base64: {e}")))?;
                let public_key = PublicKey::from_public_key_der(&key_der)?;
                (public_key, key_der, None)
            }
        };

        let signature = verify_content_signature(&bundle.content, &public_key, artifact)?;
        trace!("content signature verified against bundle-supplied key material");

        // Step 2: collect and independently verify every timestamp the
        // bundle carries. A transparency log entry authenticates itself
        // against its own log key and integrated_time; an RFC3161 token
        // authenticates itself against its own genTime. Neither needs the
        // signing certificate's chain verified first.
        let mut verified_timestamps = Vec::new();
        let mut seen_tlog_entries = HashSet::new();

        for entry in &bundle.verification_material.tlog_entries {
            let dedup_key = (entry.log_id.key_id.clone(), entry.log_index.clone());
            if !seen_tlog_entries.insert(dedup_key.clone()) {
                return Err(TimestampError::DuplicateLogEntry {
                    log_id: dedup_key.0,
                    log_index: dedup_key.1.parse().unwrap_or(-1),
                }
                .into());
            }

            let trusted_root = self
                .trusted_root_for_log(&entry.log_id.key_id)
                .ok_or_else(|| PublicKeyError::UnknownHint(entry.log_id.key_id.clone()))?;

            let outcome = verify_tlog_entry(entry, &bundle.content, &key_material_der, &signature, trusted_root)?;
            verified_timestamps.push(VerifiedTimestamp {
                source: TimestampSource::TransparencyLog { log_id: outcome.log_id },
                time: outcome.integrated_time,
            });
        }

        if let Some(ts_data) = &bundle.verification_material.timestamp_verification_data {
            if !ts_data.rfc3161_timestamps.is_empty() {
                let tsa_candidates = select_all_timestamp_authorities(&self.trusted_roots)?;
                for rfc3161 in &ts_data.rfc3161_timestamps {
                    let token_der = BASE64_STANDARD
                        .decode(&rfc3161.signed_timestamp)
                        .map_err(|e| VerificationError::InvalidBundleFormat(e.to_string()))?;
                    let outcome = verify_rfc3161_timestamp(&token_der, &signature, &tsa_candidates)?;
                    verified_timestamps.push(VerifiedTimestamp {
                        source: TimestampSource::Rfc3161,
                        time: outcome.time,
                    });
                }
            }
        }

        let tlog_count = verified_timestamps
            .iter()
            .filter(|t| matches!(t.source, TimestampSource::TransparencyLog { .. }))
            .count();
        if config.require_transparency_log && tlog_count < config.tlog_threshold {
            return Err(TimestampError::InsufficientTlogTimestamps {
                valid: tlog_count,
                threshold: config.tlog_threshold,
            }
            .into());
        }

        let tsa_count = verified_timestamps
            .iter()
            .filter(|t| matches!(t.source, TimestampSource::Rfc3161))
            .count();
        if config.tsa_threshold > 0 && tsa_count < config.tsa_threshold {
            return Err(TimestampError::InsufficientTsaTimestamps {
                valid: tsa_count,
                threshold: config.tsa_threshold,
            }
            .into());
        }

        // Step 3: check_time is the earliest independently verified
        // timestamp, never wall-clock "now" — a verifier run long after
        // signing must judge certificate and key validity as of when the
        // signature was actually attested to. A bundle with no verified
        // timestamp evidence at all has nothing to anchor that judgment to.
        let check_time = verified_timestamps
            .iter()
            .map(|t| t.time)
            .min()
            .ok_or(TimestampError::NoTimestamp)?;
        debug!(check_time = %check_time, "check time computed from verified timestamps");

        // Step 4: now that check_time exists, establish trust in the key
        // material itself — chain validity for a certificate, or the
        // declared validity window for a bare public key.
        let (certificate_hashes, signer_identity) = match (key_material, cert_leaf_der) {
            (KeyMaterial::Certificate { .. } | KeyMaterial::X509CertificateChain { .. }, Some(leaf_der)) => {
                let ca_candidates = select_certificate_authorities(&self.trusted_roots, check_time)?;
                let (chain, hashes) =
                    verify_certificate_chain(&leaf_der, &ca_candidates, check_time, LeafRole::CodeSigning)?;

                let leaf_cert = parse_der_certificate(&chain.leaf)?;
                enforce_sct_threshold(&leaf_cert, &self.trusted_roots, config)?;
                let identity = extract_signer_identity(&leaf_cert)?;

                (Some(hashes), Some(identity))
            }
            (KeyMaterial::PublicKey { hint }, _) => {
                let hint = hint.clone().unwrap_or_default();
                let entry = self
                    .find_public_key(&hint)
                    .ok_or_else(|| PublicKeyError::UnknownHint(hint.clone()))?;
                if let Some(valid_for) = &entry.valid_for {
                    if !valid_for.contains(check_time) {
                        return Err(PublicKeyError::NotValidAtCheckTime {
                            hint,
                            check_time: check_time.to_rfc3339(),
                        }
                        .into());
                    }
                }
                (None, None)
            }
            (KeyMaterial::Certificate { .. } | KeyMaterial::X509CertificateChain { .. }, None) => {
                unreachable!("cert_leaf_der is always Some for certificate-backed key material")
            }
        };

        if let (Some(identity), Some(policy)) = (&signer_identity, &config.identity_policy) {
            enforce_identity_policy(identity, policy)?;
        }

        Ok(VerificationResult {
            certificate_hashes,
            check_time,
            verified_timestamps,
            signer_identity,
        })
    }

    fn find_public_key(&self, hint: &str) -> Option<&PublicKeyEntry> {
        self.trusted_roots
            .iter()
            .flat_map(|root| root.public_keys.iter())
            .find(|entry| entry.hint == hint)
    }

    fn trusted_root_for_log(&self, log_id_b64: &str) -> Option<&TrustedRoot> {
        self.trusted_roots
            .iter()
            .find(|root| root.tlogs.iter().any(|t| t.log_id.key_id == log_id_b64))
    }
}

/// Enforces `config.ctlog_sct_threshold` against the leaf's embedded SCT
/// list. A threshold of 0 disables the check entirely. This verifies SCTs
/// structurally (logID + validity window), not cryptographically — see
/// DESIGN.md for why full precertificate reconstruction is out of scope.
fn enforce_sct_threshold(
    leaf_cert: &X509Certificate,
    trusted_roots: &[TrustedRoot],
    config: &VerifierConfig,
) -> Result<(), CertificateError> {
    if config.ctlog_sct_threshold == 0 {
        return Ok(());
    }

    let ctlogs: Vec<_> = trusted_roots.iter().flat_map(|root| root.ctlogs.iter().cloned()).collect();

    let scts = match extract_sct_list(leaf_cert) {
        Some(data) => parse_sct_list(data)?,
        None => Vec::new(),
    };

    let valid = count_valid_scts(&scts, &ctlogs);
    if valid < config.ctlog_sct_threshold {
        return Err(CertificateError::InsufficientScts {
            valid,
            threshold: config.ctlog_sct_threshold,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_material_with_no_matching_trust_entry_is_rejected() {
        let verifier = Verifier::new(vec![]);
        let bundle_json = r#"{
            "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
            "verificationMaterial": { "publicKey": { "hint": "abc" }, "tlogEntries": [] },
            "messageSignature": { "messageDigest": { "algorithm": "SHA2_256", "digest": "AAAA" }, "signature": "AAAA" }
        }"#;
        let bundle = Bundle::parse_json(bundle_json.as_bytes()).unwrap();
        let err = verifier.verify(&bundle, None, &VerifierConfig::default()).unwrap_err();
        assert!(matches!(err, VerificationError::PublicKey(_)));
    }
}
