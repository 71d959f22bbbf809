use chrono::{DateTime, Utc};

use super::certificate::SignerIdentity;

#[derive(Debug, Clone)]
pub struct CertificateChainHashes {
    pub leaf: [u8; 32],
    pub intermediates: Vec<[u8; 32]>,
    pub root: [u8; 32],
}

/// Where a verified timestamp came from, kept so callers can tell a
/// transparency-log-derived check time apart from an RFC3161-derived one.
#[derive(Debug, Clone)]
pub enum TimestampSource {
    TransparencyLog { log_id: String },
    Rfc3161,
}

#[derive(Debug, Clone)]
pub struct VerifiedTimestamp {
    pub source: TimestampSource,
    pub time: DateTime<Utc>,
}

/// Everything a successful [`crate::Verifier::verify`] call hands back.
///
/// `check_time` is the earliest of `verified_timestamps`, i.e. the time used
/// to evaluate certificate and key validity windows.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub certificate_hashes: Option<CertificateChainHashes>,
    pub check_time: DateTime<Utc>,
    pub verified_timestamps: Vec<VerifiedTimestamp>,
    pub signer_identity: Option<SignerIdentity>,
}

/// A set of subject-alternative-name / extension-OID matches the caller
/// requires of the leaf certificate for `verify` to succeed. Absent entirely,
/// no policy matching is performed beyond chain and signature verification.
///
/// `required_extensions` holds arbitrary (dotted OID, expected value) pairs
/// so callers can pin any Fulcio claim (workflow ref, trigger event, issuer,
/// ...) rather than just the one hardcoded OIDC-issuer check this used to
/// support.
#[derive(Debug, Clone, Default)]
pub struct IdentityPolicy {
    pub expected_san: Option<String>,
    pub required_extensions: Vec<(String, String)>,
}

/// Thresholds the orchestrator enforces before it will call a bundle
/// verified. All default to 1, matching Sigstore's baseline "one log, one
/// timestamp" trust model; raise them to require corroboration from
/// multiple independent logs or timestamping authorities.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub tlog_threshold: usize,
    pub ctlog_sct_threshold: usize,
    pub tsa_threshold: usize,
    pub require_transparency_log: bool,
    pub identity_policy: Option<IdentityPolicy>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            tlog_threshold: 1,
            ctlog_sct_threshold: 1,
            tsa_threshold: 0,
            require_transparency_log: true,
            identity_policy: None,
        }
    }
}
