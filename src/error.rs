use thiserror::Error;

/// Top-level error returned by [`crate::Verifier::verify`].
///
/// Each variant corresponds to one entry of the verification failure taxonomy;
/// the orchestrator short-circuits on the first one it hits and never attempts
/// to recover partial results.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("public key error: {0}")]
    PublicKey(#[from] PublicKeyError),

    #[error("transparency log body error: {0}")]
    TlogBody(#[from] TlogBodyError),

    #[error("transparency log inclusion promise error: {0}")]
    InclusionPromise(#[from] InclusionPromiseError),

    #[error("transparency log inclusion proof error: {0}")]
    InclusionProof(#[from] InclusionProofError),

    #[error("timestamp error: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("untrusted signer: {0}")]
    UntrustedSigner(#[from] PolicyError),

    #[error("invalid bundle format: {0}")]
    InvalidBundleFormat(String),
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid signature encoding: {0}")]
    InvalidFormat(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("failed to parse public key: {0}")]
    PublicKeyParse(String),

    #[error("no data supplied for message signature")]
    NoMessageData,

    #[error("dsse envelope carries no signatures")]
    NoDsseSignatures,

    #[error("message digest does not match artifact")]
    DigestMismatch,
}

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("failed to parse certificate: {0}")]
    ParseError(String),

    #[error("certificate chain verification failed: {0}")]
    ChainVerificationFailed(String),

    #[error("no trusted certificate authority covers the check time")]
    NoValidAuthority,

    #[error("certificate chain exceeds the maximum of {max} certificates")]
    ChainTooLong { max: usize },

    #[error(
        "signing time outside certificate validity: check_time={check_time}, not_before={not_before}, not_after={not_after}"
    )]
    SigningTimeOutsideValidity {
        check_time: String,
        not_before: String,
        not_after: String,
    },

    #[error("leaf certificate is missing required extended key usage {0}")]
    MissingExtendedKeyUsage(&'static str),

    #[error("intermediate certificate is not a CA or lacks keyCertSign usage")]
    InvalidIntermediateConstraints,

    #[error("{valid} signed certificate timestamps verified, below threshold of {threshold}")]
    InsufficientScts { valid: usize, threshold: usize },

    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),
}

#[derive(Debug, Error)]
pub enum PublicKeyError {
    #[error("no trust material entry for key hint {0}")]
    UnknownHint(String),

    #[error("key for hint {hint} is not valid at check time {check_time}")]
    NotValidAtCheckTime { hint: String, check_time: String },
}

#[derive(Debug, Error)]
pub enum TlogBodyError {
    #[error("unsupported transparency log entry kind/version: {kind}/{version}")]
    UnsupportedKind { kind: String, version: String },

    #[error("failed to parse canonicalized body: {0}")]
    ParseError(String),

    #[error("body signature does not match bundle signature")]
    SignatureMismatch,

    #[error("body public key does not match bundle signing key")]
    PublicKeyMismatch,

    #[error("body digest does not match bundle content")]
    DigestMismatch,

    #[error("body signature count ({body}) does not match DSSE envelope ({bundle})")]
    SignatureCountMismatch { body: usize, bundle: usize },

    #[error("entry kindVersion ({kind}/{version}) does not match canonicalized body")]
    KindVersionMismatch { kind: String, version: String },
}

#[derive(Debug, Error)]
pub enum InclusionPromiseError {
    #[error("no transparency log trusted for log id {0}")]
    UnknownLogId(String),

    #[error("transparency log key not valid at integrated time {0}")]
    LogNotValidAtTime(String),

    #[error("signed entry timestamp signature is invalid")]
    InvalidSignature,

    #[error("failed to canonicalize SET payload: {0}")]
    CanonicalizationError(String),
}

#[derive(Debug, Error)]
pub enum InclusionProofError {
    #[error("merkle inclusion proof root mismatch")]
    RootMismatch,

    #[error("log index {log_index} out of bounds for tree size {tree_size}")]
    IndexOutOfBounds { log_index: u64, tree_size: u64 },

    #[error("inclusion proof carries {count} hashes, exceeding the cap of {max}")]
    TooManyHashes { count: usize, max: usize },

    #[error("checkpoint envelope is malformed: {0}")]
    MalformedCheckpoint(String),

    #[error("checkpoint carries no signature matching a trusted log")]
    NoMatchingSignature,

    #[error("checkpoint logHash does not match the inclusion proof root hash")]
    CheckpointRootMismatch,
}

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("no verified timestamp evidence (neither transparency log nor RFC3161)")]
    NoTimestamp,

    #[error(
        "{valid} valid transparency log timestamp(s), below threshold of {threshold}"
    )]
    InsufficientTlogTimestamps { valid: usize, threshold: usize },

    #[error("{valid} valid RFC3161 timestamp(s), below threshold of {threshold}")]
    InsufficientTsaTimestamps { valid: usize, threshold: usize },

    #[error("duplicate transparency log entry for log_id={log_id} log_index={log_index}")]
    DuplicateLogEntry { log_id: String, log_index: i64 },

    #[error("failed to parse RFC3161 timestamp token: {0}")]
    Rfc3161Parse(String),

    #[error("RFC3161 message imprint does not match the bundle signature")]
    MessageImprintMismatch,

    #[error("RFC3161 signer certificate does not chain to a trusted timestamping authority")]
    UntrustedTsaChain,

    #[error("RFC3161 genTime falls outside the TSA signing certificate's validity window")]
    TsaCertNotValidAtGenTime,

    #[error("RFC3161 token signature verification failed")]
    InvalidSignature,

    #[error("TSA certificate is missing a critical timeStamping-only extended key usage")]
    InvalidTsaExtendedKeyUsage,

    #[error("invalid integrated time")]
    InvalidIntegratedTime,

    #[error("signingCertificateV2 certHash does not match the TSA signing certificate")]
    SigningCertificateMismatch,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(
        "certificate does not carry a subject alternative name matching '{expected}'"
    )]
    SubjectAlternativeNameMismatch { expected: String },

    #[error("certificate is missing required extension {oid}")]
    MissingExtension { oid: String },

    #[error("certificate extension {oid} has value '{actual}', expected '{expected}'")]
    ExtensionValueMismatch {
        oid: String,
        expected: String,
        actual: String,
    },
}
