use base64::prelude::*;
use tracing::{debug, trace};

use crate::crypto::hash::{constant_time_eq, sha256, sha384};
use crate::crypto::signature::PublicKey;
use crate::error::SignatureError;
use crate::types::{BundleContent, MessageSignatureContent};

const DSSE_PAE_PREFIX: &str = "DSSEv1";

/// Builds the DSSE v1 Pre-Authentication Encoding of a payload, per
/// https://github.com/secure-systems-lab/dsse:
/// `"DSSEv1 " + len(type) + " " + type + " " + len(payload) + " " + payload`.
pub fn create_pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut pae = Vec::with_capacity(payload.len() + payload_type.len() + 32);
    pae.extend_from_slice(DSSE_PAE_PREFIX.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload_type.len().to_string().as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload_type.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload.len().to_string().as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload);
    pae
}

/// Verifies the artifact's signature against the leaf certificate's public
/// key, dispatching on whether the bundle carries a message signature or a
/// DSSE envelope. Returns the raw signature bytes that were verified, for
/// cross-checking against the transparency log body.
///
/// `artifact` is the detached content a `messageSignature` bundle signs; a
/// DSSE envelope carries its own payload and ignores it.
pub fn verify_content_signature(
    content: &BundleContent,
    public_key: &PublicKey,
    artifact: Option<&[u8]>,
) -> Result<Vec<u8>, SignatureError> {
    match content {
        BundleContent::MessageSignature(msg) => verify_message_signature(msg, public_key, artifact),
        BundleContent::DsseEnvelope(envelope) => {
            let signature = envelope
                .signatures
                .first()
                .ok_or(SignatureError::NoDsseSignatures)?;
            let sig_bytes = BASE64_STANDARD
                .decode(&signature.sig)
                .map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;
            let payload = BASE64_STANDARD
                .decode(&envelope.payload)
                .map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;
            let pae = create_pae(&envelope.payload_type, &payload);
            public_key.verify(&pae, &sig_bytes)?;
            trace!("dsse envelope signature verified over PAE");
            Ok(sig_bytes)
        }
    }
}

/// Verifies `sig_content = artifact_bytes`: the declared digest matches the
/// artifact, then the signature verifies over the artifact itself — never
/// over the digest, since every [`PublicKey::verify`] backend hashes its
/// `message` argument internally.
fn verify_message_signature(
    content: &MessageSignatureContent,
    public_key: &PublicKey,
    artifact: Option<&[u8]>,
) -> Result<Vec<u8>, SignatureError> {
    let signature = BASE64_STANDARD
        .decode(&content.signature)
        .map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;

    let declared_digest = BASE64_STANDARD
        .decode(&content.message_digest.digest)
        .map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;

    let artifact = artifact.ok_or(SignatureError::NoMessageData)?;

    let computed_digest = match content.message_digest.algorithm.as_str() {
        "SHA2_256" => sha256(artifact).to_vec(),
        "SHA2_384" => sha384(artifact).to_vec(),
        other => return Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
    };
    if !constant_time_eq(&declared_digest, &computed_digest) {
        return Err(SignatureError::DigestMismatch);
    }

    public_key.verify(artifact, &signature)?;
    debug!(algorithm = %content.message_digest.algorithm, "message signature verified over artifact");
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageDigest;
    use ecdsa::signature::Signer;
    use p256::ecdsa::Signature as P256Signature;
    use rand::rngs::OsRng;

    #[test]
    fn pae_starts_with_dsse_prefix_and_encodes_lengths() {
        let pae = create_pae("application/vnd.in-toto+json", b"hello");
        let expected = b"DSSEv1 29 application/vnd.in-toto+json 5 hello";
        assert_eq!(pae, expected);
    }

    #[test]
    fn message_signature_verifies_over_the_artifact_not_the_digest() {
        let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);
        let public_key = PublicKey::P256(*signing_key.verifying_key());

        let artifact = b"hello, world!";
        let sig: P256Signature = signing_key.sign(artifact);

        let content = MessageSignatureContent {
            message_digest: MessageDigest {
                algorithm: "SHA2_256".into(),
                digest: BASE64_STANDARD.encode(sha256(artifact)),
            },
            signature: BASE64_STANDARD.encode(sig.to_der().as_bytes()),
        };

        assert!(verify_message_signature(&content, &public_key, Some(artifact)).is_ok());
    }

    #[test]
    fn message_signature_without_artifact_is_rejected() {
        let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);
        let public_key = PublicKey::P256(*signing_key.verifying_key());
        let artifact = b"hello, world!";
        let sig: P256Signature = signing_key.sign(artifact);

        let content = MessageSignatureContent {
            message_digest: MessageDigest {
                algorithm: "SHA2_256".into(),
                digest: BASE64_STANDARD.encode(sha256(artifact)),
            },
            signature: BASE64_STANDARD.encode(sig.to_der().as_bytes()),
        };

        let err = verify_message_signature(&content, &public_key, None).unwrap_err();
        assert!(matches!(err, SignatureError::NoMessageData));
    }

    #[test]
    fn message_signature_rejects_digest_not_matching_artifact() {
        let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);
        let public_key = PublicKey::P256(*signing_key.verifying_key());
        let artifact = b"hello, world!";
        let sig: P256Signature = signing_key.sign(artifact);

        let content = MessageSignatureContent {
            message_digest: MessageDigest {
                algorithm: "SHA2_256".into(),
                digest: BASE64_STANDARD.encode(sha256(b"some other artifact")),
            },
            signature: BASE64_STANDARD.encode(sig.to_der().as_bytes()),
        };

        let err = verify_message_signature(&content, &public_key, Some(artifact)).unwrap_err();
        assert!(matches!(err, SignatureError::DigestMismatch));
    }
}
