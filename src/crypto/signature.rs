use der::Decode;
use ecdsa::signature::Verifier as _;
use p256::ecdsa::{Signature as P256Signature, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{Signature as P384Signature, VerifyingKey as P384VerifyingKey};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature as RsaPkcs1Signature, VerifyingKey as RsaPkcs1VerifyingKey};
use rsa::pss::{Signature as RsaPssSignature, VerifyingKey as RsaPssVerifyingKey};
use rsa::sha2::{Sha256 as RsaSha256, Sha384 as RsaSha384};
use rsa::RsaPublicKey;
use sha2::{Sha256, Sha384};
use x509_parser::certificate::X509Certificate;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::error::SignatureError;

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_P256: &str = "1.2.840.10045.3.1.7";
const OID_P384: &str = "1.3.132.0.34";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_ED25519: &str = "1.3.101.112";

/// The signature algorithm a key was registered under in trust material, or
/// that a leaf certificate's SPKI implies. Mirrors the `keyDetails` strings
/// used by Sigstore's TrustedRoot format (e.g. `PKIX_ECDSA_P256_SHA_256`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    EcdsaP256Sha256,
    EcdsaP384Sha384,
    RsaPkcs1Sha256,
    RsaPssSha256,
    Ed25519,
}

impl SignatureAlgorithm {
    /// Best-effort algorithm for a key when no explicit `keyDetails` is
    /// available (e.g. a leaf certificate's own SPKI). ECDSA and Ed25519
    /// keys have a single conventional pairing; RSA defaults to PKCS#1v1.5
    /// since that's what Fulcio and cosign both emit in practice.
    fn natural_for(key: &PublicKey) -> Self {
        match key {
            PublicKey::P256(_) => SignatureAlgorithm::EcdsaP256Sha256,
            PublicKey::P384(_) => SignatureAlgorithm::EcdsaP384Sha384,
            PublicKey::Rsa(_) => SignatureAlgorithm::RsaPkcs1Sha256,
            PublicKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }
}

pub enum PublicKey {
    P256(P256VerifyingKey),
    P384(P384VerifyingKey),
    Rsa(RsaPublicKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
    pub fn from_certificate(cert: &X509Certificate) -> Result<Self, SignatureError> {
        Self::from_spki(cert.public_key())
    }

    /// Parses a bare SubjectPublicKeyInfo DER blob, as stored in trust
    /// material's `publicKey.rawBytes` field.
    pub fn from_public_key_der(der_bytes: &[u8]) -> Result<Self, SignatureError> {
        let (_, spki) = SubjectPublicKeyInfo::from_der(der_bytes)
            .map_err(|e| SignatureError::PublicKeyParse(e.to_string()))?;
        Self::from_spki(&spki)
    }

    fn from_spki(spki: &SubjectPublicKeyInfo) -> Result<Self, SignatureError> {
        let algorithm_oid = spki.algorithm.algorithm.to_id_string();
        let key_bytes = &spki.subject_public_key.data;

        if algorithm_oid == OID_EC_PUBLIC_KEY {
            let curve_oid = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .ok_or_else(|| {
                    SignatureError::PublicKeyParse("EC key without curve parameters".to_string())
                })?;

            return match curve_oid.to_id_string().as_str() {
                OID_P256 => P256VerifyingKey::from_sec1_bytes(key_bytes)
                    .map(PublicKey::P256)
                    .map_err(|e| SignatureError::PublicKeyParse(e.to_string())),
                OID_P384 => P384VerifyingKey::from_sec1_bytes(key_bytes)
                    .map(PublicKey::P384)
                    .map_err(|e| SignatureError::PublicKeyParse(e.to_string())),
                other => Err(SignatureError::UnsupportedAlgorithm(format!(
                    "EC curve {other}"
                ))),
            };
        }

        if algorithm_oid == OID_RSA_ENCRYPTION {
            return RsaPublicKey::from_pkcs1_der(key_bytes)
                .map(PublicKey::Rsa)
                .map_err(|e| SignatureError::PublicKeyParse(e.to_string()));
        }

        if algorithm_oid == OID_ED25519 {
            let bytes: [u8; 32] = key_bytes
                .as_ref()
                .try_into()
                .map_err(|_| SignatureError::PublicKeyParse("Ed25519 key is not 32 bytes".into()))?;
            return ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                .map(PublicKey::Ed25519)
                .map_err(|e| SignatureError::PublicKeyParse(e.to_string()));
        }

        Err(SignatureError::UnsupportedAlgorithm(algorithm_oid))
    }

    /// Verifies under the key's conventional algorithm. Used for certificate
    /// chain links and DSSE/message signatures where no separate
    /// `keyDetails` hint is available.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        self.verify_with(SignatureAlgorithm::natural_for(self), message, signature)
    }

    /// Verifies under an explicit algorithm, as required when trust material
    /// states `keyDetails` (e.g. distinguishing RSA PKCS#1 from RSA-PSS).
    pub fn verify_with(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureError> {
        match (self, algorithm) {
            (PublicKey::P256(key), SignatureAlgorithm::EcdsaP256Sha256) => {
                let sig = P256Signature::from_der(signature)
                    .map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;
                key.verify(message, &sig)
                    .map_err(|_| SignatureError::InvalidSignature)
            }
            (PublicKey::P384(key), SignatureAlgorithm::EcdsaP384Sha384) => {
                let sig = P384Signature::from_der(signature)
                    .map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;
                key.verify(message, &sig)
                    .map_err(|_| SignatureError::InvalidSignature)
            }
            (PublicKey::Rsa(key), SignatureAlgorithm::RsaPkcs1Sha256) => {
                let verifying_key = RsaPkcs1VerifyingKey::<RsaSha256>::new(key.clone());
                let sig = RsaPkcs1Signature::try_from(signature)
                    .map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;
                verifying_key
                    .verify(message, &sig)
                    .map_err(|_| SignatureError::InvalidSignature)
            }
            (PublicKey::Rsa(key), SignatureAlgorithm::RsaPssSha256) => {
                let verifying_key = RsaPssVerifyingKey::<RsaSha256>::new(key.clone());
                let sig = RsaPssSignature::try_from(signature)
                    .map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;
                verifying_key
                    .verify(message, &sig)
                    .map_err(|_| SignatureError::InvalidSignature)
            }
            (PublicKey::Ed25519(key), SignatureAlgorithm::Ed25519) => {
                let sig_bytes: [u8; 64] = signature
                    .try_into()
                    .map_err(|_| SignatureError::InvalidFormat("Ed25519 signature is not 64 bytes".into()))?;
                let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
                key.verify_strict(message, &sig)
                    .map_err(|_| SignatureError::InvalidSignature)
            }
            (_, algorithm) => Err(SignatureError::UnsupportedAlgorithm(format!(
                "{algorithm:?} does not match this key's type"
            ))),
        }
    }
}

/// Digests `message` with the hash function that conventionally pairs with
/// `algorithm`, for callers (e.g. RFC3161 message-imprint checks) that need
/// the raw digest rather than a verified signature.
pub fn digest_for(algorithm: SignatureAlgorithm, message: &[u8]) -> Vec<u8> {
    use sha2::Digest;
    match algorithm {
        SignatureAlgorithm::EcdsaP256Sha256
        | SignatureAlgorithm::RsaPkcs1Sha256
        | SignatureAlgorithm::RsaPssSha256 => Sha256::digest(message).to_vec(),
        SignatureAlgorithm::EcdsaP384Sha384 => Sha384::digest(message).to_vec(),
        SignatureAlgorithm::Ed25519 => message.to_vec(),
    }
}
