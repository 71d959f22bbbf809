use base64::prelude::*;
use serde::Deserialize;

use crate::crypto::hash::{constant_time_eq, sha256};
use crate::error::TlogBodyError;
use crate::types::{BundleContent, KindVersion};

#[derive(Debug, Deserialize)]
struct HashValue {
    algorithm: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct HashedRekordBody {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    spec: HashedRekordSpec,
}

#[derive(Debug, Deserialize)]
struct HashedRekordSpec {
    signature: HashedRekordSignature,
    data: HashedRekordData,
}

#[derive(Debug, Deserialize)]
struct HashedRekordSignature {
    content: String,
    #[serde(rename = "publicKey")]
    public_key: PublicKeyContent,
}

#[derive(Debug, Deserialize)]
struct PublicKeyContent {
    content: String,
}

#[derive(Debug, Deserialize)]
struct HashedRekordData {
    hash: HashValue,
}

#[derive(Debug, Deserialize)]
struct DsseBody {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    spec: DsseSpec,
}

#[derive(Debug, Deserialize)]
struct DsseSpec {
    signatures: Vec<DsseBodySignature>,
    #[serde(rename = "payloadHash")]
    payload_hash: Option<HashValue>,
}

#[derive(Debug, Deserialize)]
struct DsseBodySignature {
    signature: String,
    verifier: String,
}

#[derive(Debug, Deserialize)]
struct IntotoBody {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    spec: IntotoSpec,
}

#[derive(Debug, Deserialize)]
struct IntotoSpec {
    content: IntotoContent,
}

#[derive(Debug, Deserialize)]
struct IntotoContent {
    hash: Option<HashValue>,
    #[serde(rename = "payloadHash")]
    payload_hash: Option<HashValue>,
    envelope: Option<IntotoEnvelope>,
}

#[derive(Debug, Deserialize)]
struct IntotoEnvelope {
    #[serde(default)]
    signatures: Vec<IntotoEnvelopeSignature>,
}

#[derive(Debug, Deserialize)]
struct IntotoEnvelopeSignature {
    sig: String,
    #[serde(rename = "publicKey")]
    public_key: Option<String>,
}

/// Cross-checks a transparency log entry's canonicalized body against the
/// bundle it supposedly describes: the signature bytes, the signing key or
/// certificate, the artifact digest, and the signature count must all
/// match, and the entry's declared `kindVersion` must match which body
/// shape actually parses. A log can only attest to what it actually saw;
/// this is how we make sure that's the same thing the bundle is showing us.
pub fn verify_tlog_body(
    kind_version: &KindVersion,
    canonicalized_body: &[u8],
    content: &BundleContent,
    leaf_cert_der: &[u8],
    signature: &[u8],
) -> Result<(), TlogBodyError> {
    match kind_version.kind.as_str() {
        "hashedrekord" => verify_hashedrekord_body(kind_version, canonicalized_body, content, leaf_cert_der, signature),
        "dsse" => verify_dsse_body(kind_version, canonicalized_body, content, leaf_cert_der),
        "intoto" => verify_intoto_body(kind_version, canonicalized_body, content, leaf_cert_der, signature),
        other => Err(TlogBodyError::UnsupportedKind {
            kind: other.to_string(),
            version: kind_version.version.clone(),
        }),
    }
}

fn check_kind_version(
    kind_version: &KindVersion,
    body_kind: &str,
    body_api_version: &str,
) -> Result<(), TlogBodyError> {
    if kind_version.kind != body_kind || kind_version.version != body_api_version {
        return Err(TlogBodyError::KindVersionMismatch {
            kind: body_kind.to_string(),
            version: body_api_version.to_string(),
        });
    }
    Ok(())
}

fn verify_hashedrekord_body(
    kind_version: &KindVersion,
    canonicalized_body: &[u8],
    content: &BundleContent,
    leaf_cert_der: &[u8],
    signature: &[u8],
) -> Result<(), TlogBodyError> {
    let body: HashedRekordBody =
        serde_json::from_slice(canonicalized_body).map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
    check_kind_version(kind_version, &body.kind, &body.api_version)?;

    let body_sig = BASE64_STANDARD
        .decode(&body.spec.signature.content)
        .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
    if !constant_time_eq(&body_sig, signature) {
        return Err(TlogBodyError::SignatureMismatch);
    }

    let body_key = BASE64_STANDARD
        .decode(&body.spec.signature.public_key.content)
        .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
    if !key_material_matches(&body_key, leaf_cert_der) {
        return Err(TlogBodyError::PublicKeyMismatch);
    }

    if let BundleContent::MessageSignature(msg) = content {
        let declared = BASE64_STANDARD
            .decode(&msg.message_digest.digest)
            .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
        let body_digest = hex::decode(&body.spec.data.hash.value)
            .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
        if !constant_time_eq(&declared, &body_digest) {
            return Err(TlogBodyError::DigestMismatch);
        }
    }

    Ok(())
}

fn verify_dsse_body(
    kind_version: &KindVersion,
    canonicalized_body: &[u8],
    content: &BundleContent,
    leaf_cert_der: &[u8],
) -> Result<(), TlogBodyError> {
    let body: DsseBody =
        serde_json::from_slice(canonicalized_body).map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
    check_kind_version(kind_version, &body.kind, &body.api_version)?;

    let BundleContent::DsseEnvelope(envelope) = content else {
        return Err(TlogBodyError::KindVersionMismatch {
            kind: "dsse".into(),
            version: String::new(),
        });
    };

    if body.spec.signatures.len() != envelope.signatures.len() {
        return Err(TlogBodyError::SignatureCountMismatch {
            body: body.spec.signatures.len(),
            bundle: envelope.signatures.len(),
        });
    }

    let bundle_sigs: Vec<Vec<u8>> = envelope
        .signatures
        .iter()
        .map(|s| BASE64_STANDARD.decode(&s.sig))
        .collect::<Result<_, _>>()
        .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;

    for body_sig in &body.spec.signatures {
        let sig_bytes = BASE64_STANDARD
            .decode(&body_sig.signature)
            .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
        if !bundle_sigs.iter().any(|s| constant_time_eq(s, &sig_bytes)) {
            return Err(TlogBodyError::SignatureMismatch);
        }

        let verifier_bytes = BASE64_STANDARD
            .decode(&body_sig.verifier)
            .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
        if !key_material_matches(&verifier_bytes, leaf_cert_der) {
            return Err(TlogBodyError::PublicKeyMismatch);
        }
    }

    if let Some(payload_hash) = &body.spec.payload_hash {
        let payload = BASE64_STANDARD
            .decode(&envelope.payload)
            .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
        let computed = sha256(&payload);
        let declared =
            hex::decode(&payload_hash.value).map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
        if payload_hash.algorithm.eq_ignore_ascii_case("sha256") && !constant_time_eq(&computed, &declared) {
            return Err(TlogBodyError::DigestMismatch);
        }
    }

    Ok(())
}

fn verify_intoto_body(
    kind_version: &KindVersion,
    canonicalized_body: &[u8],
    content: &BundleContent,
    leaf_cert_der: &[u8],
    signature: &[u8],
) -> Result<(), TlogBodyError> {
    let body: IntotoBody =
        serde_json::from_slice(canonicalized_body).map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
    check_kind_version(kind_version, &body.kind, &body.api_version)?;

    let BundleContent::DsseEnvelope(envelope) = content else {
        return Err(TlogBodyError::KindVersionMismatch {
            kind: "intoto".into(),
            version: String::new(),
        });
    };

    if let Some(envelope_body) = &body.spec.content.envelope {
        if envelope_body.signatures.len() != envelope.signatures.len() {
            return Err(TlogBodyError::SignatureCountMismatch {
                body: envelope_body.signatures.len(),
                bundle: envelope.signatures.len(),
            });
        }

        let bundle_sigs: Vec<Vec<u8>> = envelope
            .signatures
            .iter()
            .map(|s| BASE64_STANDARD.decode(&s.sig))
            .collect::<Result<_, _>>()
            .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;

        for body_sig in &envelope_body.signatures {
            let sig_bytes = BASE64_STANDARD
                .decode(&body_sig.sig)
                .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
            if !bundle_sigs.iter().any(|s| constant_time_eq(s, &sig_bytes)) {
                return Err(TlogBodyError::SignatureMismatch);
            }

            if let Some(public_key) = &body_sig.public_key {
                let key_bytes = BASE64_STANDARD
                    .decode(public_key)
                    .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
                if !key_material_matches(&key_bytes, leaf_cert_der) {
                    return Err(TlogBodyError::PublicKeyMismatch);
                }
            }
        }
    } else if !bundle_signature_present(&envelope.signatures, signature) {
        return Err(TlogBodyError::SignatureMismatch);
    }

    if let Some(payload_hash) = body.spec.content.payload_hash.or(body.spec.content.hash) {
        let payload = BASE64_STANDARD
            .decode(&envelope.payload)
            .map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
        let computed = sha256(&payload);
        let declared =
            hex::decode(&payload_hash.value).map_err(|e| TlogBodyError::ParseError(e.to_string()))?;
        if payload_hash.algorithm.eq_ignore_ascii_case("sha256") && !constant_time_eq(&computed, &declared) {
            return Err(TlogBodyError::DigestMismatch);
        }
    }

    Ok(())
}

/// When the body's `content.envelope` is redacted down to nothing (omitted
/// entirely by some Rekor deployments), fall back to checking that the
/// bundle's own DSSE signature is at least self-consistent with what was
/// verified against the signing key.
fn bundle_signature_present(bundle_signatures: &[crate::types::DsseSignature], signature: &[u8]) -> bool {
    bundle_signatures.iter().any(|s| {
        BASE64_STANDARD
            .decode(&s.sig)
            .map(|decoded| constant_time_eq(&decoded, signature))
            .unwrap_or(false)
    })
}

/// The log body carries either a raw SPKI or a PEM/DER certificate; either
/// way it must describe the same key material the bundle's leaf
/// certificate carries.
fn key_material_matches(body_key: &[u8], leaf_cert_der: &[u8]) -> bool {
    if constant_time_eq(body_key, leaf_cert_der) {
        return true;
    }
    if let Ok(pem) = std::str::from_utf8(body_key) {
        if let Ok(parsed) = pem::parse(pem) {
            return constant_time_eq(parsed.contents(), leaf_cert_der);
        }
    }
    false
}
