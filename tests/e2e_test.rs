//! End-to-end scenarios built from real in-memory keypairs: no X.509 is
//! involved, since the public-key-hint key material variant lets a
//! transparency log entry, a signed entry timestamp, and a message signature
//! all be exercised against keys generated on the spot.

use base64::prelude::*;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use sigstore_bundle_verifier::{parse_bundle_from_str, Verifier, VerifierConfig};

const ARTIFACT: &[u8] = b"this is the artifact content being signed";
const INTEGRATED_TIME: i64 = 1_700_000_000;

/// RFC 8410's fixed template for an Ed25519 SubjectPublicKeyInfo: a 12-byte
/// header (outer SEQUENCE, AlgorithmIdentifier SEQUENCE carrying OID
/// 1.3.101.112, BIT STRING tag) followed by the 32 raw public key bytes.
fn ed25519_spki_der(pubkey: &[u8; 32]) -> Vec<u8> {
    let mut der = vec![0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00];
    der.extend_from_slice(pubkey);
    der
}

fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

struct Fixture {
    signer_key: SigningKey,
    log_key: SigningKey,
    canonicalized_body_b64: String,
    trusted_root_line: String,
}

fn build_fixture() -> Fixture {
    let signer_key = SigningKey::generate(&mut OsRng);
    let log_key = SigningKey::generate(&mut OsRng);

    let signer_spki = ed25519_spki_der(&signer_key.verifying_key().to_bytes());
    let log_spki = ed25519_spki_der(&log_key.verifying_key().to_bytes());
    let log_id_bytes = sha256(&log_spki);

    let signature = signer_key.sign(ARTIFACT);
    let digest = sha256(ARTIFACT);

    let body = format!(
        r#"{{"apiVersion":"0.0.1","kind":"hashedrekord","spec":{{"signature":{{"content":"{sig}","publicKey":{{"content":"{key}"}}}},"data":{{"hash":{{"algorithm":"sha256","value":"{hash}"}}}}}}}}"#,
        sig = BASE64_STANDARD.encode(signature.to_bytes()),
        key = BASE64_STANDARD.encode(&signer_spki),
        hash = hex::encode(&digest),
    );
    let canonicalized_body_b64 = BASE64_STANDARD.encode(body.as_bytes());

    let trusted_root = serde_json::json!({
        "mediaType": "application/vnd.dev.sigstore.trustedroot.v1+json",
        "tlogs": [{
            "baseUrl": "https://example.test/log",
            "hashAlgorithm": "SHA2_256",
            "publicKey": { "rawBytes": BASE64_STANDARD.encode(&log_spki) },
            "logId": { "keyId": BASE64_STANDARD.encode(&log_id_bytes) },
        }],
        "certificateAuthorities": [],
        "ctlogs": [],
        "timestampAuthorities": [],
        "publicKeys": [{
            "hint": "test-signer",
            "rawBytes": BASE64_STANDARD.encode(&signer_spki),
        }],
    })
    .to_string();

    Fixture {
        signer_key,
        log_key,
        canonicalized_body_b64,
        trusted_root_line: trusted_root,
    }
}

fn sign_set(fixture: &Fixture, log_index: i64) -> String {
    let log_spki = ed25519_spki_der(&fixture.log_key.verifying_key().to_bytes());
    let log_id_hex = hex::encode(sha256(&log_spki));
    // Field order matches serde_json_canonicalizer's RFC 8785 output: keys
    // sorted lexicographically (body, integratedTime, logID, logIndex).
    let canonical = format!(
        r#"{{"body":"{body}","integratedTime":{it},"logID":"{logid}","logIndex":{li}}}"#,
        body = fixture.canonicalized_body_b64,
        it = INTEGRATED_TIME,
        logid = log_id_hex,
        li = log_index,
    );
    let sig = fixture.log_key.sign(canonical.as_bytes());
    BASE64_STANDARD.encode(sig.to_bytes())
}

fn bundle_json(fixture: &Fixture, set_b64: &str, log_index: i64) -> String {
    let signature = fixture.signer_key.sign(ARTIFACT);
    let digest = sha256(ARTIFACT);

    format!(
        r#"{{
            "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
            "verificationMaterial": {{
                "publicKey": {{ "hint": "test-signer" }},
                "tlogEntries": [{{
                    "logIndex": "{log_index}",
                    "logId": {{ "keyId": "{log_id}" }},
                    "kindVersion": {{ "kind": "hashedrekord", "version": "0.0.1" }},
                    "integratedTime": "{integrated_time}",
                    "inclusionPromise": {{ "signedEntryTimestamp": "{set}" }},
                    "canonicalizedBody": "{body}"
                }}]
            }},
            "messageSignature": {{
                "messageDigest": {{ "algorithm": "SHA2_256", "digest": "{digest}" }},
                "signature": "{sig}"
            }}
        }}"#,
        log_index = log_index,
        log_id = BASE64_STANDARD.encode(sha256(&ed25519_spki_der(&fixture.log_key.verifying_key().to_bytes()))),
        integrated_time = INTEGRATED_TIME,
        set = set_b64,
        body = fixture.canonicalized_body_b64,
        digest = BASE64_STANDARD.encode(&digest),
        sig = BASE64_STANDARD.encode(signature.to_bytes()),
    )
}

#[test]
fn happy_path_public_key_signed_message_with_transparency_log_verifies() {
    let fixture = build_fixture();
    let set_b64 = sign_set(&fixture, 10);
    let bundle_json = bundle_json(&fixture, &set_b64, 10);

    let verifier = Verifier::from_jsonl(&fixture.trusted_root_line).unwrap();
    let bundle = parse_bundle_from_str(&bundle_json).unwrap();

    let result = verifier
        .verify(&bundle, Some(ARTIFACT), &VerifierConfig::default())
        .expect("well-formed bundle with valid evidence should verify");

    assert_eq!(result.check_time.timestamp(), INTEGRATED_TIME);
    assert_eq!(result.verified_timestamps.len(), 1);
    assert!(result.certificate_hashes.is_none());
    assert!(result.signer_identity.is_none());
}

#[test]
fn tampered_signed_entry_timestamp_is_rejected() {
    let fixture = build_fixture();
    let mut set_bytes = BASE64_STANDARD.decode(sign_set(&fixture, 11)).unwrap();
    *set_bytes.last_mut().unwrap() ^= 0xFF;
    let tampered_set = BASE64_STANDARD.encode(&set_bytes);

    let bundle_json = bundle_json(&fixture, &tampered_set, 11);
    let verifier = Verifier::from_jsonl(&fixture.trusted_root_line).unwrap();
    let bundle = parse_bundle_from_str(&bundle_json).unwrap();

    let err = verifier
        .verify(&bundle, Some(ARTIFACT), &VerifierConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        sigstore_bundle_verifier::VerificationError::InclusionPromise(_)
    ));
}

#[test]
fn tampered_artifact_fails_signature_verification() {
    let fixture = build_fixture();
    let set_b64 = sign_set(&fixture, 12);
    let bundle_json = bundle_json(&fixture, &set_b64, 12);

    let verifier = Verifier::from_jsonl(&fixture.trusted_root_line).unwrap();
    let bundle = parse_bundle_from_str(&bundle_json).unwrap();

    let err = verifier
        .verify(&bundle, Some(b"a different artifact entirely"), &VerifierConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        sigstore_bundle_verifier::VerificationError::Signature(_)
    ));
}

#[test]
fn public_key_not_valid_at_check_time_is_rejected() {
    let fixture = build_fixture();
    let set_b64 = sign_set(&fixture, 13);
    let bundle_json = bundle_json(&fixture, &set_b64, 13);

    let signer_spki = ed25519_spki_der(&fixture.signer_key.verifying_key().to_bytes());
    let log_spki = ed25519_spki_der(&fixture.log_key.verifying_key().to_bytes());
    let log_id_bytes = sha256(&log_spki);

    // Same trust material, except the signer's key claims to only be valid
    // starting well after the transparency log's integrated time.
    let trusted_root = serde_json::json!({
        "mediaType": "application/vnd.dev.sigstore.trustedroot.v1+json",
        "tlogs": [{
            "baseUrl": "https://example.test/log",
            "hashAlgorithm": "SHA2_256",
            "publicKey": { "rawBytes": BASE64_STANDARD.encode(&log_spki) },
            "logId": { "keyId": BASE64_STANDARD.encode(&log_id_bytes) },
        }],
        "certificateAuthorities": [],
        "ctlogs": [],
        "timestampAuthorities": [],
        "publicKeys": [{
            "hint": "test-signer",
            "rawBytes": BASE64_STANDARD.encode(&signer_spki),
            "validFor": { "start": "2099-01-01T00:00:00Z" },
        }],
    })
    .to_string();

    let verifier = Verifier::from_jsonl(&trusted_root).unwrap();
    let bundle = parse_bundle_from_str(&bundle_json).unwrap();

    let err = verifier
        .verify(&bundle, Some(ARTIFACT), &VerifierConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        sigstore_bundle_verifier::VerificationError::PublicKey(_)
    ));
}

#[test]
fn duplicate_transparency_log_entries_are_rejected() {
    let fixture = build_fixture();
    let set_b64 = sign_set(&fixture, 14);

    let single = bundle_json(&fixture, &set_b64, 14);
    // Duplicate the one tlogEntries element by splicing the bundle JSON.
    let doubled = single.replacen(
        r#""tlogEntries": ["#,
        &format!("\"tlogEntries\": [{}, ", extract_entry(&single)),
        1,
    );

    let verifier = Verifier::from_jsonl(&fixture.trusted_root_line).unwrap();
    let bundle = parse_bundle_from_str(&doubled).unwrap();

    let err = verifier
        .verify(&bundle, Some(ARTIFACT), &VerifierConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        sigstore_bundle_verifier::VerificationError::Timestamp(_)
    ));
}

/// Pulls the single `tlogEntries` element back out of a bundle JSON string
/// built by `bundle_json`, so it can be spliced in a second time.
fn extract_entry(bundle_json: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(bundle_json).unwrap();
    let entry = &value["verificationMaterial"]["tlogEntries"][0];
    entry.to_string()
}
