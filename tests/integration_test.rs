use sigstore_bundle_verifier::{parse_bundle_from_str, Verifier, VerifierConfig};

fn bundle_json(media_type: &str, key_material: &str, content: &str, tlog_entries: &str) -> String {
    format!(
        r#"{{
            "mediaType": "{media_type}",
            "verificationMaterial": {{
                {key_material},
                "tlogEntries": {tlog_entries}
            }},
            {content}
        }}"#
    )
}

const MESSAGE_SIGNATURE: &str =
    r#""messageSignature": {"messageDigest": {"algorithm": "SHA2_256", "digest": "AAAA"}, "signature": "AAAA"}"#;

fn single_cert(tag: u8) -> String {
    use base64::prelude::*;
    let mut bytes = vec![0x30, 0x82, 0x01, 0x00];
    bytes.extend(std::iter::repeat(tag).take(200));
    format!(r#""certificate": {{"rawBytes": "{}"}}"#, BASE64_STANDARD.encode(bytes))
}

#[test]
fn parses_every_supported_bundle_version() {
    for media_type in [
        "application/vnd.dev.sigstore.bundle+json;version=0.1",
        "application/vnd.dev.sigstore.bundle.v0.2+json",
        "application/vnd.dev.sigstore.bundle.v0.3+json",
    ] {
        let json = bundle_json(media_type, &single_cert(1), MESSAGE_SIGNATURE, "[]");
        parse_bundle_from_str(&json).unwrap_or_else(|e| panic!("{media_type} should parse: {e}"));
    }
}

#[test]
fn rejects_bundle_carrying_both_content_variants() {
    let json = bundle_json(
        "application/vnd.dev.sigstore.bundle.v0.3+json",
        &single_cert(1),
        r#""messageSignature": {"messageDigest": {"algorithm": "SHA2_256", "digest": "AAAA"}, "signature": "AAAA"},
           "dsseEnvelope": {"payload": "AAAA", "payloadType": "application/vnd.in-toto+json", "signatures": []}"#,
        "[]",
    );
    assert!(parse_bundle_from_str(&json).is_err());
}

#[test]
fn rejects_bundle_carrying_no_content_variant() {
    let json = format!(
        r#"{{
            "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
            "verificationMaterial": {{ {key_material}, "tlogEntries": [] }}
        }}"#,
        key_material = single_cert(1),
    );
    assert!(parse_bundle_from_str(&json).is_err());
}

#[test]
fn from_jsonl_rejects_empty_trust_material() {
    assert!(Verifier::from_jsonl("").is_err());
    assert!(Verifier::from_jsonl("not json at all").is_err());
}

#[test]
fn verify_fails_without_a_trusted_certificate_authority() {
    let verifier = Verifier::new(vec![]);
    let json = bundle_json(
        "application/vnd.dev.sigstore.bundle.v0.3+json",
        &single_cert(1),
        MESSAGE_SIGNATURE,
        "[]",
    );
    let bundle = parse_bundle_from_str(&json).unwrap();
    let err = verifier
        .verify(&bundle, None, &VerifierConfig::default())
        .unwrap_err();
    // Key material is resolved before any trust material is consulted, so a
    // bundle carrying an unparseable leaf certificate fails on that parse,
    // independent of what (if anything) the verifier trusts.
    assert!(matches!(err, sigstore_bundle_verifier::VerificationError::Certificate(_)));
}

#[test]
fn verify_rejects_public_key_material_regardless_of_trust_material() {
    let trusted_root = r#"{
        "mediaType": "application/vnd.dev.sigstore.trustedroot.v1+json",
        "certificateAuthorities": []
    }"#;
    let verifier = Verifier::from_jsonl(trusted_root).unwrap();

    let json = r#"{
        "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
        "verificationMaterial": { "publicKey": { "hint": "deadbeef" }, "tlogEntries": [] },
        "messageSignature": { "messageDigest": { "algorithm": "SHA2_256", "digest": "AAAA" }, "signature": "AAAA" }
    }"#;
    let bundle = parse_bundle_from_str(json).unwrap();

    let err = verifier
        .verify(&bundle, None, &VerifierConfig::default())
        .unwrap_err();
    assert!(matches!(err, sigstore_bundle_verifier::VerificationError::PublicKey(_)));
}

#[test]
fn verify_accepts_x509_certificate_chain_key_material_shape() {
    // Exercises the multi-certificate key material variant through parsing;
    // the leaf bytes here are not a real certificate, so verification fails
    // at the leaf-parsing step before any trust decision is made.
    use base64::prelude::*;
    let mut leaf = vec![0x30, 0x82, 0x01, 0x00];
    leaf.extend(std::iter::repeat(7u8).take(200));
    let key_material = format!(
        r#""x509CertificateChain": {{"certificates": [{{"rawBytes": "{}"}}]}}"#,
        BASE64_STANDARD.encode(leaf)
    );
    let json = bundle_json(
        "application/vnd.dev.sigstore.bundle.v0.3+json",
        &key_material,
        MESSAGE_SIGNATURE,
        "[]",
    );
    let bundle = parse_bundle_from_str(&json).unwrap();

    let verifier = Verifier::new(vec![]);
    let err = verifier
        .verify(&bundle, None, &VerifierConfig::default())
        .unwrap_err();
    assert!(matches!(err, sigstore_bundle_verifier::VerificationError::Certificate(_)));
}
