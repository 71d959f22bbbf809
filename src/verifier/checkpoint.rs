use base64::prelude::*;

use crate::crypto::hash::{constant_time_eq, sha256};
use crate::crypto::merkle::verify_inclusion_proof;
use crate::crypto::signature::PublicKey;
use crate::error::InclusionProofError;
use crate::types::{InclusionProof, TransparencyLogInstance};

/// A parsed "signed note" checkpoint, the format transparency logs use to
/// publish a tree head: a short text body (origin, size, root hash) plus one
/// or more `— <identity> <base64>` signature lines, separated from the body
/// by a single blank line.
struct Checkpoint {
    /// The header text exactly as it appeared, including its trailing
    /// newline — this is what the signatures are computed over.
    signed_text: String,
    tree_size: u64,
    root_hash: Vec<u8>,
    signatures: Vec<CheckpointSignature>,
}

struct CheckpointSignature {
    identity: String,
    key_hint: [u8; 4],
    signature: Vec<u8>,
}

const SIGNATURE_LINE_PREFIX: char = '\u{2014}'; // em dash, per the signed-note format

fn parse_checkpoint(envelope: &str) -> Result<Checkpoint, InclusionProofError> {
    let (header, sig_block) = envelope
        .split_once("\n\n")
        .ok_or_else(|| InclusionProofError::MalformedCheckpoint("missing blank line separator".into()))?;

    let mut lines = header.lines();
    let _origin = lines
        .next()
        .ok_or_else(|| InclusionProofError::MalformedCheckpoint("missing origin line".into()))?;
    let tree_size: u64 = lines
        .next()
        .ok_or_else(|| InclusionProofError::MalformedCheckpoint("missing size line".into()))?
        .parse()
        .map_err(|_| InclusionProofError::MalformedCheckpoint("size line is not an integer".into()))?;
    let root_hash_line = lines
        .next()
        .ok_or_else(|| InclusionProofError::MalformedCheckpoint("missing root hash line".into()))?;
    let root_hash = BASE64_STANDARD
        .decode(root_hash_line)
        .map_err(|e| InclusionProofError::MalformedCheckpoint(format!("root hash: {e}")))?;

    let mut signatures = Vec::new();
    for line in sig_block.lines() {
        if line.is_empty() {
            continue;
        }
        let mut chars = line.chars();
        if chars.next() != Some(SIGNATURE_LINE_PREFIX) {
            return Err(InclusionProofError::MalformedCheckpoint(
                "signature line missing em-dash prefix".into(),
            ));
        }
        let rest = chars.as_str().trim_start();
        let (identity, b64) = rest
            .split_once(' ')
            .ok_or_else(|| InclusionProofError::MalformedCheckpoint("signature line missing base64".into()))?;
        let blob = BASE64_STANDARD
            .decode(b64.trim())
            .map_err(|e| InclusionProofError::MalformedCheckpoint(format!("signature base64: {e}")))?;
        if blob.len() < 5 {
            return Err(InclusionProofError::MalformedCheckpoint(
                "signature blob shorter than key hint".into(),
            ));
        }
        let mut key_hint = [0u8; 4];
        key_hint.copy_from_slice(&blob[..4]);
        signatures.push(CheckpointSignature {
            identity: identity.to_string(),
            key_hint,
            signature: blob[4..].to_vec(),
        });
    }

    if signatures.is_empty() {
        return Err(InclusionProofError::MalformedCheckpoint(
            "no signature lines present".into(),
        ));
    }

    // Header text includes the trailing newline that separates it from the
    // blank line; `split_once` consumed exactly that boundary.
    let signed_text = format!("{header}\n");

    Ok(Checkpoint {
        signed_text,
        tree_size,
        root_hash,
        signatures,
    })
}

/// Verifies a bundle's Merkle inclusion proof end to end: the checkpoint
/// envelope is a validly signed note from a log we trust, its root hash
/// matches the proof's own `root_hash` field, and folding the proof's
/// hashes up from the leaf actually reaches that root.
pub fn verify_inclusion_proof_and_checkpoint(
    proof: &InclusionProof,
    leaf_hash: [u8; 32],
    tlogs: &[TransparencyLogInstance],
) -> Result<(), InclusionProofError> {
    let log_index: u64 = proof
        .log_index
        .parse()
        .map_err(|_| InclusionProofError::MalformedCheckpoint("logIndex is not an integer".into()))?;
    let tree_size: u64 = proof
        .tree_size
        .parse()
        .map_err(|_| InclusionProofError::MalformedCheckpoint("treeSize is not an integer".into()))?;
    let root_hash = BASE64_STANDARD
        .decode(&proof.root_hash)
        .map_err(|e| InclusionProofError::MalformedCheckpoint(e.to_string()))?;
    let proof_hashes: Vec<Vec<u8>> = proof
        .hashes
        .iter()
        .map(|h| BASE64_STANDARD.decode(h))
        .collect::<Result<_, _>>()
        .map_err(|e| InclusionProofError::MalformedCheckpoint(e.to_string()))?;

    verify_inclusion_proof(&leaf_hash, log_index, tree_size, &proof_hashes, &root_hash)?;

    let checkpoint = parse_checkpoint(&proof.checkpoint.envelope)?;

    if checkpoint.tree_size != tree_size || !constant_time_eq(&checkpoint.root_hash, &root_hash) {
        return Err(InclusionProofError::CheckpointRootMismatch);
    }

    let verified = checkpoint.signatures.iter().any(|sig| {
        tlogs.iter().any(|tlog| {
            let Some(key_der_b64) = &tlog.public_key.raw_bytes else {
                return false;
            };
            let Ok(key_der) = BASE64_STANDARD.decode(key_der_b64) else {
                return false;
            };
            let hint = sha256(&key_der);
            if hint[..4] != sig.key_hint {
                return false;
            }
            let Ok(public_key) = PublicKey::from_public_key_der(&key_der) else {
                return false;
            };
            public_key.verify(checkpoint.signed_text.as_bytes(), &sig.signature).is_ok()
        })
    });

    if verified {
        Ok(())
    } else {
        Err(InclusionProofError::NoMatchingSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_envelope_without_blank_line_separator() {
        let envelope = "origin\n1\nAAAA\n— id AAAA";
        let err = parse_checkpoint(envelope).unwrap_err();
        assert!(matches!(err, InclusionProofError::MalformedCheckpoint(_)));
    }

    #[test]
    fn rejects_signature_line_missing_em_dash() {
        let envelope = "origin\n1\nAAAA\n\nid AAAA\n";
        let err = parse_checkpoint(envelope).unwrap_err();
        assert!(matches!(err, InclusionProofError::MalformedCheckpoint(_)));
    }

    #[test]
    fn parses_well_formed_checkpoint_header() {
        let envelope = "rekor.example - 123\n7\nAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=\n\n\u{2014} rekor.example AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=\n";
        let checkpoint = parse_checkpoint(envelope).unwrap();
        assert_eq!(checkpoint.tree_size, 7);
        assert_eq!(checkpoint.signatures.len(), 1);
        assert_eq!(checkpoint.signatures[0].identity, "rekor.example");
    }
}
