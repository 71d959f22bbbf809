use crate::crypto::hash::sha256;
use crate::error::InclusionProofError;

/// Hard cap on the number of hashes accepted in a single inclusion proof.
///
/// Rekor trees are expected to stay well under a billion entries for the
/// foreseeable future; `log2(2^40)` leaves more than enough headroom while
/// still bounding the work a malicious bundle can make us do.
pub const MAX_INCLUSION_PROOF_HASHES: usize = 40;

pub fn verify_inclusion_proof(
    leaf_hash: &[u8],
    log_index: u64,
    tree_size: u64,
    proof_hashes: &[Vec<u8>],
    root_hash: &[u8],
) -> Result<(), InclusionProofError> {
    if proof_hashes.len() > MAX_INCLUSION_PROOF_HASHES {
        return Err(InclusionProofError::TooManyHashes {
            count: proof_hashes.len(),
            max: MAX_INCLUSION_PROOF_HASHES,
        });
    }

    if log_index >= tree_size {
        return Err(InclusionProofError::IndexOutOfBounds {
            log_index,
            tree_size,
        });
    }

    let mut computed_hash = leaf_hash.to_vec();
    let mut index = log_index;
    let mut size = tree_size;

    for proof_hash in proof_hashes {
        if size <= 1 {
            return Err(InclusionProofError::RootMismatch);
        }

        let (left, right) = if index % 2 == 0 && index + 1 < size {
            (&computed_hash[..], &proof_hash[..])
        } else {
            (&proof_hash[..], &computed_hash[..])
        };

        // Parent hash per RFC 6962 section 2.1: SHA256(0x01 || left || right)
        let mut parent_data = Vec::with_capacity(1 + left.len() + right.len());
        parent_data.push(0x01);
        parent_data.extend_from_slice(left);
        parent_data.extend_from_slice(right);
        computed_hash = sha256(&parent_data).to_vec();

        index /= 2;
        size = (size + 1) / 2;
    }

    if computed_hash == root_hash {
        Ok(())
    } else {
        Err(InclusionProofError::RootMismatch)
    }
}

pub fn compute_leaf_hash(data: &[u8]) -> [u8; 32] {
    let mut leaf_data = Vec::with_capacity(1 + data.len());
    leaf_data.push(0x00);
    leaf_data.extend_from_slice(data);
    sha256(&leaf_data)
}
