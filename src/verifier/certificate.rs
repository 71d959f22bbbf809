use chrono::{DateTime, Utc};
use tracing::debug;
use x509_parser::certificate::X509Certificate;
use x509_parser::time::ASN1Time;

use crate::crypto::hash::sha256;
use crate::crypto::signature::PublicKey;
use crate::error::CertificateError;
use crate::parser::certificate::{
    has_code_signing_eku, has_exclusive_critical_time_stamping_eku, is_ca_with_key_cert_sign, is_not_a_ca,
    parse_der_certificate,
};
use crate::types::{CertificateChain, CertificateChainHashes};

const MAX_CHAIN_LENGTH: usize = 10;

/// What the leaf at the end of a chain is being trusted to do, since the
/// structural constraints differ: a code-signing leaf must be non-CA and
/// carry `codeSigning`, while a TSA leaf must carry the exclusive
/// `timeStamping` EKU RFC 3161 requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafRole {
    CodeSigning,
    TimeStamping,
}

/// Builds and verifies a full certificate chain from a bundle's leaf
/// certificate against one of several candidate trust chains, trying each
/// candidate (newest-validity-window first) until one verifies. This is
/// what lets a verifier hold several root generations at once without the
/// caller having to guess which one issued a given leaf.
pub fn verify_certificate_chain(
    leaf_der: &[u8],
    candidates: &[CertificateChain],
    check_time: DateTime<Utc>,
    role: LeafRole,
) -> Result<(CertificateChain, CertificateChainHashes), CertificateError> {
    let mut last_err = None;
    for candidate in candidates {
        let chain = CertificateChain {
            leaf: leaf_der.to_vec(),
            intermediates: candidate.intermediates.clone(),
            root: candidate.root.clone(),
        };
        match verify_chain_once(&chain, check_time, role) {
            Ok(hashes) => {
                debug!(role = ?role, candidates = candidates.len(), "certificate chain verified");
                return Ok((chain, hashes));
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or(CertificateError::NoValidAuthority))
}

fn verify_chain_once(
    chain: &CertificateChain,
    check_time: DateTime<Utc>,
    role: LeafRole,
) -> Result<CertificateChainHashes, CertificateError> {
    let total_certs = 1 + chain.intermediates.len() + 1;
    if total_certs > MAX_CHAIN_LENGTH {
        return Err(CertificateError::ChainTooLong { max: MAX_CHAIN_LENGTH });
    }

    let leaf = parse_der_certificate(&chain.leaf)?;
    let intermediates: Vec<X509Certificate> = chain
        .intermediates
        .iter()
        .map(|der| parse_der_certificate(der))
        .collect::<Result<_, _>>()?;
    let root = parse_der_certificate(&chain.root)?;

    check_validity(&leaf, check_time)?;
    for cert in intermediates.iter().chain(std::iter::once(&root)) {
        check_validity(cert, check_time)?;
    }

    let issuer_chain: Vec<&X509Certificate> = intermediates.iter().chain(std::iter::once(&root)).collect();

    let mut signer = leaf.clone();
    for issuer in issuer_chain.iter() {
        if !is_ca_with_key_cert_sign(issuer) {
            return Err(CertificateError::InvalidIntermediateConstraints);
        }
        verify_cert_signature(&signer, issuer)?;
        signer = (*issuer).clone();
    }
    verify_cert_signature(&root, &root)?;

    match role {
        LeafRole::CodeSigning => {
            if !is_not_a_ca(&leaf) {
                return Err(CertificateError::InvalidIntermediateConstraints);
            }
            if !has_code_signing_eku(&leaf) {
                return Err(CertificateError::MissingExtendedKeyUsage("codeSigning"));
            }
        }
        LeafRole::TimeStamping => {
            if !has_exclusive_critical_time_stamping_eku(&leaf) {
                return Err(CertificateError::MissingExtendedKeyUsage(
                    "critical, exclusive id-kp-timeStamping",
                ));
            }
        }
    }

    Ok(CertificateChainHashes {
        leaf: sha256(&chain.leaf),
        intermediates: chain.intermediates.iter().map(|der| sha256(der)).collect(),
        root: sha256(&chain.root),
    })
}

fn check_validity(cert: &X509Certificate, check_time: DateTime<Utc>) -> Result<(), CertificateError> {
    let at = ASN1Time::from_timestamp(check_time.timestamp())
        .map_err(|e| CertificateError::ParseError(e.to_string()))?;
    if !cert.validity().is_valid_at(at) {
        return Err(CertificateError::SigningTimeOutsideValidity {
            check_time: check_time.to_rfc3339(),
            not_before: format!("{}", cert.validity().not_before),
            not_after: format!("{}", cert.validity().not_after),
        });
    }
    Ok(())
}

fn verify_cert_signature(cert: &X509Certificate, issuer: &X509Certificate) -> Result<(), CertificateError> {
    let public_key = PublicKey::from_certificate(issuer)
        .map_err(|e| CertificateError::ChainVerificationFailed(e.to_string()))?;

    public_key
        .verify(cert.tbs_certificate.as_ref(), &cert.signature_value.data)
        .map_err(|e| CertificateError::ChainVerificationFailed(e.to_string()))
}

/// Verifies the RFC3161 TSA chain carries a leaf whose EKU is exclusively
/// `id-kp-timeStamping`, per RFC 3161 section 2.3. This is a structural
/// check layered on top of [`verify_certificate_chain`].
pub fn verify_tsa_leaf_eku(leaf_der: &[u8]) -> Result<(), CertificateError> {
    let leaf = parse_der_certificate(leaf_der)?;
    if has_exclusive_critical_time_stamping_eku(&leaf) {
        Ok(())
    } else {
        Err(CertificateError::MissingExtendedKeyUsage(
            "critical, exclusive id-kp-timeStamping",
        ))
    }
}
