use crate::error::CertificateError;
use crate::fetcher::jsonl::load_trusted_root_from_jsonl;
use crate::types::TrustedRoot;

/// Fetches a `trusted_root.jsonl`-shaped document from an arbitrary URL,
/// such as a TUF target mirror. Convenience only: verification itself never
/// calls this, trust material must be supplied by the caller.
pub fn fetch_trusted_root_from_url(url: &str) -> Result<Vec<TrustedRoot>, CertificateError> {
    let response =
        reqwest::blocking::get(url).map_err(|e| CertificateError::ChainVerificationFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(CertificateError::ChainVerificationFailed(format!(
            "HTTP error fetching trust root: {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .map_err(|e| CertificateError::ChainVerificationFailed(e.to_string()))?;

    load_trusted_root_from_jsonl(&body).map_err(|e| CertificateError::ChainVerificationFailed(e.to_string()))
}
