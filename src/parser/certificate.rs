use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::*;

use crate::error::CertificateError;
use crate::types::SubjectAltName;

/// OID for the X.509v3 Certificate Transparency "Signed Certificate
/// Timestamp List" extension (RFC 6962 section 3.3).
pub const OID_SCT_LIST: &str = "1.3.6.1.4.1.11129.2.4.2";

/// OID for id-kp-timeStamping, the only extended key usage an RFC3161 TSA
/// signing certificate is permitted to carry.
pub const OID_EKU_TIME_STAMPING: &str = "1.3.6.1.5.5.7.3.8";

pub fn parse_der_certificate(der: &[u8]) -> Result<X509Certificate, CertificateError> {
    let (_, cert) =
        X509Certificate::from_der(der).map_err(|e| CertificateError::ParseError(e.to_string()))?;
    Ok(cert)
}

pub fn parse_pem_certificate(pem_str: &str) -> Result<Vec<u8>, CertificateError> {
    let parsed =
        ::pem::parse(pem_str.as_bytes()).map_err(|e| CertificateError::ParseError(e.to_string()))?;

    if parsed.tag() != "CERTIFICATE" {
        return Err(CertificateError::ParseError(format!(
            "expected CERTIFICATE tag, got {}",
            parsed.tag()
        )));
    }

    Ok(parsed.into_contents())
}

pub fn extract_issuer_cn(cert: &X509Certificate) -> Option<String> {
    cert.issuer()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_string())
}

pub fn extract_subject_alt_names(cert: &X509Certificate) -> Result<Vec<SubjectAltName>, CertificateError> {
    let Some(san_ext) = cert
        .subject_alternative_name()
        .map_err(|e| CertificateError::ParseError(e.to_string()))?
    else {
        return Ok(Vec::new());
    };

    let mut names = Vec::new();
    for name in &san_ext.value.general_names {
        match name {
            GeneralName::RFC822Name(email) => names.push(SubjectAltName::Email(email.to_string())),
            GeneralName::URI(uri) => names.push(SubjectAltName::Uri(uri.to_string())),
            GeneralName::DNSName(dns) => names.push(SubjectAltName::Dns(dns.to_string())),
            _ => {}
        }
    }
    Ok(names)
}

/// `true` if the certificate is marked as a CA with `keyCertSign` usage,
/// i.e. is fit to sign other certificates in a chain.
pub fn is_ca_with_key_cert_sign(cert: &X509Certificate) -> bool {
    let mut is_ca = false;
    let mut can_sign_certs = false;

    for ext in cert.extensions() {
        match ext.parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => is_ca = bc.ca,
            ParsedExtension::KeyUsage(ku) => can_sign_certs = ku.key_cert_sign(),
            _ => {}
        }
    }

    is_ca && can_sign_certs
}

/// `true` if the EKU extension is present, marked critical, and contains
/// exactly `id-kp-timeStamping` and nothing else — the constraint RFC 3161
/// section 2.3 places on TSA signing certificates.
pub fn has_exclusive_critical_time_stamping_eku(cert: &X509Certificate) -> bool {
    for ext in cert.extensions() {
        if let ParsedExtension::ExtendedKeyUsage(eku) = ext.parsed_extension() {
            return ext.critical && eku.time_stamping && !eku.code_signing && eku.other.is_empty();
        }
    }
    false
}

/// `true` if the certificate's basic constraints are absent or explicitly
/// mark it as not a CA — what a code-signing leaf is required to be.
pub fn is_not_a_ca(cert: &X509Certificate) -> bool {
    for ext in cert.extensions() {
        if let ParsedExtension::BasicConstraints(bc) = ext.parsed_extension() {
            return !bc.ca;
        }
    }
    true
}

/// `true` if the EKU extension is present and its purposes include
/// `id-kp-codeSigning` (not necessarily exclusively — a leaf may legitimately
/// carry other EKUs alongside it).
pub fn has_code_signing_eku(cert: &X509Certificate) -> bool {
    for ext in cert.extensions() {
        if let ParsedExtension::ExtendedKeyUsage(eku) = ext.parsed_extension() {
            return eku.code_signing;
        }
    }
    false
}

/// Raw contents of the Signed Certificate Timestamp List extension
/// (a `TransparencyInformationSyntax` TLS structure per RFC 6962 section
/// 3.3), if present.
pub fn extract_sct_list<'a>(cert: &'a X509Certificate) -> Option<&'a [u8]> {
    cert.extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == OID_SCT_LIST)
        .map(|ext| ext.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIBkTCCATigAwIBAgIJAKHHCgVZU6luMAoGCCqGSM49BAMCMA0xCzAJBgNVBAMM\nAkNBMB4XDTI0MDEwMTAwMDAwMFoXDTI1MDEwMTAwMDAwMFowDTELMAkGA1UEAwwC\nQ0EwWTATBgcqhkjOPQIBBggqhkjOPQMBBwNCAATMOCJCdPYpnFCL1qDYnXpnTwxk\nplBFjZmluX8Q2Jz1KqTJqYbPJPHCNmIVnGGpEUxZ0AY5V0VpfHQ4OvZs0gKEo1Mw\nUTAdBgNVHQ4EFgQUl9BhUDLVP7qCJLWqKJWGHQqQVJ4wHwYDVR0jBBgwFoAUl9Bh\nUDLVP7qCJLWqKJWGHQqQVJ4wDwYDVR0TAQH/BAUwAwEB/zAKBggqhkjOPQQDAgNH\nADBEAiBS2gL+3hKqFJKAJRJH9V+CfKPCqB7C5sBXGBqKQDVLUAIgH9xm+MZMoAYl\n3SQJqPHK0yLCt0mXVKCWH3ypVxD7QQE=\n-----END CERTIFICATE-----";

    #[test]
    fn parses_pem_certificate() {
        assert!(parse_pem_certificate(SAMPLE_PEM).is_ok());
    }

    #[test]
    fn rejects_non_certificate_pem_tag() {
        let key_pem = SAMPLE_PEM.replace("CERTIFICATE", "PRIVATE KEY");
        assert!(parse_pem_certificate(&key_pem).is_err());
    }

    #[test]
    fn sample_cert_has_no_sct_extension() {
        let der = parse_pem_certificate(SAMPLE_PEM).unwrap();
        let cert = parse_der_certificate(&der).unwrap();
        assert!(extract_sct_list(&cert).is_none());
    }

    #[test]
    fn sample_cert_is_ca_with_key_cert_sign() {
        let der = parse_pem_certificate(SAMPLE_PEM).unwrap();
        let cert = parse_der_certificate(&der).unwrap();
        assert!(is_ca_with_key_cert_sign(&cert));
    }
}
