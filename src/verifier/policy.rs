use crate::error::PolicyError;
use crate::types::{IdentityPolicy, SignerIdentity};

/// Checks a certificate-derived [`SignerIdentity`] against the caller's
/// expectations. Absence of a policy means "accept any identity" — the
/// orchestrator still always extracts and returns the identity so the
/// caller can inspect it, whether or not a policy was enforced.
pub fn enforce_identity_policy(
    identity: &SignerIdentity,
    policy: &IdentityPolicy,
) -> Result<(), PolicyError> {
    if let Some(expected_san) = &policy.expected_san {
        let matches = identity.san.iter().any(|san| san.as_str() == expected_san);
        if !matches {
            return Err(PolicyError::SubjectAlternativeNameMismatch {
                expected: expected_san.clone(),
            });
        }
    }

    for (oid, expected_value) in &policy.required_extensions {
        match identity.extension(oid) {
            Some(actual) if actual == expected_value => {}
            Some(actual) => {
                return Err(PolicyError::ExtensionValueMismatch {
                    oid: oid.clone(),
                    expected: expected_value.clone(),
                    actual: actual.to_string(),
                })
            }
            None => return Err(PolicyError::MissingExtension { oid: oid.clone() }),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::certificate::SubjectAltName;

    fn identity_with(san: Vec<SubjectAltName>, issuer: Option<&str>) -> SignerIdentity {
        SignerIdentity {
            san,
            oidc_issuer: issuer.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_policy_accepts_any_identity() {
        let identity = identity_with(vec![], None);
        let policy = IdentityPolicy::default();
        assert!(enforce_identity_policy(&identity, &policy).is_ok());
    }

    #[test]
    fn san_mismatch_is_rejected() {
        let identity = identity_with(vec![SubjectAltName::Email("a@example.com".into())], None);
        let policy = IdentityPolicy {
            expected_san: Some("b@example.com".into()),
            required_extensions: vec![],
        };
        let err = enforce_identity_policy(&identity, &policy).unwrap_err();
        assert!(matches!(err, PolicyError::SubjectAlternativeNameMismatch { .. }));
    }

    #[test]
    fn san_match_is_accepted() {
        let identity = identity_with(vec![SubjectAltName::Email("a@example.com".into())], None);
        let policy = IdentityPolicy {
            expected_san: Some("a@example.com".into()),
            required_extensions: vec![],
        };
        assert!(enforce_identity_policy(&identity, &policy).is_ok());
    }

    #[test]
    fn missing_required_extension_is_rejected() {
        let identity = identity_with(vec![], None);
        let policy = IdentityPolicy {
            expected_san: None,
            required_extensions: vec![("1.3.6.1.4.1.57264.1.8".into(), "https://accounts.example.com".into())],
        };
        let err = enforce_identity_policy(&identity, &policy).unwrap_err();
        assert!(matches!(err, PolicyError::MissingExtension { .. }));
    }

    #[test]
    fn required_extension_value_mismatch_is_rejected() {
        let mut identity = identity_with(vec![], None);
        identity
            .extensions
            .push(("1.3.6.1.4.1.57264.1.6".into(), "refs/heads/main".into()));
        let policy = IdentityPolicy {
            expected_san: None,
            required_extensions: vec![("1.3.6.1.4.1.57264.1.6".into(), "refs/heads/release".into())],
        };
        let err = enforce_identity_policy(&identity, &policy).unwrap_err();
        assert!(matches!(err, PolicyError::ExtensionValueMismatch { .. }));
    }

    #[test]
    fn required_extension_match_is_accepted() {
        let mut identity = identity_with(vec![], None);
        identity
            .extensions
            .push(("1.3.6.1.4.1.57264.1.6".into(), "refs/heads/main".into()));
        let policy = IdentityPolicy {
            expected_san: None,
            required_extensions: vec![("1.3.6.1.4.1.57264.1.6".into(), "refs/heads/main".into())],
        };
        assert!(enforce_identity_policy(&identity, &policy).is_ok());
    }
}
