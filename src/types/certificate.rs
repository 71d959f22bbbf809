/// A leaf-to-root chain of DER-encoded X.509 certificates, either carried in
/// a bundle (leaf only) or resolved from trust material (intermediates and
/// root, and for some deployments the leaf's issuing chain in full).
#[derive(Debug, Clone, Default)]
pub struct CertificateChain {
    pub leaf: Vec<u8>,
    pub intermediates: Vec<Vec<u8>>,
    pub root: Vec<u8>,
}

impl CertificateChain {
    pub fn all_der(&self) -> Vec<&[u8]> {
        let mut all = vec![self.leaf.as_slice()];
        all.extend(self.intermediates.iter().map(|c| c.as_slice()));
        all.push(self.root.as_slice());
        all
    }
}

/// A subject alternative name entry extracted from a leaf certificate, used
/// both for the policy-matching step and for surfacing a human-readable
/// signer identity on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAltName {
    Email(String),
    Uri(String),
    Dns(String),
}

impl SubjectAltName {
    pub fn as_str(&self) -> &str {
        match self {
            SubjectAltName::Email(s) | SubjectAltName::Uri(s) | SubjectAltName::Dns(s) => s,
        }
    }
}

/// Claims recovered from a Fulcio-issued certificate's custom OID
/// extensions and its subject alternative names. Exposed to callers as
/// informational data extraction, not a basis for policy decisions unless
/// the caller opts into matching via [`crate::verifier::policy`].
#[derive(Debug, Clone, Default)]
pub struct SignerIdentity {
    pub issuer_cn: Option<String>,
    pub san: Vec<SubjectAltName>,
    pub oidc_issuer: Option<String>,
    pub workflow_trigger: Option<String>,
    pub workflow_sha: Option<String>,
    pub workflow_name: Option<String>,
    pub workflow_ref: Option<String>,
    pub workflow_repository: Option<String>,
    pub source_repository_uri: Option<String>,
    pub source_repository_ref: Option<String>,
    /// Every extension the leaf carries, as `(dotted OID, decoded string
    /// value)`, for policy matching against arbitrary Fulcio claims beyond
    /// the named fields above.
    pub extensions: Vec<(String, String)>,
}

impl SignerIdentity {
    /// The decoded value of extension `oid`, if the leaf carried it and it
    /// decoded to a string.
    pub fn extension(&self, oid: &str) -> Option<&str> {
        self.extensions
            .iter()
            .find(|(id, _)| id == oid)
            .map(|(_, value)| value.as_str())
    }
}

impl SignerIdentity {
    /// The primary subject string a policy match would compare against
    /// (first SAN entry, conventionally the OIDC subject claim).
    pub fn subject(&self) -> Option<&str> {
        self.san.first().map(|s| s.as_str())
    }
}
