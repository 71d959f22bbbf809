use chrono::{DateTime, TimeZone, Utc};
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::{Any, Decode};

use crate::crypto::hash::{constant_time_eq, sha256, sha384};
use crate::error::TimestampError;

/// OID for `id-ct-TSTInfo` (RFC 3161 section 2.4.2): the only content type a
/// conforming TimeStampToken's `SignedData.encapContentInfo` may declare.
const OID_CONTENT_TYPE_TST_INFO: &str = "1.2.840.113549.1.9.16.1.4";

/// PKCS#9 signed-attribute OIDs a TimeStampToken's `SignerInfo` must carry
/// (RFC 5652 section 11, RFC 3161 section 2.4.2, RFC 5035 section 4).
const OID_ATTR_CONTENT_TYPE: &str = "1.2.840.113549.1.9.3";
const OID_ATTR_MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";
const OID_ATTR_SIGNING_TIME: &str = "1.2.840.113549.1.9.5";
const OID_ATTR_SIGNING_CERTIFICATE_V2: &str = "1.2.840.113549.1.9.16.2.47";

/// A parsed RFC 3161 `TimeStampToken`: the CMS `SignedData` envelope plus
/// the `TSTInfo` it encapsulates. Signature verification happens separately
/// in `verifier::timestamp`, against a caller-supplied TSA chain.
pub struct Rfc3161Timestamp {
    pub tst_info: TstInfo,
    /// DER-encoded certificates embedded in the token, if any.
    pub embedded_certificates: Vec<Vec<u8>>,
    pub message_digest_oid: String,
    pub signature: Vec<u8>,
    pub signature_algorithm_oid: String,
    /// The bytes the signature was computed over: the DER `SignedAttributes`
    /// if present (per CMS, these are what's actually signed), otherwise the
    /// raw encapsulated content.
    pub signed_content: Vec<u8>,
    /// `certHash` from the first `ESSCertIDv2` of the mandatory
    /// `signingCertificateV2` signed attribute — what the signing
    /// certificate is expected to hash to, binding the signature to that
    /// exact certificate and not merely to a key.
    pub signing_cert_hash: Vec<u8>,
}

pub struct TstInfo {
    pub gen_time: DateTime<Utc>,
    pub message_imprint: MessageImprint,
}

pub struct MessageImprint {
    pub hash_algorithm_oid: String,
    pub hashed_message: Vec<u8>,
}

pub fn parse_rfc3161_timestamp(der: &[u8]) -> Result<Rfc3161Timestamp, TimestampError> {
    let content_info =
        ContentInfo::from_der(der).map_err(|e| TimestampError::Rfc3161Parse(e.to_string()))?;
    let signed_data: SignedData = content_info
        .content
        .decode_as()
        .map_err(|e| TimestampError::Rfc3161Parse(format!("not a CMS SignedData: {e}")))?;

    let content_type = signed_data.encap_content_info.econtent_type.to_string();
    if content_type != OID_CONTENT_TYPE_TST_INFO {
        return Err(TimestampError::Rfc3161Parse(format!(
            "unexpected encapsulated content type {content_type}, expected {OID_CONTENT_TYPE_TST_INFO}"
        )));
    }

    let econtent = signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .ok_or_else(|| TimestampError::Rfc3161Parse("SignedData has no encapsulated content".into()))?;
    let tstinfo_der = econtent_octets(econtent)?;
    let tst_info = parse_tstinfo(&tstinfo_der)?;

    let signer = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| TimestampError::Rfc3161Parse("SignedData has no signer".into()))?;

    let signed_attrs = signer
        .signed_attrs
        .as_ref()
        .ok_or_else(|| TimestampError::Rfc3161Parse("SignerInfo carries no signed attributes".into()))?;

    let signed_content = signed_attrs
        .to_der()
        .map_err(|e| TimestampError::Rfc3161Parse(format!("re-encoding signed attrs: {e}")))?;

    let digest_oid = signer.digest_alg.oid.to_string();
    let signing_cert_hash = validate_signed_attributes(&signed_content, &digest_oid, &tstinfo_der)?;

    let mut embedded_certificates = Vec::new();
    if let Some(certs) = &signed_data.certificates {
        for choice in certs.0.iter() {
            if let cms::cert::CertificateChoices::Certificate(cert) = choice {
                if let Ok(der) = cert.to_der() {
                    embedded_certificates.push(der);
                }
            }
        }
    }

    Ok(Rfc3161Timestamp {
        tst_info,
        embedded_certificates,
        message_digest_oid: signer.digest_alg.oid.to_string(),
        signature: signer.signature.as_bytes().to_vec(),
        signature_algorithm_oid: signer.signature_algorithm.oid.to_string(),
        signed_content,
        signing_cert_hash,
    })
}

struct SignedAttribute {
    oid: String,
    /// The first `AttributeValue`'s full TLV (tag, length, and content).
    value: Vec<u8>,
}

/// Walks the re-encoded `SignedAttributes` SET OF Attribute and checks that
/// `contentType` (must be `id-ct-TSTInfo`), `messageDigest` (must equal the
/// digest of the encapsulated `TSTInfo`), `signingTime`, and
/// `signingCertificateV2` are all present, per RFC 3161 section 2.4.2 and
/// RFC 5035 section 4. Returns the `certHash` from the first `ESSCertIDv2`
/// for the caller to cross-check against the actual signing certificate.
fn validate_signed_attributes(
    signed_attrs_der: &[u8],
    digest_oid: &str,
    tstinfo_der: &[u8],
) -> Result<Vec<u8>, TimestampError> {
    let attrs = parse_signed_attributes(signed_attrs_der)?;

    let content_type = attrs
        .iter()
        .find(|a| a.oid == OID_ATTR_CONTENT_TYPE)
        .ok_or_else(|| TimestampError::Rfc3161Parse("missing contentType signed attribute".into()))?;
    let (_tag, content_type_oid_bytes, _) = read_tlv(&content_type.value)?;
    let content_type_oid = der::asn1::ObjectIdentifier::from_der(&prepend_tag(0x06, content_type_oid_bytes))
        .map_err(|e| TimestampError::Rfc3161Parse(e.to_string()))?
        .to_string();
    if content_type_oid != OID_CONTENT_TYPE_TST_INFO {
        return Err(TimestampError::Rfc3161Parse(format!(
            "contentType attribute declares {content_type_oid}, expected {OID_CONTENT_TYPE_TST_INFO}"
        )));
    }

    let message_digest = attrs
        .iter()
        .find(|a| a.oid == OID_ATTR_MESSAGE_DIGEST)
        .ok_or_else(|| TimestampError::Rfc3161Parse("missing messageDigest signed attribute".into()))?;
    let (_tag, declared_digest, _) = read_tlv(&message_digest.value)?;
    let expected_digest = match digest_oid {
        "2.16.840.1.101.3.4.2.1" => sha256(tstinfo_der).to_vec(),
        "2.16.840.1.101.3.4.2.2" => sha384(tstinfo_der).to_vec(),
        other => {
            return Err(TimestampError::Rfc3161Parse(format!(
                "unsupported signer digest algorithm {other}"
            )))
        }
    };
    if !constant_time_eq(declared_digest, &expected_digest) {
        return Err(TimestampError::Rfc3161Parse(
            "messageDigest attribute does not match TSTInfo digest".into(),
        ));
    }

    attrs
        .iter()
        .find(|a| a.oid == OID_ATTR_SIGNING_TIME)
        .ok_or_else(|| TimestampError::Rfc3161Parse("missing signingTime signed attribute".into()))?;

    let signing_cert_v2 = attrs
        .iter()
        .find(|a| a.oid == OID_ATTR_SIGNING_CERTIFICATE_V2)
        .ok_or_else(|| TimestampError::Rfc3161Parse("missing signingCertificateV2 signed attribute".into()))?;

    parse_ess_cert_id_v2_hash(&signing_cert_v2.value)
}

/// Parses the DER `SET OF Attribute` body of a re-encoded `SignedAttributes`
/// value, returning each attribute's OID and the raw TLV of its first value.
fn parse_signed_attributes(der: &[u8]) -> Result<Vec<SignedAttribute>, TimestampError> {
    let (_tag, set_body, _) = read_tlv(der)?;
    let mut attrs = Vec::new();
    let mut rest = set_body;
    while !rest.is_empty() {
        let (attr_body, attr_rest) = take_tlv(rest)?;
        let (oid_bytes, after_oid) = take_tlv(attr_body)?;
        let oid = der::asn1::ObjectIdentifier::from_der(&prepend_tag(0x06, oid_bytes))
            .map_err(|e| TimestampError::Rfc3161Parse(e.to_string()))?
            .to_string();
        let (values_set_body, _) = take_tlv(after_oid)?;
        let (first_value_tag, first_value_body, _) = read_tlv(values_set_body)?;
        attrs.push(SignedAttribute {
            oid,
            value: prepend_tag(first_value_tag, first_value_body),
        });
        rest = attr_rest;
    }
    Ok(attrs)
}

/// Extracts `certHash` from the first `ESSCertIDv2` of a `SigningCertificateV2`
/// attribute value (RFC 5035 section 4):
/// `SEQUENCE { certs SEQUENCE OF ESSCertIDv2, policies ... OPTIONAL }`, where
/// `ESSCertIDv2 ::= SEQUENCE { hashAlgorithm AlgorithmIdentifier DEFAULT
/// {sha256}, certHash OCTET STRING, issuerSerial IssuerSerial OPTIONAL }`.
fn parse_ess_cert_id_v2_hash(value: &[u8]) -> Result<Vec<u8>, TimestampError> {
    let (_tag, outer_body, _) = read_tlv(value)?;
    let (certs_seq_body, _) = take_tlv(outer_body)?;
    let (first_cert_id_body, _) = take_tlv(certs_seq_body)?;

    let (first_tag, first_field, after_first) = read_tlv(first_cert_id_body)?;
    if first_tag == 0x04 {
        // hashAlgorithm omitted (default sha256): this TLV is certHash.
        return Ok(first_field.to_vec());
    }
    // first_tag is the hashAlgorithm AlgorithmIdentifier SEQUENCE; the next
    // TLV is certHash.
    let (_tag, cert_hash, _) = read_tlv(after_first)?;
    Ok(cert_hash.to_vec())
}

fn econtent_octets(any: &Any) -> Result<Vec<u8>, TimestampError> {
    // econtent is itself an OCTET STRING wrapping the TSTInfo DER.
    let octets: der::asn1::OctetStringRef = any
        .decode_as()
        .map_err(|e| TimestampError::Rfc3161Parse(format!("encapsulated content is not OCTET STRING: {e}")))?;
    Ok(octets.as_bytes().to_vec())
}

fn parse_tstinfo(data: &[u8]) -> Result<TstInfo, TimestampError> {
    let (_tag, seq_body, _) = read_tlv(data)?;

    let (_version, rest) = take_tlv(seq_body)?;
    let (_policy, rest) = take_tlv(rest)?;
    let (imprint_seq, rest) = take_tlv(rest)?;
    let message_imprint = parse_message_imprint(imprint_seq)?;
    let (_serial, rest) = take_tlv(rest)?;
    let (gen_time_bytes, _rest) = take_tlv(rest)?;
    let gen_time = parse_generalized_time(gen_time_bytes)?;

    Ok(TstInfo {
        gen_time,
        message_imprint,
    })
}

fn parse_message_imprint(data: &[u8]) -> Result<MessageImprint, TimestampError> {
    let (alg_seq, rest) = take_tlv(data)?;
    let (oid_bytes, _) = take_tlv(alg_seq)?;
    let hash_algorithm_oid = der::asn1::ObjectIdentifier::from_der(&prepend_tag(0x06, oid_bytes))
        .map_err(|e| TimestampError::Rfc3161Parse(e.to_string()))?
        .to_string();

    let (hashed_message, _) = take_tlv(rest)?;

    Ok(MessageImprint {
        hash_algorithm_oid,
        hashed_message: hashed_message.to_vec(),
    })
}

fn parse_generalized_time(value: &[u8]) -> Result<DateTime<Utc>, TimestampError> {
    let s = std::str::from_utf8(value)
        .map_err(|_| TimestampError::Rfc3161Parse("genTime is not valid UTF-8".into()))?;
    let s = s.trim_end_matches('Z');
    let (main, frac_nanos) = match s.split_once('.') {
        Some((main, frac)) => {
            let frac_digits: String = frac.chars().take(9).collect();
            let padded = format!("{frac_digits:0<9}");
            (main, padded.parse::<u32>().unwrap_or(0))
        }
        None => (s, 0),
    };
    if main.len() != 14 {
        return Err(TimestampError::Rfc3161Parse(format!(
            "unexpected GeneralizedTime length: {s}"
        )));
    }
    let year: i32 = main[0..4].parse().map_err(|_| TimestampError::Rfc3161Parse(s.to_string()))?;
    let month: u32 = main[4..6].parse().map_err(|_| TimestampError::Rfc3161Parse(s.to_string()))?;
    let day: u32 = main[6..8].parse().map_err(|_| TimestampError::Rfc3161Parse(s.to_string()))?;
    let hour: u32 = main[8..10].parse().map_err(|_| TimestampError::Rfc3161Parse(s.to_string()))?;
    let minute: u32 = main[10..12].parse().map_err(|_| TimestampError::Rfc3161Parse(s.to_string()))?;
    let second: u32 = main[12..14].parse().map_err(|_| TimestampError::Rfc3161Parse(s.to_string()))?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .and_then(|dt| dt.checked_add_signed(chrono::Duration::nanoseconds(frac_nanos as i64)))
        .ok_or_else(|| TimestampError::Rfc3161Parse(format!("invalid GeneralizedTime: {s}")))
}

/// Reads one DER TLV, returning (tag, value, rest-of-input).
fn read_tlv(data: &[u8]) -> Result<(u8, &[u8], &[u8]), TimestampError> {
    if data.len() < 2 {
        return Err(TimestampError::Rfc3161Parse("truncated DER TLV".into()));
    }
    let tag = data[0];
    let mut idx = 1;
    let first_len = data[idx];
    idx += 1;
    let length = if first_len & 0x80 == 0 {
        first_len as usize
    } else {
        let num_bytes = (first_len & 0x7F) as usize;
        if data.len() < idx + num_bytes {
            return Err(TimestampError::Rfc3161Parse("truncated DER length".into()));
        }
        let mut len = 0usize;
        for &b in &data[idx..idx + num_bytes] {
            len = (len << 8) | b as usize;
        }
        idx += num_bytes;
        len
    };
    if data.len() < idx + length {
        return Err(TimestampError::Rfc3161Parse("truncated DER value".into()));
    }
    Ok((tag, &data[idx..idx + length], &data[idx + length..]))
}

/// Reads one DER TLV and returns its raw *value* bytes alongside what's left.
fn take_tlv(data: &[u8]) -> Result<(&[u8], &[u8]), TimestampError> {
    let (_tag, value, rest) = read_tlv(data)?;
    Ok((value, rest))
}

fn prepend_tag(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    if value.len() < 0x80 {
        out.push(value.len() as u8);
    } else {
        let len_bytes = value.len().to_be_bytes();
        let significant: Vec<u8> = len_bytes.into_iter().skip_while(|b| *b == 0).collect();
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(&significant);
    }
    out.extend_from_slice(value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generalized_time_without_fraction() {
        let dt = parse_generalized_time(b"20240115120000Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-15T12:00:00+00:00");
    }

    #[test]
    fn parses_generalized_time_with_fraction() {
        let dt = parse_generalized_time(b"20240115120000.5Z").unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn rejects_malformed_time() {
        assert!(parse_generalized_time(b"not-a-time").is_err());
    }
}
