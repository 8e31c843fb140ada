use chrono::{DateTime, Utc};
use ciborium::value::Value as CborValue;
use uuid::Uuid;
use webpki::EndEntityCert;
use x509_parser::{certificate::X509Certificate, extensions::ParsedExtension, prelude::*, time::ASN1Time};

use crate::passkey::errors::PasskeyError;
use crate::passkey::main::codec::CoseAlgorithm;

// id-fido-gen-ce-aaguid
const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";

pub(super) fn failed(msg: impl Into<String>) -> PasskeyError {
    PasskeyError::AttestationVerificationFailed(msg.into())
}

/// Looks up a text key in an attestation statement.
pub(super) fn stmt_field<'a>(att_stmt: &'a [(CborValue, CborValue)], name: &str) -> Option<&'a CborValue> {
    att_stmt.iter().find_map(|(k, v)| match k {
        CborValue::Text(key) if key == name => Some(v),
        _ => None,
    })
}

pub(super) fn get_sig(att_stmt: &[(CborValue, CborValue)]) -> Result<Vec<u8>, PasskeyError> {
    match stmt_field(att_stmt, "sig") {
        Some(CborValue::Bytes(s)) => Ok(s.clone()),
        Some(_) => Err(failed("'sig' must be a byte string")),
        None => Err(failed("Missing signature in attestation statement")),
    }
}

pub(super) fn get_alg(att_stmt: &[(CborValue, CborValue)]) -> Result<i64, PasskeyError> {
    match stmt_field(att_stmt, "alg") {
        Some(CborValue::Integer(a)) => {
            i64::try_from(*a).map_err(|_| failed("'alg' is out of range"))
        }
        Some(_) => Err(failed("'alg' must be an integer")),
        None => Err(failed("Missing algorithm in attestation statement")),
    }
}

/// Returns the x5c chain (leaf first), or `None` when absent.
pub(super) fn get_x5c(
    att_stmt: &[(CborValue, CborValue)],
) -> Result<Option<Vec<Vec<u8>>>, PasskeyError> {
    let Some(value) = stmt_field(att_stmt, "x5c") else {
        return Ok(None);
    };
    let CborValue::Array(certs) = value else {
        return Err(failed("'x5c' must be an array"));
    };
    let chain = certs
        .iter()
        .map(|cert| match cert {
            CborValue::Bytes(der) => Ok(der.clone()),
            _ => Err(failed("'x5c' entries must be byte strings")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if chain.is_empty() {
        return Err(failed("Empty x5c in attestation statement"));
    }
    tracing::debug!("Found x5c with {} certificates", chain.len());
    Ok(Some(chain))
}

/// Requirements on the attestation certificate itself.
pub(super) struct CertRequirements<'a> {
    /// AAGUID the id-fido-gen-ce-aaguid extension must match, if present
    pub aaguid: Option<&'a Uuid>,
    /// Enforce version 3 and OU "Authenticator Attestation"
    pub packed_profile: bool,
}

pub(super) fn check_attestation_cert(
    der: &[u8],
    now: DateTime<Utc>,
    req: &CertRequirements<'_>,
) -> Result<(), PasskeyError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| failed(format!("Failed to parse X509 certificate: {e}")))?;

    for ext in cert.extensions() {
        if let ParsedExtension::BasicConstraints(bc) = ext.parsed_extension() {
            if bc.ca {
                return Err(failed("Certificate must not be a CA certificate"));
            }
        }
    }

    let timestamp = ASN1Time::from_timestamp(now.timestamp())
        .map_err(|e| failed(format!("Failed to convert time: {e}")))?;
    if !cert.validity().is_valid_at(timestamp) {
        return Err(failed("Attestation certificate is expired or not yet valid"));
    }

    if req.packed_profile {
        if cert.version() != X509Version::V3 {
            return Err(failed("Attestation certificate must be X.509 version 3"));
        }
        let ou_ok = cert
            .subject()
            .iter_organizational_unit()
            .any(|ou| ou.as_str().ok() == Some("Authenticator Attestation"));
        if !ou_ok {
            return Err(failed(
                "Attestation certificate subject OU must be 'Authenticator Attestation'",
            ));
        }
    }

    if let Some(expected) = req.aaguid {
        if let Some(ext) = cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == OID_FIDO_GEN_CE_AAGUID)
        {
            // OCTET STRING: 0x04 0x10 followed by the 16-byte AAGUID
            let value = ext.value;
            if value.len() != 18 || value[0] != 0x04 || value[1] != 0x10 {
                return Err(failed("Malformed AAGUID certificate extension"));
            }
            if &value[2..] != expected.as_bytes() {
                return Err(failed(
                    "AAGUID mismatch between certificate and authenticator data",
                ));
            }
        }
    }

    Ok(())
}

/// Verifies `sig` over `message` with the public key of the DER certificate.
pub(super) fn verify_with_cert(
    der: &[u8],
    alg: CoseAlgorithm,
    message: &[u8],
    sig: &[u8],
) -> Result<(), PasskeyError> {
    let cert = EndEntityCert::try_from(der)
        .map_err(|e| failed(format!("Failed to parse attestation certificate: {e:?}")))?;
    let algorithm = match alg {
        CoseAlgorithm::Es256 => &webpki::ECDSA_P256_SHA256,
        CoseAlgorithm::EdDsa => &webpki::ED25519,
        CoseAlgorithm::Rs256 => &webpki::RSA_PKCS1_2048_8192_SHA256,
    };
    cert.verify_signature(algorithm, message, sig)
        .map_err(|_| failed("Attestation signature invalid"))
}
