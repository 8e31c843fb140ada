use crate::passkey::errors::PasskeyError;
use crate::passkey::main::codec::{CoseAlgorithm, verify_signature};
use crate::passkey::types::AttestationTrust;

use super::core::{AttestationFormat, AttestationInput};
use super::utils::{
    CertRequirements, check_attestation_cert, failed, get_alg, get_sig, get_x5c, stmt_field,
    verify_with_cert,
};

/// "packed": the generic signature-based format.
///
/// With `x5c` the statement is signed by an attestation certificate (basic
/// attestation); without it the credential key signs its own registration
/// (self attestation). ECDAA is not supported.
pub(super) struct PackedAttestation;

impl AttestationFormat for PackedAttestation {
    fn name(&self) -> &str {
        "packed"
    }

    fn verify(&self, input: &AttestationInput<'_>) -> Result<AttestationTrust, PasskeyError> {
        let alg_id = get_alg(input.att_stmt)?;
        let sig = get_sig(input.att_stmt)?;

        if stmt_field(input.att_stmt, "ecdaaKeyId").is_some() {
            return Err(failed("ECDAA attestation not supported"));
        }

        let mut signed_data =
            Vec::with_capacity(input.auth_data_raw.len() + input.client_data_hash.len());
        signed_data.extend_from_slice(input.auth_data_raw);
        signed_data.extend_from_slice(input.client_data_hash);

        let alg = CoseAlgorithm::from_id(alg_id).ok_or_else(|| {
            PasskeyError::UnsupportedAlgorithm(format!("attestation algorithm {alg_id}"))
        })?;

        match get_x5c(input.att_stmt)? {
            Some(x5c) => {
                tracing::debug!("Full attestation with certificate chain");
                let leaf = &x5c[0];
                check_attestation_cert(
                    leaf,
                    input.now,
                    &CertRequirements {
                        aaguid: Some(&input.credential.aaguid),
                        packed_profile: true,
                    },
                )?;
                verify_with_cert(leaf, alg, &signed_data, &sig)?;
                // Intermediates are checked for validity only; anchoring is left
                // to a metadata service
                for intermediate in &x5c[1..] {
                    check_attestation_validity(intermediate, input)?;
                }
                Ok(AttestationTrust::Basic)
            }
            None => {
                tracing::debug!("Self attestation");
                let credential_alg = input.credential.public_key.algorithm();
                if alg != credential_alg {
                    return Err(failed(format!(
                        "Self attestation alg {alg_id} does not match credential algorithm {}",
                        credential_alg.id()
                    )));
                }
                if !verify_signature(&input.credential.public_key, &signed_data, &sig) {
                    return Err(failed("Self attestation signature verification failed"));
                }
                Ok(AttestationTrust::SelfAttestation)
            }
        }
    }
}

fn check_attestation_validity(
    der: &[u8],
    input: &AttestationInput<'_>,
) -> Result<(), PasskeyError> {
    use x509_parser::{certificate::X509Certificate, prelude::FromDer, time::ASN1Time};

    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| failed(format!("Failed to parse certificate in chain: {e}")))?;
    let timestamp = ASN1Time::from_timestamp(input.now.timestamp())
        .map_err(|e| failed(format!("Failed to convert time: {e}")))?;
    if !cert.validity().is_valid_at(timestamp) {
        return Err(failed("Certificate in chain is expired or not yet valid"));
    }
    Ok(())
}
