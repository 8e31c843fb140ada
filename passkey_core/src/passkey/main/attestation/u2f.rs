use crate::passkey::errors::PasskeyError;
use crate::passkey::main::codec::{CoseAlgorithm, PublicKey};
use crate::passkey::types::AttestationTrust;

use super::core::{AttestationFormat, AttestationInput};
use super::utils::{CertRequirements, check_attestation_cert, failed, get_sig, get_x5c, verify_with_cert};

/// "fido-u2f": legacy U2F security keys.
pub(super) struct FidoU2fAttestation;

impl AttestationFormat for FidoU2fAttestation {
    fn name(&self) -> &str {
        "fido-u2f"
    }

    fn verify(&self, input: &AttestationInput<'_>) -> Result<AttestationTrust, PasskeyError> {
        tracing::debug!("Verifying FIDO-U2F attestation");

        let sig = get_sig(input.att_stmt)?;
        let x5c = get_x5c(input.att_stmt)?
            .ok_or_else(|| failed("Missing x5c in FIDO-U2F attestation"))?;
        if x5c.len() != 1 {
            return Err(failed(format!(
                "FIDO-U2F attestation must carry exactly one certificate, got {}",
                x5c.len()
            )));
        }

        // U2F keys are always P-256
        let PublicKey::Es256 { x, y } = &input.credential.public_key else {
            return Err(failed("FIDO-U2F credential key must be ES256"));
        };

        let cert = &x5c[0];
        check_attestation_cert(
            cert,
            input.now,
            &CertRequirements {
                aaguid: None,
                packed_profile: false,
            },
        )?;

        // 0x00 || rpIdHash || clientDataHash || keyHandle || 0x04 || x || y
        let credential_id = input.credential.credential_id.as_bytes();
        let mut verification_data = Vec::with_capacity(1 + 32 + 32 + credential_id.len() + 65);
        verification_data.push(0x00);
        verification_data.extend_from_slice(&input.auth_data.rp_id_hash);
        verification_data.extend_from_slice(input.client_data_hash);
        verification_data.extend_from_slice(credential_id);
        verification_data.push(0x04);
        verification_data.extend_from_slice(x);
        verification_data.extend_from_slice(y);

        verify_with_cert(cert, CoseAlgorithm::Es256, &verification_data, &sig)?;

        tracing::debug!("FIDO-U2F attestation verification successful");
        Ok(AttestationTrust::Basic)
    }
}
