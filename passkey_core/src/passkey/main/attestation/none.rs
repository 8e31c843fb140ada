use crate::passkey::errors::PasskeyError;
use crate::passkey::types::AttestationTrust;

use super::core::{AttestationFormat, AttestationInput};
use super::utils::failed;

/// "none": the authenticator offers no provenance. The key is self-asserted.
pub(super) struct NoneAttestation {
    allowed: bool,
}

impl NoneAttestation {
    pub(super) fn new(allowed: bool) -> Self {
        Self { allowed }
    }
}

impl AttestationFormat for NoneAttestation {
    fn name(&self) -> &str {
        "none"
    }

    fn verify(&self, input: &AttestationInput<'_>) -> Result<AttestationTrust, PasskeyError> {
        if !input.att_stmt.is_empty() {
            return Err(failed("attStmt must be empty for none attestation"));
        }
        if !self.allowed {
            return Err(failed("'none' attestation is not accepted by policy"));
        }
        tracing::debug!(
            "Accepting 'none' attestation for AAGUID {}",
            input.credential.aaguid
        );
        Ok(AttestationTrust::None)
    }
}
