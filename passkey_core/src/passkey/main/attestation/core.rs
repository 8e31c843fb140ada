use chrono::{DateTime, Utc};
use ciborium::value::Value as CborValue;
use std::collections::HashMap;
use std::sync::Arc;

use crate::passkey::errors::PasskeyError;
use crate::passkey::main::codec::{AttestedCredentialData, AuthenticatorData};
use crate::passkey::types::AttestationTrust;

use super::none::NoneAttestation;
use super::packed::PackedAttestation;
use super::u2f::FidoU2fAttestation;

/// Everything an attestation statement format needs to verify a statement.
pub struct AttestationInput<'a> {
    /// Authenticator data exactly as received; statements sign these bytes
    pub auth_data_raw: &'a [u8],
    pub auth_data: &'a AuthenticatorData,
    pub credential: &'a AttestedCredentialData,
    pub client_data_hash: &'a [u8; 32],
    pub att_stmt: &'a [(CborValue, CborValue)],
    pub now: DateTime<Utc>,
}

/// One attestation statement format ("none", "packed", ...).
pub trait AttestationFormat: Send + Sync {
    /// The `fmt` identifier this verifier handles
    fn name(&self) -> &str;

    fn verify(&self, input: &AttestationInput<'_>) -> Result<AttestationTrust, PasskeyError>;
}

/// Registry of attestation formats keyed by `fmt`. Unknown formats fail closed.
#[derive(Clone)]
pub struct AttestationFormats {
    formats: HashMap<String, Arc<dyn AttestationFormat>>,
}

impl AttestationFormats {
    /// An empty registry that rejects every format.
    pub fn empty() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    /// The built-in formats: "none", "packed" and "fido-u2f".
    pub fn standard(allow_none: bool) -> Self {
        let mut formats = Self::empty();
        formats.register(NoneAttestation::new(allow_none));
        formats.register(PackedAttestation);
        formats.register(FidoU2fAttestation);
        formats
    }

    /// Adds a format, replacing any registered under the same name.
    pub fn register(&mut self, format: impl AttestationFormat + 'static) -> &mut Self {
        self.formats
            .insert(format.name().to_string(), Arc::new(format));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formats.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn verify(
        &self,
        fmt: &str,
        input: &AttestationInput<'_>,
    ) -> Result<AttestationTrust, PasskeyError> {
        let format = self.formats.get(fmt).ok_or_else(|| {
            PasskeyError::UnsupportedAlgorithm(format!("attestation format '{fmt}'"))
        })?;
        tracing::debug!("Using '{}' attestation format", fmt);
        let trust = format.verify(input)?;
        tracing::debug!("Attestation '{}' verified with trust {:?}", fmt, trust);
        Ok(trust)
    }
}

impl Default for AttestationFormats {
    fn default() -> Self {
        Self::standard(true)
    }
}
