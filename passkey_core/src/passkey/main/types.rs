use serde::{Deserialize, Serialize};

use crate::config::{
    AttestationConveyance, AuthenticatorAttachment, ResidentKeyRequirement,
    UserVerificationRequirement,
};
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{CeremonyType, ChallengeId, CredentialId, UserHandle};
use crate::utils::{base64url_decode, sha256};

use super::codec::CoseAlgorithm;

/// Parsed `clientDataJSON`. `hash` is the SHA-256 of the exact bytes received.
#[derive(Debug, Clone)]
pub(crate) struct ParsedClientData {
    pub(crate) type_: String,
    pub(crate) challenge: Vec<u8>,
    pub(crate) origin: String,
    pub(crate) cross_origin: Option<bool>,
    pub(crate) hash: [u8; 32],
}

impl ParsedClientData {
    pub(crate) fn from_bytes(raw_data: &[u8]) -> Result<Self, PasskeyError> {
        let data_str = std::str::from_utf8(raw_data)
            .map_err(|e| PasskeyError::MalformedInput(format!("Invalid UTF-8: {e}")))?;

        let data: serde_json::Value = serde_json::from_str(data_str)
            .map_err(|e| PasskeyError::MalformedInput(format!("Invalid JSON: {e}")))?;

        let field = |name: &str| {
            data[name]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| PasskeyError::InvalidClientData(format!("Missing {name}")))
        };

        let type_ = field("type")?;
        let challenge_b64 = field("challenge")?;
        let origin = field("origin")?;
        let cross_origin = data["crossOrigin"].as_bool();

        let challenge = base64url_decode(&challenge_b64).map_err(|e| {
            PasskeyError::InvalidClientData(format!("Challenge is not base64url: {e}"))
        })?;

        if cross_origin == Some(true) {
            return Err(PasskeyError::InvalidClientData(
                "Cross-origin ceremonies are not accepted".to_string(),
            ));
        }

        tracing::debug!(
            "Client data: type={}, origin={}, crossOrigin={:?}, challenge length={}",
            type_,
            origin,
            cross_origin,
            challenge.len()
        );

        Ok(Self {
            type_,
            challenge,
            origin,
            cross_origin,
            hash: sha256(raw_data),
        })
    }

    pub(crate) fn verify_type(&self, ceremony: CeremonyType) -> Result<(), PasskeyError> {
        let expected = ceremony.client_data_type();
        if self.type_ != expected {
            return Err(PasskeyError::InvalidClientData(format!(
                "Invalid type. Expected '{expected}', Got: {}",
                self.type_
            )));
        }
        Ok(())
    }

    pub(crate) fn verify_origin(&self, expected: &str) -> Result<(), PasskeyError> {
        if self.origin != expected {
            return Err(PasskeyError::OriginMismatch {
                expected: expected.to_string(),
                actual: self.origin.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialUserEntity {
    pub id: UserHandle,
    pub name: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: String,
    pub alg: i64,
}

impl PubKeyCredParam {
    pub(crate) fn supported() -> Vec<Self> {
        [
            CoseAlgorithm::Es256,
            CoseAlgorithm::EdDsa,
            CoseAlgorithm::Rs256,
        ]
        .into_iter()
        .map(|alg| Self {
            type_: "public-key".to_string(),
            alg: alg.id(),
        })
        .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    pub resident_key: ResidentKeyRequirement,
    pub require_resident_key: bool,
    pub user_verification: UserVerificationRequirement,
}

/// Reference to a credential in `excludeCredentials` / `allowCredentials`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: CredentialId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

impl CredentialDescriptor {
    pub(crate) fn new(id: CredentialId, transports: Vec<String>) -> Self {
        Self {
            type_: "public-key".to_string(),
            id,
            transports,
        }
    }
}

/// Options for `navigator.credentials.create()`.
///
/// `challenge_id` is not part of the browser API; the transport layer keeps it
/// and hands it back on completion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge_id: ChallengeId,
    /// base64url, no padding
    pub challenge: String,
    pub rp: RelyingParty,
    pub user: PublicKeyCredentialUserEntity,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    /// Milliseconds
    pub timeout: u64,
    pub authenticator_selection: AuthenticatorSelection,
    pub attestation: AttestationConveyance,
    pub exclude_credentials: Vec<CredentialDescriptor>,
}

impl RegistrationOptions {
    pub fn excluded_credential_ids(&self) -> Vec<&CredentialId> {
        self.exclude_credentials.iter().map(|c| &c.id).collect()
    }
}

/// Options for `navigator.credentials.get()`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge_id: ChallengeId,
    /// base64url, no padding
    pub challenge: String,
    pub rp_id: String,
    /// Milliseconds
    pub timeout: u64,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: UserVerificationRequirement,
}

/// Registration result as serialized by the browser (`PublicKeyCredential`
/// with an `AuthenticatorAttestationResponse`).
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AttestationResponse,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Vec<String>,
}

/// Raw bytes of a decoded [`RegistrationResponse`].
#[derive(Debug, Clone)]
pub struct DecodedRegistration {
    pub credential_id: CredentialId,
    pub client_data_json: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub transports: Vec<String>,
}

impl RegistrationResponse {
    pub fn decode(&self) -> Result<DecodedRegistration, PasskeyError> {
        check_credential_type(&self.type_)?;
        Ok(DecodedRegistration {
            credential_id: CredentialId::from_base64url(&self.raw_id)?,
            client_data_json: base64url_decode(&self.response.client_data_json)?,
            attestation_object: base64url_decode(&self.response.attestation_object)?,
            transports: self.response.transports.clone(),
        })
    }
}

/// Authentication result as serialized by the browser (`PublicKeyCredential`
/// with an `AuthenticatorAssertionResponse`).
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AssertionResponse,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default)]
    pub user_handle: Option<String>,
}

/// Raw bytes of a decoded [`AuthenticationResponse`].
#[derive(Debug, Clone)]
pub struct DecodedAuthentication {
    pub credential_id: CredentialId,
    pub client_data_json: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
    pub user_handle: Option<UserHandle>,
}

impl AuthenticationResponse {
    pub fn decode(&self) -> Result<DecodedAuthentication, PasskeyError> {
        check_credential_type(&self.type_)?;
        let user_handle = match self.response.user_handle.as_deref() {
            None | Some("") => None,
            Some(encoded) => Some(UserHandle::from_base64url(encoded)?),
        };
        Ok(DecodedAuthentication {
            credential_id: CredentialId::from_base64url(&self.raw_id)?,
            client_data_json: base64url_decode(&self.response.client_data_json)?,
            authenticator_data: base64url_decode(&self.response.authenticator_data)?,
            signature: base64url_decode(&self.response.signature)?,
            user_handle,
        })
    }
}

fn check_credential_type(type_: &str) -> Result<(), PasskeyError> {
    if type_ != "public-key" {
        return Err(PasskeyError::MalformedInput(format!(
            "Credential type must be 'public-key', got '{type_}'"
        )));
    }
    Ok(())
}
