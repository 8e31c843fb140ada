use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::errors::PasskeyError;
use super::main::PublicKey;
use crate::config::UserVerificationRequirement;
use crate::utils::{base64url_decode, base64url_encode, gen_random_bytes};

/// Maximum length of a WebAuthn user handle.
pub const MAX_USER_HANDLE_LEN: usize = 64;

/// Maximum length of a credential ID accepted from authenticator data.
pub const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// Byte-string identifiers travel as unpadded base64url wherever they are
/// serialized, matching what browsers hand to the transport layer.
macro_rules! base64url_bytes {
    ($name:ident) => {
        impl $name {
            /// Returns the raw bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Returns the unpadded base64url encoding.
            pub fn to_base64url(&self) -> String {
                base64url_encode(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_base64url())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_base64url())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                $name::from_base64url(&encoded).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Opaque, server-generated WebAuthn user handle (1..=64 bytes).
///
/// Never reused across users; it is the stable key that ties credentials to the
/// user that registered them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserHandle(Vec<u8>);

impl UserHandle {
    pub fn new(bytes: Vec<u8>) -> Result<Self, PasskeyError> {
        if bytes.is_empty() || bytes.len() > MAX_USER_HANDLE_LEN {
            return Err(PasskeyError::MalformedInput(format!(
                "User handle must be 1..={MAX_USER_HANDLE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn from_base64url(encoded: &str) -> Result<Self, PasskeyError> {
        Self::new(base64url_decode(encoded)?)
    }

    /// Generates a fresh 32-byte handle from the system random source.
    pub(crate) fn generate() -> Result<Self, PasskeyError> {
        Ok(Self(gen_random_bytes(32)?))
    }
}

base64url_bytes!(UserHandle);

/// Credential ID as chosen by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    pub fn new(bytes: Vec<u8>) -> Result<Self, PasskeyError> {
        if bytes.is_empty() || bytes.len() > MAX_CREDENTIAL_ID_LEN {
            return Err(PasskeyError::MalformedInput(format!(
                "Credential ID must be 1..={MAX_CREDENTIAL_ID_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn from_base64url(encoded: &str) -> Result<Self, PasskeyError> {
        Self::new(base64url_decode(encoded)?)
    }
}

base64url_bytes!(CredentialId);

/// Opaque identifier under which a [`ChallengeState`] is kept between the two
/// round trips of a ceremony. The transport layer binds it to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(String);

impl ChallengeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn generate() -> Result<Self, PasskeyError> {
        Ok(Self(base64url_encode(gen_random_bytes(16)?)))
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CeremonyType {
    Registration,
    Authentication,
}

impl CeremonyType {
    /// The `type` member the browser writes into clientDataJSON.
    pub fn client_data_type(self) -> &'static str {
        match self {
            Self::Registration => "webauthn.create",
            Self::Authentication => "webauthn.get",
        }
    }
}

impl fmt::Display for CeremonyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => f.write_str("registration"),
            Self::Authentication => f.write_str("authentication"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub handle: UserHandle,
    pub name: String,
    pub display_name: String,
}

/// How much the relying party learned about the authenticator at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationTrust {
    /// "none" attestation: the public key is self-asserted and unverified
    None,
    /// Statement signed by the credential key itself
    SelfAttestation,
    /// Statement signed by an attestation certificate; the chain is not
    /// anchored to a trust root by this core
    Basic,
}

/// Stored credential information for a WebAuthn/Passkey.
///
/// Created on successful registration. `sign_count` and `last_used_at` change
/// on every successful authentication; nothing else does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub credential_id: CredentialId,
    pub public_key: PublicKey,
    pub sign_count: u32,
    pub transports: Vec<String>,
    /// Back-reference to the owning [`UserIdentity`]
    pub owner_handle: UserHandle,
    pub aaguid: Uuid,
    pub attestation_format: String,
    pub trust: AttestationTrust,
    pub user_verified: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Server-side state of one issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeState {
    pub id: ChallengeId,
    pub challenge: Vec<u8>,
    pub ceremony_type: CeremonyType,
    /// User the challenge is bound to; `None` for usernameless authentication
    pub subject_handle: Option<UserHandle>,
    /// Identity being registered; only set for registration ceremonies
    pub user: Option<UserIdentity>,
    /// Policy in force when the challenge was issued
    pub user_verification: UserVerificationRequirement,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl ChallengeState {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
