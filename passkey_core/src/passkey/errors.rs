use thiserror::Error;

use crate::passkey::storage::StorageError;
use crate::passkey::types::CeremonyType;
use crate::utils::UtilError;

/// Ceremony-state violations raised while consuming an issued challenge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    /// No challenge was issued under the presented identifier
    #[error("Challenge not found")]
    NotFound,

    /// The challenge was issued for the other ceremony
    #[error("Challenge was issued for {issued_for}")]
    WrongCeremony { issued_for: CeremonyType },

    /// The challenge outlived its time-to-live
    #[error("Challenge has expired")]
    Expired,

    /// The challenge already completed a ceremony
    #[error("Challenge has already been consumed")]
    AlreadyConsumed,

    /// The client signed over different challenge bytes
    #[error("Challenge mismatch")]
    Mismatch,
}

/// Errors that can occur during WebAuthn/Passkey ceremonies.
///
/// Every variant is terminal for the ceremony attempt that produced it; the core
/// never retries. The transport layer decides how each kind is rendered to the
/// end user.
#[derive(Debug, Error)]
pub enum PasskeyError {
    /// Unparseable binary or JSON input (truncated CBOR, bad lengths, bad base64)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Error with the ceremony challenge
    #[error("Invalid challenge: {0}")]
    Challenge(#[from] ChallengeError),

    /// Client data has the wrong ceremony type or is missing required members
    #[error("Invalid client data: {0}")]
    InvalidClientData(String),

    /// Client data origin is not the configured origin
    #[error("Invalid origin. Expected: {expected}, Got: {actual}")]
    OriginMismatch { expected: String, actual: String },

    /// Authenticator data was produced for a different RP ID
    #[error("RP ID hash mismatch")]
    RpIdMismatch,

    /// Registration response without attested credential data
    #[error("No attested credential data present")]
    MissingCredentialData,

    /// COSE algorithm or attestation format this core does not verify
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The attestation statement did not verify
    #[error("Attestation verification failed: {0}")]
    AttestationVerificationFailed(String),

    /// The assertion signature did not verify against the stored public key
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// The User Present flag was not set
    #[error("User not present")]
    UserNotPresent,

    /// Policy requires user verification but the UV flag was not set
    #[error("User verification required but flag not set")]
    UserVerificationRequired,

    /// Signature counter did not advance; the credential may have been cloned
    #[error("Possible credential cloning detected. Stored counter: {stored}, received: {received}")]
    PossibleCloneDetected { stored: u32, received: u32 },

    /// No credential is registered under the presented ID
    #[error("Unknown credential: {0}")]
    UnknownCredential(String),

    /// No user is registered under the presented name
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// The user handle is absent where required or names a different user
    #[error("User handle mismatch")]
    UserHandleMismatch,

    /// The credential ID is already registered, to this or another user
    #[error("Credential ID already registered")]
    CredentialIdConflict,

    /// Registration for a user name that belongs to an existing account
    #[error("User name already taken: {0}")]
    UserNameTaken(String),

    /// Error accessing or modifying stored state
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid relying-party configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Random source or encoder failure
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl From<UtilError> for PasskeyError {
    fn from(err: UtilError) -> Self {
        match err {
            UtilError::Format(msg) => Self::MalformedInput(msg),
            UtilError::Crypto(msg) => Self::Crypto(msg),
        }
    }
}

impl PasskeyError {
    /// Whether this failure signals a possible credential compromise that belongs
    /// on an operator/audit channel rather than only in the user-facing response.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            Self::PossibleCloneDetected { .. } | Self::CredentialIdConflict
        )
    }

    /// Log the error and return self
    ///
    /// Security events go to the `passkey_core::audit` target at error level;
    /// ordinary ceremony rejections are logged at warn level.
    pub fn log(self) -> Self {
        match &self {
            Self::PossibleCloneDetected { stored, received } => tracing::error!(
                target: "passkey_core::audit",
                stored,
                received,
                "Possible cloned authenticator detected"
            ),
            Self::CredentialIdConflict => tracing::error!(
                target: "passkey_core::audit",
                "Registration attempted for an already registered credential ID"
            ),
            Self::Storage(err) => tracing::error!("Storage error: {}", err),
            Self::Config(msg) => tracing::error!("Configuration error: {}", msg),
            Self::Crypto(msg) => tracing::error!("Crypto error: {}", msg),
            other => tracing::warn!("Ceremony rejected: {}", other),
        }
        self
    }
}
