mod errors;
mod main;
mod storage;
mod types;

pub use errors::{ChallengeError, PasskeyError};

pub use main::{
    AssertionResponse, AttestationFormat, AttestationFormats, AttestationInput, AttestationObject,
    AttestationResponse, AttestedCredentialData, AuthenticationOptions, AuthenticationResponse,
    AuthenticatorData, AuthenticatorSelection, ChallengeManager, Clock, CoseAlgorithm,
    CredentialDescriptor, DecodedAuthentication, DecodedRegistration, PubKeyCredParam, PublicKey,
    PublicKeyCredentialUserEntity, RegistrationOptions, RegistrationResponse, RelyingParty,
    decode_attestation_object, decode_cose_key, encode_cose_key, parse_authenticator_data,
    verify_signature,
};

pub use storage::{ChallengeStore, CredentialStore, InMemoryStore, StorageError, UserStore};

pub use types::{
    AttestationTrust, CeremonyType, ChallengeId, ChallengeState, CredentialId, CredentialRecord,
    MAX_CREDENTIAL_ID_LEN, MAX_USER_HANDLE_LEN, UserHandle, UserIdentity,
};

#[cfg(test)]
pub(crate) use main::test_utils as main_test_utils;

pub(crate) use main::{
    CeremonyContext, finish_authentication, finish_registration, start_add_credential,
    start_authentication, start_registration, system_clock,
};
