//! passkey_core - FIDO2/WebAuthn relying-party core
//!
//! This crate issues WebAuthn challenges, verifies registration (attestation)
//! and authentication (assertion) responses, and keeps credential records
//! behind pluggable storage traits. It does not speak HTTP; a transport layer
//! feeds it the browser's JSON and renders its options and errors.

mod config;
mod coordination;
mod passkey;
mod utils;

pub use config::{
    AttestationConveyance, AuthenticatorAttachment, PasskeyConfig, RelyingPartyConfig,
    ResidentKeyRequirement, UserVerificationRequirement,
};

pub use coordination::PasskeyCoordinator;

pub use passkey::{
    AssertionResponse, AttestationFormat, AttestationFormats, AttestationInput, AttestationObject,
    AttestationResponse, AttestationTrust, AttestedCredentialData, AuthenticationOptions,
    AuthenticationResponse, AuthenticatorData, AuthenticatorSelection, CeremonyType,
    ChallengeError, ChallengeId, ChallengeManager, ChallengeState, ChallengeStore, Clock,
    CoseAlgorithm, CredentialDescriptor, CredentialId, CredentialRecord, CredentialStore,
    DecodedAuthentication, DecodedRegistration, InMemoryStore, MAX_CREDENTIAL_ID_LEN,
    MAX_USER_HANDLE_LEN, PasskeyError, PubKeyCredParam, PublicKey, PublicKeyCredentialUserEntity,
    RegistrationOptions, RegistrationResponse, RelyingParty, StorageError, UserHandle,
    UserIdentity, UserStore, decode_attestation_object, decode_cose_key, encode_cose_key,
    parse_authenticator_data, verify_signature,
};
