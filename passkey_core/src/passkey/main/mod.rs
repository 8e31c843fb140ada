mod attestation;
mod auth;
mod challenge;
mod codec;
mod context;
mod register;
mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use attestation::{AttestationFormat, AttestationFormats, AttestationInput};
pub use challenge::ChallengeManager;
pub use codec::{
    AttestationObject, AttestedCredentialData, AuthenticatorData, CoseAlgorithm, PublicKey,
    decode_attestation_object, decode_cose_key, encode_cose_key, parse_authenticator_data,
    verify_signature,
};
pub use context::Clock;
pub use types::{
    AssertionResponse, AttestationResponse, AuthenticationOptions, AuthenticationResponse,
    AuthenticatorSelection, CredentialDescriptor, DecodedAuthentication, DecodedRegistration,
    PubKeyCredParam, PublicKeyCredentialUserEntity, RegistrationOptions, RegistrationResponse,
    RelyingParty,
};

pub(crate) use auth::{finish_authentication, start_authentication};
pub(crate) use context::{CeremonyContext, system_clock};
pub(crate) use register::{finish_registration, start_add_credential, start_registration};
