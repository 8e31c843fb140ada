//! Binary structures exchanged with authenticators: the CBOR attestation
//! object, authenticator data and COSE public keys.

mod attestation_object;
mod authenticator_data;
mod cose;

pub use attestation_object::{AttestationObject, decode_attestation_object};
pub use authenticator_data::{AttestedCredentialData, AuthenticatorData, parse_authenticator_data};
pub use cose::{CoseAlgorithm, PublicKey, decode_cose_key, encode_cose_key, verify_signature};

pub(crate) use authenticator_data::flags;
