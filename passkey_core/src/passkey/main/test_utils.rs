//! In-process software authenticator for unit tests.

use ciborium::value::Value as CborValue;
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, Ed25519KeyPair, KeyPair};

use super::codec::{PublicKey, encode_cose_key};
pub(crate) use super::codec::flags;
use crate::passkey::types::CredentialId;
use crate::utils::{base64url_encode, sha256};

pub(crate) const RP_ID: &str = "example.com";
pub(crate) const ORIGIN: &str = "https://example.com";

/// Attestation certificate vectors, all issued for `ATTESTATION_KEY_PKCS8`.
pub(crate) mod certs {
    pub(crate) const ATTESTATION_KEY_PKCS8: &[u8] =
        include_bytes!("attestation/testdata/attestation_key.pk8");
    /// Packed profile, AAGUID extension `5a` x 16, valid 2020..2049
    pub(crate) const PACKED_LEAF: &[u8] = include_bytes!("attestation/testdata/packed_leaf.der");
    /// As `PACKED_LEAF` but valid only during 2015
    pub(crate) const EXPIRED_LEAF: &[u8] = include_bytes!("attestation/testdata/expired_leaf.der");
    /// As `PACKED_LEAF` but with BasicConstraints CA:TRUE
    pub(crate) const CA_LEAF: &[u8] = include_bytes!("attestation/testdata/ca_leaf.der");
    /// No OU, no AAGUID extension
    pub(crate) const U2F_LEAF: &[u8] = include_bytes!("attestation/testdata/u2f_leaf.der");
}

enum SoftKey {
    Es256(EcdsaKeyPair),
    EdDsa(Ed25519KeyPair),
}

pub(crate) struct SoftAuthenticator {
    key: SoftKey,
    rng: SystemRandom,
    pub credential_id: Vec<u8>,
    pub aaguid: [u8; 16],
}

impl SoftAuthenticator {
    /// ES256 authenticator
    pub(crate) fn new() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 =
            EcdsaKeyPair::generate_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
                .unwrap();
        let key_pair = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            pkcs8.as_ref(),
            &rng,
        )
        .unwrap();
        Self {
            key: SoftKey::Es256(key_pair),
            rng,
            credential_id: crate::utils::gen_random_bytes(16).unwrap(),
            aaguid: [0x5a; 16],
        }
    }

    pub(crate) fn new_ed25519() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        Self {
            key: SoftKey::EdDsa(key_pair),
            rng,
            credential_id: crate::utils::gen_random_bytes(16).unwrap(),
            aaguid: [0x5b; 16],
        }
    }

    pub(crate) fn credential_id(&self) -> CredentialId {
        CredentialId::new(self.credential_id.clone()).unwrap()
    }

    pub(crate) fn public_key(&self) -> PublicKey {
        match &self.key {
            SoftKey::Es256(kp) => {
                let point = kp.public_key().as_ref();
                let mut x = [0u8; 32];
                let mut y = [0u8; 32];
                x.copy_from_slice(&point[1..33]);
                y.copy_from_slice(&point[33..65]);
                PublicKey::Es256 { x, y }
            }
            SoftKey::EdDsa(kp) => {
                let mut x = [0u8; 32];
                x.copy_from_slice(kp.public_key().as_ref());
                PublicKey::EdDsa { x }
            }
        }
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Vec<u8> {
        match &self.key {
            SoftKey::Es256(kp) => kp.sign(&self.rng, message).unwrap().as_ref().to_vec(),
            SoftKey::EdDsa(kp) => kp.sign(message).as_ref().to_vec(),
        }
    }

    /// Authenticator data; attested credential data is appended when `AT` is
    /// set in `flag_byte`.
    pub(crate) fn authenticator_data(&self, rp_id: &str, flag_byte: u8, counter: u32) -> Vec<u8> {
        let mut data = sha256(rp_id.as_bytes()).to_vec();
        data.push(flag_byte);
        data.extend_from_slice(&counter.to_be_bytes());
        if flag_byte & flags::AT != 0 {
            data.extend_from_slice(&self.aaguid);
            data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
            data.extend_from_slice(&self.credential_id);
            data.extend_from_slice(&encode_cose_key(&self.public_key()).unwrap());
        }
        data
    }

    /// Registration response with "none" attestation.
    pub(crate) fn register(&self, challenge: &[u8], origin: &str) -> (Vec<u8>, Vec<u8>) {
        let client_data = client_data_json("webauthn.create", challenge, origin);
        let auth_data =
            self.authenticator_data(RP_ID, flags::UP | flags::UV | flags::AT, 0);
        (client_data, attestation_object("none", auth_data, vec![]))
    }

    /// Registration response with "packed" self attestation.
    pub(crate) fn register_self_attested(
        &self,
        challenge: &[u8],
        origin: &str,
    ) -> (Vec<u8>, Vec<u8>) {
        let client_data = client_data_json("webauthn.create", challenge, origin);
        let auth_data =
            self.authenticator_data(RP_ID, flags::UP | flags::UV | flags::AT, 0);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&sha256(&client_data));
        let att_stmt = vec![
            (
                CborValue::Text("alg".to_string()),
                CborValue::Integer(self.public_key().algorithm().id().into()),
            ),
            (
                CborValue::Text("sig".to_string()),
                CborValue::Bytes(self.sign(&signed)),
            ),
        ];
        (client_data, attestation_object("packed", auth_data, att_stmt))
    }

    /// Registration response with "packed" basic attestation signed by the
    /// key behind `cert`.
    pub(crate) fn register_packed_basic(
        &self,
        challenge: &[u8],
        origin: &str,
        cert: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        let client_data = client_data_json("webauthn.create", challenge, origin);
        let auth_data =
            self.authenticator_data(RP_ID, flags::UP | flags::UV | flags::AT, 0);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&sha256(&client_data));
        let att_stmt = vec![
            (
                CborValue::Text("alg".to_string()),
                CborValue::Integer((-7).into()),
            ),
            (
                CborValue::Text("sig".to_string()),
                CborValue::Bytes(attestation_sign(&signed)),
            ),
            (
                CborValue::Text("x5c".to_string()),
                CborValue::Array(vec![CborValue::Bytes(cert.to_vec())]),
            ),
        ];
        (client_data, attestation_object("packed", auth_data, att_stmt))
    }

    /// Registration response with "fido-u2f" attestation signed by the key
    /// behind `cert`. Only valid for ES256 authenticators.
    pub(crate) fn register_fido_u2f(
        &self,
        challenge: &[u8],
        origin: &str,
        cert: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        let client_data = client_data_json("webauthn.create", challenge, origin);
        let auth_data = self.authenticator_data(RP_ID, flags::UP | flags::AT, 0);
        let PublicKey::Es256 { x, y } = self.public_key() else {
            panic!("fido-u2f needs an ES256 authenticator");
        };
        let mut signed = vec![0x00];
        signed.extend_from_slice(&sha256(RP_ID.as_bytes()));
        signed.extend_from_slice(&sha256(&client_data));
        signed.extend_from_slice(&self.credential_id);
        signed.push(0x04);
        signed.extend_from_slice(&x);
        signed.extend_from_slice(&y);
        let att_stmt = vec![
            (
                CborValue::Text("sig".to_string()),
                CborValue::Bytes(attestation_sign(&signed)),
            ),
            (
                CborValue::Text("x5c".to_string()),
                CborValue::Array(vec![CborValue::Bytes(cert.to_vec())]),
            ),
        ];
        (client_data, attestation_object("fido-u2f", auth_data, att_stmt))
    }

    /// Assertion response: (clientDataJSON, authenticatorData, signature).
    pub(crate) fn assert(
        &self,
        challenge: &[u8],
        origin: &str,
        counter: u32,
    ) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let client_data = client_data_json("webauthn.get", challenge, origin);
        let auth_data = self.authenticator_data(RP_ID, flags::UP | flags::UV, counter);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&sha256(&client_data));
        let sig = self.sign(&signed);
        (client_data, auth_data, sig)
    }
}

/// Signs with the private key of the `certs` vectors.
pub(crate) fn attestation_sign(message: &[u8]) -> Vec<u8> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(
        &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
        certs::ATTESTATION_KEY_PKCS8,
        &rng,
    )
    .unwrap();
    key_pair.sign(&rng, message).unwrap().as_ref().to_vec()
}

pub(crate) fn client_data_json(type_: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    serde_json::json!({
        "type": type_,
        "challenge": base64url_encode(challenge),
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

pub(crate) fn attestation_object(
    fmt: &str,
    auth_data: Vec<u8>,
    att_stmt: Vec<(CborValue, CborValue)>,
) -> Vec<u8> {
    let map = CborValue::Map(vec![
        (
            CborValue::Text("fmt".to_string()),
            CborValue::Text(fmt.to_string()),
        ),
        (
            CborValue::Text("attStmt".to_string()),
            CborValue::Map(att_stmt),
        ),
        (
            CborValue::Text("authData".to_string()),
            CborValue::Bytes(auth_data),
        ),
    ]);
    let mut out = Vec::new();
    ciborium::ser::into_writer(&map, &mut out).unwrap();
    out
}
