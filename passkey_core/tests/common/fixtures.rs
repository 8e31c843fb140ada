use base64::{Engine as _, engine::general_purpose};
use ciborium::value::{Integer, Value as CborValue};
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, KeyPair};
use serde_json::json;

use passkey_core::{CredentialId, RegistrationResponse};

pub const RP_ID: &str = "example.com";
pub const ORIGIN: &str = "https://example.com";
pub const EVIL_ORIGIN: &str = "https://evil.example";

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
pub const FLAG_AT: u8 = 0x40;

pub fn b64(data: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(data)
}

pub fn unb64(data: &str) -> Vec<u8> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(data)
        .expect("valid base64url")
}

fn sha256(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, data).as_ref().to_vec()
}

pub fn client_data_json(type_: &str, challenge: &str, origin: &str) -> Vec<u8> {
    json!({
        "type": type_,
        "challenge": challenge,
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

/// Raw bytes of one assertion
pub struct Assertion {
    pub client_data_json: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
}

/// ES256 software authenticator bound to one credential
pub struct SoftAuthenticator {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
    credential_id: Vec<u8>,
    rp_id: String,
}

impl SoftAuthenticator {
    pub fn new() -> Self {
        Self::for_rp(RP_ID)
    }

    /// Authenticator that scopes its credential to `rp_id`
    pub fn for_rp(rp_id: &str) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 =
            EcdsaKeyPair::generate_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
                .expect("key generation");
        let key_pair = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
            pkcs8.as_ref(),
            &rng,
        )
        .expect("key parsing");
        let mut credential_id = vec![0u8; 16];
        ring::rand::SecureRandom::fill(&rng, &mut credential_id).expect("random credential id");

        Self {
            key_pair,
            rng,
            credential_id,
            rp_id: rp_id.to_string(),
        }
    }

    pub fn credential_id(&self) -> CredentialId {
        CredentialId::new(self.credential_id.clone()).expect("valid credential id")
    }

    fn cose_public_key(&self) -> Vec<u8> {
        let point = self.key_pair.public_key().as_ref();
        let key = CborValue::Map(vec![
            (
                CborValue::Integer(Integer::from(1)),
                CborValue::Integer(Integer::from(2)),
            ),
            (
                CborValue::Integer(Integer::from(3)),
                CborValue::Integer(Integer::from(-7)),
            ),
            (
                CborValue::Integer(Integer::from(-1)),
                CborValue::Integer(Integer::from(1)),
            ),
            (
                CborValue::Integer(Integer::from(-2)),
                CborValue::Bytes(point[1..33].to_vec()),
            ),
            (
                CborValue::Integer(Integer::from(-3)),
                CborValue::Bytes(point[33..65].to_vec()),
            ),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&key, &mut out).expect("COSE key encoding");
        out
    }

    fn authenticator_data(&self, flags: u8, counter: u32) -> Vec<u8> {
        let mut data = sha256(self.rp_id.as_bytes());
        data.push(flags);
        data.extend_from_slice(&counter.to_be_bytes());
        if flags & FLAG_AT != 0 {
            data.extend_from_slice(&[0u8; 16]);
            data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
            data.extend_from_slice(&self.credential_id);
            data.extend_from_slice(&self.cose_public_key());
        }
        data
    }

    fn sign(&self, authenticator_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
        let mut message = authenticator_data.to_vec();
        message.extend_from_slice(&sha256(client_data_json));
        self.key_pair
            .sign(&self.rng, &message)
            .expect("signing")
            .as_ref()
            .to_vec()
    }

    /// Raw (clientDataJSON, attestationObject) for a "none" attestation
    pub fn attest(&self, challenge: &str, origin: &str) -> (Vec<u8>, Vec<u8>) {
        let client_data = client_data_json("webauthn.create", challenge, origin);
        let auth_data = self.authenticator_data(FLAG_UP | FLAG_UV | FLAG_AT, 0);
        let object = CborValue::Map(vec![
            (
                CborValue::Text("fmt".to_string()),
                CborValue::Text("none".to_string()),
            ),
            (
                CborValue::Text("attStmt".to_string()),
                CborValue::Map(vec![]),
            ),
            (
                CborValue::Text("authData".to_string()),
                CborValue::Bytes(auth_data),
            ),
        ]);
        let mut attestation_object = Vec::new();
        ciborium::ser::into_writer(&object, &mut attestation_object)
            .expect("attestation object encoding");
        (client_data, attestation_object)
    }

    /// Registration response as a browser would serialize it
    pub fn registration_response(&self, challenge: &str, origin: &str) -> RegistrationResponse {
        let (client_data, attestation_object) = self.attest(challenge, origin);
        serde_json::from_value(json!({
            "id": b64(&self.credential_id),
            "rawId": b64(&self.credential_id),
            "type": "public-key",
            "response": {
                "clientDataJSON": b64(&client_data),
                "attestationObject": b64(&attestation_object),
                "transports": ["internal"],
            }
        }))
        .expect("registration response")
    }

    pub fn assert(&self, challenge: &str, origin: &str, counter: u32) -> Assertion {
        let client_data = client_data_json("webauthn.get", challenge, origin);
        let authenticator_data = self.authenticator_data(FLAG_UP | FLAG_UV, counter);
        let signature = self.sign(&authenticator_data, &client_data);
        Assertion {
            client_data_json: client_data,
            authenticator_data,
            signature,
        }
    }
}
