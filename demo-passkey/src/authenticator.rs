//! Minimal ES256 platform authenticator used to drive the demo ceremonies.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ciborium::value::{Integer, Value};
use ring::digest::{SHA256, digest};
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};

const FLAG_UP: u8 = 0x01;
const FLAG_UV: u8 = 0x04;
const FLAG_AT: u8 = 0x40;

pub(crate) type DemoError = Box<dyn std::error::Error>;

pub(crate) struct Assertion {
    pub client_data_json: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
}

pub(crate) struct SoftAuthenticator {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
    credential_id: Vec<u8>,
    rp_id: String,
    origin: String,
    counter: u32,
}

impl SoftAuthenticator {
    pub(crate) fn new(rp_id: &str, origin: &str) -> Result<Self, DemoError> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|_| "key generation failed")?;
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|_| "key parsing failed")?;
        let mut credential_id = vec![0u8; 16];
        rng.fill(&mut credential_id)
            .map_err(|_| "random credential id failed")?;
        Ok(Self {
            key_pair,
            rng,
            credential_id,
            rp_id: rp_id.to_string(),
            origin: origin.to_string(),
            counter: 0,
        })
    }

    pub(crate) fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    fn client_data(&self, type_: &str, challenge: &str) -> Vec<u8> {
        serde_json::json!({
            "type": type_,
            "challenge": challenge,
            "origin": self.origin,
        })
        .to_string()
        .into_bytes()
    }

    fn cose_key(&self) -> Result<Vec<u8>, DemoError> {
        let point = self.key_pair.public_key().as_ref();
        let int = |v: i64| Value::Integer(Integer::from(v));
        let key = Value::Map(vec![
            (int(1), int(2)),
            (int(3), int(-7)),
            (int(-1), int(1)),
            (int(-2), Value::Bytes(point[1..33].to_vec())),
            (int(-3), Value::Bytes(point[33..65].to_vec())),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&key, &mut out)?;
        Ok(out)
    }

    fn authenticator_data(&self, flags: u8) -> Result<Vec<u8>, DemoError> {
        let mut data = digest(&SHA256, self.rp_id.as_bytes()).as_ref().to_vec();
        data.push(flags);
        data.extend_from_slice(&self.counter.to_be_bytes());
        if flags & FLAG_AT != 0 {
            data.extend_from_slice(&[0u8; 16]);
            data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
            data.extend_from_slice(&self.credential_id);
            data.extend_from_slice(&self.cose_key()?);
        }
        Ok(data)
    }

    /// Creates the credential; returns (clientDataJSON, attestationObject).
    pub(crate) fn make_credential(&self, challenge: &str) -> Result<(Vec<u8>, Vec<u8>), DemoError> {
        let client_data = self.client_data("webauthn.create", challenge);
        let auth_data = self.authenticator_data(FLAG_UP | FLAG_UV | FLAG_AT)?;
        let object = Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(vec![])),
            (Value::Text("authData".into()), Value::Bytes(auth_data)),
        ]);
        let mut attestation_object = Vec::new();
        ciborium::ser::into_writer(&object, &mut attestation_object)?;
        Ok((client_data, attestation_object))
    }

    /// Signs an assertion, advancing the signature counter.
    pub(crate) fn get_assertion(&mut self, challenge: &str) -> Result<Assertion, DemoError> {
        self.counter += 1;
        let client_data_json = self.client_data("webauthn.get", challenge);
        let authenticator_data = self.authenticator_data(FLAG_UP | FLAG_UV)?;
        let mut message = authenticator_data.clone();
        message.extend_from_slice(digest(&SHA256, &client_data_json).as_ref());
        let signature = self
            .key_pair
            .sign(&self.rng, &message)
            .map_err(|_| "signing failed")?
            .as_ref()
            .to_vec();
        Ok(Assertion {
            client_data_json,
            authenticator_data,
            signature,
        })
    }
}

pub(crate) fn b64(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}
