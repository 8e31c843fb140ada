use ciborium::value::{Integer, Value as CborValue};
use ring::signature::{self, UnparsedPublicKey};
use serde::{Deserialize, Serialize};

use crate::passkey::errors::PasskeyError;

// COSE key map labels (RFC 9052 / RFC 9053)
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;
const LABEL_RSA_N: i64 = -1;
const LABEL_RSA_E: i64 = -2;

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

const CRV_P256: i64 = 1;
const CRV_ED25519: i64 = 6;

/// COSE algorithm identifiers this core verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoseAlgorithm {
    /// ECDSA w/ SHA-256 on P-256 (-7)
    Es256,
    /// EdDSA on Ed25519 (-8)
    EdDsa,
    /// RSASSA-PKCS1-v1_5 w/ SHA-256 (-257)
    Rs256,
}

impl CoseAlgorithm {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            -7 => Some(Self::Es256),
            -8 => Some(Self::EdDsa),
            -257 => Some(Self::Rs256),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::EdDsa => -8,
            Self::Rs256 => -257,
        }
    }
}

/// A credential public key decoded from its COSE encoding.
///
/// The variant fixes the verification algorithm; there is no negotiation at
/// verification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "alg", rename_all = "snake_case")]
pub enum PublicKey {
    Es256 { x: [u8; 32], y: [u8; 32] },
    EdDsa { x: [u8; 32] },
    Rs256 { n: Vec<u8>, e: Vec<u8> },
}

impl PublicKey {
    pub fn algorithm(&self) -> CoseAlgorithm {
        match self {
            Self::Es256 { .. } => CoseAlgorithm::Es256,
            Self::EdDsa { .. } => CoseAlgorithm::EdDsa,
            Self::Rs256 { .. } => CoseAlgorithm::Rs256,
        }
    }

    /// SEC1 uncompressed point (0x04 || x || y) for EC2 keys.
    pub(crate) fn sec1_uncompressed(&self) -> Option<Vec<u8>> {
        match self {
            Self::Es256 { x, y } => {
                let mut point = Vec::with_capacity(65);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                Some(point)
            }
            _ => None,
        }
    }
}

/// Decodes a standalone CBOR-encoded COSE key.
pub fn decode_cose_key(bytes: &[u8]) -> Result<PublicKey, PasskeyError> {
    let mut rest = bytes;
    let value: CborValue = ciborium::de::from_reader(&mut rest)
        .map_err(|e| PasskeyError::MalformedInput(format!("Invalid public key CBOR: {e}")))?;
    if !rest.is_empty() {
        return Err(PasskeyError::MalformedInput(format!(
            "{} trailing bytes after COSE key",
            rest.len()
        )));
    }
    public_key_from_cbor(&value)
}

/// Interprets an already-decoded CBOR value as a COSE key.
pub(crate) fn public_key_from_cbor(value: &CborValue) -> Result<PublicKey, PasskeyError> {
    let map = value
        .as_map()
        .ok_or_else(|| PasskeyError::MalformedInput("COSE key is not a CBOR map".to_string()))?;

    let kty = required_int(map, LABEL_KTY, "kty")?;
    let alg_id = required_int(map, LABEL_ALG, "alg")?;
    let alg = CoseAlgorithm::from_id(alg_id)
        .ok_or_else(|| PasskeyError::UnsupportedAlgorithm(format!("COSE algorithm {alg_id}")))?;

    tracing::debug!("COSE key kty={}, alg={:?}", kty, alg);

    match alg {
        CoseAlgorithm::Es256 => {
            expect_kty(kty, KTY_EC2, alg)?;
            let crv = required_int(map, LABEL_CRV, "crv")?;
            if crv != CRV_P256 {
                return Err(PasskeyError::MalformedInput(format!(
                    "ES256 key must use P-256, got curve {crv}"
                )));
            }
            Ok(PublicKey::Es256 {
                x: coordinate(map, LABEL_X, "x")?,
                y: coordinate(map, LABEL_Y, "y")?,
            })
        }
        CoseAlgorithm::EdDsa => {
            expect_kty(kty, KTY_OKP, alg)?;
            let crv = required_int(map, LABEL_CRV, "crv")?;
            if crv != CRV_ED25519 {
                return Err(PasskeyError::UnsupportedAlgorithm(format!(
                    "EdDSA curve {crv}"
                )));
            }
            Ok(PublicKey::EdDsa {
                x: coordinate(map, LABEL_X, "x")?,
            })
        }
        CoseAlgorithm::Rs256 => {
            expect_kty(kty, KTY_RSA, alg)?;
            let n = required_bytes(map, LABEL_RSA_N, "n")?;
            let e = required_bytes(map, LABEL_RSA_E, "e")?;
            if n.is_empty() || e.is_empty() {
                return Err(PasskeyError::MalformedInput(
                    "RSA modulus and exponent must not be empty".to_string(),
                ));
            }
            Ok(PublicKey::Rs256 {
                n: n.to_vec(),
                e: e.to_vec(),
            })
        }
    }
}

/// Encodes a public key back into its canonical COSE map.
pub fn encode_cose_key(key: &PublicKey) -> Result<Vec<u8>, PasskeyError> {
    let int = |v: i64| CborValue::Integer(Integer::from(v));
    let alg = int(key.algorithm().id());

    let entries = match key {
        PublicKey::Es256 { x, y } => vec![
            (int(LABEL_KTY), int(KTY_EC2)),
            (int(LABEL_ALG), alg),
            (int(LABEL_CRV), int(CRV_P256)),
            (int(LABEL_X), CborValue::Bytes(x.to_vec())),
            (int(LABEL_Y), CborValue::Bytes(y.to_vec())),
        ],
        PublicKey::EdDsa { x } => vec![
            (int(LABEL_KTY), int(KTY_OKP)),
            (int(LABEL_ALG), alg),
            (int(LABEL_CRV), int(CRV_ED25519)),
            (int(LABEL_X), CborValue::Bytes(x.to_vec())),
        ],
        PublicKey::Rs256 { n, e } => vec![
            (int(LABEL_KTY), int(KTY_RSA)),
            (int(LABEL_ALG), alg),
            (int(LABEL_RSA_N), CborValue::Bytes(n.clone())),
            (int(LABEL_RSA_E), CborValue::Bytes(e.clone())),
        ],
    };

    let mut out = Vec::new();
    ciborium::ser::into_writer(&CborValue::Map(entries), &mut out)
        .map_err(|e| PasskeyError::Crypto(format!("Failed to encode COSE key: {e}")))?;
    Ok(out)
}

/// Verifies `signature` over `message` with the algorithm the key declares.
///
/// ES256 signatures are ASN.1 DER encoded, as WebAuthn authenticators emit them.
pub fn verify_signature(key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    let result = match key {
        PublicKey::Es256 { .. } => match key.sec1_uncompressed() {
            Some(point) => UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, point)
                .verify(message, signature),
            None => return false,
        },
        PublicKey::EdDsa { x } => {
            UnparsedPublicKey::new(&signature::ED25519, x).verify(message, signature)
        }
        PublicKey::Rs256 { n, e } => signature::RsaPublicKeyComponents {
            n: n.as_slice(),
            e: e.as_slice(),
        }
        .verify(&signature::RSA_PKCS1_2048_8192_SHA256, message, signature),
    };

    if result.is_err() {
        tracing::debug!(
            "Signature verification failed for {:?} key",
            key.algorithm()
        );
    }
    result.is_ok()
}

/// Looks up a label in a COSE map, rejecting duplicated labels.
fn lookup<'a>(
    map: &'a [(CborValue, CborValue)],
    label: i64,
) -> Result<Option<&'a CborValue>, PasskeyError> {
    let mut found = None;
    for (key, value) in map {
        let matches = match key {
            CborValue::Integer(i) => i64::try_from(*i).ok() == Some(label),
            _ => false,
        };
        if matches {
            if found.is_some() {
                return Err(PasskeyError::MalformedInput(format!(
                    "Duplicate COSE key label {label}"
                )));
            }
            found = Some(value);
        }
    }
    Ok(found)
}

fn required_int(
    map: &[(CborValue, CborValue)],
    label: i64,
    name: &str,
) -> Result<i64, PasskeyError> {
    match lookup(map, label)? {
        Some(CborValue::Integer(i)) => i64::try_from(*i).map_err(|_| {
            PasskeyError::MalformedInput(format!("COSE {name} is out of range"))
        }),
        Some(_) => Err(PasskeyError::MalformedInput(format!(
            "COSE {name} is not an integer"
        ))),
        None => Err(PasskeyError::MalformedInput(format!(
            "COSE key is missing {name}"
        ))),
    }
}

fn required_bytes<'a>(
    map: &'a [(CborValue, CborValue)],
    label: i64,
    name: &str,
) -> Result<&'a [u8], PasskeyError> {
    match lookup(map, label)? {
        Some(CborValue::Bytes(b)) => Ok(b.as_slice()),
        Some(_) => Err(PasskeyError::MalformedInput(format!(
            "COSE {name} is not a byte string"
        ))),
        None => Err(PasskeyError::MalformedInput(format!(
            "COSE key is missing {name}"
        ))),
    }
}

fn coordinate(
    map: &[(CborValue, CborValue)],
    label: i64,
    name: &str,
) -> Result<[u8; 32], PasskeyError> {
    let bytes = required_bytes(map, label, name)?;
    bytes.try_into().map_err(|_| {
        PasskeyError::MalformedInput(format!(
            "COSE {name} must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}

fn expect_kty(kty: i64, expected: i64, alg: CoseAlgorithm) -> Result<(), PasskeyError> {
    if kty != expected {
        return Err(PasskeyError::MalformedInput(format!(
            "Key type {kty} does not match algorithm {:?}",
            alg
        )));
    }
    Ok(())
}
