use ciborium::value::Value as CborValue;

use crate::passkey::errors::PasskeyError;

/// Decoded attestation object. `auth_data` stays raw: attestation signatures
/// cover the exact bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    pub fmt: String,
    pub auth_data: Vec<u8>,
    pub att_stmt: Vec<(CborValue, CborValue)>,
}

/// Decodes the CBOR map `{ "fmt": text, "authData": bytes, "attStmt": map }`.
///
/// Unknown keys are ignored; missing, duplicated or mistyped required keys and
/// trailing bytes are rejected.
pub fn decode_attestation_object(bytes: &[u8]) -> Result<AttestationObject, PasskeyError> {
    let mut rest = bytes;
    let value: CborValue = ciborium::de::from_reader(&mut rest)
        .map_err(|e| PasskeyError::MalformedInput(format!("Invalid CBOR data: {e}")))?;
    if !rest.is_empty() {
        return Err(PasskeyError::MalformedInput(format!(
            "{} trailing bytes after attestation object",
            rest.len()
        )));
    }

    let CborValue::Map(map) = value else {
        return Err(PasskeyError::MalformedInput(
            "Attestation object is not a CBOR map".to_string(),
        ));
    };

    let mut fmt = None;
    let mut auth_data = None;
    let mut att_stmt = None;

    for (key, value) in map {
        let CborValue::Text(key) = key else {
            continue;
        };
        match key.as_str() {
            "fmt" => match value {
                CborValue::Text(f) => set_once(&mut fmt, f, "fmt")?,
                _ => return Err(wrong_type("fmt", "text")),
            },
            "authData" => match value {
                CborValue::Bytes(d) => set_once(&mut auth_data, d, "authData")?,
                _ => return Err(wrong_type("authData", "a byte string")),
            },
            "attStmt" => match value {
                CborValue::Map(s) => set_once(&mut att_stmt, s, "attStmt")?,
                _ => return Err(wrong_type("attStmt", "a map")),
            },
            _ => {}
        }
    }

    tracing::debug!(
        "Attestation format: {:?}, auth data length: {:?}",
        fmt,
        auth_data.as_ref().map(Vec::len)
    );

    match (fmt, auth_data, att_stmt) {
        (Some(fmt), Some(auth_data), Some(att_stmt)) => Ok(AttestationObject {
            fmt,
            auth_data,
            att_stmt,
        }),
        _ => Err(PasskeyError::MalformedInput(
            "Missing required attestation data".to_string(),
        )),
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, key: &str) -> Result<(), PasskeyError> {
    if slot.is_some() {
        return Err(PasskeyError::MalformedInput(format!(
            "Duplicate '{key}' in attestation object"
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn wrong_type(key: &str, expected: &str) -> PasskeyError {
    PasskeyError::MalformedInput(format!("Attestation '{key}' must be {expected}"))
}
