use ciborium::value::Value as CborValue;
use uuid::Uuid;

use super::cose::{PublicKey, public_key_from_cbor};
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{CredentialId, MAX_CREDENTIAL_ID_LEN};

/// Authenticator data flags (WebAuthn §6.1)
pub(crate) mod flags {
    /// User Present (UP) - Bit 0
    pub const UP: u8 = 1 << 0;
    /// User Verified (UV) - Bit 2
    pub const UV: u8 = 1 << 2;
    /// Backup Eligibility (BE) - Bit 3
    pub const BE: u8 = 1 << 3;
    /// Backup State (BS) - Bit 4
    pub const BS: u8 = 1 << 4;
    /// Attested Credential Data Present - Bit 6
    pub const AT: u8 = 1 << 6;
    /// Extension Data Present - Bit 7
    pub const ED: u8 = 1 << 7;
}

const RP_ID_HASH_LEN: usize = 32;
const FIXED_HEADER_LEN: usize = RP_ID_HASH_LEN + 1 + 4;
const AAGUID_LEN: usize = 16;

/// Credential data the authenticator attaches at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: Uuid,
    pub credential_id: CredentialId,
    pub public_key: PublicKey,
    /// The COSE key exactly as the authenticator encoded it
    pub public_key_cbor: Vec<u8>,
}

/// Parsed authenticator data.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: Option<CborValue>,
}

impl AuthenticatorData {
    pub fn is_user_present(&self) -> bool {
        (self.flags & flags::UP) != 0
    }

    pub fn is_user_verified(&self) -> bool {
        (self.flags & flags::UV) != 0
    }

    pub fn is_backup_eligible(&self) -> bool {
        (self.flags & flags::BE) != 0
    }

    pub fn is_backed_up(&self) -> bool {
        (self.flags & flags::BS) != 0
    }

    pub fn has_attested_credential_data(&self) -> bool {
        (self.flags & flags::AT) != 0
    }

    pub fn has_extension_data(&self) -> bool {
        (self.flags & flags::ED) != 0
    }
}

/// Parses the fixed-layout authenticator data structure.
///
/// Every byte must be accounted for: the 37-byte header, attested credential
/// data when AT is set, and one CBOR extensions map when ED is set.
pub fn parse_authenticator_data(data: &[u8]) -> Result<AuthenticatorData, PasskeyError> {
    if data.len() < FIXED_HEADER_LEN {
        return Err(PasskeyError::MalformedInput(format!(
            "Authenticator data too short: {} bytes, need at least {FIXED_HEADER_LEN}",
            data.len()
        )));
    }

    let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
    rp_id_hash.copy_from_slice(&data[..RP_ID_HASH_LEN]);
    let flag_byte = data[RP_ID_HASH_LEN];
    let sign_count = u32::from_be_bytes([data[33], data[34], data[35], data[36]]);

    tracing::debug!(
        "Authenticator data flags: {:#04x}, sign count: {}",
        flag_byte,
        sign_count
    );

    let mut rest = &data[FIXED_HEADER_LEN..];

    let attested_credential_data = if flag_byte & flags::AT != 0 {
        Some(parse_attested_credential_data(&mut rest)?)
    } else {
        None
    };

    let extensions = if flag_byte & flags::ED != 0 {
        let value: CborValue = ciborium::de::from_reader(&mut rest).map_err(|e| {
            PasskeyError::MalformedInput(format!("Invalid extensions CBOR: {e}"))
        })?;
        if !matches!(value, CborValue::Map(_)) {
            return Err(PasskeyError::MalformedInput(
                "Extensions must be a CBOR map".to_string(),
            ));
        }
        Some(value)
    } else {
        None
    };

    if !rest.is_empty() {
        return Err(PasskeyError::MalformedInput(format!(
            "{} unexplained trailing bytes in authenticator data",
            rest.len()
        )));
    }

    Ok(AuthenticatorData {
        rp_id_hash,
        flags: flag_byte,
        sign_count,
        attested_credential_data,
        extensions,
    })
}

fn parse_attested_credential_data(
    rest: &mut &[u8],
) -> Result<AttestedCredentialData, PasskeyError> {
    let aaguid_bytes = take(rest, AAGUID_LEN, "AAGUID")?;
    let mut aaguid = [0u8; AAGUID_LEN];
    aaguid.copy_from_slice(aaguid_bytes);

    let len_bytes = take(rest, 2, "credential ID length")?;
    let id_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if id_len == 0 || id_len > MAX_CREDENTIAL_ID_LEN {
        return Err(PasskeyError::MalformedInput(format!(
            "Credential ID length {id_len} out of range 1..={MAX_CREDENTIAL_ID_LEN}"
        )));
    }
    let credential_id = CredentialId::new(take(rest, id_len, "credential ID")?.to_vec())?;

    let key_start = *rest;
    let key_value: CborValue = ciborium::de::from_reader(&mut *rest)
        .map_err(|e| PasskeyError::MalformedInput(format!("Invalid public key CBOR: {e}")))?;
    let consumed = key_start.len() - rest.len();
    let public_key = public_key_from_cbor(&key_value)?;

    Ok(AttestedCredentialData {
        aaguid: Uuid::from_bytes(aaguid),
        credential_id,
        public_key,
        public_key_cbor: key_start[..consumed].to_vec(),
    })
}

fn take<'a>(rest: &mut &'a [u8], len: usize, what: &str) -> Result<&'a [u8], PasskeyError> {
    if rest.len() < len {
        return Err(PasskeyError::MalformedInput(format!(
            "Authenticator data truncated reading {what}: need {len} bytes, {} remain",
            rest.len()
        )));
    }
    let (head, tail) = rest.split_at(len);
    *rest = tail;
    Ok(head)
}
