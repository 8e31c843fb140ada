use serde::{Deserialize, Serialize};
use std::{env, fmt, str::FromStr};
use url::Url;

use crate::passkey::PasskeyError;

const DEFAULT_TIMEOUT_SECS: u32 = 60;
const DEFAULT_CHALLENGE_TTL_SECS: u32 = 60;

/// Identity of the relying party. The origin is compared byte for byte against
/// what the browser reports in client data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyConfig {
    /// Registrable domain suffix, e.g. "example.com"
    pub id: String,
    pub name: String,
    /// Full expected origin, e.g. "https://example.com"
    pub origin: String,
}

impl RelyingPartyConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            origin: origin.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyance {
    #[default]
    None,
    Indirect,
    Direct,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    #[default]
    Required,
    Preferred,
    Discouraged,
}

macro_rules! parse_lowercase {
    ($ty:ident { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(other.to_string()),
                }
            }
        }
    };
}

parse_lowercase!(UserVerificationRequirement {
    "required" => Self::Required,
    "preferred" => Self::Preferred,
    "discouraged" => Self::Discouraged,
});

parse_lowercase!(AttestationConveyance {
    "none" => Self::None,
    "indirect" => Self::Indirect,
    "direct" => Self::Direct,
    "enterprise" => Self::Enterprise,
});

parse_lowercase!(AuthenticatorAttachment {
    "platform" => Self::Platform,
    "cross-platform" => Self::CrossPlatform,
});

parse_lowercase!(ResidentKeyRequirement {
    "required" => Self::Required,
    "preferred" => Self::Preferred,
    "discouraged" => Self::Discouraged,
});

/// Relying-party policy. Immutable once handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasskeyConfig {
    pub rp: RelyingPartyConfig,
    /// Client-side ceremony timeout advertised in options
    pub timeout_secs: u32,
    /// Server-side lifetime of an issued challenge
    pub challenge_ttl_secs: u32,
    pub user_verification: UserVerificationRequirement,
    pub attestation: AttestationConveyance,
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    pub resident_key: ResidentKeyRequirement,
    /// Accept "none" attestation (trust level None) at registration
    pub allow_none_attestation: bool,
}

impl PasskeyConfig {
    pub fn new(rp: RelyingPartyConfig) -> Self {
        Self {
            rp,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            user_verification: UserVerificationRequirement::default(),
            attestation: AttestationConveyance::default(),
            authenticator_attachment: None,
            resident_key: ResidentKeyRequirement::default(),
            allow_none_attestation: true,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_challenge_ttl_secs(mut self, secs: u32) -> Self {
        self.challenge_ttl_secs = secs;
        self
    }

    pub fn with_user_verification(mut self, requirement: UserVerificationRequirement) -> Self {
        self.user_verification = requirement;
        self
    }

    pub fn with_attestation(mut self, conveyance: AttestationConveyance) -> Self {
        self.attestation = conveyance;
        self
    }

    pub fn with_authenticator_attachment(
        mut self,
        attachment: Option<AuthenticatorAttachment>,
    ) -> Self {
        self.authenticator_attachment = attachment;
        self
    }

    pub fn with_resident_key(mut self, requirement: ResidentKeyRequirement) -> Self {
        self.resident_key = requirement;
        self
    }

    pub fn with_allow_none_attestation(mut self, allow: bool) -> Self {
        self.allow_none_attestation = allow;
        self
    }

    /// Reads the configuration from process environment variables.
    ///
    /// `ORIGIN` is required. Loading a `.env` file is left to the binary.
    pub fn from_env() -> Result<Self, PasskeyError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary key lookup.
    ///
    /// Invalid enumerated or numeric values fall back to their defaults with a
    /// warning.
    pub fn from_source<F>(get: F) -> Result<Self, PasskeyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin = get("ORIGIN")
            .ok_or_else(|| PasskeyError::Config("ORIGIN must be set".to_string()))?;

        let rp_id = match get("PASSKEY_RP_ID") {
            Some(id) => id,
            None => Url::parse(&origin)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string))
                .ok_or_else(|| {
                    PasskeyError::Config(format!("Could not extract RP ID from ORIGIN: {origin}"))
                })?,
        };
        let rp_name = get("PASSKEY_RP_NAME").unwrap_or_else(|| origin.clone());

        let attachment = match get("PASSKEY_AUTHENTICATOR_ATTACHMENT") {
            None => None,
            Some(v) if v.eq_ignore_ascii_case("none") => None,
            Some(v) => match v.parse::<AuthenticatorAttachment>() {
                Ok(a) => Some(a),
                Err(invalid) => {
                    tracing::warn!(
                        "Invalid authenticator attachment: {}. Using no preference",
                        invalid
                    );
                    None
                }
            },
        };

        Ok(Self {
            rp: RelyingPartyConfig::new(rp_id, rp_name, origin),
            timeout_secs: setting(&get, "PASSKEY_TIMEOUT", DEFAULT_TIMEOUT_SECS),
            challenge_ttl_secs: setting(
                &get,
                "PASSKEY_CHALLENGE_TIMEOUT",
                DEFAULT_CHALLENGE_TTL_SECS,
            ),
            user_verification: setting(
                &get,
                "PASSKEY_USER_VERIFICATION",
                UserVerificationRequirement::default(),
            ),
            attestation: setting(&get, "PASSKEY_ATTESTATION", AttestationConveyance::default()),
            authenticator_attachment: attachment,
            resident_key: setting(
                &get,
                "PASSKEY_RESIDENT_KEY",
                ResidentKeyRequirement::default(),
            ),
            allow_none_attestation: setting(&get, "PASSKEY_ALLOW_NONE_ATTESTATION", true),
        })
    }

    /// Checks that the origin is a serialized https origin (http only for
    /// localhost) whose host is the RP ID or one of its subdomains.
    pub fn validate(&self) -> Result<(), PasskeyError> {
        let rp_id = &self.rp.id;
        if rp_id.is_empty() {
            return Err(PasskeyError::Config("RP ID must not be empty".to_string()));
        }

        let url = Url::parse(&self.rp.origin).map_err(|e| {
            PasskeyError::Config(format!("Invalid origin '{}': {e}", self.rp.origin))
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| PasskeyError::Config(format!("Origin '{}' has no host", url)))?;

        match url.scheme() {
            "https" => {}
            "http" if matches!(host, "localhost" | "127.0.0.1") => {}
            scheme => {
                return Err(PasskeyError::Config(format!(
                    "Origin scheme must be https, got '{scheme}'"
                )));
            }
        }

        if host != rp_id && !host.ends_with(&format!(".{rp_id}")) {
            return Err(PasskeyError::Config(format!(
                "Origin host '{host}' is not within RP ID '{rp_id}'"
            )));
        }

        if url.origin().ascii_serialization() != self.rp.origin {
            return Err(PasskeyError::Config(format!(
                "Origin must be a bare scheme://host[:port], got '{}'",
                self.rp.origin
            )));
        }

        if self.challenge_ttl_secs == 0 {
            return Err(PasskeyError::Config(
                "Challenge TTL must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn setting<F, T>(get: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Debug,
    T::Err: fmt::Display,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Invalid {}: {}. Using default {:?}", key, e, default);
                default
            }
        },
    }
}
