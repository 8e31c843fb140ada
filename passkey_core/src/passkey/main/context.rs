use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::config::PasskeyConfig;
use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::{CredentialStore, UserStore};
use crate::passkey::types::{CredentialId, UserHandle};
use crate::utils::sha256;

use super::attestation::AttestationFormats;
use super::challenge::ChallengeManager;
use super::codec::AuthenticatorData;
use super::types::CredentialDescriptor;

/// Source of wall-clock time for expiry checks and timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub(crate) fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Collaborators shared by both ceremonies.
#[derive(Clone)]
pub(crate) struct CeremonyContext {
    pub(crate) config: Arc<PasskeyConfig>,
    pub(crate) challenges: ChallengeManager,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) formats: AttestationFormats,
    pub(crate) clock: Clock,
}

impl CeremonyContext {
    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub(crate) fn challenge_ttl(&self) -> Duration {
        Duration::seconds(i64::from(self.config.challenge_ttl_secs))
    }

    pub(crate) fn timeout_ms(&self) -> u64 {
        u64::from(self.config.timeout_secs) * 1000
    }

    pub(crate) fn verify_rp_id_hash(&self, auth_data: &AuthenticatorData) -> Result<(), PasskeyError> {
        if auth_data.rp_id_hash != sha256(self.config.rp.id.as_bytes()) {
            tracing::debug!("RP ID hash mismatch for RP ID {}", self.config.rp.id);
            return Err(PasskeyError::RpIdMismatch);
        }
        Ok(())
    }

    /// Descriptors for every credential the user owns, transports included.
    pub(crate) async fn credential_descriptors(
        &self,
        handle: &UserHandle,
    ) -> Result<Vec<CredentialDescriptor>, PasskeyError> {
        let ids: Vec<CredentialId> = self.credentials.list_for_user(handle).await?;
        let mut descriptors = Vec::with_capacity(ids.len());
        for id in ids {
            let transports = self
                .credentials
                .get_credential(&id)
                .await?
                .map(|record| record.transports)
                .unwrap_or_default();
            descriptors.push(CredentialDescriptor::new(id, transports));
        }
        Ok(descriptors)
    }
}
