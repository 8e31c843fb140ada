use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;

use crate::config::UserVerificationRequirement;
use crate::passkey::errors::{ChallengeError, PasskeyError};
use crate::passkey::storage::ChallengeStore;
use crate::passkey::types::{CeremonyType, ChallengeId, ChallengeState, UserHandle, UserIdentity};
use crate::utils::gen_random_bytes;

const CHALLENGE_LEN: usize = 32;

/// Issues single-use challenges and consumes them exactly once.
#[derive(Clone)]
pub struct ChallengeManager {
    store: Arc<dyn ChallengeStore>,
}

impl ChallengeManager {
    pub fn new(store: Arc<dyn ChallengeStore>) -> Self {
        Self { store }
    }

    /// Mints and persists a fresh challenge.
    pub async fn issue(
        &self,
        ceremony_type: CeremonyType,
        subject_handle: Option<UserHandle>,
        user_verification: UserVerificationRequirement,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ChallengeState, PasskeyError> {
        self.issue_state(ceremony_type, subject_handle, None, user_verification, ttl, now)
            .await
    }

    /// Registration challenges carry the identity being registered.
    pub async fn issue_registration(
        &self,
        user: UserIdentity,
        user_verification: UserVerificationRequirement,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ChallengeState, PasskeyError> {
        self.issue_state(
            CeremonyType::Registration,
            Some(user.handle.clone()),
            Some(user),
            user_verification,
            ttl,
            now,
        )
        .await
    }

    async fn issue_state(
        &self,
        ceremony_type: CeremonyType,
        subject_handle: Option<UserHandle>,
        user: Option<UserIdentity>,
        user_verification: UserVerificationRequirement,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<ChallengeState, PasskeyError> {
        let state = ChallengeState {
            id: ChallengeId::generate()?,
            challenge: gen_random_bytes(CHALLENGE_LEN)?,
            ceremony_type,
            subject_handle,
            user,
            user_verification,
            expires_at: now + ttl,
            consumed: false,
        };
        self.store.put_challenge(state.clone()).await?;
        tracing::debug!(
            "Issued {} challenge {} expiring at {}",
            ceremony_type,
            state.id,
            state.expires_at
        );
        Ok(state)
    }

    /// Validates the presented challenge and marks it consumed.
    ///
    /// Checks run in a fixed order: existence, ceremony, expiry, prior
    /// consumption, then the challenge bytes. A mismatch leaves the challenge
    /// unconsumed.
    pub async fn consume(
        &self,
        id: &ChallengeId,
        ceremony_type: CeremonyType,
        presented: &[u8],
        now: DateTime<Utc>,
    ) -> Result<ChallengeState, PasskeyError> {
        let mut state = self
            .store
            .get_challenge(id)
            .await?
            .ok_or(ChallengeError::NotFound)?;

        if state.ceremony_type != ceremony_type {
            return Err(ChallengeError::WrongCeremony {
                issued_for: state.ceremony_type,
            }
            .into());
        }
        if state.is_expired(now) {
            return Err(ChallengeError::Expired.into());
        }
        if state.consumed {
            return Err(ChallengeError::AlreadyConsumed.into());
        }
        if !bool::from(state.challenge.as_slice().ct_eq(presented)) {
            tracing::debug!("Challenge mismatch for {}", id);
            return Err(ChallengeError::Mismatch.into());
        }

        if !self.store.mark_consumed(id).await? {
            // Another completion won the compare-and-set
            return Err(ChallengeError::AlreadyConsumed.into());
        }
        state.consumed = true;
        Ok(state)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, PasskeyError> {
        Ok(self.store.purge_expired(now).await?)
    }
}
