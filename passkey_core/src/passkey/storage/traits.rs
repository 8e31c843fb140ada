use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StorageError;
use crate::passkey::types::{
    ChallengeId, ChallengeState, CredentialId, CredentialRecord, UserHandle, UserIdentity,
};

/// Persistent mapping from credential ID to [`CredentialRecord`].
///
/// Implementations must make each method a single atomic unit; the ceremony
/// code relies on the compare-and-set semantics below and does no locking of
/// its own.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Insert a new record.
    ///
    /// Fails with [`StorageError::Conflict`] when the credential ID is already
    /// stored, whoever owns it. Existing records are never replaced, so a
    /// stored signature counter cannot be reset.
    async fn put_credential(&self, record: CredentialRecord) -> Result<(), StorageError>;

    async fn get_credential(
        &self,
        id: &CredentialId,
    ) -> Result<Option<CredentialRecord>, StorageError>;

    /// Compare-and-set the signature counter.
    ///
    /// Returns `true` and records the new values only if `new_count` is strictly
    /// greater than the stored counter, or both are zero. Returns `false`
    /// without writing otherwise.
    async fn update_sign_count(
        &self,
        id: &CredentialId,
        new_count: u32,
        used_at: DateTime<Utc>,
        backup_state: bool,
    ) -> Result<bool, StorageError>;

    async fn list_for_user(&self, handle: &UserHandle) -> Result<Vec<CredentialId>, StorageError>;
}

/// Directory of registered users.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Insert a user. An existing entry for the same handle is left untouched;
    /// a name already taken by another handle is a [`StorageError::Conflict`].
    async fn put_user(&self, user: UserIdentity) -> Result<(), StorageError>;

    async fn get_user(&self, handle: &UserHandle) -> Result<Option<UserIdentity>, StorageError>;

    async fn get_user_by_name(&self, name: &str) -> Result<Option<UserIdentity>, StorageError>;

    /// Remove a user entry. Used to undo a first registration whose
    /// credential could not be stored; deleting an unknown handle is a no-op.
    async fn delete_user(&self, handle: &UserHandle) -> Result<(), StorageError>;
}

/// Storage for in-flight ceremony challenges.
#[async_trait]
pub trait ChallengeStore: Send + Sync + 'static {
    async fn put_challenge(&self, state: ChallengeState) -> Result<(), StorageError>;

    async fn get_challenge(&self, id: &ChallengeId)
    -> Result<Option<ChallengeState>, StorageError>;

    /// Atomically flip `consumed` from false to true.
    ///
    /// Returns `false` if the challenge is unknown or was already consumed.
    async fn mark_consumed(&self, id: &ChallengeId) -> Result<bool, StorageError>;

    /// Remove every challenge that expired before `now`; returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError>;
}
