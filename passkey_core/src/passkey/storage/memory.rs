use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::errors::StorageError;
use super::traits::{ChallengeStore, CredentialStore, UserStore};
use crate::passkey::types::{
    ChallengeId, ChallengeState, CredentialId, CredentialRecord, UserHandle, UserIdentity,
};

/// In-process reference store implementing all three store traits.
///
/// Each map sits behind its own mutex, held only for one check-and-write. State
/// is lost when the process exits; use it for tests, demos and single-node
/// development.
#[derive(Default)]
pub struct InMemoryStore {
    credentials: Mutex<HashMap<CredentialId, CredentialRecord>>,
    users: Mutex<HashMap<UserHandle, UserIdentity>>,
    challenges: Mutex<HashMap<ChallengeId, ChallengeState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory passkey store");
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn put_credential(&self, record: CredentialRecord) -> Result<(), StorageError> {
        let mut credentials = self.credentials.lock().await;
        if credentials.contains_key(&record.credential_id) {
            return Err(StorageError::Conflict(format!(
                "credential {} is already registered",
                record.credential_id
            )));
        }
        credentials.insert(record.credential_id.clone(), record);
        Ok(())
    }

    async fn get_credential(
        &self,
        id: &CredentialId,
    ) -> Result<Option<CredentialRecord>, StorageError> {
        Ok(self.credentials.lock().await.get(id).cloned())
    }

    async fn update_sign_count(
        &self,
        id: &CredentialId,
        new_count: u32,
        used_at: DateTime<Utc>,
        backup_state: bool,
    ) -> Result<bool, StorageError> {
        let mut credentials = self.credentials.lock().await;
        let record = credentials
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("credential {id}")))?;

        let advances = new_count > record.sign_count || (new_count == 0 && record.sign_count == 0);
        if !advances {
            return Ok(false);
        }

        record.sign_count = new_count;
        record.last_used_at = Some(used_at);
        record.backup_state = backup_state;
        Ok(true)
    }

    async fn list_for_user(&self, handle: &UserHandle) -> Result<Vec<CredentialId>, StorageError> {
        let credentials = self.credentials.lock().await;
        let mut owned: Vec<&CredentialRecord> = credentials
            .values()
            .filter(|record| &record.owner_handle == handle)
            .collect();
        owned.sort_by_key(|record| record.created_at);
        Ok(owned
            .into_iter()
            .map(|record| record.credential_id.clone())
            .collect())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn put_user(&self, user: UserIdentity) -> Result<(), StorageError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.handle) {
            return Ok(());
        }
        if users.values().any(|existing| existing.name == user.name) {
            return Err(StorageError::Conflict(format!(
                "user name '{}' is already taken",
                user.name
            )));
        }
        users.insert(user.handle.clone(), user);
        Ok(())
    }

    async fn get_user(&self, handle: &UserHandle) -> Result<Option<UserIdentity>, StorageError> {
        Ok(self.users.lock().await.get(handle).cloned())
    }

    async fn get_user_by_name(&self, name: &str) -> Result<Option<UserIdentity>, StorageError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.name == name)
            .cloned())
    }

    async fn delete_user(&self, handle: &UserHandle) -> Result<(), StorageError> {
        if self.users.lock().await.remove(handle).is_some() {
            tracing::debug!("Deleted user {}", handle);
        }
        Ok(())
    }
}

#[async_trait]
impl ChallengeStore for InMemoryStore {
    async fn put_challenge(&self, state: ChallengeState) -> Result<(), StorageError> {
        self.challenges.lock().await.insert(state.id.clone(), state);
        Ok(())
    }

    async fn get_challenge(
        &self,
        id: &ChallengeId,
    ) -> Result<Option<ChallengeState>, StorageError> {
        Ok(self.challenges.lock().await.get(id).cloned())
    }

    async fn mark_consumed(&self, id: &ChallengeId) -> Result<bool, StorageError> {
        let mut challenges = self.challenges.lock().await;
        match challenges.get_mut(id) {
            Some(state) if !state.consumed => {
                state.consumed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut challenges = self.challenges.lock().await;
        let before = challenges.len();
        challenges.retain(|_, state| !state.is_expired(now));
        let purged = before - challenges.len();
        if purged > 0 {
            tracing::debug!("Purged {} expired challenges", purged);
        }
        Ok(purged)
    }
}
