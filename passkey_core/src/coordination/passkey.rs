use std::sync::Arc;

use crate::config::PasskeyConfig;
use crate::passkey::{
    AttestationFormats, AuthenticationOptions, AuthenticationResponse, CeremonyContext,
    ChallengeId, ChallengeManager, ChallengeStore, Clock, CredentialId, CredentialRecord,
    CredentialStore, PasskeyError, RegistrationOptions, RegistrationResponse, UserHandle,
    UserStore, finish_authentication, finish_registration, start_add_credential,
    start_authentication, start_registration, system_clock,
};

/// Entry point for both WebAuthn ceremonies.
///
/// Every error leaving the coordinator has been passed through
/// [`PasskeyError::log`], so security events reach the audit target exactly
/// once.
#[derive(Clone)]
pub struct PasskeyCoordinator {
    ctx: CeremonyContext,
}

impl PasskeyCoordinator {
    /// Builds a coordinator over one backend that implements all three stores.
    pub fn new<S>(config: PasskeyConfig, store: Arc<S>) -> Result<Self, PasskeyError>
    where
        S: CredentialStore + UserStore + ChallengeStore,
    {
        Self::from_parts(config, store.clone(), store.clone(), store)
    }

    /// Builds a coordinator over separately provided stores.
    pub fn from_parts(
        config: PasskeyConfig,
        credentials: Arc<dyn CredentialStore>,
        users: Arc<dyn UserStore>,
        challenges: Arc<dyn ChallengeStore>,
    ) -> Result<Self, PasskeyError> {
        config.validate().map_err(PasskeyError::log)?;
        tracing::info!(
            "Passkey coordinator for RP '{}' at {}",
            config.rp.id,
            config.rp.origin
        );
        let formats = AttestationFormats::standard(config.allow_none_attestation);
        Ok(Self {
            ctx: CeremonyContext {
                config: Arc::new(config),
                challenges: ChallengeManager::new(challenges),
                credentials,
                users,
                formats,
                clock: system_clock(),
            },
        })
    }

    /// Replaces the attestation format registry.
    pub fn with_attestation_formats(mut self, formats: AttestationFormats) -> Self {
        self.ctx.formats = formats;
        self
    }

    /// Replaces the wall clock used for challenge expiry and timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.ctx.clock = clock;
        self
    }

    pub fn config(&self) -> &PasskeyConfig {
        &self.ctx.config
    }

    /// Starts registration of a new account. Fails with
    /// [`PasskeyError::UserNameTaken`] if `user_name` is already registered.
    pub async fn begin_registration(
        &self,
        user_name: &str,
        display_name: &str,
    ) -> Result<RegistrationOptions, PasskeyError> {
        start_registration(&self.ctx, user_name, display_name)
            .await
            .map_err(PasskeyError::log)
    }

    /// Starts registration of an additional credential for an existing user.
    ///
    /// `user_handle` must come from the caller's authenticated session, never
    /// from the request; the ceremony binds the new credential to that user.
    pub async fn begin_add_credential(
        &self,
        user_handle: &UserHandle,
    ) -> Result<RegistrationOptions, PasskeyError> {
        start_add_credential(&self.ctx, user_handle)
            .await
            .map_err(PasskeyError::log)
    }

    pub async fn complete_registration(
        &self,
        challenge_id: &ChallengeId,
        client_data_json: &[u8],
        attestation_object: &[u8],
        transports: Vec<String>,
    ) -> Result<CredentialRecord, PasskeyError> {
        finish_registration(
            &self.ctx,
            challenge_id,
            client_data_json,
            attestation_object,
            transports,
        )
        .await
        .map_err(PasskeyError::log)
    }

    /// Completes registration from the browser's serialized credential.
    pub async fn complete_registration_response(
        &self,
        challenge_id: &ChallengeId,
        response: &RegistrationResponse,
    ) -> Result<CredentialRecord, PasskeyError> {
        let decoded = response.decode().map_err(PasskeyError::log)?;
        let record = self
            .complete_registration(
                challenge_id,
                &decoded.client_data_json,
                &decoded.attestation_object,
                decoded.transports,
            )
            .await?;
        if record.credential_id != decoded.credential_id {
            tracing::warn!(
                "Response rawId {} differs from attested credential ID {}",
                decoded.credential_id,
                record.credential_id
            );
        }
        Ok(record)
    }

    pub async fn begin_authentication(
        &self,
        user_name: Option<&str>,
    ) -> Result<AuthenticationOptions, PasskeyError> {
        start_authentication(&self.ctx, user_name)
            .await
            .map_err(PasskeyError::log)
    }

    pub async fn complete_authentication(
        &self,
        challenge_id: &ChallengeId,
        credential_id: &CredentialId,
        client_data_json: &[u8],
        authenticator_data: &[u8],
        signature: &[u8],
        user_handle: Option<&UserHandle>,
    ) -> Result<UserHandle, PasskeyError> {
        finish_authentication(
            &self.ctx,
            challenge_id,
            credential_id,
            client_data_json,
            authenticator_data,
            signature,
            user_handle,
        )
        .await
        .map_err(PasskeyError::log)
    }

    /// Completes authentication from the browser's serialized credential.
    pub async fn complete_authentication_response(
        &self,
        challenge_id: &ChallengeId,
        response: &AuthenticationResponse,
    ) -> Result<UserHandle, PasskeyError> {
        let decoded = response.decode().map_err(PasskeyError::log)?;
        self.complete_authentication(
            challenge_id,
            &decoded.credential_id,
            &decoded.client_data_json,
            &decoded.authenticator_data,
            &decoded.signature,
            decoded.user_handle.as_ref(),
        )
        .await
    }

    /// Drops expired challenges; returns how many were removed.
    pub async fn purge_expired_challenges(&self) -> Result<usize, PasskeyError> {
        self.ctx
            .challenges
            .purge_expired(self.ctx.now())
            .await
            .map_err(PasskeyError::log)
    }
}
