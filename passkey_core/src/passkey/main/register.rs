use crate::config::{ResidentKeyRequirement, UserVerificationRequirement};
use crate::passkey::errors::PasskeyError;
use crate::passkey::storage::StorageError;
use crate::passkey::types::{
    CeremonyType, ChallengeId, CredentialRecord, UserHandle, UserIdentity,
};
use crate::utils::base64url_encode;

use super::attestation::AttestationInput;
use super::codec::{decode_attestation_object, parse_authenticator_data};
use super::context::CeremonyContext;
use super::types::{
    AuthenticatorSelection, ParsedClientData, PubKeyCredParam, PublicKeyCredentialUserEntity,
    RegistrationOptions, RelyingParty,
};

/// Starts a registration ceremony that creates the account `user_name`.
///
/// The name must not belong to an existing user: a fresh handle is generated
/// and persisted only once registration completes. Adding a passkey to an
/// existing account goes through [`start_add_credential`].
pub(crate) async fn start_registration(
    ctx: &CeremonyContext,
    user_name: &str,
    display_name: &str,
) -> Result<RegistrationOptions, PasskeyError> {
    if user_name.trim().is_empty() {
        return Err(PasskeyError::MalformedInput(
            "User name must not be empty".to_string(),
        ));
    }

    if ctx.users.get_user_by_name(user_name).await?.is_some() {
        return Err(PasskeyError::UserNameTaken(user_name.to_string()));
    }

    let user = UserIdentity {
        handle: UserHandle::generate()?,
        name: user_name.to_string(),
        display_name: display_name.to_string(),
    };
    registration_options(ctx, user).await
}

/// Starts a registration ceremony that adds a credential to the user behind
/// `handle`.
///
/// The caller must already have authenticated that user; its credentials are
/// listed in `excludeCredentials`.
pub(crate) async fn start_add_credential(
    ctx: &CeremonyContext,
    handle: &UserHandle,
) -> Result<RegistrationOptions, PasskeyError> {
    let user = ctx
        .users
        .get_user(handle)
        .await?
        .ok_or_else(|| PasskeyError::UnknownUser(handle.to_string()))?;
    tracing::debug!("Adding a credential for existing user {}", user.name);
    registration_options(ctx, user).await
}

async fn registration_options(
    ctx: &CeremonyContext,
    user: UserIdentity,
) -> Result<RegistrationOptions, PasskeyError> {
    let exclude_credentials = ctx.credential_descriptors(&user.handle).await?;

    let policy = &ctx.config;
    let state = ctx
        .challenges
        .issue_registration(
            user.clone(),
            policy.user_verification,
            ctx.challenge_ttl(),
            ctx.now(),
        )
        .await?;

    let options = RegistrationOptions {
        challenge_id: state.id,
        challenge: base64url_encode(&state.challenge),
        rp: RelyingParty {
            id: policy.rp.id.clone(),
            name: policy.rp.name.clone(),
        },
        user: PublicKeyCredentialUserEntity {
            id: user.handle,
            name: user.name,
            display_name: user.display_name,
        },
        pub_key_cred_params: PubKeyCredParam::supported(),
        timeout: ctx.timeout_ms(),
        authenticator_selection: AuthenticatorSelection {
            authenticator_attachment: policy.authenticator_attachment,
            resident_key: policy.resident_key,
            require_resident_key: policy.resident_key == ResidentKeyRequirement::Required,
            user_verification: policy.user_verification,
        },
        attestation: policy.attestation,
        exclude_credentials,
    };

    tracing::debug!("Registration options: {:?}", options);
    Ok(options)
}

/// Verifies a registration response and stores the new credential.
pub(crate) async fn finish_registration(
    ctx: &CeremonyContext,
    challenge_id: &ChallengeId,
    client_data_json: &[u8],
    attestation_object: &[u8],
    transports: Vec<String>,
) -> Result<CredentialRecord, PasskeyError> {
    let now = ctx.now();

    let client_data = ParsedClientData::from_bytes(client_data_json)?;
    client_data.verify_type(CeremonyType::Registration)?;

    let state = ctx
        .challenges
        .consume(
            challenge_id,
            CeremonyType::Registration,
            &client_data.challenge,
            now,
        )
        .await?;

    client_data.verify_origin(&ctx.config.rp.origin)?;

    let attestation = decode_attestation_object(attestation_object)?;
    let auth_data = parse_authenticator_data(&attestation.auth_data)?;

    ctx.verify_rp_id_hash(&auth_data)?;

    let credential = match (
        auth_data.has_attested_credential_data(),
        auth_data.attested_credential_data.as_ref(),
    ) {
        (true, Some(credential)) => credential,
        _ => return Err(PasskeyError::MissingCredentialData),
    };
    if !auth_data.is_user_present() {
        return Err(PasskeyError::UserNotPresent);
    }
    if state.user_verification == UserVerificationRequirement::Required
        && !auth_data.is_user_verified()
    {
        return Err(PasskeyError::UserVerificationRequired);
    }

    let user = state.user.ok_or_else(|| {
        StorageError::Backend(format!(
            "registration challenge {challenge_id} carries no user identity"
        ))
    })?;

    if ctx
        .credentials
        .get_credential(&credential.credential_id)
        .await?
        .is_some()
    {
        return Err(PasskeyError::CredentialIdConflict);
    }

    let trust = ctx.formats.verify(
        &attestation.fmt,
        &AttestationInput {
            auth_data_raw: &attestation.auth_data,
            auth_data: &auth_data,
            credential,
            client_data_hash: &client_data.hash,
            att_stmt: &attestation.att_stmt,
            now,
        },
    )?;

    let record = CredentialRecord {
        credential_id: credential.credential_id.clone(),
        public_key: credential.public_key.clone(),
        sign_count: auth_data.sign_count,
        transports,
        owner_handle: user.handle.clone(),
        aaguid: credential.aaguid,
        attestation_format: attestation.fmt.clone(),
        trust,
        user_verified: auth_data.is_user_verified(),
        backup_eligible: auth_data.is_backup_eligible(),
        backup_state: auth_data.is_backed_up(),
        created_at: now,
        last_used_at: None,
    };

    // No stored user under the handle means a first registration. Storing the
    // user claims the name; it is undone if the credential cannot be stored.
    let new_user = ctx.users.get_user(&user.handle).await?.is_none();
    if new_user {
        ctx.users
            .put_user(user.clone())
            .await
            .map_err(|e| match e {
                StorageError::Conflict(_) => PasskeyError::UserNameTaken(user.name.clone()),
                other => PasskeyError::Storage(other),
            })?;
    }

    if let Err(e) = ctx.credentials.put_credential(record.clone()).await {
        if new_user {
            if let Err(rollback) = ctx.users.delete_user(&user.handle).await {
                tracing::error!(
                    "Failed to remove user {} after failed registration: {}",
                    user.name,
                    rollback
                );
            }
        }
        return Err(match e {
            StorageError::Conflict(_) => PasskeyError::CredentialIdConflict,
            other => PasskeyError::Storage(other),
        });
    }

    tracing::info!(
        "Registered credential {} for user {} (format {}, trust {:?})",
        record.credential_id,
        user.name,
        record.attestation_format,
        record.trust
    );
    Ok(record)
}
