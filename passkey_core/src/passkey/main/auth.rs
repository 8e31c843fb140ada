use crate::config::UserVerificationRequirement;
use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{CeremonyType, ChallengeId, CredentialId, UserHandle};
use crate::utils::base64url_encode;

use super::codec::{parse_authenticator_data, verify_signature};
use super::context::CeremonyContext;
use super::types::{AuthenticationOptions, ParsedClientData};

/// Starts an authentication ceremony.
///
/// With a user name the challenge is bound to that user and the options list
/// their credentials. Without one the ceremony is usernameless: the allow list
/// is empty and the authenticator picks a discoverable credential.
pub(crate) async fn start_authentication(
    ctx: &CeremonyContext,
    user_name: Option<&str>,
) -> Result<AuthenticationOptions, PasskeyError> {
    let (subject, allow_credentials) = match user_name {
        Some(name) => {
            let user = ctx
                .users
                .get_user_by_name(name)
                .await?
                .ok_or_else(|| PasskeyError::UnknownUser(name.to_string()))?;
            let descriptors = ctx.credential_descriptors(&user.handle).await?;
            (Some(user.handle), descriptors)
        }
        None => (None, Vec::new()),
    };

    let state = ctx
        .challenges
        .issue(
            CeremonyType::Authentication,
            subject,
            ctx.config.user_verification,
            ctx.challenge_ttl(),
            ctx.now(),
        )
        .await?;

    let options = AuthenticationOptions {
        challenge_id: state.id,
        challenge: base64url_encode(&state.challenge),
        rp_id: ctx.config.rp.id.clone(),
        timeout: ctx.timeout_ms(),
        allow_credentials,
        user_verification: ctx.config.user_verification,
    };

    tracing::debug!("Authentication options: {:?}", options);
    Ok(options)
}

/// Verifies an assertion and returns the handle of the authenticated user.
pub(crate) async fn finish_authentication(
    ctx: &CeremonyContext,
    challenge_id: &ChallengeId,
    credential_id: &CredentialId,
    client_data_json: &[u8],
    authenticator_data: &[u8],
    signature: &[u8],
    user_handle: Option<&UserHandle>,
) -> Result<UserHandle, PasskeyError> {
    let now = ctx.now();

    let client_data = ParsedClientData::from_bytes(client_data_json)?;
    client_data.verify_type(CeremonyType::Authentication)?;

    let state = ctx
        .challenges
        .consume(
            challenge_id,
            CeremonyType::Authentication,
            &client_data.challenge,
            now,
        )
        .await?;

    client_data.verify_origin(&ctx.config.rp.origin)?;

    let record = ctx
        .credentials
        .get_credential(credential_id)
        .await?
        .ok_or_else(|| PasskeyError::UnknownCredential(credential_id.to_string()))?;

    match &state.subject_handle {
        Some(subject) if *subject != record.owner_handle => {
            tracing::debug!("Credential {} is not owned by the bound user", credential_id);
            return Err(PasskeyError::UnknownCredential(credential_id.to_string()));
        }
        Some(_) => verify_user_handle(user_handle, &record.owner_handle, false)?,
        None => verify_user_handle(user_handle, &record.owner_handle, true)?,
    }

    let auth_data = parse_authenticator_data(authenticator_data)?;
    ctx.verify_rp_id_hash(&auth_data)?;

    if !auth_data.is_user_present() {
        return Err(PasskeyError::UserNotPresent);
    }
    if state.user_verification == UserVerificationRequirement::Required
        && !auth_data.is_user_verified()
    {
        return Err(PasskeyError::UserVerificationRequired);
    }

    let mut signed_data = Vec::with_capacity(authenticator_data.len() + client_data.hash.len());
    signed_data.extend_from_slice(authenticator_data);
    signed_data.extend_from_slice(&client_data.hash);

    if !verify_signature(&record.public_key, &signed_data, signature) {
        return Err(PasskeyError::SignatureInvalid);
    }

    verify_counter(record.sign_count, auth_data.sign_count)?;

    let updated = ctx
        .credentials
        .update_sign_count(
            credential_id,
            auth_data.sign_count,
            now,
            auth_data.is_backed_up(),
        )
        .await?;
    if !updated {
        // A concurrent assertion stored an equal or higher counter first
        return Err(PasskeyError::PossibleCloneDetected {
            stored: record.sign_count,
            received: auth_data.sign_count,
        });
    }

    tracing::info!(
        "Authenticated credential {} (counter {} -> {})",
        credential_id,
        record.sign_count,
        auth_data.sign_count
    );
    Ok(record.owner_handle)
}

fn verify_user_handle(
    presented: Option<&UserHandle>,
    owner: &UserHandle,
    required: bool,
) -> Result<(), PasskeyError> {
    match presented {
        Some(handle) if handle != owner => {
            tracing::debug!("User handle does not match credential owner");
            Err(PasskeyError::UserHandleMismatch)
        }
        Some(_) => Ok(()),
        None if required => {
            tracing::debug!("Usernameless assertion without user handle");
            Err(PasskeyError::UserHandleMismatch)
        }
        None => Ok(()),
    }
}

/// Authenticators that never increment report a constant zero and are exempt.
fn verify_counter(stored: u32, received: u32) -> Result<(), PasskeyError> {
    if stored != 0 && received <= stored {
        tracing::warn!(
            "Signature counter did not advance: stored {}, received {}",
            stored,
            received
        );
        return Err(PasskeyError::PossibleCloneDetected { stored, received });
    }
    Ok(())
}
