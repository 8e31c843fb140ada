use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use passkey_core::{CredentialId, InMemoryStore, PasskeyConfig, PasskeyCoordinator};

mod authenticator;

use authenticator::{DemoError, SoftAuthenticator, b64};

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passkey_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PasskeyConfig::from_env()?;
    let store = Arc::new(InMemoryStore::new());
    let coordinator = PasskeyCoordinator::new(config, store)?;
    let rp = coordinator.config().rp.clone();

    let mut authenticator = SoftAuthenticator::new(&rp.id, &rp.origin)?;

    println!("Registering 'alice' with {} ({})", rp.name, rp.origin);
    let options = coordinator.begin_registration("alice", "Alice").await?;
    println!(
        "Registration options:\n{}",
        serde_json::to_string_pretty(&options)?
    );
    let (client_data, attestation_object) = authenticator.make_credential(&options.challenge)?;
    let record = coordinator
        .complete_registration(
            &options.challenge_id,
            &client_data,
            &attestation_object,
            vec!["internal".to_string()],
        )
        .await?;
    println!(
        "Registered credential {} for user handle {}",
        record.credential_id, record.owner_handle
    );

    let credential_id = CredentialId::new(authenticator.credential_id().to_vec())?;
    for round in 1..=2 {
        let options = coordinator.begin_authentication(Some("alice")).await?;
        let assertion = authenticator.get_assertion(&options.challenge)?;
        let user_handle = coordinator
            .complete_authentication(
                &options.challenge_id,
                &credential_id,
                &assertion.client_data_json,
                &assertion.authenticator_data,
                &assertion.signature,
                None,
            )
            .await?;
        println!("Authentication #{round} succeeded for user handle {user_handle}");
    }

    // The same assertion presented from a foreign origin
    let options = coordinator.begin_authentication(None).await?;
    let assertion = authenticator.get_assertion(&options.challenge)?;
    let wrong_origin = String::from_utf8_lossy(&assertion.client_data_json)
        .replace(&rp.origin, "https://evil.example");
    match coordinator
        .complete_authentication(
            &options.challenge_id,
            &credential_id,
            wrong_origin.as_bytes(),
            &assertion.authenticator_data,
            &assertion.signature,
            Some(&record.owner_handle),
        )
        .await
    {
        Ok(_) => println!("Unexpected success for a foreign origin"),
        Err(e) => println!("Foreign origin rejected as expected: {e}"),
    }

    println!("Credential ID (base64url): {}", b64(authenticator.credential_id()));
    Ok(())
}
