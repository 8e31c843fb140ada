use chrono::Duration;

use passkey_core::{
    AttestationTrust, ChallengeError, CredentialRecord, CredentialStore, PasskeyError, UserHandle,
    UserStore,
};

use crate::common::{EVIL_ORIGIN, ORIGIN, SoftAuthenticator, TestSetup, test_config};

/// Registers `authenticator` for `user_name` through the raw-bytes API
async fn register(
    setup: &TestSetup,
    authenticator: &SoftAuthenticator,
    user_name: &str,
) -> CredentialRecord {
    let options = setup
        .coordinator
        .begin_registration(user_name, user_name)
        .await
        .expect("begin registration");
    let (client_data, attestation_object) = authenticator.attest(&options.challenge, ORIGIN);
    setup
        .coordinator
        .complete_registration(
            &options.challenge_id,
            &client_data,
            &attestation_object,
            vec!["usb".to_string()],
        )
        .await
        .expect("complete registration")
}

async fn authenticate(
    setup: &TestSetup,
    authenticator: &SoftAuthenticator,
    user_name: &str,
    counter: u32,
) -> Result<UserHandle, PasskeyError> {
    let options = setup
        .coordinator
        .begin_authentication(Some(user_name))
        .await
        .expect("begin authentication");
    let assertion = authenticator.assert(&options.challenge, ORIGIN, counter);
    setup
        .coordinator
        .complete_authentication(
            &options.challenge_id,
            &authenticator.credential_id(),
            &assertion.client_data_json,
            &assertion.authenticator_data,
            &assertion.signature,
            None,
        )
        .await
}

async fn stored_count(setup: &TestSetup, authenticator: &SoftAuthenticator) -> u32 {
    setup
        .store
        .get_credential(&authenticator.credential_id())
        .await
        .expect("store lookup")
        .expect("credential stored")
        .sign_count
}

#[test]
fn test_env_config_loads() {
    let config = test_config();
    assert_eq!(config.rp.id, "example.com");
    assert_eq!(config.rp.origin, "https://example.com");
    assert_eq!(config.challenge_ttl_secs, 60);
    assert!(config.allow_none_attestation);
}

#[tokio::test]
async fn test_register_then_authenticate_round_trip() {
    // Given a fresh relying party
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();

    // When alice registers with "none" attestation
    println!("Step: registering alice");
    let record = register(&setup, &authenticator, "alice").await;

    // Then exactly one record exists with a zero counter
    assert_eq!(record.sign_count, 0);
    assert_eq!(record.attestation_format, "none");
    assert_eq!(record.trust, AttestationTrust::None);
    let user = setup
        .store
        .get_user_by_name("alice")
        .await
        .unwrap()
        .expect("alice persisted");
    let credentials = setup.store.list_for_user(&user.handle).await.unwrap();
    assert_eq!(credentials, vec![record.credential_id.clone()]);

    // When alice authenticates with counter 1
    println!("Step: authenticating alice");
    let handle = authenticate(&setup, &authenticator, "alice", 1)
        .await
        .expect("authentication");

    // Then the same user handle comes back and the counter is stored
    assert_eq!(handle, record.owner_handle);
    assert_eq!(handle, user.handle);
    assert_eq!(stored_count(&setup, &authenticator).await, 1);
    println!("✅ Round trip succeeded");
}

#[tokio::test]
async fn test_existing_name_cannot_be_registered_again() {
    // Given alice registered with authenticator A
    let setup = TestSetup::new();
    let alice = SoftAuthenticator::new();
    let record = register(&setup, &alice, "alice").await;

    // When mallory starts an unauthenticated registration as "alice"
    println!("Step: registering a second account named alice");
    let result = setup.coordinator.begin_registration("alice", "Alice").await;

    // Then the name is refused and mallory's authenticator B cannot sign in as alice
    assert!(matches!(result, Err(PasskeyError::UserNameTaken(_))));
    let mallory = SoftAuthenticator::new();
    let takeover = authenticate(&setup, &mallory, "alice", 1).await;
    assert!(matches!(takeover, Err(PasskeyError::UnknownCredential(_))));

    // And alice still has only her own credential
    let credentials = setup.store.list_for_user(&record.owner_handle).await.unwrap();
    assert_eq!(credentials, vec![record.credential_id.clone()]);
    println!("✅ Taken name rejected");
}

#[tokio::test]
async fn test_added_credential_cannot_reset_counter() {
    // Given alice whose counter has reached 10
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();
    let record = register(&setup, &authenticator, "alice").await;
    authenticate(&setup, &authenticator, "alice", 10)
        .await
        .expect("authentication");

    // When the same credential is registered again from alice's session
    println!("Step: re-registering alice's credential");
    let options = setup
        .coordinator
        .begin_add_credential(&record.owner_handle)
        .await
        .expect("begin add credential");
    let (client_data, attestation_object) = authenticator.attest(&options.challenge, ORIGIN);
    let result = setup
        .coordinator
        .complete_registration(&options.challenge_id, &client_data, &attestation_object, vec![])
        .await;

    // Then it conflicts and a replayed old assertion is still caught
    assert!(matches!(result, Err(PasskeyError::CredentialIdConflict)));
    assert_eq!(stored_count(&setup, &authenticator).await, 10);
    let replay = authenticate(&setup, &authenticator, "alice", 1).await;
    assert!(matches!(
        replay,
        Err(PasskeyError::PossibleCloneDetected {
            stored: 10,
            received: 1
        })
    ));
}

#[tokio::test]
async fn test_replayed_assertion_fails() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();
    register(&setup, &authenticator, "alice").await;

    let options = setup
        .coordinator
        .begin_authentication(Some("alice"))
        .await
        .unwrap();
    let assertion = authenticator.assert(&options.challenge, ORIGIN, 1);
    let credential_id = authenticator.credential_id();

    setup
        .coordinator
        .complete_authentication(
            &options.challenge_id,
            &credential_id,
            &assertion.client_data_json,
            &assertion.authenticator_data,
            &assertion.signature,
            None,
        )
        .await
        .expect("first completion");
    let replay = setup
        .coordinator
        .complete_authentication(
            &options.challenge_id,
            &credential_id,
            &assertion.client_data_json,
            &assertion.authenticator_data,
            &assertion.signature,
            None,
        )
        .await;
    assert!(matches!(
        replay,
        Err(PasskeyError::Challenge(ChallengeError::AlreadyConsumed))
    ));
}

#[tokio::test]
async fn test_replayed_registration_fails() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();

    let options = setup
        .coordinator
        .begin_registration("alice", "Alice")
        .await
        .unwrap();
    let (client_data, attestation_object) = authenticator.attest(&options.challenge, ORIGIN);

    setup
        .coordinator
        .complete_registration(&options.challenge_id, &client_data, &attestation_object, vec![])
        .await
        .unwrap();
    let replay = setup
        .coordinator
        .complete_registration(&options.challenge_id, &client_data, &attestation_object, vec![])
        .await;
    assert!(matches!(
        replay,
        Err(PasskeyError::Challenge(ChallengeError::AlreadyConsumed))
    ));
}

#[tokio::test]
async fn test_challenge_expires_after_ttl() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();
    register(&setup, &authenticator, "alice").await;

    let options = setup
        .coordinator
        .begin_authentication(Some("alice"))
        .await
        .unwrap();
    let assertion = authenticator.assert(&options.challenge, ORIGIN, 1);

    setup.clock.advance(Duration::seconds(61));

    let result = setup
        .coordinator
        .complete_authentication(
            &options.challenge_id,
            &authenticator.credential_id(),
            &assertion.client_data_json,
            &assertion.authenticator_data,
            &assertion.signature,
            None,
        )
        .await;
    assert!(matches!(
        result,
        Err(PasskeyError::Challenge(ChallengeError::Expired))
    ));
    // The consumed registration challenge expired as well
    assert_eq!(
        setup.coordinator.purge_expired_challenges().await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_counter_must_advance() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();
    register(&setup, &authenticator, "alice").await;

    authenticate(&setup, &authenticator, "alice", 5).await.unwrap();
    authenticate(&setup, &authenticator, "alice", 7).await.unwrap();
    assert_eq!(stored_count(&setup, &authenticator).await, 7);

    let result = authenticate(&setup, &authenticator, "alice", 6).await;
    match result {
        Err(e @ PasskeyError::PossibleCloneDetected { .. }) => {
            assert!(e.is_security_event());
            assert_eq!(
                e.to_string(),
                "Possible credential cloning detected. Stored counter: 7, received: 6"
            );
        }
        other => panic!("Expected PossibleCloneDetected, got {other:?}"),
    }
    assert_eq!(stored_count(&setup, &authenticator).await, 7);
}

#[tokio::test]
async fn test_concurrent_assertions_single_counter_winner() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();
    register(&setup, &authenticator, "alice").await;

    // Two ceremonies presenting the same counter value
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let options = setup
            .coordinator
            .begin_authentication(Some("alice"))
            .await
            .unwrap();
        let assertion = authenticator.assert(&options.challenge, ORIGIN, 1);
        let coordinator = setup.coordinator.clone();
        let credential_id = authenticator.credential_id();
        tasks.push(tokio::spawn(async move {
            coordinator
                .complete_authentication(
                    &options.challenge_id,
                    &credential_id,
                    &assertion.client_data_json,
                    &assertion.authenticator_data,
                    &assertion.signature,
                    None,
                )
                .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, PasskeyError::PossibleCloneDetected { .. })),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(stored_count(&setup, &authenticator).await, 1);
}

#[tokio::test]
async fn test_foreign_origin_rejected_for_registration() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();

    let options = setup
        .coordinator
        .begin_registration("alice", "Alice")
        .await
        .unwrap();
    let (client_data, attestation_object) =
        authenticator.attest(&options.challenge, EVIL_ORIGIN);
    let result = setup
        .coordinator
        .complete_registration(&options.challenge_id, &client_data, &attestation_object, vec![])
        .await;

    match result {
        Err(PasskeyError::OriginMismatch { expected, actual }) => {
            assert_eq!(expected, ORIGIN);
            assert_eq!(actual, EVIL_ORIGIN);
        }
        other => panic!("Expected OriginMismatch, got {other:?}"),
    }
    assert!(
        setup
            .store
            .get_credential(&authenticator.credential_id())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_foreign_origin_rejected_for_authentication() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();
    register(&setup, &authenticator, "alice").await;

    let options = setup
        .coordinator
        .begin_authentication(Some("alice"))
        .await
        .unwrap();
    let assertion = authenticator.assert(&options.challenge, EVIL_ORIGIN, 1);
    let result = setup
        .coordinator
        .complete_authentication(
            &options.challenge_id,
            &authenticator.credential_id(),
            &assertion.client_data_json,
            &assertion.authenticator_data,
            &assertion.signature,
            None,
        )
        .await;

    assert!(matches!(result, Err(PasskeyError::OriginMismatch { .. })));
    assert_eq!(stored_count(&setup, &authenticator).await, 0);
}

#[tokio::test]
async fn test_flipped_signature_bit_rejected() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();
    register(&setup, &authenticator, "alice").await;

    let options = setup
        .coordinator
        .begin_authentication(Some("alice"))
        .await
        .unwrap();
    let mut assertion = authenticator.assert(&options.challenge, ORIGIN, 1);
    let last = assertion.signature.len() - 1;
    assertion.signature[last] ^= 0x01;

    let result = setup
        .coordinator
        .complete_authentication(
            &options.challenge_id,
            &authenticator.credential_id(),
            &assertion.client_data_json,
            &assertion.authenticator_data,
            &assertion.signature,
            None,
        )
        .await;
    assert!(matches!(result, Err(PasskeyError::SignatureInvalid)));
    assert_eq!(stored_count(&setup, &authenticator).await, 0);
}

#[tokio::test]
async fn test_credential_for_other_rp_rejected() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::for_rp("other.example");

    let options = setup
        .coordinator
        .begin_registration("alice", "Alice")
        .await
        .unwrap();
    let (client_data, attestation_object) = authenticator.attest(&options.challenge, ORIGIN);
    let result = setup
        .coordinator
        .complete_registration(&options.challenge_id, &client_data, &attestation_object, vec![])
        .await;
    assert!(matches!(result, Err(PasskeyError::RpIdMismatch)));
}

#[tokio::test]
async fn test_none_attestation_policy_from_config() {
    let setup = TestSetup::with_config(test_config().with_allow_none_attestation(false));
    let authenticator = SoftAuthenticator::new();

    let options = setup
        .coordinator
        .begin_registration("alice", "Alice")
        .await
        .unwrap();
    let (client_data, attestation_object) = authenticator.attest(&options.challenge, ORIGIN);
    let result = setup
        .coordinator
        .complete_registration(&options.challenge_id, &client_data, &attestation_object, vec![])
        .await;
    assert!(matches!(
        result,
        Err(PasskeyError::AttestationVerificationFailed(_))
    ));
}

#[tokio::test]
async fn test_browser_json_round_trip() {
    let setup = TestSetup::new();
    let authenticator = SoftAuthenticator::new();

    // Options serialize to the JSON shape navigator.credentials.create expects
    let options = setup
        .coordinator
        .begin_registration("alice", "Alice")
        .await
        .unwrap();
    let json = serde_json::to_value(&options).unwrap();
    assert_eq!(crate::common::unb64(&options.challenge).len(), 32);
    assert_eq!(json["rp"]["id"], "example.com");
    assert_eq!(json["user"]["name"], "alice");
    assert_eq!(json["timeout"], 60000);
    assert!(json["challengeId"].is_string());
    assert!(json["excludeCredentials"].as_array().unwrap().is_empty());

    let response = authenticator.registration_response(&options.challenge, ORIGIN);
    let record = setup
        .coordinator
        .complete_registration_response(&options.challenge_id, &response)
        .await
        .unwrap();
    assert_eq!(record.transports, vec!["internal".to_string()]);

    // Usernameless sign-in with the browser's assertion JSON
    let options = setup.coordinator.begin_authentication(None).await.unwrap();
    let json = serde_json::to_value(&options).unwrap();
    assert_eq!(json["rpId"], "example.com");
    assert_eq!(json["userVerification"], "preferred");
    assert!(json["allowCredentials"].as_array().unwrap().is_empty());

    let assertion = authenticator.assert(&options.challenge, ORIGIN, 1);
    let credential_id = crate::common::b64(authenticator.credential_id().as_bytes());
    let response = serde_json::from_value(serde_json::json!({
        "id": credential_id,
        "rawId": credential_id,
        "type": "public-key",
        "response": {
            "clientDataJSON": crate::common::b64(&assertion.client_data_json),
            "authenticatorData": crate::common::b64(&assertion.authenticator_data),
            "signature": crate::common::b64(&assertion.signature),
            "userHandle": record.owner_handle.to_base64url(),
        }
    }))
    .unwrap();
    let handle = setup
        .coordinator
        .complete_authentication_response(&options.challenge_id, &response)
        .await
        .unwrap();
    assert_eq!(handle, record.owner_handle);
}

#[tokio::test]
async fn test_malformed_response_rejected() {
    let setup = TestSetup::new();
    let options = setup.coordinator.begin_authentication(None).await.unwrap();

    let response = serde_json::from_value(serde_json::json!({
        "id": "AAAA",
        "rawId": "AAAA",
        "type": "public-key",
        "response": {
            "clientDataJSON": "not base64!",
            "authenticatorData": "",
            "signature": "",
        }
    }))
    .unwrap();
    let result = setup
        .coordinator
        .complete_authentication_response(&options.challenge_id, &response)
        .await;
    assert!(matches!(result, Err(PasskeyError::MalformedInput(_))));
}
