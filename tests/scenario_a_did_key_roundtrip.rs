//! Spec §8 Scenario A — `did:key` Ed25519 round-trip.

use std::sync::Arc;

use trust_protocol_core::crypto::Algorithm;
use trust_protocol_core::did::key::KeyDriver;
use trust_protocol_core::did::{DidDriver, ResolutionOptions};
use trust_protocol_core::kms::local::LocalKms;
use trust_protocol_core::kms::{KeyManager, KeyPurpose};
use trust_protocol_core::multibase::{self, KeyType};
use trust_protocol_core::resolver::UniversalResolver;
use trust_protocol_core::vc::issuer;
use trust_protocol_core::vc::verifier::{self, SystemClock, VerifyOptions};
use trust_protocol_core::vc::CredentialTemplate;

#[tokio::test]
async fn resolves_the_scenario_fixture_without_any_network_call() {
    let driver = KeyDriver::new();
    let did = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK";

    let result = driver.resolve(did, &ResolutionOptions::default()).await;

    assert!(result.is_ok());
    let document = result.did_document.unwrap();
    assert_eq!(document.verification_method.len(), 1);
    let vm = &document.verification_method[0];
    assert_eq!(vm.type_, "Ed25519VerificationKey2020");
    assert_eq!(vm.public_key_multibase.as_deref(), Some("z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK"));
}

#[tokio::test]
async fn issues_and_reverifies_a_credential_under_a_freshly_generated_key() {
    let kms = LocalKms::from_passphrase(b"scenario a passphrase");
    let key_ref = kms.generate(Algorithm::Ed25519, KeyPurpose::CredentialIssuance).await.unwrap();
    let public_key = kms.public_key(&key_ref.key_id).await.unwrap();
    let multikey = multibase::encode_multikey(KeyType::Ed25519, &public_key);
    let issuer_did = format!("did:key:{multikey}");

    let mut resolver = UniversalResolver::new();
    resolver.register(Arc::new(KeyDriver::new()));

    let template = CredentialTemplate {
        credential_subject: serde_json::json!({"id": "did:key:zSubjectExample"}),
        ..Default::default()
    };
    let credential = issuer::issue(template, &issuer_did, &multikey, &key_ref, &kms).await.unwrap();

    let result =
        verifier::verify(&credential, &resolver, &SystemClock, None, VerifyOptions::default()).await;

    assert!(result.valid, "{result:?}");
}
