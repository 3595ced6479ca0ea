//! Credential issuance (spec §4.6 `Issue`).

use chrono::Utc;

use super::{BASE_CONTEXT, CredentialTemplate, Issuer, Proof, ProofType, VerifiableCredential};
use crate::canon::canonicalize_to_string;
use crate::crypto::Algorithm;
use crate::error::{Error, Result};
use crate::kms::KeyManager;
use crate::kms::KeyReference;
use crate::multibase::encode_base58btc;

fn proof_type_for(algorithm: Algorithm) -> ProofType {
    match algorithm {
        Algorithm::Ed25519 => ProofType::Ed25519Signature2020,
        Algorithm::Secp256k1 => ProofType::EcdsaSecp256k1Signature2019,
    }
}

/// Issue a credential from `template`, signed by `key_ref` (via `kms`) as
/// `issuer_did`. `key_fragment` becomes the `#fragment` of
/// `proof.verificationMethod`; it must name a key listed in the issuer's
/// `assertionMethod`.
///
/// Steps follow spec §4.6 exactly: build the unsigned credential, attach a
/// proof skeleton without `proofValue`, canonicalize the whole thing, sign,
/// then attach `proofValue`.
///
/// # Errors
///
/// Returns [`Error::Canonicalization`] if the assembled credential cannot be
/// canonicalized, or any error the underlying [`KeyManager::sign`] call
/// produces.
pub async fn issue(
    template: CredentialTemplate, issuer_did: &str, key_fragment: &str, key_ref: &KeyReference,
    kms: &dyn KeyManager,
) -> Result<VerifiableCredential> {
    let issuance_date = Utc::now();

    let mut context = vec![BASE_CONTEXT.to_string()];
    context.extend(template.extra_context);

    let mut type_ = vec!["VerifiableCredential".to_string()];
    type_.extend(template.extra_types);

    let mut vc = VerifiableCredential {
        context,
        id: template.id,
        type_,
        issuer: Issuer::Did(issuer_did.to_string()),
        issuance_date,
        expiration_date: template.expiration_date,
        not_before: template.not_before,
        credential_subject: template.credential_subject,
        credential_status: template.credential_status,
        proof: None,
    };

    let verification_method = format!("{issuer_did}#{key_fragment}");
    let proof_skeleton = Proof {
        type_: proof_type_for(key_ref.algorithm),
        created: issuance_date,
        verification_method: verification_method.clone(),
        proof_purpose: "assertionMethod".to_string(),
        proof_value: None,
    };
    vc.proof = Some(proof_skeleton);

    let signing_input = canonicalize_to_string(&serde_json::to_value(&vc).map_err(|e| {
        Error::Canonicalization { message: format!("credential did not serialize: {e}") }
    })?)?;

    let signature_bytes = match key_ref.algorithm {
        Algorithm::Secp256k1 => {
            let digest = crate::crypto::sha256(signing_input.as_bytes());
            kms.sign(&key_ref.key_id, &digest).await?
        }
        Algorithm::Ed25519 => kms.sign(&key_ref.key_id, signing_input.as_bytes()).await?,
    };

    let proof_value = format!("z{}", encode_base58btc(&signature_bytes));

    if let Some(proof) = vc.proof.as_mut() {
        proof.proof_value = Some(proof_value);
    }

    Ok(vc)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::kms::KeyPurpose;
    use crate::kms::local::LocalKms;

    #[tokio::test]
    async fn issues_credential_with_well_formed_proof() {
        let kms = LocalKms::from_passphrase(b"test passphrase for issuance");
        let key_ref = kms.generate(Algorithm::Ed25519, KeyPurpose::CredentialIssuance).await.unwrap();

        let template = CredentialTemplate {
            credential_subject: json!({"id": "did:key:zSubject", "role": "agent"}),
            ..Default::default()
        };

        let vc = issue(template, "did:key:zIssuer", "key-0", &key_ref, &kms).await.unwrap();
        assert_eq!(vc.context[0], BASE_CONTEXT);
        assert!(vc.type_.contains(&"VerifiableCredential".to_string()));
        let proof = vc.proof.unwrap();
        assert_eq!(proof.verification_method, "did:key:zIssuer#key-0");
        assert!(proof.proof_value.unwrap().starts_with('z'));
    }
}
