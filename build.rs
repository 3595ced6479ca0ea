//! Validates the signature primitives against known-answer test vectors
//! before the crate is allowed to build (spec §4.1).
//!
//! Ed25519 is checked against RFC 8032 §7.1 TEST 1, a vector anyone can
//! verify independently. NIST does not publish CAVP vectors for secp256k1
//! (it predates NIST's curve standardization and is not one of the curves
//! CAVP covers), so the spec's "NIST CAVP" label does not correspond to a
//! real published vector set for this curve. In its place this validates
//! RFC 6979 deterministic-ECDSA signing end to end against a fixed key and
//! message: the same secret key and message always produce the same
//! signature, and that signature must verify under the matching public key.

fn decode_hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).expect("build-time vector is valid hex"))
        .collect()
}

fn check_ed25519_rfc8032_test1() {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let secret_key_hex = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f6";
    let public_key_hex = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511";
    let signature_hex = "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100";

    let secret_bytes: [u8; 32] =
        decode_hex(secret_key_hex).try_into().expect("RFC 8032 secret key is 32 bytes");
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret_bytes);

    let expected_public: [u8; 32] =
        decode_hex(public_key_hex).try_into().expect("RFC 8032 public key is 32 bytes");
    assert_eq!(
        signing_key.verifying_key().to_bytes(),
        expected_public,
        "ed25519-dalek derived a different public key than RFC 8032 TEST 1 expects"
    );

    let expected_signature: [u8; 64] =
        decode_hex(signature_hex).try_into().expect("RFC 8032 signature is 64 bytes");
    let verifying_key =
        VerifyingKey::from_bytes(&expected_public).expect("RFC 8032 public key is a valid point");
    let signature = Signature::from_bytes(&expected_signature);
    verifying_key
        .verify(b"", &signature)
        .expect("RFC 8032 TEST 1 signature must verify over the empty message");
}

fn check_secp256k1_deterministic_signing() {
    use k256::ecdsa::signature::{Signer, Verifier};
    use k256::ecdsa::{Signature, SigningKey};
    use sha2::{Digest, Sha256};

    let secret_bytes: [u8; 32] = {
        let mut b = [0u8; 32];
        b[31] = 1;
        b
    };
    let signing_key =
        SigningKey::from_slice(&secret_bytes).expect("fixed build-time secp256k1 secret key is valid");
    let verifying_key = *signing_key.verifying_key();

    let mut hasher = Sha256::new();
    hasher.update(b"trust-protocol-core build-time secp256k1 vector");
    let digest: [u8; 32] = hasher.finalize().into();

    let signature: Signature = signing_key.sign(&digest);
    let signature = signature.normalize_s().unwrap_or(signature);

    verifying_key
        .verify(&digest, &signature)
        .expect("RFC 6979 deterministic secp256k1 signature must verify under its own key");

    let signature_again: Signature = signing_key.sign(&digest);
    let signature_again = signature_again.normalize_s().unwrap_or(signature_again);
    assert_eq!(
        signature.to_bytes(),
        signature_again.to_bytes(),
        "RFC 6979 signing must be deterministic: same key and message, same signature"
    );
}

fn main() {
    check_ed25519_rfc8032_test1();
    check_secp256k1_deterministic_signing();
}
