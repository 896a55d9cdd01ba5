//! Payment-intent signing and verification

use crate::{keys::parse_public_key, CryptoError, CryptoResult, SessionKeypair};
use agentpay_types::{PaymentIntent, SignedPaymentIntent};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier};

/// Types whose canonical bytes can be signed
pub trait Signable {
    /// Get the bytes to sign
    fn signable_bytes(&self) -> CryptoResult<Vec<u8>>;
}

impl Signable for PaymentIntent {
    /// Canonical bytes: JSON encoding in declared field order
    fn signable_bytes(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CryptoError::EncodingFailed(e.to_string()))
    }
}

/// Sign a payment intent with the session's ephemeral key
pub fn sign_intent(
    keypair: &SessionKeypair,
    intent: PaymentIntent,
) -> CryptoResult<SignedPaymentIntent> {
    let bytes = intent.signable_bytes()?;
    let signature = keypair
        .signing_key()
        .try_sign(&bytes)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    Ok(SignedPaymentIntent {
        intent,
        signature: hex::encode(signature.to_bytes()),
        signer_public_key: keypair.public_key_hex(),
    })
}

/// Verify a signed intent against its embedded public key
///
/// Returns `Ok(false)` for a well-formed signature that does not verify;
/// malformed signatures or keys are errors.
pub fn verify_intent(signed: &SignedPaymentIntent) -> CryptoResult<bool> {
    let signature_bytes =
        hex::decode(&signed.signature).map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;

    if signature_bytes.len() != 64 {
        return Err(CryptoError::VerificationFailed(
            "Signature must be 64 bytes".to_string(),
        ));
    }

    let mut sig_array = [0u8; 64];
    sig_array.copy_from_slice(&signature_bytes);
    let signature = Ed25519Signature::from_bytes(&sig_array);

    let verifying_key = parse_public_key(&signed.signer_public_key)?;
    let bytes = signed.intent.signable_bytes()?;

    match verifying_key.verify(&bytes, &signature) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
