//! Ephemeral session key management

use crate::{CryptoError, CryptoResult};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// The ephemeral keypair bound to one session for its lifetime
///
/// Generated at session creation, never rotated mid-session. The signing
/// key stays inside the session record; only the verifying key is shared.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionKeypair {
    signing_key: SigningKey,
}

impl SessionKeypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    /// Create from existing signing key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Get the signing key (private - never expose!)
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Get the verifying key (public)
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the public key as hex string
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().as_bytes())
    }
}

// Debug must not leak the private key
impl std::fmt::Debug for SessionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeypair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl PartialEq for SessionKeypair {
    fn eq(&self, other: &Self) -> bool {
        self.signing_key.to_bytes() == other.signing_key.to_bytes()
    }
}

/// Parse a hex-encoded ed25519 public key
pub fn parse_public_key(hex_key: &str) -> CryptoResult<VerifyingKey> {
    let bytes = hex::decode(hex_key).map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;

    if bytes.len() != 32 {
        return Err(CryptoError::InvalidKeyFormat(
            "Public key must be 32 bytes".to_string(),
        ));
    }

    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&bytes);

    VerifyingKey::from_bytes(&key_bytes).map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))
}
