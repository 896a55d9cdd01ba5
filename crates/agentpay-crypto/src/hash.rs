//! Hashing utilities for settlement receipts

use crate::{CryptoResult, Signable};
use agentpay_types::PaymentIntent;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA-256 hash and return as hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Settlement hash of a payment intent: SHA-256 over its canonical bytes
pub fn intent_hash(intent: &PaymentIntent) -> CryptoResult<String> {
    Ok(sha256_hex(&intent.signable_bytes()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpay_types::{AgentId, Amount, SessionId};
    use chrono::{Duration, Utc};

    #[test]
    fn test_intent_hash_is_deterministic() {
        let now = Utc::now();
        let intent = PaymentIntent {
            session: SessionId::new(),
            from_agent: AgentId::new(),
            to_agent: AgentId::new(),
            amount: Amount::new(42),
            task_type: "scrape".to_string(),
            nonce: 3,
            issued_at: now,
            expires_at: now + Duration::seconds(60),
        };

        let h1 = intent_hash(&intent).unwrap();
        let h2 = intent_hash(&intent).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_different_data_different_hash() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }
}
