//! Payment intent types for AgentPay
//!
//! A payment intent is a nonce-bound assertion that one session authorizes
//! exactly one spend. The signed form carries an ed25519 signature over the
//! canonical payload bytes and is verifiable by third parties.

use crate::{AgentId, Amount, SessionId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Canonical payment intent payload
///
/// Field order is the canonical serialization order; the signature covers
/// the serialized bytes of this struct exactly as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub session: SessionId,
    pub from_agent: AgentId,
    pub to_agent: AgentId,
    pub amount: Amount,
    pub task_type: String,
    /// Monotonic per-session counter; never reused
    pub nonce: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Check if the intent has expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time elapsed since issuance
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.issued_at
    }
}

/// A payment intent plus its detached signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPaymentIntent {
    pub intent: PaymentIntent,
    /// Hex-encoded ed25519 signature over the canonical intent bytes
    pub signature: String,
    /// Hex-encoded public key of the session's ephemeral signing key
    pub signer_public_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_intent(now: DateTime<Utc>) -> PaymentIntent {
        PaymentIntent {
            session: SessionId::new(),
            from_agent: AgentId::new(),
            to_agent: AgentId::new(),
            amount: Amount::new(250),
            task_type: "translation".to_string(),
            nonce: 7,
            issued_at: now,
            expires_at: now + Duration::seconds(300),
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let intent = test_intent(now);
        assert!(!intent.is_expired(now));
        assert!(intent.is_expired(now + Duration::seconds(301)));
    }

    #[test]
    fn test_canonical_field_order_is_stable() {
        let now = Utc::now();
        let intent = test_intent(now);
        let bytes = serde_json::to_vec(&intent).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let session_pos = text.find("\"session\"").unwrap();
        let nonce_pos = text.find("\"nonce\"").unwrap();
        let expires_pos = text.find("\"expires_at\"").unwrap();
        assert!(session_pos < nonce_pos && nonce_pos < expires_pos);
    }
}
