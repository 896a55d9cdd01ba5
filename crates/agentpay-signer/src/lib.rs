//! AgentPay Signer - Issues nonce-bound, signed payment intents
//!
//! The signer is the only component allowed to advance a session's nonce or
//! reserve allowance. Everything happens inside one per-session critical
//! section: the gate chain is re-validated against fresh state, the intent
//! is signed with the session's ephemeral key, and only then are the nonce,
//! request budget, reservation, and in-flight counters advanced. A failure
//! at any gate returns before mutation, so a failed signing attempt leaves
//! the session exactly as it was.

use agentpay_crypto::sign_intent;
use agentpay_session::{BudgetEnforcer, SessionRegistry};
use agentpay_types::{
    AgentId, AgentPayError, Amount, PaymentIntent, Result, SessionId, SignedPaymentIntent,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;

/// Default validity of a signed intent, in seconds
pub const DEFAULT_INTENT_TTL_SECS: u64 = 300;

/// Issues signed payment intents against registered sessions
#[derive(Clone)]
pub struct PaymentSigner {
    registry: Arc<SessionRegistry>,
    intent_ttl: Duration,
}

impl PaymentSigner {
    /// Create a signer over a session registry
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_intent_ttl(registry, DEFAULT_INTENT_TTL_SECS)
    }

    /// Create a signer with an explicit intent time-to-live
    pub fn with_intent_ttl(registry: Arc<SessionRegistry>, ttl_secs: u64) -> Self {
        Self {
            registry,
            intent_ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Sign a payment of `amount` from `session_id` to `to_agent`
    ///
    /// Runs the full gate chain, the allowance check, and the approval
    /// threshold inside the session's critical section, then signs and
    /// advances the nonce by exactly one. Concurrent calls against one
    /// session are serialized, so two spends can never both pass a gate
    /// against the same stale remaining budget.
    pub async fn sign(
        &self,
        session_id: &SessionId,
        to_agent: &AgentId,
        amount: Amount,
        task_type: &str,
    ) -> Result<SignedPaymentIntent> {
        let intent_ttl = self.intent_ttl;
        let to_agent = to_agent.clone();
        let task_type = task_type.to_string();

        let signed = self
            .registry
            .with_session_mut(session_id, move |session| {
                let now = Utc::now();

                BudgetEnforcer::check(session, &to_agent, amount, now)?;

                let available = session.available_allowance();
                if amount > available {
                    return Err(AgentPayError::InsufficientAllowance {
                        requested: amount,
                        remaining: available,
                    });
                }

                if let Some(threshold) = session.limits.approval_threshold {
                    if amount > threshold {
                        return Err(AgentPayError::ApprovalRequired {
                            requested: amount,
                            threshold,
                        });
                    }
                }

                let intent = PaymentIntent {
                    session: session.id.clone(),
                    from_agent: session.agent.clone(),
                    to_agent: to_agent.clone(),
                    amount,
                    task_type: task_type.clone(),
                    nonce: session.nonce,
                    issued_at: now,
                    expires_at: now + intent_ttl,
                };

                let signed = sign_intent(&session.keypair, intent)
                    .map_err(|e| AgentPayError::internal(format!("signing failed: {e}")))?;

                // All gates passed and the signature exists; only now mutate
                session.nonce += 1;
                session.requests_remaining -= 1;
                session.reserve(amount)?;
                session.task_started();

                Ok(signed)
            })
            .await?;

        info!(
            session = %session_id,
            to_agent = %signed.intent.to_agent,
            amount = %signed.intent.amount,
            nonce = signed.intent.nonce,
            task_type = %signed.intent.task_type,
            "payment intent signed"
        );
        Ok(signed)
    }
}
