//! AgentPay Settlement - Verification boundary to the external ledger
//!
//! The core depends only on the `SettlementVerifier` contract, so
//! verification strength is swappable without touching budget logic. Two
//! strategies exist and are chosen by explicit configuration, never
//! inferred per call:
//!
//! - **Fast-path**: accept a cryptographically valid intent while it is
//!   fresh. Bounded replay risk; for low-stakes, non-production use only.
//! - **Full-path**: submit to a `SettlementBackend` and block until the
//!   underlying ledger reports finality, then require the settled amount
//!   to match the expected amount exactly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use agentpay_crypto::{intent_hash, verify_intent};
use agentpay_types::{AgentPayError, Amount, Result, SignedPaymentIntent};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Which verification strategy a deployment runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationMode {
    /// Freshness-window acceptance; low-stakes environments only
    FastPath,
    /// Block until ledger finality and exact amount match
    Full,
}

impl std::fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FastPath => write!(f, "fast-path"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Proof of a confirmed settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    /// Hash of the settled intent's canonical bytes
    pub intent_hash: String,
    /// Ledger confirmation height, when the backend reports one
    pub confirmation_height: Option<u64>,
    pub fee: Amount,
    pub settled_amount: Amount,
    pub confirmed_at: DateTime<Utc>,
}

/// Finality state the backend reports for a submitted settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalityReport {
    pub finalized: bool,
    pub settled_amount: Option<Amount>,
    pub confirmation_height: Option<u64>,
    pub fee: Amount,
}

/// Contract the external ledger must satisfy for full verification
#[async_trait]
pub trait SettlementBackend: Send + Sync {
    /// Submit a signed intent; returns an opaque settlement reference
    async fn submit(&self, intent: &SignedPaymentIntent) -> Result<String>;

    /// Current finality state of a submitted settlement
    async fn finality(&self, reference: &str) -> Result<FinalityReport>;
}

/// Confirms signed intents against the underlying ledger
#[async_trait]
pub trait SettlementVerifier: Send + Sync {
    /// The strategy this verifier runs; fixed at construction
    fn mode(&self) -> VerificationMode;

    /// Confirm `intent` settles for exactly `expected_amount`
    async fn verify(
        &self,
        intent: &SignedPaymentIntent,
        expected_amount: Amount,
    ) -> Result<SettlementReceipt>;
}

/// Signature and expiry checks shared by both strategies
fn check_intent(intent: &SignedPaymentIntent, now: DateTime<Utc>) -> Result<()> {
    let valid = verify_intent(intent).map_err(|e| AgentPayError::InvalidSignature {
        reason: e.to_string(),
    })?;
    if !valid {
        return Err(AgentPayError::InvalidSignature {
            reason: "signature does not match signer public key".to_string(),
        });
    }
    if intent.intent.is_expired(now) {
        return Err(AgentPayError::SettlementFailed {
            reason: format!("intent expired at {}", intent.intent.expires_at.to_rfc3339()),
        });
    }
    Ok(())
}

/// Accepts fresh, validly signed intents without waiting for finality
pub struct FastPathVerifier {
    freshness: Duration,
}

impl FastPathVerifier {
    /// Create a fast-path verifier with the given freshness window
    pub fn new(freshness_secs: u64) -> Self {
        warn!(
            freshness_secs,
            "fast-path settlement verification enabled; replay risk is bounded only by the freshness window"
        );
        Self {
            freshness: Duration::seconds(freshness_secs as i64),
        }
    }
}

#[async_trait]
impl SettlementVerifier for FastPathVerifier {
    fn mode(&self) -> VerificationMode {
        VerificationMode::FastPath
    }

    async fn verify(
        &self,
        intent: &SignedPaymentIntent,
        expected_amount: Amount,
    ) -> Result<SettlementReceipt> {
        let now = Utc::now();
        check_intent(intent, now)?;

        if intent.intent.age(now) > self.freshness {
            return Err(AgentPayError::SettlementFailed {
                reason: format!(
                    "intent issued {}s ago, outside the {}s freshness window",
                    intent.intent.age(now).num_seconds(),
                    self.freshness.num_seconds()
                ),
            });
        }

        if intent.intent.amount != expected_amount {
            return Err(AgentPayError::SettlementFailed {
                reason: format!(
                    "amount mismatch: intent {} vs expected {}",
                    intent.intent.amount, expected_amount
                ),
            });
        }

        let hash = intent_hash(&intent.intent)
            .map_err(|e| AgentPayError::internal(format!("hashing failed: {e}")))?;

        Ok(SettlementReceipt {
            intent_hash: hash,
            confirmation_height: None,
            fee: Amount::ZERO,
            settled_amount: expected_amount,
            confirmed_at: now,
        })
    }
}

/// Blocks until the backend reports finality, then requires an exact match
pub struct FullVerifier {
    backend: Arc<dyn SettlementBackend>,
    poll_interval: StdDuration,
}

impl FullVerifier {
    /// Create a full verifier polling the backend at the given interval
    pub fn new(backend: Arc<dyn SettlementBackend>, poll_interval: StdDuration) -> Self {
        Self {
            backend,
            poll_interval,
        }
    }
}

#[async_trait]
impl SettlementVerifier for FullVerifier {
    fn mode(&self) -> VerificationMode {
        VerificationMode::Full
    }

    async fn verify(
        &self,
        intent: &SignedPaymentIntent,
        expected_amount: Amount,
    ) -> Result<SettlementReceipt> {
        check_intent(intent, Utc::now())?;

        let reference = self.backend.submit(intent).await?;

        // Blocks until finality; the caller bounds this with the session's
        // task timeout.
        let report = loop {
            let report = self.backend.finality(&reference).await?;
            if report.finalized {
                break report;
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        let settled = report
            .settled_amount
            .ok_or_else(|| AgentPayError::SettlementFailed {
                reason: "ledger finalized without a settled amount".to_string(),
            })?;
        if settled != expected_amount {
            return Err(AgentPayError::SettlementFailed {
                reason: format!(
                    "settled amount {} does not match expected {}",
                    settled, expected_amount
                ),
            });
        }

        info!(reference = %reference, amount = %settled, "settlement finalized");
        Ok(SettlementReceipt {
            intent_hash: reference,
            confirmation_height: report.confirmation_height,
            fee: report.fee,
            settled_amount: settled,
            confirmed_at: Utc::now(),
        })
    }
}

/// In-memory settlement backend for tests and single-process demos
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<RwLock<HashMap<String, FinalityReport>>>,
    /// When set, submissions finalize immediately at the intent amount
    auto_finalize: bool,
}

impl InMemoryBackend {
    /// Backend where every submission finalizes immediately
    pub fn auto_finalizing() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            auto_finalize: true,
        }
    }

    /// Backend where submissions stay unfinalized until `finalize` is called
    pub fn manual() -> Self {
        Self::default()
    }

    /// Mark a submission finalized at `settled_amount`
    pub async fn finalize(&self, reference: &str, settled_amount: Amount) {
        if let Some(entry) = self.entries.write().await.get_mut(reference) {
            entry.finalized = true;
            entry.settled_amount = Some(settled_amount);
        }
    }
}

#[async_trait]
impl SettlementBackend for InMemoryBackend {
    async fn submit(&self, intent: &SignedPaymentIntent) -> Result<String> {
        let reference = intent_hash(&intent.intent)
            .map_err(|e| AgentPayError::internal(format!("hashing failed: {e}")))?;

        let mut entries = self.entries.write().await;
        let height = entries.len() as u64 + 1;
        entries.entry(reference.clone()).or_insert(FinalityReport {
            finalized: self.auto_finalize,
            settled_amount: self.auto_finalize.then_some(intent.intent.amount),
            confirmation_height: Some(height),
            fee: Amount::ZERO,
        });
        Ok(reference)
    }

    async fn finality(&self, reference: &str) -> Result<FinalityReport> {
        self.entries
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| AgentPayError::SettlementFailed {
                reason: format!("unknown settlement reference {reference}"),
            })
    }
}
