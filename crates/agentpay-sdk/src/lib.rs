//! AgentPay SDK - High-level API for delegated agent spending
//!
//! The SDK wires the session registry, budget enforcer, payment signer,
//! transaction ledger, and settlement verifier into one facade. Designed
//! for the 5-minute experience - from zero to first signed payment.
//!
//! # Flow
//!
//! ```text
//! create_session → sign_payment → (external submission) → settle_payment
//! ```
//!
//! Signing is optimistic: it reserves budget and records a pending
//! transaction. Only a confirmed settlement debits the session's budgets.
//!
//! # Quick Start
//!
//! ```ignore
//! use agentpay_sdk::{AgentPay, CreateSessionRequest, SignPaymentRequest};
//! use agentpay_types::{AgentId, Amount, PrincipalId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pay = AgentPay::in_memory();
//!
//!     let session = pay
//!         .create_session(
//!             CreateSessionRequest::new(PrincipalId::new(), AgentId::new())
//!                 .with_allowance(Amount::new(5_000))
//!                 .with_max_requests(20)
//!                 .with_duration_secs(3600),
//!         )
//!         .await?;
//!
//!     let auth = pay
//!         .sign_payment(SignPaymentRequest {
//!             session_id: session.session_id.clone(),
//!             to_agent: AgentId::new(),
//!             amount: Amount::new(250),
//!             task_type: "inference".to_string(),
//!             calling_agent: None,
//!         })
//!         .await?;
//!
//!     let receipt = pay
//!         .settle_payment(&session.session_id, &auth.transaction_id, &auth.intent)
//!         .await?;
//!     println!("settled: {}", receipt.intent_hash);
//!     Ok(())
//! }
//! ```

pub use agentpay_types::*;

pub use agentpay_ledger::TransactionLedger;
pub use agentpay_session::{
    BudgetEnforcer, InMemorySessionStore, SessionDefaults, SessionRegistry, SessionStore,
};
pub use agentpay_settlement::{
    FastPathVerifier, FullVerifier, InMemoryBackend, SettlementBackend, SettlementReceipt,
    SettlementVerifier, VerificationMode,
};
pub use agentpay_signer::PaymentSigner;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod telemetry;

// ============================================================================
// Configuration
// ============================================================================

/// SDK configuration
///
/// The verification mode is fixed here, once, per deployment. It is an
/// explicit, auditable choice - never inferred per call.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settlement verification strategy
    pub verification: VerificationMode,
    /// Validity of signed intents, in seconds
    pub intent_ttl_secs: u64,
    /// Fast-path freshness window, in seconds
    pub fastpath_freshness_secs: u64,
    /// Full-path finality polling interval
    pub settlement_poll_interval: Duration,
    /// Defaults for sessions created without overrides
    pub session_defaults: SessionDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verification: VerificationMode::Full,
            intent_ttl_secs: 300,
            fastpath_freshness_secs: 60,
            settlement_poll_interval: Duration::from_millis(250),
            session_defaults: SessionDefaults::default(),
        }
    }
}

// ============================================================================
// API Types
// ============================================================================

/// Session creation request
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub principal: PrincipalId,
    pub agent: AgentId,
    pub overrides: SessionOverrides,
}

impl CreateSessionRequest {
    pub fn new(principal: PrincipalId, agent: AgentId) -> Self {
        Self {
            principal,
            agent,
            overrides: SessionOverrides::default(),
        }
    }

    pub fn with_allowance(mut self, allowance: Amount) -> Self {
        self.overrides.allowance = Some(allowance);
        self
    }

    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.overrides.max_requests = Some(max_requests);
        self
    }

    pub fn with_duration_secs(mut self, duration_secs: u64) -> Self {
        self.overrides.duration_secs = Some(duration_secs);
        self
    }

    pub fn with_overrides(mut self, overrides: SessionOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Echo of a created session; the id is the opaque handle callers keep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub principal: PrincipalId,
    pub agent: AgentId,
    pub allowance: Amount,
    pub max_requests: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Payment signing request
#[derive(Debug, Clone)]
pub struct SignPaymentRequest {
    pub session_id: SessionId,
    pub to_agent: AgentId,
    pub amount: Amount,
    pub task_type: String,
    /// Originating agent for agent-to-agent call chains
    pub calling_agent: Option<AgentId>,
}

/// A signed payment plus the session headroom left after signing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    pub transaction_id: TransactionId,
    pub intent: SignedPaymentIntent,
    /// Allowance still available to new intents
    pub allowance_remaining: Amount,
    pub requests_remaining: u32,
}

// ============================================================================
// Facade
// ============================================================================

/// The AgentPay core: session lifecycle, signed payments, budgets,
/// history, and the settlement boundary
#[derive(Clone)]
pub struct AgentPay {
    registry: Arc<SessionRegistry>,
    ledger: TransactionLedger,
    signer: PaymentSigner,
    verifier: Arc<dyn SettlementVerifier>,
}

impl AgentPay {
    /// Fully in-memory instance with default configuration
    pub fn in_memory() -> Self {
        Self::with_config(Config::default())
    }

    /// In-memory instance with explicit configuration
    pub fn with_config(config: Config) -> Self {
        let backend: Arc<dyn SettlementBackend> = Arc::new(InMemoryBackend::auto_finalizing());
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        Self::new(config, store, backend)
    }

    /// Build over an injected store and settlement backend
    pub fn new(
        config: Config,
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn SettlementBackend>,
    ) -> Self {
        let verifier: Arc<dyn SettlementVerifier> = match config.verification {
            VerificationMode::FastPath => {
                Arc::new(FastPathVerifier::new(config.fastpath_freshness_secs))
            }
            VerificationMode::Full => {
                Arc::new(FullVerifier::new(backend, config.settlement_poll_interval))
            }
        };
        Self::with_verifier(config, store, verifier)
    }

    /// Build over an injected store and verifier
    pub fn with_verifier(
        config: Config,
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn SettlementVerifier>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::with_defaults(
            store,
            config.session_defaults.clone(),
        ));
        let ledger = TransactionLedger::new(registry.clone());
        let signer = PaymentSigner::with_intent_ttl(registry.clone(), config.intent_ttl_secs);

        info!(
            verification = %verifier.mode(),
            intent_ttl_secs = config.intent_ttl_secs,
            "agentpay initialized"
        );

        Self {
            registry,
            ledger,
            signer,
            verifier,
        }
    }

    /// The underlying registry, for session administration
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The underlying ledger, for direct record access
    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    /// Create a session and return its opaque id with echoed parameters
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionSummary> {
        let session = self
            .registry
            .create(request.principal, request.agent, request.overrides)
            .await?;

        Ok(SessionSummary {
            session_id: session.id,
            principal: session.principal,
            agent: session.agent,
            allowance: session.limits.allowance,
            max_requests: session.limits.max_requests,
            created_at: session.created_at,
            expires_at: session.expires_at,
        })
    }

    /// Merge mutable fields into a live session
    pub async fn update_session(
        &self,
        session_id: &SessionId,
        update: SessionUpdate,
    ) -> Result<SessionSummary> {
        let session = self.registry.update(session_id, update).await?;
        Ok(SessionSummary {
            session_id: session.id,
            principal: session.principal,
            agent: session.agent,
            allowance: session.limits.allowance,
            max_requests: session.limits.max_requests,
            created_at: session.created_at,
            expires_at: session.expires_at,
        })
    }

    /// Pause a session; every subsequent spend fails `SessionPaused`
    pub async fn pause_session(
        &self,
        session_id: &SessionId,
        reason: impl Into<String>,
    ) -> Result<()> {
        self.registry.pause(session_id, reason).await
    }

    /// Resume a paused session without resetting any counter
    pub async fn resume_session(&self, session_id: &SessionId) -> Result<()> {
        self.registry.resume(session_id).await
    }

    // ------------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------------

    /// Advisory gate-chain check: would this spend be allowed right now?
    ///
    /// Pure and side-effect free. The signer re-validates the same chain
    /// inside its critical section, so a stale advisory answer can never
    /// overspend a budget.
    pub async fn check_payment(
        &self,
        session_id: &SessionId,
        to_agent: &AgentId,
        amount: Amount,
    ) -> Result<()> {
        let session = self.registry.get(session_id).await?;
        BudgetEnforcer::check(&session, to_agent, amount, Utc::now())
    }

    /// Sign a payment and record it pending settlement
    ///
    /// Returns the structured limit error naming the failed gate when the
    /// spend is not allowed; a rejection leaves the session untouched.
    pub async fn sign_payment(&self, request: SignPaymentRequest) -> Result<PaymentAuthorization> {
        let signed = self
            .signer
            .sign(
                &request.session_id,
                &request.to_agent,
                request.amount,
                &request.task_type,
            )
            .await?;

        let record = self
            .ledger
            .record_pending(
                &request.session_id,
                &request.to_agent,
                request.amount,
                &request.task_type,
                request.calling_agent,
            )
            .await;

        let session = self.registry.get(&request.session_id).await?;
        Ok(PaymentAuthorization {
            transaction_id: record.id,
            intent: signed,
            allowance_remaining: session.available_allowance(),
            requests_remaining: session.requests_remaining,
        })
    }

    /// Verify settlement of a signed payment and reconcile its record
    ///
    /// Verification runs under the session's task timeout and never holds
    /// the session lock, so other agents keep transacting against the same
    /// session while this settlement is outstanding. On success the record
    /// completes and budgets are debited exactly once; on failure or
    /// timeout the record fails with no debit.
    pub async fn settle_payment(
        &self,
        session_id: &SessionId,
        transaction_id: &TransactionId,
        intent: &SignedPaymentIntent,
    ) -> Result<SettlementReceipt> {
        let session = self.registry.get(session_id).await?;
        // The ledger record, not the caller-supplied intent, is the
        // authority on the expected amount
        let record = self.ledger.get(session_id, transaction_id).await?;

        let timeout = Duration::from_secs(session.limits.task_timeout_secs);
        let started = std::time::Instant::now();

        match tokio::time::timeout(timeout, self.verifier.verify(intent, record.amount)).await {
            Ok(Ok(receipt)) => {
                self.ledger
                    .reconcile(
                        session_id,
                        transaction_id,
                        ReconcileOutcome::Completed,
                        ReconcileMeta {
                            execution_ms: Some(started.elapsed().as_millis() as u64),
                            receipt_hash: Some(receipt.intent_hash.clone()),
                        },
                    )
                    .await?;
                Ok(receipt)
            }
            Ok(Err(err)) => {
                warn!(session = %session_id, tx = %transaction_id, error = %err, "settlement rejected");
                self.ledger
                    .reconcile(
                        session_id,
                        transaction_id,
                        ReconcileOutcome::Failed {
                            error: err.to_string(),
                        },
                        ReconcileMeta::default(),
                    )
                    .await?;
                Err(err)
            }
            Err(_) => {
                let err = AgentPayError::SettlementTimeout {
                    timeout_secs: session.limits.task_timeout_secs,
                };
                warn!(session = %session_id, tx = %transaction_id, "settlement timed out");
                self.ledger
                    .reconcile(
                        session_id,
                        transaction_id,
                        ReconcileOutcome::Failed {
                            error: err.to_string(),
                        },
                        ReconcileMeta::default(),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    /// Abandon a pending payment; its reservation is released with no debit
    pub async fn cancel_payment(
        &self,
        session_id: &SessionId,
        transaction_id: &TransactionId,
        reason: impl Into<String>,
    ) -> Result<TransactionRecord> {
        self.ledger
            .reconcile(
                session_id,
                transaction_id,
                ReconcileOutcome::Cancelled {
                    reason: reason.into(),
                },
                ReconcileMeta::default(),
            )
            .await
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Day/month spent, remaining, and percentage for a session
    pub async fn budget_status(&self, session_id: &SessionId) -> Result<BudgetStatus> {
        let session = self.registry.get(session_id).await?;
        Ok(session.budget_status(Utc::now()))
    }

    /// The most recent `limit` transaction records, oldest first
    pub async fn history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>> {
        // Surface a typed not-found instead of an empty history
        self.registry.get(session_id).await?;
        Ok(self.ledger.history(session_id, limit).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fastpath_pay() -> AgentPay {
        AgentPay::with_config(Config {
            verification: VerificationMode::FastPath,
            ..Default::default()
        })
    }

    async fn session_with(pay: &AgentPay, overrides: SessionOverrides) -> SessionSummary {
        pay.create_session(
            CreateSessionRequest::new(PrincipalId::new(), AgentId::new())
                .with_overrides(overrides),
        )
        .await
        .unwrap()
    }

    fn payment(session: &SessionSummary, amount: u64) -> SignPaymentRequest {
        SignPaymentRequest {
            session_id: session.session_id.clone(),
            to_agent: AgentId::new(),
            amount: Amount::new(amount),
            task_type: "inference".to_string(),
            calling_agent: None,
        }
    }

    #[tokio::test]
    async fn test_create_session_echoes_parameters() {
        let pay = AgentPay::in_memory();
        let session = pay
            .create_session(
                CreateSessionRequest::new(PrincipalId::new(), AgentId::new())
                    .with_allowance(Amount::new(5_000))
                    .with_max_requests(20)
                    .with_duration_secs(3600),
            )
            .await
            .unwrap();

        assert_eq!(session.allowance, Amount::new(5_000));
        assert_eq!(session.max_requests, 20);
        assert_eq!(
            session.expires_at - session.created_at,
            chrono::Duration::seconds(3600)
        );
    }

    #[tokio::test]
    async fn test_request_budget_end_to_end() {
        // Allowance 500, 20 requests, 1h: twenty 5-unit payments succeed,
        // the 21st is rejected with a requests-exhausted error.
        let pay = fastpath_pay();
        let session = session_with(
            &pay,
            SessionOverrides {
                allowance: Some(Amount::new(500)),
                max_requests: Some(20),
                max_concurrent_tasks: Some(32),
                duration_secs: Some(3600),
                ..Default::default()
            },
        )
        .await;

        let mut last = None;
        for _ in 0..20 {
            last = Some(pay.sign_payment(payment(&session, 5)).await.unwrap());
        }
        assert_eq!(last.unwrap().requests_remaining, 0);

        let err = pay.sign_payment(payment(&session, 5)).await.unwrap_err();
        assert_eq!(err, AgentPayError::RequestsExhausted { max_requests: 20 });
    }

    #[tokio::test]
    async fn test_sign_and_settle_debits_once() {
        let pay = fastpath_pay();
        let session = session_with(&pay, SessionOverrides::default()).await;

        let auth = pay.sign_payment(payment(&session, 200)).await.unwrap();

        // Pending: nothing debited yet
        let status = pay.budget_status(&session.session_id).await.unwrap();
        assert_eq!(status.daily.spent, Amount::ZERO);

        let receipt = pay
            .settle_payment(&session.session_id, &auth.transaction_id, &auth.intent)
            .await
            .unwrap();
        assert_eq!(receipt.settled_amount, Amount::new(200));

        let status = pay.budget_status(&session.session_id).await.unwrap();
        assert_eq!(status.daily.spent, Amount::new(200));
        assert_eq!(status.monthly.spent, Amount::new(200));

        // Settling the same transaction again does not debit again
        pay.settle_payment(&session.session_id, &auth.transaction_id, &auth.intent)
            .await
            .unwrap();
        let status = pay.budget_status(&session.session_id).await.unwrap();
        assert_eq!(status.daily.spent, Amount::new(200));
    }

    #[tokio::test]
    async fn test_daily_budget_rejection_keeps_remaining() {
        let pay = fastpath_pay();
        let session = session_with(
            &pay,
            SessionOverrides {
                daily_cap: Some(Amount::new(500)),
                ..Default::default()
            },
        )
        .await;

        let err = pay.sign_payment(payment(&session, 600)).await.unwrap_err();
        assert!(matches!(err, AgentPayError::DailyBudgetExceeded { .. }));

        let status = pay.budget_status(&session.session_id).await.unwrap();
        assert_eq!(status.daily.remaining, Amount::new(500));
    }

    #[tokio::test]
    async fn test_check_payment_is_advisory_and_pure() {
        let pay = fastpath_pay();
        let session = session_with(
            &pay,
            SessionOverrides {
                daily_cap: Some(Amount::new(500)),
                ..Default::default()
            },
        )
        .await;
        let agent = AgentId::new();

        assert!(pay
            .check_payment(&session.session_id, &agent, Amount::new(100))
            .await
            .is_ok());
        let err = pay
            .check_payment(&session.session_id, &agent, Amount::new(600))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentPayError::DailyBudgetExceeded { .. }));

        // Neither answer consumed any budget or nonce
        let reloaded = pay.registry().get(&session.session_id).await.unwrap();
        assert_eq!(reloaded.nonce, 0);
        assert_eq!(reloaded.requests_remaining, reloaded.limits.max_requests);
    }

    #[tokio::test]
    async fn test_settlement_timeout_fails_without_debit() {
        // Full verification against a backend that never finalizes
        let config = Config {
            verification: VerificationMode::Full,
            settlement_poll_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let pay = AgentPay::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryBackend::manual()),
        );
        let session = session_with(
            &pay,
            SessionOverrides {
                task_timeout_secs: Some(1),
                ..Default::default()
            },
        )
        .await;

        let auth = pay.sign_payment(payment(&session, 100)).await.unwrap();
        let err = pay
            .settle_payment(&session.session_id, &auth.transaction_id, &auth.intent)
            .await
            .unwrap_err();
        assert_eq!(err, AgentPayError::SettlementTimeout { timeout_secs: 1 });

        let history = pay.history(&session.session_id, 10).await.unwrap();
        assert!(matches!(
            history[0].status,
            TransactionStatus::Failed { .. }
        ));

        let status = pay.budget_status(&session.session_id).await.unwrap();
        assert_eq!(status.daily.spent, Amount::ZERO);

        // The failed settlement released its reservation
        let session = pay.registry().get(&session.session_id).await.unwrap();
        assert_eq!(session.reserved, Amount::ZERO);
        assert_eq!(session.tasks_in_flight, 0);
    }

    #[tokio::test]
    async fn test_cancel_restores_headroom() {
        let pay = fastpath_pay();
        let session = session_with(&pay, SessionOverrides::default()).await;

        let auth = pay.sign_payment(payment(&session, 300)).await.unwrap();
        let before = auth.allowance_remaining;

        let record = pay
            .cancel_payment(&session.session_id, &auth.transaction_id, "caller abandoned")
            .await
            .unwrap();
        assert!(matches!(record.status, TransactionStatus::Cancelled { .. }));

        let reloaded = pay.registry().get(&session.session_id).await.unwrap();
        assert_eq!(
            reloaded.available_allowance(),
            before.checked_add(Amount::new(300)).unwrap()
        );
    }

    #[tokio::test]
    async fn test_pause_blocks_then_resume_restores_budgets() {
        let pay = fastpath_pay();
        let session = session_with(&pay, SessionOverrides::default()).await;

        // Settle one payment so there is real spend to preserve
        let auth = pay.sign_payment(payment(&session, 150)).await.unwrap();
        pay.settle_payment(&session.session_id, &auth.transaction_id, &auth.intent)
            .await
            .unwrap();

        pay.pause_session(&session.session_id, "principal hold")
            .await
            .unwrap();
        let err = pay.sign_payment(payment(&session, 10)).await.unwrap_err();
        assert!(matches!(err, AgentPayError::SessionPaused { .. }));

        pay.resume_session(&session.session_id).await.unwrap();
        let status = pay.budget_status(&session.session_id).await.unwrap();
        assert_eq!(status.daily.spent, Amount::new(150));
        assert!(pay.sign_payment(payment(&session, 10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_history_orders_and_limits() {
        let pay = fastpath_pay();
        let session = session_with(&pay, SessionOverrides::default()).await;

        for amount in [10, 20, 30] {
            pay.sign_payment(payment(&session, amount)).await.unwrap();
        }

        let history = pay.history(&session.session_id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, Amount::new(20));
        assert_eq!(history[1].amount, Amount::new(30));

        let err = pay.history(&SessionId::new(), 10).await.unwrap_err();
        assert!(matches!(err, AgentPayError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_full_verification_end_to_end() {
        let pay = AgentPay::in_memory(); // defaults to Full over auto-finalizing backend
        let session = session_with(&pay, SessionOverrides::default()).await;

        let auth = pay.sign_payment(payment(&session, 400)).await.unwrap();
        let receipt = pay
            .settle_payment(&session.session_id, &auth.transaction_id, &auth.intent)
            .await
            .unwrap();

        assert_eq!(receipt.settled_amount, Amount::new(400));
        assert!(receipt.confirmation_height.is_some());

        let history = pay.history(&session.session_id, 10).await.unwrap();
        assert!(history[0].status.is_success());
        assert_eq!(history[0].receipt_hash.as_deref(), Some(receipt.intent_hash.as_str()));
    }

    #[tokio::test]
    async fn test_update_session_through_facade() {
        let pay = AgentPay::in_memory();
        let session = session_with(&pay, SessionOverrides::default()).await;

        pay.update_session(
            &session.session_id,
            SessionUpdate {
                per_transaction_cap: Some(Amount::new(42)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = pay.sign_payment(payment(&session, 43)).await.unwrap_err();
        assert!(matches!(err, AgentPayError::TransactionCapExceeded { .. }));
    }

    #[tokio::test]
    async fn test_nonces_across_facade_are_strictly_increasing() {
        let pay = fastpath_pay();
        let session = session_with(&pay, SessionOverrides::default()).await;

        let mut nonces = Vec::new();
        for _ in 0..4 {
            let auth = pay.sign_payment(payment(&session, 5)).await.unwrap();
            nonces.push(auth.intent.intent.nonce);
        }
        for pair in nonces.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }
}
