//! AgentPay Ledger - Optimistic pending spends and their reconciliation
//!
//! The ledger owns every `TransactionRecord`. Records are appended as
//! `Pending` at signing time and transition exactly once to a terminal
//! status when settlement resolves. Only the transition into `Completed`
//! debits the session's budgets, exactly once, idempotently: reconciling
//! an already-terminal record is a no-op, not a double debit.
//!
//! The ledger holds the session id as a back-reference and mutates session
//! counters only through the registry's critical section, never through a
//! direct reference.

use std::collections::HashMap;
use std::sync::Arc;

use agentpay_session::SessionRegistry;
use agentpay_types::{
    AgentId, AgentPayError, Amount, ReconcileMeta, ReconcileOutcome, Result, SessionId,
    TransactionId, TransactionRecord,
};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Append-only transaction ledger with exactly-once reconciliation
#[derive(Clone)]
pub struct TransactionLedger {
    registry: Arc<SessionRegistry>,
    /// All records by id
    records: Arc<RwLock<HashMap<TransactionId, TransactionRecord>>>,
    /// Insertion order, for chronological history
    order: Arc<RwLock<Vec<TransactionId>>>,
}

impl TransactionLedger {
    /// Create a ledger that debits budgets through the given registry
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            records: Arc::new(RwLock::new(HashMap::new())),
            order: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a pending record for a signed intent
    ///
    /// Never blocks on settlement; budgets are untouched until the record
    /// is reconciled `Completed`.
    pub async fn record_pending(
        &self,
        session: &SessionId,
        to_agent: &AgentId,
        amount: Amount,
        task_type: &str,
        calling_agent: Option<AgentId>,
    ) -> TransactionRecord {
        let record = TransactionRecord::pending(
            session.clone(),
            to_agent.clone(),
            amount,
            task_type,
            calling_agent,
        );

        let mut records = self.records.write().await;
        let mut order = self.order.write().await;
        order.push(record.id.clone());
        records.insert(record.id.clone(), record.clone());

        debug!(
            session = %session,
            tx = %record.id,
            amount = %amount,
            "pending transaction recorded"
        );
        record
    }

    /// Transition a record to a terminal status
    ///
    /// `Completed` releases the reservation and debits allowance and
    /// daily/monthly remainders, and counts the call against the
    /// counterparty's rate windows. `Failed`/`Cancelled` only release the
    /// reservation; budgets that were never debited are never touched.
    /// Reconciling an already-terminal record returns it unchanged.
    pub async fn reconcile(
        &self,
        session_id: &SessionId,
        tx_id: &TransactionId,
        outcome: ReconcileOutcome,
        meta: ReconcileMeta,
    ) -> Result<TransactionRecord> {
        let mut records = self.records.write().await;

        let record = records
            .get_mut(tx_id)
            .filter(|r| &r.session == session_id)
            .ok_or_else(|| AgentPayError::TransactionNotFound {
                transaction_id: tx_id.to_string(),
            })?;

        if record.status.is_terminal() {
            debug!(tx = %tx_id, "reconcile of terminal record is a no-op");
            return Ok(record.clone());
        }

        let amount = record.amount;
        let to_agent = record.to_agent.clone();

        match outcome {
            ReconcileOutcome::Completed => {
                self.registry
                    .with_session_mut(session_id, |session| {
                        let now = Utc::now();
                        session.release(amount);
                        session.debit_settled(amount);
                        session.note_agent_call(&to_agent, now);
                        session.task_finished();
                        Ok(())
                    })
                    .await?;
                info!(session = %session_id, tx = %tx_id, amount = %amount, "transaction settled");
            }
            ReconcileOutcome::Failed { .. } | ReconcileOutcome::Cancelled { .. } => {
                self.registry
                    .with_session_mut(session_id, |session| {
                        session.release(amount);
                        session.task_finished();
                        Ok(())
                    })
                    .await?;
                warn!(session = %session_id, tx = %tx_id, ?outcome, "transaction not settled");
            }
        }

        record.status = outcome.into_status(Utc::now());
        if meta.execution_ms.is_some() {
            record.execution_ms = meta.execution_ms;
        }
        if meta.receipt_hash.is_some() {
            record.receipt_hash = meta.receipt_hash;
        }
        Ok(record.clone())
    }

    /// Fetch one record, scoped to its session
    pub async fn get(
        &self,
        session_id: &SessionId,
        tx_id: &TransactionId,
    ) -> Result<TransactionRecord> {
        self.records
            .read()
            .await
            .get(tx_id)
            .filter(|r| &r.session == session_id)
            .cloned()
            .ok_or_else(|| AgentPayError::TransactionNotFound {
                transaction_id: tx_id.to_string(),
            })
    }

    /// The most recent `limit` records for a session, oldest first
    pub async fn history(&self, session_id: &SessionId, limit: usize) -> Vec<TransactionRecord> {
        let records = self.records.read().await;
        let order = self.order.read().await;

        let mut recent: Vec<TransactionRecord> = order
            .iter()
            .rev()
            .filter_map(|id| records.get(id))
            .filter(|r| &r.session == session_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    /// Number of records still pending settlement for a session
    pub async fn pending_count(&self, session_id: &SessionId) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| &r.session == session_id && r.status.is_pending())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpay_types::{PrincipalId, SessionOverrides, TransactionStatus};

    async fn setup() -> (Arc<SessionRegistry>, TransactionLedger, SessionId) {
        let registry = Arc::new(SessionRegistry::in_memory());
        let session = registry
            .create(
                PrincipalId::new(),
                AgentId::new(),
                SessionOverrides::default(),
            )
            .await
            .unwrap();
        let ledger = TransactionLedger::new(registry.clone());
        (registry, ledger, session.id)
    }

    /// Mirror the signer's reservation so reconcile has something to release
    async fn reserve(registry: &SessionRegistry, session_id: &SessionId, amount: Amount) {
        registry
            .with_session_mut(session_id, |s| {
                s.reserve(amount)?;
                s.task_started();
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_record_never_alters_budgets() {
        let (registry, ledger, session_id) = setup().await;
        let before = registry.get(&session_id).await.unwrap();

        ledger
            .record_pending(&session_id, &AgentId::new(), Amount::new(100), "inference", None)
            .await;

        let after = registry.get(&session_id).await.unwrap();
        assert_eq!(after.daily_remaining, before.daily_remaining);
        assert_eq!(after.monthly_remaining, before.monthly_remaining);
        assert_eq!(after.allowance_remaining, before.allowance_remaining);
        assert_eq!(ledger.pending_count(&session_id).await, 1);
    }

    #[tokio::test]
    async fn test_completed_reconcile_debits_exactly_once() {
        let (registry, ledger, session_id) = setup().await;
        let amount = Amount::new(100);
        let agent = AgentId::new();

        reserve(&registry, &session_id, amount).await;
        let record = ledger
            .record_pending(&session_id, &agent, amount, "inference", None)
            .await;

        let before = registry.get(&session_id).await.unwrap();
        let reconciled = ledger
            .reconcile(
                &session_id,
                &record.id,
                ReconcileOutcome::Completed,
                ReconcileMeta {
                    execution_ms: Some(420),
                    receipt_hash: Some("abc123".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(reconciled.status.is_success());
        assert_eq!(reconciled.execution_ms, Some(420));

        let after = registry.get(&session_id).await.unwrap();
        assert_eq!(
            after.daily_remaining,
            before.daily_remaining.saturating_sub(amount)
        );
        assert_eq!(
            after.allowance_remaining,
            before.allowance_remaining.saturating_sub(amount)
        );
        assert_eq!(after.reserved, Amount::ZERO);
        assert_eq!(after.tasks_in_flight, 0);
        assert_eq!(after.agent_calls.get(&agent).unwrap().hourly_count, 1);

        // Second reconcile is a no-op, not a double debit
        let again = ledger
            .reconcile(
                &session_id,
                &record.id,
                ReconcileOutcome::Completed,
                ReconcileMeta::default(),
            )
            .await
            .unwrap();
        assert!(again.status.is_success());

        let final_session = registry.get(&session_id).await.unwrap();
        assert_eq!(final_session.daily_remaining, after.daily_remaining);
        assert_eq!(final_session.agent_calls.get(&agent).unwrap().hourly_count, 1);
    }

    #[tokio::test]
    async fn test_failed_reconcile_releases_without_debit() {
        let (registry, ledger, session_id) = setup().await;
        let amount = Amount::new(100);

        reserve(&registry, &session_id, amount).await;
        let record = ledger
            .record_pending(&session_id, &AgentId::new(), amount, "inference", None)
            .await;

        let before = registry.get(&session_id).await.unwrap();
        let reconciled = ledger
            .reconcile(
                &session_id,
                &record.id,
                ReconcileOutcome::Failed {
                    error: "settlement rejected".to_string(),
                },
                ReconcileMeta::default(),
            )
            .await
            .unwrap();

        assert!(matches!(reconciled.status, TransactionStatus::Failed { .. }));

        let after = registry.get(&session_id).await.unwrap();
        assert_eq!(after.daily_remaining, before.daily_remaining);
        assert_eq!(after.allowance_remaining, before.allowance_remaining);
        assert_eq!(after.reserved, Amount::ZERO);
        assert_eq!(after.tasks_in_flight, 0);
        assert!(after.agent_calls.is_empty(), "failed calls are not rate-counted");
    }

    #[tokio::test]
    async fn test_cancelled_reconcile_restores_full_budget() {
        let (registry, ledger, session_id) = setup().await;
        let amount = Amount::new(250);

        reserve(&registry, &session_id, amount).await;
        let record = ledger
            .record_pending(&session_id, &AgentId::new(), amount, "inference", None)
            .await;

        ledger
            .reconcile(
                &session_id,
                &record.id,
                ReconcileOutcome::Cancelled {
                    reason: "caller abandoned".to_string(),
                },
                ReconcileMeta::default(),
            )
            .await
            .unwrap();

        let session = registry.get(&session_id).await.unwrap();
        assert_eq!(session.reserved, Amount::ZERO);
        assert_eq!(session.available_allowance(), session.limits.allowance);
    }

    #[tokio::test]
    async fn test_reconcile_unknown_transaction() {
        let (_, ledger, session_id) = setup().await;
        let err = ledger
            .reconcile(
                &session_id,
                &TransactionId::new(),
                ReconcileOutcome::Completed,
                ReconcileMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentPayError::TransactionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_reconcile_is_session_scoped() {
        let (registry, ledger, session_id) = setup().await;
        let record = ledger
            .record_pending(&session_id, &AgentId::new(), Amount::new(10), "x", None)
            .await;

        let other = registry
            .create(PrincipalId::new(), AgentId::new(), SessionOverrides::default())
            .await
            .unwrap();
        let err = ledger
            .reconcile(
                &other.id,
                &record.id,
                ReconcileOutcome::Completed,
                ReconcileMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentPayError::TransactionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_history_is_chronological_and_limited() {
        let (_, ledger, session_id) = setup().await;
        let agent = AgentId::new();

        let mut ids = Vec::new();
        for i in 0..5 {
            let record = ledger
                .record_pending(&session_id, &agent, Amount::new(i + 1), "inference", None)
                .await;
            ids.push(record.id);
        }

        let recent = ledger.history(&session_id, 3).await;
        assert_eq!(recent.len(), 3);
        // Most recent three, oldest first
        assert_eq!(recent[0].id, ids[2]);
        assert_eq!(recent[2].id, ids[4]);
    }

    #[tokio::test]
    async fn test_history_excludes_other_sessions() {
        let (registry, ledger, session_id) = setup().await;
        let other = registry
            .create(PrincipalId::new(), AgentId::new(), SessionOverrides::default())
            .await
            .unwrap();

        ledger
            .record_pending(&session_id, &AgentId::new(), Amount::new(1), "a", None)
            .await;
        ledger
            .record_pending(&other.id, &AgentId::new(), Amount::new(2), "b", None)
            .await;

        assert_eq!(ledger.history(&session_id, 10).await.len(), 1);
        assert_eq!(ledger.history(&other.id, 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_calling_agent_chain_is_recorded() {
        let (_, ledger, session_id) = setup().await;
        let caller = AgentId::new();

        let record = ledger
            .record_pending(
                &session_id,
                &AgentId::new(),
                Amount::new(10),
                "delegated-task",
                Some(caller.clone()),
            )
            .await;
        assert_eq!(record.calling_agent, Some(caller));
    }
}
