//! Transaction record types for AgentPay
//!
//! A record is created `Pending` when a payment intent is signed and
//! transitions exactly once to a terminal status during reconciliation.

use crate::{AgentId, Amount, SessionId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a transaction record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Signed and awaiting settlement confirmation
    Pending,
    /// Settlement confirmed; budgets were debited
    Completed { settled_at: DateTime<Utc> },
    /// Settlement failed or timed out; no debit occurred
    Failed { error: String },
    /// Abandoned by the caller before settlement
    Cancelled { reason: String },
}

impl TransactionStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Check if the transaction settled successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Check if the transaction is still awaiting settlement
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Requested terminal outcome for a reconcile call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    Completed,
    Failed { error: String },
    Cancelled { reason: String },
}

impl ReconcileOutcome {
    /// The terminal status this outcome resolves to at `now`
    pub fn into_status(self, now: DateTime<Utc>) -> TransactionStatus {
        match self {
            Self::Completed => TransactionStatus::Completed { settled_at: now },
            Self::Failed { error } => TransactionStatus::Failed { error },
            Self::Cancelled { reason } => TransactionStatus::Cancelled { reason },
        }
    }
}

/// Metadata enrichment attached at reconcile time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileMeta {
    /// Wall-clock execution time of the paid task, if known
    pub execution_ms: Option<u64>,
    /// Settlement receipt hash, if settlement produced one
    pub receipt_hash: Option<String>,
}

/// A single spend recorded against a session
///
/// Owned exclusively by the transaction ledger; holds the session id as a
/// back-reference, never a mutable reference to the session itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub session: SessionId,
    /// Counterparty agent being paid
    pub to_agent: AgentId,
    pub amount: Amount,
    pub task_type: String,
    pub status: TransactionStatus,
    /// Originating agent for agent-to-agent call chains
    pub calling_agent: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    pub execution_ms: Option<u64>,
    pub receipt_hash: Option<String>,
}

impl TransactionRecord {
    /// Create a new pending record
    pub fn pending(
        session: SessionId,
        to_agent: AgentId,
        amount: Amount,
        task_type: impl Into<String>,
        calling_agent: Option<AgentId>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            session,
            to_agent,
            amount,
            task_type: task_type.into(),
            status: TransactionStatus::Pending,
            calling_agent,
            created_at: Utc::now(),
            execution_ms: None,
            receipt_hash: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_record_is_not_terminal() {
        let record = TransactionRecord::pending(
            SessionId::new(),
            AgentId::new(),
            Amount::new(100),
            "inference",
            None,
        );
        assert!(record.status.is_pending());
        assert!(!record.status.is_terminal());
    }

    #[test]
    fn test_outcome_resolves_to_terminal_status() {
        let now = Utc::now();
        assert!(ReconcileOutcome::Completed.into_status(now).is_success());

        let failed = ReconcileOutcome::Failed {
            error: "settlement rejected".to_string(),
        }
        .into_status(now);
        assert!(failed.is_terminal());
        assert!(!failed.is_success());
    }
}
