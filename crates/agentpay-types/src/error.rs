//! Error types for AgentPay
//!
//! Every limit rejection is recoverable and names the specific limit and
//! current value, so callers can retry with adjusted parameters or a new
//! session. None of these errors corrupt session state.

use crate::{Amount, RateWindow};
use thiserror::Error;

/// Result type for AgentPay operations
pub type Result<T> = std::result::Result<T, AgentPayError>;

/// AgentPay error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentPayError {
    // ========================================================================
    // Session Errors
    // ========================================================================

    /// Session does not exist
    #[error("Session {session_id} not found")]
    SessionNotFound { session_id: String },

    /// Session has been paused by its principal
    #[error("Session {session_id} is paused: {reason}")]
    SessionPaused { session_id: String, reason: String },

    /// Session has expired
    #[error("Session {session_id} expired at {expired_at}")]
    SessionExpired {
        session_id: String,
        expired_at: String,
    },

    // ========================================================================
    // Budget & Limit Errors
    // ========================================================================

    /// Amount exceeds the per-transaction cap
    #[error("Transaction cap exceeded: requested {requested}, cap {cap}")]
    TransactionCapExceeded { requested: Amount, cap: Amount },

    /// Counterparty is not on the session whitelist
    #[error("Agent {agent_id} is not whitelisted for this session")]
    AgentNotWhitelisted { agent_id: String },

    /// Amount exceeds the remaining daily budget
    #[error("Daily budget exceeded: requested {requested}, remaining {remaining}")]
    DailyBudgetExceeded { requested: Amount, remaining: Amount },

    /// Amount exceeds the remaining monthly budget
    #[error("Monthly budget exceeded: requested {requested}, remaining {remaining}")]
    MonthlyBudgetExceeded { requested: Amount, remaining: Amount },

    /// Per-agent call-rate limit reached
    #[error("Rate limit for agent {agent_id} exceeded: {current} of {limit} {window} calls")]
    AgentRateLimitExceeded {
        agent_id: String,
        window: RateWindow,
        limit: u32,
        current: u32,
    },

    /// Too many transactions pending settlement
    #[error("Concurrency limit exceeded: {in_flight} tasks in flight, limit {limit}")]
    ConcurrencyLimitExceeded { limit: u32, in_flight: u32 },

    /// Session-wide request budget is spent
    #[error("Request budget exhausted: all {max_requests} requests used")]
    RequestsExhausted { max_requests: u32 },

    /// Amount exceeds the remaining session allowance
    #[error("Insufficient allowance: requested {requested}, remaining {remaining}")]
    InsufficientAllowance { requested: Amount, remaining: Amount },

    /// Amount is above the manual-approval threshold
    #[error("Approval required: {requested} exceeds threshold {threshold}")]
    ApprovalRequired { requested: Amount, threshold: Amount },

    // ========================================================================
    // Settlement Errors
    // ========================================================================

    /// Settlement verification rejected the intent
    #[error("Settlement failed: {reason}")]
    SettlementFailed { reason: String },

    /// Settlement verification exceeded the task timeout
    #[error("Settlement timed out after {timeout_secs}s")]
    SettlementTimeout { timeout_secs: u64 },

    /// Signature did not verify
    #[error("Invalid signature: {reason}")]
    InvalidSignature { reason: String },

    // ========================================================================
    // Transaction Errors
    // ========================================================================

    /// Transaction record does not exist for this session
    #[error("Transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Amount arithmetic overflowed
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AgentPayError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a retriable error
    ///
    /// Limit errors are retriable after backoff or with adjusted parameters;
    /// a paused or expired session needs principal intervention.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::AgentRateLimitExceeded { .. }
                | Self::ConcurrencyLimitExceeded { .. }
                | Self::DailyBudgetExceeded { .. }
                | Self::MonthlyBudgetExceeded { .. }
                | Self::SettlementTimeout { .. }
                | Self::Internal { .. }
        )
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::SessionPaused { .. } => "SESSION_PAUSED",
            Self::SessionExpired { .. } => "SESSION_EXPIRED",
            Self::TransactionCapExceeded { .. } => "TRANSACTION_CAP_EXCEEDED",
            Self::AgentNotWhitelisted { .. } => "AGENT_NOT_WHITELISTED",
            Self::DailyBudgetExceeded { .. } => "DAILY_BUDGET_EXCEEDED",
            Self::MonthlyBudgetExceeded { .. } => "MONTHLY_BUDGET_EXCEEDED",
            Self::AgentRateLimitExceeded { .. } => "AGENT_RATE_LIMIT_EXCEEDED",
            Self::ConcurrencyLimitExceeded { .. } => "CONCURRENCY_LIMIT_EXCEEDED",
            Self::RequestsExhausted { .. } => "REQUESTS_EXHAUSTED",
            Self::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
            Self::ApprovalRequired { .. } => "APPROVAL_REQUIRED",
            Self::SettlementFailed { .. } => "SETTLEMENT_FAILED",
            Self::SettlementTimeout { .. } => "SETTLEMENT_TIMEOUT",
            Self::InvalidSignature { .. } => "INVALID_SIGNATURE",
            Self::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AgentPayError::DailyBudgetExceeded {
            requested: Amount::new(600),
            remaining: Amount::new(500),
        };
        assert_eq!(err.error_code(), "DAILY_BUDGET_EXCEEDED");
    }

    #[test]
    fn test_retriable_errors() {
        assert!(AgentPayError::internal("test").is_retriable());
        assert!(AgentPayError::AgentRateLimitExceeded {
            agent_id: "agent_x".to_string(),
            window: RateWindow::Hourly,
            limit: 10,
            current: 10,
        }
        .is_retriable());

        let paused = AgentPayError::SessionPaused {
            session_id: "session_x".to_string(),
            reason: "manual hold".to_string(),
        };
        assert!(!paused.is_retriable());
    }

    #[test]
    fn test_limit_errors_carry_limit_and_current_value() {
        let err = AgentPayError::ConcurrencyLimitExceeded {
            limit: 4,
            in_flight: 4,
        };
        assert!(err.to_string().contains('4'));
    }
}
