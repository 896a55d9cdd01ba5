//! Budget enforcement gate chain
//!
//! `BudgetEnforcer::check` validates a proposed spend against a session's
//! current state. It is pure: no mutation, no I/O, no caching; pause and
//! expiry are whatever the session record says at the moment of the call.
//!
//! The gates run in a fixed order and short-circuit on the first failure.
//! The order is a contract, not an implementation detail: it determines
//! which error a caller sees when several limits are violated at once.

use crate::Session;
use agentpay_types::{AgentId, AgentPayError, Amount, RateWindow, Result};
use chrono::{DateTime, Utc};

/// Ordered, short-circuiting validation of a proposed spend
pub struct BudgetEnforcer;

impl BudgetEnforcer {
    /// Validate `amount` to `counterparty` against `session` at `now`
    ///
    /// Gate order:
    /// 1. not paused
    /// 2. not expired
    /// 3. per-transaction cap
    /// 4. whitelist (when set)
    /// 5. daily budget, net of outstanding reservations
    /// 6. monthly budget, net of outstanding reservations
    /// 7. per-agent hourly, then daily, call counters
    /// 8. concurrent pending-transaction bound
    /// 9. session-wide request budget
    ///
    /// Existence of the session is the registry's gate and precedes all of
    /// these. Every failure names the limit and the current value.
    pub fn check(
        session: &Session,
        counterparty: &AgentId,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if session.is_paused {
            return Err(AgentPayError::SessionPaused {
                session_id: session.id.to_string(),
                reason: session
                    .pause_reason
                    .clone()
                    .unwrap_or_else(|| "paused by principal".to_string()),
            });
        }

        if session.is_expired(now) {
            return Err(AgentPayError::SessionExpired {
                session_id: session.id.to_string(),
                expired_at: session.expires_at.to_rfc3339(),
            });
        }

        if amount > session.limits.per_transaction_cap {
            return Err(AgentPayError::TransactionCapExceeded {
                requested: amount,
                cap: session.limits.per_transaction_cap,
            });
        }

        if let Some(ref whitelist) = session.limits.whitelist {
            if !whitelist.contains(counterparty) {
                return Err(AgentPayError::AgentNotWhitelisted {
                    agent_id: counterparty.to_string(),
                });
            }
        }

        let daily_available = session
            .daily_remaining_at(now)
            .saturating_sub(session.reserved);
        if amount > daily_available {
            return Err(AgentPayError::DailyBudgetExceeded {
                requested: amount,
                remaining: daily_available,
            });
        }

        let monthly_available = session
            .monthly_remaining_at(now)
            .saturating_sub(session.reserved);
        if amount > monthly_available {
            return Err(AgentPayError::MonthlyBudgetExceeded {
                requested: amount,
                remaining: monthly_available,
            });
        }

        if let Some(window) = session.agent_calls.get(counterparty) {
            let hourly = window.hourly_in_window(now);
            if hourly >= session.limits.max_calls_per_agent_hourly {
                return Err(AgentPayError::AgentRateLimitExceeded {
                    agent_id: counterparty.to_string(),
                    window: RateWindow::Hourly,
                    limit: session.limits.max_calls_per_agent_hourly,
                    current: hourly,
                });
            }

            let daily = window.daily_in_window(now);
            if daily >= session.limits.max_calls_per_agent_daily {
                return Err(AgentPayError::AgentRateLimitExceeded {
                    agent_id: counterparty.to_string(),
                    window: RateWindow::Daily,
                    limit: session.limits.max_calls_per_agent_daily,
                    current: daily,
                });
            }
        }

        if session.tasks_in_flight >= session.limits.max_concurrent_tasks {
            return Err(AgentPayError::ConcurrencyLimitExceeded {
                limit: session.limits.max_concurrent_tasks,
                in_flight: session.tasks_in_flight,
            });
        }

        if session.requests_remaining == 0 {
            return Err(AgentPayError::RequestsExhausted {
                max_requests: session.limits.max_requests,
            });
        }

        Ok(())
    }
}
