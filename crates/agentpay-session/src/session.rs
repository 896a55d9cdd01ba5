//! The session record and its live budget counters

use agentpay_crypto::SessionKeypair;
use agentpay_types::{
    AgentCallWindow, AgentId, AgentPayError, Amount, BudgetStatus, PrincipalId, Result, SessionId,
    SessionLimits, WindowAnchors, WindowStatus,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A bounded, time-limited spending delegation
///
/// Owned exclusively by the `SessionRegistry`. All counter mutation goes
/// through the registry's per-session critical section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub principal: PrincipalId,
    pub agent: AgentId,
    pub limits: SessionLimits,

    /// Allowance not yet consumed by confirmed settlements
    pub allowance_remaining: Amount,
    /// Daily budget not yet consumed by confirmed settlements
    pub daily_remaining: Amount,
    /// Monthly budget not yet consumed by confirmed settlements
    pub monthly_remaining: Amount,
    /// Sum of signed-but-unsettled intents; the gate chain subtracts this
    /// from every remaining budget so pending spends cannot jointly
    /// overshoot a limit without any budget being debited
    pub reserved: Amount,
    /// Signing requests left in the session-wide request budget
    pub requests_remaining: u32,
    /// Transactions currently pending settlement
    pub tasks_in_flight: u32,
    /// Per-counterparty call counters, keyed by agent
    pub agent_calls: HashMap<AgentId, AgentCallWindow>,

    pub is_paused: bool,
    pub pause_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    /// Fixed at creation; read-only thereafter
    pub expires_at: DateTime<Utc>,
    /// Calendar anchors for lazy daily/monthly budget refresh
    pub anchors: WindowAnchors,

    /// Ephemeral signing keypair bound for the session's lifetime
    pub keypair: SessionKeypair,
    /// Monotonic nonce; advanced only by the payment signer
    pub nonce: u64,
}

impl Session {
    /// Create a new session with a fresh ephemeral keypair
    pub fn new(
        principal: PrincipalId,
        agent: AgentId,
        limits: SessionLimits,
        duration_secs: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            principal,
            agent,
            allowance_remaining: limits.allowance,
            daily_remaining: limits.daily_cap,
            monthly_remaining: limits.monthly_cap,
            reserved: Amount::ZERO,
            requests_remaining: limits.max_requests,
            tasks_in_flight: 0,
            agent_calls: HashMap::new(),
            is_paused: false,
            pause_reason: None,
            created_at: now,
            expires_at: now + Duration::seconds(duration_secs as i64),
            anchors: WindowAnchors::at(now),
            keypair: SessionKeypair::generate(),
            nonce: 0,
            limits,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Refresh daily/monthly remainders when their calendar window elapsed
    ///
    /// Applied lazily at the start of every critical section.
    pub fn refresh_windows(&mut self, now: DateTime<Utc>) {
        if self.anchors.daily_elapsed(now) {
            self.daily_remaining = self.limits.daily_cap;
        }
        if self.anchors.monthly_elapsed(now) {
            self.monthly_remaining = self.limits.monthly_cap;
        }
        self.anchors = WindowAnchors::at(now);
    }

    /// Daily remaining as of `now`, without mutating the record
    pub fn daily_remaining_at(&self, now: DateTime<Utc>) -> Amount {
        if self.anchors.daily_elapsed(now) {
            self.limits.daily_cap
        } else {
            self.daily_remaining
        }
    }

    /// Monthly remaining as of `now`, without mutating the record
    pub fn monthly_remaining_at(&self, now: DateTime<Utc>) -> Amount {
        if self.anchors.monthly_elapsed(now) {
            self.limits.monthly_cap
        } else {
            self.monthly_remaining
        }
    }

    /// Allowance still available to new intents (remaining minus reserved)
    pub fn available_allowance(&self) -> Amount {
        self.allowance_remaining.saturating_sub(self.reserved)
    }

    /// Derived day/month budget view; computed on demand, never persisted
    pub fn budget_status(&self, now: DateTime<Utc>) -> BudgetStatus {
        BudgetStatus {
            daily: WindowStatus::from_remaining(self.limits.daily_cap, self.daily_remaining_at(now)),
            monthly: WindowStatus::from_remaining(
                self.limits.monthly_cap,
                self.monthly_remaining_at(now),
            ),
        }
    }

    /// Reserve budget for a signed-but-unsettled intent
    pub fn reserve(&mut self, amount: Amount) -> Result<()> {
        self.reserved = self
            .reserved
            .checked_add(amount)
            .ok_or(AgentPayError::AmountOverflow)?;
        Ok(())
    }

    /// Release a reservation once its transaction reaches a terminal state
    pub fn release(&mut self, amount: Amount) {
        self.reserved = self.reserved.saturating_sub(amount);
    }

    /// Debit all budget windows for a confirmed settlement
    ///
    /// Saturating: remaining budgets never go below zero, even when a cap
    /// was lowered below an already-reserved amount mid-flight.
    pub fn debit_settled(&mut self, amount: Amount) {
        self.allowance_remaining = self.allowance_remaining.saturating_sub(amount);
        self.daily_remaining = self.daily_remaining.saturating_sub(amount);
        self.monthly_remaining = self.monthly_remaining.saturating_sub(amount);
    }

    /// Count one settled call against a counterparty's rate windows
    pub fn note_agent_call(&mut self, agent: &AgentId, now: DateTime<Utc>) {
        let window = self
            .agent_calls
            .entry(agent.clone())
            .or_insert(AgentCallWindow {
                hourly_count: 0,
                daily_count: 0,
                last_call_at: now,
            });
        window.record_call(now);
    }

    /// Mark one more transaction as pending settlement
    pub fn task_started(&mut self) {
        self.tasks_in_flight += 1;
    }

    /// Mark one pending transaction as resolved
    pub fn task_finished(&mut self) {
        self.tasks_in_flight = self.tasks_in_flight.saturating_sub(1);
    }
}
