//! Spending limit types for AgentPay sessions
//!
//! A session carries a multi-dimensional limit set: monetary caps per
//! transaction/day/month, per-agent call-rate limits with sliding windows,
//! a concurrency bound, and a session-wide request budget.

use crate::{AgentId, Amount};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The full limit set a session is created with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Total spendable amount granted to the session
    pub allowance: Amount,
    /// Maximum per single transaction
    pub per_transaction_cap: Amount,
    /// Maximum settled spend per calendar day
    pub daily_cap: Amount,
    /// Maximum settled spend per calendar month
    pub monthly_cap: Amount,
    /// Max settled calls to one counterparty agent per hour (sliding window)
    pub max_calls_per_agent_hourly: u32,
    /// Max settled calls to one counterparty agent per calendar day
    pub max_calls_per_agent_daily: u32,
    /// Max transactions that may be pending settlement at once
    pub max_concurrent_tasks: u32,
    /// Settlement verification timeout per task, in seconds
    pub task_timeout_secs: u64,
    /// Session-wide budget of signing requests
    pub max_requests: u32,
    /// Counterparty allowlist; `None` means any agent
    pub whitelist: Option<Vec<AgentId>>,
    /// Amounts above this require out-of-band approval
    pub approval_threshold: Option<Amount>,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            allowance: Amount::new(1_000_000),
            per_transaction_cap: Amount::new(50_000),
            daily_cap: Amount::new(200_000),
            monthly_cap: Amount::new(2_000_000),
            max_calls_per_agent_hourly: 60,
            max_calls_per_agent_daily: 480,
            max_concurrent_tasks: 8,
            task_timeout_secs: 120,
            max_requests: 1_000,
            whitelist: None,
            approval_threshold: None,
        }
    }
}

/// Optional overrides applied on top of the defaults at session creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOverrides {
    pub allowance: Option<Amount>,
    pub per_transaction_cap: Option<Amount>,
    pub daily_cap: Option<Amount>,
    pub monthly_cap: Option<Amount>,
    pub max_calls_per_agent_hourly: Option<u32>,
    pub max_calls_per_agent_daily: Option<u32>,
    pub max_concurrent_tasks: Option<u32>,
    pub task_timeout_secs: Option<u64>,
    pub max_requests: Option<u32>,
    pub whitelist: Option<Vec<AgentId>>,
    pub approval_threshold: Option<Amount>,
    /// Session lifetime in seconds; expiry is fixed at creation
    pub duration_secs: Option<u64>,
}

impl SessionOverrides {
    /// Merge these overrides into a base limit set
    pub fn apply(&self, mut limits: SessionLimits) -> SessionLimits {
        if let Some(allowance) = self.allowance {
            limits.allowance = allowance;
        }
        if let Some(cap) = self.per_transaction_cap {
            limits.per_transaction_cap = cap;
        }
        if let Some(cap) = self.daily_cap {
            limits.daily_cap = cap;
        }
        if let Some(cap) = self.monthly_cap {
            limits.monthly_cap = cap;
        }
        if let Some(n) = self.max_calls_per_agent_hourly {
            limits.max_calls_per_agent_hourly = n;
        }
        if let Some(n) = self.max_calls_per_agent_daily {
            limits.max_calls_per_agent_daily = n;
        }
        if let Some(n) = self.max_concurrent_tasks {
            limits.max_concurrent_tasks = n;
        }
        if let Some(secs) = self.task_timeout_secs {
            limits.task_timeout_secs = secs;
        }
        if let Some(n) = self.max_requests {
            limits.max_requests = n;
        }
        if let Some(ref list) = self.whitelist {
            limits.whitelist = Some(list.clone());
        }
        if let Some(threshold) = self.approval_threshold {
            limits.approval_threshold = Some(threshold);
        }
        limits
    }
}

/// Partial update for a live session
///
/// Only mutable fields appear here, so immutable fields (id, principal,
/// creation and expiry timestamps, the signing keypair) cannot be altered
/// through an update by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub per_transaction_cap: Option<Amount>,
    pub daily_cap: Option<Amount>,
    pub monthly_cap: Option<Amount>,
    pub max_calls_per_agent_hourly: Option<u32>,
    pub max_calls_per_agent_daily: Option<u32>,
    pub max_concurrent_tasks: Option<u32>,
    pub task_timeout_secs: Option<u64>,
    pub whitelist: Option<Vec<AgentId>>,
    pub approval_threshold: Option<Amount>,
}

/// Which call-rate window a limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateWindow {
    Hourly,
    Daily,
}

impl std::fmt::Display for RateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
        }
    }
}

/// Per-counterparty call counters
///
/// The hourly counter uses a sliding window: it resets once a full hour has
/// elapsed since the last settled call. The daily counter resets on a
/// calendar-day boundary. Both semantics are intentional, not fixed buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCallWindow {
    pub hourly_count: u32,
    pub daily_count: u32,
    pub last_call_at: DateTime<Utc>,
}

impl AgentCallWindow {
    /// Effective hourly count at `now`, accounting for the sliding reset
    pub fn hourly_in_window(&self, now: DateTime<Utc>) -> u32 {
        if now - self.last_call_at >= Duration::hours(1) {
            0
        } else {
            self.hourly_count
        }
    }

    /// Effective daily count at `now`, accounting for the day boundary
    pub fn daily_in_window(&self, now: DateTime<Utc>) -> u32 {
        if now.date_naive() != self.last_call_at.date_naive() {
            0
        } else {
            self.daily_count
        }
    }

    /// Record one settled call at `now`, applying window resets first
    pub fn record_call(&mut self, now: DateTime<Utc>) {
        self.hourly_count = self.hourly_in_window(now) + 1;
        self.daily_count = self.daily_in_window(now) + 1;
        self.last_call_at = now;
    }
}

/// Spend/remaining view over one budget window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStatus {
    pub cap: Amount,
    pub spent: Amount,
    pub remaining: Amount,
    pub percent_used: f64,
}

impl WindowStatus {
    /// Build a window view from its cap and remaining amount
    pub fn from_remaining(cap: Amount, remaining: Amount) -> Self {
        let spent = cap.saturating_sub(remaining);
        Self {
            cap,
            spent,
            remaining,
            percent_used: spent.percent_of(cap),
        }
    }
}

/// Derived budget status for a session; computed on demand, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub daily: WindowStatus,
    pub monthly: WindowStatus,
}

/// Anchor for lazy calendar-window refresh of budget remainders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowAnchors {
    pub daily: chrono::NaiveDate,
    pub monthly: chrono::NaiveDate,
}

impl WindowAnchors {
    /// Anchors for the windows containing `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            daily: today,
            monthly: today.with_day(1).unwrap_or(today),
        }
    }

    /// Whether `now` falls on a later calendar day than the daily anchor
    pub fn daily_elapsed(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() != self.daily
    }

    /// Whether `now` falls in a later calendar month than the monthly anchor
    pub fn monthly_elapsed(&self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        (today.year(), today.month()) != (self.monthly.year(), self.monthly.month())
    }
}
