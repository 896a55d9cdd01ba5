//! AgentPay Session - Delegated spending sessions and budget enforcement
//!
//! A session is a bounded, time-limited spending authority a principal
//! grants to an autonomous agent. This crate owns:
//!
//! - The `Session` record and its live budget counters
//! - The `SessionStore` repository abstraction (in-memory by default,
//!   swappable for durable storage without touching budget logic)
//! - The `SessionRegistry` with the per-session critical section that
//!   serializes every counter mutation
//! - The `BudgetEnforcer`, a pure ordered gate chain
//!
//! # Invariants
//!
//! 1. Remaining budgets never go below zero
//! 2. Check and mutation happen inside one critical section
//! 3. Pause/expiry are re-read on every gate evaluation, never cached
//! 4. Resume never resets counters

pub mod session;
pub mod store;
pub mod registry;
pub mod enforcer;

pub use session::*;
pub use store::*;
pub use registry::*;
pub use enforcer::*;
