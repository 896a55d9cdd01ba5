//! AgentPay Types - Canonical domain types for delegated agent spending
//!
//! This crate contains all foundational types for AgentPay with zero
//! dependencies on other agentpay crates. It defines the type system for:
//!
//! - Identity types (SessionId, PrincipalId, AgentId, TransactionId)
//! - Exact-integer amounts in the smallest monetary unit
//! - Session limits, live budget counters, and derived budget status
//! - Transaction records with a closed status variant
//! - Payment intents and their signed form
//!
//! # Architectural Invariants
//!
//! These types support the core AgentPay safety invariants:
//!
//! 1. Remaining budgets never go below zero
//! 2. Nonces are strictly increasing and never reused
//! 3. Budgets are debited on confirmed settlement, never on pending issuance
//! 4. Every limit rejection names the specific limit and current value

pub mod identity;
pub mod amount;
pub mod limits;
pub mod transaction;
pub mod intent;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use limits::*;
pub use transaction::*;
pub use intent::*;
pub use error::*;

/// Version of the AgentPay types schema
pub const TYPES_VERSION: &str = "0.1.0";
