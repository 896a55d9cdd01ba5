//! AgentPay Crypto - Cryptographic primitives for payment authorization
//!
//! This crate provides:
//! - Ephemeral session keypair generation (Ed25519)
//! - Payment-intent signing and verification over canonical payload bytes
//! - Hashing (SHA-256) for settlement receipts
//!
//! # Security Invariant
//!
//! A payment authorization is a genuine asymmetric signature, never a
//! checksum. The session's private key is generated once at session
//! creation and never rotated; rotation requires a new session.

pub mod keys;
pub mod signature;
pub mod hash;

pub use keys::*;
pub use signature::*;
pub use hash::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Canonical encoding failed: {0}")]
    EncodingFailed(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
