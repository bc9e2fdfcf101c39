//! reservemint Types - Canonical domain types for reserve-backed minting
//!
//! This crate has no dependencies on other reservemint crates. It defines:
//!
//! - Identity types (RequestId, WalletAddress, TransactionRef)
//! - Reserve currencies and smallest-unit normalization
//! - Reserve proofs and their canonical identity
//! - Idempotency keys derived from (wallet, proof identity)
//! - Mint requests and mint receipts
//!
//! # Invariants
//!
//! 1. A proof's identity covers balances and currencies only
//! 2. Annotation after verification never changes a proof's identity
//! 3. At most one MintReceipt exists per (wallet, idempotency key)

pub mod identity;
pub mod currency;
pub mod amount;
pub mod proof;
pub mod key;
pub mod request;
pub mod receipt;
pub mod error;

pub use identity::*;
pub use currency::*;
pub use amount::*;
pub use proof::*;
pub use key::*;
pub use request::*;
pub use receipt::*;
pub use error::{Result, TypesError};
