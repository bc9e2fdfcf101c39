//! reservemint Issuer - Reserve-gated, at-most-once minting
//!
//! The [`MintOrchestrator`] drives one mint request through
//! verify → key → claim → submit → record:
//!
//! 1. Reserves are verified against the request's wallet and amount
//! 2. The idempotency key is taken from the frozen proof, before annotation
//! 3. The store's atomic claim admits exactly one submitter per key
//! 4. A failed submission releases the claim; a confirmed one becomes a
//!    permanent receipt
//! 5. A key held by an unfinished claim is reported as
//!    [`MintOutcome::ClaimPending`], never as already minted
//! 6. A confirmed mint whose receipt cannot be written is surfaced as
//!    [`MintError::ReconciliationRequired`] and never resubmitted
//!
//! No in-process lock takes part in mutual exclusion, so any number of
//! orchestrators may share one store.

pub mod error;
pub mod guard;
pub mod orchestrator;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reservemint_types::{IdempotencyKey, MintReceipt, ReserveCurrency, TransactionRef, WalletAddress};
use serde::{Deserialize, Serialize};

pub use error::{MintError, Result};
pub use guard::ClaimGuard;
pub use orchestrator::MintOrchestrator;

/// Progress of a single mint attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintStage {
    PendingVerification,
    ReserveVerified,
    Claimed,
    Submitted,
    Confirmed,
    AlreadyMinted,
    ClaimPending,
    Failed,
}

impl MintStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::AlreadyMinted | Self::ClaimPending | Self::Failed
        )
    }
}

impl fmt::Display for MintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PendingVerification => "pending_verification",
            Self::ReserveVerified => "reserve_verified",
            Self::Claimed => "claimed",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::AlreadyMinted => "already_minted",
            Self::ClaimPending => "claim_pending",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Successful result of a mint call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    /// This call submitted the mint and recorded its receipt
    Minted(MintReceipt),
    /// A receipt already exists for the key; nothing was submitted
    AlreadyMinted {
        wallet: WalletAddress,
        idempotency_key: IdempotencyKey,
    },
    /// Another mint holds the key but has not recorded a receipt.
    ///
    /// Nothing was submitted and nothing is known to be minted. The holder
    /// may still be running, or it may have died and left the claim behind.
    ClaimPending {
        wallet: WalletAddress,
        idempotency_key: IdempotencyKey,
        claimed_at: Option<DateTime<Utc>>,
    },
}

impl MintOutcome {
    /// Transaction submitted by this call, if any
    pub fn transaction_ref(&self) -> Option<&TransactionRef> {
        match self {
            Self::Minted(receipt) => Some(&receipt.transaction_ref),
            Self::AlreadyMinted { .. } | Self::ClaimPending { .. } => None,
        }
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        match self {
            Self::Minted(receipt) => &receipt.idempotency_key,
            Self::AlreadyMinted {
                idempotency_key, ..
            }
            | Self::ClaimPending {
                idempotency_key, ..
            } => idempotency_key,
        }
    }

    pub fn is_already_minted(&self) -> bool {
        matches!(self, Self::AlreadyMinted { .. })
    }

    pub fn is_claim_pending(&self) -> bool {
        matches!(self, Self::ClaimPending { .. })
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Reserve currencies to try, most preferred first
    pub currency_priority: Vec<ReserveCurrency>,
    /// Deadline for submission plus confirmation
    pub submit_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            currency_priority: vec![
                ReserveCurrency::Usdt,
                ReserveCurrency::Usdc,
                ReserveCurrency::Eurc,
            ],
            submit_timeout: Duration::from_secs(120),
        }
    }
}
