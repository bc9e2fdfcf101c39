//! Mint error taxonomy

use reservemint_chain::ChainError;
use reservemint_reserve::ReserveError;
use reservemint_store::StoreError;
use reservemint_types::{IdempotencyKey, RequestId, TransactionRef, WalletAddress};
use thiserror::Error;

use crate::MintStage;

/// Errors from a mint attempt
#[derive(Error, Debug)]
pub enum MintError {
    #[error("Mint request not found: {request_id}")]
    NotFound { request_id: RequestId },

    #[error("Reserve fetch failed: {0}")]
    ReserveFetch(#[source] ReserveError),

    #[error("{0}")]
    InsufficientReserve(#[source] ReserveError),

    #[error("Invalid mint request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Mint transaction failed for key {}: {reason}", .idempotency_key.short())]
    Transaction {
        #[source]
        reason: ChainError,
        idempotency_key: IdempotencyKey,
    },

    #[error(
        "Reconciliation required: mint {transaction_ref} to {wallet} confirmed but receipt for key {} not recorded: {reason}",
        .idempotency_key.short()
    )]
    ReconciliationRequired {
        wallet: WalletAddress,
        idempotency_key: IdempotencyKey,
        transaction_ref: TransactionRef,
        #[source]
        reason: StoreError,
    },

    #[error("Mint cancelled at stage {stage}")]
    Cancelled { stage: MintStage },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl MintError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the same request later
    ///
    /// `ReconciliationRequired` is never retriable: the mint may already be
    /// on chain.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ReserveFetch(_) | Self::Cancelled { .. } => true,
            Self::Store(e) => e.is_retriable(),
            _ => false,
        }
    }

    /// Needs operator attention beyond the returned error
    pub fn requires_reconciliation(&self) -> bool {
        matches!(self, Self::ReconciliationRequired { .. })
    }

    /// Stable code for logs and exit reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "REQUEST_NOT_FOUND",
            Self::ReserveFetch(_) => "RESERVE_FETCH_FAILED",
            Self::InsufficientReserve(_) => "INSUFFICIENT_RESERVE",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::Transaction { .. } => "TRANSACTION_FAILED",
            Self::ReconciliationRequired { .. } => "RECONCILIATION_REQUIRED",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<ReserveError> for MintError {
    fn from(e: ReserveError) -> Self {
        match e {
            ReserveError::Fetch { .. } => Self::ReserveFetch(e),
            ReserveError::Insufficient { .. } => Self::InsufficientReserve(e),
            ReserveError::InvalidAmount { .. } | ReserveError::NoCandidates => {
                Self::invalid_request(e.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MintError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reservemint_types::{ObservedBalance, ReserveCurrency};
    use rust_decimal_macros::dec;

    #[test]
    fn test_reserve_errors_map_by_kind() {
        let fetch = MintError::from(ReserveError::Fetch {
            unavailable: vec![],
            checked: vec![],
        });
        assert_eq!(fetch.error_code(), "RESERVE_FETCH_FAILED");
        assert!(fetch.is_retriable());

        let insufficient = MintError::from(ReserveError::Insufficient {
            requested: dec!(100),
            checked: vec![ObservedBalance::new(ReserveCurrency::Usdt, dec!(50))],
        });
        assert_eq!(insufficient.error_code(), "INSUFFICIENT_RESERVE");
        assert!(!insufficient.is_retriable());

        let invalid = MintError::from(ReserveError::NoCandidates);
        assert_eq!(invalid.error_code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_reconciliation_is_never_retriable() {
        let err = MintError::ReconciliationRequired {
            wallet: WalletAddress::parse("0xabc0000000000000000000000000000000000001").unwrap(),
            idempotency_key: IdempotencyKey::from_hex("ab".repeat(32)),
            transaction_ref: TransactionRef::new("0xfeed"),
            reason: StoreError::Database("disk full".to_string()),
        };
        assert!(!err.is_retriable());
        assert!(err.requires_reconciliation());
        assert!(err.to_string().contains("0xfeed"));
    }
}
