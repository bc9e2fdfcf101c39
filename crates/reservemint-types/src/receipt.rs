//! Mint receipts
//!
//! A receipt is the permanent record of a confirmed mint. There is at most
//! one per (wallet, idempotency key) and it is never updated or deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{IdempotencyKey, RequestId, ReserveCurrency, TransactionRef, WalletAddress};

/// Durable record of a confirmed mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub request_id: RequestId,
    pub wallet: WalletAddress,
    pub idempotency_key: IdempotencyKey,
    pub minted_amount: Decimal,
    /// Reserve currency that backed the mint
    pub currency: ReserveCurrency,
    pub transaction_ref: TransactionRef,
    pub completed_at: DateTime<Utc>,
}
