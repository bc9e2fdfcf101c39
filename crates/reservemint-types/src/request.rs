//! Mint requests
//!
//! Requests are created once by the upstream submission process and are
//! read-only to the mint pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ReserveProof, RequestId, Result, TypesError, WalletAddress};

/// A request to mint against a wallet's reserves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub id: RequestId,
    /// Wallet that holds the reserves and receives the mint
    pub wallet: WalletAddress,
    /// Amount to mint, as a semantic decimal
    pub requested_amount: Decimal,
    /// Proof captured when the request was submitted
    pub submitted_proof: Option<ReserveProof>,
    pub created_at: DateTime<Utc>,
}

impl MintRequest {
    /// Create a new request; the amount must be positive
    pub fn new(
        wallet: WalletAddress,
        requested_amount: Decimal,
        submitted_proof: Option<ReserveProof>,
    ) -> Result<Self> {
        if requested_amount <= Decimal::ZERO {
            return Err(TypesError::InvalidAmount {
                amount: requested_amount.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(Self {
            id: RequestId::new(),
            wallet,
            requested_amount,
            submitted_proof,
            created_at: Utc::now(),
        })
    }
}
