//! Row types for the SQLite tables
//!
//! Decimals, proofs and timestamps are stored as TEXT so values round-trip
//! exactly; conversion into domain types happens through `TryFrom`.

use chrono::{DateTime, SecondsFormat, Utc};
use reservemint_types::{
    IdempotencyKey, MintReceipt, MintRequest, RequestId, ReserveCurrency, ReserveProof,
    TransactionRef, WalletAddress,
};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;

use crate::StoreError;

pub const STATUS_CLAIMED: &str = "claimed";
pub const STATUS_MINTED: &str = "minted";

/// Fixed-width RFC 3339 so TEXT ordering matches time ordering
pub fn encode_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("{column}: {e}")))
}

fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw).map_err(|e| StoreError::Serialization(format!("{column}: {e}")))
}

fn required<T>(column: &str, value: Option<T>) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::Serialization(format!("{column} is NULL on a minted row")))
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMintRequest {
    pub id: String,
    pub wallet_address: String,
    pub requested_amount: String,
    pub submitted_proof: Option<String>,
    pub created_at: String,
}

impl DbMintRequest {
    pub fn from_domain(request: &MintRequest) -> Result<Self, StoreError> {
        Ok(Self {
            id: request.id.0.to_string(),
            wallet_address: request.wallet.to_string(),
            requested_amount: request.requested_amount.to_string(),
            submitted_proof: request
                .submitted_proof
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            created_at: encode_time(&request.created_at),
        })
    }
}

impl TryFrom<DbMintRequest> for MintRequest {
    type Error = StoreError;

    fn try_from(row: DbMintRequest) -> Result<Self, Self::Error> {
        Ok(MintRequest {
            id: RequestId::parse(&row.id).map_err(|e| StoreError::Serialization(format!("id: {e}")))?,
            wallet: WalletAddress::parse(&row.wallet_address)?,
            requested_amount: decode_decimal("requested_amount", &row.requested_amount)?,
            submitted_proof: row
                .submitted_proof
                .as_deref()
                .map(serde_json::from_str::<ReserveProof>)
                .transpose()?,
            created_at: decode_time("created_at", &row.created_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMintedReserve {
    pub wallet_address: String,
    pub idempotency_key: String,
    pub status: String,
    pub claim_token: Option<String>,
    pub claimed_at: String,
    pub request_id: Option<String>,
    pub minted_amount: Option<String>,
    pub currency: Option<String>,
    pub transaction_ref: Option<String>,
    pub completed_at: Option<String>,
}

impl TryFrom<DbMintedReserve> for MintReceipt {
    type Error = StoreError;

    fn try_from(row: DbMintedReserve) -> Result<Self, Self::Error> {
        if row.status != STATUS_MINTED {
            return Err(StoreError::InvalidInput(format!(
                "record {} / {} is {}, not minted",
                row.wallet_address, row.idempotency_key, row.status
            )));
        }

        let request_id = required("request_id", row.request_id)?;
        let minted_amount = required("minted_amount", row.minted_amount)?;
        let currency = required("currency", row.currency)?;
        let completed_at = required("completed_at", row.completed_at)?;

        Ok(MintReceipt {
            request_id: RequestId::parse(&request_id)
                .map_err(|e| StoreError::Serialization(format!("request_id: {e}")))?,
            wallet: WalletAddress::parse(&row.wallet_address)?,
            idempotency_key: IdempotencyKey::from_hex(row.idempotency_key),
            minted_amount: decode_decimal("minted_amount", &minted_amount)?,
            currency: ReserveCurrency::from_str(&currency)?,
            transaction_ref: TransactionRef::new(required("transaction_ref", row.transaction_ref)?),
            completed_at: decode_time("completed_at", &completed_at)?,
        })
    }
}
