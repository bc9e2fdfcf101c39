//! SQLite store
//!
//! One row per (wallet, idempotency key) in `minted_reserves`. The primary
//! key makes the claim insert the serialization point; finalizing and
//! releasing are compare-and-swap statements on the claim token.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reservemint_types::{IdempotencyKey, MintReceipt, MintRequest, RequestId, WalletAddress};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::models::{decode_time, encode_time, DbMintRequest, DbMintedReserve, STATUS_CLAIMED, STATUS_MINTED};
use crate::{Claim, PersistenceStore, StoreError, StoreResult};

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS mint_requests (
        id                TEXT PRIMARY KEY,
        wallet_address    TEXT NOT NULL,
        requested_amount  TEXT NOT NULL,
        submitted_proof   TEXT,
        created_at        TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS minted_reserves (
        wallet_address    TEXT NOT NULL,
        idempotency_key   TEXT NOT NULL,
        status            TEXT NOT NULL,
        claim_token       TEXT,
        claimed_at        TEXT NOT NULL,
        request_id        TEXT,
        minted_amount     TEXT,
        currency          TEXT,
        transaction_ref   TEXT,
        completed_at      TEXT,
        PRIMARY KEY (wallet_address, idempotency_key)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_mint_requests_created
        ON mint_requests (created_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_minted_reserves_completed
        ON minted_reserves (status, completed_at)
    "#,
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) a database and ensure the schema exists
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init_schema().await?;
        info!(url, max_connections, "SQLite store ready");
        Ok(store)
    }

    /// Private in-memory database; one connection so every query sees it
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Create tables if they do not exist
    pub async fn init_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_record(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<DbMintedReserve>> {
        let row = sqlx::query_as::<_, DbMintedReserve>(
            "SELECT * FROM minted_reserves WHERE wallet_address = ? AND idempotency_key = ?",
        )
        .bind(wallet.as_str())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn get_request(&self, id: RequestId) -> StoreResult<MintRequest> {
        let row = sqlx::query_as::<_, DbMintRequest>("SELECT * FROM mint_requests WHERE id = ?")
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("mint request {id}")))?;
        MintRequest::try_from(row)
    }

    async fn insert_request(&self, request: &MintRequest) -> StoreResult<()> {
        let row = DbMintRequest::from_domain(request)?;
        sqlx::query(
            r#"
            INSERT INTO mint_requests (id, wallet_address, requested_amount, submitted_proof, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.wallet_address)
        .bind(&row.requested_amount)
        .bind(&row.submitted_proof)
        .bind(&row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate(_) => StoreError::Duplicate(format!("mint request {}", request.id)),
            other => other,
        })?;
        Ok(())
    }

    async fn list_requests(&self, limit: usize) -> StoreResult<Vec<MintRequest>> {
        let rows = sqlx::query_as::<_, DbMintRequest>(
            "SELECT * FROM mint_requests ORDER BY created_at DESC LIMIT ?",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MintRequest::try_from).collect()
    }

    async fn claim_if_absent(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<Claim>> {
        let claim = Claim::new(wallet.clone(), key.clone());
        let result = sqlx::query(
            r#"
            INSERT INTO minted_reserves (wallet_address, idempotency_key, status, claim_token, claimed_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (wallet_address, idempotency_key) DO NOTHING
            "#,
        )
        .bind(wallet.as_str())
        .bind(key.as_str())
        .bind(STATUS_CLAIMED)
        .bind(claim.token.to_string())
        .bind(encode_time(&claim.claimed_at))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(%wallet, key = key.short(), "Claim created");
            Ok(Some(claim))
        } else {
            Ok(None)
        }
    }

    async fn write_receipt(&self, claim: &Claim, receipt: &MintReceipt) -> StoreResult<()> {
        claim.check_receipt(receipt)?;

        let result = sqlx::query(
            r#"
            UPDATE minted_reserves
            SET status = ?, claim_token = NULL, request_id = ?, minted_amount = ?,
                currency = ?, transaction_ref = ?, completed_at = ?
            WHERE wallet_address = ? AND idempotency_key = ?
              AND status = ? AND claim_token = ?
            "#,
        )
        .bind(STATUS_MINTED)
        .bind(receipt.request_id.0.to_string())
        .bind(receipt.minted_amount.to_string())
        .bind(receipt.currency.symbol())
        .bind(receipt.transaction_ref.as_str())
        .bind(encode_time(&receipt.completed_at))
        .bind(claim.wallet.as_str())
        .bind(claim.idempotency_key.as_str())
        .bind(STATUS_CLAIMED)
        .bind(claim.token.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(claim.lost())
        }
    }

    async fn release_claim(&self, claim: &Claim) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM minted_reserves
            WHERE wallet_address = ? AND idempotency_key = ?
              AND status = ? AND claim_token = ?
            "#,
        )
        .bind(claim.wallet.as_str())
        .bind(claim.idempotency_key.as_str())
        .bind(STATUS_CLAIMED)
        .bind(claim.token.to_string())
        .execute(&self.pool)
        .await?;

        let released = result.rows_affected() == 1;
        debug!(
            wallet = %claim.wallet,
            key = claim.idempotency_key.short(),
            released,
            held_for_ms = (Utc::now() - claim.claimed_at).num_milliseconds(),
            "Claim release"
        );
        Ok(released)
    }

    async fn find_receipt(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<MintReceipt>> {
        match self.find_record(wallet, key).await? {
            Some(row) if row.status == STATUS_MINTED => Ok(Some(MintReceipt::try_from(row)?)),
            _ => Ok(None),
        }
    }

    async fn claimed_since(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        match self.find_record(wallet, key).await? {
            Some(row) if row.status == STATUS_CLAIMED => {
                Ok(Some(decode_time("claimed_at", &row.claimed_at)?))
            }
            _ => Ok(None),
        }
    }

    async fn list_receipts(&self, limit: usize) -> StoreResult<Vec<MintReceipt>> {
        let rows = sqlx::query_as::<_, DbMintedReserve>(
            "SELECT * FROM minted_reserves WHERE status = ? ORDER BY completed_at DESC LIMIT ?",
        )
        .bind(STATUS_MINTED)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MintReceipt::try_from).collect()
    }
}
