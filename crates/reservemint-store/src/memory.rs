//! In-memory store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reservemint_types::{IdempotencyKey, MintReceipt, MintRequest, RequestId, WalletAddress};
use tracing::debug;
use uuid::Uuid;

use crate::{Claim, PersistenceStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Record {
    Claimed { token: Uuid, claimed_at: DateTime<Utc> },
    Minted(MintReceipt),
}

type RecordKey = (WalletAddress, IdempotencyKey);

/// Store backed by concurrent hash maps
#[derive(Default)]
pub struct MemoryStore {
    requests: DashMap<RequestId, MintRequest>,
    records: DashMap<RecordKey, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending claims
    pub fn pending_claims(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.value(), Record::Claimed { .. }))
            .count()
    }

    /// Number of receipts
    pub fn receipt_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.value(), Record::Minted(_)))
            .count()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn get_request(&self, id: RequestId) -> StoreResult<MintRequest> {
        self.requests
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound(format!("mint request {id}")))
    }

    async fn insert_request(&self, request: &MintRequest) -> StoreResult<()> {
        match self.requests.entry(request.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(format!("mint request {}", request.id))),
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                Ok(())
            }
        }
    }

    async fn list_requests(&self, limit: usize) -> StoreResult<Vec<MintRequest>> {
        let mut requests: Vec<MintRequest> =
            self.requests.iter().map(|r| r.value().clone()).collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests.truncate(limit);
        Ok(requests)
    }

    async fn claim_if_absent(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<Claim>> {
        match self.records.entry((wallet.clone(), key.clone())) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                let claim = Claim::new(wallet.clone(), key.clone());
                slot.insert(Record::Claimed {
                    token: claim.token,
                    claimed_at: claim.claimed_at,
                });
                debug!(%wallet, key = key.short(), "Claim created");
                Ok(Some(claim))
            }
        }
    }

    async fn write_receipt(&self, claim: &Claim, receipt: &MintReceipt) -> StoreResult<()> {
        claim.check_receipt(receipt)?;

        let mut record = self
            .records
            .get_mut(&(claim.wallet.clone(), claim.idempotency_key.clone()))
            .ok_or_else(|| claim.lost())?;

        let held = matches!(record.value(), Record::Claimed { token, .. } if *token == claim.token);
        if !held {
            return Err(claim.lost());
        }
        *record = Record::Minted(receipt.clone());
        Ok(())
    }

    async fn release_claim(&self, claim: &Claim) -> StoreResult<bool> {
        let removed = self.records.remove_if(
            &(claim.wallet.clone(), claim.idempotency_key.clone()),
            |_, record| matches!(record, Record::Claimed { token, .. } if *token == claim.token),
        );
        Ok(removed.is_some())
    }

    async fn find_receipt(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<MintReceipt>> {
        Ok(self
            .records
            .get(&(wallet.clone(), key.clone()))
            .and_then(|record| match record.value() {
                Record::Minted(receipt) => Some(receipt.clone()),
                Record::Claimed { .. } => None,
            }))
    }

    async fn claimed_since(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .records
            .get(&(wallet.clone(), key.clone()))
            .and_then(|record| match record.value() {
                Record::Claimed { claimed_at, .. } => Some(*claimed_at),
                Record::Minted(_) => None,
            }))
    }

    async fn list_receipts(&self, limit: usize) -> StoreResult<Vec<MintReceipt>> {
        let mut receipts: Vec<MintReceipt> = self
            .records
            .iter()
            .filter_map(|record| match record.value() {
                Record::Minted(receipt) => Some(receipt.clone()),
                Record::Claimed { .. } => None,
            })
            .collect();
        receipts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        receipts.truncate(limit);
        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reservemint_types::{ObservedBalance, ReserveCurrency, ReserveProof, TransactionRef};
    use rust_decimal_macros::dec;

    fn wallet() -> WalletAddress {
        WalletAddress::parse("0xabc0000000000000000000000000000000000001").unwrap()
    }

    fn key(balance: rust_decimal::Decimal) -> IdempotencyKey {
        let proof =
            ReserveProof::verified(vec![ObservedBalance::new(ReserveCurrency::Usdt, balance)]);
        IdempotencyKey::derive(&wallet(), &proof).unwrap()
    }

    #[tokio::test]
    async fn test_counts_split_claims_and_receipts() {
        let store = MemoryStore::new();
        assert_eq!((store.pending_claims(), store.receipt_count()), (0, 0));

        let minted = key(dec!(1));
        let claim = store.claim_if_absent(&wallet(), &minted).await.unwrap().unwrap();
        store
            .write_receipt(
                &claim,
                &MintReceipt {
                    request_id: RequestId::new(),
                    wallet: wallet(),
                    idempotency_key: minted,
                    minted_amount: dec!(1),
                    currency: ReserveCurrency::Usdt,
                    transaction_ref: TransactionRef::new("0x1"),
                    completed_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        store.claim_if_absent(&wallet(), &key(dec!(2))).await.unwrap().unwrap();
        store.claim_if_absent(&wallet(), &key(dec!(3))).await.unwrap().unwrap();

        assert_eq!(store.pending_claims(), 2);
        assert_eq!(store.receipt_count(), 1);
    }
}
