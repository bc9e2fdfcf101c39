//! Behaviour every PersistenceStore backend must share

use std::sync::Arc;

use chrono::{Duration, Utc};
use reservemint_store::{MemoryStore, PersistenceStore, SqliteStore, StoreError};
use reservemint_types::{
    IdempotencyKey, MintReceipt, MintRequest, ObservedBalance, RequestId, ReserveCurrency,
    ReserveProof, TransactionRef, WalletAddress,
};
use rust_decimal_macros::dec;

fn wallet() -> WalletAddress {
    WalletAddress::parse("0x27155fefaebaa8f6854de9bae219c19a55ff8a9c").unwrap()
}

fn key(balance: rust_decimal::Decimal) -> IdempotencyKey {
    let proof = ReserveProof::verified(vec![ObservedBalance::new(ReserveCurrency::Usdt, balance)]);
    IdempotencyKey::derive(&wallet(), &proof).unwrap()
}

fn receipt(key: &IdempotencyKey, tx: &str) -> MintReceipt {
    MintReceipt {
        request_id: RequestId::new(),
        wallet: wallet(),
        idempotency_key: key.clone(),
        minted_amount: dec!(100),
        currency: ReserveCurrency::Usdt,
        transaction_ref: TransactionRef::new(tx),
        completed_at: Utc::now(),
    }
}

async fn backends() -> Vec<(&'static str, Arc<dyn PersistenceStore>)> {
    vec![
        ("memory", Arc::new(MemoryStore::new())),
        ("sqlite", Arc::new(SqliteStore::in_memory().await.unwrap())),
    ]
}

#[tokio::test]
async fn test_request_insert_and_get() {
    for (name, store) in backends().await {
        let request = MintRequest::new(wallet(), dec!(100), None).unwrap();
        store.insert_request(&request).await.unwrap();

        let loaded = store.get_request(request.id).await.unwrap();
        assert_eq!(loaded.wallet, request.wallet, "{name}");
        assert_eq!(loaded.requested_amount, dec!(100), "{name}");

        assert!(
            matches!(store.insert_request(&request).await, Err(StoreError::Duplicate(_))),
            "{name}"
        );
        assert!(
            matches!(store.get_request(RequestId::new()).await, Err(StoreError::NotFound(_))),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_list_requests_newest_first_with_proofs() {
    for (name, store) in backends().await {
        let now = Utc::now();
        let mut ids = Vec::new();
        for i in 0..3 {
            let proof = ReserveProof::verified(vec![ObservedBalance::new(
                ReserveCurrency::Usdt,
                dec!(120.5),
            )]);
            let mut request = MintRequest::new(wallet(), dec!(100), Some(proof)).unwrap();
            request.created_at = now + Duration::seconds(i);
            store.insert_request(&request).await.unwrap();
            ids.push(request.id);
        }

        let listed = store.list_requests(2).await.unwrap();
        let listed_ids: Vec<RequestId> = listed.iter().map(|r| r.id).collect();
        assert_eq!(listed_ids, vec![ids[2], ids[1]], "{name}");

        let proof = listed[0].submitted_proof.as_ref().unwrap();
        assert_eq!(proof.balance_of(ReserveCurrency::Usdt), Some(dec!(120.5)), "{name}");
        assert_eq!(store.list_requests(10).await.unwrap().len(), 3, "{name}");
    }
}

#[tokio::test]
async fn test_claimed_since_tracks_pending_claims_only() {
    for (name, store) in backends().await {
        let k = key(dec!(120.5));
        assert_eq!(store.claimed_since(&wallet(), &k).await.unwrap(), None, "{name}");

        let claim = store.claim_if_absent(&wallet(), &k).await.unwrap().unwrap();
        let since = store.claimed_since(&wallet(), &k).await.unwrap().unwrap();
        assert!(
            (since - claim.claimed_at).num_milliseconds().abs() < 1,
            "{name}: {since} vs {}",
            claim.claimed_at
        );

        store.write_receipt(&claim, &receipt(&k, "0xabc")).await.unwrap();
        assert_eq!(store.claimed_since(&wallet(), &k).await.unwrap(), None, "{name}");
    }
}

#[tokio::test]
async fn test_claim_is_exclusive_until_released() {
    for (name, store) in backends().await {
        let k = key(dec!(120.5));

        let first = store.claim_if_absent(&wallet(), &k).await.unwrap();
        assert!(first.is_some(), "{name}");
        assert!(store.claim_if_absent(&wallet(), &k).await.unwrap().is_none(), "{name}");

        assert!(store.release_claim(&first.unwrap()).await.unwrap(), "{name}");
        assert!(store.claim_if_absent(&wallet(), &k).await.unwrap().is_some(), "{name}");
    }
}

#[tokio::test]
async fn test_receipt_replaces_claim_permanently() {
    for (name, store) in backends().await {
        let k = key(dec!(120.5));
        let claim = store.claim_if_absent(&wallet(), &k).await.unwrap().unwrap();
        assert!(store.find_receipt(&wallet(), &k).await.unwrap().is_none(), "{name}");

        let written = receipt(&k, "0xabc");
        store.write_receipt(&claim, &written).await.unwrap();

        let found = store.find_receipt(&wallet(), &k).await.unwrap().unwrap();
        assert_eq!(found.transaction_ref, written.transaction_ref, "{name}");
        assert_eq!(found.minted_amount, dec!(100), "{name}");

        // Releasing a finalized claim never removes the receipt
        assert!(!store.release_claim(&claim).await.unwrap(), "{name}");
        assert!(store.find_receipt(&wallet(), &k).await.unwrap().is_some(), "{name}");
        assert!(store.claim_if_absent(&wallet(), &k).await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_stale_claim_cannot_write_or_release() {
    for (name, store) in backends().await {
        let k = key(dec!(7));
        let stale = store.claim_if_absent(&wallet(), &k).await.unwrap().unwrap();
        store.release_claim(&stale).await.unwrap();
        let current = store.claim_if_absent(&wallet(), &k).await.unwrap().unwrap();

        assert!(
            matches!(
                store.write_receipt(&stale, &receipt(&k, "0x1")).await,
                Err(StoreError::ClaimLost { .. })
            ),
            "{name}"
        );
        assert!(!store.release_claim(&stale).await.unwrap(), "{name}");

        store.write_receipt(&current, &receipt(&k, "0x2")).await.unwrap();
        let found = store.find_receipt(&wallet(), &k).await.unwrap().unwrap();
        assert_eq!(found.transaction_ref.as_str(), "0x2", "{name}");
    }
}

#[tokio::test]
async fn test_receipt_must_match_claim() {
    for (name, store) in backends().await {
        let k = key(dec!(1));
        let claim = store.claim_if_absent(&wallet(), &k).await.unwrap().unwrap();
        let other = receipt(&key(dec!(2)), "0x1");
        assert!(
            matches!(
                store.write_receipt(&claim, &other).await,
                Err(StoreError::InvalidInput(_))
            ),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_list_receipts_newest_first() {
    for (name, store) in backends().await {
        let now = Utc::now();
        for (i, balance) in [dec!(1), dec!(2), dec!(3)].into_iter().enumerate() {
            let k = key(balance);
            let claim = store.claim_if_absent(&wallet(), &k).await.unwrap().unwrap();
            let mut r = receipt(&k, &format!("0x{i}"));
            r.completed_at = now + Duration::seconds(i as i64);
            store.write_receipt(&claim, &r).await.unwrap();
        }
        // Pending claims are not receipts
        store.claim_if_absent(&wallet(), &key(dec!(4))).await.unwrap().unwrap();

        let listed = store.list_receipts(2).await.unwrap();
        let txs: Vec<&str> = listed.iter().map(|r| r.transaction_ref.as_str()).collect();
        assert_eq!(txs, vec!["0x2", "0x1"], "{name}");
        assert_eq!(store.list_receipts(10).await.unwrap().len(), 3, "{name}");
    }
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    for (name, store) in backends().await {
        let k = key(dec!(120.5));
        let attempts = (0..16).map(|_| {
            let store = store.clone();
            let k = k.clone();
            tokio::spawn(async move { store.claim_if_absent(&wallet(), &k).await })
        });

        let results = futures::future::join_all(attempts).await;
        let winners = results
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .filter(Option::is_some)
            .count();
        assert_eq!(winners, 1, "{name}");
    }
}

#[tokio::test]
async fn test_sqlite_schema_init_is_idempotent() {
    let store = SqliteStore::in_memory().await.unwrap();
    store.init_schema().await.unwrap();
    store.init_schema().await.unwrap();
}
