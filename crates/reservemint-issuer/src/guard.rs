//! Claim guard
//!
//! Holds a won claim between the claim insert and the start of submission.
//! If the holder is cancelled or dropped in that window the claim is
//! released so the key is not blocked forever.

use std::sync::Arc;

use reservemint_store::{Claim, PersistenceStore};
use tokio::runtime::Handle;
use tracing::{debug, warn};

pub struct ClaimGuard {
    store: Arc<dyn PersistenceStore>,
    claim: Option<Claim>,
}

impl ClaimGuard {
    pub fn new(store: Arc<dyn PersistenceStore>, claim: Claim) -> Self {
        Self {
            store,
            claim: Some(claim),
        }
    }

    pub fn claim(&self) -> Option<&Claim> {
        self.claim.as_ref()
    }

    /// Release the claim now. Returns whether the store still held it.
    pub async fn release(mut self) -> bool {
        let Some(claim) = self.claim.take() else {
            return false;
        };
        release_logged(self.store.as_ref(), &claim).await
    }

    /// Hand the claim over to the submitter; dropping the guard no longer
    /// releases it.
    pub fn disarm(mut self) -> Option<Claim> {
        self.claim.take()
    }
}

async fn release_logged(store: &dyn PersistenceStore, claim: &Claim) -> bool {
    match store.release_claim(claim).await {
        Ok(released) => {
            debug!(
                wallet = %claim.wallet,
                key = claim.idempotency_key.short(),
                released,
                "Claim released"
            );
            released
        }
        Err(e) => {
            warn!(
                wallet = %claim.wallet,
                key = claim.idempotency_key.short(),
                error = %e,
                "Failed to release claim"
            );
            false
        }
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let Some(claim) = self.claim.take() else {
            return;
        };

        match Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                handle.spawn(async move {
                    release_logged(store.as_ref(), &claim).await;
                });
            }
            Err(_) => warn!(
                wallet = %claim.wallet,
                key = claim.idempotency_key.short(),
                "Claim guard dropped outside a runtime; claim left pending"
            ),
        }
    }
}
