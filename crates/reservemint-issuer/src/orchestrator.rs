//! Mint orchestration

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use reservemint_chain::{BlockchainClient, ChainError};
use reservemint_reserve::ReserveVerifier;
use reservemint_store::{PersistenceStore, StoreError};
use reservemint_types::{IdempotencyKey, MintReceipt, MintRequest, RequestId, WalletAddress};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{ClaimGuard, MintError, MintOutcome, MintStage, OrchestratorConfig, Result};

/// Logs every stage transition of one mint attempt
struct StageTracker {
    stage: MintStage,
}

impl StageTracker {
    fn new() -> Self {
        debug!(stage = %MintStage::PendingVerification, "Mint stage");
        Self {
            stage: MintStage::PendingVerification,
        }
    }

    fn advance(&mut self, next: MintStage) {
        debug!(from = %self.stage, to = %next, "Mint stage");
        self.stage = next;
    }

    fn fail(&mut self, err: MintError) -> MintError {
        warn!(from = %self.stage, code = err.error_code(), error = %err, "Mint failed");
        self.stage = MintStage::Failed;
        err
    }

    fn current(&self) -> MintStage {
        self.stage
    }
}

/// Drives mint requests through verification, claim, submission and receipt
#[derive(Clone)]
pub struct MintOrchestrator {
    store: Arc<dyn PersistenceStore>,
    verifier: ReserveVerifier,
    chain: Arc<dyn BlockchainClient>,
    config: OrchestratorConfig,
}

impl MintOrchestrator {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        verifier: ReserveVerifier,
        chain: Arc<dyn BlockchainClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            verifier,
            chain,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PersistenceStore> {
        &self.store
    }

    /// Mint the request, at most once per (wallet, proof identity)
    pub async fn mint(&self, request_id: RequestId) -> Result<MintOutcome> {
        self.mint_with_cancel(request_id, &CancellationToken::new())
            .await
    }

    /// Mint with cooperative cancellation.
    ///
    /// Cancellation is honoured up to the start of submission. A claim won
    /// before cancellation is released. Once the mint is submitted the call
    /// runs to completion.
    pub async fn mint_with_cancel(
        &self,
        request_id: RequestId,
        cancel: &CancellationToken,
    ) -> Result<MintOutcome> {
        let span = info_span!("mint", request_id = %request_id);
        self.run(request_id, cancel).instrument(span).await
    }

    async fn run(&self, request_id: RequestId, cancel: &CancellationToken) -> Result<MintOutcome> {
        let mut stage = StageTracker::new();

        let request = until_cancelled(cancel, stage.current(), self.load_request(request_id))
            .await
            .and_then(|r| r)
            .map_err(|e| stage.fail(e))?;
        let wallet = request.wallet.clone();

        // Verify and freeze the proof
        let proof = until_cancelled(
            cancel,
            stage.current(),
            self.verifier.verify(
                &wallet,
                request.requested_amount,
                &self.config.currency_priority,
            ),
        )
        .await
        .and_then(|r| r.map_err(MintError::from))
        .map_err(|e| stage.fail(e))?;
        stage.advance(MintStage::ReserveVerified);

        if let Some(submitted) = &request.submitted_proof {
            if submitted.canonical_bytes().ok() != proof.canonical_bytes().ok() {
                debug!(%wallet, "Verified balances differ from the proof captured at submission");
            }
        }

        // Key strictly before annotation
        let key = IdempotencyKey::derive(&wallet, &proof)
            .map_err(|e| stage.fail(MintError::invalid_request(e.to_string())))?;
        let currency = proof
            .selected_currency()
            .ok_or_else(|| stage.fail(MintError::invalid_request("verified proof has no balances")))?;
        let annotated = proof.annotate(currency);

        if cancel.is_cancelled() {
            return Err(stage.fail(MintError::Cancelled {
                stage: stage.current(),
            }));
        }

        // The claim insert is not raced against cancellation: a won claim
        // must always reach the guard.
        let claim = match self
            .store
            .claim_if_absent(&wallet, &key)
            .await
            .map_err(|e| stage.fail(MintError::Store(e)))?
        {
            Some(claim) => claim,
            None => return self.claim_not_won(&mut stage, wallet, key).await,
        };
        let guard = ClaimGuard::new(self.store.clone(), claim);
        stage.advance(MintStage::Claimed);

        let recheck = until_cancelled(
            cancel,
            stage.current(),
            self.store.find_receipt(&wallet, &key),
        )
        .await;
        let existing = match recheck {
            Ok(Ok(existing)) => existing,
            Ok(Err(e)) => {
                guard.release().await;
                return Err(stage.fail(MintError::Store(e)));
            }
            Err(cancelled) => {
                guard.release().await;
                return Err(stage.fail(cancelled));
            }
        };
        if existing.is_some() {
            guard.release().await;
            stage.advance(MintStage::AlreadyMinted);
            info!(%wallet, key = key.short(), "Receipt found on re-check; skipping submission");
            return Ok(MintOutcome::AlreadyMinted {
                wallet,
                idempotency_key: key,
            });
        }

        let Some(claim) = guard.disarm() else {
            return Err(stage.fail(MintError::invalid_request("claim guard was empty")));
        };
        stage.advance(MintStage::Submitted);
        info!(
            %wallet,
            amount = %request.requested_amount,
            %currency,
            key = key.short(),
            "Submitting mint"
        );

        let submitted = tokio::time::timeout(
            self.config.submit_timeout,
            self.chain
                .submit_mint(&wallet, request.requested_amount, &annotated),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ChainError::Timeout {
                after_ms: self.config.submit_timeout.as_millis() as u64,
            })
        });

        let transaction_ref = match submitted {
            Ok(tx) => tx,
            Err(reason) => {
                match self.store.release_claim(&claim).await {
                    Ok(released) => debug!(released, "Claim released after failed submission"),
                    Err(e) => warn!(error = %e, "Failed to release claim after failed submission"),
                }
                return Err(stage.fail(MintError::Transaction {
                    reason,
                    idempotency_key: key,
                }));
            }
        };

        let receipt = MintReceipt {
            request_id: request.id,
            wallet: wallet.clone(),
            idempotency_key: key.clone(),
            minted_amount: request.requested_amount,
            currency,
            transaction_ref: transaction_ref.clone(),
            completed_at: Utc::now(),
        };

        if let Err(reason) = self.store.write_receipt(&claim, &receipt).await {
            error!(
                %wallet,
                idempotency_key = %key,
                tx = %transaction_ref,
                amount = %request.requested_amount,
                error = %reason,
                "Mint confirmed but receipt not recorded; manual reconciliation required"
            );
            stage.advance(MintStage::Failed);
            return Err(MintError::ReconciliationRequired {
                wallet,
                idempotency_key: key,
                transaction_ref,
                reason,
            });
        }

        stage.advance(MintStage::Confirmed);
        info!(
            %wallet,
            amount = %receipt.minted_amount,
            currency = %receipt.currency,
            tx = %receipt.transaction_ref,
            key = key.short(),
            "Mint recorded"
        );
        Ok(MintOutcome::Minted(receipt))
    }

    /// Classify a key someone else holds: finished receipt or pending claim
    async fn claim_not_won(
        &self,
        stage: &mut StageTracker,
        wallet: WalletAddress,
        key: IdempotencyKey,
    ) -> Result<MintOutcome> {
        // Claim first: a claim only ever turns into a receipt or disappears
        let claimed_at = self
            .store
            .claimed_since(&wallet, &key)
            .await
            .map_err(|e| stage.fail(MintError::Store(e)))?;
        let receipt = self
            .store
            .find_receipt(&wallet, &key)
            .await
            .map_err(|e| stage.fail(MintError::Store(e)))?;

        if receipt.is_some() {
            stage.advance(MintStage::AlreadyMinted);
            info!(%wallet, key = key.short(), "Already minted; skipping submission");
            return Ok(MintOutcome::AlreadyMinted {
                wallet,
                idempotency_key: key,
            });
        }

        stage.advance(MintStage::ClaimPending);
        let claim_age_secs = claimed_at.map(|t| (Utc::now() - t).num_seconds());
        warn!(
            %wallet,
            idempotency_key = %key,
            claim_age_secs = ?claim_age_secs,
            "Key is held by a mint with no receipt; nothing submitted"
        );
        Ok(MintOutcome::ClaimPending {
            wallet,
            idempotency_key: key,
            claimed_at,
        })
    }

    async fn load_request(&self, request_id: RequestId) -> Result<MintRequest> {
        self.store
            .get_request(request_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => MintError::NotFound { request_id },
                other => MintError::Store(other),
            })
    }
}

/// Run `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    stage: MintStage,
    fut: F,
) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MintError::Cancelled { stage }),
        out = fut => Ok(out),
    }
}
