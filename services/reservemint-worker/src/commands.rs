//! Worker commands

use std::process::ExitCode;

use futures::stream::{self, StreamExt};
use reservemint_issuer::{MintError, MintOutcome};
use reservemint_types::{parse_mint_amount, IdempotencyKey, MintRequest, RequestId, WalletAddress};
use tokio_util::sync::CancellationToken;

use crate::app::App;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PENDING: u8 = 2;
pub const EXIT_RECONCILE: u8 = 3;

/// Result of one `mint` argument
#[derive(Debug)]
pub enum MintReport {
    BadId { input: String, reason: String },
    Done { id: RequestId, result: Result<MintOutcome, MintError> },
}

impl MintReport {
    fn line(&self) -> String {
        match self {
            Self::BadId { input, reason } => format!("{input}: invalid request id ({reason})"),
            Self::Done { id, result } => match result {
                Ok(MintOutcome::Minted(receipt)) => format!(
                    "{id}: minted {} to {} backed by {} (tx {}, key {})",
                    receipt.minted_amount,
                    receipt.wallet,
                    receipt.currency,
                    receipt.transaction_ref,
                    receipt.idempotency_key.short()
                ),
                Ok(MintOutcome::AlreadyMinted {
                    wallet,
                    idempotency_key,
                }) => format!(
                    "{id}: already minted for {wallet} (key {})",
                    idempotency_key.short()
                ),
                Ok(MintOutcome::ClaimPending {
                    wallet,
                    idempotency_key,
                    claimed_at,
                }) => {
                    let since = claimed_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_string());
                    format!(
                        "{id}: not minted; key {} for {wallet} is held by an unfinished mint (claimed {since})",
                        idempotency_key.short()
                    )
                }
                Err(e) => format!("{id}: {} {e}", e.error_code()),
            },
        }
    }
}

/// 3 if any mint needs reconciliation, else 2 if any key is held by an
/// unfinished claim, else 1 on any failure, else 0
pub fn exit_code(reports: &[MintReport]) -> u8 {
    let reconcile = reports.iter().any(|r| {
        matches!(r, MintReport::Done { result: Err(e), .. } if e.requires_reconciliation())
    });
    if reconcile {
        return EXIT_RECONCILE;
    }
    let pending = reports.iter().any(|r| {
        matches!(r, MintReport::Done { result: Ok(outcome), .. } if outcome.is_claim_pending())
    });
    if pending {
        return EXIT_PENDING;
    }
    let failed = reports.iter().any(|r| {
        matches!(
            r,
            MintReport::BadId { .. } | MintReport::Done { result: Err(_), .. }
        )
    });
    if failed {
        EXIT_FAILURE
    } else {
        EXIT_OK
    }
}

/// Mint each request, up to `max_concurrency` at a time
pub async fn mint(app: &App, ids: Vec<String>, cancel: CancellationToken) -> Vec<MintReport> {
    stream::iter(ids)
        .map(|input| {
            let cancel = cancel.clone();
            async move {
                let id = match RequestId::parse(&input) {
                    Ok(id) => id,
                    Err(e) => {
                        return MintReport::BadId {
                            input,
                            reason: e.to_string(),
                        }
                    }
                };
                let result = app.orchestrator.mint_with_cancel(id, &cancel).await;
                MintReport::Done { id, result }
            }
        })
        .buffer_unordered(app.max_concurrency)
        .collect()
        .await
}

pub async fn run_mint(app: &App, ids: Vec<String>) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; cancelling mints not yet submitted");
            on_signal.cancel();
        }
    });

    let reports = mint(app, ids, cancel).await;
    for report in &reports {
        println!("{}", report.line());
    }

    let code = exit_code(&reports);
    if code == EXIT_RECONCILE {
        tracing::error!("One or more mints require manual reconciliation");
    } else if code == EXIT_PENDING {
        tracing::warn!("One or more keys are held by unfinished mints; check for orphaned claims");
    }
    Ok(ExitCode::from(code))
}

pub async fn run_verify(app: &App, wallet: &str, amount: &str) -> anyhow::Result<ExitCode> {
    let wallet = WalletAddress::parse(wallet)?;
    let amount = parse_mint_amount(amount)?;

    match app
        .verifier
        .verify(&wallet, amount, &app.currency_priority)
        .await
    {
        Ok(proof) => {
            let key = IdempotencyKey::derive(&wallet, &proof)?;
            println!("{}", serde_json::to_string_pretty(&proof)?);
            println!("idempotency key: {key}");
            Ok(ExitCode::from(EXIT_OK))
        }
        Err(e) => {
            println!("{e}");
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}

pub async fn run_submit(app: &App, wallet: &str, amount: &str) -> anyhow::Result<ExitCode> {
    let wallet = WalletAddress::parse(wallet)?;
    let amount = parse_mint_amount(amount)?;

    let proof = match app
        .verifier
        .verify(&wallet, amount, &app.currency_priority)
        .await
    {
        Ok(proof) => proof,
        Err(e) => {
            println!("{e}");
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    };

    let request = MintRequest::new(wallet, amount, Some(proof))?;
    app.store.insert_request(&request).await?;
    tracing::info!(request_id = %request.id, wallet = %request.wallet, %amount, "Mint request stored");
    println!("{}", request.id);
    Ok(ExitCode::from(EXIT_OK))
}

pub async fn run_requests(app: &App, limit: usize) -> anyhow::Result<ExitCode> {
    for request in app.store.list_requests(limit).await? {
        println!("{}", serde_json::to_string(&request)?);
    }
    Ok(ExitCode::from(EXIT_OK))
}

pub async fn run_receipts(app: &App, limit: usize) -> anyhow::Result<ExitCode> {
    for receipt in app.store.list_receipts(limit).await? {
        println!("{}", serde_json::to_string(&receipt)?);
    }
    Ok(ExitCode::from(EXIT_OK))
}
