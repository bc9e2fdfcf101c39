//! Reserve verification
//!
//! Candidates are tried in priority order. An unreachable or malformed
//! balance makes that currency unavailable; it is never read as zero.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reservemint_types::{ObservedBalance, ReserveCurrency, ReserveProof, WalletAddress};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::BalanceSource;

/// Default deadline for a single balance lookup
pub const DEFAULT_BALANCE_TIMEOUT: Duration = Duration::from_secs(10);

/// A candidate currency whose balance could not be obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableCurrency {
    pub currency: ReserveCurrency,
    pub reason: String,
}

impl fmt::Display for UnavailableCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.currency, self.reason)
    }
}

/// Errors from reserve verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReserveError {
    #[error("Invalid requested amount {requested}: must be positive")]
    InvalidAmount { requested: Decimal },

    #[error("No candidate currencies to verify against")]
    NoCandidates,

    #[error(
        "Reserve balances unavailable for {}; checked {}",
        join(.unavailable),
        join(.checked)
    )]
    Fetch {
        unavailable: Vec<UnavailableCurrency>,
        checked: Vec<ObservedBalance>,
    },

    #[error("Insufficient reserves: requested {requested}, checked {}", join(.checked))]
    Insufficient {
        requested: Decimal,
        checked: Vec<ObservedBalance>,
    },
}

fn join<T: DisplayEntry>(items: &[T]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items
        .iter()
        .map(DisplayEntry::entry)
        .collect::<Vec<_>>()
        .join(", ")
}

trait DisplayEntry {
    fn entry(&self) -> String;
}

impl DisplayEntry for UnavailableCurrency {
    fn entry(&self) -> String {
        self.to_string()
    }
}

impl DisplayEntry for ObservedBalance {
    fn entry(&self) -> String {
        format!("{} {}", self.balance.normalize(), self.currency)
    }
}

pub type Result<T> = std::result::Result<T, ReserveError>;

/// Confirms that a wallet holds enough of some reserve currency
#[derive(Clone)]
pub struct ReserveVerifier {
    source: Arc<dyn BalanceSource>,
    timeout: Duration,
}

impl ReserveVerifier {
    pub fn new(source: Arc<dyn BalanceSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Verifier with [`DEFAULT_BALANCE_TIMEOUT`]
    pub fn with_default_timeout(source: Arc<dyn BalanceSource>) -> Self {
        Self::new(source, DEFAULT_BALANCE_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Verify that `wallet` holds at least `requested` of one candidate.
    ///
    /// The returned proof lists every balance observed up to and including
    /// the first sufficient currency.
    pub async fn verify(
        &self,
        wallet: &WalletAddress,
        requested: Decimal,
        candidates: &[ReserveCurrency],
    ) -> Result<ReserveProof> {
        if requested <= Decimal::ZERO {
            return Err(ReserveError::InvalidAmount { requested });
        }
        if candidates.is_empty() {
            return Err(ReserveError::NoCandidates);
        }

        let mut checked = Vec::with_capacity(candidates.len());
        let mut unavailable = Vec::new();

        for &currency in candidates {
            match self.fetch_normalized(wallet, currency).await {
                Ok(balance) => {
                    debug!(%wallet, %currency, %balance, %requested, "Observed reserve balance");
                    checked.push(ObservedBalance::new(currency, balance));
                    if balance >= requested {
                        info!(%wallet, %currency, %balance, %requested, "Reserves verified");
                        return Ok(ReserveProof::verified(checked));
                    }
                }
                Err(reason) => {
                    warn!(%wallet, %currency, reason = %reason, "Reserve currency unavailable");
                    unavailable.push(UnavailableCurrency { currency, reason });
                }
            }
        }

        if unavailable.is_empty() {
            Err(ReserveError::Insufficient { requested, checked })
        } else {
            Err(ReserveError::Fetch {
                unavailable,
                checked,
            })
        }
    }

    async fn fetch_normalized(
        &self,
        wallet: &WalletAddress,
        currency: ReserveCurrency,
    ) -> std::result::Result<Decimal, String> {
        let raw = match tokio::time::timeout(self.timeout, self.source.get_balance(wallet, currency))
            .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err(format!("timed out after {}ms", self.timeout.as_millis())),
        };

        raw.normalize(currency.decimals()).map_err(|e| e.to_string())
    }
}
