//! In-memory balance source for tests and dry runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reservemint_types::{RawBalance, ReserveCurrency, WalletAddress};

use crate::{BalanceError, BalanceSource};

/// Fixed balances keyed by (wallet, currency)
///
/// Missing entries read as `"0"`. Failures and latency can be injected
/// per currency to exercise unavailable-source paths.
#[derive(Default)]
pub struct StaticBalanceSource {
    balances: RwLock<HashMap<(WalletAddress, ReserveCurrency), RawBalance>>,
    failures: RwLock<HashMap<ReserveCurrency, String>>,
    latency: RwLock<Option<Duration>>,
    calls: AtomicUsize,
}

impl StaticBalanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, wallet: &WalletAddress, currency: ReserveCurrency, raw: &str) -> Self {
        self.set_balance(wallet, currency, raw);
        self
    }

    pub fn with_failure(self, currency: ReserveCurrency, reason: &str) -> Self {
        self.fail_currency(currency, reason);
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.write() = Some(latency);
        self
    }

    pub fn set_balance(&self, wallet: &WalletAddress, currency: ReserveCurrency, raw: &str) {
        self.balances
            .write()
            .insert((wallet.clone(), currency), RawBalance::new(raw));
    }

    pub fn fail_currency(&self, currency: ReserveCurrency, reason: &str) {
        self.failures.write().insert(currency, reason.to_string());
    }

    pub fn restore_currency(&self, currency: ReserveCurrency) {
        self.failures.write().remove(&currency);
    }

    /// Number of `get_balance` calls served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceSource for StaticBalanceSource {
    async fn get_balance(
        &self,
        address: &WalletAddress,
        currency: ReserveCurrency,
    ) -> Result<RawBalance, BalanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(reason) = self.failures.read().get(&currency) {
            return Err(BalanceError::unavailable(reason.clone()));
        }

        Ok(self
            .balances
            .read()
            .get(&(address.clone(), currency))
            .cloned()
            .unwrap_or_else(|| RawBalance::new("0")))
    }
}
