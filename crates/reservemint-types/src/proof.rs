//! Reserve proofs
//!
//! A proof records the balances observed for a wallet at verification time.
//! Only the (currency, balance) pairs form its identity; timestamps and any
//! annotation added afterwards are bookkeeping.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ReserveCurrency, Result};

/// A normalized balance observed for one currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedBalance {
    pub currency: ReserveCurrency,
    pub balance: Decimal,
}

impl ObservedBalance {
    pub fn new(currency: ReserveCurrency, balance: Decimal) -> Self {
        Self { currency, balance }
    }
}

/// Balances observed for a wallet, frozen at verification time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveProof {
    /// Balances in query order; the last entry covered the request
    pub balances: Vec<ObservedBalance>,
    pub verified_at: DateTime<Utc>,
    pub verified: bool,
}

/// Identity-bearing projection of a proof
#[derive(Serialize)]
struct CanonicalProof<'a> {
    balances: BTreeMap<&'a str, String>,
}

impl ReserveProof {
    /// Create a verified proof stamped now
    pub fn verified(balances: Vec<ObservedBalance>) -> Self {
        Self {
            balances,
            verified_at: Utc::now(),
            verified: true,
        }
    }

    /// Currency whose balance covered the request
    pub fn selected_currency(&self) -> Option<ReserveCurrency> {
        self.balances.last().map(|b| b.currency)
    }

    /// Balance observed for a currency, if it was queried
    pub fn balance_of(&self, currency: ReserveCurrency) -> Option<Decimal> {
        self.balances
            .iter()
            .find(|b| b.currency == currency)
            .map(|b| b.balance)
    }

    /// Deterministic encoding of the proof's identity fields.
    ///
    /// Currencies are sorted by symbol and balances are written in
    /// normalized form, so `120.5` and `120.50` encode identically.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let canonical = CanonicalProof {
            balances: self
                .balances
                .iter()
                .map(|b| (b.currency.symbol(), b.balance.normalize().to_string()))
                .collect(),
        };
        Ok(serde_json::to_vec(&canonical)?)
    }

    /// Attach post-verification metadata. The proof itself is untouched.
    pub fn annotate(&self, selected_currency: ReserveCurrency) -> AnnotatedProof {
        AnnotatedProof {
            proof: self.clone(),
            selected_currency,
            validated_at: Utc::now(),
        }
    }
}

/// A proof plus metadata attached after its idempotency key was taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedProof {
    pub proof: ReserveProof,
    pub selected_currency: ReserveCurrency,
    pub validated_at: DateTime<Utc>,
}

impl AnnotatedProof {
    /// JSON payload attached to the mint transaction
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn proof(balances: &[(ReserveCurrency, Decimal)]) -> ReserveProof {
        ReserveProof::verified(
            balances
                .iter()
                .map(|(c, b)| ObservedBalance::new(*c, *b))
                .collect(),
        )
    }

    #[test]
    fn test_canonical_bytes_ignore_timestamps() {
        let a = proof(&[(ReserveCurrency::Usdt, dec!(120.5))]);
        let mut b = a.clone();
        b.verified_at = a.verified_at + Duration::hours(3);
        b.verified = false;
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn test_canonical_bytes_normalize_scale() {
        let a = proof(&[(ReserveCurrency::Usdt, dec!(120.5))]);
        let b = proof(&[(ReserveCurrency::Usdt, dec!(120.500000))]);
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn test_canonical_bytes_order_independent() {
        let a = proof(&[
            (ReserveCurrency::Usdt, dec!(1)),
            (ReserveCurrency::Usdc, dec!(2)),
        ]);
        let b = proof(&[
            (ReserveCurrency::Usdc, dec!(2)),
            (ReserveCurrency::Usdt, dec!(1)),
        ]);
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn test_canonical_bytes_distinguish_balances() {
        let a = proof(&[(ReserveCurrency::Usdt, dec!(120.5))]);
        let b = proof(&[(ReserveCurrency::Usdt, dec!(120.6))]);
        let c = proof(&[(ReserveCurrency::Usdc, dec!(120.5))]);
        assert_ne!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
        assert_ne!(a.canonical_bytes().unwrap(), c.canonical_bytes().unwrap());
    }

    #[test]
    fn test_selected_currency_is_last_observed() {
        let p = proof(&[
            (ReserveCurrency::Usdt, dec!(1)),
            (ReserveCurrency::Usdc, dec!(200)),
        ]);
        assert_eq!(p.selected_currency(), Some(ReserveCurrency::Usdc));
        assert_eq!(p.balance_of(ReserveCurrency::Usdt), Some(dec!(1)));
        assert_eq!(p.balance_of(ReserveCurrency::Eurc), None);
    }

    #[test]
    fn test_annotate_keeps_proof() {
        let p = proof(&[(ReserveCurrency::Usdt, dec!(120.5))]);
        let annotated = p.annotate(ReserveCurrency::Usdt);
        assert_eq!(annotated.proof, p);
        assert_eq!(annotated.selected_currency, ReserveCurrency::Usdt);

        let payload = annotated.to_payload().unwrap();
        assert!(payload.contains("\"selected_currency\":\"USDT\""));
    }
}
