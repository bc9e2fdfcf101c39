//! Idempotency keys
//!
//! The key is SHA-256 over the wallet and the proof's canonical identity.
//! It is the sole boundary for at-most-once minting. The requested amount
//! is not part of it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::{ReserveProof, Result, WalletAddress};

/// Stable hash of (wallet, proof identity), hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derive the key for a wallet and a frozen proof
    pub fn derive(wallet: &WalletAddress, proof: &ReserveProof) -> Result<Self> {
        let mut hasher = Sha256::new();
        hasher.update(wallet.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(proof.canonical_bytes()?);
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Wrap a key read back from storage
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObservedBalance, ReserveCurrency};
    use rust_decimal_macros::dec;

    fn wallet(s: &str) -> WalletAddress {
        WalletAddress::parse(s).unwrap()
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let proof = ReserveProof::verified(vec![ObservedBalance::new(
            ReserveCurrency::Usdt,
            dec!(120.5),
        )]);
        let key = IdempotencyKey::derive(&wallet("0xabc0000000000000000000000000000000000001"), &proof)
            .unwrap();
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.short().len(), 12);
    }

    #[test]
    fn test_key_depends_on_wallet() {
        let proof = ReserveProof::verified(vec![ObservedBalance::new(
            ReserveCurrency::Usdt,
            dec!(120.5),
        )]);
        let a = IdempotencyKey::derive(&wallet("0xabc0000000000000000000000000000000000001"), &proof)
            .unwrap();
        let b = IdempotencyKey::derive(&wallet("0xabc0000000000000000000000000000000000002"), &proof)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_ignores_annotation_and_checksum_case() {
        let proof = ReserveProof::verified(vec![ObservedBalance::new(
            ReserveCurrency::Usdt,
            dec!(120.5),
        )]);
        let before = IdempotencyKey::derive(
            &wallet("0xABC0000000000000000000000000000000000001"),
            &proof,
        )
        .unwrap();

        let annotated = proof.annotate(ReserveCurrency::Usdt);
        let after = IdempotencyKey::derive(
            &wallet("0xabc0000000000000000000000000000000000001"),
            &annotated.proof,
        )
        .unwrap();

        assert_eq!(before, after);
    }
}
