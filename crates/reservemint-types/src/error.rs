//! Error types for reservemint domain values

use thiserror::Error;

/// Result type for domain value construction
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors raised while parsing or converting domain values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Not a 20-byte hex EVM address
    #[error("Invalid wallet address: {address}")]
    InvalidAddress { address: String },

    /// Unknown reserve currency symbol
    #[error("Unknown reserve currency: {symbol}")]
    UnknownCurrency { symbol: String },

    /// Raw balance is not an unsigned integer in smallest units
    #[error("Malformed balance {raw:?}: {reason}")]
    MalformedBalance { raw: String, reason: String },

    /// Amount cannot be represented for the requested operation
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    /// Canonical encoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TypesError {
    fn from(e: serde_json::Error) -> Self {
        TypesError::Serialization(e.to_string())
    }
}
