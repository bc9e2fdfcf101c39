//! Reserve currencies
//!
//! ERC-20 tokens whose balances may back a mint. Each carries the decimal
//! precision its raw on-chain balance is expressed in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Token held as reserve backing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReserveCurrency {
    /// Tether USD
    Usdt,
    /// USD Coin
    Usdc,
    /// Euro Coin
    Eurc,
    /// DAI stablecoin
    Dai,
}

impl ReserveCurrency {
    /// All supported reserve currencies
    pub const ALL: [ReserveCurrency; 4] = [Self::Usdt, Self::Usdc, Self::Eurc, Self::Dai];

    /// Decimal places of the token's smallest unit
    pub fn decimals(&self) -> u8 {
        match self {
            Self::Usdt | Self::Usdc | Self::Eurc => 6,
            Self::Dai => 18,
        }
    }

    /// Ticker symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Usdt => "USDT",
            Self::Usdc => "USDC",
            Self::Eurc => "EURC",
            Self::Dai => "DAI",
        }
    }

    /// ERC-20 contract on Ethereum mainnet
    pub fn mainnet_contract(&self) -> &'static str {
        match self {
            Self::Usdt => "0xdAC17F958D2ee523a2206206994597C13D831ec7",
            Self::Usdc => "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            Self::Eurc => "0x1aBaEA1f7C830bD89Acc67eC4af516284b1bC33c",
            Self::Dai => "0x6B175474E89094C44Da98b954EedeAC495271d0F",
        }
    }
}

impl fmt::Display for ReserveCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ReserveCurrency {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.symbol() == upper)
            .ok_or_else(|| TypesError::UnknownCurrency {
                symbol: s.to_string(),
            })
    }
}
