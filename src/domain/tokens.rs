//! Token balances.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::config::TokenConfig;

/// A token tracked for the account. `address == None` is the native coin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Option<Address>,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn native(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            address: None,
            decimals: 18,
        }
    }

    pub fn erc20(symbol: &str, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            address: Some(address),
            decimals,
        }
    }

    /// Build from validated config.
    pub fn from_config(config: &TokenConfig) -> Result<Self, String> {
        let address = config
            .address
            .as_deref()
            .map(|a| {
                a.parse::<Address>()
                    .map_err(|e| format!("Invalid token address '{a}': {e}"))
            })
            .transpose()?;
        Ok(Self {
            symbol: config.symbol.clone(),
            address,
            decimals: config.decimals,
        })
    }

    pub fn is_native(&self) -> bool {
        self.address.is_none()
    }
}

/// Balance of one token held by the account, in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub symbol: String,
    pub token: Option<Address>,
    pub decimals: u8,
    pub balance: U256,
}

impl TokenBalance {
    pub fn new(info: &TokenInfo, balance: U256) -> Self {
        Self {
            symbol: info.symbol.clone(),
            token: info.address,
            decimals: info.decimals,
            balance,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.balance.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let native = TokenInfo::from_config(&TokenConfig {
            symbol: "ETH".into(),
            address: None,
            decimals: 18,
        })
        .unwrap();
        assert!(native.is_native());

        let usdc = TokenInfo::from_config(&TokenConfig {
            symbol: "USDC".into(),
            address: Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into()),
            decimals: 6,
        })
        .unwrap();
        assert!(!usdc.is_native());
        assert_eq!(usdc.decimals, 6);

        let bad = TokenInfo::from_config(&TokenConfig {
            symbol: "BAD".into(),
            address: Some("0xzz".into()),
            decimals: 6,
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_balance_from_info() {
        let info = TokenInfo::native("ETH");
        let balance = TokenBalance::new(&info, U256::ZERO);
        assert!(balance.is_zero());
        assert_eq!(balance.symbol, "ETH");
    }
}
