//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Parse addresses and URLs up front so services never see malformed ones
//! - Validate value ranges (intervals > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SyncConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::SyncConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid address '{value}'")]
    InvalidAddress { field: String, value: String },

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: String, value: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: String },

    #[error("account.tokens must list at least one token")]
    NoTokens,

    #[error("account.tokens: duplicate symbol '{0}'")]
    DuplicateSymbol(String),

    #[error("account.tokens: empty symbol")]
    EmptySymbol,

    #[error("observability.log_format: unknown format '{0}'")]
    UnknownLogFormat(String),

    #[error("observability.metrics_address: invalid socket address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "account.owner", &config.account.owner);

    if config.account.tokens.is_empty() {
        errors.push(ValidationError::NoTokens);
    }
    let mut symbols = HashSet::new();
    for token in &config.account.tokens {
        if token.symbol.trim().is_empty() {
            errors.push(ValidationError::EmptySymbol);
        } else if !symbols.insert(token.symbol.to_ascii_uppercase()) {
            errors.push(ValidationError::DuplicateSymbol(token.symbol.clone()));
        }
        if let Some(address) = &token.address {
            let field = format!("account.tokens[{}].address", token.symbol);
            check_address(&mut errors, &field, address);
        }
    }

    check_url(&mut errors, "ledger.rpc_url", &config.ledger.rpc_url);
    for (i, failover) in config.ledger.failover_urls.iter().enumerate() {
        check_url(&mut errors, &format!("ledger.failover_urls[{i}]"), failover);
    }
    check_url(&mut errors, "indexer.base_url", &config.indexer.base_url);

    let intervals = [
        ("ledger.rpc_timeout_secs", config.ledger.rpc_timeout_secs),
        ("ledger.receipt_poll_interval_ms", config.ledger.receipt_poll_interval_ms),
        ("indexer.request_timeout_secs", config.indexer.request_timeout_secs),
        ("tokens.poll_interval_secs", config.tokens.poll_interval_secs),
        ("transfers.poll_interval_secs", config.transfers.poll_interval_secs),
        ("transfers.max_items", config.transfers.max_items as u64),
        ("streams.poll_interval_secs", config.streams.poll_interval_secs),
        ("streams.interpolation_interval_secs", config.streams.interpolation_interval_secs),
    ];
    for (field, value) in intervals {
        if value == 0 {
            errors.push(ValidationError::ZeroValue {
                field: field.to_string(),
            });
        }
    }

    let format = config.observability.log_format.as_str();
    if format != "compact" && format != "pretty" {
        errors.push(ValidationError::UnknownLogFormat(format.to_string()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<Address>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    let valid = url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https" | "ws" | "wss"))
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TokenConfig;

    fn valid_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.account.owner = "0x00000000000000000000000000000000000000aa".to_string();
        config.account.tokens.push(TokenConfig {
            symbol: "ETH".to_string(),
            address: None,
            decimals: 18,
        });
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_bad_owner_and_token_address() {
        let mut config = valid_config();
        config.account.owner = "0x1234".to_string();
        config.account.tokens.push(TokenConfig {
            symbol: "USDC".to_string(),
            address: Some("not-an-address".to_string()),
            decimals: 6,
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::InvalidAddress { .. })));
    }

    #[test]
    fn test_duplicate_symbols_case_insensitive() {
        let mut config = valid_config();
        config.account.tokens.push(TokenConfig {
            symbol: "eth".to_string(),
            address: None,
            decimals: 18,
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateSymbol("eth".to_string())]);
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = valid_config();
        config.tokens.poll_interval_secs = 0;
        config.streams.interpolation_interval_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_urls_checked() {
        let mut config = valid_config();
        config.ledger.rpc_url = "localhost:8545".to_string();
        config.indexer.base_url = "ftp://indexer".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = valid_config();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidMetricsAddress("nowhere".to_string())]
        );
    }
}
