//! Configuration validation.
//!
//! Validates the fee schedule and ledger limits before any command runs.

use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_BUY_FEE_PCT: f64 = 2.0;
pub const DEFAULT_SELL_FEE_PCT: f64 = 2.0;
pub const DEFAULT_MAX_DUPLICATES: i64 = 20;
/// Largest accepted `max_duplicates`.
pub const MAX_DUPLICATES_LIMIT: i64 = 1000;

pub fn validate_ledger_config(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    validate_fee_pct(config, "buy_pct", DEFAULT_BUY_FEE_PCT)?;
    validate_fee_pct(config, "sell_pct", DEFAULT_SELL_FEE_PCT)?;
    validate_max_duplicates(config)?;
    validate_pool_size(config)?;
    Ok(())
}

fn validate_fee_pct(config: &dyn ConfigPort, key: &str, default: f64) -> Result<(), LedgerError> {
    let value = config.get_double("fees", key, default);
    if !(0.0..=100.0).contains(&value) {
        return Err(LedgerError::ConfigInvalid {
            section: "fees".to_string(),
            key: key.to_string(),
            reason: format!("{key} must be between 0 and 100"),
        });
    }
    if let Some(raw) = config.get_string("fees", key) {
        if raw.trim().parse::<f64>().is_err() {
            return Err(LedgerError::ConfigInvalid {
                section: "fees".to_string(),
                key: key.to_string(),
                reason: format!("{key} must be a number"),
            });
        }
    }
    Ok(())
}

fn validate_max_duplicates(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    require_integer(config, "ledger", "max_duplicates")?;
    let value = config.get_int("ledger", "max_duplicates", DEFAULT_MAX_DUPLICATES);
    if !(1..=MAX_DUPLICATES_LIMIT).contains(&value) {
        return Err(LedgerError::ConfigInvalid {
            section: "ledger".to_string(),
            key: "max_duplicates".to_string(),
            reason: format!("max_duplicates must be between 1 and {MAX_DUPLICATES_LIMIT}"),
        });
    }
    Ok(())
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), LedgerError> {
    require_integer(config, "sqlite", "pool_size")?;
    let value = config.get_int("sqlite", "pool_size", 4);
    if !(1..=64).contains(&value) {
        return Err(LedgerError::ConfigInvalid {
            section: "sqlite".to_string(),
            key: "pool_size".to_string(),
            reason: "pool_size must be between 1 and 64".to_string(),
        });
    }
    Ok(())
}

/// A present key must parse; `get_int` would otherwise fall back silently.
fn require_integer(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), LedgerError> {
    match config.get_string(section, key) {
        Some(raw) if raw.trim().parse::<i64>().is_err() => Err(LedgerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be a whole number"),
        }),
        _ => Ok(()),
    }
}
