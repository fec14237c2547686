//! Core domain types and logic.

pub mod trade;
pub mod valuation;
pub mod chain;
pub mod ledger;
pub mod summary;
pub mod backup;
pub mod config_validation;
pub mod error;
