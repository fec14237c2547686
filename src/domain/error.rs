//! Domain error types.

use super::trade::TradeId;

/// Top-level error type for tradeledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("duplicate count {requested} exceeds the maximum of {max}")]
    DuplicateCountExceeded { requested: u32, max: u32 },

    #[error("trade #{trade_id} cannot be an undercut of #{parent_id}: the chain would loop")]
    ChainCycle { trade_id: TradeId, parent_id: TradeId },

    #[error("trade #{id} not found")]
    TradeNotFound { id: TradeId },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("backup error: {reason}")]
    Backup { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the environment.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidInput { .. }
                | LedgerError::DuplicateCountExceeded { .. }
                | LedgerError::ChainCycle { .. }
        )
    }
}

impl LedgerError {
    /// Process exit status reported by the CLI for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            LedgerError::Io(_) | LedgerError::Backup { .. } => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Database { .. } | LedgerError::DatabaseQuery { .. } => 3,
            LedgerError::InvalidInput { .. }
            | LedgerError::DuplicateCountExceeded { .. }
            | LedgerError::ChainCycle { .. } => 4,
            LedgerError::TradeNotFound { .. } => 5,
        }
    }
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
