//! Trade persistence port trait.
//!
//! The store is plain CRUD over trade rows and item names. It does not value
//! trades or follow chains; that is the ledger's job.

use crate::domain::error::LedgerError;
use crate::domain::trade::{NewTrade, Trade, TradeId};

pub trait TradeStore {
    /// Persists a new trade under a fresh id that was never handed out before.
    fn insert_trade(&self, trade: &NewTrade) -> Result<Trade, LedgerError>;

    /// Persists several trades. Stores with transactions override this so
    /// that a failure part way through writes nothing.
    fn insert_trades(&self, trades: &[NewTrade]) -> Result<Vec<Trade>, LedgerError> {
        trades.iter().map(|t| self.insert_trade(t)).collect()
    }

    /// Replaces every field of an existing trade except `id` and `created_at`.
    fn update_trade(&self, trade: &Trade) -> Result<(), LedgerError>;

    /// Removes a trade. Returns false when no such trade existed.
    fn delete_trade(&self, id: TradeId) -> Result<bool, LedgerError>;

    fn get_trade(&self, id: TradeId) -> Result<Option<Trade>, LedgerError>;

    /// All trades in ascending id order.
    fn list_trades(&self) -> Result<Vec<Trade>, LedgerError>;

    /// Nulls `parent_trade_id` on every trade pointing at `parent_id`,
    /// returning the ids that were changed.
    fn clear_parent_references(&self, parent_id: TradeId) -> Result<Vec<TradeId>, LedgerError>;

    /// Names registered explicitly, sorted.
    fn list_registered_items(&self) -> Result<Vec<String>, LedgerError>;

    /// Registers an item name. Returns false when it was already known.
    fn register_item(&self, name: &str) -> Result<bool, LedgerError>;

    /// Deletes every trade and item. Ids are still never reused afterwards.
    fn reset(&self) -> Result<(), LedgerError>;
}
