#![allow(dead_code)]

use tradeledger::adapters::memory_store::MemoryStore;
use tradeledger::domain::error::LedgerError;
use tradeledger::domain::ledger::{Ledger, LedgerSettings};
use tradeledger::domain::trade::{NewTrade, Trade, TradeId, TradeInput};
use tradeledger::ports::trade_store::TradeStore;

pub const EPS: f64 = 1e-9;

pub fn input(item: &str, bid: f64, ask: f64, units: i64, parent: Option<TradeId>) -> TradeInput {
    TradeInput {
        item: item.to_string(),
        bid,
        ask,
        buy_units: units,
        sell_units: units,
        parent_trade_id: parent,
        ..Default::default()
    }
}

/// The root listing used throughout: 10 units bought at 100, sold at 120.
pub fn root_input() -> TradeInput {
    input("dragon ham", 100.0, 120.0, 10, None)
}

/// An undercut of `parent`: 5 units bought at 110, sold at 130.
pub fn child_input(parent: TradeId) -> TradeInput {
    input("dragon ham", 110.0, 130.0, 5, Some(parent))
}

pub fn save_one(ledger: &Ledger<'_>, input: &TradeInput) -> Trade {
    ledger.save(input, 1).unwrap().remove(0)
}

pub fn memory_ledger(store: &MemoryStore) -> Ledger<'_> {
    Ledger::new(store, LedgerSettings::default())
}

#[cfg(feature = "sqlite")]
pub fn sqlite_store() -> tradeledger::adapters::sqlite_adapter::SqliteAdapter {
    let adapter = tradeledger::adapters::sqlite_adapter::SqliteAdapter::in_memory().unwrap();
    adapter.initialize_schema().unwrap();
    adapter
}

/// Store whose every call fails, as a broken database would.
pub struct FailingStore {
    pub reason: String,
}

impl FailingStore {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }

    fn fail<T>(&self) -> Result<T, LedgerError> {
        Err(LedgerError::Database {
            reason: self.reason.clone(),
        })
    }
}

impl TradeStore for FailingStore {
    fn insert_trade(&self, _trade: &NewTrade) -> Result<Trade, LedgerError> {
        self.fail()
    }

    fn update_trade(&self, _trade: &Trade) -> Result<(), LedgerError> {
        self.fail()
    }

    fn delete_trade(&self, _id: TradeId) -> Result<bool, LedgerError> {
        self.fail()
    }

    fn get_trade(&self, _id: TradeId) -> Result<Option<Trade>, LedgerError> {
        self.fail()
    }

    fn list_trades(&self) -> Result<Vec<Trade>, LedgerError> {
        self.fail()
    }

    fn clear_parent_references(&self, _parent_id: TradeId) -> Result<Vec<TradeId>, LedgerError> {
        self.fail()
    }

    fn list_registered_items(&self) -> Result<Vec<String>, LedgerError> {
        self.fail()
    }

    fn register_item(&self, _name: &str) -> Result<bool, LedgerError> {
        self.fail()
    }

    fn reset(&self) -> Result<(), LedgerError> {
        self.fail()
    }
}
