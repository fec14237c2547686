//! In-process trade store.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::error::LedgerError;
use crate::domain::trade::{NewTrade, Trade, TradeId};
use crate::ports::trade_store::TradeStore;

#[derive(Debug, Default)]
struct State {
    trades: BTreeMap<TradeId, Trade>,
    items: BTreeSet<String>,
    last_id: TradeId,
}

/// Keeps everything in memory. Ids keep counting up across `reset`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with trades under their existing ids.
    pub fn with_trades(trades: Vec<Trade>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.borrow_mut();
            for trade in trades {
                state.last_id = state.last_id.max(trade.id);
                state.trades.insert(trade.id, trade);
            }
        }
        store
    }
}

impl TradeStore for MemoryStore {
    fn insert_trade(&self, trade: &NewTrade) -> Result<Trade, LedgerError> {
        let mut state = self.state.borrow_mut();
        state.last_id += 1;
        let stored = trade.clone().into_trade(state.last_id);
        state.trades.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn update_trade(&self, trade: &Trade) -> Result<(), LedgerError> {
        let mut state = self.state.borrow_mut();
        match state.trades.get_mut(&trade.id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = trade.clone();
                existing.created_at = created_at;
                Ok(())
            }
            None => Err(LedgerError::TradeNotFound { id: trade.id }),
        }
    }

    fn delete_trade(&self, id: TradeId) -> Result<bool, LedgerError> {
        Ok(self.state.borrow_mut().trades.remove(&id).is_some())
    }

    fn get_trade(&self, id: TradeId) -> Result<Option<Trade>, LedgerError> {
        Ok(self.state.borrow().trades.get(&id).cloned())
    }

    fn list_trades(&self) -> Result<Vec<Trade>, LedgerError> {
        Ok(self.state.borrow().trades.values().cloned().collect())
    }

    fn clear_parent_references(&self, parent_id: TradeId) -> Result<Vec<TradeId>, LedgerError> {
        let mut state = self.state.borrow_mut();
        let mut cleared = Vec::new();
        for trade in state.trades.values_mut() {
            if trade.parent_trade_id == Some(parent_id) {
                trade.parent_trade_id = None;
                cleared.push(trade.id);
            }
        }
        Ok(cleared)
    }

    fn list_registered_items(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.state.borrow().items.iter().cloned().collect())
    }

    fn register_item(&self, name: &str) -> Result<bool, LedgerError> {
        Ok(self.state.borrow_mut().items.insert(name.to_string()))
    }

    fn reset(&self) -> Result<(), LedgerError> {
        let mut state = self.state.borrow_mut();
        state.trades.clear();
        state.items.clear();
        Ok(())
    }
}
