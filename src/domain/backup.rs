//! Portable backup document.
//!
//! A backup holds every trade row and registered item name. Importing never
//! trusts the ids in the document: trades receive fresh ids from the store and
//! parent links are re-mapped through the old to new id table.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::trade::{Trade, TradeId, TradeInput};
use super::valuation;

pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

impl Backup {
    pub fn new(items: Vec<String>, trades: Vec<Trade>, exported_at: DateTime<Utc>) -> Self {
        Backup {
            version: BACKUP_VERSION,
            exported_at,
            items,
            trades,
        }
    }

    /// Rejects documents this version cannot import safely.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.version == 0 || self.version > BACKUP_VERSION {
            return Err(LedgerError::Backup {
                reason: format!("unsupported backup version {}", self.version),
            });
        }
        let mut seen = HashSet::with_capacity(self.trades.len());
        for trade in &self.trades {
            if !seen.insert(trade.id) {
                return Err(LedgerError::Backup {
                    reason: format!("trade id {} appears more than once", trade.id),
                });
            }
            valuation::validate(&TradeInput::from_trade(trade), trade.fee_schedule()).map_err(
                |e| LedgerError::Backup {
                    reason: format!("trade {}: {e}", trade.id),
                },
            )?;
        }
        Ok(())
    }

    /// Trades in the order they should be inserted: ascending original id.
    pub fn trades_in_import_order(&self) -> Vec<&Trade> {
        let mut trades: Vec<&Trade> = self.trades.iter().collect();
        trades.sort_by_key(|t| t.id);
        trades
    }
}

/// Outcome of importing a backup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportReport {
    /// Original id to newly assigned id.
    pub id_map: BTreeMap<TradeId, TradeId>,
    /// New ids of trades whose parent was not part of the document.
    pub cleared_references: Vec<TradeId>,
    pub items_registered: usize,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.id_map.len()
    }

    /// Translates an original parent id. `None` when the parent was not imported.
    pub fn remap(&self, original: TradeId) -> Option<TradeId> {
        self.id_map.get(&original).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(id: TradeId, parent: Option<TradeId>) -> Trade {
        Trade {
            id,
            item: "ruby".into(),
            bid: 1.0,
            ask: 2.0,
            spread: 1.0,
            buy_fee: 2.0,
            sell_fee: 2.0,
            buy_units: 1,
            sell_units: 1,
            buy_trade_value: 1.0,
            trade_value: 2.0,
            total_fees: 0.06,
            profit: 1.0,
            inherited_fees: 0.0,
            cumulative_fees: 0.06,
            real_profit: 0.94,
            parent_trade_id: parent,
            note: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn exported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn new_backup_uses_current_version() {
        let backup = Backup::new(vec![], vec![], exported_at());
        assert_eq!(backup.version, BACKUP_VERSION);
        assert!(backup.validate().is_ok());
    }

    #[test]
    fn rejects_future_version() {
        let mut backup = Backup::new(vec![], vec![], exported_at());
        backup.version = BACKUP_VERSION + 1;
        assert!(matches!(backup.validate(), Err(LedgerError::Backup { .. })));
    }

    #[test]
    fn rejects_repeated_ids() {
        let backup = Backup::new(vec![], vec![trade(1, None), trade(1, None)], exported_at());
        assert!(matches!(backup.validate(), Err(LedgerError::Backup { .. })));
    }

    #[test]
    fn rejects_zero_units() {
        let mut bad = trade(1, None);
        bad.sell_units = 0;
        let backup = Backup::new(vec![], vec![bad], exported_at());
        assert!(matches!(backup.validate(), Err(LedgerError::Backup { .. })));
    }

    #[test]
    fn rejects_empty_item_name() {
        let mut bad = trade(1, None);
        bad.item = "  ".into();
        let backup = Backup::new(vec![], vec![bad], exported_at());
        assert!(matches!(backup.validate(), Err(LedgerError::Backup { .. })));
    }

    #[test]
    fn rejects_negative_price() {
        let mut bad = trade(1, None);
        bad.ask = -0.5;
        let backup = Backup::new(vec![], vec![trade(2, None), bad], exported_at());
        match backup.validate() {
            Err(LedgerError::Backup { reason }) => assert!(reason.contains("ask"), "{reason}"),
            other => panic!("expected Backup error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_fee_above_hundred() {
        let mut bad = trade(1, None);
        bad.buy_fee = 250.0;
        let backup = Backup::new(vec![], vec![bad], exported_at());
        assert!(matches!(backup.validate(), Err(LedgerError::Backup { .. })));
    }

    #[test]
    fn import_order_is_by_original_id() {
        let backup = Backup::new(
            vec![],
            vec![trade(9, Some(3)), trade(3, None), trade(5, None)],
            exported_at(),
        );
        let ids: Vec<TradeId> = backup.trades_in_import_order().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }

    #[test]
    fn document_without_items_parses() {
        let json = r#"{"version":1,"exported_at":"2024-06-01T00:00:00Z","trades":[]}"#;
        let backup: Backup = serde_json::from_str(json).unwrap();
        assert!(backup.items.is_empty());
        assert!(backup.validate().is_ok());
    }

    #[test]
    fn report_remaps_known_ids_only() {
        let mut report = ImportReport::default();
        report.id_map.insert(3, 40);
        assert_eq!(report.remap(3), Some(40));
        assert_eq!(report.remap(4), None);
        assert_eq!(report.imported(), 1);
    }
}
