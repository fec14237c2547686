//! Listing records and their raw inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::valuation::Valuation;

/// Store-assigned trade identity. Monotonic, never reused.
pub type TradeId = i64;

/// Buy and sell market fee percentages, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub buy_pct: f64,
    pub sell_pct: f64,
}

impl FeeSchedule {
    pub const fn new(buy_pct: f64, sell_pct: f64) -> Self {
        FeeSchedule { buy_pct, sell_pct }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule::new(2.0, 2.0)
    }
}

/// Raw user-supplied fields of a listing, before validation.
///
/// Units are signed so that zero and negative quantities can be reported as
/// invalid input rather than failing to parse. `fees` overrides the fee
/// schedule that would otherwise apply (configured defaults on create, the
/// trade's own snapshot on edit).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeInput {
    pub item: String,
    pub bid: f64,
    pub ask: f64,
    pub buy_units: i64,
    pub sell_units: i64,
    pub parent_trade_id: Option<TradeId>,
    pub note: Option<String>,
    pub fees: Option<FeeSchedule>,
}

impl TradeInput {
    /// Rebuilds the raw input of an existing trade, carrying its fee snapshot.
    pub fn from_trade(trade: &Trade) -> Self {
        TradeInput {
            item: trade.item.clone(),
            bid: trade.bid,
            ask: trade.ask,
            buy_units: i64::from(trade.buy_units),
            sell_units: i64::from(trade.sell_units),
            parent_trade_id: trade.parent_trade_id,
            note: trade.note.clone(),
            fees: Some(trade.fee_schedule()),
        }
    }

    /// Note with surrounding whitespace removed; blank notes become `None`.
    pub fn normalized_note(&self) -> Option<String> {
        self.note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

/// A validated, valued listing that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub item: String,
    pub bid: f64,
    pub ask: f64,
    pub fees: FeeSchedule,
    pub buy_units: u32,
    pub sell_units: u32,
    pub valuation: Valuation,
    pub parent_trade_id: Option<TradeId>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewTrade {
    pub fn into_trade(self, id: TradeId) -> Trade {
        let v = self.valuation;
        Trade {
            id,
            item: self.item,
            bid: self.bid,
            ask: self.ask,
            spread: v.spread,
            buy_fee: self.fees.buy_pct,
            sell_fee: self.fees.sell_pct,
            buy_units: self.buy_units,
            sell_units: self.sell_units,
            buy_trade_value: v.buy_trade_value,
            trade_value: v.trade_value,
            total_fees: v.total_fees,
            profit: v.profit,
            inherited_fees: v.inherited_fees,
            cumulative_fees: v.cumulative_fees,
            real_profit: v.real_profit,
            parent_trade_id: self.parent_trade_id,
            note: self.note,
            created_at: self.created_at,
        }
    }
}

/// One persisted listing, in the row shape shared by every store and the backup document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub item: String,
    pub bid: f64,
    pub ask: f64,
    pub spread: f64,
    pub buy_fee: f64,
    pub sell_fee: f64,
    pub buy_units: u32,
    pub sell_units: u32,
    pub buy_trade_value: f64,
    pub trade_value: f64,
    pub total_fees: f64,
    pub profit: f64,
    #[serde(default)]
    pub inherited_fees: f64,
    pub cumulative_fees: f64,
    pub real_profit: f64,
    pub parent_trade_id: Option<TradeId>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::new(self.buy_fee, self.sell_fee)
    }

    pub fn is_undercut(&self) -> bool {
        self.parent_trade_id.is_some()
    }

    /// Overwrites every derived field with a fresh valuation.
    pub fn apply_valuation(&mut self, v: &Valuation) {
        self.spread = v.spread;
        self.buy_trade_value = v.buy_trade_value;
        self.trade_value = v.trade_value;
        self.total_fees = v.total_fees;
        self.profit = v.profit;
        self.inherited_fees = v.inherited_fees;
        self.cumulative_fees = v.cumulative_fees;
        self.real_profit = v.real_profit;
    }

    /// Derived fields as recorded, without recomputing anything.
    pub fn recorded_valuation(&self) -> Valuation {
        Valuation {
            spread: self.spread,
            buy_trade_value: self.buy_trade_value,
            trade_value: self.trade_value,
            buy_fee_amount: self.buy_trade_value * (self.buy_fee / 100.0),
            sell_fee_amount: self.trade_value * (self.sell_fee / 100.0),
            total_fees: self.total_fees,
            profit: self.profit,
            inherited_fees: self.inherited_fees,
            cumulative_fees: self.cumulative_fees,
            real_profit: self.real_profit,
        }
    }

    /// Copy of this trade's fields, ready to be stored under a new id.
    pub fn to_new_trade(&self) -> NewTrade {
        NewTrade {
            item: self.item.clone(),
            bid: self.bid,
            ask: self.ask,
            fees: self.fee_schedule(),
            buy_units: self.buy_units,
            sell_units: self.sell_units,
            valuation: self.recorded_valuation(),
            parent_trade_id: self.parent_trade_id,
            note: self.note.clone(),
            created_at: self.created_at,
        }
    }

    /// Per-unit gap between ask and bid.
    pub fn unit_spread(&self) -> f64 {
        self.ask - self.bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_new_trade() -> NewTrade {
        NewTrade {
            item: "magic sulphur".into(),
            bid: 100.0,
            ask: 120.0,
            fees: FeeSchedule::new(2.0, 3.0),
            buy_units: 10,
            sell_units: 8,
            valuation: Valuation {
                spread: -40.0,
                buy_trade_value: 1000.0,
                trade_value: 960.0,
                buy_fee_amount: 20.0,
                sell_fee_amount: 28.8,
                total_fees: 48.8,
                profit: -40.0,
                inherited_fees: 5.0,
                cumulative_fees: 53.8,
                real_profit: -93.8,
            },
            parent_trade_id: Some(3),
            note: Some("relist".into()),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn into_trade_copies_raw_and_derived_fields() {
        let trade = sample_new_trade().into_trade(7);
        assert_eq!(trade.id, 7);
        assert_eq!(trade.item, "magic sulphur");
        assert_eq!(trade.buy_fee, 2.0);
        assert_eq!(trade.sell_fee, 3.0);
        assert_eq!(trade.buy_units, 10);
        assert_eq!(trade.sell_units, 8);
        assert_eq!(trade.trade_value, 960.0);
        assert_eq!(trade.inherited_fees, 5.0);
        assert_eq!(trade.cumulative_fees, 53.8);
        assert_eq!(trade.parent_trade_id, Some(3));
        assert!(trade.is_undercut());
    }

    #[test]
    fn input_round_trips_fee_snapshot() {
        let trade = sample_new_trade().into_trade(1);
        let input = TradeInput::from_trade(&trade);
        assert_eq!(input.fees, Some(FeeSchedule::new(2.0, 3.0)));
        assert_eq!(input.buy_units, 10);
        assert_eq!(input.parent_trade_id, Some(3));
    }

    #[test]
    fn to_new_trade_preserves_recorded_values() {
        let original = sample_new_trade();
        let trade = original.clone().into_trade(12);
        let copy = trade.to_new_trade();
        assert_eq!(copy.item, original.item);
        assert_eq!(copy.fees, original.fees);
        assert_eq!(copy.parent_trade_id, Some(3));
        assert_eq!(copy.created_at, original.created_at);
        assert_eq!(copy.valuation.total_fees, 48.8);
        assert_eq!(copy.valuation.real_profit, -93.8);
        assert!((copy.valuation.buy_fee_amount - 20.0).abs() < 1e-9);
        assert!((copy.valuation.sell_fee_amount - 28.8).abs() < 1e-9);
    }

    #[test]
    fn blank_note_normalizes_to_none() {
        let input = TradeInput {
            note: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(input.normalized_note(), None);

        let input = TradeInput {
            note: Some("  server Antica ".into()),
            ..Default::default()
        };
        assert_eq!(input.normalized_note().as_deref(), Some("server Antica"));
    }

    #[test]
    fn trade_serializes_with_row_column_names() {
        let trade = sample_new_trade().into_trade(4);
        let json = serde_json::to_value(&trade).unwrap();
        for key in [
            "id",
            "buy_trade_value",
            "inherited_fees",
            "cumulative_fees",
            "real_profit",
            "parent_trade_id",
            "created_at",
        ] {
            assert!(json.get(key).is_some(), "missing column {key}");
        }
    }

    #[test]
    fn missing_inherited_fees_defaults_to_zero() {
        let trade = sample_new_trade().into_trade(4);
        let mut json = serde_json::to_value(&trade).unwrap();
        json.as_object_mut().unwrap().remove("inherited_fees");
        let back: Trade = serde_json::from_value(json).unwrap();
        assert_eq!(back.inherited_fees, 0.0);
    }
}
