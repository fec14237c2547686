//! Ledger totals and simple aggregations for display.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::trade::Trade;

/// Restricts listings to a single item. The default matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemFilter {
    pub item: Option<String>,
}

impl ItemFilter {
    pub fn all() -> Self {
        ItemFilter::default()
    }

    pub fn item(name: impl Into<String>) -> Self {
        ItemFilter {
            item: Some(name.into()),
        }
    }

    pub fn matches(&self, trade: &Trade) -> bool {
        self.item.as_deref().is_none_or(|item| trade.item == item)
    }

    pub fn apply<'a>(&self, trades: &'a [Trade]) -> Vec<&'a Trade> {
        trades.iter().filter(|t| self.matches(t)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Totals {
    pub trades: usize,
    /// Listings linked to a parent listing.
    pub undercuts: usize,
    pub sales_value: f64,
    pub buy_value: f64,
    /// Direct and inherited fees.
    pub fees: f64,
    pub real_profit: f64,
    pub spread: f64,
    pub units: u64,
}

impl Totals {
    pub fn add(&mut self, trade: &Trade) {
        self.trades += 1;
        if trade.is_undercut() {
            self.undercuts += 1;
        }
        self.sales_value += trade.trade_value;
        self.buy_value += trade.buy_trade_value;
        self.fees += trade.cumulative_fees;
        self.real_profit += trade.real_profit;
        self.spread += trade.spread;
        self.units += u64::from(trade.sell_units);
    }

    pub fn compute<'a>(trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        let mut totals = Totals::default();
        for trade in trades {
            totals.add(trade);
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemTotals {
    pub item: String,
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LedgerSummary {
    pub totals: Totals,
    pub by_item: Vec<ItemTotals>,
    pub daily: Vec<DailyTotals>,
}

impl LedgerSummary {
    pub fn compute(trades: &[Trade], filter: &ItemFilter) -> Self {
        let selected = filter.apply(trades);
        LedgerSummary {
            totals: Totals::compute(selected.iter().copied()),
            by_item: by_item(&selected),
            daily: daily(&selected),
        }
    }
}

/// Totals grouped by item name, sorted by name.
pub fn by_item(trades: &[&Trade]) -> Vec<ItemTotals> {
    let mut groups: BTreeMap<&str, Totals> = BTreeMap::new();
    for trade in trades {
        groups.entry(trade.item.as_str()).or_default().add(trade);
    }
    groups
        .into_iter()
        .map(|(item, totals)| ItemTotals {
            item: item.to_string(),
            totals,
        })
        .collect()
}

/// Totals grouped by the UTC calendar day a listing was recorded.
pub fn daily(trades: &[&Trade]) -> Vec<DailyTotals> {
    let mut days: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for trade in trades {
        days.entry(trade.created_at.date_naive())
            .or_default()
            .add(trade);
    }
    days.into_iter()
        .map(|(date, totals)| DailyTotals { date, totals })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn trade(id: i64, item: &str, day: u32, parent: Option<i64>) -> Trade {
        Trade {
            id,
            item: item.to_string(),
            bid: 100.0,
            ask: 120.0,
            spread: 200.0,
            buy_fee: 2.0,
            sell_fee: 2.0,
            buy_units: 10,
            sell_units: 10,
            buy_trade_value: 1000.0,
            trade_value: 1200.0,
            total_fees: 44.0,
            profit: 200.0,
            inherited_fees: if parent.is_some() { 44.0 } else { 0.0 },
            cumulative_fees: if parent.is_some() { 88.0 } else { 44.0 },
            real_profit: if parent.is_some() { 112.0 } else { 156.0 },
            parent_trade_id: parent,
            note: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, day, 18, 30, 0).unwrap(),
        }
    }

    fn sample() -> Vec<Trade> {
        vec![
            trade(1, "dragon ham", 1, None),
            trade(2, "dragon ham", 1, Some(1)),
            trade(3, "gold token", 2, None),
        ]
    }

    #[test]
    fn totals_cover_all_trades() {
        let trades = sample();
        let totals = Totals::compute(&trades);
        assert_eq!(totals.trades, 3);
        assert_eq!(totals.undercuts, 1);
        assert_eq!(totals.sales_value, 3600.0);
        assert_eq!(totals.buy_value, 3000.0);
        assert_eq!(totals.fees, 44.0 + 88.0 + 44.0);
        assert_eq!(totals.real_profit, 156.0 + 112.0 + 156.0);
        assert_eq!(totals.spread, 600.0);
        assert_eq!(totals.units, 30);
    }

    #[test]
    fn empty_totals_are_zero() {
        assert_eq!(Totals::compute(&[]), Totals::default());
    }

    #[test]
    fn filter_restricts_to_item() {
        let trades = sample();
        let filter = ItemFilter::item("gold token");
        let summary = LedgerSummary::compute(&trades, &filter);
        assert_eq!(summary.totals.trades, 1);
        assert_eq!(summary.totals.undercuts, 0);
        assert_eq!(summary.by_item.len(), 1);
        assert_eq!(summary.by_item[0].item, "gold token");
    }

    #[test]
    fn unknown_item_filter_yields_empty_summary() {
        let trades = sample();
        let summary = LedgerSummary::compute(&trades, &ItemFilter::item("nothing"));
        assert_eq!(summary, LedgerSummary::default());
    }

    #[test]
    fn by_item_sorted_by_name() {
        let trades = sample();
        let summary = LedgerSummary::compute(&trades, &ItemFilter::all());
        let items: Vec<&str> = summary.by_item.iter().map(|g| g.item.as_str()).collect();
        assert_eq!(items, vec!["dragon ham", "gold token"]);
        assert_eq!(summary.by_item[0].totals.trades, 2);
    }

    #[test]
    fn daily_groups_by_calendar_day() {
        let trades = sample();
        let summary = LedgerSummary::compute(&trades, &ItemFilter::all());
        assert_eq!(summary.daily.len(), 2);
        assert_eq!(
            summary.daily[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(summary.daily[0].totals.trades, 2);
        assert_eq!(summary.daily[1].totals.real_profit, 156.0);
    }
}
