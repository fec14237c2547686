//! Valuation engine: derives every monetary field of a listing from its raw inputs.
//!
//! buy_trade_value = bid * buy_units, trade_value = ask * sell_units,
//! total_fees = buy_trade_value * buy% + trade_value * sell%,
//! profit = spread = trade_value - buy_trade_value,
//! cumulative_fees = total_fees + inherited_fees, real_profit = profit - cumulative_fees.
//!
//! Nothing here is rounded; rounding is a display concern.

use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::trade::{FeeSchedule, TradeInput};

/// Every derived field of one listing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Valuation {
    pub spread: f64,
    pub buy_trade_value: f64,
    pub trade_value: f64,
    pub buy_fee_amount: f64,
    pub sell_fee_amount: f64,
    pub total_fees: f64,
    pub profit: f64,
    pub inherited_fees: f64,
    pub cumulative_fees: f64,
    pub real_profit: f64,
}

/// Raw inputs after validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationInput {
    pub bid: f64,
    pub ask: f64,
    pub buy_units: u32,
    pub sell_units: u32,
    pub fees: FeeSchedule,
}

/// Computes the derived fields. Total over validated inputs.
pub fn value(input: &ValuationInput, inherited_fees: f64) -> Valuation {
    let buy_trade_value = input.bid * f64::from(input.buy_units);
    let trade_value = input.ask * f64::from(input.sell_units);
    let buy_fee_amount = buy_trade_value * (input.fees.buy_pct / 100.0);
    let sell_fee_amount = trade_value * (input.fees.sell_pct / 100.0);
    let total_fees = buy_fee_amount + sell_fee_amount;
    let profit = trade_value - buy_trade_value;
    let cumulative_fees = total_fees + inherited_fees;

    Valuation {
        spread: trade_value - buy_trade_value,
        buy_trade_value,
        trade_value,
        buy_fee_amount,
        sell_fee_amount,
        total_fees,
        profit,
        inherited_fees,
        cumulative_fees,
        real_profit: profit - cumulative_fees,
    }
}

/// Validates a raw input and values it in one step.
///
/// `fees` is the schedule to apply when the input carries no override.
pub fn value_input(
    input: &TradeInput,
    fees: FeeSchedule,
    inherited_fees: f64,
) -> Result<Valuation, LedgerError> {
    let checked = validate(input, fees)?;
    check_inherited(inherited_fees)?;
    Ok(value(&checked, inherited_fees))
}

/// Checks every raw field, reporting the first offending one.
pub fn validate(input: &TradeInput, fees: FeeSchedule) -> Result<ValuationInput, LedgerError> {
    if input.item.trim().is_empty() {
        return Err(LedgerError::invalid("item", "item name must not be empty"));
    }
    let bid = non_negative("bid", input.bid)?;
    let ask = non_negative("ask", input.ask)?;
    let buy_units = positive_units("buy_units", input.buy_units)?;
    let sell_units = positive_units("sell_units", input.sell_units)?;

    let fees = input.fees.unwrap_or(fees);
    validate_fees(&fees)?;

    Ok(ValuationInput {
        bid,
        ask,
        buy_units,
        sell_units,
        fees,
    })
}

pub fn validate_fees(fees: &FeeSchedule) -> Result<(), LedgerError> {
    percentage("buy_fee", fees.buy_pct)?;
    percentage("sell_fee", fees.sell_pct)?;
    Ok(())
}

fn non_negative(field: &str, value: f64) -> Result<f64, LedgerError> {
    if !value.is_finite() {
        return Err(LedgerError::invalid(field, "must be a number"));
    }
    if value < 0.0 {
        return Err(LedgerError::invalid(field, "must be non-negative"));
    }
    Ok(value)
}

fn positive_units(field: &str, units: i64) -> Result<u32, LedgerError> {
    if units <= 0 {
        return Err(LedgerError::invalid(field, "must be a positive whole number"));
    }
    u32::try_from(units).map_err(|_| LedgerError::invalid(field, "is too large"))
}

fn percentage(field: &str, pct: f64) -> Result<(), LedgerError> {
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(LedgerError::invalid(field, "must be a percentage between 0 and 100"));
    }
    Ok(())
}

fn check_inherited(inherited_fees: f64) -> Result<(), LedgerError> {
    if !inherited_fees.is_finite() || inherited_fees < 0.0 {
        return Err(LedgerError::invalid(
            "inherited_fees",
            "must be a non-negative number",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn input(bid: f64, ask: f64, buy_units: i64, sell_units: i64) -> TradeInput {
        TradeInput {
            item: "dragon ham".into(),
            bid,
            ask,
            buy_units,
            sell_units,
            ..Default::default()
        }
    }

    const TWO_PCT: FeeSchedule = FeeSchedule::new(2.0, 2.0);

    #[test]
    fn root_listing_example() {
        let v = value_input(&input(100.0, 120.0, 10, 10), TWO_PCT, 0.0).unwrap();
        assert_relative_eq!(v.buy_trade_value, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(v.trade_value, 1200.0, epsilon = 1e-9);
        assert_relative_eq!(v.buy_fee_amount, 20.0, epsilon = 1e-9);
        assert_relative_eq!(v.sell_fee_amount, 24.0, epsilon = 1e-9);
        assert_relative_eq!(v.total_fees, 44.0, epsilon = 1e-9);
        assert_relative_eq!(v.profit, 200.0, epsilon = 1e-9);
        assert_relative_eq!(v.spread, 200.0, epsilon = 1e-9);
        assert_eq!(v.inherited_fees, 0.0);
        assert_relative_eq!(v.cumulative_fees, 44.0, epsilon = 1e-9);
        assert_relative_eq!(v.real_profit, 156.0, epsilon = 1e-9);
    }

    #[test]
    fn undercut_listing_example() {
        let v = value_input(&input(110.0, 130.0, 5, 5), TWO_PCT, 44.0).unwrap();
        assert_relative_eq!(v.buy_fee_amount, 11.0, epsilon = 1e-9);
        assert_relative_eq!(v.sell_fee_amount, 13.0, epsilon = 1e-9);
        assert_relative_eq!(v.total_fees, 24.0, epsilon = 1e-9);
        assert_relative_eq!(v.inherited_fees, 44.0, epsilon = 1e-9);
        assert_relative_eq!(v.cumulative_fees, 68.0, epsilon = 1e-9);
        assert_relative_eq!(v.profit, 100.0, epsilon = 1e-9);
        assert_relative_eq!(v.real_profit, 32.0, epsilon = 1e-9);
    }

    #[test]
    fn spread_uses_traded_units_on_each_side() {
        let v = value_input(&input(10.0, 15.0, 4, 2), TWO_PCT, 0.0).unwrap();
        assert_relative_eq!(v.spread, 30.0 - 40.0, epsilon = 1e-9);
    }

    #[test]
    fn input_fee_override_wins_over_schedule() {
        let mut raw = input(100.0, 100.0, 1, 1);
        raw.fees = Some(FeeSchedule::new(0.0, 10.0));
        let v = value_input(&raw, TWO_PCT, 0.0).unwrap();
        assert_relative_eq!(v.buy_fee_amount, 0.0, epsilon = 1e-9);
        assert_relative_eq!(v.sell_fee_amount, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_prices_are_allowed() {
        let v = value_input(&input(0.0, 0.0, 1, 1), TWO_PCT, 3.0).unwrap();
        assert_eq!(v.total_fees, 0.0);
        assert_eq!(v.real_profit, -3.0);
    }

    #[test]
    fn rejects_empty_item() {
        let mut raw = input(1.0, 1.0, 1, 1);
        raw.item = "   ".into();
        let err = value_input(&raw, TWO_PCT, 0.0).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "item"));
    }

    #[test]
    fn rejects_negative_prices() {
        let err = value_input(&input(-1.0, 1.0, 1, 1), TWO_PCT, 0.0).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "bid"));
        let err = value_input(&input(1.0, -0.5, 1, 1), TWO_PCT, 0.0).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "ask"));
    }

    #[test]
    fn rejects_missing_prices() {
        let err = value_input(&input(f64::NAN, 1.0, 1, 1), TWO_PCT, 0.0).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "bid"));
    }

    #[test]
    fn rejects_non_positive_units() {
        let err = value_input(&input(1.0, 1.0, 0, 1), TWO_PCT, 0.0).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "buy_units"));
        let err = value_input(&input(1.0, 1.0, 1, -3), TWO_PCT, 0.0).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "sell_units"));
    }

    #[test]
    fn rejects_fee_outside_percentage_range() {
        let err = value_input(&input(1.0, 1.0, 1, 1), FeeSchedule::new(101.0, 2.0), 0.0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "buy_fee"));
        let err = value_input(&input(1.0, 1.0, 1, 1), FeeSchedule::new(2.0, -1.0), 0.0)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "sell_fee"));
    }

    #[test]
    fn rejects_negative_inherited_fees() {
        let err = value_input(&input(1.0, 1.0, 1, 1), TWO_PCT, -1.0).unwrap_err();
        assert!(
            matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "inherited_fees")
        );
    }

    proptest! {
        #[test]
        fn fee_identities_hold_exactly(
            bid in 0.0f64..1_000_000.0,
            ask in 0.0f64..1_000_000.0,
            buy_units in 1i64..10_000,
            sell_units in 1i64..10_000,
            buy_pct in 0.0f64..=100.0,
            sell_pct in 0.0f64..=100.0,
            inherited in 0.0f64..1_000_000.0,
        ) {
            let raw = input(bid, ask, buy_units, sell_units);
            let v = value_input(&raw, FeeSchedule::new(buy_pct, sell_pct), inherited).unwrap();
            prop_assert_eq!(v.cumulative_fees, v.total_fees + v.inherited_fees);
            prop_assert_eq!(v.real_profit, v.profit - v.cumulative_fees);
            prop_assert_eq!(v.total_fees, v.buy_fee_amount + v.sell_fee_amount);
        }

        #[test]
        fn root_valuation_inherits_nothing(
            bid in 0.0f64..10_000.0,
            ask in 0.0f64..10_000.0,
            units in 1i64..1_000,
        ) {
            let v = value_input(&input(bid, ask, units, units), TWO_PCT, 0.0).unwrap();
            prop_assert_eq!(v.inherited_fees, 0.0);
            prop_assert_eq!(v.cumulative_fees, v.total_fees);
        }
    }
}
