//! Position ledger
//!
//! Applies one event at a time to a single [`Position`] using a single
//! weighted-average lot. Every mutator validates its input, updates the
//! stored figures, and finishes with [`recalculate_metrics`] so derived
//! fields never drift from quantity, price and cost.
//!
//! Policies:
//! - selling more than is held is rejected, never clamped
//! - a buy on a sold position reactivates it, keeping its realized history
//! - realized gain percentage is measured against the cost still held

pub mod checked;
pub mod events;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::db::models::{EntryKind, JournalEntry, Position, PositionStatus, RiskMetrics};
use crate::error::{LedgerError, Result};

pub use events::{OpenPosition, PositionEvent};

const DEFAULT_CURRENCY: &str = "USD";

/// Cost basis and proceeds of a single sale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaleBreakdown {
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub realized_gain_delta: Decimal,
}

fn ensure_non_negative(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "{} must not be negative (got {})",
            field, value
        )));
    }
    Ok(())
}

fn ensure_positive(field: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "{} must be greater than zero (got {})",
            field, value
        )));
    }
    Ok(())
}

/// Recompute market value and unrealized figures from quantity, price and cost.
pub fn recalculate_metrics(position: &mut Position) -> Result<()> {
    let current_value = checked::mul("current value", position.quantity, position.current_price)?;
    let unrealized_gain = checked::sub("unrealized gain", current_value, position.total_cost)?;
    let unrealized_gain_pct =
        checked::percent_of("unrealized gain percentage", unrealized_gain, position.total_cost)?
            .unwrap_or(Decimal::ZERO);

    position.current_value = current_value;
    position.unrealized_gain = unrealized_gain;
    position.unrealized_gain_pct = unrealized_gain_pct;
    Ok(())
}

/// Create a new position from its opening parameters.
///
/// Uniqueness of (user, symbol) among active positions is checked by the
/// caller against the store before this runs.
pub fn open(request: &OpenPosition, now: DateTime<Utc>) -> Result<Position> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(LedgerError::Validation("user id must not be empty".to_string()));
    }
    let symbol = request.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(LedgerError::Validation("symbol must not be empty".to_string()));
    }
    ensure_non_negative("quantity", request.quantity)?;
    ensure_non_negative("price", request.price_per_unit)?;

    let status = if request.is_watchlist && request.quantity.is_zero() {
        PositionStatus::Watchlist
    } else {
        PositionStatus::Active
    };

    let mut position = Position {
        id: None,
        user_id: user_id.to_string(),
        symbol,
        name: request.name.clone(),
        asset_type: request.asset_type,
        sector: request.sector.clone(),
        currency: request
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        status,
        quantity: request.quantity,
        average_cost_per_unit: request.price_per_unit,
        total_cost: checked::mul("total cost", request.quantity, request.price_per_unit)?,
        current_price: request.price_per_unit,
        current_value: Decimal::ZERO,
        unrealized_gain: Decimal::ZERO,
        unrealized_gain_pct: Decimal::ZERO,
        realized_gain: Decimal::ZERO,
        realized_gain_pct: Decimal::ZERO,
        total_dividends: Decimal::ZERO,
        dividend_yield: Decimal::ZERO,
        last_dividend_amount: None,
        last_dividend_date: None,
        risk: RiskMetrics::default(),
        is_watchlist: request.is_watchlist,
        notes: request.notes.clone(),
        tags: request.tags.clone(),
        version: 1,
        created_at: now,
        updated_at: now,
        price_updated_at: Some(now),
        deleted_at: None,
    };
    recalculate_metrics(&mut position)?;
    Ok(position)
}

fn ensure_tradable(position: &Position) -> Result<()> {
    if position.status == PositionStatus::Inactive {
        return Err(LedgerError::Validation(format!(
            "position {} is inactive; reactivate it before trading",
            position.symbol
        )));
    }
    Ok(())
}

/// Add units at `price_per_unit`, folding them into the average cost.
pub fn buy(
    mut position: Position,
    quantity: Decimal,
    price_per_unit: Decimal,
    now: DateTime<Utc>,
) -> Result<Position> {
    ensure_positive("quantity", quantity)?;
    ensure_non_negative("price", price_per_unit)?;
    ensure_tradable(&position)?;

    let fill_cost = checked::mul("purchase cost", quantity, price_per_unit)?;
    let new_total_cost = checked::add("total cost", position.total_cost, fill_cost)?;
    let new_quantity = checked::add("quantity", position.quantity, quantity)?;
    if !new_quantity.is_zero() {
        position.average_cost_per_unit =
            checked::div("average cost", new_total_cost, new_quantity)?;
    }
    position.total_cost = new_total_cost;
    position.quantity = new_quantity;

    // The fill price doubles as the latest quote.
    position.current_price = price_per_unit;
    position.price_updated_at = Some(now);

    if matches!(
        position.status,
        PositionStatus::Watchlist | PositionStatus::Sold
    ) {
        position.status = PositionStatus::Active;
        position.is_watchlist = false;
    }

    position.updated_at = now;
    recalculate_metrics(&mut position)?;
    Ok(position)
}

/// Cost basis, proceeds and realized gain of selling `quantity` at `price_per_unit`.
///
/// Selling the whole holding releases the entire remaining cost so no
/// rounding residue is left behind on a closed position.
pub fn sale_breakdown(
    position: &Position,
    quantity: Decimal,
    price_per_unit: Decimal,
) -> Result<SaleBreakdown> {
    ensure_positive("quantity", quantity)?;
    ensure_non_negative("price", price_per_unit)?;

    if quantity > position.quantity {
        return Err(LedgerError::InsufficientQuantity {
            symbol: position.symbol.clone(),
            requested: quantity,
            available: position.quantity,
        });
    }

    let cost_basis = if quantity == position.quantity {
        position.total_cost
    } else {
        checked::mul("cost basis", quantity, position.average_cost_per_unit)?
    };
    let proceeds = checked::mul("sale proceeds", quantity, price_per_unit)?;

    Ok(SaleBreakdown {
        cost_basis,
        proceeds,
        realized_gain_delta: checked::sub("realized gain", proceeds, cost_basis)?,
    })
}

/// Remove units at `price_per_unit`, locking in the gain against average cost.
pub fn sell(
    position: Position,
    quantity: Decimal,
    price_per_unit: Decimal,
    now: DateTime<Utc>,
) -> Result<Position> {
    sell_with_breakdown(position, quantity, price_per_unit, now).map(|(position, _)| position)
}

/// [`sell`], also returning the breakdown of the sale it applied.
pub fn sell_with_breakdown(
    mut position: Position,
    quantity: Decimal,
    price_per_unit: Decimal,
    now: DateTime<Utc>,
) -> Result<(Position, SaleBreakdown)> {
    ensure_tradable(&position)?;
    let sale = sale_breakdown(&position, quantity, price_per_unit)?;

    position.quantity = checked::sub("quantity", position.quantity, quantity)?;
    position.total_cost = checked::sub("total cost", position.total_cost, sale.cost_basis)?;
    checked::accumulate("realized gain", &mut position.realized_gain, sale.realized_gain_delta)?;
    if let Some(pct) = checked::percent_of(
        "realized gain percentage",
        position.realized_gain,
        position.total_cost,
    )? {
        position.realized_gain_pct = pct;
    }

    position.current_price = price_per_unit;
    position.price_updated_at = Some(now);

    if position.quantity.is_zero() {
        position.status = PositionStatus::Sold;
    }

    position.updated_at = now;
    recalculate_metrics(&mut position)?;
    Ok((position, sale))
}

/// Record a dividend payment. The yield reflects this single payment.
pub fn add_dividend(
    mut position: Position,
    amount: Decimal,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Position> {
    ensure_non_negative("dividend amount", amount)?;

    checked::accumulate("total dividends", &mut position.total_dividends, amount)?;
    position.last_dividend_amount = Some(amount);
    position.last_dividend_date = Some(date);
    if let Some(yield_pct) = checked::percent_of("dividend yield", amount, position.current_price)? {
        position.dividend_yield = yield_pct;
    }

    position.updated_at = now;
    recalculate_metrics(&mut position)?;
    Ok(position)
}

/// Mark the position to a new market price.
pub fn update_price(mut position: Position, price: Decimal, now: DateTime<Utc>) -> Result<Position> {
    ensure_non_negative("price", price)?;

    position.current_price = price;
    position.price_updated_at = Some(now);
    position.updated_at = now;
    recalculate_metrics(&mut position)?;
    Ok(position)
}

/// Apply one event to a position. This is the single entry point the
/// service and replays go through.
pub fn apply_event(position: Position, event: &PositionEvent, now: DateTime<Utc>) -> Result<Position> {
    match *event {
        PositionEvent::Buy {
            quantity,
            price_per_unit,
        } => buy(position, quantity, price_per_unit, now),
        PositionEvent::Sell {
            quantity,
            price_per_unit,
        } => sell(position, quantity, price_per_unit, now),
        PositionEvent::Dividend { amount, date } => add_dividend(position, amount, date, now),
        PositionEvent::PriceUpdate { price } => update_price(position, price, now),
    }
}

/// Administrative status change. Only Active <-> Inactive is allowed here;
/// every other status is driven by quantity through the events above.
pub fn change_status(
    mut position: Position,
    target: PositionStatus,
    now: DateTime<Utc>,
) -> Result<Position> {
    if position.status == target {
        return Ok(position);
    }

    match (position.status, target) {
        (PositionStatus::Active, PositionStatus::Inactive)
        | (PositionStatus::Inactive, PositionStatus::Active) => {
            position.status = target;
            position.updated_at = now;
            Ok(position)
        }
        (from, to) => Err(LedgerError::Validation(format!(
            "cannot change position {} from {} to {}",
            position.symbol, from, to
        ))),
    }
}

/// Rebuild a position from its journal.
///
/// `identity` supplies what the journal does not carry (user, symbol, asset
/// type, descriptive fields); the first entry must be the opening one.
/// Administrative status changes are not journaled and are not reproduced.
pub fn replay(identity: &Position, entries: &[JournalEntry]) -> Result<Position> {
    let (first, rest) = entries
        .split_first()
        .ok_or_else(|| LedgerError::Validation("journal is empty".to_string()))?;
    if first.kind != EntryKind::Open {
        return Err(LedgerError::Validation(format!(
            "journal must start with an opening entry, found {}",
            first.kind.as_str()
        )));
    }

    let request = OpenPosition {
        user_id: identity.user_id.clone(),
        symbol: identity.symbol.clone(),
        asset_type: identity.asset_type,
        quantity: first.quantity.unwrap_or(Decimal::ZERO),
        price_per_unit: first.price_per_unit.unwrap_or(Decimal::ZERO),
        is_watchlist: first.watchlist,
        name: identity.name.clone(),
        sector: identity.sector.clone(),
        currency: Some(identity.currency.clone()),
        notes: identity.notes.clone(),
        tags: identity.tags.clone(),
    };

    let mut position = open(&request, first.recorded_at)?;
    for entry in rest {
        let event = PositionEvent::from_journal(entry)?;
        position = apply_event(position, &event, entry.recorded_at)?;
    }
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AssetType;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 30, 0).unwrap()
    }

    fn close_to(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.01)
    }

    fn aapl(quantity: Decimal, price: Decimal) -> Position {
        open(
            &OpenPosition::new("user-1", "aapl", AssetType::Stock, quantity, price),
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_sets_cost_basis() {
        let position = aapl(dec!(10), dec!(100));
        assert_eq!(position.symbol, "AAPL");
        assert_eq!(position.status, PositionStatus::Active);
        assert_eq!(position.total_cost, dec!(1000));
        assert_eq!(position.average_cost_per_unit, dec!(100));
        assert_eq!(position.current_value, dec!(1000));
        assert_eq!(position.unrealized_gain, Decimal::ZERO);
        assert_eq!(position.version, 1);
    }

    #[test]
    fn test_open_watchlist_requires_zero_quantity() {
        let watch = open(
            &OpenPosition::watchlist("user-1", "MSFT", AssetType::Stock, dec!(410)),
            now(),
        )
        .unwrap();
        assert_eq!(watch.status, PositionStatus::Watchlist);
        assert_eq!(watch.total_cost, Decimal::ZERO);

        let mut request = OpenPosition::new("user-1", "MSFT", AssetType::Stock, dec!(1), dec!(410));
        request.is_watchlist = true;
        let held = open(&request, now()).unwrap();
        assert_eq!(held.status, PositionStatus::Active);
    }

    #[test]
    fn test_open_rejects_negative_input() {
        let err = open(
            &OpenPosition::new("user-1", "AAPL", AssetType::Stock, dec!(-1), dec!(100)),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = open(
            &OpenPosition::new("user-1", "  ", AssetType::Stock, dec!(1), dec!(100)),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_buy_averages_cost() {
        let position = buy(aapl(dec!(10), dec!(100)), dec!(5), dec!(110), now()).unwrap();
        assert_eq!(position.quantity, dec!(15));
        assert_eq!(position.total_cost, dec!(1550));
        assert!(close_to(position.average_cost_per_unit, dec!(103.33)));
        assert_eq!(position.current_price, dec!(110));
        assert_eq!(position.current_value, dec!(1650));
        assert_eq!(position.unrealized_gain, dec!(100));
    }

    #[test]
    fn test_buy_rejects_zero_quantity() {
        let err = buy(aapl(dec!(10), dec!(100)), Decimal::ZERO, dec!(110), now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_buy_promotes_watchlist() {
        let watch = open(
            &OpenPosition::watchlist("user-1", "NVDA", AssetType::Stock, dec!(90)),
            now(),
        )
        .unwrap();
        let position = buy(watch, dec!(2), dec!(95), now()).unwrap();
        assert_eq!(position.status, PositionStatus::Active);
        assert!(!position.is_watchlist);
        assert_eq!(position.average_cost_per_unit, dec!(95));
        assert_eq!(position.total_cost, dec!(190));
    }

    #[test]
    fn test_sell_realizes_gain_against_average_cost() {
        let position = buy(aapl(dec!(10), dec!(100)), dec!(5), dec!(110), now()).unwrap();
        let avg_before = position.average_cost_per_unit;

        let sale = sale_breakdown(&position, dec!(10), dec!(120)).unwrap();
        assert!(close_to(sale.cost_basis, dec!(1033.33)));
        assert_eq!(sale.proceeds, dec!(1200));
        assert!(close_to(sale.realized_gain_delta, dec!(166.67)));

        let position = sell(position, dec!(10), dec!(120), now()).unwrap();
        assert_eq!(position.quantity, dec!(5));
        assert!(close_to(position.total_cost, dec!(516.67)));
        assert!(close_to(position.realized_gain, dec!(166.67)));
        assert_eq!(position.average_cost_per_unit, avg_before);
        assert_eq!(position.status, PositionStatus::Active);
        // measured against the cost still held: 166.67 / 516.67
        assert!(close_to(position.realized_gain_pct, dec!(32.26)));
    }

    #[test]
    fn test_sell_everything_closes_position() {
        let position = buy(aapl(dec!(10), dec!(100)), dec!(5), dec!(110), now()).unwrap();
        let position = sell(position, dec!(15), dec!(90), now()).unwrap();
        assert_eq!(position.status, PositionStatus::Sold);
        assert_eq!(position.quantity, Decimal::ZERO);
        assert_eq!(position.total_cost, Decimal::ZERO);
        assert_eq!(position.realized_gain, dec!(-200));
        // no cost left to measure against
        assert_eq!(position.realized_gain_pct, Decimal::ZERO);
        assert_eq!(position.unrealized_gain_pct, Decimal::ZERO);
    }

    #[test]
    fn test_oversell_is_rejected_not_clamped() {
        let position = aapl(dec!(10), dec!(100));
        let err = sell(position, dec!(11), dec!(100), now()).unwrap_err();
        match err {
            LedgerError::InsufficientQuantity {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, dec!(11));
                assert_eq!(available, dec!(10));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_buy_on_sold_position_reactivates() {
        let position = sell(aapl(dec!(10), dec!(100)), dec!(10), dec!(150), now()).unwrap();
        assert_eq!(position.status, PositionStatus::Sold);

        let position = buy(position, dec!(4), dec!(120), now()).unwrap();
        assert_eq!(position.status, PositionStatus::Active);
        assert_eq!(position.realized_gain, dec!(500));
        assert_eq!(position.average_cost_per_unit, dec!(120));
        assert_eq!(position.total_cost, dec!(480));
    }

    #[test]
    fn test_inactive_position_refuses_trades() {
        let position = change_status(aapl(dec!(10), dec!(100)), PositionStatus::Inactive, now()).unwrap();
        assert!(matches!(
            buy(position.clone(), dec!(1), dec!(100), now()),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            sell(position.clone(), dec!(1), dec!(100), now()),
            Err(LedgerError::Validation(_))
        ));
        let marked = update_price(position, dec!(101), now()).unwrap();
        assert_eq!(marked.current_value, dec!(1010));
    }

    #[test]
    fn test_dividend_yield_uses_single_payment() {
        let position = update_price(aapl(dec!(5), dec!(100)), dec!(130), now()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let position = add_dividend(position, dec!(50), date, now()).unwrap();
        assert_eq!(position.total_dividends, dec!(50));
        assert_eq!(position.last_dividend_amount, Some(dec!(50)));
        assert_eq!(position.last_dividend_date, Some(date));
        assert!(close_to(position.dividend_yield, dec!(38.46)));

        let position = add_dividend(position, dec!(13), date, now()).unwrap();
        assert_eq!(position.total_dividends, dec!(63));
        assert_eq!(position.dividend_yield, dec!(10));
    }

    #[test]
    fn test_dividend_with_zero_price_keeps_yield() {
        let position = aapl(dec!(5), Decimal::ZERO);
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let position = add_dividend(position, dec!(5), date, now()).unwrap();
        assert_eq!(position.dividend_yield, Decimal::ZERO);
        assert_eq!(position.total_dividends, dec!(5));
    }

    #[test]
    fn test_update_price_leaves_cost_basis() {
        let position = aapl(dec!(10), dec!(100));
        let updated = update_price(position.clone(), dec!(80), now()).unwrap();
        assert_eq!(updated.total_cost, position.total_cost);
        assert_eq!(updated.average_cost_per_unit, position.average_cost_per_unit);
        assert_eq!(updated.realized_gain, position.realized_gain);
        assert_eq!(updated.unrealized_gain, dec!(-200));
        assert_eq!(updated.unrealized_gain_pct, dec!(-20));

        assert!(update_price(updated, dec!(-1), now()).is_err());
    }

    #[test]
    fn test_recalculate_metrics_is_idempotent() {
        let mut position = buy(aapl(dec!(10), dec!(100)), dec!(3), dec!(97.5), now()).unwrap();
        recalculate_metrics(&mut position).unwrap();
        let once = position.clone();
        recalculate_metrics(&mut position).unwrap();
        assert_eq!(position, once);
    }

    #[test]
    fn test_buy_only_sequence_keeps_cost_consistent() {
        let mut position = aapl(dec!(3), dec!(17.25));
        let fills = [
            (dec!(7), dec!(19.10)),
            (dec!(0.5), dec!(21.333)),
            (dec!(12), dec!(16.01)),
            (dec!(1.25), dec!(25)),
        ];
        for (quantity, price) in fills {
            position = buy(position, quantity, price, now()).unwrap();
            let drift = (position.total_cost - position.quantity * position.average_cost_per_unit).abs();
            assert!(drift < dec!(0.000001), "drift {drift}");
        }
    }

    #[test]
    fn test_buy_then_sell_same_lot_round_trips() {
        let start = aapl(dec!(10), dec!(100));
        let bought = buy(start.clone(), dec!(4), dec!(100), now()).unwrap();
        let sold = sell(bought, dec!(4), dec!(100), now()).unwrap();
        assert_eq!(sold.quantity, start.quantity);
        assert!(sold.realized_gain.abs() < dec!(0.000001));
    }

    #[test]
    fn test_sells_never_increase_quantity() {
        let mut position = aapl(dec!(20), dec!(50));
        let mut previous = position.quantity;
        for quantity in [dec!(3), dec!(7), dec!(0.5), dec!(9.5)] {
            position = sell(position, quantity, dec!(55), now()).unwrap();
            assert!(position.quantity <= previous);
            assert!(position.quantity >= Decimal::ZERO);
            previous = position.quantity;
        }
        assert_eq!(position.status, PositionStatus::Sold);
        assert!(sell(position, dec!(1), dec!(55), now()).is_err());
    }

    #[test]
    fn test_status_changes_are_restricted() {
        let position = aapl(dec!(1), dec!(1));
        let inactive = change_status(position, PositionStatus::Inactive, now()).unwrap();
        assert_eq!(inactive.status, PositionStatus::Inactive);
        let active = change_status(inactive, PositionStatus::Active, now()).unwrap();
        assert_eq!(active.status, PositionStatus::Active);

        assert!(matches!(
            change_status(active.clone(), PositionStatus::Sold, now()),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            change_status(active, PositionStatus::Watchlist, now()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_open_with_overflowing_cost_is_rejected() {
        let huge = Decimal::from_scientific("1e20").unwrap();
        let err = open(
            &OpenPosition::new("user-1", "X", AssetType::Stock, huge, huge),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref m) if m.contains("out of range")));
    }

    #[test]
    fn test_price_jump_beyond_range_is_rejected() {
        let tiny = aapl(dec!(1), Decimal::new(1, 28));
        let huge = Decimal::from_scientific("1e20").unwrap();
        let err = update_price(tiny, huge, now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref m) if m.contains("out of range")));

        let err = buy(aapl(dec!(1), Decimal::MAX), dec!(1), Decimal::MAX, now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = sell(aapl(huge, dec!(1)), dec!(1), Decimal::MAX, now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_replay_rebuilds_position() {
        let request = OpenPosition::new("user-1", "AAPL", AssetType::Stock, dec!(10), dec!(100));
        let events = [
            PositionEvent::Buy {
                quantity: dec!(5),
                price_per_unit: dec!(110),
            },
            PositionEvent::Sell {
                quantity: dec!(10),
                price_per_unit: dec!(120),
            },
            PositionEvent::PriceUpdate { price: dec!(130) },
        ];

        let mut position = open(&request, now()).unwrap();
        let mut journal = vec![request.journal_entry(now())];
        for event in &events {
            let before = position.realized_gain;
            position = apply_event(position, event, now()).unwrap();
            journal.push(event.journal_entry(None, position.realized_gain - before, now()));
        }

        let rebuilt = replay(&position, &journal).unwrap();
        assert_eq!(rebuilt, position);
    }

    #[test]
    fn test_replay_requires_opening_entry() {
        let position = aapl(dec!(1), dec!(1));
        let entry = PositionEvent::PriceUpdate { price: dec!(2) }.journal_entry(None, Decimal::ZERO, now());
        assert!(replay(&position, &[entry]).is_err());
        assert!(replay(&position, &[]).is_err());
    }
}
