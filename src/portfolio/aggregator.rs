use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::models::{Allocation, AssetType, Position};
use crate::error::Result;
use crate::ledger::checked;

pub const UNCLASSIFIED_SECTOR: &str = "unclassified";

/// Totals across a user's active positions
///
/// Amounts are summed as stored, without conversion: the top-level totals
/// are only meaningful when every position shares one currency.
/// `by_currency` keeps each currency's own totals so a mixed portfolio can
/// be read correctly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_assets: i64,
    pub active_assets: i64,
    pub total_invested: Decimal,
    pub total_value: Decimal,
    pub total_unrealized_gain: Decimal,
    pub total_realized_gain: Decimal,
    pub total_dividends: Decimal,
    pub total_gain: Decimal,
    pub total_gain_pct: Decimal,
    pub by_asset_type: BTreeMap<AssetType, Allocation>,
    pub by_sector: BTreeMap<String, Allocation>,
    pub by_currency: BTreeMap<String, Allocation>,
}

impl PortfolioSummary {
    /// More than one currency was added into the totals.
    pub fn is_mixed_currency(&self) -> bool {
        self.by_currency.len() > 1
    }
}

fn add_to(slot: &mut Allocation, position: &Position) -> Result<()> {
    checked::accumulate("allocation value", &mut slot.value, position.current_value)?;
    checked::accumulate("allocation cost", &mut slot.cost, position.total_cost)?;
    slot.count += 1;
    Ok(())
}

fn fill_percentages<K>(groups: &mut BTreeMap<K, Allocation>, total_value: Decimal) -> Result<()> {
    for allocation in groups.values_mut() {
        allocation.percentage =
            checked::percent_of("allocation weight", allocation.value, total_value)?
                .unwrap_or(Decimal::ZERO);
    }
    Ok(())
}

/// Reduce a consistent set of positions into a summary.
///
/// Only active, non-deleted positions are counted; watchlist, sold and
/// inactive rows in the input are ignored. Totals that leave the decimal
/// range are reported as a validation error.
pub fn build_summary(positions: &[Position]) -> Result<PortfolioSummary> {
    let mut summary = PortfolioSummary::default();

    for position in positions.iter().filter(|p| p.counts_toward_valuation()) {
        summary.total_assets += 1;
        if position.quantity > Decimal::ZERO {
            summary.active_assets += 1;
        }
        checked::accumulate("total invested", &mut summary.total_invested, position.total_cost)?;
        checked::accumulate("total value", &mut summary.total_value, position.current_value)?;
        checked::accumulate(
            "total unrealized gain",
            &mut summary.total_unrealized_gain,
            position.unrealized_gain,
        )?;
        checked::accumulate(
            "total realized gain",
            &mut summary.total_realized_gain,
            position.realized_gain,
        )?;
        checked::accumulate(
            "total dividends",
            &mut summary.total_dividends,
            position.total_dividends,
        )?;

        add_to(
            summary.by_asset_type.entry(position.asset_type).or_default(),
            position,
        )?;

        let sector = position
            .sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNCLASSIFIED_SECTOR)
            .to_string();
        add_to(summary.by_sector.entry(sector).or_default(), position)?;

        let currency = position.currency.trim().to_uppercase();
        add_to(summary.by_currency.entry(currency).or_default(), position)?;
    }

    summary.total_gain = checked::add(
        "total gain",
        summary.total_unrealized_gain,
        summary.total_realized_gain,
    )?;
    summary.total_gain_pct =
        checked::percent_of("total gain percentage", summary.total_gain, summary.total_invested)?
            .unwrap_or(Decimal::ZERO);

    fill_percentages(&mut summary.by_asset_type, summary.total_value)?;
    fill_percentages(&mut summary.by_sector, summary.total_value)?;
    fill_percentages(&mut summary.by_currency, summary.total_value)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PositionStatus;
    use crate::ledger::{self, OpenPosition};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn position(symbol: &str, asset_type: AssetType, quantity: Decimal, cost: Decimal, price: Decimal) -> Position {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap();
        let opened = ledger::open(
            &OpenPosition::new("user-1", symbol, asset_type, quantity, cost),
            now,
        )
        .unwrap();
        ledger::update_price(opened, price, now).unwrap()
    }

    #[test]
    fn test_summary_totals() {
        let mut etf = position("VTI", AssetType::Etf, dec!(10), dec!(200), dec!(250));
        etf.sector = Some("Broad Market".to_string());
        let stock = position("AAPL", AssetType::Stock, dec!(5), dec!(100), dec!(90));
        let stock2 = position("MSFT", AssetType::Stock, dec!(2), dec!(300), dec!(400));

        let summary = build_summary(&[etf, stock, stock2]).unwrap();
        assert_eq!(summary.total_assets, 3);
        assert_eq!(summary.active_assets, 3);
        assert_eq!(summary.total_invested, dec!(3100));
        assert_eq!(summary.total_value, dec!(3750));
        assert_eq!(summary.total_unrealized_gain, dec!(650));
        assert_eq!(summary.total_gain, dec!(650));
        assert!((summary.total_gain_pct - dec!(20.97)).abs() < dec!(0.01));

        let stocks = &summary.by_asset_type[&AssetType::Stock];
        assert_eq!(stocks.count, 2);
        assert_eq!(stocks.value, dec!(1250));
        assert_eq!(stocks.cost, dec!(1100));
        assert!((stocks.percentage - dec!(33.33)).abs() < dec!(0.01));

        let etfs = &summary.by_asset_type[&AssetType::Etf];
        assert!((etfs.percentage - dec!(66.67)).abs() < dec!(0.01));

        assert_eq!(summary.by_sector["Broad Market"].count, 1);
        assert_eq!(summary.by_sector[UNCLASSIFIED_SECTOR].count, 2);
    }

    #[test]
    fn test_summary_ignores_non_active_positions() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap();
        let active = position("AAPL", AssetType::Stock, dec!(5), dec!(100), dec!(100));
        let watch = ledger::open(
            &OpenPosition::watchlist("user-1", "TSLA", AssetType::Stock, dec!(200)),
            now,
        )
        .unwrap();
        let sold = ledger::sell(
            position("GLD", AssetType::Commodity, dec!(1), dec!(180), dec!(180)),
            dec!(1),
            dec!(190),
            now,
        )
        .unwrap();
        assert_eq!(sold.status, PositionStatus::Sold);
        let mut deleted = position("BND", AssetType::Bond, dec!(3), dec!(70), dec!(72));
        deleted.deleted_at = Some(now);

        let summary = build_summary(&[active, watch, sold, deleted]).unwrap();
        assert_eq!(summary.total_assets, 1);
        assert_eq!(summary.total_value, dec!(500));
        assert_eq!(summary.total_realized_gain, Decimal::ZERO);
        assert!(!summary.by_asset_type.contains_key(&AssetType::Bond));
    }

    #[test]
    fn test_empty_summary_has_zero_percentages() {
        let summary = build_summary(&[]).unwrap();
        assert_eq!(summary.total_assets, 0);
        assert_eq!(summary.total_gain_pct, Decimal::ZERO);
        assert!(summary.by_asset_type.is_empty());
    }

    #[test]
    fn test_zero_valued_holdings_get_zero_share() {
        let free = position("SPIN", AssetType::Stock, dec!(4), Decimal::ZERO, Decimal::ZERO);
        let summary = build_summary(&[free]).unwrap();
        assert_eq!(summary.total_value, Decimal::ZERO);
        assert_eq!(summary.total_gain_pct, Decimal::ZERO);
        assert_eq!(summary.by_asset_type[&AssetType::Stock].percentage, Decimal::ZERO);
    }

    #[test]
    fn test_currencies_are_grouped() {
        let usd = position("AAPL", AssetType::Stock, dec!(10), dec!(100), dec!(100));
        let mut eur = position("SAP", AssetType::Stock, dec!(4), dec!(150), dec!(200));
        eur.currency = "eur".to_string();

        let single = build_summary(std::slice::from_ref(&usd)).unwrap();
        assert!(!single.is_mixed_currency());
        assert_eq!(single.by_currency["USD"].percentage, dec!(100));

        let mixed = build_summary(&[usd, eur]).unwrap();
        assert!(mixed.is_mixed_currency());
        assert_eq!(mixed.by_currency["USD"].value, dec!(1000));
        assert_eq!(mixed.by_currency["EUR"].value, dec!(800));
        assert_eq!(mixed.by_currency["EUR"].cost, dec!(600));
        assert_eq!(mixed.by_currency["EUR"].count, 1);
    }

    #[test]
    fn test_overflowing_totals_are_rejected() {
        let mut a = position("AAPL", AssetType::Stock, dec!(1), dec!(1), dec!(1));
        a.current_value = Decimal::MAX;
        let b = a.clone();
        let err = build_summary(&[a, b]).unwrap_err();
        assert!(matches!(err, crate::error::LedgerError::Validation(_)));
    }
}
