//! Ledger service
//!
//! The boundary between callers and the core: loads a position from the
//! store, applies one ledger event, and saves the result together with its
//! journal row. A save that loses an optimistic-concurrency race is retried
//! exactly once after reloading, since ledger events are pure functions of
//! the event and the prior state.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::db::models::{JournalEntry, PortfolioSnapshot, Position, PositionStatus};
use crate::db::store::PositionStore;
use crate::error::{LedgerError, Result};
use crate::ledger::{self, OpenPosition, PositionEvent, SaleBreakdown};
use crate::portfolio::{build_snapshot, build_summary, PortfolioSummary, SnapshotRequest};

/// Latest market price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: Decimal,
}

/// Result of one item of a bulk price update
#[derive(Debug)]
pub struct PriceUpdateOutcome {
    pub symbol: String,
    pub position_id: Option<i64>,
    pub result: Result<Position>,
}

impl PriceUpdateOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct LedgerService<S, C> {
    store: S,
    clock: C,
}

impl<S: PositionStore, C: Clock> LedgerService<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run `attempt`, and once more if it lost a concurrency race.
    fn with_retry<T>(
        &self,
        operation: &str,
        position_id: i64,
        mut attempt: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        match attempt() {
            Err(err) if err.is_retryable() => {
                warn!(
                    position_id,
                    operation, "position changed concurrently; reloading and retrying once"
                );
                attempt()
            }
            other => other,
        }
    }

    /// Load a position that has not been soft-deleted.
    fn load_live(&self, id: i64) -> Result<Position> {
        let position = self.store.load_position(id)?;
        if position.is_deleted() {
            return Err(LedgerError::NotFound(format!("position {}", id)));
        }
        Ok(position)
    }

    pub fn get_position(&self, id: i64) -> Result<Position> {
        self.load_live(id)
    }

    pub fn find_position(&self, user_id: &str, symbol: &str) -> Result<Position> {
        self.store
            .find_position_by_symbol(user_id, symbol)?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("position {} for user {}", symbol.trim(), user_id))
            })
    }

    pub fn list_positions(&self, user_id: &str, include_deleted: bool) -> Result<Vec<Position>> {
        self.store.list_positions(user_id, include_deleted)
    }

    /// Open a new position. Fails with `Conflict` when the user already
    /// holds an active position in the symbol.
    pub fn open_position(&self, request: &OpenPosition) -> Result<Position> {
        if let Some(existing) = self
            .store
            .find_position_by_symbol(request.user_id.trim(), &request.symbol)?
        {
            if existing.status == PositionStatus::Active {
                return Err(LedgerError::Conflict(format!(
                    "user {} already has an active position in {} (id {})",
                    existing.user_id,
                    existing.symbol,
                    existing.id.unwrap_or_default()
                )));
            }
        }

        let now = self.clock.now();
        let mut position = ledger::open(request, now)?;
        let id = self
            .store
            .insert_position(&mut position, &request.journal_entry(now))?;

        info!(
            position_id = id,
            user_id = %position.user_id,
            symbol = %position.symbol,
            status = %position.status,
            "opened position"
        );
        Ok(position)
    }

    /// Apply one event to a stored position and persist it with its journal row.
    pub fn apply(&self, id: i64, event: &PositionEvent) -> Result<Position> {
        self.with_retry(event.kind().as_str(), id, || {
            let position = self.load_live(id)?;
            let realized_before = position.realized_gain;
            let now = self.clock.now();

            let updated = ledger::apply_event(position, event, now)?;
            let realized_delta = updated.realized_gain - realized_before;
            self.persist(id, updated, event, realized_delta, now)
        })
    }

    fn persist(
        &self,
        id: i64,
        mut updated: Position,
        event: &PositionEvent,
        realized_delta: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Position> {
        let entry = event.journal_entry(Some(id), realized_delta, now);
        self.store.save_position(&mut updated, Some(&entry))?;

        debug!(
            position_id = id,
            event = event.kind().as_str(),
            quantity = %updated.quantity,
            total_cost = %updated.total_cost,
            "applied ledger event"
        );
        Ok(updated)
    }

    pub fn buy(&self, id: i64, quantity: Decimal, price_per_unit: Decimal) -> Result<Position> {
        let position = self.apply(
            id,
            &PositionEvent::Buy {
                quantity,
                price_per_unit,
            },
        )?;
        info!(position_id = id, %quantity, %price_per_unit, "bought");
        Ok(position)
    }

    pub fn sell(&self, id: i64, quantity: Decimal, price_per_unit: Decimal) -> Result<Position> {
        self.sell_with_breakdown(id, quantity, price_per_unit)
            .map(|(position, _)| position)
    }

    /// Sell and also return the cost basis, proceeds and realized gain of
    /// the sale that was stored, as computed from the state it was applied to.
    pub fn sell_with_breakdown(
        &self,
        id: i64,
        quantity: Decimal,
        price_per_unit: Decimal,
    ) -> Result<(Position, SaleBreakdown)> {
        let event = PositionEvent::Sell {
            quantity,
            price_per_unit,
        };
        let (position, sale) = self.with_retry("sell", id, || {
            let position = self.load_live(id)?;
            let now = self.clock.now();
            let (updated, sale) = ledger::sell_with_breakdown(position, quantity, price_per_unit, now)?;
            let updated = self.persist(id, updated, &event, sale.realized_gain_delta, now)?;
            Ok((updated, sale))
        })?;
        info!(
            position_id = id,
            %quantity,
            %price_per_unit,
            realized = %sale.realized_gain_delta,
            status = %position.status,
            "sold"
        );
        Ok((position, sale))
    }

    /// Record a dividend; `date` defaults to today on the service clock.
    pub fn add_dividend(&self, id: i64, amount: Decimal, date: Option<NaiveDate>) -> Result<Position> {
        let date = date.unwrap_or_else(|| self.clock.now().date_naive());
        self.apply(id, &PositionEvent::Dividend { amount, date })
    }

    pub fn update_price(&self, id: i64, price: Decimal) -> Result<Position> {
        self.apply(id, &PositionEvent::PriceUpdate { price })
    }

    /// Mark many of the user's positions to market. Every quote is applied
    /// on its own; a failure is reported in its outcome and never stops the
    /// remaining quotes.
    pub fn bulk_update_prices(&self, user_id: &str, quotes: &[PriceQuote]) -> Vec<PriceUpdateOutcome> {
        let outcomes: Vec<PriceUpdateOutcome> = quotes
            .iter()
            .map(|quote| {
                let found = self.find_position(user_id, &quote.symbol);
                let position_id = found.as_ref().ok().and_then(|p| p.id);
                let result = found
                    .and_then(|p| p.require_id())
                    .and_then(|id| self.update_price(id, quote.price));

                if let Err(err) = &result {
                    warn!(symbol = %quote.symbol, error = %err, "price update failed");
                }
                PriceUpdateOutcome {
                    symbol: quote.symbol.trim().to_uppercase(),
                    position_id,
                    result,
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            user_id,
            updated = outcomes.len() - failed,
            failed,
            "bulk price update finished"
        );
        outcomes
    }

    /// Administrative Active <-> Inactive change.
    pub fn change_status(&self, id: i64, status: PositionStatus) -> Result<Position> {
        self.with_retry("change_status", id, || {
            let position = self.load_live(id)?;
            let mut updated = ledger::change_status(position, status, self.clock.now())?;
            self.store.save_position(&mut updated, None)?;
            Ok(updated)
        })
    }

    /// Soft-delete: the row and its journal stay, but the position drops out
    /// of listings and valuations. Independent of the Sold status.
    pub fn delete_position(&self, id: i64) -> Result<Position> {
        self.with_retry("delete", id, || {
            let mut position = self.load_live(id)?;
            let now = self.clock.now();
            position.deleted_at = Some(now);
            position.updated_at = now;
            self.store.save_position(&mut position, None)?;
            info!(position_id = id, symbol = %position.symbol, "deleted position");
            Ok(position)
        })
    }

    pub fn history(&self, id: i64) -> Result<Vec<JournalEntry>> {
        self.store.load_position(id)?;
        self.store.journal(id)
    }

    /// Rebuild a position from its journal, for auditing stored figures.
    pub fn replay_position(&self, id: i64) -> Result<Position> {
        let stored = self.store.load_position(id)?;
        let journal = self.store.journal(id)?;
        let mut rebuilt = ledger::replay(&stored, &journal)?;
        rebuilt.id = stored.id;
        Ok(rebuilt)
    }

    /// Summary of the user's active positions, read in one query.
    pub fn summary(&self, user_id: &str) -> Result<PortfolioSummary> {
        let positions = self.store.list_active_positions(user_id)?;
        let summary = build_summary(&positions)?;
        if summary.is_mixed_currency() {
            warn!(
                user_id,
                currencies = summary.by_currency.len(),
                "summary totals add up positions in different currencies"
            );
        }
        Ok(summary)
    }

    /// Build and append a snapshot of the user's portfolio as of now.
    pub fn record_snapshot(&self, request: &SnapshotRequest) -> Result<PortfolioSnapshot> {
        if request.user_id.trim().is_empty() {
            return Err(LedgerError::Validation("user id must not be empty".to_string()));
        }

        let summary = self.summary(&request.user_id)?;
        let previous = self.store.load_latest_snapshot(&request.user_id)?;
        let now = self.clock.now();
        let cash_flows = self.store.cash_flows(
            &request.user_id,
            previous.as_ref().map(|p| p.snapshot_date),
            now,
        )?;

        let mut snapshot = build_snapshot(request, &summary, previous.as_ref(), &cash_flows, now)?;
        let id = self.store.save_snapshot(&mut snapshot)?;

        info!(
            snapshot_id = id,
            user_id = %snapshot.user_id,
            total_value = %snapshot.total_value,
            day_change = %snapshot.day_change,
            "recorded portfolio snapshot"
        );
        Ok(snapshot)
    }

    pub fn list_snapshots(&self, user_id: &str, limit: usize) -> Result<Vec<PortfolioSnapshot>> {
        self.store.list_snapshots(user_id, limit)
    }

    pub fn delete_snapshot(&self, user_id: &str, id: i64) -> Result<()> {
        self.store.delete_snapshot(user_id, id)?;
        info!(snapshot_id = id, user_id, "deleted snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::models::AssetType;
    use crate::db::store::SqliteStore;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn service() -> LedgerService<SqliteStore, FixedClock> {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 7, 1, 16, 0, 0).unwrap());
        LedgerService::new(SqliteStore::open_in_memory().unwrap(), clock)
    }

    #[test]
    fn test_open_conflicts_on_active_duplicate() {
        let svc = service();
        let request = OpenPosition::new("u1", "AAPL", AssetType::Stock, dec!(10), dec!(100));
        svc.open_position(&request).unwrap();

        let again = OpenPosition::new("u1", " aapl ", AssetType::Stock, dec!(1), dec!(100));
        assert!(matches!(
            svc.open_position(&again),
            Err(LedgerError::Conflict(_))
        ));
    }

    #[test]
    fn test_open_allowed_next_to_watchlist_entry() {
        let svc = service();
        svc.open_position(&OpenPosition::watchlist("u1", "AAPL", AssetType::Stock, dec!(100)))
            .unwrap();
        let held = svc
            .open_position(&OpenPosition::new("u1", "AAPL", AssetType::Stock, dec!(2), dec!(100)))
            .unwrap();
        assert_eq!(held.status, PositionStatus::Active);
        assert_eq!(svc.find_position("u1", "AAPL").unwrap().id, held.id);
    }

    #[test]
    fn test_deleted_position_is_not_found() {
        let svc = service();
        let position = svc
            .open_position(&OpenPosition::new("u1", "AAPL", AssetType::Stock, dec!(10), dec!(100)))
            .unwrap();
        let id = position.id.unwrap();
        svc.delete_position(id).unwrap();

        assert!(matches!(svc.buy(id, dec!(1), dec!(1)), Err(LedgerError::NotFound(_))));
        assert!(matches!(svc.get_position(id), Err(LedgerError::NotFound(_))));
        assert!(svc.summary("u1").unwrap().total_assets == 0);

        // the symbol is free again
        svc.open_position(&OpenPosition::new("u1", "AAPL", AssetType::Stock, dec!(1), dec!(100)))
            .unwrap();
    }

    #[test]
    fn test_dividend_defaults_to_clock_date() {
        let svc = service();
        let position = svc
            .open_position(&OpenPosition::new("u1", "KO", AssetType::Stock, dec!(10), dec!(60)))
            .unwrap();
        let position = svc.add_dividend(position.id.unwrap(), dec!(4.85), None).unwrap();
        assert_eq!(
            position.last_dividend_date,
            NaiveDate::from_ymd_opt(2025, 7, 1)
        );
    }

    #[test]
    fn test_bulk_update_reports_each_item() {
        let svc = service();
        svc.open_position(&OpenPosition::new("u1", "AAPL", AssetType::Stock, dec!(10), dec!(100)))
            .unwrap();
        svc.open_position(&OpenPosition::new("u1", "VTI", AssetType::Etf, dec!(4), dec!(250)))
            .unwrap();

        let quotes = vec![
            PriceQuote {
                symbol: "AAPL".to_string(),
                price: dec!(120),
            },
            PriceQuote {
                symbol: "MISSING".to_string(),
                price: dec!(1),
            },
            PriceQuote {
                symbol: "VTI".to_string(),
                price: dec!(-5),
            },
            PriceQuote {
                symbol: "vti".to_string(),
                price: dec!(260),
            },
        ];
        let outcomes = svc.bulk_update_prices("u1", &quotes);
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1].result, Err(LedgerError::NotFound(_))));
        assert!(outcomes[1].position_id.is_none());
        assert!(matches!(outcomes[2].result, Err(LedgerError::Validation(_))));
        assert!(outcomes[2].position_id.is_some());
        assert!(outcomes[3].is_ok());

        let summary = svc.summary("u1").unwrap();
        assert_eq!(summary.total_value, dec!(2240));
    }

    #[test]
    fn test_record_snapshot_tracks_cash_flow_windows() {
        let svc = service();
        let position = svc
            .open_position(&OpenPosition::new("u1", "AAPL", AssetType::Stock, dec!(10), dec!(100)))
            .unwrap();
        let first = svc.record_snapshot(&SnapshotRequest::manual("u1")).unwrap();
        assert_eq!(first.cash_inflow, dec!(1000));
        assert_eq!(first.day_change, Decimal::ZERO);

        svc.clock().advance(Duration::days(1));
        svc.sell(position.id.unwrap(), dec!(2), dec!(110)).unwrap();
        svc.update_price(position.id.unwrap(), dec!(105)).unwrap();
        let second = svc.record_snapshot(&SnapshotRequest::manual("u1")).unwrap();

        assert_eq!(second.cash_inflow, Decimal::ZERO);
        assert_eq!(second.cash_outflow, dec!(220));
        assert_eq!(second.net_cash_flow, dec!(-220));
        assert_eq!(second.total_value, dec!(840));
        assert_eq!(second.day_change, dec!(-160));
        assert_eq!(second.total_realized_gain, dec!(20));
    }

    #[test]
    fn test_sell_reports_the_breakdown_it_stored() {
        let svc = service();
        let id = svc
            .open_position(&OpenPosition::new("u1", "AAPL", AssetType::Stock, dec!(10), dec!(100)))
            .unwrap()
            .id
            .unwrap();
        svc.buy(id, dec!(5), dec!(110)).unwrap();

        let (position, sale) = svc.sell_with_breakdown(id, dec!(10), dec!(120)).unwrap();
        assert_eq!(sale.proceeds, dec!(1200));
        assert!((sale.realized_gain_delta - dec!(166.67)).abs() < dec!(0.01));
        assert_eq!(position.realized_gain, sale.realized_gain_delta);

        let journal = svc.history(id).unwrap();
        assert_eq!(journal[2].realized_gain_delta, Some(sale.realized_gain_delta));
        assert_eq!(journal[2].amount, Some(sale.proceeds));
    }

    #[test]
    fn test_out_of_range_open_stores_nothing() {
        let svc = service();
        let huge = Decimal::from_scientific("1e20").unwrap();
        let err = svc
            .open_position(&OpenPosition::new("u1", "X", AssetType::Stock, huge, huge))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(svc.list_positions("u1", true).unwrap().is_empty());
    }

    #[test]
    fn test_replay_matches_stored_position() {
        let svc = service();
        let position = svc
            .open_position(&OpenPosition::new("u1", "AAPL", AssetType::Stock, dec!(10), dec!(100)))
            .unwrap();
        let id = position.id.unwrap();
        svc.buy(id, dec!(5), dec!(110)).unwrap();
        svc.clock().advance(Duration::hours(1));
        svc.sell(id, dec!(10), dec!(120)).unwrap();
        svc.add_dividend(id, dec!(50), None).unwrap();
        let stored = svc.update_price(id, dec!(130)).unwrap();

        let rebuilt = svc.replay_position(id).unwrap();
        assert_eq!(rebuilt.quantity, stored.quantity);
        assert_eq!(rebuilt.total_cost, stored.total_cost);
        assert_eq!(rebuilt.realized_gain, stored.realized_gain);
        assert_eq!(rebuilt.total_dividends, stored.total_dividends);
        assert_eq!(rebuilt.dividend_yield, stored.dividend_yield);
        assert_eq!(svc.history(id).unwrap().len(), 5);
    }
}
