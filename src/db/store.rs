//! Persistence for positions, their journal and portfolio snapshots.
//!
//! [`PositionStore`] is the seam the service talks to; [`SqliteStore`] is the
//! SQLite implementation. Position saves are guarded by the `version` column
//! so a stale in-memory copy can never overwrite a newer row.

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use super::models::{
    CashFlowSummary, EntryKind, JournalEntry, PortfolioSnapshot, Position, RiskMetrics,
};
use super::{apply_schema, configure, get_decimal_value, get_optional_decimal_value};
use crate::error::{LedgerError, Result};
use crate::ledger::checked;

/// Storage interface for the ledger.
pub trait PositionStore {
    /// Load a position by id, including soft-deleted ones.
    fn load_position(&self, id: i64) -> Result<Position>;

    /// The user's live position for `symbol`, preferring an active one.
    fn find_position_by_symbol(&self, user_id: &str, symbol: &str) -> Result<Option<Position>>;

    /// Persist a new position together with its opening journal row.
    fn insert_position(&self, position: &mut Position, opening: &JournalEntry) -> Result<i64>;

    /// Persist a mutated position, optionally with the journal row that
    /// produced it. Fails with `Concurrency` when the stored version moved on.
    fn save_position(&self, position: &mut Position, entry: Option<&JournalEntry>) -> Result<()>;

    fn list_positions(&self, user_id: &str, include_deleted: bool) -> Result<Vec<Position>>;

    /// All of the user's active, non-deleted positions in one read.
    fn list_active_positions(&self, user_id: &str) -> Result<Vec<Position>>;

    fn journal(&self, position_id: i64) -> Result<Vec<JournalEntry>>;

    /// Buy and sell amounts recorded in `(after, until]`.
    fn cash_flows(
        &self,
        user_id: &str,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> Result<CashFlowSummary>;

    fn load_latest_snapshot(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>>;

    /// Append a snapshot. Stored snapshots are never updated.
    fn save_snapshot(&self, snapshot: &mut PortfolioSnapshot) -> Result<i64>;

    /// Most recent first.
    fn list_snapshots(&self, user_id: &str, limit: usize) -> Result<Vec<PortfolioSnapshot>>;

    fn delete_snapshot(&self, user_id: &str, id: i64) -> Result<()>;
}

const POSITION_COLUMNS: &[&str] = &[
    "user_id",
    "symbol",
    "name",
    "asset_type",
    "sector",
    "currency",
    "status",
    "quantity",
    "average_cost_per_unit",
    "total_cost",
    "current_price",
    "current_value",
    "unrealized_gain",
    "unrealized_gain_pct",
    "realized_gain",
    "realized_gain_pct",
    "total_dividends",
    "dividend_yield",
    "last_dividend_amount",
    "last_dividend_date",
    "beta",
    "volatility",
    "sharpe_ratio",
    "max_drawdown",
    "return_1y",
    "return_3y",
    "return_5y",
    "is_watchlist",
    "notes",
    "tags",
    "created_at",
    "updated_at",
    "price_updated_at",
    "deleted_at",
];

const SNAPSHOT_COLUMNS: &str = "id, user_id, snapshot_date, snapshot_type, period,
    total_value, total_cost, total_unrealized_gain, total_realized_gain, total_dividends,
    total_return, total_return_pct, day_change, day_change_pct,
    total_assets, active_assets, asset_type_breakdown, sector_breakdown,
    cash_inflow, cash_outflow, net_cash_flow, notes, created_at";

const JOURNAL_COLUMNS: &str = "id, position_id, kind, quantity, price_per_unit, amount,
    event_date, realized_gain_delta, watchlist, recorded_at";

fn position_select() -> String {
    format!(
        "SELECT id, {}, version FROM positions",
        POSITION_COLUMNS.join(", ")
    )
}

fn opt_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

fn boxed<T: ToSql + 'static>(value: T) -> Box<dyn ToSql> {
    Box::new(value)
}

/// Named parameters for every writable position column except `version`
fn position_values(p: &Position) -> Vec<(String, Box<dyn ToSql>)> {
    let values: Vec<(&str, Box<dyn ToSql>)> = vec![
        ("user_id", boxed(p.user_id.clone())),
        ("symbol", boxed(p.symbol.clone())),
        ("name", boxed(p.name.clone())),
        ("asset_type", boxed(p.asset_type.as_str())),
        ("sector", boxed(p.sector.clone())),
        ("currency", boxed(p.currency.clone())),
        ("status", boxed(p.status.as_str())),
        ("quantity", boxed(p.quantity.to_string())),
        (
            "average_cost_per_unit",
            boxed(p.average_cost_per_unit.to_string()),
        ),
        ("total_cost", boxed(p.total_cost.to_string())),
        ("current_price", boxed(p.current_price.to_string())),
        ("current_value", boxed(p.current_value.to_string())),
        ("unrealized_gain", boxed(p.unrealized_gain.to_string())),
        (
            "unrealized_gain_pct",
            boxed(p.unrealized_gain_pct.to_string()),
        ),
        ("realized_gain", boxed(p.realized_gain.to_string())),
        ("realized_gain_pct", boxed(p.realized_gain_pct.to_string())),
        ("total_dividends", boxed(p.total_dividends.to_string())),
        ("dividend_yield", boxed(p.dividend_yield.to_string())),
        (
            "last_dividend_amount",
            boxed(opt_text(p.last_dividend_amount)),
        ),
        ("last_dividend_date", boxed(p.last_dividend_date)),
        ("beta", boxed(opt_text(p.risk.beta))),
        ("volatility", boxed(opt_text(p.risk.volatility))),
        ("sharpe_ratio", boxed(opt_text(p.risk.sharpe_ratio))),
        ("max_drawdown", boxed(opt_text(p.risk.max_drawdown))),
        ("return_1y", boxed(opt_text(p.risk.return_1y))),
        ("return_3y", boxed(opt_text(p.risk.return_3y))),
        ("return_5y", boxed(opt_text(p.risk.return_5y))),
        ("is_watchlist", boxed(p.is_watchlist)),
        ("notes", boxed(p.notes.clone())),
        ("tags", boxed(p.tags.clone())),
        ("created_at", boxed(p.created_at)),
        ("updated_at", boxed(p.updated_at)),
        ("price_updated_at", boxed(p.price_updated_at)),
        ("deleted_at", boxed(p.deleted_at)),
    ];
    values
        .into_iter()
        .map(|(name, value)| (format!(":{}", name), value))
        .collect()
}

fn as_named(values: &[(String, Box<dyn ToSql>)]) -> Vec<(&str, &dyn ToSql)> {
    values
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_ref()))
        .collect()
}

fn column_index(row: &Row, name: &str) -> rusqlite::Result<usize> {
    row.as_ref().column_index(name)
}

fn decimal_column(row: &Row, name: &str) -> rusqlite::Result<Decimal> {
    get_decimal_value(row, column_index(row, name)?)
}

fn optional_decimal_column(row: &Row, name: &str) -> rusqlite::Result<Option<Decimal>> {
    get_optional_decimal_value(row, column_index(row, name)?)
}

fn parsed_column<T>(row: &Row, name: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = LedgerError>,
{
    let idx = column_index(row, name)?;
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_parsed_column<T>(row: &Row, name: &str) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = LedgerError>,
{
    let idx = column_index(row, name)?;
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row, name: &str) -> rusqlite::Result<T> {
    let idx = column_index(row, name)?;
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_position(row: &Row) -> rusqlite::Result<Position> {
    Ok(Position {
        id: Some(row.get("id")?),
        user_id: row.get("user_id")?,
        symbol: row.get("symbol")?,
        name: row.get("name")?,
        asset_type: parsed_column(row, "asset_type")?,
        sector: row.get("sector")?,
        currency: row.get("currency")?,
        status: parsed_column(row, "status")?,
        quantity: decimal_column(row, "quantity")?,
        average_cost_per_unit: decimal_column(row, "average_cost_per_unit")?,
        total_cost: decimal_column(row, "total_cost")?,
        current_price: decimal_column(row, "current_price")?,
        current_value: decimal_column(row, "current_value")?,
        unrealized_gain: decimal_column(row, "unrealized_gain")?,
        unrealized_gain_pct: decimal_column(row, "unrealized_gain_pct")?,
        realized_gain: decimal_column(row, "realized_gain")?,
        realized_gain_pct: decimal_column(row, "realized_gain_pct")?,
        total_dividends: decimal_column(row, "total_dividends")?,
        dividend_yield: decimal_column(row, "dividend_yield")?,
        last_dividend_amount: optional_decimal_column(row, "last_dividend_amount")?,
        last_dividend_date: row.get("last_dividend_date")?,
        risk: RiskMetrics {
            beta: optional_decimal_column(row, "beta")?,
            volatility: optional_decimal_column(row, "volatility")?,
            sharpe_ratio: optional_decimal_column(row, "sharpe_ratio")?,
            max_drawdown: optional_decimal_column(row, "max_drawdown")?,
            return_1y: optional_decimal_column(row, "return_1y")?,
            return_3y: optional_decimal_column(row, "return_3y")?,
            return_5y: optional_decimal_column(row, "return_5y")?,
        },
        is_watchlist: row.get("is_watchlist")?,
        notes: row.get("notes")?,
        tags: row.get("tags")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        price_updated_at: row.get("price_updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn row_to_journal_entry(row: &Row) -> rusqlite::Result<JournalEntry> {
    Ok(JournalEntry {
        id: Some(row.get("id")?),
        position_id: Some(row.get("position_id")?),
        kind: parsed_column(row, "kind")?,
        quantity: optional_decimal_column(row, "quantity")?,
        price_per_unit: optional_decimal_column(row, "price_per_unit")?,
        amount: optional_decimal_column(row, "amount")?,
        event_date: row.get("event_date")?,
        realized_gain_delta: optional_decimal_column(row, "realized_gain_delta")?,
        watchlist: row.get("watchlist")?,
        recorded_at: row.get("recorded_at")?,
    })
}

fn row_to_snapshot(row: &Row) -> rusqlite::Result<PortfolioSnapshot> {
    Ok(PortfolioSnapshot {
        id: Some(row.get("id")?),
        user_id: row.get("user_id")?,
        snapshot_date: row.get("snapshot_date")?,
        snapshot_type: parsed_column(row, "snapshot_type")?,
        period: optional_parsed_column(row, "period")?,
        total_value: decimal_column(row, "total_value")?,
        total_cost: decimal_column(row, "total_cost")?,
        total_unrealized_gain: decimal_column(row, "total_unrealized_gain")?,
        total_realized_gain: decimal_column(row, "total_realized_gain")?,
        total_dividends: decimal_column(row, "total_dividends")?,
        total_return: decimal_column(row, "total_return")?,
        total_return_pct: decimal_column(row, "total_return_pct")?,
        day_change: decimal_column(row, "day_change")?,
        day_change_pct: decimal_column(row, "day_change_pct")?,
        total_assets: row.get("total_assets")?,
        active_assets: row.get("active_assets")?,
        asset_type_breakdown: json_column(row, "asset_type_breakdown")?,
        sector_breakdown: json_column(row, "sector_breakdown")?,
        cash_inflow: decimal_column(row, "cash_inflow")?,
        cash_outflow: decimal_column(row, "cash_outflow")?,
        net_cash_flow: decimal_column(row, "net_cash_flow")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn map_position_write_error(err: rusqlite::Error, position: &Position) -> LedgerError {
    if is_unique_violation(&err) {
        LedgerError::Conflict(format!(
            "user {} already has an active position in {}",
            position.user_id, position.symbol
        ))
    } else {
        LedgerError::Database(err)
    }
}

fn insert_journal_entry(conn: &Connection, position_id: i64, entry: &JournalEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO position_journal (
            position_id, kind, quantity, price_per_unit, amount,
            event_date, realized_gain_delta, watchlist, recorded_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            position_id,
            entry.kind.as_str(),
            opt_text(entry.quantity),
            opt_text(entry.price_per_unit),
            opt_text(entry.amount),
            entry.event_date,
            opt_text(entry.realized_gain_delta),
            entry.watchlist,
            entry.recorded_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// SQLite-backed store. One store wraps one connection; open one per
/// thread to work on different positions in parallel.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wrap an open connection, applying connection settings and schema.
    pub fn new(conn: Connection) -> Result<Self> {
        configure(&conn)?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn query_positions(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Position>> {
        let mut stmt = self.conn.prepare(sql)?;
        let positions = stmt
            .query_map(params, row_to_position)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(positions)
    }
}

impl PositionStore for SqliteStore {
    fn load_position(&self, id: i64) -> Result<Position> {
        let sql = format!("{} WHERE id = ?1", position_select());
        self.conn
            .query_row(&sql, [id], row_to_position)
            .optional()?
            .ok_or_else(|| LedgerError::NotFound(format!("position {}", id)))
    }

    fn find_position_by_symbol(&self, user_id: &str, symbol: &str) -> Result<Option<Position>> {
        let sql = format!(
            "{} WHERE user_id = ?1 AND symbol = ?2 AND deleted_at IS NULL
             ORDER BY CASE status WHEN 'active' THEN 0 ELSE 1 END, id DESC
             LIMIT 1",
            position_select()
        );
        let position = self
            .conn
            .query_row(
                &sql,
                params![user_id, symbol.trim().to_uppercase()],
                row_to_position,
            )
            .optional()?;
        Ok(position)
    }

    fn insert_position(&self, position: &mut Position, opening: &JournalEntry) -> Result<i64> {
        let values = position_values(position);
        let mut named = as_named(&values);
        named.push((":version", &position.version as &dyn ToSql));

        let placeholders: Vec<String> = POSITION_COLUMNS.iter().map(|c| format!(":{}", c)).collect();
        let sql = format!(
            "INSERT INTO positions ({}, version) VALUES ({}, :version)",
            POSITION_COLUMNS.join(", "),
            placeholders.join(", ")
        );

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&sql, named.as_slice())
            .map_err(|e| map_position_write_error(e, position))?;
        let id = tx.last_insert_rowid();
        insert_journal_entry(&tx, id, opening)?;
        tx.commit()?;

        debug!(position_id = id, symbol = %position.symbol, "inserted position");
        position.id = Some(id);
        Ok(id)
    }

    fn save_position(&self, position: &mut Position, entry: Option<&JournalEntry>) -> Result<()> {
        let id = position.require_id()?;
        let expected_version = position.version;

        let values = position_values(position);
        let mut named = as_named(&values);
        named.retain(|(name, _)| *name != ":created_at");
        named.push((":id", &id as &dyn ToSql));
        named.push((":version", &expected_version as &dyn ToSql));

        let assignments: Vec<String> = POSITION_COLUMNS
            .iter()
            .filter(|c| **c != "created_at")
            .map(|c| format!("{c} = :{c}"))
            .collect();
        let sql = format!(
            "UPDATE positions SET {}, version = version + 1
             WHERE id = :id AND version = :version",
            assignments.join(", ")
        );

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx
            .execute(&sql, named.as_slice())
            .map_err(|e| map_position_write_error(e, position))?;

        if changed == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM positions WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            return Err(if exists {
                LedgerError::Concurrency {
                    position_id: id,
                    expected_version,
                }
            } else {
                LedgerError::NotFound(format!("position {}", id))
            });
        }

        if let Some(entry) = entry {
            insert_journal_entry(&tx, id, entry)?;
        }
        tx.commit()?;

        position.version = expected_version + 1;
        debug!(position_id = id, version = position.version, "saved position");
        Ok(())
    }

    fn list_positions(&self, user_id: &str, include_deleted: bool) -> Result<Vec<Position>> {
        let sql = format!(
            "{} WHERE user_id = ?1 AND (?2 OR deleted_at IS NULL) ORDER BY symbol, id",
            position_select()
        );
        self.query_positions(&sql, params![user_id, include_deleted])
    }

    fn list_active_positions(&self, user_id: &str) -> Result<Vec<Position>> {
        let sql = format!(
            "{} WHERE user_id = ?1 AND status = 'active' AND deleted_at IS NULL
             ORDER BY symbol, id",
            position_select()
        );
        self.query_positions(&sql, [user_id])
    }

    fn journal(&self, position_id: i64) -> Result<Vec<JournalEntry>> {
        let sql = format!(
            "SELECT {} FROM position_journal WHERE position_id = ?1 ORDER BY id",
            JOURNAL_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map([position_id], row_to_journal_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn cash_flows(
        &self,
        user_id: &str,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> Result<CashFlowSummary> {
        let mut stmt = self.conn.prepare(
            "SELECT j.kind, j.amount
             FROM position_journal j
             JOIN positions p ON p.id = j.position_id
             WHERE p.user_id = ?1
               AND j.kind IN ('open', 'buy', 'sell')
               AND (?2 IS NULL OR j.recorded_at > ?2)
               AND j.recorded_at <= ?3
             ORDER BY j.recorded_at, j.id",
        )?;

        let rows = stmt.query_map(params![user_id, after, until], |row| {
            let kind: EntryKind = parsed_column(row, "kind")?;
            let amount = get_optional_decimal_value(row, 1)?.unwrap_or(Decimal::ZERO);
            Ok((kind, amount))
        })?;

        let mut summary = CashFlowSummary::default();
        for row in rows {
            let (kind, amount) = row?;
            match kind {
                EntryKind::Open | EntryKind::Buy => {
                    checked::accumulate("cash inflow", &mut summary.inflow, amount)?
                }
                EntryKind::Sell => checked::accumulate("cash outflow", &mut summary.outflow, amount)?,
                EntryKind::Dividend | EntryKind::PriceUpdate => continue,
            }
            summary.entries += 1;
        }
        Ok(summary)
    }

    fn load_latest_snapshot(&self, user_id: &str) -> Result<Option<PortfolioSnapshot>> {
        let sql = format!(
            "SELECT {} FROM portfolio_snapshots
             WHERE user_id = ?1
             ORDER BY snapshot_date DESC, id DESC
             LIMIT 1",
            SNAPSHOT_COLUMNS
        );
        let snapshot = self
            .conn
            .query_row(&sql, [user_id], row_to_snapshot)
            .optional()?;
        Ok(snapshot)
    }

    fn save_snapshot(&self, snapshot: &mut PortfolioSnapshot) -> Result<i64> {
        if let Some(id) = snapshot.id {
            return Err(LedgerError::Conflict(format!(
                "snapshot {} is already stored and cannot be rewritten",
                id
            )));
        }

        let asset_type_breakdown = serde_json::to_string(&snapshot.asset_type_breakdown)?;
        let sector_breakdown = serde_json::to_string(&snapshot.sector_breakdown)?;

        self.conn.execute(
            "INSERT INTO portfolio_snapshots (
                user_id, snapshot_date, snapshot_type, period,
                total_value, total_cost, total_unrealized_gain, total_realized_gain, total_dividends,
                total_return, total_return_pct, day_change, day_change_pct,
                total_assets, active_assets, asset_type_breakdown, sector_breakdown,
                cash_inflow, cash_outflow, net_cash_flow, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
            params![
                snapshot.user_id,
                snapshot.snapshot_date,
                snapshot.snapshot_type.as_str(),
                snapshot.period.map(|p| p.as_str()),
                snapshot.total_value.to_string(),
                snapshot.total_cost.to_string(),
                snapshot.total_unrealized_gain.to_string(),
                snapshot.total_realized_gain.to_string(),
                snapshot.total_dividends.to_string(),
                snapshot.total_return.to_string(),
                snapshot.total_return_pct.to_string(),
                snapshot.day_change.to_string(),
                snapshot.day_change_pct.to_string(),
                snapshot.total_assets,
                snapshot.active_assets,
                asset_type_breakdown,
                sector_breakdown,
                snapshot.cash_inflow.to_string(),
                snapshot.cash_outflow.to_string(),
                snapshot.net_cash_flow.to_string(),
                snapshot.notes,
                snapshot.created_at,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        snapshot.id = Some(id);
        debug!(snapshot_id = id, user_id = %snapshot.user_id, "saved snapshot");
        Ok(id)
    }

    fn list_snapshots(&self, user_id: &str, limit: usize) -> Result<Vec<PortfolioSnapshot>> {
        let sql = format!(
            "SELECT {} FROM portfolio_snapshots
             WHERE user_id = ?1
             ORDER BY snapshot_date DESC, id DESC
             LIMIT ?2",
            SNAPSHOT_COLUMNS
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&sql)?;
        let snapshots = stmt
            .query_map(params![user_id, limit], row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    fn delete_snapshot(&self, user_id: &str, id: i64) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM portfolio_snapshots WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(LedgerError::NotFound(format!("snapshot {}", id)));
        }
        Ok(())
    }
}
