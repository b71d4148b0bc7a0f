// Database module - SQLite connection, schema and decimal helpers

pub mod models;
pub mod store;

use anyhow::{Context, Result};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub use models::{
    Allocation, AssetType, CashFlowSummary, EntryKind, JournalEntry, PortfolioSnapshot, Position,
    PositionStatus, RiskMetrics, SnapshotPeriod, SnapshotType,
};
pub use store::{PositionStore, SqliteStore};

pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Get the default database path (~/.folio/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".folio").join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create directory {:?}", parent))?;
    }
    let conn =
        Connection::open(db_path).context(format!("Failed to open database at {:?}", db_path))?;
    configure(&conn).context("Failed to configure database connection")?;
    Ok(conn)
}

/// Connection settings shared by file and in-memory databases
pub(crate) fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.busy_timeout(Duration::from_secs(5))
}

/// Apply the schema. Every statement is idempotent.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

/// Initialize the database with schema
///
/// Creates the database file when missing and runs the schema SQL
/// to set up all tables, indexes and triggers.
pub fn init_database(db_path: &Path) -> Result<()> {
    info!("Initializing database at: {:?}", db_path);

    let conn = open_db(db_path)?;
    apply_schema(&conn).context("Failed to execute schema")?;

    info!("Database initialized successfully");
    Ok(())
}

fn decimal_conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// Helper to read Decimal from SQLite (handles INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    get_optional_decimal_value(row, idx)?.ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(idx, "decimal".to_string(), rusqlite::types::Type::Null)
    })
}

/// Helper to read optional Decimal from SQLite
pub fn get_optional_decimal_value(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<Decimal>, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes).map_err(|e| decimal_conversion_error(idx, e))?;
            Decimal::from_str(s)
                .map(Some)
                .map_err(|e| decimal_conversion_error(idx, e))
        }
        ValueRef::Integer(i) => Ok(Some(Decimal::from(i))),
        ValueRef::Real(f) => Decimal::try_from(f)
            .map(Some)
            .map_err(|e| decimal_conversion_error(idx, e)),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Blob,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_reader_accepts_sqlite_affinities() {
        let conn = Connection::open_in_memory().unwrap();
        let row: (Decimal, Decimal, Decimal, Option<Decimal>) = conn
            .query_row("SELECT '103.3333', 42, 1.5, NULL", [], |row| {
                Ok((
                    get_decimal_value(row, 0)?,
                    get_decimal_value(row, 1)?,
                    get_decimal_value(row, 2)?,
                    get_optional_decimal_value(row, 3)?,
                ))
            })
            .unwrap();
        assert_eq!(row.0, dec!(103.3333));
        assert_eq!(row.1, dec!(42));
        assert_eq!(row.2, dec!(1.5));
        assert_eq!(row.3, None);
    }

    #[test]
    fn test_decimal_reader_rejects_null_and_garbage() {
        let conn = Connection::open_in_memory().unwrap();
        let null = conn.query_row("SELECT NULL", [], |row| get_decimal_value(row, 0));
        assert!(null.is_err());
        let garbage = conn.query_row("SELECT 'abc'", [], |row| get_decimal_value(row, 0));
        assert!(garbage.is_err());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        apply_schema(&conn).unwrap();
    }

    #[test]
    fn test_init_database_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.db");
        init_database(&path).unwrap();
        assert!(path.exists());
    }
}
