#![allow(dead_code)]

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn db_path(home: &TempDir) -> PathBuf {
    home.path().join(".folio").join("data.db")
}

pub fn open_conn(home: &TempDir) -> Result<Connection> {
    let path = db_path(home);
    Connection::open(path).context("failed to open test database")
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}

pub fn journal_kinds(conn: &Connection, position_id: i64) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT kind FROM position_journal WHERE position_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map([position_id], |row| row.get(0))?;
    let mut kinds = Vec::new();
    for row in rows {
        kinds.push(row?);
    }
    Ok(kinds)
}

pub fn stored_version(conn: &Connection, position_id: i64) -> Result<i64> {
    let version = conn.query_row(
        "SELECT version FROM positions WHERE id = ?1",
        [position_id],
        |row| row.get(0),
    )?;
    Ok(version)
}

pub fn open_conn_at(path: &Path) -> Result<Connection> {
    Connection::open(path).context("failed to open test database")
}
