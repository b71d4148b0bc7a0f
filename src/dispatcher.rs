//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Every handler opens its own store on the configured database, runs one
//! service call and prints either a table or JSON.

mod portfolio;
mod positions;
mod prices;
mod snapshots;

use crate::cli::Commands;
use crate::clock::SystemClock;
use crate::config::Settings;
use crate::db::{self, SqliteStore};
use crate::service::LedgerService;
use anyhow::{Context as _, Result};
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

pub type Service = LedgerService<SqliteStore, SystemClock>;

/// Resolved invocation settings shared by all handlers
pub struct Context {
    pub user: String,
    pub db_path: PathBuf,
    pub base_currency: String,
    pub json: bool,
}

impl Context {
    pub fn new(settings: &Settings, user: Option<String>, db: Option<PathBuf>, json: bool) -> Result<Self> {
        let db_path = match db {
            Some(path) => path,
            None => settings.database_path()?,
        };
        let user = user
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| settings.default_user.clone());
        Ok(Self {
            user,
            db_path,
            base_currency: settings.base_currency.clone(),
            json,
        })
    }

    /// Open the ledger service on the configured database
    pub fn service(&self) -> Result<Service> {
        let conn = db::open_db(&self.db_path)?;
        let store = SqliteStore::new(conn)
            .with_context(|| format!("Failed to prepare database at {:?}", self.db_path))?;
        Ok(LedgerService::new(store, SystemClock))
    }
}

/// Route a parsed command to its handler
pub fn dispatch_command(command: Commands, ctx: &Context) -> Result<()> {
    match command {
        Commands::Init => dispatch_init(ctx),
        Commands::Position { action } => positions::dispatch_positions(action, ctx),
        Commands::Prices { action } => prices::dispatch_prices(action, ctx),
        Commands::Portfolio { action } => portfolio::dispatch_portfolio(action, ctx),
        Commands::Snapshot { action } => snapshots::dispatch_snapshots(action, ctx),
    }
}

fn dispatch_init(ctx: &Context) -> Result<()> {
    db::init_database(&ctx.db_path)?;
    info!("Database ready at {:?}", ctx.db_path);
    if ctx.json {
        print_json(&serde_json::json!({ "database": ctx.db_path }))
    } else {
        println!(
            "{} Database initialized at {}",
            "✓".green().bold(),
            ctx.db_path.display()
        );
        Ok(())
    }
}

/// Parse a decimal argument, naming it in the error
pub(crate) fn parse_decimal(label: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .with_context(|| format!("Invalid {} '{}': expected a decimal number", label, value))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
