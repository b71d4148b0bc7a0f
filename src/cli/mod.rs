use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Investment position ledger and portfolio tracker")]
#[command(
    long_about = "Track holdings with weighted-average cost basis, realized and unrealized gains, dividends, and point-in-time portfolio snapshots."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// User whose ledger to operate on (defaults to the configured user)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// SQLite database file (overrides config and FOLIO_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and schema
    Init,

    /// Open, trade and inspect positions
    Position {
        #[command(subcommand)]
        action: PositionCommands,
    },

    /// Price data management
    Prices {
        #[command(subcommand)]
        action: PriceCommands,
    },

    /// Portfolio valuation
    Portfolio {
        #[command(subcommand)]
        action: PortfolioCommands,
    },

    /// Point-in-time portfolio snapshots
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommands,
    },
}

#[derive(Subcommand)]
pub enum PositionCommands {
    /// Open a new position (quantity 0 with --watchlist tracks without holding)
    Open {
        /// Ticker symbol (e.g., AAPL)
        symbol: String,

        /// Asset type: stock, etf, mutual_fund, bond, crypto, reit, option, commodity, real_estate, private_equity, cash, other
        asset_type: String,

        /// Units acquired
        quantity: String,

        /// Price per unit
        price: String,

        /// Track on the watchlist
        #[arg(short, long)]
        watchlist: bool,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Sector for the portfolio breakdown
        #[arg(long)]
        sector: Option<String>,

        /// ISO currency code (defaults to the configured base currency)
        #[arg(long)]
        currency: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Buy more units at a price
    Buy {
        id: i64,
        quantity: String,
        price: String,
    },

    /// Sell units at a price
    Sell {
        id: i64,
        quantity: String,
        price: String,
    },

    /// Record a cash dividend
    Dividend {
        id: i64,
        amount: String,

        /// Payment date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Mark a position to a new market price
    Price { id: i64, price: String },

    /// Switch a position between active and inactive
    Status { id: i64, status: String },

    /// Soft-delete a position
    Delete { id: i64 },

    /// Show one position
    Show { id: i64 },

    /// List positions
    List {
        /// Include deleted positions
        #[arg(short, long)]
        all: bool,
    },

    /// Show the event journal of a position
    History { id: i64 },
}

#[derive(Subcommand)]
pub enum PriceCommands {
    /// Update prices from a CSV file with `symbol,price` columns
    Import {
        /// Path to the CSV file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum PortfolioCommands {
    /// Totals and allocation breakdowns of active positions
    Summary,
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Record a snapshot of the portfolio as of now
    Create {
        /// Snapshot type: manual, automatic or periodic
        #[arg(long = "type", default_value = "manual")]
        snapshot_type: String,

        /// Period for periodic snapshots: daily, weekly, monthly or yearly
        #[arg(long)]
        period: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List recorded snapshots, newest first
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Delete a snapshot
    Delete { id: i64 },
}
