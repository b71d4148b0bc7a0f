use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Asset classes a position can hold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Stock,
    Etf,
    Bond,
    Crypto,
    Commodity,
    RealEstate,
    Cash,
    Option,
    Future,
    Forex,
    PrivateEquity,
    Other,
}

impl AssetType {
    pub const ALL: [AssetType; 12] = [
        AssetType::Stock,
        AssetType::Etf,
        AssetType::Bond,
        AssetType::Crypto,
        AssetType::Commodity,
        AssetType::RealEstate,
        AssetType::Cash,
        AssetType::Option,
        AssetType::Future,
        AssetType::Forex,
        AssetType::PrivateEquity,
        AssetType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "stock",
            AssetType::Etf => "etf",
            AssetType::Bond => "bond",
            AssetType::Crypto => "crypto",
            AssetType::Commodity => "commodity",
            AssetType::RealEstate => "real_estate",
            AssetType::Cash => "cash",
            AssetType::Option => "option",
            AssetType::Future => "future",
            AssetType::Forex => "forex",
            AssetType::PrivateEquity => "private_equity",
            AssetType::Other => "other",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        AssetType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| LedgerError::Validation(format!("unknown asset type '{}'", s.trim())))
    }
}

/// Business state of a position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Watchlist,
    Active,
    Sold,
    Inactive,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Watchlist => "watchlist",
            PositionStatus::Active => "active",
            PositionStatus::Sold => "sold",
            PositionStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "watchlist" => Ok(PositionStatus::Watchlist),
            "active" => Ok(PositionStatus::Active),
            "sold" => Ok(PositionStatus::Sold),
            "inactive" => Ok(PositionStatus::Inactive),
            other => Err(LedgerError::Validation(format!(
                "unknown position status '{}'",
                other
            ))),
        }
    }
}

/// Risk figures supplied from outside; never derived by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub beta: Option<Decimal>,
    pub volatility: Option<Decimal>,
    pub sharpe_ratio: Option<Decimal>,
    pub max_drawdown: Option<Decimal>,
    pub return_1y: Option<Decimal>,
    pub return_3y: Option<Decimal>,
    pub return_5y: Option<Decimal>,
}

/// Per-user, per-symbol holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Option<i64>,
    pub user_id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub asset_type: AssetType,
    pub sector: Option<String>,
    pub currency: String,
    pub status: PositionStatus,

    pub quantity: Decimal,
    pub average_cost_per_unit: Decimal,
    pub total_cost: Decimal,

    pub current_price: Decimal,
    pub current_value: Decimal,

    pub unrealized_gain: Decimal,
    pub unrealized_gain_pct: Decimal,
    pub realized_gain: Decimal,
    pub realized_gain_pct: Decimal,

    pub total_dividends: Decimal,
    pub dividend_yield: Decimal,
    pub last_dividend_amount: Option<Decimal>,
    pub last_dividend_date: Option<NaiveDate>,

    pub risk: RiskMetrics,

    pub is_watchlist: bool,
    pub notes: Option<String>,
    pub tags: Option<String>,

    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub price_updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Identifier of a persisted position, `NotFound` for one never saved.
    pub fn require_id(&self) -> Result<i64, LedgerError> {
        self.id.ok_or_else(|| {
            LedgerError::NotFound(format!("position {} has not been saved", self.symbol))
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Active, live positions are the only ones counted in valuations.
    pub fn counts_toward_valuation(&self) -> bool {
        self.status == PositionStatus::Active && !self.is_deleted()
    }
}

/// Aggregated value, cost and share of one slice of the portfolio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub value: Decimal,
    pub cost: Decimal,
    pub count: i64,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    Manual,
    Automatic,
    Periodic,
}

impl SnapshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotType::Manual => "manual",
            SnapshotType::Automatic => "automatic",
            SnapshotType::Periodic => "periodic",
        }
    }
}

impl FromStr for SnapshotType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(SnapshotType::Manual),
            "automatic" => Ok(SnapshotType::Automatic),
            "periodic" => Ok(SnapshotType::Periodic),
            other => Err(LedgerError::Validation(format!(
                "unknown snapshot type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl SnapshotPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotPeriod::Daily => "daily",
            SnapshotPeriod::Weekly => "weekly",
            SnapshotPeriod::Monthly => "monthly",
            SnapshotPeriod::Yearly => "yearly",
        }
    }
}

impl FromStr for SnapshotPeriod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(SnapshotPeriod::Daily),
            "weekly" => Ok(SnapshotPeriod::Weekly),
            "monthly" => Ok(SnapshotPeriod::Monthly),
            "yearly" => Ok(SnapshotPeriod::Yearly),
            other => Err(LedgerError::Validation(format!(
                "unknown snapshot period '{}'",
                other
            ))),
        }
    }
}

/// Immutable point-in-time valuation of a user's portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: Option<i64>,
    pub user_id: String,
    pub snapshot_date: DateTime<Utc>,
    pub snapshot_type: SnapshotType,
    pub period: Option<SnapshotPeriod>,

    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub total_unrealized_gain: Decimal,
    pub total_realized_gain: Decimal,
    pub total_dividends: Decimal,

    pub total_return: Decimal,
    pub total_return_pct: Decimal,
    pub day_change: Decimal,
    pub day_change_pct: Decimal,

    pub total_assets: i64,
    pub active_assets: i64,
    pub asset_type_breakdown: BTreeMap<String, Allocation>,
    pub sector_breakdown: BTreeMap<String, Allocation>,

    pub cash_inflow: Decimal,
    pub cash_outflow: Decimal,
    pub net_cash_flow: Decimal,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Kind of a journal row; mirrors the ledger events plus the opening entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Open,
    Buy,
    Sell,
    Dividend,
    PriceUpdate,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Open => "open",
            EntryKind::Buy => "buy",
            EntryKind::Sell => "sell",
            EntryKind::Dividend => "dividend",
            EntryKind::PriceUpdate => "price_update",
        }
    }
}

impl FromStr for EntryKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(EntryKind::Open),
            "buy" => Ok(EntryKind::Buy),
            "sell" => Ok(EntryKind::Sell),
            "dividend" => Ok(EntryKind::Dividend),
            "price_update" => Ok(EntryKind::PriceUpdate),
            other => Err(LedgerError::Validation(format!(
                "unknown journal entry kind '{}'",
                other
            ))),
        }
    }
}

/// One applied ledger event, as recorded alongside the position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Option<i64>,
    pub position_id: Option<i64>,
    pub kind: EntryKind,
    pub quantity: Option<Decimal>,
    pub price_per_unit: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub event_date: Option<NaiveDate>,
    pub realized_gain_delta: Option<Decimal>,
    pub watchlist: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Money moved into and out of the portfolio over a window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSummary {
    pub inflow: Decimal,
    pub outflow: Decimal,
    pub entries: usize,
}

impl CashFlowSummary {
    pub fn net(&self) -> Decimal {
        self.inflow - self.outflow
    }
}
