use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::models::{AssetType, EntryKind, JournalEntry};
use crate::error::{LedgerError, Result};

/// Parameters for opening a new position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub user_id: String,
    pub symbol: String,
    pub asset_type: AssetType,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub is_watchlist: bool,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
}

impl OpenPosition {
    pub fn new(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        asset_type: AssetType,
        quantity: Decimal,
        price_per_unit: Decimal,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            symbol: symbol.into(),
            asset_type,
            quantity,
            price_per_unit,
            is_watchlist: false,
            name: None,
            sector: None,
            currency: None,
            notes: None,
            tags: None,
        }
    }

    /// Zero-quantity watchlist entry tracking `symbol` at `price_per_unit`
    pub fn watchlist(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        asset_type: AssetType,
        price_per_unit: Decimal,
    ) -> Self {
        Self {
            is_watchlist: true,
            ..Self::new(user_id, symbol, asset_type, Decimal::ZERO, price_per_unit)
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Journal row recording this opening
    pub fn journal_entry(&self, now: DateTime<Utc>) -> JournalEntry {
        JournalEntry {
            id: None,
            position_id: None,
            kind: EntryKind::Open,
            quantity: Some(self.quantity),
            price_per_unit: Some(self.price_per_unit),
            amount: self.quantity.checked_mul(self.price_per_unit),
            event_date: None,
            realized_gain_delta: None,
            watchlist: self.is_watchlist,
            recorded_at: now,
        }
    }
}

/// Mutating events a position accepts after it is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PositionEvent {
    Buy {
        quantity: Decimal,
        price_per_unit: Decimal,
    },
    Sell {
        quantity: Decimal,
        price_per_unit: Decimal,
    },
    Dividend {
        amount: Decimal,
        date: NaiveDate,
    },
    PriceUpdate {
        price: Decimal,
    },
}

impl PositionEvent {
    pub fn kind(&self) -> EntryKind {
        match self {
            PositionEvent::Buy { .. } => EntryKind::Buy,
            PositionEvent::Sell { .. } => EntryKind::Sell,
            PositionEvent::Dividend { .. } => EntryKind::Dividend,
            PositionEvent::PriceUpdate { .. } => EntryKind::PriceUpdate,
        }
    }

    /// Journal row for this event. `realized_gain_delta` is only kept for sells.
    pub fn journal_entry(
        &self,
        position_id: Option<i64>,
        realized_gain_delta: Decimal,
        now: DateTime<Utc>,
    ) -> JournalEntry {
        let mut entry = JournalEntry {
            id: None,
            position_id,
            kind: self.kind(),
            quantity: None,
            price_per_unit: None,
            amount: None,
            event_date: None,
            realized_gain_delta: None,
            watchlist: false,
            recorded_at: now,
        };

        match *self {
            PositionEvent::Buy {
                quantity,
                price_per_unit,
            } => {
                entry.quantity = Some(quantity);
                entry.price_per_unit = Some(price_per_unit);
                entry.amount = quantity.checked_mul(price_per_unit);
            }
            PositionEvent::Sell {
                quantity,
                price_per_unit,
            } => {
                entry.quantity = Some(quantity);
                entry.price_per_unit = Some(price_per_unit);
                entry.amount = quantity.checked_mul(price_per_unit);
                entry.realized_gain_delta = Some(realized_gain_delta);
            }
            PositionEvent::Dividend { amount, date } => {
                entry.amount = Some(amount);
                entry.event_date = Some(date);
            }
            PositionEvent::PriceUpdate { price } => {
                entry.price_per_unit = Some(price);
            }
        }

        entry
    }

    /// Rebuild the event a journal row was recorded from.
    /// Opening rows have no event form and are rejected.
    pub fn from_journal(entry: &JournalEntry) -> Result<Self> {
        let missing = |field: &str| {
            LedgerError::Validation(format!(
                "journal entry {:?} ({}) is missing {}",
                entry.id,
                entry.kind.as_str(),
                field
            ))
        };

        match entry.kind {
            EntryKind::Open => Err(LedgerError::Validation(
                "opening entries cannot be replayed as events".to_string(),
            )),
            EntryKind::Buy => Ok(PositionEvent::Buy {
                quantity: entry.quantity.ok_or_else(|| missing("quantity"))?,
                price_per_unit: entry.price_per_unit.ok_or_else(|| missing("price"))?,
            }),
            EntryKind::Sell => Ok(PositionEvent::Sell {
                quantity: entry.quantity.ok_or_else(|| missing("quantity"))?,
                price_per_unit: entry.price_per_unit.ok_or_else(|| missing("price"))?,
            }),
            EntryKind::Dividend => Ok(PositionEvent::Dividend {
                amount: entry.amount.ok_or_else(|| missing("amount"))?,
                date: entry.event_date.ok_or_else(|| missing("date"))?,
            }),
            EntryKind::PriceUpdate => Ok(PositionEvent::PriceUpdate {
                price: entry.price_per_unit.ok_or_else(|| missing("price"))?,
            }),
        }
    }
}
