use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::db::models::{CashFlowSummary, PortfolioSnapshot, SnapshotPeriod, SnapshotType};
use crate::error::Result;
use crate::ledger::checked;
use crate::portfolio::aggregator::PortfolioSummary;

/// What a snapshot is being taken for
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub user_id: String,
    pub snapshot_type: SnapshotType,
    pub period: Option<SnapshotPeriod>,
    pub notes: Option<String>,
}

impl SnapshotRequest {
    pub fn manual(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            snapshot_type: SnapshotType::Manual,
            period: None,
            notes: None,
        }
    }

    pub fn periodic(user_id: impl Into<String>, period: SnapshotPeriod) -> Self {
        Self {
            user_id: user_id.into(),
            snapshot_type: SnapshotType::Periodic,
            period: Some(period),
            notes: None,
        }
    }
}

/// Build a new snapshot from a summary and the user's previous snapshot.
///
/// The previous snapshot is only read; day change is always measured
/// against it as stored.
pub fn build_snapshot(
    request: &SnapshotRequest,
    summary: &PortfolioSummary,
    previous: Option<&PortfolioSnapshot>,
    cash_flows: &CashFlowSummary,
    now: DateTime<Utc>,
) -> Result<PortfolioSnapshot> {
    let total_return = checked::add(
        "total return",
        summary.total_unrealized_gain,
        summary.total_realized_gain,
    )?;
    let total_return_pct =
        checked::percent_of("total return percentage", total_return, summary.total_invested)?
            .unwrap_or(Decimal::ZERO);

    let (day_change, day_change_pct) = match previous {
        Some(prev) => {
            let change = checked::sub("day change", summary.total_value, prev.total_value)?;
            let pct = checked::percent_of("day change percentage", change, prev.total_value)?
                .unwrap_or(Decimal::ZERO);
            (change, pct)
        }
        None => (Decimal::ZERO, Decimal::ZERO),
    };

    let asset_type_breakdown: BTreeMap<String, _> = summary
        .by_asset_type
        .iter()
        .map(|(asset_type, allocation)| (asset_type.as_str().to_string(), allocation.clone()))
        .collect();

    Ok(PortfolioSnapshot {
        id: None,
        user_id: request.user_id.clone(),
        snapshot_date: now,
        snapshot_type: request.snapshot_type,
        period: request.period,
        total_value: summary.total_value,
        total_cost: summary.total_invested,
        total_unrealized_gain: summary.total_unrealized_gain,
        total_realized_gain: summary.total_realized_gain,
        total_dividends: summary.total_dividends,
        total_return,
        total_return_pct,
        day_change,
        day_change_pct,
        total_assets: summary.total_assets,
        active_assets: summary.active_assets,
        asset_type_breakdown,
        sector_breakdown: summary.by_sector.clone(),
        cash_inflow: cash_flows.inflow,
        cash_outflow: cash_flows.outflow,
        net_cash_flow: cash_flows.net(),
        notes: request.notes.clone(),
        created_at: now,
    })
}
