//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of ledger calculation from presentation.

use crate::db::models::{JournalEntry, PortfolioSnapshot, Position, PositionStatus};
use crate::portfolio::PortfolioSummary;
use crate::service::PriceUpdateOutcome;
use crate::utils::{format_currency, format_money, format_percent, format_quantity};
use colored::Colorize;
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

fn colored_money(value: Decimal, currency: &str) -> String {
    let text = format_money(value, currency);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn colored_percent(value: Decimal) -> String {
    let text = format_percent(value);
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

fn status_label(status: PositionStatus) -> String {
    match status {
        PositionStatus::Active => status.as_str().green().to_string(),
        PositionStatus::Watchlist => status.as_str().cyan().to_string(),
        PositionStatus::Sold => status.as_str().bright_black().to_string(),
        PositionStatus::Inactive => status.as_str().yellow().to_string(),
    }
}

/// Format positions for terminal table output
pub fn format_positions_table(positions: &[Position]) -> String {
    #[derive(Tabled)]
    struct PositionRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Type")]
        asset_type: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Avg Cost")]
        avg_cost: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Unrealized")]
        unrealized: String,
        #[tabled(rename = "Return %")]
        return_pct: String,
    }

    let rows: Vec<PositionRow> = positions
        .iter()
        .map(|p| {
            let mut status = status_label(p.status);
            if p.is_deleted() {
                status = format!("{} (deleted)", status);
            }
            PositionRow {
                id: p.id.map(|id| id.to_string()).unwrap_or_default(),
                symbol: p.symbol.clone(),
                asset_type: p.asset_type.as_str().to_string(),
                status,
                quantity: format_quantity(p.quantity),
                avg_cost: format_money(p.average_cost_per_unit, &p.currency),
                price: format_money(p.current_price, &p.currency),
                value: format_money(p.current_value, &p.currency),
                unrealized: colored_money(p.unrealized_gain, &p.currency),
                return_pct: colored_percent(p.unrealized_gain_pct),
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    // Right-align the numeric columns
    table.modify(Columns::new(4..), Alignment::right());
    format!("\n{}\n", table)
}

/// Format a single position as a labelled block
pub fn format_position_detail(position: &Position) -> String {
    let cur = position.currency.as_str();
    let mut output = String::new();

    let title = match &position.name {
        Some(name) => format!("{} ({})", position.symbol, name),
        None => position.symbol.clone(),
    };
    output.push_str(&format!(
        "\n{} {}  #{}  {}\n",
        "■".cyan().bold(),
        title.bold(),
        position.id.unwrap_or_default(),
        status_label(position.status)
    ));
    if let Some(deleted_at) = position.deleted_at {
        output.push_str(&format!("{:<22} {}\n", "Deleted:".bold(), deleted_at));
    }

    let lines = [
        ("Type:", position.asset_type.as_str().to_string()),
        (
            "Sector:",
            position.sector.clone().unwrap_or_else(|| "-".to_string()),
        ),
        ("Quantity:", format_quantity(position.quantity)),
        ("Average cost:", format_money(position.average_cost_per_unit, cur)),
        ("Total cost:", format_money(position.total_cost, cur)),
        ("Current price:", format_money(position.current_price, cur)),
        ("Current value:", format_money(position.current_value, cur)),
        (
            "Unrealized gain:",
            format!(
                "{} ({})",
                colored_money(position.unrealized_gain, cur),
                colored_percent(position.unrealized_gain_pct)
            ),
        ),
        (
            "Realized gain:",
            format!(
                "{} ({})",
                colored_money(position.realized_gain, cur),
                colored_percent(position.realized_gain_pct)
            ),
        ),
        ("Dividends:", format_money(position.total_dividends, cur)),
        ("Dividend yield:", format_percent(position.dividend_yield)),
    ];
    for (label, value) in lines {
        output.push_str(&format!("{:<22} {}\n", label.bold(), value));
    }

    if let (Some(amount), Some(date)) = (position.last_dividend_amount, position.last_dividend_date)
    {
        output.push_str(&format!(
            "{:<22} {} on {}\n",
            "Last dividend:".bold(),
            format_money(amount, cur),
            date
        ));
    }
    if let Some(tags) = &position.tags {
        output.push_str(&format!("{:<22} {}\n", "Tags:".bold(), tags));
    }
    if let Some(notes) = &position.notes {
        output.push_str(&format!("{:<22} {}\n", "Notes:".bold(), notes));
    }
    output
}

/// Format a position journal, oldest first
pub fn format_journal_table(entries: &[JournalEntry], replay_matches: bool) -> String {
    #[derive(Tabled)]
    struct JournalRow {
        #[tabled(rename = "Recorded")]
        recorded: String,
        #[tabled(rename = "Event")]
        kind: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Realized")]
        realized: String,
    }

    let dash = || "-".to_string();
    let rows: Vec<JournalRow> = entries
        .iter()
        .map(|e| JournalRow {
            recorded: e.recorded_at.format("%Y-%m-%d %H:%M").to_string(),
            kind: match e.event_date {
                Some(date) => format!("{} ({})", e.kind.as_str(), date),
                None => e.kind.as_str().to_string(),
            },
            quantity: e.quantity.map(format_quantity).unwrap_or_else(dash),
            price: e.price_per_unit.map(format_currency).unwrap_or_else(dash),
            amount: e.amount.map(format_currency).unwrap_or_else(dash),
            realized: e.realized_gain_delta.map(format_currency).unwrap_or_else(dash),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());

    let check = if replay_matches {
        format!("{} journal replay matches stored figures", "✓".green().bold())
    } else {
        format!(
            "{} journal replay differs from stored figures",
            "✗".red().bold()
        )
    };
    format!("\n{}\n{}\n", table, check)
}

/// Format portfolio totals and allocation breakdowns
pub fn format_summary(summary: &PortfolioSummary) -> String {
    let mut output = format!("\n{} Portfolio Summary\n\n", "📊".cyan().bold());

    output.push_str(&format!(
        "{:<20} {} ({} holding units)\n",
        "Positions:".bold(),
        summary.total_assets,
        summary.active_assets
    ));
    output.push_str(&format!(
        "{:<20} {}\n",
        "Total invested:".bold(),
        format_currency(summary.total_invested)
    ));
    output.push_str(&format!(
        "{:<20} {}\n",
        "Total value:".bold(),
        format_currency(summary.total_value)
    ));
    output.push_str(&format!(
        "{:<20} {}\n",
        "Unrealized gain:".bold(),
        colored_money(summary.total_unrealized_gain, "USD")
    ));
    output.push_str(&format!(
        "{:<20} {}\n",
        "Realized gain:".bold(),
        colored_money(summary.total_realized_gain, "USD")
    ));
    output.push_str(&format!(
        "{:<20} {}\n",
        "Dividends:".bold(),
        format_currency(summary.total_dividends)
    ));
    output.push_str(&format!(
        "{:<20} {} ({})\n",
        "Total gain:".bold(),
        colored_money(summary.total_gain, "USD"),
        colored_percent(summary.total_gain_pct)
    ));

    #[derive(Tabled)]
    struct AllocationRow {
        #[tabled(rename = "Group")]
        group: String,
        #[tabled(rename = "Count")]
        count: i64,
        #[tabled(rename = "Cost")]
        cost: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Weight")]
        weight: String,
    }

    let by_type = summary.by_asset_type.iter().map(|(asset_type, a)| AllocationRow {
        group: asset_type.as_str().to_string(),
        count: a.count,
        cost: format_currency(a.cost),
        value: format_currency(a.value),
        weight: format!("{:.2}%", a.percentage),
    });
    let by_sector = summary.by_sector.iter().map(|(sector, a)| AllocationRow {
        group: sector.clone(),
        count: a.count,
        cost: format_currency(a.cost),
        value: format_currency(a.value),
        weight: format!("{:.2}%", a.percentage),
    });

    // a single-currency breakdown repeats the totals above
    let mut by_currency = Vec::new();
    if summary.is_mixed_currency() {
        output.push_str(&format!(
            "\n{} Totals add up amounts in {} currencies without conversion\n",
            "⚠".yellow().bold(),
            summary.by_currency.len()
        ));
        by_currency.extend(summary.by_currency.iter().map(|(currency, a)| AllocationRow {
            group: currency.clone(),
            count: a.count,
            cost: format_money(a.cost, currency),
            value: format_money(a.value, currency),
            weight: format!("{:.2}%", a.percentage),
        }));
    }

    for (title, rows) in [
        ("By asset type", by_type.collect::<Vec<_>>()),
        ("By sector", by_sector.collect::<Vec<_>>()),
        ("By currency", by_currency),
    ] {
        if rows.is_empty() {
            continue;
        }
        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&format!("\n{}\n{}\n", title.bold(), table));
    }

    output
}

/// Format snapshots, newest first
pub fn format_snapshots_table(snapshots: &[PortfolioSnapshot]) -> String {
    #[derive(Tabled)]
    struct SnapshotRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Return")]
        total_return: String,
        #[tabled(rename = "Day Change")]
        day_change: String,
        #[tabled(rename = "Net Cash Flow")]
        net_cash_flow: String,
    }

    let rows: Vec<SnapshotRow> = snapshots
        .iter()
        .map(|s| SnapshotRow {
            id: s.id.map(|id| id.to_string()).unwrap_or_default(),
            date: s.snapshot_date.format("%Y-%m-%d %H:%M").to_string(),
            kind: match s.period {
                Some(period) => format!("{} ({})", s.snapshot_type.as_str(), period.as_str()),
                None => s.snapshot_type.as_str().to_string(),
            },
            value: format_currency(s.total_value),
            total_return: format!(
                "{} ({})",
                colored_money(s.total_return, "USD"),
                colored_percent(s.total_return_pct)
            ),
            day_change: format!(
                "{} ({})",
                colored_money(s.day_change, "USD"),
                colored_percent(s.day_change_pct)
            ),
            net_cash_flow: format_currency(s.net_cash_flow),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(3..), Alignment::right());
    format!("\n{}\n", table)
}

/// Format per-item results of a bulk price update
pub fn format_price_outcomes(outcomes: &[PriceUpdateOutcome]) -> String {
    let mut output = String::new();
    for outcome in outcomes {
        match &outcome.result {
            Ok(position) => output.push_str(&format!(
                "{} {:<10} {}\n",
                "✓".green().bold(),
                outcome.symbol,
                format_money(position.current_price, &position.currency)
            )),
            Err(err) => output.push_str(&format!(
                "{} {:<10} {}\n",
                "✗".red().bold(),
                outcome.symbol,
                err
            )),
        }
    }
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    output.push_str(&format!(
        "\n{} updated, {} failed\n",
        outcomes.len() - failed,
        failed
    ));
    output
}

/// Format empty portfolio message
pub fn format_empty_portfolio() -> String {
    format!(
        "{} No positions found\nOpen one first using: {} position open <symbol> <type> <quantity> <price>\n",
        "ℹ".blue().bold(),
        "folio".bold()
    )
}
