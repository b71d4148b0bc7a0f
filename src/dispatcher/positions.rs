use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use colored::Colorize;
use serde::Serialize;

use super::{parse_decimal, print_json, Context};
use crate::cli::formatters;
use crate::cli::PositionCommands;
use crate::db::models::{AssetType, JournalEntry, Position, PositionStatus};
use crate::db::PositionStore;
use crate::ledger::OpenPosition;
use crate::utils::format_money;

pub fn dispatch_positions(action: PositionCommands, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;

    match action {
        PositionCommands::Open {
            symbol,
            asset_type,
            quantity,
            price,
            watchlist,
            name,
            sector,
            currency,
            notes,
            tags,
        } => {
            let asset_type: AssetType = asset_type.parse()?;
            let mut request = OpenPosition::new(
                ctx.user.clone(),
                symbol,
                asset_type,
                parse_decimal("quantity", &quantity)?,
                parse_decimal("price", &price)?,
            );
            request.is_watchlist = watchlist;
            request.name = name;
            request.sector = sector;
            request.currency = Some(currency.unwrap_or_else(|| ctx.base_currency.clone()));
            request.notes = notes;
            request.tags = tags;

            let position = service.open_position(&request)?;
            report(ctx, &position, "Opened")
        }
        PositionCommands::Buy {
            id,
            quantity,
            price,
        } => {
            let position = service.buy(
                id,
                parse_decimal("quantity", &quantity)?,
                parse_decimal("price", &price)?,
            )?;
            report(ctx, &position, "Bought")
        }
        PositionCommands::Sell {
            id,
            quantity,
            price,
        } => {
            let (position, sale) = service.sell_with_breakdown(
                id,
                parse_decimal("quantity", &quantity)?,
                parse_decimal("price", &price)?,
            )?;
            if !ctx.json {
                println!(
                    "{} Realized {} on this sale",
                    "ℹ".blue().bold(),
                    format_money(sale.realized_gain_delta, &position.currency)
                );
            }
            report(ctx, &position, "Sold")
        }
        PositionCommands::Dividend { id, amount, date } => {
            let date = date
                .map(|d| {
                    NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
                        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", d))
                })
                .transpose()?;
            let position = service.add_dividend(id, parse_decimal("amount", &amount)?, date)?;
            report(ctx, &position, "Dividend recorded for")
        }
        PositionCommands::Price { id, price } => {
            let position = service.update_price(id, parse_decimal("price", &price)?)?;
            report(ctx, &position, "Price updated for")
        }
        PositionCommands::Status { id, status } => {
            let status: PositionStatus = status.parse()?;
            let position = service.change_status(id, status)?;
            report(ctx, &position, "Status changed for")
        }
        PositionCommands::Delete { id } => {
            let position = service.delete_position(id)?;
            report(ctx, &position, "Deleted")
        }
        PositionCommands::Show { id } => {
            let position = service.get_position(id)?;
            if ctx.json {
                print_json(&position)
            } else {
                print!("{}", formatters::format_position_detail(&position));
                Ok(())
            }
        }
        PositionCommands::List { all } => {
            let positions = service.list_positions(&ctx.user, all)?;
            if ctx.json {
                print_json(&positions)
            } else if positions.is_empty() {
                print!("{}", formatters::format_empty_portfolio());
                Ok(())
            } else {
                print!("{}", formatters::format_positions_table(&positions));
                Ok(())
            }
        }
        PositionCommands::History { id } => {
            let entries = service.history(id)?;
            let stored = service.store().load_position(id)?;
            let replayed = service.replay_position(id)?;
            let replay_matches = same_ledger_figures(&stored, &replayed);

            if ctx.json {
                #[derive(Serialize)]
                struct HistoryJson<'a> {
                    position_id: i64,
                    entries: &'a [JournalEntry],
                    replay_matches: bool,
                }
                print_json(&HistoryJson {
                    position_id: id,
                    entries: &entries,
                    replay_matches,
                })
            } else {
                print!("{}", formatters::format_journal_table(&entries, replay_matches));
                Ok(())
            }
        }
    }
}

/// Ledger figures a journal replay must reproduce
fn same_ledger_figures(stored: &Position, replayed: &Position) -> bool {
    stored.quantity == replayed.quantity
        && stored.total_cost == replayed.total_cost
        && stored.average_cost_per_unit == replayed.average_cost_per_unit
        && stored.realized_gain == replayed.realized_gain
        && stored.total_dividends == replayed.total_dividends
        && stored.current_price == replayed.current_price
}

fn report(ctx: &Context, position: &Position, verb: &str) -> Result<()> {
    if ctx.json {
        return print_json(position);
    }
    println!(
        "{} {} {} (#{})",
        "✓".green().bold(),
        verb,
        position.symbol.bold(),
        position.id.unwrap_or_default()
    );
    print!("{}", formatters::format_position_detail(position));
    Ok(())
}
