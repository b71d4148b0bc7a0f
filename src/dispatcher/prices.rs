use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use super::{print_json, Context};
use crate::cli::{formatters, PriceCommands};
use crate::importers::{self, SkippedRow};

pub fn dispatch_prices(action: PriceCommands, ctx: &Context) -> Result<()> {
    match action {
        PriceCommands::Import { file } => {
            tracing::info!("Importing prices from {:?}", file);

            let parsed = importers::parse_price_csv(&file)?;
            let service = ctx.service()?;
            let outcomes = service.bulk_update_prices(&ctx.user, &parsed.quotes);

            if ctx.json {
                #[derive(Serialize)]
                struct OutcomeJson {
                    symbol: String,
                    position_id: Option<i64>,
                    ok: bool,
                    price: Option<rust_decimal::Decimal>,
                    error: Option<String>,
                }
                #[derive(Serialize)]
                struct SkippedJson<'a> {
                    line: usize,
                    reason: &'a str,
                }
                #[derive(Serialize)]
                struct ImportJson<'a> {
                    results: Vec<OutcomeJson>,
                    skipped: Vec<SkippedJson<'a>>,
                }

                let results = outcomes
                    .iter()
                    .map(|o| OutcomeJson {
                        symbol: o.symbol.clone(),
                        position_id: o.position_id,
                        ok: o.is_ok(),
                        price: o.result.as_ref().ok().map(|p| p.current_price),
                        error: o.result.as_ref().err().map(|e| e.to_string()),
                    })
                    .collect();
                let skipped = parsed
                    .skipped
                    .iter()
                    .map(|s: &SkippedRow| SkippedJson {
                        line: s.line,
                        reason: &s.reason,
                    })
                    .collect();
                return print_json(&ImportJson { results, skipped });
            }

            for row in &parsed.skipped {
                println!(
                    "{} line {}: {}",
                    "⚠".yellow().bold(),
                    row.line,
                    row.reason
                );
            }
            print!("{}", formatters::format_price_outcomes(&outcomes));
            Ok(())
        }
    }
}
