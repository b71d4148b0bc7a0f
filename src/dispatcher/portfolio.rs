use anyhow::Result;

use super::{print_json, Context};
use crate::cli::{formatters, PortfolioCommands};

pub fn dispatch_portfolio(action: PortfolioCommands, ctx: &Context) -> Result<()> {
    match action {
        PortfolioCommands::Summary => {
            tracing::info!("Building portfolio summary for {}", ctx.user);

            let service = ctx.service()?;
            let summary = service.summary(&ctx.user)?;

            if ctx.json {
                print_json(&summary)
            } else if summary.total_assets == 0 {
                print!("{}", formatters::format_empty_portfolio());
                Ok(())
            } else {
                print!("{}", formatters::format_summary(&summary));
                Ok(())
            }
        }
    }
}
