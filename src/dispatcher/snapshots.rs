use anyhow::{bail, Result};
use colored::Colorize;

use super::{print_json, Context};
use crate::cli::{formatters, SnapshotCommands};
use crate::db::models::{SnapshotPeriod, SnapshotType};
use crate::portfolio::SnapshotRequest;

pub fn dispatch_snapshots(action: SnapshotCommands, ctx: &Context) -> Result<()> {
    let service = ctx.service()?;

    match action {
        SnapshotCommands::Create {
            snapshot_type,
            period,
            notes,
        } => {
            let snapshot_type: SnapshotType = snapshot_type.parse()?;
            let period: Option<SnapshotPeriod> = period.map(|p| p.parse::<SnapshotPeriod>()).transpose()?;
            if snapshot_type == SnapshotType::Periodic && period.is_none() {
                bail!("Periodic snapshots need --period (daily, weekly, monthly or yearly)");
            }

            let request = SnapshotRequest {
                user_id: ctx.user.clone(),
                snapshot_type,
                period,
                notes,
            };
            let snapshot = service.record_snapshot(&request)?;

            if ctx.json {
                print_json(&snapshot)
            } else {
                println!(
                    "{} Snapshot #{} recorded",
                    "✓".green().bold(),
                    snapshot.id.unwrap_or_default()
                );
                print!(
                    "{}",
                    formatters::format_snapshots_table(std::slice::from_ref(&snapshot))
                );
                Ok(())
            }
        }
        SnapshotCommands::List { limit } => {
            let snapshots = service.list_snapshots(&ctx.user, limit)?;
            if ctx.json {
                print_json(&snapshots)
            } else if snapshots.is_empty() {
                println!(
                    "{} No snapshots yet. Record one with: {} snapshot create",
                    "ℹ".blue().bold(),
                    "folio".bold()
                );
                Ok(())
            } else {
                print!("{}", formatters::format_snapshots_table(&snapshots));
                Ok(())
            }
        }
        SnapshotCommands::Delete { id } => {
            service.delete_snapshot(&ctx.user, id)?;
            if ctx.json {
                print_json(&serde_json::json!({ "deleted": id }))
            } else {
                println!("{} Snapshot #{} deleted", "✓".green().bold(), id);
                Ok(())
            }
        }
    }
}
