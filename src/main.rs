use anyhow::Result;
use clap::Parser;
use folio::cli::Cli;
use folio::config::Settings;
use folio::dispatcher::{self, Context};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let settings = Settings::load()?;
    init_tracing(&settings.log_filter);

    let ctx = Context::new(&settings, cli.user, cli.db, cli.json)?;
    dispatcher::dispatch_command(cli.command, &ctx)
}
