//! `adjunct-sync`: drives the local store and the sync engine from a shell.

mod cli;
mod commands;
mod context;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::{Cli, Commands};
use crate::context::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init() {
        eprintln!("tracing init failed: {e}");
    }

    let cli = Cli::parse();
    let ctx = AppContext::open(&cli.store, cli.backend).await?;

    // Launch behaviour: a sync failure is logged, never fatal.
    if matches!(cli.command, Commands::Init) {
        match ctx.engine() {
            Ok(engine) => {
                engine.full_sync().await;
            }
            Err(e) => tracing::warn!(error = %e, "skipping startup sync"),
        }
    }

    commands::run(&ctx, cli.command).await
}
