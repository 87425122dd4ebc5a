//! Subcommand handlers. Each prints JSON to stdout.

use std::time::Duration;

use adjunct_core::sync::{
    spawn_periodic_sync, LocalRecordRepositoryTrait, MirroredTable, Record, RemoteBackendTrait,
    SortOrder, SyncStoreTrait,
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::Commands;
use crate::context::AppContext;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parses a JSON object for `insert`.
pub fn parse_record(input: &str) -> Result<Record> {
    match serde_json::from_str::<Value>(input).context("--json is not valid JSON")? {
        Value::Object(record) => Ok(record),
        _ => bail!("--json must be a JSON object"),
    }
}

pub async fn run(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            info!("local store initialized");
            Ok(())
        }
        Commands::Sync => {
            let report = ctx.engine()?.full_sync().await;
            for phase in report.failed_phases() {
                warn!(
                    table = %phase.table,
                    direction = %phase.direction,
                    status = %phase.status,
                    message = phase.message.as_deref().unwrap_or_default(),
                    "sync phase failed"
                );
            }
            print_json(&report)
        }
        Commands::Push { table } => print_json(&ctx.engine()?.push(table).await),
        Commands::Pull { table } => print_json(&ctx.engine()?.pull(table).await),
        Commands::Sweep => {
            let removed = ctx.store.sweep_invalid_keys().await?;
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Commands::Log { limit } => print_json(&ctx.store.fetch_sync_log(limit).await?),
        Commands::LastSuccess { table, direction } => print_json(
            &ctx.store
                .sync_log()
                .last_success(table.table_name(), direction.into())
                .await?,
        ),
        Commands::List {
            table,
            order_by,
            desc,
        } => {
            let rows = match order_by {
                Some(column) => {
                    let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
                    ctx.store.select_all_ordered(table, &column, order).await?
                }
                None => ctx.store.select_all(table).await?,
            };
            print_json(&rows)
        }
        Commands::Get { table, key } => {
            match ctx.store.select_by_key(table, Value::String(key.clone())).await? {
                Some(row) => print_json(&row),
                None => bail!("no live row in {} with key {}", table, key),
            }
        }
        Commands::Insert { table, json } => {
            ctx.store.insert_local(table, parse_record(&json)?).await?;
            info!(%table, "row written and marked pending");
            Ok(())
        }
        Commands::Delete { table, key } => {
            if !ctx.store.delete_local(table, Value::String(key.clone())).await? {
                bail!("no row in {} with key {}", table, key);
            }
            Ok(())
        }
        Commands::RemoteDelete { table, key } => remote_delete(ctx, table, key).await,
        Commands::Watch { interval } => watch(ctx, interval).await,
    }
}

async fn remote_delete(ctx: &AppContext, table: MirroredTable, key: String) -> Result<()> {
    ctx.backend()?
        .delete(table, table.primary_key(), &Value::String(key))
        .await?;
    Ok(())
}

async fn watch(ctx: &AppContext, interval: u64) -> Result<()> {
    let handle = spawn_periodic_sync(ctx.engine()?, Duration::from_secs(interval.max(1)));
    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;
    info!("interrupted, stopping periodic sync");
    handle.abort();
    Ok(())
}
