use std::path::PathBuf;

use adjunct_core::sync::{
    MirroredTable, SyncDirection, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_SYNC_LOG_LIMIT,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Offline-first sync for the Adjunct local store
#[derive(Debug, Parser)]
#[command(name = "adjunct-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Path to the local store file
    #[arg(long, global = true, env = "ADJUNCT_DB_PATH", default_value = "app.db")]
    pub db: PathBuf,
}

#[derive(Debug, Args)]
pub struct BackendArgs {
    /// Backend project URL
    #[arg(long, global = true, env = "ADJUNCT_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Backend API key
    #[arg(long, global = true, env = "ADJUNCT_BACKEND_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-call backend timeout in seconds
    #[arg(long, global = true, env = "ADJUNCT_SYNC_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    Push,
    Pull,
}

impl From<DirectionArg> for SyncDirection {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::Push => SyncDirection::Push,
            DirectionArg::Pull => SyncDirection::Pull,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the local tables if missing
    Init,

    /// Initialize, then push and pull every table once
    Sync,

    /// Upload pending rows of one table
    Push {
        #[arg(value_name = "TABLE")]
        table: MirroredTable,
    },

    /// Sweep, then replace local rows of one table with the backend's
    Pull {
        #[arg(value_name = "TABLE")]
        table: MirroredTable,
    },

    /// Delete local rows whose keys have the wrong shape
    Sweep,

    /// Show recent sync log entries, newest first
    Log {
        #[arg(long, default_value_t = DEFAULT_SYNC_LOG_LIMIT)]
        limit: usize,
    },

    /// Show the last successful push or pull of a table
    LastSuccess {
        #[arg(value_name = "TABLE")]
        table: MirroredTable,

        #[arg(value_enum)]
        direction: DirectionArg,
    },

    /// List live rows of a table
    List {
        #[arg(value_name = "TABLE")]
        table: MirroredTable,

        /// Column to order by
        #[arg(long)]
        order_by: Option<String>,

        /// Descending order (with --order-by)
        #[arg(long, requires = "order_by")]
        desc: bool,
    },

    /// Show one row by primary key
    Get {
        #[arg(value_name = "TABLE")]
        table: MirroredTable,

        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Write a row locally and mark it for upload
    Insert {
        #[arg(value_name = "TABLE")]
        table: MirroredTable,

        /// Row as a JSON object
        #[arg(long)]
        json: String,
    },

    /// Tombstone a row locally
    Delete {
        #[arg(value_name = "TABLE")]
        table: MirroredTable,

        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Delete a row on the backend by primary key
    RemoteDelete {
        #[arg(value_name = "TABLE")]
        table: MirroredTable,

        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Sync now and then periodically until interrupted
    Watch {
        /// Seconds between full syncs
        #[arg(long, default_value_t = DEFAULT_SYNC_INTERVAL_SECS)]
        interval: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_table_names() {
        let cli = Cli::try_parse_from(["adjunct-sync", "push", "todos"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Push {
                table: MirroredTable::Todos
            }
        ));
        assert!(Cli::try_parse_from(["adjunct-sync", "push", "accounts"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "adjunct-sync",
            "log",
            "--db",
            "/tmp/other.db",
            "--limit",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.store.db, PathBuf::from("/tmp/other.db"));
        assert!(matches!(cli.command, Commands::Log { limit: 5 }));
    }
}
