//! # CLI Interface
//!
//! Defines the command-line argument structure for `explorer-node` using
//! `clap` derive. Every database setting can also come from an
//! `EXPLORER_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use explorer_indexer::config::{
    DatabaseConfig, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_CONNECTIONS,
};

use crate::logging::LogFormat;

/// Block explorer indexer.
///
/// Persists validated blocks into a relational store and reads them back.
#[derive(Parser, Debug)]
#[command(
    name = "explorer-node",
    about = "Block explorer indexer",
    version,
    propagate_version = true
)]
pub struct ExplorerCli {
    /// Log output format.
    #[arg(long, global = true, env = "EXPLORER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(
        long,
        global = true,
        env = "EXPLORER_LOG_LEVEL",
        default_value = "explorer_node=info,explorer_indexer=info"
    )]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the explorer tables and indexes if they do not exist.
    Init(DatabaseArgs),
    /// Save newline-delimited JSON blocks in order, stopping at the first
    /// failure.
    Ingest(IngestArgs),
    /// Print one reconstructed block as JSON.
    Block(BlockArgs),
    /// Prefix search over block hashes, transaction ids or transition ids.
    Search(SearchArgs),
    /// Print the most recent blocks as JSON, highest first.
    Recent(DatabaseArgs),
    /// Print the top provers by accumulated reward.
    Leaderboard(LeaderboardArgs),
    /// Print version information and exit.
    Version,
}

/// Connection settings shared by every database command.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Database URL: `postgres://...` or `sqlite://...`.
    #[arg(long, env = "EXPLORER_DATABASE_URL")]
    pub database_url: String,

    /// Postgres schema to put on the search path.
    #[arg(long, env = "EXPLORER_DATABASE_SCHEMA")]
    pub database_schema: Option<String>,

    /// Connections kept open while idle.
    #[arg(long, env = "EXPLORER_MIN_CONNECTIONS", default_value_t = DEFAULT_MIN_CONNECTIONS)]
    pub min_connections: u32,

    /// Maximum pooled connections.
    #[arg(long, env = "EXPLORER_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection.
    #[arg(long, env = "EXPLORER_ACQUIRE_TIMEOUT_SECS", default_value_t = DEFAULT_ACQUIRE_TIMEOUT.as_secs())]
    pub acquire_timeout_secs: u64,
}

impl DatabaseArgs {
    pub fn to_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database_url.clone(),
            schema: self.database_schema.clone(),
            min_connections: self.min_connections,
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }
}

/// Arguments for the `ingest` subcommand.
#[derive(Args, Debug)]
pub struct IngestArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// File of JSON blocks, one per line. Reads stdin when omitted.
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Flat coinbase reward credited per coinbase block.
    #[arg(long, env = "EXPLORER_COINBASE_REWARD", default_value_t = 0)]
    pub coinbase_reward: u64,
}

/// Arguments for the `block` subcommand.
#[derive(Args, Debug)]
pub struct BlockArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub key: BlockKey,
}

/// Exactly one way of locating a block.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct BlockKey {
    #[arg(long)]
    pub height: Option<u32>,

    #[arg(long)]
    pub hash: Option<String>,

    /// Id of a transaction inside the block.
    #[arg(long)]
    pub transaction: Option<String>,

    /// Id of a transition inside the block.
    #[arg(long)]
    pub transition: Option<String>,
}

/// Identifier kinds that support prefix search.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Block,
    Transaction,
    Transition,
}

/// Arguments for the `search` subcommand.
#[derive(Args, Debug)]
pub struct SearchArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// What to search.
    #[arg(value_enum)]
    pub kind: SearchKind,

    /// Case-sensitive prefix.
    pub prefix: String,
}

/// Arguments for the `leaderboard` subcommand.
#[derive(Args, Debug)]
pub struct LeaderboardArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Number of provers to show.
    #[arg(long, default_value_t = 50)]
    pub limit: u32,
}
