// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Explorer Node
//!
//! Entry point for the `explorer-node` binary. Parses CLI arguments,
//! initializes logging, connects the indexer, and supervises its status
//! channel while running one command:
//!
//! - `init`        — provision the schema
//! - `ingest`      — save newline-delimited JSON blocks, in order
//! - `block`       — print one block by height, hash, transaction or transition
//! - `search`      — prefix search over ids
//! - `recent`      — print the most recent blocks
//! - `leaderboard` — print the top provers
//! - `version`     — print build version information

mod cli;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use explorer_indexer::chain::{Block, BlockHash, TransactionId, TransitionId};
use explorer_indexer::storage::CoinbaseReward;
use explorer_indexer::{ExplorerDb, FlatReward, StatusChannel, StatusMessage};

use cli::{BlockArgs, Commands, DatabaseArgs, ExplorerCli, SearchArgs, SearchKind};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ExplorerCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Init(args) => {
            with_indexer(&args, FlatReward(0), |db| async move {
                db.initialize_schema().await?;
                println!("Schema ready.");
                Ok(())
            })
            .await
        }
        Commands::Ingest(args) => {
            let input = args.input.clone();
            with_indexer(&args.database, FlatReward(args.coinbase_reward), |db| async move {
                ingest(&db, input.as_deref()).await
            })
            .await
        }
        Commands::Block(args) => {
            with_indexer(&args.database.clone(), FlatReward(0), |db| async move {
                let block = find_block(&db, &args)
                    .await?
                    .context("block not found")?;
                print_json(&block)
            })
            .await
        }
        Commands::Search(args) => {
            with_indexer(&args.database.clone(), FlatReward(0), |db| async move {
                search(&db, &args).await
            })
            .await
        }
        Commands::Recent(args) => {
            with_indexer(&args, FlatReward(0), |db| async move {
                print_json(&db.get_recent_blocks().await?)
            })
            .await
        }
        Commands::Leaderboard(args) => {
            let limit = args.limit;
            with_indexer(&args.database, FlatReward(0), |db| async move {
                print_json(&db.get_leaderboard(limit).await?)
            })
            .await
        }
        Commands::Version => Ok(()),
    }
}

/// Connect, run `command`, then shut the pool down and let the status
/// logger drain.
async fn with_indexer<R, F, Fut>(args: &DatabaseArgs, reward: R, command: F) -> Result<()>
where
    R: CoinbaseReward + 'static,
    F: FnOnce(ExplorerDb) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let status = StatusChannel::default();
    let logger = spawn_status_logger(&status);

    let config = args.to_config();
    let connected = ExplorerDb::connect(&config, status, Arc::new(reward)).await;
    let outcome = match connected {
        Ok(db) => {
            let handle = db.clone();
            let outcome = command(db).await;
            handle.close().await;
            outcome
        }
        Err(e) => Err(anyhow::Error::new(e).context("failed to connect to the explorer database")),
    };

    // Every sender is gone now, so the logger sees `Closed` and exits.
    let _ = logger.await;
    outcome
}

/// Log every status message the indexer emits.
fn spawn_status_logger(status: &StatusChannel) -> JoinHandle<()> {
    let mut rx = status.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(StatusMessage::ConnectFailed(error)) => {
                    tracing::error!(%error, "indexer could not connect");
                }
                Ok(StatusMessage::DatabaseError(error)) => {
                    tracing::error!(%error, "indexer operation failed");
                }
                Ok(message) => tracing::info!(%message, "indexer status"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "status logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Save every block from `input` (or stdin), stopping at the first failure.
async fn ingest(db: &ExplorerDb, input: Option<&Path>) -> Result<()> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut saved = 0usize;
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let block: Block = serde_json::from_str(&line)
            .with_context(|| format!("line {line_no}: not a valid block"))?;
        db.save_block(&block)
            .await
            .with_context(|| format!("line {line_no}: failed to save block {}", block.height()))?;
        saved += 1;
    }

    tracing::info!(saved, "ingest finished");
    println!("Saved {saved} blocks.");
    Ok(())
}

async fn find_block(db: &ExplorerDb, args: &BlockArgs) -> Result<Option<Block>> {
    let key = &args.key;
    let block = if let Some(height) = key.height {
        db.get_block_by_height(height).await?
    } else if let Some(hash) = &key.hash {
        let hash: BlockHash = hash.parse().context("invalid block hash")?;
        db.get_block_by_hash(&hash).await?
    } else if let Some(id) = &key.transaction {
        let id: TransactionId = id.parse().context("invalid transaction id")?;
        db.get_block_from_transaction_id(&id).await?
    } else if let Some(id) = &key.transition {
        let id: TransitionId = id.parse().context("invalid transition id")?;
        db.get_block_from_transition_id(&id).await?
    } else {
        None
    };
    Ok(block)
}

async fn search(db: &ExplorerDb, args: &SearchArgs) -> Result<()> {
    let prefix = args.prefix.as_str();
    match args.kind {
        SearchKind::Block => print_json(&db.search_block_hash(prefix).await?),
        SearchKind::Transaction => print_json(&db.search_transaction_id(prefix).await?),
        SearchKind::Transition => print_json(&db.search_transition_id(prefix).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{json}");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("explorer-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
