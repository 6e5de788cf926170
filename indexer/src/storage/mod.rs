//! # Storage Layer
//!
//! Everything that touches the relational store goes through
//! [`ExplorerDb`]:
//!
//! - `schema` — table layout and per-dialect DDL.
//! - `ingest` — atomic `save_block`.
//! - `reconstruct` — row-to-block reassembly.
//! - `query` — point lookups, ranges, prefix search.
//! - `leaderboard` — prover rewards and their audit log.
//! - `reward` — coinbase reward split across partial solutions.
//! - `status` — outbound status notifications.

pub mod db;
pub mod error;
mod ingest;
pub mod leaderboard;
mod query;
mod reconstruct;
pub mod reward;
pub mod schema;
pub mod status;

pub use db::ExplorerDb;
pub use error::{DbError, DbResult};
pub use leaderboard::{LeaderboardEntry, LeaderboardLogEntry};
pub use reward::{split_coinbase_reward, CoinbaseReward, FlatReward, RewardError, SolutionReward};
pub use schema::Dialect;
pub use status::{StatusChannel, StatusMessage};
