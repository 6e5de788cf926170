// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Explorer Indexer — Core Library
//!
//! The persistence boundary between a node's validated block stream and
//! whatever explorer or API sits downstream. Blocks come in fully formed
//! and already verified; this crate decomposes them into a normalized
//! relational schema inside one transaction, and puts them back together
//! again on the way out.
//!
//! ## Architecture
//!
//! - **chain** — The block object graph and the column codec for its
//!   value types (bech32 ids, field elements, proofs, ciphertexts).
//! - **storage** — Schema mapper, ingestion, reconstruction, queries,
//!   the mining leaderboard, and the status channel.
//! - **config** — Pool sizing and protocol constants.
//!
//! ## Ground Rules
//!
//! 1. A block lands completely or not at all.
//! 2. Variants we recognize but do not model abort the operation. Nothing
//!    is dropped on the floor, because a silently skipped transition is a
//!    leaderboard bug waiting to happen.
//! 3. Ordinal columns decide order on the read path, never row order.
//! 4. Legitimate absence is `Ok(None)`, not an error.

pub mod chain;
pub mod config;
pub mod storage;

pub use chain::{Block, BlockHeader, Transaction};
pub use config::DatabaseConfig;
pub use storage::{
    CoinbaseReward, DbError, DbResult, ExplorerDb, FlatReward, StatusChannel, StatusMessage,
};
