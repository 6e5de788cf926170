//! # Mining Leaderboard
//!
//! `leaderboard` holds one running total per prover address;
//! `leaderboard_log` is the append-only audit trail behind it. Both are
//! written in the same store transaction, so for every address the log
//! rewards always sum to the leaderboard total.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::AnyConnection;
use sqlx::Connection;
use tracing::{debug, info, warn};

use super::db::ExplorerDb;
use super::error::{CodecContext, DbResult};
use crate::chain::codec::{column_to_u32, column_to_u64, u64_to_column};
use crate::chain::Address;

/// Accumulated reward of one prover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub address: Address,
    pub total_reward: u64,
}

/// One reward credited to a prover.
///
/// `partial_solution_id` is `None` for out-of-band credits made through
/// [`ExplorerDb::update_leaderboard`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardLogEntry {
    pub height: u32,
    pub address: Address,
    pub partial_solution_id: Option<i64>,
    pub reward: u64,
}

/// Add `reward` to `address`, creating the entry on first credit.
pub(super) async fn add_reward(
    conn: &mut AnyConnection,
    address: &Address,
    reward: u64,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO leaderboard (address, total_reward) VALUES ($1, $2) \
         ON CONFLICT (address) DO UPDATE \
         SET total_reward = leaderboard.total_reward + excluded.total_reward",
    )
    .bind(address.as_str())
    .bind(u64_to_column("total_reward", reward).column("total_reward")?)
    .execute(conn)
    .await?;
    Ok(())
}

pub(super) async fn append_log(
    conn: &mut AnyConnection,
    height: u32,
    address: &Address,
    partial_solution_id: Option<i64>,
    reward: u64,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO leaderboard_log (height, address, partial_solution_id, reward) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(i64::from(height))
    .bind(address.as_str())
    .bind(partial_solution_id)
    .bind(u64_to_column("reward", reward).column("reward")?)
    .execute(conn)
    .await?;
    Ok(())
}

/// Credit every non-zero reward, logging it without a partial solution.
async fn credit_rewards(
    conn: &mut AnyConnection,
    height: u32,
    rewards: &BTreeMap<Address, u64>,
) -> DbResult<()> {
    for (address, &reward) in rewards.iter().filter(|(_, reward)| **reward > 0) {
        add_reward(conn, address, reward).await?;
        append_log(conn, height, address, None, reward).await?;
    }
    Ok(())
}

fn entry_from_row((address, total_reward): (String, i64)) -> DbResult<LeaderboardEntry> {
    Ok(LeaderboardEntry {
        address: Address::try_from(address).column("address")?,
        total_reward: column_to_u64("total_reward", total_reward).column("total_reward")?,
    })
}

fn log_entry_from_row(
    (height, address, partial_solution_id, reward): (i64, String, Option<i64>, i64),
) -> DbResult<LeaderboardLogEntry> {
    Ok(LeaderboardLogEntry {
        height: column_to_u32("height", height).column("height")?,
        address: Address::try_from(address).column("address")?,
        partial_solution_id,
        reward: column_to_u64("reward", reward).column("reward")?,
    })
}

impl ExplorerDb {
    /// Credit rewards outside of block ingestion (corrections, backfills).
    ///
    /// Every non-zero amount is added to the address's total and logged at
    /// `height` with no partial solution reference, all in one transaction.
    pub async fn update_leaderboard(
        &self,
        height: u32,
        rewards: &BTreeMap<Address, u64>,
    ) -> DbResult<()> {
        let result = self.apply_leaderboard_update(height, rewards).await;
        if result.is_ok() {
            info!(height, addresses = rewards.len(), "leaderboard updated");
        }
        self.report(result)
    }

    async fn apply_leaderboard_update(
        &self,
        height: u32,
        rewards: &BTreeMap<Address, u64>,
    ) -> DbResult<()> {
        let mut conn = self.acquire().await?;
        let mut tx = conn.begin().await?;
        match credit_rewards(&mut tx, height, rewards).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(height, error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Top `limit` provers by total reward, highest first.
    pub async fn get_leaderboard(&self, limit: u32) -> DbResult<Vec<LeaderboardEntry>> {
        let result = self.fetch_leaderboard(limit).await;
        self.report(result)
    }

    async fn fetch_leaderboard(&self, limit: u32) -> DbResult<Vec<LeaderboardEntry>> {
        let mut conn = self.acquire().await?;
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT address, total_reward FROM leaderboard \
             ORDER BY total_reward DESC, address ASC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;
        debug!(limit, rows = rows.len(), "leaderboard read");
        rows.into_iter().map(entry_from_row).collect()
    }

    /// Total reward of one prover; `None` if it was never credited.
    pub async fn get_leaderboard_reward(&self, address: &Address) -> DbResult<Option<u64>> {
        let result = self.fetch_leaderboard_reward(address).await;
        self.report(result)
    }

    async fn fetch_leaderboard_reward(&self, address: &Address) -> DbResult<Option<u64>> {
        let mut conn = self.acquire().await?;
        let total: Option<i64> =
            sqlx::query_scalar("SELECT total_reward FROM leaderboard WHERE address = $1")
                .bind(address.as_str())
                .fetch_optional(&mut *conn)
                .await?;
        match total {
            Some(total) => Ok(Some(
                column_to_u64("total_reward", total).column("total_reward")?,
            )),
            None => Ok(None),
        }
    }

    /// Audit trail of one prover in credit order.
    pub async fn get_leaderboard_log(
        &self,
        address: &Address,
    ) -> DbResult<Vec<LeaderboardLogEntry>> {
        let result = self.fetch_leaderboard_log(address).await;
        self.report(result)
    }

    async fn fetch_leaderboard_log(&self, address: &Address) -> DbResult<Vec<LeaderboardLogEntry>> {
        let mut conn = self.acquire().await?;
        let rows: Vec<(i64, String, Option<i64>, i64)> = sqlx::query_as(
            "SELECT height, address, partial_solution_id, reward FROM leaderboard_log \
             WHERE address = $1 ORDER BY id ASC",
        )
        .bind(address.as_str())
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(log_entry_from_row).collect()
    }
}
