//! # Query Service
//!
//! Point lookups, range scans and prefix search. Absence is `Ok(None)` or
//! an empty list; every error is also reported on the status channel.
//!
//! | Lookup                          | Returns                  |
//! |---------------------------------|--------------------------|
//! | height / hash / tx / transition | full [`Block`]           |
//! | header by height / hash         | [`BlockHeader`] only     |
//! | range, recent                   | blocks, highest first    |
//! | search_*                        | matching ids, unordered  |

use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::Any;
use tracing::debug;

use super::db::ExplorerDb;
use super::error::{CodecContext, DbResult};
use super::reconstruct::{block_range, full_block, select_block, BlockRow};
use crate::chain::codec::column_to_u32;
use crate::chain::{Block, BlockHash, BlockHeader, CodecError, TransactionId, TransitionId};
use crate::config::RECENT_BLOCKS_WINDOW;

type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

impl ExplorerDb {
    // -----------------------------------------------------------------------
    // Latest
    // -----------------------------------------------------------------------

    /// Height of the highest stored block; `None` on an empty store.
    pub async fn get_latest_height(&self) -> DbResult<Option<u32>> {
        let result = self.latest_height().await;
        self.report(result)
    }

    async fn latest_height(&self) -> DbResult<Option<u32>> {
        let mut conn = self.acquire().await?;
        let height: Option<i64> =
            sqlx::query_scalar("SELECT height FROM block ORDER BY height DESC LIMIT 1")
                .fetch_optional(&mut *conn)
                .await?;
        match height {
            Some(height) => Ok(Some(column_to_u32("height", height).column("height")?)),
            None => Ok(None),
        }
    }

    pub async fn get_latest_block(&self) -> DbResult<Option<Block>> {
        let query = sqlx::query(select_block!("ORDER BY height DESC LIMIT 1"));
        let result = self.block_by(query).await;
        self.report(result)
    }

    // -----------------------------------------------------------------------
    // Point lookups
    // -----------------------------------------------------------------------

    pub async fn get_block_by_height(&self, height: u32) -> DbResult<Option<Block>> {
        debug!(height, "block by height");
        let query = sqlx::query(select_block!("WHERE height = $1")).bind(i64::from(height));
        let result = self.block_by(query).await;
        self.report(result)
    }

    pub async fn get_block_by_hash(&self, hash: &BlockHash) -> DbResult<Option<Block>> {
        debug!(%hash, "block by hash");
        let query = sqlx::query(select_block!("WHERE block_hash = $1")).bind(hash.as_str());
        let result = self.block_by(query).await;
        self.report(result)
    }

    /// The block that contains transaction `id`.
    pub async fn get_block_from_transaction_id(
        &self,
        id: &TransactionId,
    ) -> DbResult<Option<Block>> {
        debug!(%id, "block by transaction id");
        let query = sqlx::query(select_block!(
            "WHERE id IN (SELECT block_id FROM block_transaction WHERE transaction_id = $1) \
             ORDER BY height LIMIT 1"
        ))
        .bind(id.as_str());
        let result = self.block_by(query).await;
        self.report(result)
    }

    /// The block that contains transition `id`, reached through either its
    /// execution or a fee record.
    pub async fn get_block_from_transition_id(
        &self,
        id: &TransitionId,
    ) -> DbResult<Option<Block>> {
        debug!(%id, "block by transition id");
        let query = sqlx::query(select_block!(
            "WHERE id IN ( \
                 SELECT bt.block_id FROM transition tr \
                 JOIN transaction_execute te ON te.id = tr.transaction_execute_id \
                 JOIN block_transaction bt ON bt.id = te.transaction_id \
                 WHERE tr.transition_id = $1 \
                 UNION \
                 SELECT bt.block_id FROM transition tr \
                 JOIN fee f ON f.id = tr.fee_id \
                 JOIN block_transaction bt ON bt.id = f.transaction_id \
                 WHERE tr.transition_id = $1 \
             ) ORDER BY height LIMIT 1"
        ))
        .bind(id.as_str());
        let result = self.block_by(query).await;
        self.report(result)
    }

    pub async fn get_block_hash_by_height(&self, height: u32) -> DbResult<Option<BlockHash>> {
        let result = self.block_hash_by_height(height).await;
        self.report(result)
    }

    async fn block_hash_by_height(&self, height: u32) -> DbResult<Option<BlockHash>> {
        let mut conn = self.acquire().await?;
        let hash: Option<String> =
            sqlx::query_scalar("SELECT block_hash FROM block WHERE height = $1")
                .bind(i64::from(height))
                .fetch_optional(&mut *conn)
                .await?;
        match hash {
            Some(hash) => Ok(Some(BlockHash::try_from(hash).column("block_hash")?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Header-only lookups
    // -----------------------------------------------------------------------

    /// Header of the block at `height`, without loading its body.
    pub async fn get_block_header_by_height(&self, height: u32) -> DbResult<Option<BlockHeader>> {
        let query = sqlx::query(select_block!("WHERE height = $1")).bind(i64::from(height));
        let result = self.header_by(query).await;
        self.report(result)
    }

    pub async fn get_block_header_by_hash(
        &self,
        hash: &BlockHash,
    ) -> DbResult<Option<BlockHeader>> {
        let query = sqlx::query(select_block!("WHERE block_hash = $1")).bind(hash.as_str());
        let result = self.header_by(query).await;
        self.report(result)
    }

    // -----------------------------------------------------------------------
    // Ranges
    // -----------------------------------------------------------------------

    /// Blocks with height in `(end, start]`, highest first. Empty when
    /// `start <= end`.
    pub async fn get_block_range(&self, start: u32, end: u32) -> DbResult<Vec<Block>> {
        debug!(start, end, "block range");
        let result = self.range(i64::from(start), i64::from(end)).await;
        self.report(result)
    }

    /// The last [`RECENT_BLOCKS_WINDOW`] blocks, highest first. Empty on an
    /// empty store.
    pub async fn get_recent_blocks(&self) -> DbResult<Vec<Block>> {
        let result = match self.latest_height().await {
            Ok(Some(latest)) => {
                let start = i64::from(latest);
                self.range(start, start - i64::from(RECENT_BLOCKS_WINDOW)).await
            }
            Ok(None) => Ok(Vec::new()),
            Err(e) => Err(e),
        };
        self.report(result)
    }

    async fn range(&self, start: i64, end: i64) -> DbResult<Vec<Block>> {
        let mut conn = self.acquire().await?;
        block_range(&mut conn, start, end).await
    }

    // -----------------------------------------------------------------------
    // Prefix search
    // -----------------------------------------------------------------------

    /// Block hashes starting with `prefix` (case-sensitive).
    pub async fn search_block_hash(&self, prefix: &str) -> DbResult<Vec<BlockHash>> {
        let result = self
            .search(
                "SELECT block_hash FROM block \
                 WHERE substr(block_hash, 1, length($1)) = $1",
                "block_hash",
                prefix,
            )
            .await;
        self.report(result)
    }

    /// Transaction ids starting with `prefix` (case-sensitive).
    pub async fn search_transaction_id(&self, prefix: &str) -> DbResult<Vec<TransactionId>> {
        let result = self
            .search(
                "SELECT DISTINCT transaction_id FROM block_transaction \
                 WHERE substr(transaction_id, 1, length($1)) = $1",
                "transaction_id",
                prefix,
            )
            .await;
        self.report(result)
    }

    /// Transition ids starting with `prefix` (case-sensitive).
    pub async fn search_transition_id(&self, prefix: &str) -> DbResult<Vec<TransitionId>> {
        let result = self
            .search(
                "SELECT DISTINCT transition_id FROM transition \
                 WHERE substr(transition_id, 1, length($1)) = $1",
                "transition_id",
                prefix,
            )
            .await;
        self.report(result)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn block_by(&self, query: AnyQuery<'_>) -> DbResult<Option<Block>> {
        let mut conn = self.acquire().await?;
        let Some(row) = query.fetch_optional(&mut *conn).await? else {
            return Ok(None);
        };
        let parsed = BlockRow::from_row(&row)?;
        Ok(Some(full_block(&mut conn, parsed).await?))
    }

    async fn header_by(&self, query: AnyQuery<'_>) -> DbResult<Option<BlockHeader>> {
        let mut conn = self.acquire().await?;
        let Some(row) = query.fetch_optional(&mut *conn).await? else {
            return Ok(None);
        };
        Ok(Some(BlockRow::from_row(&row)?.block.header))
    }

    async fn search<T>(
        &self,
        sql: &'static str,
        column: &'static str,
        prefix: &str,
    ) -> DbResult<Vec<T>>
    where
        T: TryFrom<String, Error = CodecError>,
    {
        let mut conn = self.acquire().await?;
        let matches: Vec<String> = sqlx::query_scalar(sql)
            .bind(prefix)
            .fetch_all(&mut *conn)
            .await?;
        debug!(column, prefix, matches = matches.len(), "prefix search");
        matches
            .into_iter()
            .map(|id| T::try_from(id).column(column))
            .collect()
    }
}
