//! # ExplorerDb — Relational Storage Handle
//!
//! The one handle the rest of the world talks to. It owns the connection
//! pool, the status channel and the injected coinbase reward function;
//! ingestion, reconstruction, queries and the leaderboard are all
//! `impl ExplorerDb` blocks in their own modules.
//!
//! ## Backends
//!
//! The pool is a `sqlx` `Any` pool, so one code path serves both
//! Postgres (production) and SQLite (tests, local tooling). Every
//! statement uses `$N` placeholders and portable SQL; the only dialect
//! differences live in [`schema`](super::schema).
//!
//! ## Connections
//!
//! Each public operation acquires one pooled connection for its whole
//! duration and returns it on every exit path (the pool guard is dropped).
//! Nothing else in here is shared or mutable.

use std::sync::Arc;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyConnection;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};
use tracing::{debug, info};

use super::error::{DbError, DbResult};
use super::reward::CoinbaseReward;
use super::schema::Dialect;
use super::status::{StatusChannel, StatusMessage};
use crate::config::DatabaseConfig;

/// Handle to the explorer's relational store.
///
/// Cheap to clone: the pool and status sender are reference counted, so
/// clones share connections. Share it across tasks freely; callers are
/// still expected to serialize `save_block` calls by height.
#[derive(Clone)]
pub struct ExplorerDb {
    pool: AnyPool,
    dialect: Dialect,
    status: StatusChannel,
    reward: Arc<dyn CoinbaseReward>,
}

impl std::fmt::Debug for ExplorerDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerDb")
            .field("dialect", &self.dialect)
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl ExplorerDb {
    /// Build the connection pool and verify the store is reachable.
    ///
    /// Emits exactly one of `Connected` / `ConnectFailed` on `status`.
    /// There is no retry: a failed connect is returned to the caller.
    pub async fn connect(
        config: &DatabaseConfig,
        status: StatusChannel,
        reward: Arc<dyn CoinbaseReward>,
    ) -> DbResult<Self> {
        match Self::open_pool(config).await {
            Ok((pool, dialect)) => {
                info!(
                    ?dialect,
                    max_connections = config.max_connections,
                    "connected to explorer database"
                );
                status.emit(StatusMessage::Connected);
                Ok(Self {
                    pool,
                    dialect,
                    status,
                    reward,
                })
            }
            Err(e) => {
                status.emit(StatusMessage::ConnectFailed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn open_pool(config: &DatabaseConfig) -> DbResult<(AnyPool, Dialect)> {
        config.validate().map_err(DbError::InvalidConfig)?;
        let dialect = Dialect::from_url(&config.url).ok_or_else(|| {
            DbError::InvalidConfig(format!("unsupported database url {:?}", config.url))
        })?;

        sqlx::any::install_default_drivers();

        let schema = config.schema.clone();
        let pool = AnyPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .after_connect(move |conn, _meta| {
                let schema = schema.clone();
                Box::pin(async move {
                    if let Some(schema) = schema {
                        set_search_path(conn, &schema).await?;
                    }
                    Ok(())
                })
            })
            .connect(&config.url)
            .await
            .map_err(DbError::Connect)?;

        Ok((pool, dialect))
    }

    /// Create every table and index that does not exist yet.
    ///
    /// Idempotent. Schema evolution is out of scope: an existing table with
    /// a different shape is left alone.
    pub async fn initialize_schema(&self) -> DbResult<()> {
        let result = self.create_tables().await;
        if result.is_ok() {
            info!(dialect = ?self.dialect, "explorer schema ready");
        }
        self.report(result)
    }

    async fn create_tables(&self) -> DbResult<()> {
        let mut conn = self.acquire().await?;
        for statement in self.dialect.create_statements() {
            sqlx::query(&statement).execute(&mut *conn).await?;
        }
        Ok(())
    }

    /// Close every pooled connection. Further operations fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// The status channel this handle emits on.
    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    // -----------------------------------------------------------------------
    // Crate-internal plumbing
    // -----------------------------------------------------------------------

    pub(crate) async fn acquire(&self) -> DbResult<PoolConnection<Any>> {
        Ok(self.pool.acquire().await?)
    }

    pub(crate) fn reward_function(&self) -> &dyn CoinbaseReward {
        self.reward.as_ref()
    }

    /// Surface a failed operation on the status channel, then hand the
    /// result back unchanged.
    pub(crate) fn report<T>(&self, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            self.status.emit(StatusMessage::DatabaseError(e.to_string()));
        }
        result
    }
}

/// Put `schema` first on the search path of a fresh Postgres connection.
async fn set_search_path(conn: &mut AnyConnection, schema: &str) -> Result<(), sqlx::Error> {
    if Dialect::from_backend_name(conn.backend_name()) != Some(Dialect::Postgres) {
        return Ok(());
    }
    // Validated as a plain identifier by DatabaseConfig::validate.
    let statement = format!("SET search_path TO {schema}");
    sqlx::query(&statement).execute(&mut *conn).await?;
    debug!(schema, "search_path set");
    Ok(())
}
