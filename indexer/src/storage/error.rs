//! Errors crossing the storage boundary.

use crate::chain::CodecError;

use super::reward::RewardError;

/// Everything that can go wrong while talking to the relational store.
///
/// Absence is not in here: point lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The store was unreachable or rejected the connection settings.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Any statement, commit or rollback failure.
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    /// A transaction, input, output, fee or finalize shape that the schema
    /// does not model. Always fatal for the operation.
    #[error("unsupported {entity} variant: {variant}")]
    UnsupportedVariant {
        entity: &'static str,
        variant: String,
    },

    /// A value could not be encoded into, or decoded from, its column.
    #[error("codec error in {column}: {source}")]
    Codec {
        column: &'static str,
        #[source]
        source: CodecError,
    },

    /// Rows that violate the schema's own linkage (a discriminator without
    /// its variant row, an execute transaction without its execution, ...).
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The coinbase reward could not be split.
    #[error("reward split failed: {0}")]
    Reward(#[from] RewardError),

    /// Rejected configuration.
    #[error("invalid database config: {0}")]
    InvalidConfig(String),
}

/// Result alias for storage operations.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub(crate) fn unsupported(entity: &'static str, variant: impl Into<String>) -> Self {
        Self::UnsupportedVariant {
            entity,
            variant: variant.into(),
        }
    }

    /// Whether this error is the "recognized but not modeled" gate.
    pub fn is_unsupported_variant(&self) -> bool {
        matches!(self, Self::UnsupportedVariant { .. })
    }
}

/// Attach a column name to a codec failure.
pub(crate) trait CodecContext<T> {
    fn column(self, column: &'static str) -> DbResult<T>;
}

impl<T> CodecContext<T> for Result<T, CodecError> {
    fn column(self, column: &'static str) -> DbResult<T> {
        self.map_err(|source| DbError::Codec { column, source })
    }
}
