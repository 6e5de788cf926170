//! # Schema Mapper
//!
//! One table per entity kind, one child table per modeled variant. Surrogate
//! `id` columns link rows; `*_index` columns carry ordinal positions.
//!
//! ```text
//! block ─┬─ block_transaction (type, tx_index)
//!        │    ├─ transaction_execute ── transition (transition_index)
//!        │    │                           ├─ transition_input (type, input_index)
//!        │    │                           │    ├─ transition_input_private
//!        │    │                           │    └─ transition_input_record
//!        │    │                           └─ transition_output (type, output_index)
//!        │    │                                └─ transition_output_record
//!        │    └─ fee ── transition (fee_id; recognized, never written)
//!        └─ coinbase_solution ── partial_solution (solution_index)
//!
//! leaderboard (address → total_reward)   leaderboard_log (audit trail)
//! ```
//!
//! DDL is rendered per dialect from one statement list; only the id,
//! bytes and boolean column types differ between Postgres and SQLite.

/// Entity names used in unsupported-variant errors.
pub mod entity {
    pub const TRANSACTION: &str = "transaction";
    pub const TRANSITION_INPUT: &str = "transition input";
    pub const TRANSITION_OUTPUT: &str = "transition output";
    pub const FINALIZE: &str = "transition finalize";
    pub const FEE: &str = "fee";
}

/// Every table, parents before children.
pub const ALL_TABLES: &[&str] = &[
    "block",
    "block_transaction",
    "transaction_execute",
    "fee",
    "transition",
    "transition_input",
    "transition_input_private",
    "transition_input_record",
    "transition_output",
    "transition_output_record",
    "coinbase_solution",
    "partial_solution",
    "leaderboard",
    "leaderboard_log",
];

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS block (
        id {id},
        height BIGINT NOT NULL UNIQUE,
        block_hash TEXT NOT NULL UNIQUE,
        previous_hash TEXT NOT NULL,
        previous_state_root TEXT NOT NULL,
        transactions_root TEXT NOT NULL,
        coinbase_accumulator_point TEXT NOT NULL,
        round BIGINT NOT NULL,
        coinbase_target BIGINT NOT NULL,
        proof_target BIGINT NOT NULL,
        last_coinbase_target BIGINT NOT NULL,
        last_coinbase_timestamp BIGINT NOT NULL,
        timestamp BIGINT NOT NULL,
        signature TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS block_transaction (
        id {id},
        block_id BIGINT NOT NULL REFERENCES block (id),
        transaction_id TEXT NOT NULL,
        type TEXT NOT NULL,
        tx_index BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transaction_execute (
        id {id},
        transaction_id BIGINT NOT NULL UNIQUE REFERENCES block_transaction (id),
        global_state_root TEXT NOT NULL,
        inclusion_proof TEXT
    )",
    "CREATE TABLE IF NOT EXISTS fee (
        id {id},
        transaction_id BIGINT NOT NULL REFERENCES block_transaction (id),
        global_state_root TEXT NOT NULL,
        inclusion_proof TEXT
    )",
    "CREATE TABLE IF NOT EXISTS transition (
        id {id},
        transition_id TEXT NOT NULL,
        transaction_execute_id BIGINT REFERENCES transaction_execute (id),
        fee_id BIGINT REFERENCES fee (id),
        program_id TEXT NOT NULL,
        function_name TEXT NOT NULL,
        proof TEXT NOT NULL,
        tpk TEXT NOT NULL,
        tcm TEXT NOT NULL,
        fee BIGINT NOT NULL,
        transition_index BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transition_input (
        id {id},
        transition_id BIGINT NOT NULL REFERENCES transition (id),
        type TEXT NOT NULL,
        input_index BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transition_input_private (
        id {id},
        transition_input_id BIGINT NOT NULL UNIQUE REFERENCES transition_input (id),
        ciphertext_hash TEXT NOT NULL,
        ciphertext {bytes}
    )",
    "CREATE TABLE IF NOT EXISTS transition_input_record (
        id {id},
        transition_input_id BIGINT NOT NULL UNIQUE REFERENCES transition_input (id),
        serial_number TEXT NOT NULL,
        tag TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transition_output (
        id {id},
        transition_id BIGINT NOT NULL REFERENCES transition (id),
        type TEXT NOT NULL,
        output_index BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transition_output_record (
        id {id},
        transition_output_id BIGINT NOT NULL UNIQUE REFERENCES transition_output (id),
        commitment TEXT NOT NULL,
        checksum TEXT NOT NULL,
        record_ciphertext {bytes}
    )",
    "CREATE TABLE IF NOT EXISTS coinbase_solution (
        id {id},
        block_id BIGINT NOT NULL UNIQUE REFERENCES block (id),
        proof_x TEXT NOT NULL,
        proof_y_positive {bool} NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS partial_solution (
        id {id},
        coinbase_solution_id BIGINT NOT NULL REFERENCES coinbase_solution (id),
        address TEXT NOT NULL,
        nonce TEXT NOT NULL,
        commitment TEXT NOT NULL,
        target TEXT NOT NULL,
        solution_index BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS leaderboard (
        address TEXT PRIMARY KEY,
        total_reward BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS leaderboard_log (
        id {id},
        height BIGINT NOT NULL,
        address TEXT NOT NULL,
        partial_solution_id BIGINT REFERENCES partial_solution (id),
        reward BIGINT NOT NULL
    )",
];

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS block_transaction_block_id_index ON block_transaction (block_id)",
    "CREATE INDEX IF NOT EXISTS block_transaction_transaction_id_index ON block_transaction (transaction_id)",
    "CREATE INDEX IF NOT EXISTS fee_transaction_id_index ON fee (transaction_id)",
    "CREATE INDEX IF NOT EXISTS transition_transaction_execute_id_index ON transition (transaction_execute_id)",
    "CREATE INDEX IF NOT EXISTS transition_fee_id_index ON transition (fee_id)",
    "CREATE INDEX IF NOT EXISTS transition_transition_id_index ON transition (transition_id)",
    "CREATE INDEX IF NOT EXISTS transition_input_transition_id_index ON transition_input (transition_id)",
    "CREATE INDEX IF NOT EXISTS transition_output_transition_id_index ON transition_output (transition_id)",
    "CREATE INDEX IF NOT EXISTS partial_solution_coinbase_solution_id_index ON partial_solution (coinbase_solution_id)",
    "CREATE INDEX IF NOT EXISTS leaderboard_log_address_index ON leaderboard_log (address)",
];

/// SQL dialect of the connected backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Map `AnyConnection::backend_name()` to a dialect.
    pub fn from_backend_name(name: &str) -> Option<Self> {
        match name {
            "PostgreSQL" => Some(Self::Postgres),
            "SQLite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Guess the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':')?.0;
        match scheme {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    const fn id_column(self) -> &'static str {
        match self {
            Self::Postgres => "BIGSERIAL PRIMARY KEY",
            Self::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    const fn bytes_type(self) -> &'static str {
        match self {
            Self::Postgres => "BYTEA",
            Self::Sqlite => "BLOB",
        }
    }

    const fn bool_type(self) -> &'static str {
        match self {
            Self::Postgres => "BOOLEAN",
            Self::Sqlite => "INTEGER",
        }
    }

    /// All `CREATE TABLE` then `CREATE INDEX` statements for this dialect.
    pub fn create_statements(self) -> Vec<String> {
        CREATE_TABLES
            .iter()
            .map(|ddl| {
                ddl.replace("{id}", self.id_column())
                    .replace("{bytes}", self.bytes_type())
                    .replace("{bool}", self.bool_type())
            })
            .chain(CREATE_INDEXES.iter().map(|ddl| ddl.to_string()))
            .collect()
    }
}
