//! # Ingestion Engine
//!
//! `save_block` decomposes one validated block into rows inside a single
//! store transaction:
//!
//! ```text
//!   read previous last_coinbase_timestamp   ─┐ same pooled connection,
//!   reward(height, timestamp) + split       ─┘ before BEGIN
//!   BEGIN
//!     block
//!     block_transaction[tx_index] ── transaction_execute ── transition[transition_index]
//!         ├── transition_input[input_index]   ── _private | _record
//!         └── transition_output[output_index] ── _record
//!     coinbase_solution ── partial_solution[solution_index]
//!         └── reward > 0: leaderboard += reward, leaderboard_log row
//!   COMMIT            (or ROLLBACK on any error, unsupported variants included)
//! ```

use sqlx::AnyConnection;
use sqlx::Connection;
use tracing::{debug, info, warn};

use super::db::ExplorerDb;
use super::error::{CodecContext, DbError, DbResult};
use super::leaderboard;
use super::reward::{split_coinbase_reward, SolutionReward};
use super::schema::entity;
use super::status::StatusMessage;
use crate::chain::codec::u64_to_column;
use crate::chain::{
    Block, CoinbaseSolution, CodecError, ExecuteTransaction, Transaction, Transition,
    TransitionInput, TransitionOutput,
};

impl ExplorerDb {
    /// Persist one block atomically.
    ///
    /// On success a `BlockAdded(height)` status is emitted. On failure the
    /// store is left exactly as it was, a `DatabaseError` status is
    /// emitted, and the error is returned. Nothing is retried.
    ///
    /// Callers must serialize calls by height: the coinbase reward depends
    /// on whichever block is latest when the call starts.
    pub async fn save_block(&self, block: &Block) -> DbResult<()> {
        let height = block.height();
        let result = self.write_block(block).await;
        match &result {
            Ok(()) => {
                info!(
                    height,
                    hash = %block.block_hash,
                    transactions = block.tx_count(),
                    "block indexed"
                );
                self.status().emit(StatusMessage::BlockAdded(height));
            }
            Err(e) if e.is_unsupported_variant() => {
                warn!(height, error = %e, "block rejected");
            }
            Err(_) => {}
        }
        self.report(result)
    }

    async fn write_block(&self, block: &Block) -> DbResult<()> {
        let mut conn = self.acquire().await?;

        let rewards = match &block.coinbase {
            Some(coinbase) => {
                let previous = previous_coinbase_timestamp(&mut conn)
                    .await?
                    .unwrap_or(block.header.metadata.last_coinbase_timestamp);
                let reward = self
                    .reward_function()
                    .coinbase_reward(block.height(), previous);
                debug!(height = block.height(), reward, previous, "coinbase reward");
                split_coinbase_reward(reward, &coinbase.partial_solutions)?
            }
            None => Vec::new(),
        };

        let mut tx = conn.begin().await?;
        match insert_block_graph(&mut tx, block, &rewards).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(
                        height = block.height(),
                        error = %rollback,
                        "rollback failed"
                    );
                }
                Err(e)
            }
        }
    }
}

/// `last_coinbase_timestamp` of the current latest block, if any.
async fn previous_coinbase_timestamp(conn: &mut AnyConnection) -> DbResult<Option<i64>> {
    let timestamp = sqlx::query_scalar(
        "SELECT last_coinbase_timestamp FROM block ORDER BY height DESC LIMIT 1",
    )
    .fetch_optional(conn)
    .await?;
    Ok(timestamp)
}

fn ordinal(column: &'static str, index: usize) -> DbResult<i64> {
    i64::try_from(index).map_err(|_| DbError::Codec {
        column,
        source: CodecError::IntegerOutOfRange {
            column,
            value: index.to_string(),
        },
    })
}

async fn insert_block_graph(
    conn: &mut AnyConnection,
    block: &Block,
    rewards: &[SolutionReward],
) -> DbResult<()> {
    let block_id = insert_block(conn, block).await?;

    for (tx_index, transaction) in block.transactions.iter().enumerate() {
        insert_transaction(conn, block_id, tx_index, transaction).await?;
    }

    if let Some(coinbase) = &block.coinbase {
        insert_coinbase(conn, block_id, block.height(), coinbase, rewards).await?;
    }
    Ok(())
}

async fn insert_block(conn: &mut AnyConnection, block: &Block) -> DbResult<i64> {
    let header = &block.header;
    let meta = &header.metadata;

    let id = sqlx::query_scalar(
        "INSERT INTO block (height, block_hash, previous_hash, previous_state_root, \
         transactions_root, coinbase_accumulator_point, round, coinbase_target, proof_target, \
         last_coinbase_target, last_coinbase_timestamp, timestamp, signature) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id",
    )
    .bind(i64::from(meta.height))
    .bind(block.block_hash.as_str())
    .bind(block.previous_hash.as_str())
    .bind(header.previous_state_root.as_str())
    .bind(header.transactions_root.as_str())
    .bind(header.coinbase_accumulator_point.as_str())
    .bind(u64_to_column("round", meta.round).column("round")?)
    .bind(u64_to_column("coinbase_target", meta.coinbase_target).column("coinbase_target")?)
    .bind(u64_to_column("proof_target", meta.proof_target).column("proof_target")?)
    .bind(
        u64_to_column("last_coinbase_target", meta.last_coinbase_target)
            .column("last_coinbase_target")?,
    )
    .bind(meta.last_coinbase_timestamp)
    .bind(meta.timestamp)
    .bind(block.signature.as_str())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

async fn insert_transaction(
    conn: &mut AnyConnection,
    block_id: i64,
    tx_index: usize,
    transaction: &Transaction,
) -> DbResult<()> {
    let transaction_id: i64 = sqlx::query_scalar(
        "INSERT INTO block_transaction (block_id, transaction_id, type, tx_index) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(block_id)
    .bind(transaction.id().as_str())
    .bind(transaction.kind().as_str())
    .bind(ordinal("tx_index", tx_index)?)
    .fetch_one(&mut *conn)
    .await?;

    match transaction {
        Transaction::Execute(execute) => insert_execute(conn, transaction_id, execute).await,
        Transaction::Deploy(_) => Err(DbError::unsupported(
            entity::TRANSACTION,
            transaction.kind().as_str(),
        )),
    }
}

async fn insert_execute(
    conn: &mut AnyConnection,
    transaction_id: i64,
    execute: &ExecuteTransaction,
) -> DbResult<()> {
    if execute.additional_fee.is_some() {
        return Err(DbError::unsupported(entity::FEE, "additional_fee"));
    }
    let execution = &execute.execution;

    let execute_id: i64 = sqlx::query_scalar(
        "INSERT INTO transaction_execute (transaction_id, global_state_root, inclusion_proof) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(transaction_id)
    .bind(execution.global_state_root.as_str())
    .bind(execution.inclusion_proof.as_ref().map(|p| p.as_str()))
    .fetch_one(&mut *conn)
    .await?;

    for (index, transition) in execution.transitions.iter().enumerate() {
        insert_transition(conn, execute_id, index, transition).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

async fn insert_transition(
    conn: &mut AnyConnection,
    execute_id: i64,
    transition_index: usize,
    transition: &Transition,
) -> DbResult<()> {
    if transition.finalize.is_some() {
        return Err(DbError::unsupported(entity::FINALIZE, "Some"));
    }

    let transition_id: i64 = sqlx::query_scalar(
        "INSERT INTO transition (transition_id, transaction_execute_id, program_id, \
         function_name, proof, tpk, tcm, fee, transition_index) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(transition.id.as_str())
    .bind(execute_id)
    .bind(transition.program_id.as_str())
    .bind(transition.function_name.as_str())
    .bind(transition.proof.as_str())
    .bind(transition.tpk.as_str())
    .bind(transition.tcm.as_str())
    .bind(transition.fee)
    .bind(ordinal("transition_index", transition_index)?)
    .fetch_one(&mut *conn)
    .await?;

    for (index, input) in transition.inputs.iter().enumerate() {
        insert_input(conn, transition_id, index, input).await?;
    }
    for (index, output) in transition.outputs.iter().enumerate() {
        insert_output(conn, transition_id, index, output).await?;
    }
    Ok(())
}

async fn insert_input(
    conn: &mut AnyConnection,
    transition_id: i64,
    input_index: usize,
    input: &TransitionInput,
) -> DbResult<()> {
    let input_id: i64 = sqlx::query_scalar(
        "INSERT INTO transition_input (transition_id, type, input_index) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(transition_id)
    .bind(input.kind().as_str())
    .bind(ordinal("input_index", input_index)?)
    .fetch_one(&mut *conn)
    .await?;

    match input {
        TransitionInput::Private {
            ciphertext_hash,
            ciphertext,
        } => {
            sqlx::query(
                "INSERT INTO transition_input_private \
                 (transition_input_id, ciphertext_hash, ciphertext) VALUES ($1, $2, $3)",
            )
            .bind(input_id)
            .bind(ciphertext_hash.as_str())
            .bind(ciphertext.as_ref().map(|c| c.as_bytes()))
            .execute(&mut *conn)
            .await?;
        }
        TransitionInput::Record { serial_number, tag } => {
            sqlx::query(
                "INSERT INTO transition_input_record (transition_input_id, serial_number, tag) \
                 VALUES ($1, $2, $3)",
            )
            .bind(input_id)
            .bind(serial_number.as_str())
            .bind(tag.as_str())
            .execute(&mut *conn)
            .await?;
        }
        other => {
            return Err(DbError::unsupported(
                entity::TRANSITION_INPUT,
                other.kind().as_str(),
            ))
        }
    }
    Ok(())
}

async fn insert_output(
    conn: &mut AnyConnection,
    transition_id: i64,
    output_index: usize,
    output: &TransitionOutput,
) -> DbResult<()> {
    let output_id: i64 = sqlx::query_scalar(
        "INSERT INTO transition_output (transition_id, type, output_index) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(transition_id)
    .bind(output.kind().as_str())
    .bind(ordinal("output_index", output_index)?)
    .fetch_one(&mut *conn)
    .await?;

    match output {
        TransitionOutput::Record {
            commitment,
            checksum,
            record_ciphertext,
        } => {
            sqlx::query(
                "INSERT INTO transition_output_record \
                 (transition_output_id, commitment, checksum, record_ciphertext) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(output_id)
            .bind(commitment.as_str())
            .bind(checksum.as_str())
            .bind(record_ciphertext.as_ref().map(|c| c.as_bytes()))
            .execute(&mut *conn)
            .await?;
            Ok(())
        }
        other => Err(DbError::unsupported(
            entity::TRANSITION_OUTPUT,
            other.kind().as_str(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Coinbase
// ---------------------------------------------------------------------------

async fn insert_coinbase(
    conn: &mut AnyConnection,
    block_id: i64,
    height: u32,
    coinbase: &CoinbaseSolution,
    rewards: &[SolutionReward],
) -> DbResult<()> {
    let coinbase_id: i64 = sqlx::query_scalar(
        "INSERT INTO coinbase_solution (block_id, proof_x, proof_y_positive) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(block_id)
    .bind(coinbase.proof.x.as_str())
    .bind(coinbase.proof.y_positive)
    .fetch_one(&mut *conn)
    .await?;

    for (index, (solution, share)) in coinbase
        .partial_solutions
        .iter()
        .zip(rewards)
        .enumerate()
    {
        let solution_id: i64 = sqlx::query_scalar(
            "INSERT INTO partial_solution \
             (coinbase_solution_id, address, nonce, commitment, target, solution_index) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(coinbase_id)
        .bind(solution.address.as_str())
        .bind(solution.nonce.to_string())
        .bind(solution.commitment.as_str())
        .bind(share.target.to_string())
        .bind(ordinal("solution_index", index)?)
        .fetch_one(&mut *conn)
        .await?;

        if share.reward > 0 {
            leaderboard::add_reward(conn, &solution.address, share.reward).await?;
            leaderboard::append_log(conn, height, &solution.address, Some(solution_id), share.reward)
                .await?;
        }
    }
    Ok(())
}
