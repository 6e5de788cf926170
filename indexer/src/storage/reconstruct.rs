//! # Reconstruction Engine
//!
//! Reassembles a [`Block`] from its rows with a bounded sequence of reads,
//! walking the graph top-down in the reverse of the write order. Children
//! are always read `ORDER BY <ordinal>`, and every tagged union is rebuilt
//! by dispatching on its stored discriminator.
//!
//! What comes back is equal to what went in on every field the schema
//! models. `finalize` and `additional_fee` cannot be stored, so they are
//! always `None`.

use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use sqlx::Row;

use super::error::{CodecContext, DbError, DbResult};
use super::schema::entity;
use crate::chain::codec::{column_to_u32, column_to_u64, text_to_u64};
use crate::chain::{
    Block, BlockHeader, BlockHeaderMetadata, Ciphertext, CoinbaseSolution, CodecError,
    ExecuteTransaction, Execution, KzgProof, PartialSolution, RecordCiphertext, Transaction,
    TransactionKind, Transition, TransitionInput, TransitionInputKind, TransitionOutput,
    TransitionOutputKind,
};

/// `SELECT <every block column> FROM block <tail>`.
macro_rules! select_block {
    ($tail:literal) => {
        concat!(
            "SELECT id, height, block_hash, previous_hash, previous_state_root, ",
            "transactions_root, coinbase_accumulator_point, round, coinbase_target, ",
            "proof_target, last_coinbase_target, last_coinbase_timestamp, timestamp, ",
            "signature FROM block ",
            $tail
        )
    };
}
pub(super) use select_block;

// ---------------------------------------------------------------------------
// Column decoding
// ---------------------------------------------------------------------------

/// Decode a textual column through its domain type's validation.
fn text<T>(row: &AnyRow, column: &'static str) -> DbResult<T>
where
    T: TryFrom<String, Error = CodecError>,
{
    let raw: String = row.try_get(column)?;
    T::try_from(raw).column(column)
}

fn optional_text<T>(row: &AnyRow, column: &'static str) -> DbResult<Option<T>>
where
    T: TryFrom<String, Error = CodecError>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| T::try_from(raw).column(column)).transpose()
}

fn int(row: &AnyRow, column: &'static str) -> DbResult<i64> {
    Ok(row.try_get(column)?)
}

fn unsigned(row: &AnyRow, column: &'static str) -> DbResult<u64> {
    column_to_u64(column, int(row, column)?).column(column)
}

/// Postgres hands back a real boolean, SQLite an integer.
fn boolean(row: &AnyRow, column: &'static str) -> DbResult<bool> {
    match row.try_get::<bool, _>(column) {
        Ok(value) => Ok(value),
        Err(_) => Ok(row.try_get::<i64, _>(column)? != 0),
    }
}

fn decimal(row: &AnyRow, column: &'static str) -> DbResult<u64> {
    let raw: String = row.try_get(column)?;
    text_to_u64(column, &raw).column(column)
}

// ---------------------------------------------------------------------------
// Block rows
// ---------------------------------------------------------------------------

/// A `block` row, decoded but without its children.
#[derive(Debug)]
pub(super) struct BlockRow {
    pub id: i64,
    pub block: Block,
}

impl BlockRow {
    pub(super) fn from_row(row: &AnyRow) -> DbResult<Self> {
        let header = BlockHeader {
            previous_state_root: text(row, "previous_state_root")?,
            transactions_root: text(row, "transactions_root")?,
            coinbase_accumulator_point: text(row, "coinbase_accumulator_point")?,
            metadata: BlockHeaderMetadata {
                round: unsigned(row, "round")?,
                height: column_to_u32("height", int(row, "height")?).column("height")?,
                coinbase_target: unsigned(row, "coinbase_target")?,
                proof_target: unsigned(row, "proof_target")?,
                last_coinbase_target: unsigned(row, "last_coinbase_target")?,
                last_coinbase_timestamp: int(row, "last_coinbase_timestamp")?,
                timestamp: int(row, "timestamp")?,
            },
        };

        Ok(Self {
            id: int(row, "id")?,
            block: Block {
                block_hash: text(row, "block_hash")?,
                previous_hash: text(row, "previous_hash")?,
                header,
                transactions: Vec::new(),
                coinbase: None,
                signature: text(row, "signature")?,
            },
        })
    }
}

/// Load every child of `row` and return the complete block.
pub(super) async fn full_block(conn: &mut AnyConnection, row: BlockRow) -> DbResult<Block> {
    let BlockRow { id, mut block } = row;
    block.transactions = transactions(conn, id).await?;
    block.coinbase = coinbase(conn, id).await?;
    Ok(block)
}

/// Blocks with height in `(end, start]`, highest first.
///
/// Bounds are signed so a window reaching below genesis still includes
/// height 0.
pub(super) async fn block_range(
    conn: &mut AnyConnection,
    start: i64,
    end: i64,
) -> DbResult<Vec<Block>> {
    let rows = sqlx::query(select_block!(
        "WHERE height > $1 AND height <= $2 ORDER BY height DESC"
    ))
    .bind(end)
    .bind(start)
    .fetch_all(&mut *conn)
    .await?;

    let mut blocks = Vec::with_capacity(rows.len());
    for row in &rows {
        let parsed = BlockRow::from_row(row)?;
        blocks.push(full_block(conn, parsed).await?);
    }
    Ok(blocks)
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

async fn transactions(conn: &mut AnyConnection, block_id: i64) -> DbResult<Vec<Transaction>> {
    let rows = sqlx::query(
        "SELECT id, transaction_id, type FROM block_transaction \
         WHERE block_id = $1 ORDER BY tx_index",
    )
    .bind(block_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut transactions = Vec::with_capacity(rows.len());
    for row in &rows {
        let row_id = int(row, "id")?;
        let kind: String = row.try_get("type")?;
        match kind.parse::<TransactionKind>() {
            Ok(TransactionKind::Execute) => {
                let fees: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM fee WHERE transaction_id = $1")
                        .bind(row_id)
                        .fetch_one(&mut *conn)
                        .await?;
                if fees > 0 {
                    return Err(DbError::unsupported(entity::FEE, "fee"));
                }
                transactions.push(Transaction::Execute(ExecuteTransaction {
                    id: text(row, "transaction_id")?,
                    execution: execution(conn, row_id).await?,
                    additional_fee: None,
                }));
            }
            _ => return Err(DbError::unsupported(entity::TRANSACTION, kind)),
        }
    }
    Ok(transactions)
}

async fn execution(conn: &mut AnyConnection, transaction_row: i64) -> DbResult<Execution> {
    let row = sqlx::query(
        "SELECT id, global_state_root, inclusion_proof FROM transaction_execute \
         WHERE transaction_id = $1",
    )
    .bind(transaction_row)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        DbError::Corrupt(format!(
            "execute transaction row {transaction_row} has no transaction_execute row"
        ))
    })?;

    Ok(Execution {
        transitions: transitions(conn, int(&row, "id")?).await?,
        global_state_root: text(&row, "global_state_root")?,
        inclusion_proof: optional_text(&row, "inclusion_proof")?,
    })
}

async fn transitions(conn: &mut AnyConnection, execute_id: i64) -> DbResult<Vec<Transition>> {
    let rows = sqlx::query(
        "SELECT id, transition_id, program_id, function_name, proof, tpk, tcm, fee \
         FROM transition WHERE transaction_execute_id = $1 ORDER BY transition_index",
    )
    .bind(execute_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut transitions = Vec::with_capacity(rows.len());
    for row in &rows {
        let row_id = int(row, "id")?;
        transitions.push(Transition {
            id: text(row, "transition_id")?,
            program_id: text(row, "program_id")?,
            function_name: text(row, "function_name")?,
            inputs: inputs(conn, row_id).await?,
            outputs: outputs(conn, row_id).await?,
            finalize: None,
            proof: text(row, "proof")?,
            tpk: text(row, "tpk")?,
            tcm: text(row, "tcm")?,
            fee: int(row, "fee")?,
        });
    }
    Ok(transitions)
}

// ---------------------------------------------------------------------------
// Inputs & outputs
// ---------------------------------------------------------------------------

fn missing_variant(table: &str, parent: i64) -> DbError {
    DbError::Corrupt(format!("no {table} row for parent {parent}"))
}

async fn inputs(conn: &mut AnyConnection, transition_row: i64) -> DbResult<Vec<TransitionInput>> {
    let rows = sqlx::query(
        "SELECT id, type FROM transition_input WHERE transition_id = $1 ORDER BY input_index",
    )
    .bind(transition_row)
    .fetch_all(&mut *conn)
    .await?;

    let mut inputs = Vec::with_capacity(rows.len());
    for row in &rows {
        let input_id = int(row, "id")?;
        let kind: String = row.try_get("type")?;
        let input = match kind.parse::<TransitionInputKind>() {
            Ok(TransitionInputKind::Private) => {
                let private = sqlx::query(
                    "SELECT ciphertext_hash, ciphertext FROM transition_input_private \
                     WHERE transition_input_id = $1",
                )
                .bind(input_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| missing_variant("transition_input_private", input_id))?;
                let ciphertext: Option<Vec<u8>> = private.try_get("ciphertext")?;
                TransitionInput::Private {
                    ciphertext_hash: text(&private, "ciphertext_hash")?,
                    ciphertext: ciphertext.map(Ciphertext::from_bytes),
                }
            }
            Ok(TransitionInputKind::Record) => {
                let record = sqlx::query(
                    "SELECT serial_number, tag FROM transition_input_record \
                     WHERE transition_input_id = $1",
                )
                .bind(input_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| missing_variant("transition_input_record", input_id))?;
                TransitionInput::Record {
                    serial_number: text(&record, "serial_number")?,
                    tag: text(&record, "tag")?,
                }
            }
            _ => return Err(DbError::unsupported(entity::TRANSITION_INPUT, kind)),
        };
        inputs.push(input);
    }
    Ok(inputs)
}

async fn outputs(
    conn: &mut AnyConnection,
    transition_row: i64,
) -> DbResult<Vec<TransitionOutput>> {
    let rows = sqlx::query(
        "SELECT id, type FROM transition_output WHERE transition_id = $1 ORDER BY output_index",
    )
    .bind(transition_row)
    .fetch_all(&mut *conn)
    .await?;

    let mut outputs = Vec::with_capacity(rows.len());
    for row in &rows {
        let output_id = int(row, "id")?;
        let kind: String = row.try_get("type")?;
        let output = match kind.parse::<TransitionOutputKind>() {
            Ok(TransitionOutputKind::Record) => {
                let record = sqlx::query(
                    "SELECT commitment, checksum, record_ciphertext FROM transition_output_record \
                     WHERE transition_output_id = $1",
                )
                .bind(output_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| missing_variant("transition_output_record", output_id))?;
                let ciphertext: Option<Vec<u8>> = record.try_get("record_ciphertext")?;
                TransitionOutput::Record {
                    commitment: text(&record, "commitment")?,
                    checksum: text(&record, "checksum")?,
                    record_ciphertext: ciphertext.map(RecordCiphertext::from_bytes),
                }
            }
            _ => return Err(DbError::unsupported(entity::TRANSITION_OUTPUT, kind)),
        };
        outputs.push(output);
    }
    Ok(outputs)
}

// ---------------------------------------------------------------------------
// Coinbase
// ---------------------------------------------------------------------------

async fn coinbase(conn: &mut AnyConnection, block_id: i64) -> DbResult<Option<CoinbaseSolution>> {
    let Some(row) = sqlx::query(
        "SELECT id, proof_x, proof_y_positive FROM coinbase_solution WHERE block_id = $1",
    )
    .bind(block_id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let rows = sqlx::query(
        "SELECT address, nonce, commitment FROM partial_solution \
         WHERE coinbase_solution_id = $1 ORDER BY solution_index",
    )
    .bind(int(&row, "id")?)
    .fetch_all(&mut *conn)
    .await?;

    let partial_solutions = rows
        .iter()
        .map(|solution| {
            Ok(PartialSolution {
                address: text(solution, "address")?,
                nonce: decimal(solution, "nonce")?,
                commitment: text(solution, "commitment")?,
            })
        })
        .collect::<DbResult<Vec<_>>>()?;

    Ok(Some(CoinbaseSolution {
        partial_solutions,
        proof: KzgProof {
            x: text(&row, "proof_x")?,
            y_positive: boolean(&row, "proof_y_positive")?,
        },
    }))
}
