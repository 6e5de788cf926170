//! End-to-end tests for the explorer indexer.
//!
//! Every test gets its own SQLite file in a temporary directory, connected
//! through the same `sqlx` Any pool production uses with Postgres. Blocks
//! go in through `save_block` and come back out through the query service;
//! a second raw pool inspects or tampers with rows where the public API
//! cannot see them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use sqlx::AnyPool;
use tempfile::TempDir;
use tokio::sync::broadcast::Receiver;

use explorer_indexer::chain::{
    Address, Block, BlockHash, BlockHeader, BlockHeaderMetadata, Ciphertext, CoinbaseSolution,
    DeployTransaction, ExecuteTransaction, Execution, Fee, Field, KzgProof, PartialSolution,
    PuzzleCommitment, RecordCiphertext, Signature, StateRoot, Transaction, TransactionId,
    Transition, TransitionId, TransitionInput, TransitionOutput,
};
use explorer_indexer::config::DatabaseConfig;
use explorer_indexer::storage::schema::ALL_TABLES;
use explorer_indexer::storage::{
    split_coinbase_reward, CoinbaseReward, DbError, ExplorerDb, FlatReward, StatusChannel,
    StatusMessage,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct Harness {
    db: ExplorerDb,
    status: Receiver<StatusMessage>,
    url: String,
    _dir: TempDir,
}

impl Harness {
    /// Second pool on the same file, for looking underneath the API.
    async fn raw(&self) -> AnyPool {
        sqlx::any::install_default_drivers();
        AnyPool::connect(&self.url).await.expect("raw pool")
    }

    /// Drain the status channel.
    fn statuses(&mut self) -> Vec<StatusMessage> {
        let mut seen = Vec::new();
        while let Ok(message) = self.status.try_recv() {
            seen.push(message);
        }
        seen
    }
}

async fn setup<R: CoinbaseReward + 'static>(reward: R) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("explorer.db").display()
    );
    let channel = StatusChannel::default();
    let status = channel.subscribe();
    let db = ExplorerDb::connect(&DatabaseConfig::new(url.clone()), channel, Arc::new(reward))
        .await
        .expect("connect");
    db.initialize_schema().await.expect("schema");
    Harness {
        db,
        status,
        url,
        _dir: dir,
    }
}

async fn count_rows(pool: &AnyPool, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar(&sql)
        .fetch_one(pool)
        .await
        .expect("count")
}

/// 32 deterministic bytes: `n` big-endian followed by `salt`.
fn bytes(n: u32, salt: u8) -> [u8; 32] {
    let mut out = [salt; 32];
    out[..4].copy_from_slice(&n.to_be_bytes());
    out
}

fn field(n: u64) -> Field {
    format!("{n}field").parse().unwrap()
}

fn prover(seed: u8) -> Address {
    Address::from_bytes(&[seed; 32]).unwrap()
}

fn transition(seed: u32, index: u8) -> Transition {
    let base = u64::from(seed) * 100 + u64::from(index) * 10;
    Transition {
        id: TransitionId::from_bytes(&bytes(seed, 0x30 + index)).unwrap(),
        program_id: "credits.aleo".parse().unwrap(),
        function_name: "transfer_private".parse().unwrap(),
        inputs: vec![
            TransitionInput::Record {
                serial_number: field(base + 1),
                tag: field(base + 2),
            },
            TransitionInput::Private {
                ciphertext_hash: field(base + 3),
                ciphertext: Some(Ciphertext::from_bytes(vec![index, 0xca, 0xfe])),
            },
            TransitionInput::Private {
                ciphertext_hash: field(base + 4),
                ciphertext: None,
            },
        ],
        outputs: vec![
            TransitionOutput::Record {
                commitment: field(base + 5),
                checksum: field(base + 6),
                record_ciphertext: Some(RecordCiphertext::from_bytes(vec![0xde, 0xad, index])),
            },
            TransitionOutput::Record {
                commitment: field(base + 7),
                checksum: field(base + 8),
                record_ciphertext: None,
            },
        ],
        finalize: None,
        proof: format!("proof1q{seed}x{index}").parse().unwrap(),
        tpk: format!("{}group", base + 9).parse().unwrap(),
        tcm: field(base),
        fee: -i64::from(index),
    }
}

fn execute(seed: u32, transitions: usize) -> Transaction {
    Transaction::Execute(ExecuteTransaction {
        id: TransactionId::from_bytes(&bytes(seed, 0x20)).unwrap(),
        execution: Execution {
            transitions: (0..transitions as u8).map(|i| transition(seed, i)).collect(),
            global_state_root: StateRoot::from_bytes(&bytes(seed, 0x21)).unwrap(),
            inclusion_proof: Some(format!("proof1incl{seed}").parse().unwrap()),
        },
        additional_fee: None,
    })
}

fn coinbase(height: u32, provers: &[u8]) -> CoinbaseSolution {
    CoinbaseSolution {
        partial_solutions: provers
            .iter()
            .map(|&p| {
                let mut commitment = [p; 48];
                commitment[..4].copy_from_slice(&height.to_be_bytes());
                PartialSolution {
                    address: prover(p),
                    nonce: u64::MAX - u64::from(p),
                    commitment: PuzzleCommitment::from_bytes(&commitment).unwrap(),
                }
            })
            .collect(),
        proof: KzgProof {
            x: format!("{}", 1_000_003 * u64::from(height)).parse().unwrap(),
            y_positive: height % 2 == 0,
        },
    }
}

fn block(
    height: u32,
    transactions: Vec<Transaction>,
    coinbase: Option<CoinbaseSolution>,
) -> Block {
    Block {
        block_hash: BlockHash::from_bytes(&bytes(height, 0x01)).unwrap(),
        previous_hash: BlockHash::from_bytes(&bytes(height.wrapping_sub(1), 0x01)).unwrap(),
        header: BlockHeader {
            previous_state_root: field(u64::from(height) * 3),
            transactions_root: field(u64::from(height) * 3 + 1),
            coinbase_accumulator_point: field(u64::from(height) * 3 + 2),
            metadata: BlockHeaderMetadata {
                round: u64::from(height) + 7,
                height,
                coinbase_target: 1 << 29,
                proof_target: 1 << 27,
                last_coinbase_target: 1 << 29,
                last_coinbase_timestamp: 1_700_000_000 + i64::from(height) * 15,
                timestamp: 1_700_000_005 + i64::from(height) * 15,
            },
        },
        transactions,
        coinbase,
        signature: Signature::from_bytes(&[0x5a; 64]).unwrap(),
    }
}

/// A block exercising every modeled shape.
fn full_block(height: u32) -> Block {
    block(
        height,
        vec![execute(height * 10, 2), execute(height * 10 + 1, 1)],
        Some(coinbase(height, &[1, 2, 3])),
    )
}

fn empty_block(height: u32) -> Block {
    block(height, Vec::new(), None)
}

// ---------------------------------------------------------------------------
// Round-trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn round_trip_preserves_every_modeled_field() {
    let mut h = setup(FlatReward(1_000_000)).await;
    let odd = full_block(7);
    let even = full_block(8);

    h.db.save_block(&odd).await.unwrap();
    h.db.save_block(&even).await.unwrap();

    assert_eq!(h.db.get_block_by_height(7).await.unwrap(), Some(odd.clone()));
    assert_eq!(h.db.get_block_by_hash(&even.block_hash).await.unwrap(), Some(even.clone()));
    assert_eq!(h.db.get_latest_block().await.unwrap(), Some(even.clone()));
    assert_eq!(h.db.get_latest_height().await.unwrap(), Some(8));

    // The coinbase proof sign bit survives both ways.
    let restored = h.db.get_block_by_height(7).await.unwrap().unwrap();
    assert!(!restored.coinbase.unwrap().proof.y_positive);
    let restored = h.db.get_block_by_height(8).await.unwrap().unwrap();
    assert!(restored.coinbase.unwrap().proof.y_positive);

    assert_eq!(
        h.statuses(),
        vec![
            StatusMessage::Connected,
            StatusMessage::BlockAdded(7),
            StatusMessage::BlockAdded(8),
        ]
    );
}

#[tokio::test]
async fn stored_indexes_decide_child_order() {
    let h = setup(FlatReward(0)).await;
    let saved = full_block(6);
    h.db.save_block(&saved).await.unwrap();

    // Rewrite every ordinal so it runs against insertion order.
    let raw = h.raw().await;
    for (table, column) in [
        ("block_transaction", "tx_index"),
        ("transition", "transition_index"),
        ("transition_input", "input_index"),
        ("transition_output", "output_index"),
        ("partial_solution", "solution_index"),
    ] {
        sqlx::query(&format!("UPDATE {table} SET {column} = 10 - {column}"))
            .execute(&raw)
            .await
            .unwrap();
    }

    let mut expected = saved.clone();
    expected.transactions.reverse();
    for transaction in &mut expected.transactions {
        if let Transaction::Execute(execute) = transaction {
            execute.execution.transitions.reverse();
            for transition in &mut execute.execution.transitions {
                transition.inputs.reverse();
                transition.outputs.reverse();
            }
        }
    }
    if let Some(coinbase) = &mut expected.coinbase {
        coinbase.partial_solutions.reverse();
    }
    assert_ne!(expected, saved);

    assert_eq!(h.db.get_block_by_height(6).await.unwrap(), Some(expected));
}

#[tokio::test]
async fn block_without_coinbase_or_transactions() {
    let h = setup(FlatReward(1_000_000)).await;
    let block = empty_block(0);
    h.db.save_block(&block).await.unwrap();
    assert_eq!(h.db.get_block_by_height(0).await.unwrap(), Some(block));
    assert!(h.db.get_leaderboard(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn header_and_hash_lookups_skip_the_body() {
    let h = setup(FlatReward(0)).await;
    let block = full_block(12);
    h.db.save_block(&block).await.unwrap();

    assert_eq!(
        h.db.get_block_header_by_height(12).await.unwrap(),
        Some(block.header.clone())
    );
    assert_eq!(
        h.db.get_block_header_by_hash(&block.block_hash).await.unwrap(),
        Some(block.header.clone())
    );
    assert_eq!(
        h.db.get_block_hash_by_height(12).await.unwrap(),
        Some(block.block_hash.clone())
    );
}

#[tokio::test]
async fn transaction_and_transition_lookups() {
    let h = setup(FlatReward(0)).await;
    let first = full_block(3);
    let second = full_block(4);
    h.db.save_block(&first).await.unwrap();
    h.db.save_block(&second).await.unwrap();

    let tx_id = second.transactions[1].id().clone();
    assert_eq!(
        h.db.get_block_from_transaction_id(&tx_id).await.unwrap(),
        Some(second.clone())
    );

    let Transaction::Execute(execute) = &first.transactions[0] else {
        unreachable!()
    };
    let transition_id = execute.execution.transitions[1].id.clone();
    assert_eq!(
        h.db.get_block_from_transition_id(&transition_id).await.unwrap(),
        Some(first)
    );
}

// ---------------------------------------------------------------------------
// Not found
// ---------------------------------------------------------------------------

#[tokio::test]
async fn absent_keys_are_none_not_errors() {
    let mut h = setup(FlatReward(0)).await;
    let missing_hash = BlockHash::from_bytes(&[0xee; 32]).unwrap();

    assert_eq!(h.db.get_block_by_height(999_999).await.unwrap(), None);
    assert_eq!(h.db.get_block_by_hash(&missing_hash).await.unwrap(), None);
    assert_eq!(
        h.db.get_block_from_transaction_id(&TransactionId::from_bytes(&[1; 32]).unwrap())
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        h.db.get_block_from_transition_id(&TransitionId::from_bytes(&[1; 32]).unwrap())
            .await
            .unwrap(),
        None
    );
    assert_eq!(h.db.get_block_header_by_height(1).await.unwrap(), None);
    assert_eq!(h.db.get_block_hash_by_height(1).await.unwrap(), None);
    assert_eq!(h.db.get_latest_height().await.unwrap(), None);
    assert_eq!(h.db.get_latest_block().await.unwrap(), None);
    assert!(h.db.get_recent_blocks().await.unwrap().is_empty());
    assert_eq!(h.db.get_leaderboard_reward(&prover(1)).await.unwrap(), None);

    // Absence never reaches the status channel.
    assert_eq!(h.statuses(), vec![StatusMessage::Connected]);
}

// ---------------------------------------------------------------------------
// Atomicity
// ---------------------------------------------------------------------------

async fn assert_store_empty(h: &Harness) {
    let raw = h.raw().await;
    for table in ALL_TABLES {
        assert_eq!(count_rows(&raw, table).await, 0, "rows left in {table}");
    }
}

#[tokio::test]
async fn deploy_transaction_aborts_the_whole_block() {
    let mut h = setup(FlatReward(1_000_000)).await;
    let fee = Fee {
        transition: transition(99, 0),
        global_state_root: StateRoot::from_bytes(&[2; 32]).unwrap(),
        inclusion_proof: None,
    };
    let deploy = Transaction::Deploy(DeployTransaction {
        id: TransactionId::from_bytes(&[9; 32]).unwrap(),
        program_id: "token.aleo".parse().unwrap(),
        fee,
    });
    let block = block(5, vec![execute(50, 2), deploy], Some(coinbase(5, &[1, 2])));

    let err = h.db.save_block(&block).await.unwrap_err();
    assert!(err.is_unsupported_variant(), "{err}");

    assert_eq!(h.db.get_block_by_height(5).await.unwrap(), None);
    assert_eq!(h.db.get_block_by_hash(&block.block_hash).await.unwrap(), None);
    assert_store_empty(&h).await;

    let statuses = h.statuses();
    assert!(matches!(
        statuses.last(),
        Some(StatusMessage::DatabaseError(_))
    ));
    assert!(!statuses.contains(&StatusMessage::BlockAdded(5)));
}

#[tokio::test]
async fn unmodeled_shapes_abort_ingestion() {
    let h = setup(FlatReward(1_000_000)).await;

    let mut with_finalize = full_block(1);
    if let Transaction::Execute(tx) = &mut with_finalize.transactions[1] {
        tx.execution.transitions[0].finalize = Some(vec!["1u64".parse().unwrap()]);
    }

    let mut with_fee = full_block(1);
    if let Transaction::Execute(tx) = &mut with_fee.transactions[0] {
        tx.additional_fee = Some(Fee {
            transition: transition(77, 0),
            global_state_root: StateRoot::from_bytes(&[3; 32]).unwrap(),
            inclusion_proof: None,
        });
    }

    let mut with_public_input = full_block(1);
    if let Transaction::Execute(tx) = &mut with_public_input.transactions[0] {
        tx.execution.transitions[1].inputs.push(TransitionInput::Public {
            plaintext_hash: field(1),
            plaintext: Some("5u64".parse().unwrap()),
        });
    }

    let mut with_external_output = full_block(1);
    if let Transaction::Execute(tx) = &mut with_external_output.transactions[1] {
        tx.execution.transitions[0]
            .outputs
            .push(TransitionOutput::ExternalRecord {
                commitment: field(2),
            });
    }

    for block in [with_finalize, with_fee, with_public_input, with_external_output] {
        let err = h.db.save_block(&block).await.unwrap_err();
        assert!(
            matches!(err, DbError::UnsupportedVariant { .. }),
            "expected unsupported variant, got {err}"
        );
    }
    assert_store_empty(&h).await;

    // The store is still usable afterwards.
    let good = full_block(1);
    h.db.save_block(&good).await.unwrap();
    assert_eq!(h.db.get_block_by_height(1).await.unwrap(), Some(good));
}

#[tokio::test]
async fn duplicate_height_is_rejected_and_keeps_the_original() {
    let mut h = setup(FlatReward(1_000_000)).await;
    let original = full_block(2);
    h.db.save_block(&original).await.unwrap();

    let mut conflicting = full_block(2);
    conflicting.block_hash = BlockHash::from_bytes(&[0x77; 32]).unwrap();
    let err = h.db.save_block(&conflicting).await.unwrap_err();
    assert!(matches!(err, DbError::Sql(_)), "{err}");

    assert_eq!(h.db.get_block_by_height(2).await.unwrap(), Some(original));
    assert_eq!(h.db.get_block_by_hash(&conflicting.block_hash).await.unwrap(), None);
    assert!(matches!(
        h.statuses().last(),
        Some(StatusMessage::DatabaseError(_))
    ));
}

// ---------------------------------------------------------------------------
// Reconstruction gates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_discriminator_on_read_is_fatal() {
    let mut h = setup(FlatReward(0)).await;
    h.db.save_block(&full_block(6)).await.unwrap();

    let raw = h.raw().await;
    sqlx::query("UPDATE transition_input SET type = 'Constant' WHERE input_index = 0")
        .execute(&raw)
        .await
        .unwrap();

    let err = h.db.get_block_by_height(6).await.unwrap_err();
    assert!(err.is_unsupported_variant(), "{err}");
    assert!(matches!(
        h.statuses().last(),
        Some(StatusMessage::DatabaseError(_))
    ));
}

#[tokio::test]
async fn missing_variant_row_is_corruption() {
    let h = setup(FlatReward(0)).await;
    h.db.save_block(&full_block(6)).await.unwrap();

    let raw = h.raw().await;
    sqlx::query("DELETE FROM transition_output_record")
        .execute(&raw)
        .await
        .unwrap();

    let err = h.db.get_block_by_height(6).await.unwrap_err();
    assert!(matches!(err, DbError::Corrupt(_)), "{err}");
}

/// Attach a fee record, with one fee transition, to the first transaction
/// of the block at `height`. Returns the fee transition's id.
async fn attach_fee(raw: &AnyPool, height: u32) -> TransitionId {
    let transaction_row: i64 = sqlx::query_scalar(
        "SELECT bt.id FROM block_transaction bt JOIN block b ON b.id = bt.block_id \
         WHERE b.height = $1 ORDER BY bt.tx_index LIMIT 1",
    )
    .bind(i64::from(height))
    .fetch_one(raw)
    .await
    .unwrap();

    let fee_row: i64 = sqlx::query_scalar(
        "INSERT INTO fee (transaction_id, global_state_root, inclusion_proof) \
         VALUES ($1, $2, NULL) RETURNING id",
    )
    .bind(transaction_row)
    .bind(StateRoot::from_bytes(&[4; 32]).unwrap().as_str())
    .fetch_one(raw)
    .await
    .unwrap();

    let fee_transition = transition(height * 1000, 0);
    sqlx::query(
        "INSERT INTO transition (transition_id, fee_id, program_id, function_name, proof, \
         tpk, tcm, fee, transition_index) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0)",
    )
    .bind(fee_transition.id.as_str())
    .bind(fee_row)
    .bind(fee_transition.program_id.as_str())
    .bind(fee_transition.function_name.as_str())
    .bind(fee_transition.proof.as_str())
    .bind(fee_transition.tpk.as_str())
    .bind(fee_transition.tcm.as_str())
    .bind(fee_transition.fee)
    .execute(raw)
    .await
    .unwrap();

    fee_transition.id
}

#[tokio::test]
async fn fee_record_on_read_is_unsupported() {
    let mut h = setup(FlatReward(0)).await;
    h.db.save_block(&full_block(5)).await.unwrap();
    h.db.save_block(&full_block(6)).await.unwrap();

    let raw = h.raw().await;
    attach_fee(&raw, 6).await;

    let err = h.db.get_block_by_height(6).await.unwrap_err();
    assert!(
        matches!(err, DbError::UnsupportedVariant { entity: "fee", .. }),
        "{err}"
    );
    assert!(matches!(
        h.statuses().last(),
        Some(StatusMessage::DatabaseError(_))
    ));

    // Other blocks are unaffected.
    assert_eq!(h.db.get_block_by_height(5).await.unwrap(), Some(full_block(5)));
}

#[tokio::test]
async fn transition_lookup_follows_fee_records() {
    let h = setup(FlatReward(0)).await;
    h.db.save_block(&full_block(5)).await.unwrap();
    h.db.save_block(&full_block(6)).await.unwrap();

    let fee_transition = transition(6 * 1000, 0).id;
    assert_eq!(
        h.db.get_block_from_transition_id(&fee_transition).await.unwrap(),
        None
    );

    let raw = h.raw().await;
    assert_eq!(attach_fee(&raw, 6).await, fee_transition);

    // The fee join resolves to block 6, whose fee record then gates the read.
    // Resolving to block 5 would succeed, and no match at all is `Ok(None)`.
    let err = h
        .db
        .get_block_from_transition_id(&fee_transition)
        .await
        .unwrap_err();
    assert!(
        matches!(err, DbError::UnsupportedVariant { entity: "fee", .. }),
        "{err}"
    );
}

#[tokio::test]
async fn execute_without_execution_row_is_corruption() {
    let h = setup(FlatReward(0)).await;
    let bare = block(6, vec![execute(60, 0)], None);
    h.db.save_block(&bare).await.unwrap();
    assert_eq!(h.db.get_block_by_height(6).await.unwrap(), Some(bare));

    let raw = h.raw().await;
    sqlx::query("DELETE FROM transaction_execute")
        .execute(&raw)
        .await
        .unwrap();

    let err = h.db.get_block_by_height(6).await.unwrap_err();
    assert!(matches!(err, DbError::Corrupt(_)), "{err}");
}

// ---------------------------------------------------------------------------
// Rewards & leaderboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partial_solutions_are_rewarded_by_target() {
    let reward = 1_234_567_891u64;
    let h = setup(FlatReward(reward)).await;
    let block = full_block(9);
    h.db.save_block(&block).await.unwrap();

    let solutions = &block.coinbase.as_ref().unwrap().partial_solutions;
    let expected = split_coinbase_reward(reward, solutions).unwrap();

    let mut credited = 0u64;
    for (solution, share) in solutions.iter().zip(&expected) {
        assert!(share.reward > 0);
        assert_eq!(
            h.db.get_leaderboard_reward(&solution.address).await.unwrap(),
            Some(share.reward)
        );
        let log = h.db.get_leaderboard_log(&solution.address).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].height, 9);
        assert_eq!(log[0].reward, share.reward);
        assert!(log[0].partial_solution_id.is_some());
        credited += share.reward;
    }
    assert!(credited <= reward / 2);

    let raw = h.raw().await;
    let targets: Vec<String> =
        sqlx::query_scalar("SELECT target FROM partial_solution ORDER BY solution_index")
            .fetch_all(&raw)
            .await
            .unwrap();
    let stored: Vec<u64> = targets.iter().map(|t| t.parse().unwrap()).collect();
    let derived: Vec<u64> = expected.iter().map(|s| s.target).collect();
    assert_eq!(stored, derived);
}

#[tokio::test]
async fn zero_reward_records_zero_targets_and_no_credit() {
    let h = setup(FlatReward(0)).await;
    let block = full_block(4);
    h.db.save_block(&block).await.unwrap();

    let raw = h.raw().await;
    let targets: Vec<String> = sqlx::query_scalar("SELECT target FROM partial_solution")
        .fetch_all(&raw)
        .await
        .unwrap();
    assert_eq!(targets, vec!["0", "0", "0"]);
    assert_eq!(count_rows(&raw, "leaderboard").await, 0);
    assert_eq!(count_rows(&raw, "leaderboard_log").await, 0);

    // The solutions themselves are still stored in full.
    assert_eq!(h.db.get_block_by_height(4).await.unwrap(), Some(block));
}

#[tokio::test]
async fn reward_uses_previous_latest_coinbase_timestamp() {
    let calls: Arc<Mutex<Vec<(u32, i64)>>> = Arc::default();
    let recorder = Arc::clone(&calls);
    let h = setup(move |height: u32, timestamp: i64| {
        recorder.lock().unwrap().push((height, timestamp));
        1_000
    })
    .await;

    let first = full_block(20);
    h.db.save_block(&first).await.unwrap();
    // No coinbase, so no reward call.
    h.db.save_block(&empty_block(22)).await.unwrap();
    h.db.save_block(&block(23, Vec::new(), Some(coinbase(23, &[4]))))
        .await
        .unwrap();

    let calls = calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        (20, first.header.metadata.last_coinbase_timestamp),
        "empty store falls back to the block's own header"
    );
    assert_eq!(
        calls[1],
        (23, empty_block(22).header.metadata.last_coinbase_timestamp),
        "previous latest block, not the one being saved"
    );
}

#[tokio::test]
async fn leaderboard_matches_its_log() {
    let h = setup(|height: u32, _ts: i64| 10_000 + u64::from(height)).await;
    for height in 1..=6 {
        h.db.save_block(&block(height, Vec::new(), Some(coinbase(height, &[1, 2, 3]))))
            .await
            .unwrap();
    }
    h.db.update_leaderboard(7, &BTreeMap::from([(prover(2), 55)]))
        .await
        .unwrap();

    for seed in [1, 2, 3] {
        let address = prover(seed);
        let total = h.db.get_leaderboard_reward(&address).await.unwrap().unwrap();
        let logged: u64 = h
            .db
            .get_leaderboard_log(&address)
            .await
            .unwrap()
            .iter()
            .map(|entry| entry.reward)
            .sum();
        assert_eq!(total, logged, "prover {seed}");
    }
}

#[tokio::test]
async fn update_leaderboard_credits_and_logs() {
    let h = setup(FlatReward(0)).await;
    let rewards = BTreeMap::from([(prover(1), 300), (prover(2), 700), (prover(3), 0)]);
    h.db.update_leaderboard(42, &rewards).await.unwrap();
    h.db.update_leaderboard(43, &BTreeMap::from([(prover(1), 500)]))
        .await
        .unwrap();

    let board = h.db.get_leaderboard(10).await.unwrap();
    let ranked: Vec<_> = board
        .iter()
        .map(|e| (e.address.clone(), e.total_reward))
        .collect();
    assert_eq!(ranked, vec![(prover(1), 800), (prover(2), 700)]);

    assert_eq!(h.db.get_leaderboard(1).await.unwrap().len(), 1);
    assert_eq!(h.db.get_leaderboard_reward(&prover(3)).await.unwrap(), None);

    let log = h.db.get_leaderboard_log(&prover(1)).await.unwrap();
    assert_eq!(
        log.iter().map(|e| (e.height, e.reward)).collect::<Vec<_>>(),
        vec![(42, 300), (43, 500)]
    );
    assert!(log.iter().all(|e| e.partial_solution_id.is_none()));
}

// ---------------------------------------------------------------------------
// Ranges & search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn range_is_half_open_and_descending() {
    let h = setup(FlatReward(0)).await;
    for height in 10..=20 {
        h.db.save_block(&empty_block(height)).await.unwrap();
    }

    let heights = |blocks: Vec<Block>| blocks.iter().map(Block::height).collect::<Vec<_>>();

    assert_eq!(
        heights(h.db.get_block_range(20, 15).await.unwrap()),
        vec![20, 19, 18, 17, 16]
    );
    assert!(h.db.get_block_range(15, 20).await.unwrap().is_empty());
    assert_eq!(
        heights(h.db.get_recent_blocks().await.unwrap()),
        (10..=20).rev().collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn recent_blocks_cover_the_last_thirty() {
    let h = setup(FlatReward(0)).await;
    for height in 0..40 {
        h.db.save_block(&empty_block(height)).await.unwrap();
    }
    let recent = h.db.get_recent_blocks().await.unwrap();
    assert_eq!(recent.len(), 30);
    assert_eq!(recent.first().map(Block::height), Some(39));
    assert_eq!(recent.last().map(Block::height), Some(10));
}

#[tokio::test]
async fn prefix_search_is_exact_and_case_sensitive() {
    let h = setup(FlatReward(0)).await;
    let blocks: Vec<Block> = (1..=3).map(full_block).collect();
    for block in &blocks {
        h.db.save_block(block).await.unwrap();
    }

    let mut all = h.db.search_block_hash("ab1").await.unwrap();
    all.sort();
    let mut expected: Vec<BlockHash> = blocks.iter().map(|b| b.block_hash.clone()).collect();
    expected.sort();
    assert_eq!(all, expected);

    let target = &blocks[1].block_hash;
    assert_eq!(
        h.db.search_block_hash(target.as_str()).await.unwrap(),
        vec![target.clone()]
    );
    assert!(h.db.search_block_hash("AB1").await.unwrap().is_empty());
    assert!(h.db.search_block_hash("ab1%").await.unwrap().is_empty());

    let tx_id = blocks[2].transactions[0].id();
    assert_eq!(
        h.db.search_transaction_id(&tx_id.as_str()[..20]).await.unwrap(),
        vec![tx_id.clone()]
    );
    assert_eq!(h.db.search_transaction_id("at1").await.unwrap().len(), 6);
    assert_eq!(h.db.search_transition_id("as1").await.unwrap().len(), 9);
    assert!(h.db.search_transition_id("at1").await.unwrap().is_empty());
}
