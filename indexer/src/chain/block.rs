//! # Block Structure
//!
//! The full block graph as the indexer receives it from the node.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  block_hash, previous_hash, signature        │
//! │  BlockHeader                                 │
//! │  ├── previous_state_root: Field              │
//! │  ├── transactions_root: Field                │
//! │  ├── coinbase_accumulator_point: Field       │
//! │  └── metadata: height, round, targets, ...   │
//! ├──────────────────────────────────────────────┤
//! │  transactions: Vec<Transaction>              │
//! ├──────────────────────────────────────────────┤
//! │  coinbase: Option<CoinbaseSolution>          │
//! │  ├── proof: KzgProof { x, y_positive }       │
//! │  └── partial_solutions: Vec<PartialSolution> │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Blocks reach us already validated; nothing in this module verifies
//! hashes, signatures or proofs.

use serde::{Deserialize, Serialize};

use super::codec::{Address, BlockHash, CodecError, Field, Fq, PuzzleCommitment, Signature};
use super::transaction::Transaction;

// ---------------------------------------------------------------------------
// BlockHeader
// ---------------------------------------------------------------------------

/// Header roots plus consensus metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous_state_root: Field,
    pub transactions_root: Field,
    pub coinbase_accumulator_point: Field,
    pub metadata: BlockHeaderMetadata,
}

/// Consensus metadata of a block header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeaderMetadata {
    pub round: u64,
    pub height: u32,
    pub coinbase_target: u64,
    pub proof_target: u64,
    pub last_coinbase_target: u64,
    /// Unix seconds of the most recent block that carried a coinbase.
    pub last_coinbase_timestamp: i64,
    /// Unix seconds.
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Coinbase
// ---------------------------------------------------------------------------

/// Opening proof of the coinbase accumulator.
///
/// Only the affine x-coordinate and the sign of y are carried; y is
/// recoverable from the curve equation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KzgProof {
    pub x: Fq,
    pub y_positive: bool,
}

/// One prover's contribution to the coinbase puzzle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSolution {
    pub address: Address,
    pub nonce: u64,
    pub commitment: PuzzleCommitment,
}

impl PartialSolution {
    /// Proof target derived from the commitment.
    pub fn to_target(&self) -> Result<u64, CodecError> {
        self.commitment.to_target()
    }
}

/// Aggregated coinbase puzzle solution of a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseSolution {
    pub partial_solutions: Vec<PartialSolution>,
    pub proof: KzgProof,
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A validated block: header, ordered transactions, optional coinbase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_hash: BlockHash,
    pub previous_hash: BlockHash,
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub coinbase: Option<CoinbaseSolution>,
    pub signature: Signature,
}

impl Block {
    pub fn height(&self) -> u32 {
        self.header.metadata.height
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
