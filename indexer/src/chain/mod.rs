//! # Chain Model
//!
//! The block object graph handed to the indexer, and the codec that maps
//! its value types onto columns.
//!
//! ```text
//! block.rs        — Block, header, coinbase solution
//! transaction.rs  — Transaction / Transition and their tagged variants
//! codec.rs        — bech32m ids, scalars, proofs, ciphertexts, int columns
//! ```

pub mod block;
pub mod codec;
pub mod transaction;

pub use block::{
    Block, BlockHeader, BlockHeaderMetadata, CoinbaseSolution, KzgProof, PartialSolution,
};
pub use codec::{
    Address, BlockHash, Ciphertext, CodecError, Field, Fq, Group, Identifier, Plaintext,
    ProgramId, Proof, PuzzleCommitment, RecordCiphertext, Signature, StateRoot, TransactionId,
    TransitionId, Value,
};
pub use transaction::{
    DeployTransaction, ExecuteTransaction, Execution, Fee, Transaction, TransactionKind,
    Transition, TransitionInput, TransitionInputKind, TransitionOutput, TransitionOutputKind,
};
