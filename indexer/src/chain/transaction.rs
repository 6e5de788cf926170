//! # Transactions & Transitions
//!
//! ```text
//! Transaction ─┬─ Deploy   (recognized, not indexed)
//!              └─ Execute ── Execution ── Transition*
//!                                           ├── TransitionInput*  (Private | Record | ...)
//!                                           ├── TransitionOutput* (Record | ...)
//!                                           └── finalize?         (not indexed)
//! ```
//!
//! Each tagged union has a matching `*Kind` discriminator whose `as_str()`
//! is what the schema stores in its `type` column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::codec::{
    Ciphertext, CodecError, Field, Group, Identifier, Plaintext, ProgramId, Proof,
    RecordCiphertext, StateRoot, TransactionId, TransitionId, Value,
};

/// Declares a `Copy` discriminator enum with its stored text.
macro_rules! discriminator {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Text stored in the discriminator column.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(CodecError::Malformed {
                        kind: $what,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

discriminator!(
    /// Discriminator of [`Transaction`].
    TransactionKind, "transaction type" {
        Deploy => "Deploy",
        Execute => "Execute",
    }
);

discriminator!(
    /// Discriminator of [`TransitionInput`].
    TransitionInputKind, "transition input type" {
        Constant => "Constant",
        Public => "Public",
        Private => "Private",
        Record => "Record",
        ExternalRecord => "ExternalRecord",
    }
);

discriminator!(
    /// Discriminator of [`TransitionOutput`].
    TransitionOutputKind, "transition output type" {
        Constant => "Constant",
        Public => "Public",
        Private => "Private",
        Record => "Record",
        ExternalRecord => "ExternalRecord",
    }
);

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A confirmed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    Deploy(DeployTransaction),
    Execute(ExecuteTransaction),
}

impl Transaction {
    pub fn id(&self) -> &TransactionId {
        match self {
            Self::Deploy(tx) => &tx.id,
            Self::Execute(tx) => &tx.id,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Deploy(_) => TransactionKind::Deploy,
            Self::Execute(_) => TransactionKind::Execute,
        }
    }
}

/// Program deployment. Carried through the model so ingestion can refuse it
/// explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTransaction {
    pub id: TransactionId,
    pub program_id: ProgramId,
    pub fee: Fee,
}

/// Program execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteTransaction {
    pub id: TransactionId,
    pub execution: Execution,
    /// Optional priority fee. Not indexed yet.
    pub additional_fee: Option<Fee>,
}

/// The proven transitions of one execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub transitions: Vec<Transition>,
    pub global_state_root: StateRoot,
    pub inclusion_proof: Option<Proof>,
}

/// Fee payment: a single `credits.aleo` transition plus its proof context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub transition: Transition,
    pub global_state_root: StateRoot,
    pub inclusion_proof: Option<Proof>,
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// One function call inside an execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub program_id: ProgramId,
    pub function_name: Identifier,
    pub inputs: Vec<TransitionInput>,
    pub outputs: Vec<TransitionOutput>,
    /// Finalize arguments. Not indexed yet; ingestion refuses `Some`.
    pub finalize: Option<Vec<Value>>,
    pub proof: Proof,
    /// Transition public key.
    pub tpk: Group,
    /// Transition commitment.
    pub tcm: Field,
    pub fee: i64,
}

/// A transition input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionInput {
    Constant {
        plaintext_hash: Field,
        plaintext: Option<Plaintext>,
    },
    Public {
        plaintext_hash: Field,
        plaintext: Option<Plaintext>,
    },
    Private {
        ciphertext_hash: Field,
        ciphertext: Option<Ciphertext>,
    },
    Record {
        serial_number: Field,
        tag: Field,
    },
    ExternalRecord {
        input_commitment: Field,
    },
}

impl TransitionInput {
    pub fn kind(&self) -> TransitionInputKind {
        match self {
            Self::Constant { .. } => TransitionInputKind::Constant,
            Self::Public { .. } => TransitionInputKind::Public,
            Self::Private { .. } => TransitionInputKind::Private,
            Self::Record { .. } => TransitionInputKind::Record,
            Self::ExternalRecord { .. } => TransitionInputKind::ExternalRecord,
        }
    }
}

/// A transition output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionOutput {
    Constant {
        plaintext_hash: Field,
        plaintext: Option<Plaintext>,
    },
    Public {
        plaintext_hash: Field,
        plaintext: Option<Plaintext>,
    },
    Private {
        ciphertext_hash: Field,
        ciphertext: Option<Ciphertext>,
    },
    Record {
        commitment: Field,
        checksum: Field,
        record_ciphertext: Option<RecordCiphertext>,
    },
    ExternalRecord {
        commitment: Field,
    },
}

impl TransitionOutput {
    pub fn kind(&self) -> TransitionOutputKind {
        match self {
            Self::Constant { .. } => TransitionOutputKind::Constant,
            Self::Public { .. } => TransitionOutputKind::Public,
            Self::Private { .. } => TransitionOutputKind::Private,
            Self::Record { .. } => TransitionOutputKind::Record,
            Self::ExternalRecord { .. } => TransitionOutputKind::ExternalRecord,
        }
    }
}
