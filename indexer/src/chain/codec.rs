//! # Column Codec
//!
//! Value types of the block graph and their column representations.
//! Everything here is pure: a value goes to a `TEXT`, `BIGINT` or bytes
//! column and comes back out identical, or the decode fails loudly.
//!
//! | Kind             | Types                                              | Column  |
//! |------------------|----------------------------------------------------|---------|
//! | bech32m id       | `BlockHash`, `TransactionId`, `TransitionId`, ...  | `TEXT`  |
//! | decimal scalar   | `Field`, `Group`, `Fq`                             | `TEXT`  |
//! | prefixed opaque  | `Proof`, `Plaintext`, `Value`                      | `TEXT`  |
//! | binary payload   | `Ciphertext`, `RecordCiphertext`                   | bytes   |
//! | integers         | `u32`, `u64` (checked, never truncated)            | `BIGINT`|
//!
//! Textual types keep their canonical string form; `Display` writes it back
//! verbatim and `FromStr` validates it. serde goes through the same string.

use std::fmt;
use std::str::FromStr;

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32m, Hrp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// A value that cannot be represented in, or recovered from, its column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid bech32m string: {0}")]
    Bech32(String),

    #[error("expected prefix {expected:?}, found {found:?}")]
    WrongPrefix {
        expected: &'static str,
        found: String,
    },

    #[error("malformed {kind}: {value:?}")]
    Malformed { kind: &'static str, value: String },

    #[error("invalid hex payload: {0}")]
    Hex(String),

    #[error("integer {value} does not fit column {column}")]
    IntegerOutOfRange { column: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Bech32m Identifiers
// ---------------------------------------------------------------------------

fn encode_bech32m(hrp: &'static str, bytes: &[u8]) -> Result<String, CodecError> {
    let hrp = Hrp::parse(hrp).map_err(|e| CodecError::Bech32(e.to_string()))?;
    bech32::encode::<Bech32m>(hrp, bytes).map_err(|e| CodecError::Bech32(e.to_string()))
}

fn decode_bech32m(expected: &'static str, text: &str) -> Result<Vec<u8>, CodecError> {
    // Plain bech32 checksums are rejected.
    let checked = CheckedHrpstring::new::<Bech32m>(text)
        .map_err(|e| CodecError::Bech32(e.to_string()))?;
    let hrp = checked.hrp();
    if hrp.as_str() != expected {
        return Err(CodecError::WrongPrefix {
            expected,
            found: hrp.to_string(),
        });
    }
    Ok(checked.byte_iter().collect())
}

macro_rules! bech32_id {
    ($(#[$meta:meta])* $name:ident, $hrp:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Human-readable bech32m prefix.
            pub const HRP: &'static str = $hrp;

            /// Encode raw bytes under this type's prefix.
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
                encode_bech32m(Self::HRP, bytes).map(Self)
            }

            /// Decode back to the raw payload bytes.
            pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
                decode_bech32m(Self::HRP, &self.0)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_bech32m(Self::HRP, s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = CodecError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                decode_bech32m(Self::HRP, &s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

bech32_id!(
    /// Hash of a block header.
    BlockHash,
    "ab"
);
bech32_id!(
    /// Stable transaction id.
    TransactionId,
    "at"
);
bech32_id!(
    /// Transition id, unique across the chain.
    TransitionId,
    "as"
);
bech32_id!(
    /// Global state root an execution was proven against.
    StateRoot,
    "ar"
);
bech32_id!(
    /// Account address of a prover.
    Address,
    "aleo"
);
bech32_id!(
    /// Commitment of a prover's partial solution.
    PuzzleCommitment,
    "puzzle"
);
bech32_id!(
    /// Block producer signature.
    Signature,
    "sign"
);

impl PuzzleCommitment {
    /// Proof target of this commitment.
    ///
    /// The commitment bytes are hashed with double SHA-256, the first eight
    /// digest bytes are read as a little-endian `h`, and the target is
    /// `u64::MAX / h`. A zero `h` maps to `u64::MAX`. Every target is >= 1.
    pub fn to_target(&self) -> Result<u64, CodecError> {
        let bytes = self.to_bytes()?;
        let digest = Sha256::digest(Sha256::digest(&bytes));
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(word);
        Ok(u64::MAX.checked_div(hash).unwrap_or(u64::MAX))
    }
}

// ---------------------------------------------------------------------------
// Decimal Scalars
// ---------------------------------------------------------------------------

fn check_decimal(kind: &'static str, suffix: &str, text: &str) -> Result<(), CodecError> {
    let digits = text.strip_suffix(suffix).unwrap_or("");
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::Malformed {
            kind,
            value: text.to_string(),
        });
    }
    Ok(())
}

macro_rules! decimal_scalar {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $suffix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Canonical text, suffix included.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                check_decimal($kind, $suffix, s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = CodecError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                check_decimal($kind, $suffix, &s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

decimal_scalar!(
    /// Scalar field element, e.g. `42field`.
    Field,
    "field",
    "field"
);
decimal_scalar!(
    /// Group element by its x-coordinate, e.g. `7group`.
    Group,
    "group",
    "group"
);
decimal_scalar!(
    /// Base field element of the pairing curve, bare decimal.
    Fq,
    "base field element",
    ""
);

// ---------------------------------------------------------------------------
// Opaque Text
// ---------------------------------------------------------------------------

macro_rules! opaque_text {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            fn check(s: &str) -> Result<(), CodecError> {
                match s.strip_prefix($prefix) {
                    Some(rest) if !rest.is_empty() => Ok(()),
                    _ => Err(CodecError::Malformed {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::check(s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = CodecError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::check(&s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

opaque_text!(
    /// Serialized zero-knowledge proof.
    Proof,
    "proof",
    "proof1"
);
opaque_text!(
    /// Public plaintext carried by constant/public inputs and outputs.
    Plaintext,
    "plaintext",
    ""
);
opaque_text!(
    /// One finalize argument.
    Value,
    "value",
    ""
);

// ---------------------------------------------------------------------------
// Binary Payloads
// ---------------------------------------------------------------------------

macro_rules! binary_payload {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = CodecError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                hex::decode(&s)
                    .map(Self)
                    .map_err(|e| CodecError::Hex(e.to_string()))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                hex::encode(value.0)
            }
        }
    };
}

binary_payload!(
    /// Encrypted private input or output.
    Ciphertext
);
binary_payload!(
    /// Encrypted record produced by a transition.
    RecordCiphertext
);

// ---------------------------------------------------------------------------
// Program Identifiers
// ---------------------------------------------------------------------------

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Function or program name: `[A-Za-z][A-Za-z0-9_]*`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl TryFrom<String> for Identifier {
    type Error = CodecError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if !is_identifier(&s) {
            return Err(CodecError::Malformed {
                kind: "identifier",
                value: s,
            });
        }
        Ok(Self(s))
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> String {
        value.0
    }
}

/// Program id, `name.network` (e.g. `credits.aleo`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProgramId(String);

impl ProgramId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProgramId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl TryFrom<String> for ProgramId {
    type Error = CodecError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let valid = matches!(
            s.split_once('.'),
            Some((name, network)) if is_identifier(name) && is_identifier(network)
        );
        if !valid {
            return Err(CodecError::Malformed {
                kind: "program id",
                value: s,
            });
        }
        Ok(Self(s))
    }
}

impl From<ProgramId> for String {
    fn from(value: ProgramId) -> String {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Integer Columns
// ---------------------------------------------------------------------------

/// Store a `u64` in a signed 64-bit column.
pub fn u64_to_column(column: &'static str, value: u64) -> Result<i64, CodecError> {
    i64::try_from(value).map_err(|_| CodecError::IntegerOutOfRange {
        column,
        value: value.to_string(),
    })
}

/// Read a `u64` back from a signed 64-bit column.
pub fn column_to_u64(column: &'static str, value: i64) -> Result<u64, CodecError> {
    u64::try_from(value).map_err(|_| CodecError::IntegerOutOfRange {
        column,
        value: value.to_string(),
    })
}

/// Read a `u32` back from a signed 64-bit column.
pub fn column_to_u32(column: &'static str, value: i64) -> Result<u32, CodecError> {
    u32::try_from(value).map_err(|_| CodecError::IntegerOutOfRange {
        column,
        value: value.to_string(),
    })
}

/// Parse a decimal `u64` stored as text (nonces and targets use the full range).
pub fn text_to_u64(column: &'static str, value: &str) -> Result<u64, CodecError> {
    value.parse().map_err(|_| CodecError::Malformed {
        kind: column,
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
