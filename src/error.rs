use crate::*;

use thiserror::Error;

/// Error types
///
/// Every failing call is terminal and non-partial: nothing is mutated on
/// the failing path.
#[derive(Debug, Error)]
pub enum Error {
    #[error("univote: missing capability: {0}")]
    Unauthorized(Role),

    #[error("univote: {0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("univote: {0} already exists: {1}")]
    AlreadyExists(&'static str, String),

    #[error("univote: wrong phase: expected {expected}, got {actual}")]
    WrongPhase {
        expected: ElectionPhase,
        actual: ElectionPhase,
    },

    #[error("univote: {0}")]
    Timing(&'static str),

    #[error("univote: nullifier already recorded for this election")]
    Replay,

    #[error("univote: proof rejected: {0}")]
    ProofInvalid(&'static str),

    #[error("univote: election is cancelled")]
    Paused,

    #[error("univote: invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("univote: election already completed")]
    AlreadyCompleted,

    #[error("univote: voter leaf is not in the eligibility set")]
    NotEligible,

    #[error("univote: vote preparation cancelled")]
    Cancelled,

    #[error("univote: invalid identifier - invalid hexidecimal")]
    IdentifierBadHex,

    #[error("univote: invalid identifier - wrong length")]
    IdentifierBadLen,

    #[error("univote: CBOR error deserializing payload: {0}")]
    CBORDeserialization(#[from] serde_cbor::Error),

    #[error("univote: JSON error deserializing payload: {0}")]
    JSONDeserialization(#[from] serde_json::Error),

    #[error("univote: ballot encryption failed")]
    EncryptionFailed,

    #[error("univote: ballot decryption failed")]
    DecryptionFailed,

    #[error("univote: prover failed: {0}")]
    ProverFailed(String),
}
