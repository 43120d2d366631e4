//! Error types for the votebatch toolkit

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for votebatch operations
pub type Result<T> = std::result::Result<T, VoteBatchError>;

/// Coarse classification of a [`VoteBatchError`].
///
/// Callers branch on the kind (retry, reject a single record, reject a
/// submission) without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedVoteRecord,
    InclusionFailure,
    UnsatisfiedRelation,
    ProofEngineFailure,
    VerificationFailure,
    ReplaySubmission,
    DuplicateNullifier,
    ChallengeWindowExpired,
    InvalidBatchShape,
    InvalidTransition,
    UnknownBatch,
    InvalidConfig,
    Serialization,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Main error type for votebatch operations
#[derive(Debug, Error)]
pub enum VoteBatchError {
    /// A vote record failed structural validation
    #[error("Malformed vote record: {0}")]
    MalformedVoteRecord(String),

    /// A credential commitment is not a leaf of the credential tree
    #[error("Inclusion failure: {0}")]
    InclusionFailure(String),

    /// The witness does not satisfy the batch relation
    #[error("Unsatisfied relation: {0}")]
    UnsatisfiedRelation(String),

    /// Internal failure of the proving backend
    #[error("Proof engine failure: {0}")]
    ProofEngineFailure(String),

    /// A proof or its public claim was rejected
    #[error("Verification failure: {0}")]
    VerificationFailure(String),

    /// The `(merkle_root, counts_hash)` pair was already accepted
    #[error("Replay submission: {0}")]
    ReplaySubmission(String),

    /// A nullifier is already spent or repeated
    #[error("Duplicate nullifier: {0}")]
    DuplicateNullifier(String),

    /// The dispute window of the batch has closed
    #[error("Challenge window expired for batch {0}")]
    ChallengeWindowExpired(String),

    /// A batch does not fit the relation's fixed shape
    #[error("Invalid batch shape: {0}")]
    InvalidBatchShape(String),

    /// A batch state machine transition that is not allowed
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// No batch is known under the given identifier
    #[error("Unknown batch: {0}")]
    UnknownBatch(String),

    /// Invalid poll or engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl VoteBatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedVoteRecord(_) => ErrorKind::MalformedVoteRecord,
            Self::InclusionFailure(_) => ErrorKind::InclusionFailure,
            Self::UnsatisfiedRelation(_) => ErrorKind::UnsatisfiedRelation,
            Self::ProofEngineFailure(_) => ErrorKind::ProofEngineFailure,
            Self::VerificationFailure(_) => ErrorKind::VerificationFailure,
            Self::ReplaySubmission(_) => ErrorKind::ReplaySubmission,
            Self::DuplicateNullifier(_) => ErrorKind::DuplicateNullifier,
            Self::ChallengeWindowExpired(_) => ErrorKind::ChallengeWindowExpired,
            Self::InvalidBatchShape(_) => ErrorKind::InvalidBatchShape,
            Self::InvalidTransition(_) => ErrorKind::InvalidTransition,
            Self::UnknownBatch(_) => ErrorKind::UnknownBatch,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::SerializationError(_) => ErrorKind::Serialization,
            Self::IoError(_) => ErrorKind::Io,
        }
    }

    /// Whether a fresh attempt with new prover randomness may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ProofEngineFailure
    }

    pub fn malformed_record(msg: impl Into<String>) -> Self {
        Self::MalformedVoteRecord(msg.into())
    }

    pub fn inclusion_failure(msg: impl Into<String>) -> Self {
        Self::InclusionFailure(msg.into())
    }

    pub fn unsatisfied(msg: impl Into<String>) -> Self {
        Self::UnsatisfiedRelation(msg.into())
    }

    pub fn proof_engine(msg: impl Into<String>) -> Self {
        Self::ProofEngineFailure(msg.into())
    }

    pub fn verification(msg: impl Into<String>) -> Self {
        Self::VerificationFailure(msg.into())
    }

    pub fn replay(msg: impl Into<String>) -> Self {
        Self::ReplaySubmission(msg.into())
    }

    pub fn window_expired(batch: impl fmt::Display) -> Self {
        Self::ChallengeWindowExpired(batch.to_string())
    }

    pub fn unknown_batch(batch: impl fmt::Display) -> Self {
        Self::UnknownBatch(batch.to_string())
    }

    pub fn duplicate_nullifier(msg: impl Into<String>) -> Self {
        Self::DuplicateNullifier(msg.into())
    }

    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidBatchShape(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn serialization_error(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }
}

impl From<serde_json::Error> for VoteBatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for VoteBatchError {
    fn from(err: bincode::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
