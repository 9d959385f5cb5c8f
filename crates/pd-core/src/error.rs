//! Error and outcome types shared across the pool.
use thiserror::Error;

/// The four outcomes a submitted share can have, in the order the original
/// event log encodes them. Carried through validation, the round journal,
/// and the event dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareOutcome {
    Success,
    Invalid,
    Stale,
    Duplicated,
}

impl ShareOutcome {
    /// Numeric code written to the round journal and the JSON-RPC `reject-reason`.
    pub fn code(self) -> u8 {
        match self {
            ShareOutcome::Success => 0,
            ShareOutcome::Invalid => 1,
            ShareOutcome::Stale => 2,
            ShareOutcome::Duplicated => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShareOutcome::Success => "SUCCESS",
            ShareOutcome::Invalid => "INVALID",
            ShareOutcome::Stale => "STALE",
            ShareOutcome::Duplicated => "DUPLICATED",
        }
    }
}

/// Why a submitted share failed Phase 1 or Phase 2 validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("data field has the wrong length")]
    IncorrectLength,
    #[error("data field is not valid hex")]
    NotHex,
    #[error("no tracked work for this merkle root")]
    UnknownWork,
    #[error("block version does not match the tracked work")]
    VersionMismatch,
    #[error("timestamp does not match the tracked work")]
    TimestampMismatch,
    #[error("previous block hash does not match the tracked work")]
    PrevBlockHashMismatch,
    #[error("user does not match the tracked work")]
    UserMismatch,
    #[error("nonce was already submitted for this work")]
    Duplicate,
    #[error("hash is not below the pool share target")]
    HashAboveTarget,
    #[error("work belongs to a block that is no longer current")]
    Stale,
}

impl ValidationError {
    /// Maps a validation failure onto the coarser [`ShareOutcome`] taxonomy
    /// used by the round journal and event log.
    pub fn outcome(&self) -> ShareOutcome {
        match self {
            ValidationError::Duplicate => ShareOutcome::Duplicated,
            ValidationError::Stale => ShareOutcome::Stale,
            _ => ShareOutcome::Invalid,
        }
    }
}

/// Failure talking to the upstream Bitcoin RPC node.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("upstream returned an RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("upstream connection refused or unreachable")]
    Unreachable,
}

/// Aggregate error type returned at crate boundaries (config, orchestrator, CLI).
#[derive(Error, Debug)]
pub enum PoolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("configuration: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
