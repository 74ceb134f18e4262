use std::path::PathBuf;

use thiserror::Error;

/// The error taxonomy from the bucket list's external contract: every
/// fallible operation in this crate resolves to one of these five kinds.
#[derive(Debug, Error)]
pub enum BucketError {
    /// Malformed input from the ledger-txn collaborator: a key appeared in
    /// more than one of (init, live, dead) within a single batch.
    #[error("batch invariant violated: {0}")]
    BatchInvariantViolated(String),

    /// Cooperative shutdown interrupted an in-flight merge. Transient: the
    /// persisted archive state lets the merge be restarted.
    #[error("merge aborted")]
    MergeAborted,

    /// A bucket file's content hash does not match its filename, or a read
    /// failed to parse a well-formed record stream.
    #[error("bucket corrupt at {path:?}: {reason}")]
    BucketCorrupt { path: Option<PathBuf>, reason: String },

    /// Underlying disk I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An INIT or META entry was observed while running below the protocol
    /// version that introduced them.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl From<ledger_format::DataReadError> for BucketError {
    fn from(e: ledger_format::DataReadError) -> Self {
        BucketError::BucketCorrupt {
            path: None,
            reason: e.to_string(),
        }
    }
}

impl From<ledger_format::DataWriteError> for BucketError {
    fn from(e: ledger_format::DataWriteError) -> Self {
        match e {
            ledger_format::DataWriteError::Io(io) => BucketError::Io(io),
            other => BucketError::BucketCorrupt {
                path: None,
                reason: other.to_string(),
            },
        }
    }
}
