use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Bucket(#[from] ledger_store::BucketError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sequence(#[from] LedgerSequenceError),
}

/// The idempotency gate on the ledger-close adapter (spec.md §6): re-running
/// `close_ledger` on an already-closed sequence number is forbidden.
#[derive(Debug, Error)]
#[error("ledger {given} is not the successor of the last closed ledger {last_closed}")]
pub struct LedgerSequenceError {
    pub last_closed: u64,
    pub given: u64,
}
