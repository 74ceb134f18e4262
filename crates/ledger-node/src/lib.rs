//! The process-wide collaborator that drives the bucket list: the content
//! interning cache, the background merge worker pool, and the ledger-close
//! adapter that turns a transaction batch into a new ledger header.

pub mod directory;
pub mod error;
pub mod interning;
pub mod ledger_close;

pub use directory::BucketDirectory;
pub use error::{LedgerSequenceError, ManagerError};
pub use interning::BucketManager;
pub use ledger_close::{close_ledger, restore_bucket_list, LedgerHeader};
