//! The bucket list storage engine: immutable content-addressed buckets, the
//! k-way merge protocol between them, and the eleven-level cascade that
//! ties ledger closes to a single deterministic hash.
//!
//! This crate owns the data model and the pure transition logic. It does
//! not own a directory, a worker pool, or an interning cache — those belong
//! to `BucketManager` in `ledger-node`, which implements `MergeSpawner` and
//! drives `BucketList::add_batch` from the ledger-close path.

pub mod archive_state;
pub mod bucket;
pub mod bucket_list;
pub mod counters;
pub mod entry;
pub mod error;
pub mod future_bucket;
pub mod level;
pub mod merge;
pub mod protocol;

pub use archive_state::{restore, HistoryArchiveState, PersistedLevel};
pub use bucket::Bucket;
pub use bucket_list::{BucketList, SKIP_1, SKIP_2, SKIP_3, SKIP_4};
pub use counters::MergeCounters;
pub use entry::{BucketEntry, BucketMetaEntry, LedgerEntry, LedgerKey};
pub use error::BucketError;
pub use future_bucket::{FutureBucket, MergeOutcome, MergeRecipe, MergeSpawner, PersistedFuture};
pub use level::{level_half, snaps_at, spills_at, BucketLevel, NUM_LEVELS};
pub use merge::{run_merge, MergeInputs};
pub use protocol::{ProtocolVersion, FIRST_PROTOCOL_SUPPORTING_INIT_AND_META};
