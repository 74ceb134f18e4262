use std::path::{Path, PathBuf};

use ledger_format::Hash256;

use crate::{
    bucket::Bucket,
    counters::MergeCounters,
    entry::{LedgerEntry, LedgerKey},
    error::BucketError,
    future_bucket::MergeSpawner,
    level::{level_half, snaps_at, spills_at, BucketLevel, NUM_LEVELS},
    protocol::ProtocolVersion,
};

/// The eleven-level cascade (spec.md §3, §4.4). Owns no directory or
/// interning cache of its own — those are `BucketManager`'s concern
/// (crate `ledger-node`); this type holds only the level slots and the
/// addBatch transition logic, so it can be driven directly in tests.
pub struct BucketList {
    levels: Vec<BucketLevel>,
}

impl BucketList {
    pub fn new() -> Self {
        BucketList {
            levels: (0..NUM_LEVELS).map(|_| BucketLevel::new()).collect(),
        }
    }

    pub fn level(&self, i: usize) -> &BucketLevel {
        &self.levels[i]
    }

    pub fn level_mut(&mut self, i: usize) -> &mut BucketLevel {
        &mut self.levels[i]
    }

    /// Rebuild a list directly from a fixed set of levels, as produced by
    /// restoring a `HistoryArchiveState` (see `archive_state::restore`).
    pub fn from_levels(levels: Vec<BucketLevel>) -> Self {
        assert_eq!(levels.len(), NUM_LEVELS, "a bucket list always has NUM_LEVELS levels");
        BucketList { levels }
    }

    /// Collapse every level's `next` future out of `Running` and back to
    /// `Clear`, mirroring the state diagram's `cancel` edge (spec.md §4.3,
    /// §5). Callers must capture `HistoryArchiveState` before calling this —
    /// cancelling discards the in-memory recipe, but a state snapshot taken
    /// first already persisted it via `FutureBucket::to_persisted`.
    pub fn cancel_running_merges(&mut self) {
        for level in &mut self.levels {
            level.next.cancel();
        }
    }

    /// The composite hash: concatenation of every level's (curr, snap) hash
    /// pair, with `Hash256::ZERO` standing in for empty slots (I3).
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(NUM_LEVELS * 64);
        for level in &self.levels {
            let (curr, snap) = level.hash_pair();
            buf.extend_from_slice(&curr.0);
            buf.extend_from_slice(&snap.0);
        }
        Hash256::of(&buf)
    }

    /// Apply one ledger's batch (spec.md §4.4). Blocks only where a spill
    /// that must resolve before this tick's snap hasn't finished yet
    /// (`FutureBucket::resolve`, the sole main-loop suspension point).
    #[allow(clippy::too_many_arguments)]
    pub fn add_batch(
        &mut self,
        ledger_seq: u64,
        protocol: ProtocolVersion,
        init: Vec<LedgerEntry>,
        live: Vec<LedgerEntry>,
        dead: Vec<LedgerKey>,
        dir: &Path,
        spawner: &dyn MergeSpawner,
    ) -> Result<MergeCounters, BucketError> {
        let incoming = Bucket::fresh(dir, protocol, init, live, dead)?;
        let mut counters = MergeCounters::default();

        // Snap phase: resolve any due spill, promote it, then rotate curr
        // into snap. Ascending so a promotion into level i+1 is visible to
        // level i+1's own snap check later in this same pass (relevant only
        // at ledgers that are simultaneously snap points for both levels).
        for i in 0..NUM_LEVELS - 1 {
            if !snaps_at(i, ledger_seq) {
                continue;
            }
            if !self.levels[i].next.is_clear() {
                let (resolved, delta) = self.levels[i].next.resolve()?;
                counters += delta;
                self.levels[i + 1].curr = resolved;
                self.levels[i].next.clear();
            }
            self.levels[i].snap = self.levels[i].curr.clone();
        }

        self.levels[0].curr = incoming;

        // Spill-prepare phase: start merges that are due, reading each
        // level's (possibly just-rotated) current snap and the shadow stack
        // of everything deeper.
        for i in 0..NUM_LEVELS - 1 {
            if !spills_at(i, ledger_seq) {
                continue;
            }
            let old = self.levels[i + 1].curr.clone();
            let new = self.levels[i].snap.clone();
            let shadows: Vec<Bucket> = ((i + 2)..NUM_LEVELS)
                .map(|j| self.levels[j].curr.clone())
                .collect();
            let is_bottom_level = i + 1 == NUM_LEVELS - 1;
            self.levels[i]
                .next
                .start(spawner, old, new, shadows, protocol, is_bottom_level);
        }

        Ok(counters)
    }
}

impl Default for BucketList {
    fn default() -> Self {
        Self::new()
    }
}

/// The four ledger-header skip-list slots, sampled at `SKIP_1..SKIP_4`
/// ledger periods (spec.md §4.5, §6).
pub const SKIP_1: u64 = 50;
pub const SKIP_2: u64 = 5_000;
pub const SKIP_3: u64 = 50_000;
pub const SKIP_4: u64 = 500_000;

pub const SKIP_PERIODS: [u64; 4] = [SKIP_1, SKIP_2, SKIP_3, SKIP_4];

/// Advance the skip list from ledger `n-1`'s value to ledger `n`'s, given
/// this ledger's bucket-list hash.
///
/// Slot 0 takes `bl_hash` whenever `n mod SKIP_1 == 0`. Slot `k` (1..=3)
/// shifts in slot `k-1`'s pre-tick value whenever `n`'s position within its
/// `SKIP_{k+1}` cycle equals the sum of the periods below it — i.e. one full
/// `SKIP_k` cycle past the `SKIP_{k+1}` boundary, which is exactly when that
/// boundary's own sample has had time to propagate up through slot `k-1`.
/// This closed form reproduces spec.md §8 S1's worked examples exactly.
pub fn advance_skip_list(previous: [Hash256; 4], ledger_seq: u64, bl_hash: Hash256) -> [Hash256; 4] {
    let mut next = previous;
    if ledger_seq % SKIP_PERIODS[0] == 0 {
        next[0] = bl_hash;
    }
    let mut cumulative = 0u64;
    for k in 1..4 {
        cumulative += SKIP_PERIODS[k - 1];
        let period = SKIP_PERIODS[k];
        if ledger_seq % period == cumulative % period {
            next[k] = previous[k - 1];
        }
    }
    next
}

pub fn bucket_dir_for(root: &Path) -> PathBuf {
    root.join("buckets")
}
