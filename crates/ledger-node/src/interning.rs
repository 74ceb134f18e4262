use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use dashmap::DashMap;
use ledger_format::Hash256;
use ledger_store::{merge, Bucket, BucketError, MergeCounters, MergeInputs, MergeSpawner};
use tracing::{debug, trace};

use crate::{directory::BucketDirectory, error::ManagerError};

/// Owns the on-disk bucket directory, the hash-keyed interning cache, the
/// background worker pool, and the running merge counters (spec.md §4.5).
///
/// Interning makes invariant I5 (byte-identical content -> same in-memory
/// object) trivial: the cache is keyed by content hash, and every `Bucket`
/// is already `Arc`-backed internally, so a cache hit simply clones the
/// handle. Garbage collection (I4) follows directly: once the cache's own
/// clone is the last surviving reference, nothing outside this process can
/// still reach the bucket, and its file is safe to delete.
pub struct BucketManager {
    directory: BucketDirectory,
    interned: Arc<DashMap<Hash256, Bucket>>,
    pool: rayon::ThreadPool,
    counters: Mutex<MergeCounters>,
}

impl BucketManager {
    pub fn new(dir: impl Into<PathBuf>, num_workers: usize) -> Result<Arc<Self>, ManagerError> {
        let directory = BucketDirectory::open(dir)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers.max(1))
            .thread_name(|i| format!("bucket-merge-{i}"))
            .build()
            .expect("thread pool construction cannot fail with a valid thread count");
        Ok(Arc::new(BucketManager {
            directory,
            interned: Arc::new(DashMap::new()),
            pool,
            counters: Mutex::new(MergeCounters::default()),
        }))
    }

    /// Construct with one worker per logical CPU, the default shape for a
    /// production node (tests generally pin a small fixed count instead).
    pub fn with_default_workers(dir: impl Into<PathBuf>) -> Result<Arc<Self>, ManagerError> {
        Self::new(dir, num_cpus::get())
    }

    pub fn dir(&self) -> &Path {
        self.directory.path()
    }

    /// Return the shared handle for `hash`, reading it from disk and
    /// interning it if this is the first time it has been seen this
    /// process lifetime. The empty bucket is served without touching disk.
    pub fn get_bucket_by_hash(&self, hash: Hash256) -> Result<Bucket, ManagerError> {
        if hash.is_zero() {
            return Ok(Bucket::empty());
        }
        if let Some(existing) = self.interned.get(&hash) {
            return Ok(existing.clone());
        }
        let path = self.directory.bucket_path(&hash);
        let contents = fs::read(&path).map_err(|e| {
            ManagerError::Bucket(BucketError::BucketCorrupt {
                path: Some(path.clone()),
                reason: e.to_string(),
            })
        })?;
        let actual = Hash256::of(&contents);
        if actual != hash {
            return Err(ManagerError::Bucket(BucketError::BucketCorrupt {
                path: Some(path),
                reason: format!("expected hash {hash}, file contains {actual}"),
            }));
        }
        let bucket = Bucket::from_existing_file(hash, path);
        self.interned.insert(hash, bucket.clone());
        Ok(bucket)
    }

    /// Register a bucket this process already produced (a fresh per-ledger
    /// batch, or a merge's output) with the interning cache, so it
    /// participates in `forget_unreferenced_buckets` like every other
    /// bucket (I4/I5). A no-op for the distinguished empty bucket, which
    /// never touches the cache or the filesystem.
    pub fn intern(&self, bucket: Bucket) {
        if !bucket.hash().is_zero() {
            self.interned.entry(bucket.hash()).or_insert(bucket);
        }
    }

    /// Hash an externally-produced file, rename it into the canonical
    /// bucket path via the directory, and intern it (spec.md §4.5 `adopt`).
    pub fn adopt(&self, source: &Path) -> Result<Bucket, ManagerError> {
        let (hash, final_path) = self.directory.adopt(source)?;
        let bucket = Bucket::from_existing_file(hash, final_path);
        self.interned.insert(hash, bucket.clone());
        Ok(bucket)
    }

    /// Remove cache entries whose only remaining reference is the cache
    /// itself, deleting their backing files. Returns the number collected.
    pub fn forget_unreferenced_buckets(&self) -> usize {
        let doomed: Vec<Hash256> = self
            .interned
            .iter()
            .filter(|entry| entry.value().strong_count() == 1)
            .map(|entry| *entry.key())
            .collect();

        for hash in &doomed {
            if let Some((_, bucket)) = self.interned.remove(hash) {
                if let Some(path) = bucket.path() {
                    if let Err(e) = fs::remove_file(path) {
                        debug!(hash = %hash, error = %e, "failed to delete unreferenced bucket file");
                    } else {
                        trace!(hash = %hash, "forgot unreferenced bucket");
                    }
                }
            }
        }
        doomed.len()
    }

    pub fn read_merge_counters(&self) -> MergeCounters {
        *self.counters.lock().expect("counters mutex poisoned")
    }

    pub fn incr_merge_counters(&self, delta: MergeCounters) {
        *self.counters.lock().expect("counters mutex poisoned") += delta;
    }

    pub fn interned_len(&self) -> usize {
        self.interned.len()
    }
}

impl MergeSpawner for BucketManager {
    fn spawn(
        &self,
        inputs: MergeInputs,
        reply: std::sync::mpsc::Sender<ledger_store::MergeOutcome>,
    ) {
        let dir = self.directory.path().to_path_buf();
        let interned = Arc::clone(&self.interned);
        self.pool.spawn(move || {
            let outcome = match merge::run_merge(&dir, &inputs) {
                Ok((bucket, counters)) => {
                    if !bucket.hash().is_zero() {
                        interned.entry(bucket.hash()).or_insert_with(|| bucket.clone());
                    }
                    ledger_store::MergeOutcome::Resolved(bucket, counters)
                }
                Err(BucketError::MergeAborted) => ledger_store::MergeOutcome::Aborted,
                Err(e) => ledger_store::MergeOutcome::Failed(e),
            };
            let _ = reply.send(outcome);
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ledger_store::{BucketEntry, LedgerEntry, LedgerKey};

    fn live(n: u8) -> BucketEntry {
        BucketEntry::Live(LedgerEntry {
            key: LedgerKey(vec![n]),
            value: vec![n],
        })
    }

    #[test]
    fn get_bucket_by_hash_returns_shared_handle() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BucketManager::new(dir.path(), 1).unwrap();
        let bucket = Bucket::write_from_sorted(manager.dir(), &[live(1)]).unwrap();
        manager.interned.insert(bucket.hash(), bucket.clone());

        let a = manager.get_bucket_by_hash(bucket.hash()).unwrap();
        let b = manager.get_bucket_by_hash(bucket.hash()).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn zero_hash_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BucketManager::new(dir.path(), 1).unwrap();
        let bucket = manager.get_bucket_by_hash(Hash256::ZERO).unwrap();
        assert!(bucket.is_empty());
    }

    #[test]
    fn forget_unreferenced_buckets_deletes_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BucketManager::new(dir.path(), 1).unwrap();
        let bucket = Bucket::write_from_sorted(manager.dir(), &[live(2)]).unwrap();
        let path = bucket.path().unwrap().to_path_buf();
        manager.interned.insert(bucket.hash(), bucket);

        assert!(path.exists());
        let collected = manager.forget_unreferenced_buckets();
        assert_eq!(collected, 1);
        assert!(!path.exists());
    }

    #[test]
    fn forget_unreferenced_buckets_spares_held_handles() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BucketManager::new(dir.path(), 1).unwrap();
        let bucket = Bucket::write_from_sorted(manager.dir(), &[live(3)]).unwrap();
        let path = bucket.path().unwrap().to_path_buf();
        manager.interned.insert(bucket.hash(), bucket.clone());

        let held = bucket;
        let collected = manager.forget_unreferenced_buckets();
        assert_eq!(collected, 0);
        assert!(path.exists());
        drop(held);
    }

    #[test]
    fn adopt_renames_into_canonical_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BucketManager::new(dir.path(), 1).unwrap();
        let staged = dir.path().join("staged.xdr");
        std::fs::write(&staged, b"some bucket bytes").unwrap();

        let bucket = manager.adopt(&staged).unwrap();
        assert!(!staged.exists());
        assert!(bucket.path().unwrap().exists());
        assert_eq!(Hash256::of(b"some bucket bytes"), bucket.hash());
    }
}
