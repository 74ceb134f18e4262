//! Manager-backed scenario tests: ownership/GC (spec.md §8 S2) and counter
//! sanity after a long run (S6). The restart scenario (S3) lives alongside
//! `close_ledger` in `src/ledger_close.rs`, where it already has direct
//! access to the private test helpers it shares with the unit tests.

use ledger_node::{close_ledger, BucketManager, LedgerHeader};
use ledger_store::{Bucket, BucketEntry, BucketList, LedgerEntry, LedgerKey, ProtocolVersion};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn live_entries(n: usize) -> Vec<BucketEntry> {
    (0..n)
        .map(|i| {
            BucketEntry::Live(LedgerEntry {
                key: LedgerKey((i as u64).to_be_bytes().to_vec()),
                value: vec![i as u8; 4],
            })
        })
        .collect()
}

#[test]
fn gc_deletes_only_once_every_handle_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let manager = BucketManager::new(dir.path(), 1).unwrap();

    let bucket = Bucket::write_from_sorted(manager.dir(), &live_entries(10)).unwrap();
    let path = bucket.path().unwrap().to_path_buf();
    manager.intern(bucket.clone());

    // Two external handles beyond the cache's own: the local `bucket` var
    // and a clone we hold until the second GC pass.
    let held = bucket.clone();
    assert!(path.exists());
    assert_eq!(manager.forget_unreferenced_buckets(), 0);
    assert!(path.exists());

    drop(bucket);
    drop(held);
    let collected = manager.forget_unreferenced_buckets();
    assert_eq!(collected, 1);
    assert!(!path.exists());
}

#[test]
fn gc_respects_bucket_list_slot_ownership() {
    let dir = tempfile::tempdir().unwrap();
    let manager = BucketManager::new(dir.path(), 1).unwrap();
    let mut list = BucketList::new();
    let mut header = LedgerHeader::genesis();

    let (init, live, dead) = (
        vec![],
        vec![LedgerEntry {
            key: LedgerKey(vec![1]),
            value: vec![1],
        }],
        vec![],
    );
    header = close_ledger(&manager, &mut list, &header, 1, ProtocolVersion(11), init, live, dead)
        .unwrap();
    let first_curr = list.level(0).curr.clone();
    let path = first_curr.path().unwrap().to_path_buf();
    drop(first_curr);

    // The bucket list itself still references it at curr_0; GC must not
    // collect it even though no other caller holds a clone.
    assert_eq!(manager.forget_unreferenced_buckets(), 0);
    assert!(path.exists());

    // Rotate it out: ledger 2's incoming batch becomes curr_0, demoting the
    // first bucket out of every live slot.
    let (init, live, dead) = (
        vec![],
        vec![LedgerEntry {
            key: LedgerKey(vec![2]),
            value: vec![2],
        }],
        vec![],
    );
    close_ledger(&manager, &mut list, &header, 2, ProtocolVersion(11), init, live, dead).unwrap();
    assert!(list.level(0).curr.path().unwrap() != path);

    let collected = manager.forget_unreferenced_buckets();
    assert_eq!(collected, 1);
    assert!(!path.exists());
}

struct Churn {
    rng: ChaCha8Rng,
    live: Vec<LedgerKey>,
    next_id: u64,
}

impl Churn {
    fn new(seed: u64) -> Self {
        Churn {
            rng: ChaCha8Rng::seed_from_u64(seed),
            live: Vec::new(),
            next_id: 0,
        }
    }

    fn batch(
        &mut self,
        per_ledger: usize,
        supports_init: bool,
    ) -> (Vec<LedgerEntry>, Vec<LedgerEntry>, Vec<LedgerKey>) {
        let mut init = Vec::new();
        let mut live = Vec::new();
        let mut dead = Vec::new();
        for _ in 0..per_ledger {
            let roll: f32 = self.rng.gen();
            if roll < 0.15 && !self.live.is_empty() {
                let idx = self.rng.gen_range(0..self.live.len());
                dead.push(self.live.swap_remove(idx));
            } else if roll < 0.6 && !self.live.is_empty() {
                let idx = self.rng.gen_range(0..self.live.len());
                let key = self.live[idx].clone();
                let mut value = vec![0u8; 6];
                self.rng.fill_bytes(&mut value);
                live.push(LedgerEntry { key, value });
            } else {
                let key = LedgerKey(self.next_id.to_be_bytes().to_vec());
                self.next_id += 1;
                let mut value = vec![0u8; 6];
                self.rng.fill_bytes(&mut value);
                self.live.push(key.clone());
                if supports_init {
                    init.push(LedgerEntry { key, value });
                } else {
                    live.push(LedgerEntry { key, value });
                }
            }
        }
        (init, live, dead)
    }
}

#[test]
fn counters_stay_sane_across_a_long_post_init_run() {
    let dir = tempfile::tempdir().unwrap();
    let manager = BucketManager::new(dir.path(), 2).unwrap();
    let mut list = BucketList::new();
    let mut header = LedgerHeader::genesis();
    let mut churn = Churn::new(123);
    let protocol = ledger_store::FIRST_PROTOCOL_SUPPORTING_INIT_AND_META;

    let mut previous = manager.read_merge_counters();
    for n in 1..=500u64 {
        let (init, live, dead) = churn.batch(8, protocol.supports_init_and_meta());
        header =
            close_ledger(&manager, &mut list, &header, n, protocol, init, live, dead).unwrap();

        let current = manager.read_merge_counters();
        assert!(current.finished_merges >= previous.finished_merges);
        assert!(current.new_live >= previous.new_live);
        previous = current;
    }

    let counters = manager.read_merge_counters();
    assert!(counters.post_init_entry_protocol_merges > 0);
    assert_eq!(counters.pre_init_entry_protocol_merges, 0);
    assert!(counters.new_init > 0);
    assert!(counters.new_live > 0);
    assert!(counters.new_dead > 0);
    assert!(counters.old_init > 0);
    assert!(counters.old_live > 0);
    assert!(counters.old_dead > 0);
    assert_eq!(counters.meta_entry_shadow_elisions, 0);
    assert_eq!(counters.init_entry_shadow_elisions, 0);
    assert!(counters.live_entry_shadow_elisions > 0);
    assert!(counters.dead_entry_shadow_elisions > 0);
    assert!(counters.output_iterator_buffer_updates >= counters.output_iterator_actual_writes);
    assert_ne!(header.bucket_list_hash, ledger_format::Hash256::ZERO);
}

#[test]
fn pre_init_protocol_never_produces_init_or_meta_counters() {
    let dir = tempfile::tempdir().unwrap();
    let manager = BucketManager::new(dir.path(), 1).unwrap();
    let mut list = BucketList::new();
    let mut header = LedgerHeader::genesis();
    let mut churn = Churn::new(5);
    let protocol = ProtocolVersion(10);
    assert!(!protocol.supports_init_and_meta());

    for n in 1..=150u64 {
        let (init, live, dead) = churn.batch(6, false);
        header =
            close_ledger(&manager, &mut list, &header, n, protocol, init, live, dead).unwrap();
    }

    let counters = manager.read_merge_counters();
    assert_eq!(counters.new_init, 0);
    assert_eq!(counters.old_init, 0);
    assert_eq!(counters.new_meta, 0);
    assert_eq!(counters.old_meta, 0);
    assert!(counters.pre_init_entry_protocol_merges > 0);
    assert_eq!(counters.post_init_entry_protocol_merges, 0);
}
