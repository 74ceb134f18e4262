use ledger_store::{LedgerEntry, LedgerKey};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministically generates per-ledger `(init, live, dead)` batches for
/// demo and soak-test driving, tracking which keys currently exist so it
/// never produces a batch that violates the ledger-txn contract (spec.md
/// §6: no key in more than one list; no init of an already-live key).
pub struct BatchGenerator {
    rng: ChaCha8Rng,
    live_keys: Vec<LedgerKey>,
    next_key: u64,
}

impl BatchGenerator {
    pub fn new(seed: u64) -> Self {
        BatchGenerator {
            rng: ChaCha8Rng::seed_from_u64(seed),
            live_keys: Vec::new(),
            next_key: 0,
        }
    }

    fn fresh_key(&mut self) -> LedgerKey {
        let id = self.next_key;
        self.next_key += 1;
        LedgerKey(id.to_be_bytes().to_vec())
    }

    fn random_value(&mut self) -> Vec<u8> {
        let mut value = vec![0u8; 16];
        self.rng.fill_bytes(&mut value);
        value
    }

    /// Produce one ledger's batch: `entries_per_ledger` total entries, split
    /// roughly 50/50 between updates to existing keys (LIVE) and brand-new
    /// keys (INIT if `protocol_supports_init`, otherwise LIVE), plus an
    /// occasional DEAD when there is something live to kill.
    pub fn next_batch(
        &mut self,
        entries_per_ledger: usize,
        protocol_supports_init: bool,
    ) -> (Vec<LedgerEntry>, Vec<LedgerEntry>, Vec<LedgerKey>) {
        let mut init = Vec::new();
        let mut live = Vec::new();
        let mut dead = Vec::new();

        for _ in 0..entries_per_ledger {
            let roll: f32 = self.rng.gen();
            if roll < 0.1 && !self.live_keys.is_empty() {
                let idx = self.rng.gen_range(0..self.live_keys.len());
                let key = self.live_keys.swap_remove(idx);
                dead.push(key);
            } else if roll < 0.5 && !self.live_keys.is_empty() {
                let idx = self.rng.gen_range(0..self.live_keys.len());
                let key = self.live_keys[idx].clone();
                let value = self.random_value();
                live.push(LedgerEntry { key, value });
            } else {
                let key = self.fresh_key();
                let value = self.random_value();
                self.live_keys.push(key.clone());
                if protocol_supports_init {
                    init.push(LedgerEntry { key, value });
                } else {
                    live.push(LedgerEntry { key, value });
                }
            }
        }

        (init, live, dead)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn same_seed_produces_same_schedule() {
        let mut a = BatchGenerator::new(7);
        let mut b = BatchGenerator::new(7);
        for _ in 0..20 {
            assert_eq!(a.next_batch(10, true), b.next_batch(10, true));
        }
    }

    #[test]
    fn never_mixes_a_key_across_lists() {
        let mut gen = BatchGenerator::new(42);
        for _ in 0..50 {
            let (init, live, dead) = gen.next_batch(10, true);
            let mut seen = std::collections::HashSet::new();
            for key in init
                .iter()
                .map(|e| &e.key)
                .chain(live.iter().map(|e| &e.key))
                .chain(dead.iter())
            {
                assert!(seen.insert(key.clone()), "key reused within one batch");
            }
        }
    }

    #[test]
    fn pre_init_protocol_never_emits_init() {
        let mut gen = BatchGenerator::new(1);
        for _ in 0..20 {
            let (init, _, _) = gen.next_batch(10, false);
            assert!(init.is_empty());
        }
    }
}
