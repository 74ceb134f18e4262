use ledger_format::Hash256;
use ledger_store::{
    bucket_list::advance_skip_list, BucketList, HistoryArchiveState, LedgerEntry, LedgerKey,
    ProtocolVersion,
};
use tracing::info;

use crate::{error::LedgerSequenceError, interning::BucketManager};

/// The ledger header fields this layer is responsible for (spec.md §6):
/// the bucket-list hash and the four skip-list slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LedgerHeader {
    pub ledger_seq: u64,
    pub protocol: u32,
    pub bucket_list_hash: Hash256,
    pub skip_list: [Hash256; 4],
}

impl LedgerHeader {
    pub fn genesis() -> Self {
        LedgerHeader {
            ledger_seq: 0,
            protocol: 0,
            bucket_list_hash: Hash256::ZERO,
            skip_list: [Hash256::ZERO; 4],
        }
    }
}

/// Transfers one ledger's batch into the bucket list and writes the
/// resulting hashes into a new header (spec.md §4.5's ledger-close
/// adapter). Gates on `ledger_seq == last_closed.ledger_seq + 1`; any other
/// sequence number is rejected without mutating the list.
#[allow(clippy::too_many_arguments)]
pub fn close_ledger(
    manager: &BucketManager,
    list: &mut BucketList,
    last_closed: &LedgerHeader,
    ledger_seq: u64,
    protocol: ProtocolVersion,
    init: Vec<LedgerEntry>,
    live: Vec<LedgerEntry>,
    dead: Vec<LedgerKey>,
) -> Result<LedgerHeader, crate::error::ManagerError> {
    if ledger_seq != last_closed.ledger_seq + 1 {
        return Err(LedgerSequenceError {
            last_closed: last_closed.ledger_seq,
            given: ledger_seq,
        }
        .into());
    }

    let delta = list.add_batch(
        ledger_seq,
        protocol,
        init,
        live,
        dead,
        manager.dir(),
        manager,
    )?;
    manager.incr_merge_counters(delta);
    // The incoming per-ledger bucket came from `Bucket::fresh` inside
    // `add_batch`, bypassing the manager entirely; register it now so GC
    // (I4) can eventually reclaim it once the list rotates it out.
    manager.intern(list.level(0).curr.clone());

    let bucket_list_hash = list.hash();
    let skip_list = advance_skip_list(last_closed.skip_list, ledger_seq, bucket_list_hash);

    let header = LedgerHeader {
        ledger_seq,
        protocol: protocol.0,
        bucket_list_hash,
        skip_list,
    };
    info!(ledger_seq, hash = %bucket_list_hash, "closed ledger");
    Ok(header)
}

/// Rebuild a `BucketList` from a captured `HistoryArchiveState`, resolving
/// every referenced bucket hash through `manager` (reading each from disk
/// and interning it) and restarting any in-flight merge from scratch on
/// `manager`'s own worker pool. This is the restart half of spec.md §6's
/// round-trip invariant: a process that crashed after persisting `state`
/// continues from here to bit-identical output.
pub fn restore_bucket_list(
    manager: &BucketManager,
    state: &HistoryArchiveState,
) -> Result<BucketList, crate::error::ManagerError> {
    ledger_store::restore(state, manager, |hash| {
        manager
            .get_bucket_by_hash(hash)
            .map_err(|e| match e {
                crate::error::ManagerError::Bucket(b) => b,
                other => ledger_store::BucketError::BucketCorrupt {
                    path: None,
                    reason: other.to_string(),
                },
            })
    })
    .map_err(crate::error::ManagerError::Bucket)
}

#[cfg(test)]
mod test {
    use super::*;

    fn batch(n: u8) -> (Vec<LedgerEntry>, Vec<LedgerEntry>, Vec<LedgerKey>) {
        (
            vec![],
            vec![LedgerEntry {
                key: LedgerKey(vec![n]),
                value: vec![n],
            }],
            vec![],
        )
    }

    #[test]
    fn rejects_non_successor_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BucketManager::new(dir.path(), 1).unwrap();
        let mut list = BucketList::new();
        let genesis = LedgerHeader::genesis();
        let (init, live, dead) = batch(1);
        let result = close_ledger(
            &manager,
            &mut list,
            &genesis,
            2,
            ProtocolVersion(11),
            init,
            live,
            dead,
        );
        assert!(result.is_err());
    }

    #[test]
    fn closes_sequential_ledgers() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BucketManager::new(dir.path(), 1).unwrap();
        let mut list = BucketList::new();
        let mut header = LedgerHeader::genesis();
        for n in 1..=5u64 {
            let (init, live, dead) = batch(n as u8);
            header = close_ledger(
                &manager,
                &mut list,
                &header,
                n,
                ProtocolVersion(11),
                init,
                live,
                dead,
            )
            .unwrap();
        }
        assert_eq!(header.ledger_seq, 5);
        assert_ne!(header.bucket_list_hash, Hash256::ZERO);
    }

    #[test]
    fn restore_then_continue_matches_uninterrupted_control() {
        let control_dir = tempfile::tempdir().unwrap();
        let control_manager = BucketManager::new(control_dir.path(), 2).unwrap();
        let mut control_list = BucketList::new();
        let mut control_header = LedgerHeader::genesis();
        for n in 1..=40u64 {
            let (init, live, dead) = batch((n % 200) as u8);
            control_header = close_ledger(
                &control_manager,
                &mut control_list,
                &control_header,
                n,
                ProtocolVersion(11),
                init,
                live,
                dead,
            )
            .unwrap();
        }

        let split_dir = tempfile::tempdir().unwrap();
        let split_manager = BucketManager::new(split_dir.path(), 2).unwrap();
        let mut split_list = BucketList::new();
        let mut split_header = LedgerHeader::genesis();
        for n in 1..=20u64 {
            let (init, live, dead) = batch((n % 200) as u8);
            split_header = close_ledger(
                &split_manager,
                &mut split_list,
                &split_header,
                n,
                ProtocolVersion(11),
                init,
                live,
                dead,
            )
            .unwrap();
        }

        let state = ledger_store::HistoryArchiveState::capture(
            &split_list,
            split_header.ledger_seq,
            split_header.skip_list,
        );
        // Drop the first manager and open a fresh one over the same
        // directory, simulating a process restart: the only thing carried
        // across is the captured state and the files it references.
        drop(split_manager);
        let resumed_manager = BucketManager::new(split_dir.path(), 2).unwrap();
        let mut restored_list = restore_bucket_list(&resumed_manager, &state).unwrap();

        for n in 21..=40u64 {
            let (init, live, dead) = batch((n % 200) as u8);
            split_header = close_ledger(
                &resumed_manager,
                &mut restored_list,
                &split_header,
                n,
                ProtocolVersion(11),
                init,
                live,
                dead,
            )
            .unwrap();
        }

        assert_eq!(split_header.bucket_list_hash, control_header.bucket_list_hash);
        assert_eq!(split_header.skip_list, control_header.skip_list);
    }
}
