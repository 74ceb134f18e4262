use std::path::Path;

use crate::{
    bucket::Bucket,
    counters::MergeCounters,
    entry::{BucketEntry, BucketMetaEntry},
    error::BucketError,
    protocol::ProtocolVersion,
};

/// The inputs to a single merge, in the shape persisted by `FutureBucket`'s
/// input-only recipe: an `old` bucket (the deeper level's current content),
/// a `new` bucket (the shallower level's content being folded in), and a
/// stack of `shadows` (deepest first) that may elide redundant LIVE records.
#[derive(Debug, Clone)]
pub struct MergeInputs {
    pub old: Bucket,
    pub new: Bucket,
    pub shadows: Vec<Bucket>,
    pub protocol: ProtocolVersion,
    /// True when the output of this merge is level 10's curr bucket: the
    /// deepest level, where DEAD records shadow nothing further down and so
    /// may be dropped outright (§4.2 "tombstone elision at the bottom").
    pub is_bottom_level: bool,
}

/// Run a merge to completion and return the output bucket plus the
/// counters it produced. Every reconciliation decision is a pure function
/// of `(old entry, new entry, shadow membership, protocol)`, so running
/// this twice on identical inputs produces byte-identical output (the
/// property `FutureBucket`'s input-only restart form depends on).
pub fn run_merge(dir: &Path, inputs: &MergeInputs) -> Result<(Bucket, MergeCounters), BucketError> {
    let mut counters = MergeCounters::default();

    let mut old_entries = inputs.old.entries()?;
    let mut new_entries = inputs.new.entries()?;
    let shadow_entries: Vec<Vec<BucketEntry>> = inputs
        .shadows
        .iter()
        .map(|b| b.entries())
        .collect::<Result<_, _>>()?;

    if !inputs.protocol.supports_init_and_meta() {
        for e in old_entries.iter().chain(new_entries.iter()) {
            if e.is_init() || e.is_meta() {
                return Err(BucketError::ProtocolViolation(format!(
                    "INIT/META entry observed at protocol {} < {}",
                    inputs.protocol.0,
                    crate::protocol::FIRST_PROTOCOL_SUPPORTING_INIT_AND_META.0
                )));
            }
        }
        counters.pre_init_entry_protocol_merges += 1;
    } else {
        counters.post_init_entry_protocol_merges += 1;
    }

    let old_meta = take_leading_meta(&mut old_entries);
    let new_meta = take_leading_meta(&mut new_entries);
    if old_meta.is_some() {
        counters.old_meta += 1;
    }
    if new_meta.is_some() {
        counters.new_meta += 1;
    }
    let merged_meta = new_meta.or(old_meta);

    let mut shadow_cursors = vec![0usize; shadow_entries.len()];
    let mut output = Vec::new();
    if let Some(meta) = merged_meta {
        output.push(BucketEntry::Meta(meta));
    }

    let mut oi = 0usize;
    let mut ni = 0usize;
    loop {
        let old_peek = old_entries.get(oi);
        let new_peek = new_entries.get(ni);
        let candidate = match (old_peek, new_peek) {
            (None, None) => break,
            (Some(o), None) => {
                note_consumed(&mut counters, o, false);
                oi += 1;
                counters.old_entries_default_accepted += 1;
                Some(o.clone())
            }
            (None, Some(n)) => {
                note_consumed(&mut counters, n, true);
                ni += 1;
                counters.new_entries_default_accepted += 1;
                Some(n.clone())
            }
            (Some(o), Some(n)) => match o.key().cmp(&n.key()) {
                std::cmp::Ordering::Less => {
                    note_consumed(&mut counters, o, false);
                    oi += 1;
                    counters.old_entries_default_accepted += 1;
                    Some(o.clone())
                }
                std::cmp::Ordering::Greater => {
                    note_consumed(&mut counters, n, true);
                    ni += 1;
                    counters.new_entries_default_accepted += 1;
                    Some(n.clone())
                }
                std::cmp::Ordering::Equal => {
                    note_consumed(&mut counters, o, false);
                    note_consumed(&mut counters, n, true);
                    let winner = reconcile(o, n, &mut counters);
                    oi += 1;
                    ni += 1;
                    winner
                }
            },
        };

        let Some(candidate) = candidate else { continue };

        let shadowed = if candidate.is_live() || candidate.is_dead() {
            scan_shadows(
                &shadow_entries,
                &mut shadow_cursors,
                candidate.key().expect("LIVE/DEAD always has a key"),
                &mut counters,
            )
        } else {
            false
        };

        match &candidate {
            BucketEntry::Live(_) if shadowed => {
                counters.live_entry_shadow_elisions += 1;
            }
            BucketEntry::Dead(_) => {
                if shadowed {
                    counters.dead_entry_shadow_elisions += 1;
                }
                if inputs.is_bottom_level {
                    counters.output_iterator_tombstone_elisions += 1;
                } else {
                    push_output(&mut output, candidate, &mut counters);
                }
            }
            _ => push_output(&mut output, candidate, &mut counters),
        }
    }

    let bucket = Bucket::write_from_sorted(dir, &output)?;
    counters.finished_merges += 1;
    Ok((bucket, counters))
}

fn push_output(output: &mut Vec<BucketEntry>, entry: BucketEntry, counters: &mut MergeCounters) {
    counters.output_iterator_buffer_updates += 1;
    counters.output_iterator_actual_writes += 1;
    output.push(entry);
}

fn take_leading_meta(entries: &mut Vec<BucketEntry>) -> Option<BucketMetaEntry> {
    if matches!(entries.first(), Some(BucketEntry::Meta(_))) {
        match entries.remove(0) {
            BucketEntry::Meta(m) => Some(m),
            _ => unreachable!(),
        }
    } else {
        None
    }
}

fn note_consumed(counters: &mut MergeCounters, entry: &BucketEntry, from_new: bool) {
    match (entry, from_new) {
        (BucketEntry::Meta(_), true) => counters.new_meta += 1,
        (BucketEntry::Init(_), true) => counters.new_init += 1,
        (BucketEntry::Live(_), true) => counters.new_live += 1,
        (BucketEntry::Dead(_), true) => counters.new_dead += 1,
        (BucketEntry::Meta(_), false) => counters.old_meta += 1,
        (BucketEntry::Init(_), false) => counters.old_init += 1,
        (BucketEntry::Live(_), false) => counters.old_live += 1,
        (BucketEntry::Dead(_), false) => counters.old_dead += 1,
    }
}

/// Apply the §4.2 reconciliation matrix to a matching `(old, new)` key pair.
fn reconcile(
    old: &BucketEntry,
    new: &BucketEntry,
    counters: &mut MergeCounters,
) -> Option<BucketEntry> {
    match (old, new) {
        (BucketEntry::Dead(_), BucketEntry::Init(_)) => {
            counters.new_init_entries_merged_with_old_dead += 1;
            None
        }
        (BucketEntry::Init(_), BucketEntry::Live(new_entry)) => {
            counters.old_init_entries_merged_with_new_live += 1;
            Some(BucketEntry::Init(new_entry.clone()))
        }
        (BucketEntry::Init(_), BucketEntry::Dead(_)) => {
            counters.old_init_entries_merged_with_new_dead += 1;
            None
        }
        _ => {
            counters.new_entries_merged_with_old_neither_init += 1;
            Some(new.clone())
        }
    }
}

/// Advance every shadow's cursor past keys smaller than `key`, counting each
/// step, then report whether any shadow's cursor now sits exactly on `key`.
/// "Any shadow suffices" — see DESIGN.md's Open Question resolution.
fn scan_shadows(
    shadows: &[Vec<BucketEntry>],
    cursors: &mut [usize],
    key: &crate::entry::LedgerKey,
    counters: &mut MergeCounters,
) -> bool {
    let mut found = false;
    for (shadow, cursor) in shadows.iter().zip(cursors.iter_mut()) {
        while *cursor < shadow.len() {
            let shadow_key = match shadow[*cursor].key() {
                Some(k) => k,
                None => {
                    *cursor += 1;
                    continue;
                }
            };
            if shadow_key < key {
                *cursor += 1;
                counters.shadow_scan_steps += 1;
            } else {
                break;
            }
        }
        if shadow.get(*cursor).and_then(|e| e.key()) == Some(key) {
            found = true;
        }
    }
    found
}
