use std::ops::AddAssign;

/// Monotonic counters describing the decisions a single merge made,
/// accumulated across restarts so they reflect "total work ever done on
/// this level boundary" rather than "work done since the last restart".
///
/// Field names and grouping follow the external interface directly; see
/// `merge.rs` for where each is incremented. Every field only ever goes up:
/// callers that resume a merge re-add the pre-restart snapshot rather than
/// starting from zero, so a counter is never allowed to decrease across a
/// restart (`BucketManager::incr_merge_counters` is the only mutator other
/// than a fresh merge run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MergeCounters {
    // Protocol split.
    pub pre_init_entry_protocol_merges: u64,
    pub post_init_entry_protocol_merges: u64,

    // Per-kind, consumed from the two inputs.
    pub new_meta: u64,
    pub new_init: u64,
    pub new_live: u64,
    pub new_dead: u64,
    pub old_meta: u64,
    pub old_init: u64,
    pub old_live: u64,
    pub old_dead: u64,

    // Reconciliation outcomes (§4.2).
    pub old_entries_default_accepted: u64,
    pub new_entries_default_accepted: u64,
    pub new_init_entries_merged_with_old_dead: u64,
    pub old_init_entries_merged_with_new_live: u64,
    pub old_init_entries_merged_with_new_dead: u64,
    pub new_entries_merged_with_old_neither_init: u64,

    // Shadows. Per-kind "a shadow contains this key" events: for LIVE this
    // always coincides with dropping the record; for DEAD the scan still
    // happens and is counted (the record is never actually dropped, per
    // §4.2's "DEAD records are never elided by shadows"); META and INIT are
    // never checked against shadows at all, so those two stay at zero by
    // construction.
    pub shadow_scan_steps: u64,
    pub meta_entry_shadow_elisions: u64,
    pub live_entry_shadow_elisions: u64,
    pub init_entry_shadow_elisions: u64,
    pub dead_entry_shadow_elisions: u64,

    // Output.
    pub output_iterator_tombstone_elisions: u64,
    pub output_iterator_buffer_updates: u64,
    pub output_iterator_actual_writes: u64,

    pub finished_merges: u64,
}

impl AddAssign for MergeCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.pre_init_entry_protocol_merges += rhs.pre_init_entry_protocol_merges;
        self.post_init_entry_protocol_merges += rhs.post_init_entry_protocol_merges;
        self.new_meta += rhs.new_meta;
        self.new_init += rhs.new_init;
        self.new_live += rhs.new_live;
        self.new_dead += rhs.new_dead;
        self.old_meta += rhs.old_meta;
        self.old_init += rhs.old_init;
        self.old_live += rhs.old_live;
        self.old_dead += rhs.old_dead;
        self.old_entries_default_accepted += rhs.old_entries_default_accepted;
        self.new_entries_default_accepted += rhs.new_entries_default_accepted;
        self.new_init_entries_merged_with_old_dead += rhs.new_init_entries_merged_with_old_dead;
        self.old_init_entries_merged_with_new_live += rhs.old_init_entries_merged_with_new_live;
        self.old_init_entries_merged_with_new_dead += rhs.old_init_entries_merged_with_new_dead;
        self.new_entries_merged_with_old_neither_init +=
            rhs.new_entries_merged_with_old_neither_init;
        self.shadow_scan_steps += rhs.shadow_scan_steps;
        self.meta_entry_shadow_elisions += rhs.meta_entry_shadow_elisions;
        self.live_entry_shadow_elisions += rhs.live_entry_shadow_elisions;
        self.init_entry_shadow_elisions += rhs.init_entry_shadow_elisions;
        self.dead_entry_shadow_elisions += rhs.dead_entry_shadow_elisions;
        self.output_iterator_tombstone_elisions += rhs.output_iterator_tombstone_elisions;
        self.output_iterator_buffer_updates += rhs.output_iterator_buffer_updates;
        self.output_iterator_actual_writes += rhs.output_iterator_actual_writes;
        self.finished_merges += rhs.finished_merges;
    }
}
