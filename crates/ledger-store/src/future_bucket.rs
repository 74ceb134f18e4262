use std::sync::mpsc;

use ledger_format::Hash256;

use crate::{bucket::Bucket, counters::MergeCounters, error::BucketError, merge::MergeInputs};

/// A serializable description of a merge's inputs, named by hash rather than
/// by bucket handle. This is the shape persisted in `HistoryArchiveState`'s
/// `{state: "input", ...}` variant and the shape a freshly restarted process
/// reconstructs before calling `start` again.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MergeRecipe {
    pub old_hash: Hash256,
    pub new_hash: Hash256,
    pub shadow_hashes: Vec<Hash256>,
    pub protocol: u32,
    pub is_bottom_level: bool,
}

/// Anything able to run `run_merge` off the main loop and publish its result
/// through the returned channel. `BucketManager` (crate `ledger-node`)
/// implements this over a rayon pool; `ledger-store` itself stays
/// threading-agnostic so it can be tested without spinning up workers.
pub trait MergeSpawner {
    fn spawn(&self, inputs: MergeInputs, reply: mpsc::Sender<MergeOutcome>);
}

/// What a worker sends back once a merge finishes, aborts, or fails.
pub enum MergeOutcome {
    Resolved(Bucket, MergeCounters),
    Aborted,
    Failed(BucketError),
}

/// A handle to a merge that is clear, running, or resolved (spec.md §4.3's
/// three-node diagram). `MergeRecipe` is computed once up front in `start`
/// and carried inside `Running` precisely so it can be persisted as
/// `PersistedFuture::Input` without needing a separate in-memory "described
/// but not started" state — `restore` always restarts a recipe immediately
/// rather than pausing partway between describing and starting it. The only
/// suspension point the main loop may hit is `resolve()`.
pub enum FutureBucket {
    Clear,
    Running {
        recipe: MergeRecipe,
        receiver: mpsc::Receiver<MergeOutcome>,
    },
    Resolved {
        bucket: Bucket,
        counters: MergeCounters,
    },
}

impl FutureBucket {
    pub fn is_merging(&self) -> bool {
        matches!(self, FutureBucket::Running { .. })
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, FutureBucket::Clear)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FutureBucket::Resolved { .. })
    }

    /// Start a merge on `spawner`, transitioning `Clear` into `Running`. The
    /// recipe is computed up front so it can be persisted even while the
    /// merge is in flight.
    pub fn start(
        &mut self,
        spawner: &dyn MergeSpawner,
        old: Bucket,
        new: Bucket,
        shadows: Vec<Bucket>,
        protocol: crate::protocol::ProtocolVersion,
        is_bottom_level: bool,
    ) {
        let recipe = MergeRecipe {
            old_hash: old.hash(),
            new_hash: new.hash(),
            shadow_hashes: shadows.iter().map(Bucket::hash).collect(),
            protocol: protocol.0,
            is_bottom_level,
        };
        let (tx, rx) = mpsc::channel();
        spawner.spawn(
            MergeInputs {
                old,
                new,
                shadows,
                protocol,
                is_bottom_level,
            },
            tx,
        );
        *self = FutureBucket::Running {
            recipe,
            receiver: rx,
        };
    }

    /// Block until the merge resolves, translating worker-side failures into
    /// the crate's error taxonomy. This is the only place the main loop may
    /// suspend on background work (spec.md §5).
    pub fn resolve(&mut self) -> Result<(Bucket, MergeCounters), BucketError> {
        match self {
            FutureBucket::Resolved { bucket, counters } => Ok((bucket.clone(), *counters)),
            FutureBucket::Running { receiver, .. } => {
                let outcome = receiver
                    .recv()
                    .map_err(|_| BucketError::MergeAborted)?;
                match outcome {
                    MergeOutcome::Resolved(bucket, counters) => {
                        *self = FutureBucket::Resolved {
                            bucket: bucket.clone(),
                            counters,
                        };
                        Ok((bucket, counters))
                    }
                    MergeOutcome::Aborted => {
                        *self = FutureBucket::Clear;
                        Err(BucketError::MergeAborted)
                    }
                    MergeOutcome::Failed(e) => {
                        *self = FutureBucket::Clear;
                        Err(e)
                    }
                }
            }
            FutureBucket::Clear => Err(BucketError::MergeAborted),
        }
    }

    pub fn clear(&mut self) {
        *self = FutureBucket::Clear;
    }

    /// Collapse a `Running` future back to `Clear`, as the state diagram's
    /// `cancel` edge describes (spec.md §4.3): shutdown drains the worker
    /// pool and any merge that hadn't resolved yet is abandoned in memory.
    /// Resumability survives this because whatever `HistoryArchiveState` was
    /// captured most recently already persisted the running merge as its
    /// `Input` recipe via `to_persisted` — callers must capture state before
    /// cancelling, not after.
    pub fn cancel(&mut self) {
        if matches!(self, FutureBucket::Running { .. }) {
            *self = FutureBucket::Clear;
        }
    }

    /// Extract and zero this future's accumulated counters, so a caller can
    /// fold them into the process-wide total exactly once.
    pub fn take_counters(&mut self) -> MergeCounters {
        if let FutureBucket::Resolved { counters, .. } = self {
            std::mem::take(counters)
        } else {
            MergeCounters::default()
        }
    }

    /// The persisted form: `Running`'s recipe if a merge is in flight,
    /// `Resolved`'s output hash if done, or `Clear` if nothing is described.
    pub fn to_persisted(&self) -> PersistedFuture {
        match self {
            FutureBucket::Clear => PersistedFuture::Clear,
            FutureBucket::Running { recipe, .. } => PersistedFuture::Input(recipe.clone()),
            FutureBucket::Resolved { bucket, .. } => PersistedFuture::Output { hash: bucket.hash() },
        }
    }
}

/// The three shapes a `FutureBucket` can take in `HistoryArchiveState`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PersistedFuture {
    Clear,
    Input(MergeRecipe),
    Output { hash: Hash256 },
}
