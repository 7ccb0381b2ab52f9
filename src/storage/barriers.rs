use std::sync::{Barrier, BarrierWaitResult};

/// Every worker has written its contribution.
pub const GATHER: usize = 0;
/// Every worker has reduced its owned part, the result is readable.
pub const REDUCE: usize = 1;
/// Every worker has read the result, the shared slots may be reset.
pub const RELEASE: usize = 2;

const BARRIERS_PER_PHASE: usize = 3;

/// The logical phases of an update, each one synchronizes on its own barrier group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Baseline,
    Gradient,
    Hvp,
    Loss,
    Constraint,
    Backtrack,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Baseline,
        Phase::Gradient,
        Phase::Hvp,
        Phase::Loss,
        Phase::Constraint,
        Phase::Backtrack,
    ];

    /// The amount of scalars reduced together in this phase, `0` for vector phases.
    pub const fn scalars(self) -> usize {
        match self {
            Phase::Baseline | Phase::Loss | Phase::Constraint => 1,
            Phase::Backtrack => 2,
            Phase::Gradient | Phase::Hvp => 0,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Reusable barriers sized to the worker count, grouped by `Phase`.
#[derive(Debug)]
pub struct BarrierSet {
    groups: Box<[[Barrier; BARRIERS_PER_PHASE]]>,
}

impl BarrierSet {
    /// Creates a new `BarrierSet`.
    ///
    /// # Arguments
    /// * `workers` - The amount of workers every barrier waits on.
    ///
    /// # Returns
    /// A new `BarrierSet` instance.
    pub fn new(workers: usize) -> Self {
        let groups = Phase::ALL
            .iter()
            .map(|_| std::array::from_fn(|_| Barrier::new(workers)))
            .collect();

        Self { groups }
    }

    /// Blocks until every worker reaches the `step`-th barrier of `phase`.
    ///
    /// # Arguments
    /// * `phase` - The phase whose barrier group to use.
    /// * `step` - One of `GATHER`, `REDUCE` or `RELEASE`.
    ///
    /// # Returns
    /// The wait result, exactly one worker per wait is the leader.
    pub fn wait(&self, phase: Phase, step: usize) -> BarrierWaitResult {
        self.groups[phase.index()][step].wait()
    }
}
