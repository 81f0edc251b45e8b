//! Welcome to `oncore`!
//!
//! A discrete-event simulator of *online* admission and placement of
//! deadline-constrained, possibly multi-core jobs onto a pool of identical
//! cores. Jobs are revealed in release order; each one is accepted (and
//! placed) or rejected exactly once, with no knowledge of what comes next.

mod job;
mod engine;
mod machine;
mod analyze;

pub mod algo;
pub mod jobset;
pub mod helpe;

pub use crate::helpe::*;
pub use crate::engine::{Outcome, Rejection};
pub use crate::machine::{Allocation, Core, Slot};

/// Our fundamental unit of demand. A [`Job`] asks for
/// [`cores`](Job::cores) cores *simultaneously*, for
/// [`processing`](Job::processing) logical time units, somewhere inside
/// the window [[`release`](Job::release), [`due`](Job::due)].
///
/// The first five fields are fixed once the job enters a simulation. The
/// remaining ones are written by the [`Engine`] when (and only when) the
/// job is accepted.
///
/// > ***ATTENTION:*** time windows are half-open. A job scheduled at
/// > `start` occupies its cores during [start, start + processing), so a
/// > job finishing at `t` and another one starting at `t` may share a core.
#[derive(Debug, Clone)]
pub struct Job {
    pub id:             JobId,
    pub processing:     TimeSteps,
    pub release:        TimeSteps,
    pub due:            TimeSteps,
    pub cores:          usize,
    /// When the job starts running. `None` for rejected jobs and for jobs
    /// admitted by policies that never commit to a placement.
    pub start:          Option<TimeSteps>,
    pub completion:     Option<TimeSteps>,
    /// Set on jobs whose allocation was split by preemption: the number
    /// of pieces the job ended up running in.
    pub weight:         Option<u32>,
}

/// The mutable state of exactly one simulation run. Policies receive it
/// by exclusive reference and drive it through a small set of shared
/// primitives (see `engine.rs`).
///
/// An [`Engine`] owns everything it touches: the pending jobs, the
/// cores and every [`Allocation`] ever created. Nothing is shared
/// between runs, so distinct runs can proceed on distinct threads.
#[derive(Debug, Clone)]
pub struct Engine {
    // Pending jobs, sorted by increasing release.
    intake:         VecDeque<Job>,
    // Kept sorted by decreasing available time whenever a policy
    // needs to rank cores.
    cores:          Vec<Core>,
    // Vacant allocations, i.e., idle gaps left behind placed jobs.
    open:           IndexMap<AllocId, Allocation>,
    accepted:       IndexMap<JobId, Job>,
    rejected:       IndexMap<JobId, Job>,
    accepted_load:  TimeSteps,
    rejected_load:  TimeSteps,
    submitted:      usize,
    next_alloc:     AllocId,
}
