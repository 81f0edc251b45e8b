pub mod greedy;
pub mod backfill;
pub mod threshold;
pub mod slack;
pub mod region;

use std::ops::RangeInclusive;

use crate::{
    helpe::*,
    engine::Outcome,
};
use self::greedy::Fit;

/// The admission-and-placement policies available to a run.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug)]
pub enum Policy {
    /// Least-loaded contiguous cores
    GreedyBalanced,
    /// Most-loaded cores still meeting the due time
    GreedyBestFit,
    /// Best-fit behind a calibrated deadline threshold
    Threshold,
    /// Start position wasting the least idle time
    MinIdle,
    /// Backfill idle gaps first, then least-loaded cores
    BackfillBalanced,
    /// Backfill idle gaps first, then best-fit
    BackfillBestFit,
    /// Slack-based competitive admission (no placement)
    Slack,
    /// Preemptive small-job-first placement
    Region,
}

impl Policy {
    pub const ALL: [Policy; 8] = [
        Policy::GreedyBalanced,
        Policy::GreedyBestFit,
        Policy::Threshold,
        Policy::MinIdle,
        Policy::BackfillBalanced,
        Policy::BackfillBestFit,
        Policy::Slack,
        Policy::Region,
    ];

    /// Short name used in result rows.
    pub fn label(&self) -> &'static str {
        match self {
            Policy::GreedyBalanced      => "GB",
            Policy::GreedyBestFit       => "GBF",
            Policy::Threshold           => "TH",
            Policy::MinIdle             => "GMI",
            Policy::BackfillBalanced    => "GB-BF",
            Policy::BackfillBestFit     => "GBF-BF",
            Policy::Slack               => "OSS",
            Policy::Region              => "REG",
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A finished run: its result tuple, how long the decision loop took,
/// and the final engine state for callers wishing to inspect it.
#[derive(Debug)]
pub struct Run {
    pub outcome:    Outcome,
    pub elapsed:    Duration,
    pub engine:     Engine,
}

/// Feeds `jobs` to `policy` on `machines` identical cores and returns the
/// run's outcome.
///
/// Policy construction happens before the first decision: for
/// [`Policy::Threshold`] that means calibrating its f-values, whose
/// failure is the only way a well-formed run can fail.
pub fn simulate(
    jobs:       JobSet,
    machines:   usize,
    policy:     Policy,
    params:     &Params,
) -> Result<Run, SimError> {
    params.validate()?;
    let mut engine = Engine::new(jobs, machines)?;
    let f_values = match policy {
        Policy::Threshold   => Some(threshold::f_values_epsilon(machines, params.epsilon)?),
        _                   => None,
    };

    let begin = Instant::now();
    match policy {
        Policy::GreedyBalanced      => greedy::run(&mut engine, Fit::Balanced, false),
        Policy::GreedyBestFit       => greedy::run(&mut engine, Fit::BestFit, false),
        Policy::MinIdle             => greedy::run(&mut engine, Fit::MinIdle, false),
        Policy::BackfillBalanced    => greedy::run(&mut engine, Fit::Balanced, true),
        Policy::BackfillBestFit     => greedy::run(&mut engine, Fit::BestFit, true),
        Policy::Threshold           => threshold::run(&mut engine, f_values.as_deref().unwrap_or_default()),
        Policy::Slack               => slack::run(&mut engine, params.epsilon),
        Policy::Region              => region::run(&mut engine, params),
    }
    let elapsed = begin.elapsed();
    let outcome = engine.outcome();
    debug_assert_eq!(outcome.accepted + outcome.rejected, engine.submitted());
    info!(
        %policy,
        machines,
        accepted = outcome.accepted,
        rejected = outcome.rejected,
        accepted_load = outcome.accepted_load,
        elapsed_us = elapsed.as_micros() as u64,
        "run finished"
    );

    Ok(Run {
        outcome,
        elapsed,
        engine,
    })
}

/// One line of a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRow {
    pub machines:   usize,
    pub policy:     Policy,
    pub outcome:    Outcome,
    pub elapsed:    Duration,
}

/// Runs every policy in `policies` for every count in `machines`, each on
/// its own copy of `jobs`. Runs proceed in parallel; rows come back
/// grouped by machine count, in the order given.
pub fn sweep(
    jobs:       &JobSet,
    machines:   &[usize],
    policies:   &[Policy],
    params:     &Params,
) -> Result<Vec<SweepRow>, SimError> {
    let grid = machines.iter()
        .copied()
        .cartesian_product(policies.iter().copied())
        .collect::<Vec<_>>();

    grid.into_par_iter()
        .map(|(m, policy)| -> Result<SweepRow, SimError> {
            let run = simulate(jobs.clone(), m, policy, params)?;

            Ok(SweepRow {
                machines:   m,
                policy,
                outcome:    run.outcome,
                elapsed:    run.elapsed,
            })
        })
        .collect()
}

/// The optimal load reported next to a sweep: per machine count, the
/// largest one any policy produced.
pub fn best_optimal(rows: &[SweepRow]) -> IndexMap<usize, TimeSteps> {
    let mut res: IndexMap<usize, TimeSteps> = IndexMap::new();
    for r in rows {
        let best = res.entry(r.machines).or_insert(0);
        if r.outcome.optimal_load > *best {
            *best = r.outcome.optimal_load;
        }
    }

    res
}

/// What a machine count must achieve to end a [`min_machines`] search.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum Goal {
    /// No job gets rejected
    #[default]
    AcceptAll,
    /// `machines × makespan` covers the submitted load, i.e. the optimal
    /// load equals accepted plus rejected load
    CoverLoad,
}

impl Goal {
    pub fn is_met(&self, o: &Outcome) -> bool {
        match self {
            Goal::AcceptAll => o.rejected == 0,
            Goal::CoverLoad => o.optimal_load == o.accepted_load + o.rejected_load,
        }
    }
}

/// Smallest machine count in `range` whose run of `policy` meets `goal`,
/// found by binary search. `None` if even the largest count falls short.
///
/// [`Goal::CoverLoad`] never holds for [`Policy::Slack`] on a non-empty
/// set, since that policy places nothing.
pub fn min_machines(
    jobs:       &JobSet,
    policy:     Policy,
    goal:       Goal,
    params:     &Params,
    range:      RangeInclusive<usize>,
) -> Result<Option<usize>, SimError> {
    let (mut lo, mut hi) = (*range.start(), *range.end());
    if lo == 0 { lo = 1; }
    if lo > hi { return Ok(None); }

    let meets = |m: usize| -> Result<bool, SimError> {
        let run = simulate(jobs.clone(), m, policy, params)?;
        debug!(machines = m, rejected = run.outcome.rejected, optimal_load = run.outcome.optimal_load, "machine count tried");

        Ok(goal.is_met(&run.outcome))
    };

    if !meets(hi)? {
        warn!(%policy, ?goal, machines = hi, "goal missed at the top of the range");
        return Ok(None);
    }
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if meets(mid)? {
            hi = mid;
        } else { lo = mid + 1; }
    }

    Ok(Some(hi))
}
