use crate::helpe::*;
use super::backfill;

/// Where an admitted job lands among the sorted cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// The least-loaded contiguous range.
    Balanced,
    /// The most loaded range still meeting the due time.
    BestFit,
    /// The range wasting the least idle time.
    MinIdle,
}

/// Drives the engine to completion, one job at a time, in release order.
///
/// With `backfill` on, every job first tries the idle gaps left behind
/// earlier placements; only if that fails does it go through admission.
pub fn run(engine: &mut Engine, fit: Fit, backfill: bool) {
    while let Some(job) = engine.pop_job() {
        let job = if backfill {
            match backfill::place(engine, job) {
                Ok(())      => continue,
                Err(job)    => job,
            }
        } else { job };

        engine.sort_cores();
        let Some(job) = engine.admit(job) else { continue; };
        let s = match fit {
            Fit::Balanced   => engine.least_loaded_start(&job),
            Fit::BestFit    => engine.search_most_loaded_feasible_core(&job),
            Fit::MinIdle    => min_idle_start(engine, &job),
        };
        engine.allocate(job, s);
    }
}

/// Idle time opened if `job` starts on the range beginning at `s`.
pub fn idle_at(engine: &Engine, job: &Job, s: usize) -> TimeSteps {
    let start = engine.start_time(job, s);

    engine.cores()[s..s + job.cores]
        .iter()
        .map(|c| start - c.available())
        .sum()
}

/// Scans start positions from the least-loaded end towards the most
/// loaded one, stopping at the first infeasible position. Among equal
/// idle times, the most loaded candidate wins.
pub fn min_idle_start(engine: &Engine, job: &Job) -> usize {
    let top = engine.least_loaded_start(job);
    let mut best = (top, idle_at(engine, job, top));
    for s in (0..top).rev() {
        if !engine.is_feasible_on(job, s) { break; }
        let idle = idle_at(engine, job, s);
        if idle <= best.1 {
            best = (s, idle);
        }
    }
    trace!(job = job.id, start = best.0, idle = best.1, "min-idle pick");

    best.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(avails: &[TimeSteps]) -> Engine {
        let jobs = avails.iter()
            .enumerate()
            .map(|(i, &a)| Job::new(100 + i as JobId, a, 0, a, 1))
            .collect();
        let mut e = Engine::new(jobs, avails.len()).unwrap();
        run(&mut e, Fit::Balanced, false);
        e.sort_cores();
        e
    }

    #[test]
    fn min_idle_prefers_tightly_packed_ranges() {
        // Cores end at 40, 30, 29, 10.
        let e = engine_with(&[10, 29, 30, 40]);
        let job = Job::new(1, 5, 0, 100, 2);
        // [2,4): start 29, idle 19. [1,3): start 30, idle 1. [0,2): start 40, idle 10.
        assert_eq!(min_idle_start(&e, &job), 1);
    }

    #[test]
    fn min_idle_stops_at_first_infeasible_position() {
        let e = engine_with(&[10, 29, 30, 40]);
        // [1,3) would finish at 35.
        let job = Job::new(1, 5, 0, 34, 2);
        assert_eq!(min_idle_start(&e, &job), 2);
        // Positions 3 and 2 both waste nothing; the more loaded one wins.
        let job = Job::new(2, 5, 0, 34, 1);
        assert_eq!(min_idle_start(&e, &job), 2);
    }

    #[test]
    fn best_fit_never_lands_below_balanced() {
        let e = engine_with(&[10, 29, 30, 40]);
        for d in 5..60 {
            let job = Job::new(1, 5, 0, d, 2);
            if !e.is_feasible_on(&job, e.least_loaded_start(&job)) { continue; }
            assert!(e.search_most_loaded_feasible_core(&job) <= e.least_loaded_start(&job));
        }
    }
}
