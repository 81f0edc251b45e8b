use crate::helpe::*;
use crate::machine::Allocation;

/// The part of a vacant allocation usable by some job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub alloc:  AllocId,
    pub lo:     TimeSteps,
    pub hi:     TimeSteps,
}

/// Clips every vacant allocation in the pool to `job`'s window and keeps
/// those still long enough to host it. Pool order is preserved.
pub fn usable_windows<'a>(
    pool:   impl Iterator<Item = &'a Allocation>,
    job:    &Job,
) -> Vec<Window> {
    pool.filter_map(|v| {
            let lo = job.release.max(v.start);
            let hi = job.due.min(v.end);

            (hi - lo >= job.processing).then_some(Window {
                alloc:  v.id,
                lo,
                hi,
            })
        })
        .collect()
}

/// Earliest `t` such that at least `need` windows overlap every instant
/// of [t, t + len).
///
/// Works on window endpoints only, so its cost depends on the number of
/// windows and not on the width of the job's window.
pub fn first_covered_run(
    windows:    &[Window],
    need:       usize,
    len:        TimeSteps,
) -> Option<TimeSteps> {
    let events = windows.iter()
        .flat_map(|w| [(w.lo, 1_i64), (w.hi, -1_i64)])
        .sorted_unstable_by_key(|&(t, _)| t)
        .collect::<Vec<_>>();

    let mut coverage: i64 = 0;
    let mut run_start: Option<TimeSteps> = None;
    for (t, group) in &events.into_iter().chunk_by(|&(t, _)| t) {
        // Coverage has been at least `need` since `run_start`, up to `t`.
        if let Some(s) = run_start {
            if t - s >= len { return Some(s); }
        }
        coverage += group.map(|(_, delta)| delta).sum::<i64>();
        if coverage >= need as i64 {
            run_start.get_or_insert(t);
        } else { run_start = None; }
    }

    None
}

/// Tries to fit `job` entirely inside idle gaps, without moving any
/// core's available time. On success the job is placed and accepted.
/// On failure the job is handed back and nothing has changed.
pub fn place(engine: &mut Engine, mut job: Job) -> Result<(), Job> {
    let windows = usable_windows(engine.open_pool(), &job);
    let Some(start) = first_covered_run(&windows, job.cores, job.processing) else {
        return Err(job);
    };
    let end = start + job.processing;

    // Coverage may be stitched from windows that each cover only part of
    // the run. Only windows spanning all of it are usable.
    let chosen = windows.iter()
        .filter(|w| w.lo <= start && end <= w.hi)
        .take(job.cores)
        .map(|w| w.alloc)
        .collect::<Vec<_>>();
    if chosen.len() < job.cores {
        trace!(job = job.id, start, "fragmented coverage, no backfill");
        return Err(job);
    }

    // Compute every pool change first, then apply them by id.
    let mut removals = vec![];
    let mut remainders = vec![];
    let mut slices = vec![];
    for id in chosen {
        let Some(v) = engine.open.get(&id) else { return Err(job); };
        if v.start < start {
            remainders.push((v.core, v.start, start));
        }
        if end < v.end {
            remainders.push((v.core, end, v.end));
        }
        slices.push(v.core);
        removals.push(id);
    }

    for id in removals {
        engine.open.shift_remove(&id);
    }
    for (core, s, e) in remainders {
        let id = engine.fresh_id();
        engine.open.insert(id, Allocation::vacant(id, core, s, e));
    }
    for core in slices {
        let id = engine.fresh_id();
        if let Some(idx) = engine.core_index(core) {
            engine.cores[idx].attach(Allocation::busy(id, core, start, end, job.id));
        }
    }
    debug!(job = job.id, start, "backfilled");
    job.schedule(start, end);
    engine.accept(job);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(lo: TimeSteps, hi: TimeSteps) -> Window {
        Window { alloc: 0, lo, hi }
    }

    #[test]
    fn run_needs_enough_simultaneous_windows() {
        let ws = [w(0, 8), w(3, 20), w(5, 30)];
        assert_eq!(first_covered_run(&ws, 1, 10), Some(0));
        assert_eq!(first_covered_run(&ws, 2, 10), Some(3));
        assert_eq!(first_covered_run(&ws, 3, 3), Some(5));
        assert_eq!(first_covered_run(&ws, 3, 4), None);
    }

    #[test]
    fn touching_windows_form_one_run() {
        let ws = [w(0, 5), w(5, 10)];
        assert_eq!(first_covered_run(&ws, 1, 10), Some(0));
    }

    #[test]
    fn stitched_coverage_does_not_backfill() {
        let mut e = Engine::new(vec![], 3).unwrap();
        for (core, s, end) in [(0, 0, 10), (1, 5, 15), (2, 10, 20)] {
            let id = e.fresh_id();
            e.open.insert(id, Allocation::vacant(id, core, s, end));
        }
        let before = e.clone();
        // Two gaps cover every instant of [5, 15), yet only one spans it.
        let job = Job::new(9, 10, 0, 100, 2);
        assert!(place(&mut e, job).is_err());
        assert_eq!(e.open, before.open);
        assert_eq!(e.cores(), before.cores());
        assert_eq!(e.outcome(), before.outcome());
    }
}
