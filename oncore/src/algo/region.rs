//! Preemptive, small-job-first placement.
//!
//! Jobs are handled in batches sharing a release time, shortest first.
//! Small single-core jobs may cut into a much longer running allocation;
//! everything after the cut on that core moves forward. Whatever cannot
//! preempt goes through best-fit, restricted to cores that free up
//! before the next release.
use crate::helpe::*;
use crate::engine::Rejection;
use crate::machine::Allocation;

/// Where a preemptive insertion would go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cut {
    rank:   usize,
    pos:    usize,
    at:     TimeSteps,
}

/// Length of the allocation a preempting job receives.
pub fn inserted_size(job: &Job, alpha: f64) -> TimeSteps {
    ((alpha * job.processing as f64).ceil() as TimeSteps).max(1)
}

// Scans cores most loaded first for a busy allocation that `job` may cut
// into.
fn find_cut(engine: &Engine, job: &Job, beta: f64, size: TimeSteps) -> Option<Cut> {
    let latest = job.latest_start();
    for (rank, core) in engine.cores().iter().enumerate() {
        let schedule = core.schedule();
        // Ends are sorted as well, since allocations never overlap.
        let first = schedule.partition_point(|a| a.end <= job.release);
        for (pos, a) in schedule.iter().enumerate().skip(first) {
            if a.start > latest { break; }
            if a.start == job.release { continue; }
            if (job.processing as f64) >= beta * a.len() as f64 { continue; }
            let at = job.release.max(a.start);
            if at + size > job.due { continue; }

            return Some(Cut { rank, pos, at });
        }
    }

    None
}

/// Inserts `job` into a running allocation if a large enough one exists
/// in its window. Hands the job back otherwise.
pub fn try_preempt(engine: &mut Engine, mut job: Job, beta: f64, alpha: f64) -> Result<(), Job> {
    if job.cores != 1 { return Err(job); }
    engine.sort_cores();
    let size = inserted_size(&job, alpha);
    let Some(Cut { rank, pos, at }) = find_cut(engine, &job, beta, size) else {
        return Err(job);
    };

    let core_id = engine.cores[rank].id;
    let (id, right_id) = (engine.fresh_id(), engine.fresh_id());
    let inserted = Allocation::busy(id, core_id, at, at + size, job.id);
    let touched = engine.cores[rank].preempt(pos, inserted, right_id);

    // Idle gaps after the cut move along with the busy allocations.
    for v in engine.open.values_mut() {
        if v.core == core_id && v.start >= at {
            v.shift(size);
        }
    }

    let core = &engine.cores[rank];
    for jid in touched {
        let Some(moved) = engine.accepted.get_mut(&jid) else { continue; };
        let Some(last) = core.last_end_of(jid) else { continue; };
        moved.completion = Some(moved.completion.map_or(last, |c| c.max(last)));
        if moved.cores == 1 {
            moved.start = core.schedule()
                .iter()
                .find(|a| a.job() == Some(jid))
                .map(|a| a.start);
        }
        let pieces = core.fragments_of(jid);
        if pieces > 1 {
            moved.weight = Some(pieces);
        }
    }

    debug!(job = job.id, core = core_id, at, size, "preempted");
    job.schedule(at, at + size);
    engine.accept(job);

    Ok(())
}

pub fn run(engine: &mut Engine, params: &Params) {
    let beta = params.epsilon / 4.0;
    while let Some(first) = engine.pop_job() {
        let release = first.release;
        let mut batch = vec![first];
        while let Some(j) = engine.pop_job_released_at(release) {
            batch.push(j);
        }
        batch.sort_by_key(|j| j.processing);
        let mut batch = VecDeque::from(batch);

        // Preemption pass, smallest job first.
        while let Some(job) = batch.pop_front() {
            if let Err(job) = try_preempt(engine, job, beta, params.alpha) {
                batch.push_front(job);
                break;
            }
        }

        // Remaining jobs, still in processing order.
        let next_release = engine.peek_release();
        for job in batch {
            engine.sort_cores();
            let Some(job) = engine.admit(job) else { continue; };
            let free = match next_release {
                Some(t) => engine.cores()
                    .iter()
                    .filter(|c| c.available() < t)
                    .count(),
                None    => engine.machine_count(),
            };
            if job.cores > free {
                engine.reject(job, Rejection::NoFreeCores);
                continue;
            }
            // Free cores are the least loaded ones, at the tail.
            let floor = engine.machine_count() - free;
            let s = engine.search_feasible_from(&job, floor);
            engine.allocate(job, s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(e: &Engine, core: usize) -> Vec<(JobId, TimeSteps, TimeSteps)> {
        e.cores()[core]
            .schedule()
            .iter()
            .map(|a| (a.job().unwrap(), a.start, a.end))
            .collect()
    }

    #[test]
    fn small_jobs_split_long_ones() {
        let jobs = vec![
            Job::new(1, 100, 0, 200, 1),
            Job::new(2, 5, 10, 50, 1),
            Job::new(3, 5, 20, 30, 1),
        ];
        let mut e = Engine::new(jobs, 1).unwrap();
        run(&mut e, &Params { epsilon: 1.0, alpha: 1.0 });

        assert_eq!(pieces(&e, 0), vec![
            (1, 0, 10),
            (2, 10, 15),
            (1, 15, 20),
            (3, 20, 25),
            (1, 25, 110),
        ]);
        let long = e.job(1).unwrap();
        assert_eq!(long.completion, Some(110));
        assert_eq!(long.weight, Some(3));
        assert_eq!(e.cores()[0].available(), 110);
        assert!(e.schedule_is_valid());
    }

    #[test]
    fn busy_cores_wait_for_the_next_cycle() {
        let jobs = vec![
            Job::new(1, 50, 0, 100, 1),
            Job::new(2, 10, 5, 100, 1),
            Job::new(3, 1, 6, 200, 1),
        ];
        let mut e = Engine::new(jobs, 1).unwrap();
        run(&mut e, &Params::default());

        assert!(!e.is_accepted(2));
        assert!(e.is_accepted(3));
        assert_eq!(pieces(&e, 0), vec![(1, 0, 6), (3, 6, 7), (1, 7, 51)]);
    }

    #[test]
    fn gaps_shift_with_the_cut() {
        let jobs = vec![
            Job::new(1, 100, 0, 200, 1),
            Job::new(2, 10, 150, 300, 1),
        ];
        let mut e = Engine::new(jobs, 1).unwrap();
        crate::algo::greedy::run(&mut e, crate::algo::greedy::Fit::Balanced, false);
        let late = Job::new(3, 2, 10, 400, 1);
        assert!(try_preempt(&mut e, late, 0.25, 2.0).is_ok());

        assert_eq!(pieces(&e, 0), vec![(1, 0, 10), (3, 10, 14), (1, 14, 104), (2, 154, 164)]);
        let gaps: Vec<_> = e.open_pool().map(|a| (a.start, a.end)).collect();
        assert_eq!(gaps, vec![(104, 154)]);
        assert_eq!(e.job(2).unwrap().completion, Some(164));
        assert!(e.schedule_is_valid());
    }
}
