use crate::helpe::*;

/// Initializes a JobSet with a given set of jobs.
/// A successfully returned JobSet is guaranteed to be
/// compliant with all of `oncore`'s assumptions. These are:
/// - every job needs some processing time
/// - no job is released before time 0
/// - every job asks for at least one core
/// - ids are unique
/// - no job has been scheduled yet
///
/// Jobs whose window is too tight for their processing time, including
/// those due before their release, are *not* refused here: turning them
/// down is the simulator's job.
///
/// This function is the gatekeeper to the rest of the library.
pub fn init(mut in_elts: Vec<Job>) -> Result<JobSet, JobError> {
    let mut seen: HashSet<JobId> = HashSet::with_capacity(in_elts.len());
    let mut culprit = None;
    for (idx, j) in in_elts.iter().enumerate() {
        let message = if j.processing <= 0 {
            "Job with non-positive processing time found!"
        } else if j.release < 0 {
            "Job with negative release found!"
        } else if j.cores == 0 {
            "Job asking for 0 cores found!"
        } else if j.is_scheduled() || j.weight.is_some() {
            "Already scheduled job found!"
        } else if !seen.insert(j.id) {
            "Duplicate job id found!"
        } else { continue; };
        culprit = Some((idx, message));
        break;
    }

    if let Some((idx, message)) = culprit {
        return Err(JobError {
            message: String::from(message),
            culprit: in_elts.swap_remove(idx),
        });
    }

    Ok(in_elts)
}

/// Total core-seconds demanded by `jobs`.
pub fn total_load(jobs: &[Job]) -> TimeSteps {
    jobs.iter()
        .map(Job::load)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_are_refused() {
        let jobs = vec![
            Job::new(1, 5, 0, 10, 1),
            Job::new(2, 5, 0, 10, 1),
            Job::new(1, 3, 4, 10, 2),
        ];
        let e = init(jobs).unwrap_err();
        assert_eq!(e.culprit.id, 1);
        assert_eq!(e.culprit.processing, 3);
    }

    #[test]
    fn tight_windows_pass_the_gate() {
        let jobs = vec![Job::new(1, 50, 0, 10, 1)];
        assert!(init(jobs).is_ok());
    }

    #[test]
    fn inverted_windows_pass_the_gate() {
        let jobs = vec![Job::new(1, 5, 10, 8, 1)];
        assert_eq!(init(jobs).unwrap()[0].due, 8);
    }

    #[test]
    fn zero_cores_are_refused() {
        let jobs = vec![Job::new(1, 5, 0, 10, 0)];
        assert!(init(jobs).is_err());
    }

    #[test]
    fn load_sums_core_seconds() {
        let jobs = vec![Job::new(1, 5, 0, 10, 2), Job::new(2, 3, 0, 10, 1)];
        assert_eq!(total_load(&jobs), 13);
    }
}
