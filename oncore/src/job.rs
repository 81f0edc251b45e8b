use crate::helpe::*;

impl Job {
    /// Creates a fresh, unscheduled [Job].
    pub fn new(
        id:         JobId,
        processing: TimeSteps,
        release:    TimeSteps,
        due:        TimeSteps,
        cores:      usize,
    ) -> Self {
        Self {
            id,
            processing,
            release,
            due,
            cores,
            start:      None,
            completion: None,
            weight:     None,
        }
    }

    /// Core-seconds demanded by the job.
    #[inline(always)]
    pub fn load(&self) -> TimeSteps {
        self.processing * self.cores as TimeSteps
    }

    /// The last moment at which the job may start and still meet its
    /// due time.
    #[inline(always)]
    pub fn latest_start(&self) -> TimeSteps {
        self.due - self.processing
    }

    pub fn is_scheduled(&self) -> bool {
        self.start.is_some()
    }

    /// Commits the job to [start, completion).
    pub fn schedule(&mut self, start: TimeSteps, completion: TimeSteps) {
        debug_assert!(completion >= start, "Inverted schedule requested");
        self.start = Some(start);
        self.completion = Some(completion);
    }

    /// `true` if the job, as scheduled, respects its window.
    pub fn meets_window(&self) -> bool {
        match (self.start, self.completion) {
            (Some(s), Some(c))  => s >= self.release && c <= self.due,
            _                   => false,
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl std::hash::Hash for Job {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// Jobs are ordered by release. Ties are left to the caller, who is
// expected to use stable sorts.
impl Ord for Job {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.release.cmp(&other.release)
    }
}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_counts_every_core() {
        let j = Job::new(0, 7, 0, 20, 3);
        assert_eq!(j.load(), 21);
        assert_eq!(j.latest_start(), 13);
    }

    #[test]
    fn window_check_follows_schedule() {
        let mut j = Job::new(0, 5, 2, 10, 1);
        assert!(!j.meets_window());
        j.schedule(2, 7);
        assert!(j.meets_window());
        j.schedule(6, 11);
        assert!(!j.meets_window());
    }
}
