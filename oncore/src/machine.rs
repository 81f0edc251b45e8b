use crate::helpe::*;

/// What occupies an [Allocation].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Busy(JobId),
    Vacant,
}

/// A half-open interval [start, end) on exactly one [Core].
///
/// Busy allocations live in their core's schedule. Vacant ones, the idle
/// gaps that placement leaves behind, live in the engine's open pool
/// until backfill consumes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub id:     AllocId,
    pub core:   CoreId,
    pub start:  TimeSteps,
    pub end:    TimeSteps,
    pub slot:   Slot,
    /// Set on busy allocations that resulted from a preemptive split:
    /// 1 for the left remainder, 2 for the first right fragment and so on.
    pub piece:  Option<u32>,
}

impl Allocation {
    pub fn busy(
        id:     AllocId,
        core:   CoreId,
        start:  TimeSteps,
        end:    TimeSteps,
        job:    JobId,
    ) -> Self {
        debug_assert!(start < end, "Empty busy allocation requested");
        Self {
            id,
            core,
            start,
            end,
            slot:   Slot::Busy(job),
            piece:  None,
        }
    }

    pub fn vacant(
        id:     AllocId,
        core:   CoreId,
        start:  TimeSteps,
        end:    TimeSteps,
    ) -> Self {
        debug_assert!(start < end, "Empty vacant allocation requested");
        Self {
            id,
            core,
            start,
            end,
            slot:   Slot::Vacant,
            piece:  None,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> TimeSteps {
        self.end - self.start
    }

    /// Idle time offered by this allocation. Zero for busy ones.
    pub fn vacant_size(&self) -> TimeSteps {
        match self.slot {
            Slot::Vacant    => self.len(),
            Slot::Busy(_)   => 0,
        }
    }

    pub fn job(&self) -> Option<JobId> {
        match self.slot {
            Slot::Busy(j)   => Some(j),
            Slot::Vacant    => None,
        }
    }

    /// `true` if `t` falls inside [start, end).
    #[inline(always)]
    pub fn covers(&self, t: TimeSteps) -> bool {
        self.start <= t && t < self.end
    }

    #[inline(always)]
    pub fn shift(&mut self, by: TimeSteps) {
        self.start += by;
        self.end += by;
    }
}

/// One unit of processing capacity and its realized schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Core {
    pub id:         CoreId,
    // Busy allocations only, sorted by start, pairwise disjoint.
    schedule:       Vec<Allocation>,
    available:      TimeSteps,
}

impl Core {
    pub fn new(id: CoreId) -> Self {
        Self {
            id,
            schedule:   vec![],
            available:  0,
        }
    }

    /// End of the last scheduled allocation, or 0 for an idle core.
    #[inline(always)]
    pub fn available(&self) -> TimeSteps {
        self.available
    }

    pub fn schedule(&self) -> &[Allocation] {
        &self.schedule
    }

    /// Appends a busy allocation at the tail of the schedule.
    pub(crate) fn push(&mut self, a: Allocation) {
        debug_assert!(a.start >= self.available, "Tail push overlaps the schedule");
        debug_assert!(a.job().is_some());
        self.available = a.end;
        self.schedule.push(a);
    }

    /// Inserts a busy allocation somewhere inside the schedule, keeping it
    /// sorted. Used by backfill, which only ever fills idle gaps and so
    /// never moves the available time.
    pub(crate) fn attach(&mut self, a: Allocation) {
        let idx = self.schedule.partition_point(|x| x.start < a.start);
        debug_assert!(idx == 0 || self.schedule[idx - 1].end <= a.start);
        debug_assert!(idx == self.schedule.len() || a.end <= self.schedule[idx].start);
        if a.end > self.available { self.available = a.end; }
        self.schedule.insert(idx, a);
    }

    /// Position of the busy allocation covering `t`, if any.
    pub fn covering(&self, t: TimeSteps) -> Option<usize> {
        let idx = self.schedule.partition_point(|a| a.start <= t);
        if idx == 0 { return None; }
        if self.schedule[idx - 1].end > t {
            Some(idx - 1)
        } else { None }
    }

    /// Inserts `inserted` inside the busy allocation at `idx`, pushing
    /// everything from the insertion point onwards forward by the inserted
    /// length. If the insertion point is strictly inside the victim, the
    /// victim is split in two and its right fragment gets `right_id`.
    ///
    /// Returns the ids of all jobs whose allocations moved or got split.
    pub(crate) fn preempt(
        &mut self,
        idx:        usize,
        inserted:   Allocation,
        right_id:   AllocId,
    ) -> Vec<JobId> {
        let at = inserted.start;
        let by = inserted.len();
        debug_assert!(self.schedule[idx].start <= at && at < self.schedule[idx].end);
        let mut touched = vec![];

        let tail_from = if self.schedule[idx].start == at {
            // Nothing stays on the left: the victim moves as a whole.
            idx
        } else {
            let victim = &mut self.schedule[idx];
            let job = victim.job();
            let mut right = victim.clone();
            right.id = right_id;
            right.start = at;
            victim.end = at;
            let next_piece = match job {
                Some(j) => self.pieces_of(j) + 1,
                None    => 2,
            };
            let victim = &mut self.schedule[idx];
            if victim.piece.is_none() { victim.piece = Some(1); }
            right.piece = Some(next_piece);
            self.schedule.insert(idx + 1, right);

            idx + 1
        };

        for a in self.schedule[tail_from..].iter_mut() {
            a.shift(by);
            if let Some(j) = a.job() { touched.push(j); }
        }
        self.schedule.insert(tail_from, inserted);
        self.available = self.schedule.last()
            .map_or(0, |a| a.end);

        touched.into_iter()
            .unique()
            .collect()
    }

    // Highest piece number carried by `job` on this core, 1 if unsplit.
    fn pieces_of(&self, job: JobId) -> u32 {
        self.schedule.iter()
            .filter(|a| a.job() == Some(job))
            .map(|a| a.piece.unwrap_or(1))
            .max()
            .unwrap_or(1)
    }

    /// Number of busy allocations belonging to `job` on this core.
    pub fn fragments_of(&self, job: JobId) -> u32 {
        self.schedule.iter()
            .filter(|a| a.job() == Some(job))
            .count() as u32
    }

    /// End of the latest allocation belonging to `job` on this core.
    pub fn last_end_of(&self, job: JobId) -> Option<TimeSteps> {
        self.schedule.iter()
            .filter(|a| a.job() == Some(job))
            .map(|a| a.end)
            .max()
    }

    /// The job ids running on this core, in start order.
    pub fn render(&self) -> String {
        let ids = self.schedule.iter()
            .filter_map(Allocation::job)
            .join(", ");

        format!("core {}: [{}]", self.id, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_with(jobs: &[(JobId, TimeSteps, TimeSteps)]) -> Core {
        let mut c = Core::new(0);
        for (n, &(j, s, e)) in jobs.iter().enumerate() {
            c.push(Allocation::busy(n as AllocId, 0, s, e, j));
        }
        c
    }

    #[test]
    fn covering_uses_half_open_windows() {
        let c = core_with(&[(1, 0, 10), (2, 12, 20)]);
        assert_eq!(c.covering(0), Some(0));
        assert_eq!(c.covering(9), Some(0));
        assert_eq!(c.covering(10), None);
        assert_eq!(c.covering(12), Some(1));
        assert_eq!(c.covering(25), None);
    }

    #[test]
    fn preempting_inside_splits_the_victim() {
        let mut c = core_with(&[(1, 0, 100), (2, 100, 120)]);
        let touched = c.preempt(0, Allocation::busy(10, 0, 40, 45, 7), 11);
        let got: Vec<_> = c.schedule().iter()
            .map(|a| (a.job(), a.start, a.end, a.piece))
            .collect();
        assert_eq!(got, vec![
            (Some(1), 0, 40, Some(1)),
            (Some(7), 40, 45, None),
            (Some(1), 45, 105, Some(2)),
            (Some(2), 105, 125, None),
        ]);
        assert_eq!(c.available(), 125);
        assert_eq!(touched, vec![1, 2]);
        assert_eq!(c.fragments_of(1), 2);
    }

    #[test]
    fn preempting_at_the_start_pushes_the_victim() {
        let mut c = core_with(&[(1, 10, 50)]);
        c.preempt(0, Allocation::busy(10, 0, 10, 13, 7), 11);
        let got: Vec<_> = c.schedule().iter()
            .map(|a| (a.job(), a.start, a.end))
            .collect();
        assert_eq!(got, vec![(Some(7), 10, 13), (Some(1), 13, 53)]);
        assert_eq!(c.available(), 53);
    }

    #[test]
    fn render_lists_jobs_in_start_order() {
        let mut c = core_with(&[(3, 20, 30)]);
        c.attach(Allocation::busy(5, 0, 2, 9, 4));
        assert_eq!(c.render(), "core 0: [4, 3]");
        assert_eq!(c.available(), 30);
    }
}
