use crate::helpe::*;
use crate::machine::{Allocation, Core};

/// The result tuple of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    pub accepted:       usize,
    pub rejected:       usize,
    pub accepted_load:  TimeSteps,
    pub rejected_load:  TimeSteps,
    /// min(machines × makespan, accepted_load + rejected_load)
    pub optimal_load:   TimeSteps,
}

/// Why a job was turned down. Rejections are ordinary outcomes: they
/// update the tallies and get logged, nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The job asks for more cores than exist.
    InfeasibleDemand,
    /// Even the least-loaded core range finishes past the due time.
    DeadlineMiss,
    /// The due time precedes the calibrated deadline threshold.
    Threshold,
    /// The due time precedes the slack policy's deadline floor.
    SlackFloor,
    /// Too few cores are free before the next release.
    NoFreeCores,
}

impl Engine {
    /// Materializes `machines` idle cores and queues `jobs` by release.
    /// Jobs sharing a release keep their input order.
    pub fn new(jobs: JobSet, machines: usize) -> Result<Self, SimError> {
        if machines == 0 { return Err(SimError::NoMachines); }
        let jobs = crate::jobset::init(jobs)?;
        let submitted = jobs.len();

        Ok(Self {
            intake:         jobs.into_iter()
                                .sorted_by_key(|j| j.release)
                                .collect(),
            cores:          (0..machines).map(Core::new).collect(),
            open:           IndexMap::new(),
            accepted:       IndexMap::new(),
            rejected:       IndexMap::new(),
            accepted_load:  0,
            rejected_load:  0,
            submitted,
            next_alloc:     0,
        })
    }

    //---START INTAKE
    pub fn pop_job(&mut self) -> Option<Job> {
        self.intake.pop_front()
    }

    pub fn peek_release(&self) -> Option<TimeSteps> {
        self.intake.front().map(|j| j.release)
    }

    /// Pops the next job only if it is released exactly at `t`.
    pub fn pop_job_released_at(&mut self, t: TimeSteps) -> Option<Job> {
        if self.peek_release() == Some(t) {
            self.intake.pop_front()
        } else { None }
    }

    pub fn pending(&self) -> usize {
        self.intake.len()
    }

    pub(crate) fn intake(&self) -> impl Iterator<Item = &Job> + Clone {
        self.intake.iter()
    }
    //---END INTAKE

    /// Ranks cores by decreasing available time. The sort is stable, so
    /// equally loaded cores keep their relative order.
    pub fn sort_cores(&mut self) {
        self.cores.sort_by_key(|c| std::cmp::Reverse(c.available()));
    }

    pub fn machine_count(&self) -> usize {
        self.cores.len()
    }

    /// `max(core.available, job.release)` for the core ranked `idx`.
    #[inline(always)]
    pub fn start_time(&self, job: &Job, idx: usize) -> TimeSteps {
        self.cores[idx].available().max(job.release)
    }

    #[inline(always)]
    pub fn completion_time(&self, job: &Job, idx: usize) -> TimeSteps {
        self.start_time(job, idx) + job.processing
    }

    #[inline(always)]
    pub fn is_feasible_on(&self, job: &Job, idx: usize) -> bool {
        self.completion_time(job, idx) <= job.due
    }

    /// A job may only be placed if the machine has enough cores.
    pub fn is_legal(&self, job: &Job) -> bool {
        job.cores <= self.cores.len()
    }

    /// First position of the least-loaded contiguous range able to host
    /// `job`. Only meaningful for legal jobs over sorted cores.
    #[inline(always)]
    pub fn least_loaded_start(&self, job: &Job) -> usize {
        self.cores.len() - job.cores
    }

    /// Shared admission check: legality first, then feasibility on the
    /// least-loaded range. Hands the job back if it survives; otherwise
    /// records the rejection. Expects sorted cores.
    pub fn admit(&mut self, job: Job) -> Option<Job> {
        if !self.is_legal(&job) {
            self.reject(job, Rejection::InfeasibleDemand);
            return None;
        }
        if !self.is_feasible_on(&job, self.least_loaded_start(&job)) {
            self.reject(job, Rejection::DeadlineMiss);
            return None;
        }

        Some(job)
    }

    /// Binary-searches the most loaded start position whose range still
    /// meets the due time. Position 0 wins outright if feasible.
    ///
    /// Feasibility is monotone over sorted cores: a feasible position
    /// stays feasible when moving towards the least-loaded end. The
    /// least-loaded start position must be feasible on entry.
    pub fn search_most_loaded_feasible_core(&self, job: &Job) -> usize {
        self.search_feasible_from(job, 0)
    }

    /// Same as [`Engine::search_most_loaded_feasible_core`], restricted to
    /// start positions no lower than `floor`.
    pub fn search_feasible_from(&self, job: &Job, floor: usize) -> usize {
        let top = self.least_loaded_start(job);
        debug_assert!(floor <= top);
        debug_assert!(self.is_feasible_on(job, top), "Search over infeasible job");
        if self.is_feasible_on(job, floor) { return floor; }

        // `bad` is always infeasible, `good` always feasible.
        let (mut bad, mut good) = (floor, top);
        while good - bad > 1 {
            let mid = bad + (good - bad).div_ceil(2);
            if self.is_feasible_on(job, mid) {
                good = mid;
            } else { bad = mid; }
        }

        good
    }

    /// Places `job` on the cores ranked [s, s + cores), all starting
    /// together at the start time of core `s`. Idle gaps opened on any
    /// of those cores enter the open pool.
    pub fn allocate(&mut self, mut job: Job, s: usize) {
        debug_assert!(s + job.cores <= self.cores.len());
        let start = self.start_time(&job, s);
        let end = start + job.processing;
        debug_assert!(end <= job.due, "Allocating past the due time");
        for idx in s..s + job.cores {
            let prev = self.cores[idx].available();
            debug_assert!(prev <= start);
            let core_id = self.cores[idx].id;
            if prev < start {
                let id = self.fresh_id();
                self.open.insert(id, Allocation::vacant(id, core_id, prev, start));
            }
            let id = self.fresh_id();
            self.cores[idx].push(Allocation::busy(id, core_id, start, end, job.id));
        }
        job.schedule(start, end);
        self.accept(job);
    }

    /// Records an admitted job. Callers that place it have already set
    /// its times.
    pub(crate) fn accept(&mut self, job: Job) {
        debug!(
            job = job.id,
            start = ?job.start,
            completion = ?job.completion,
            "accepted"
        );
        self.accepted_load += job.load();
        self.accepted.insert(job.id, job);
    }

    pub fn reject(&mut self, job: Job, reason: Rejection) {
        debug!(job = job.id, ?reason, "rejected");
        self.rejected_load += job.load();
        self.rejected.insert(job.id, job);
    }

    pub(crate) fn fresh_id(&mut self) -> AllocId {
        let id = self.next_alloc;
        self.next_alloc += 1;

        id
    }

    /// Current rank of the core with stable id `id`.
    pub(crate) fn core_index(&self, id: CoreId) -> Option<usize> {
        self.cores.iter().position(|c| c.id == id)
    }

    /// Latest available time across all cores.
    pub fn makespan(&self) -> TimeSteps {
        self.cores.iter()
            .map(Core::available)
            .max()
            .unwrap_or(0)
    }

    pub fn outcome(&self) -> Outcome {
        let total = self.accepted_load + self.rejected_load;
        let capacity = self.cores.len() as TimeSteps * self.makespan();

        Outcome {
            accepted:       self.accepted.len(),
            rejected:       self.rejected.len(),
            accepted_load:  self.accepted_load,
            rejected_load:  self.rejected_load,
            optimal_load:   capacity.min(total),
        }
    }

    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    /// Vacant allocations not yet consumed by backfill.
    pub fn open_pool(&self) -> impl Iterator<Item = &Allocation> {
        self.open.values()
    }

    pub fn accepted(&self) -> impl Iterator<Item = &Job> {
        self.accepted.values()
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Job> {
        self.rejected.values()
    }

    pub fn is_accepted(&self, id: JobId) -> bool {
        self.accepted.contains_key(&id)
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.accepted.get(&id)
            .or_else(|| self.rejected.get(&id))
    }

    /// Number of jobs the run started with.
    pub fn submitted(&self) -> usize {
        self.submitted
    }
}
