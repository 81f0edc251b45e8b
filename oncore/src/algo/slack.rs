//! Slack-based competitive admission.
//!
//! The policy never looks at cores. It keeps a monotone deadline floor
//! and two cumulative work curves built from accepted jobs: `v_start`,
//! where each job ramps up by its processing time right after release,
//! and `v_end`, where it ramps up right before its due time. A job is
//! admitted iff its due time is not below the floor.
use crate::helpe::*;
use crate::engine::Rejection;

/// The closed-form competitive coefficient for `machines` cores:
/// `1 / ((1 + ε) * (((1 + ε) / ε)^(1 / m) - 1))`.
pub fn competitive_coefficient(epsilon: f64, machines: usize) -> f64 {
    let root = ((1.0 + epsilon) / epsilon).powf(1.0 / machines as f64);

    1.0 / ((1.0 + epsilon) * (root - 1.0))
}

/// Prefix sums over a fixed set of coordinates.
#[derive(Debug, Clone)]
struct Fenwick {
    tree: Vec<i128>,
}

impl Fenwick {
    fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
        }
    }

    fn add(&mut self, idx: usize, delta: i128) {
        let mut i = idx + 1;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += i & i.wrapping_neg();
        }
    }

    /// Sum of entries [0, len).
    fn prefix(&self, len: usize) -> i128 {
        let mut i = len;
        let mut acc = 0;
        while i > 0 {
            acc += self.tree[i];
            i &= i - 1;
        }

        acc
    }
}

/// A sum of unit-slope ramps: each one is 0 before `from`, grows by one
/// per time step up to `to` and stays flat afterwards.
///
/// Ramp endpoints must come from the coordinate set given on
/// construction, which keeps memory proportional to the number of
/// distinct endpoints instead of the time horizon.
#[derive(Debug, Clone)]
pub struct RampSum {
    coords: Vec<TimeSteps>,
    // Σ slope changes, and Σ slope change × coordinate.
    slope:  Fenwick,
    moment: Fenwick,
}

impl RampSum {
    pub fn new(coords: impl IntoIterator<Item = TimeSteps>) -> Self {
        let coords = coords.into_iter()
            .sorted_unstable()
            .dedup()
            .collect::<Vec<_>>();
        let len = coords.len();

        Self {
            coords,
            slope:  Fenwick::new(len),
            moment: Fenwick::new(len),
        }
    }

    fn slot(&self, t: TimeSteps) -> usize {
        let idx = self.coords.partition_point(|&c| c < t);
        debug_assert!(self.coords.get(idx) == Some(&t), "Ramp endpoint outside coordinate set");

        idx
    }

    /// Adds a ramp rising over [from, to].
    pub fn add_ramp(&mut self, from: TimeSteps, to: TimeSteps) {
        debug_assert!(from <= to);
        if from == to { return; }
        let (a, b) = (self.slot(from), self.slot(to));
        self.slope.add(a, 1);
        self.moment.add(a, from as i128);
        self.slope.add(b, -1);
        self.moment.add(b, -(to as i128));
    }

    /// Value of the sum at `t`.
    pub fn at(&self, t: f64) -> f64 {
        let idx = self.coords.partition_point(|&c| (c as f64) <= t);
        let s = self.slope.prefix(idx) as f64;
        let m = self.moment.prefix(idx) as f64;

        t * s - m
    }
}

/// The admission state of the slack policy.
#[derive(Debug, Clone)]
pub struct SlackState {
    f:          f64,
    d_min:      f64,
    last_due:   Option<TimeSteps>,
    v_start:    RampSum,
    v_end:      RampSum,
}

impl SlackState {
    /// `horizon` lists every job the state may ever be offered. Only their
    /// windows become ramp endpoints.
    pub fn new<'a>(
        epsilon:    f64,
        machines:   usize,
        horizon:    impl Iterator<Item = &'a Job> + Clone,
    ) -> Self {
        let starts = horizon.clone()
            .flat_map(|j| [j.release, j.release + j.processing]);
        let ends = horizon
            .flat_map(|j| [j.due - j.processing, j.due]);

        Self {
            f:          competitive_coefficient(epsilon, machines),
            d_min:      0.0,
            last_due:   None,
            v_start:    RampSum::new(starts),
            v_end:      RampSum::new(ends),
        }
    }

    pub fn deadline_floor(&self) -> f64 {
        self.d_min
    }

    /// Work of accepted jobs that could have run by `t` if started
    /// right at release.
    pub fn released_work(&self, t: f64) -> f64 {
        self.v_start.at(t)
    }

    /// Work of accepted jobs that must have run by `t` to meet their due
    /// times.
    pub fn due_work(&self, t: f64) -> f64 {
        self.v_end.at(t)
    }

    /// Decides on `job`, folding it into the state if accepted.
    pub fn offer(&mut self, job: &Job) -> bool {
        let r = job.release as f64;
        self.d_min = self.d_min.max(r);
        let compensation = ((self.d_min - r) * self.f
            - (self.v_end.at(self.d_min) - self.v_end.at(r)))
            .max(0.0);
        if (job.due as f64) < self.d_min {
            return false;
        }

        self.v_start.add_ramp(job.release, job.release + job.processing);
        self.v_end.add_ramp(job.due - job.processing, job.due);
        let last_due = self.last_due.map_or(job.due, |d| d.max(job.due));
        self.last_due = Some(last_due);
        let pending = (self.v_end.at(last_due as f64) - self.v_end.at(r)).max(0.0);
        self.d_min = self.d_min.max(r + (compensation + pending) / self.f);

        true
    }
}

pub fn run(engine: &mut Engine, epsilon: f64) {
    let mut state = SlackState::new(epsilon, engine.machine_count(), engine.intake());
    while let Some(job) = engine.pop_job() {
        if !engine.is_legal(&job) {
            engine.reject(job, Rejection::InfeasibleDemand);
        } else if state.offer(&job) {
            trace!(job = job.id, floor = state.deadline_floor(), "slack admits");
            engine.accept(job);
        } else {
            engine.reject(job, Rejection::SlackFloor);
        }
    }
}
