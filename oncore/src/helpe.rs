pub use std::{
    collections::{HashMap, HashSet, VecDeque},
    io::{BufRead, BufReader},
    path::PathBuf,
    time::{Duration, Instant},
};
pub use thiserror::Error;
pub use itertools::Itertools;
pub use rayon::prelude::*;
pub use indexmap::IndexMap;
pub use clap::{Parser, ValueEnum};
pub use tracing::{debug, info, trace, warn};

pub use crate::{Engine, Job,
    jobset::*,
};

/// The unit for measuring logical time. Processing times, release/due
/// times and core-seconds loads all share it.
///
/// It is signed on purpose: several policies reason about differences
/// such as `available - release`, which go negative on idle cores.
pub type TimeSteps = i64;

pub type JobId = u32;

/// Stable identity of a core. Positions inside [`Engine`] change every
/// time cores are re-ranked; ids never do.
pub type CoreId = usize;

pub type AllocId = u64;

/// A group of jobs. Order does not matter on input: the [`Engine`]
/// sorts by release on construction.
pub type JobSet = Vec<Job>;

#[derive(Error, Debug)]
#[error("{message}\n{:?}", culprit)]
/// Appears while constructing the [JobSet] to be simulated.
pub struct JobError {
    pub message: String,
    pub culprit: Job,
}

/// Everything that can stop a simulation from producing a result.
///
/// Rejecting a job is *not* an error: it is one of the two normal
/// outcomes of every decision (see [`crate::Rejection`]).
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("trace line {line}: {reason}")]
    Trace {
        line:   usize,
        reason: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("ε = {epsilon} cannot be reached by any f-value bracket with {machines} machines")]
    CalibrationOutOfRange {
        epsilon:    f64,
        machines:   usize,
    },
    #[error("ε-bisection for ε = {epsilon} with {machines} machines stalled after {iterations} iterations")]
    CalibrationNonConvergence {
        epsilon:    f64,
        machines:   usize,
        iterations: usize,
    },
    #[error("at least one machine is needed")]
    NoMachines,
    #[error("bad value for {name}: {value}")]
    BadParam {
        name:   &'static str,
        value:  f64,
    },
}

/// Scalar knobs of the competitive policies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Target competitive parameter of `Threshold`, `Slack` and `Region`.
    pub epsilon:    f64,
    /// Stretch applied by `Region` to a job inserted through preemption.
    pub alpha:      f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            epsilon:    0.1,
            alpha:      1.0,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(SimError::BadParam { name: "epsilon", value: self.epsilon });
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(SimError::BadParam { name: "alpha", value: self.alpha });
        }

        Ok(())
    }
}

/// Defines the interface for reading jobs.
///
/// Every on-disk format gets its own type implementing [JobGen]; the
/// rest of the crate only ever sees the resulting [JobSet].
pub trait JobGen<T> {
    fn new(path: PathBuf) -> Self;
    fn read_jobs(&self) -> Result<Vec<Job>, SimError>;
    /// Turns one already-parsed record into a [Job].
    fn gen_single(&self, d: T, id: JobId) -> Job;
}

//---START EXTERNAL INTERFACES

/// Reads the simulator's native trace format: one job per line,
/// `id;processing;release;due;cores`. Blank lines and lines starting
/// with `#` are skipped.
pub struct TraceParser {
    pub path: PathBuf,
}

impl JobGen<[TimeSteps; 4]> for TraceParser {
    fn new(path: PathBuf) -> Self {
        Self {
            path
        }
    }

    fn read_jobs(&self) -> Result<Vec<Job>, SimError> {
        read_records(&self.path, ';', false)?
            .into_iter()
            .map(|(id, fields)| Ok(self.gen_single(fields, id)))
            .collect()
    }

    fn gen_single(&self, d: [TimeSteps; 4], id: JobId) -> Job {
        Job::new(id, d[0], d[1], d[2], d[3] as usize)
    }
}

/// A comma-separated variant with a header line, handy for traces
/// exported from spreadsheets. Same column order as [TraceParser].
pub struct CSVParser {
    pub path: PathBuf,
}

impl JobGen<[TimeSteps; 4]> for CSVParser {
    fn new(path: PathBuf) -> Self {
        Self {
            path
        }
    }

    fn read_jobs(&self) -> Result<Vec<Job>, SimError> {
        read_records(&self.path, ',', true)?
            .into_iter()
            .map(|(id, fields)| Ok(self.gen_single(fields, id)))
            .collect()
    }

    fn gen_single(&self, d: [TimeSteps; 4], id: JobId) -> Job {
        Job::new(id, d[0], d[1], d[2], d[3] as usize)
    }
}

/// Splits every meaningful line of `path` on `delim` and parses the
/// five numeric columns. Line numbers in errors are 1-based.
fn read_records(
    path:           &PathBuf,
    delim:          char,
    has_header:     bool,
) -> Result<Vec<(JobId, [TimeSteps; 4])>, SimError> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut res = vec![];
    for (idx, line) in reader.lines()
        .enumerate()
        .skip(if has_header { 1 } else { 0 }) {
        let line = line?;
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = trimmed.split(delim)
            .map(str::trim)
            .collect();
        if cols.len() < 5 {
            return Err(SimError::Trace {
                line:   line_no,
                reason: format!("expected 5 fields, found {}", cols.len()),
            });
        }
        let id = cols[0].parse::<JobId>()
            .map_err(|e| SimError::Trace { line: line_no, reason: format!("id: {e}") })?;
        let mut fields: [TimeSteps; 4] = [0; 4];
        for (slot, raw) in fields.iter_mut().zip(&cols[1..5]) {
            *slot = raw.parse::<TimeSteps>()
                .map_err(|e| SimError::Trace { line: line_no, reason: format!("{raw:?}: {e}") })?;
        }
        if fields[3] < 0 {
            return Err(SimError::Trace { line: line_no, reason: String::from("negative core demand") });
        }
        res.push((id, fields));
    }

    Ok(res)
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum InpuType {
    /// `;`-separated records without header (`id;processing;release;due;cores`)
    Trace,
    /// Comma-separated records with one header line
    CSV,
}

pub fn read_from_path<T, B>(file_path: PathBuf) -> Result<JobSet, SimError>
where T: JobGen<B> {
    let parser = T::new(file_path);
    let jobs = parser.read_jobs()?;
    let set = crate::jobset::init(jobs)?;

    Ok(set)
}
//---END EXTERNAL INTERFACES

//---START SYNTHETIC TRACES
/// Generates random workloads whose due times follow from a slack factor:
/// `due = release + ceil(processing * (1 + slack))`, with `slack` drawn
/// from a log-normal distribution of mean `slack` and standard deviation
/// `sd`.
///
/// Identical settings (seed included) produce identical traces.
#[derive(Debug, Clone)]
pub struct SlackSynth {
    pub jobs:           usize,
    pub release_span:   TimeSteps,
    pub max_processing: TimeSteps,
    pub max_cores:      usize,
    pub slack:          f64,
    pub sd:             f64,
    pub seed:           u64,
}

impl Default for SlackSynth {
    fn default() -> Self {
        Self {
            jobs:           1000,
            release_span:   10_000,
            max_processing: 100,
            max_cores:      1,
            slack:          0.5,
            sd:             2.0,
            seed:           0,
        }
    }
}

// Log-normal tails are heavy; keeps due times far from overflow.
const MAX_WINDOW: f64 = (1_u64 << 52) as f64;

impl SlackSynth {
    pub fn generate(&self) -> Result<JobSet, SimError> {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        use rand_distr::{Distribution, LogNormal};

        if !(self.slack.is_finite() && self.slack > 0.0) {
            return Err(SimError::BadParam { name: "slack mean", value: self.slack });
        }
        if !(self.sd.is_finite() && self.sd >= 0.0) {
            return Err(SimError::BadParam { name: "slack sd", value: self.sd });
        }
        let slacks = LogNormal::from_mean_cv(self.slack, self.sd / self.slack)
            .map_err(|_| SimError::BadParam { name: "slack sd", value: self.sd })?;
        if self.max_processing < 1 {
            return Err(SimError::BadParam { name: "max processing", value: self.max_processing as f64 });
        }
        if self.max_cores < 1 {
            return Err(SimError::BadParam { name: "max cores", value: self.max_cores as f64 });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let jobs = (0..self.jobs)
            .map(|id| {
                let release = rng.gen_range(0..=self.release_span.max(0));
                let processing = rng.gen_range(1..=self.max_processing);
                let cores = rng.gen_range(1..=self.max_cores);
                let slack = slacks.sample(&mut rng);
                let window = (processing as f64 * (1.0 + slack)).min(MAX_WINDOW);
                let due = release + window.ceil() as TimeSteps;

                Job::new(id as JobId, processing, release, due, cores)
            })
            .collect();

        Ok(crate::jobset::init(jobs)?)
    }
}
//---END SYNTHETIC TRACES
