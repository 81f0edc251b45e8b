//! Deadline-threshold admission.
//!
//! Every core ranked `i` (0 = most loaded) contributes a threshold
//! `release + (available - release) * f[i + 1]`; a job whose due time
//! falls below the largest of them is turned down before anything else
//! is checked. Survivors go through ordinary best-fit.
//!
//! The factors `f` depend only on the machine count and the target
//! competitive parameter ε, and are computed once per run by bisection.
use crate::helpe::*;
use crate::engine::Rejection;

/// Upper bound on bisection steps per bracket. Doubles run out of
/// precision long before this.
pub const MAX_BISECTIONS: usize = 200;

/// Decimal digits up to which the calibrated ε must match its target.
const EPS_DIGITS: i32 = 13;

/// One (lower, upper) f-value bracket per rank block, bootstrapped from
/// a single step of the recurrence at f = 2. The last block is fixed
/// to (2, 5).
pub fn f_value_limits(machines: usize) -> Vec<(f64, f64)> {
    let m = machines as f64;
    let mut res = Vec::with_capacity(machines);
    for row in 0..machines.saturating_sub(1) {
        let k = (machines - (row + 1)) as f64;
        let left = (2.0 * m + 1.0) / k;
        let upper = (left * (k + 1.0) - 1.0) / m;
        res.push((2.0, upper));
    }
    if machines > 0 {
        res.push((2.0, 5.0));
    }

    res
}

/// Unrolls the f-value recurrence for block `k`, starting from `f[k] = f`.
///
/// Entries below `k` stay at zero, except entry 0, which receives the
/// resulting ε = 1 / (f[machines] - 1).
pub fn eps_curve(machines: usize, k: usize, f: f64) -> Vec<f64> {
    debug_assert!(k >= 1 && k <= machines);
    let m = machines as f64;
    let mut v = vec![0.0; machines + 1];
    v[k] = f;
    let left = (m * f + 1.0) / k as f64;
    // Running k + Σ_{h=k}^{q-1} (f[h] - 1)
    let mut denominator = k as f64;
    for q in k + 1..=machines {
        denominator += v[q - 1] - 1.0;
        v[q] = (left * denominator - 1.0) / m;
    }
    v[0] = 1.0 / (v[machines] - 1.0);

    v
}

#[inline(always)]
fn same_digits(a: f64, b: f64) -> bool {
    let scale = 10_f64.powi(EPS_DIGITS);

    (a * scale).round() == (b * scale).round()
}

/// Calibrates the threshold factors so that the resulting competitive
/// parameter equals `epsilon` up to 13 decimal digits.
///
/// Blocks are tried in rank order; the first whose bracket contains
/// `epsilon` is bisected. Entry 0 of the result holds the achieved ε,
/// entries 1..=machines the per-rank factors.
pub fn f_values_epsilon(machines: usize, epsilon: f64) -> Result<Vec<f64>, SimError> {
    if machines == 0 { return Err(SimError::NoMachines); }

    for (i, &(lo, hi)) in f_value_limits(machines).iter().enumerate() {
        let k = machines - i;
        let (mut f_lo, mut f_hi) = (lo, hi);
        // ε decreases as f grows.
        let (eps_of_hi, eps_of_lo) = (eps_curve(machines, k, f_hi)[0], eps_curve(machines, k, f_lo)[0]);
        if !(eps_of_hi <= epsilon && epsilon <= eps_of_lo) { continue; }

        for _ in 0..MAX_BISECTIONS {
            let f_mid = (f_lo + f_hi) / 2.0;
            let lower_eps = eps_curve(machines, k, f_hi)[0];
            let upper_eps = eps_curve(machines, k, f_lo)[0];
            let mid = eps_curve(machines, k, f_mid);
            let mid_eps = mid[0];

            if mid_eps >= epsilon && epsilon >= lower_eps {
                f_lo = f_mid;
            } else if mid_eps <= epsilon && epsilon <= upper_eps {
                f_hi = f_mid;
            }
            if same_digits(mid_eps, epsilon) {
                debug!(machines, block = k, f = f_mid, "threshold calibrated");
                return Ok(mid);
            }
        }

        return Err(SimError::CalibrationNonConvergence {
            epsilon,
            machines,
            iterations: MAX_BISECTIONS,
        });
    }

    Err(SimError::CalibrationOutOfRange {
        epsilon,
        machines,
    })
}

/// The largest per-core threshold over the currently ranked cores.
pub fn deadline_threshold(engine: &Engine, f_values: &[f64], job: &Job) -> f64 {
    engine.cores()
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let load = (c.available() - job.release) as f64;
            job.release as f64 + load * f_values[idx + 1]
        })
        .fold(f64::NEG_INFINITY, f64::max)
}

pub fn run(engine: &mut Engine, f_values: &[f64]) {
    debug_assert_eq!(f_values.len(), engine.machine_count() + 1);
    while let Some(job) = engine.pop_job() {
        engine.sort_cores();
        if !engine.is_legal(&job) {
            engine.reject(job, Rejection::InfeasibleDemand);
            continue;
        }
        let threshold = deadline_threshold(engine, f_values, &job);
        if (job.due as f64) < threshold {
            trace!(job = job.id, threshold, "below deadline threshold");
            engine.reject(job, Rejection::Threshold);
            continue;
        }
        let Some(job) = engine.admit(job) else { continue; };
        let s = engine.search_most_loaded_feasible_core(&job);
        engine.allocate(job, s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_machine_closed_form() {
        let f = f_values_epsilon(1, 0.5).unwrap();
        assert_eq!(f.len(), 2);
        assert!((f[1] - 3.0).abs() < 1e-9);
        assert!((f[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn two_machines_hit_the_second_block() {
        let f = f_values_epsilon(2, 0.1).unwrap();
        // 2f² + f - 23 = 0
        let expected = (-1.0 + 185_f64.sqrt()) / 4.0;
        assert!((f[1] - expected).abs() < 1e-9);
        assert!((f[2] - 11.0).abs() < 1e-9);
    }

    #[test]
    fn limits_bootstrap_from_two() {
        let l = f_value_limits(2);
        assert_eq!(l, vec![(2.0, 4.5), (2.0, 5.0)]);
    }

    #[test]
    fn unreachable_epsilon_is_an_error() {
        assert!(matches!(
            f_values_epsilon(2, 5.0),
            Err(SimError::CalibrationOutOfRange { machines: 2, .. })
        ));
    }

    #[test]
    fn calibration_matches_target_for_larger_machines() {
        for m in [3, 4, 8] {
            let f = f_values_epsilon(m, 0.2).unwrap();
            assert!((f[0] - 0.2).abs() < 1e-12);
            assert!((1.0 / (f[m] - 1.0) - 0.2).abs() < 1e-12);
        }
    }
}
