use oncore::{*, algo::{Goal, Policy, simulate, sweep, best_optimal, min_machines}};

fn workload(seed: u64, max_cores: usize) -> JobSet {
    SlackSynth {
        jobs:           300,
        release_span:   2_000,
        max_processing: 60,
        max_cores,
        slack:          1.5,
        sd:             1.0,
        seed,
    }.generate().unwrap()
}

#[test]
fn synthetic_traces_are_reproducible() {
    let a = workload(7, 3);
    let b = workload(7, 3);
    let fields = |s: &JobSet| s.iter()
        .map(|j| (j.id, j.processing, j.release, j.due, j.cores))
        .collect::<Vec<_>>();
    assert_eq!(fields(&a), fields(&b));
    assert!(a.iter().all(|j| j.due >= j.release + j.processing));
}

#[test]
fn synthetic_slack_follows_its_mean() {
    let set = SlackSynth {
        jobs:           20_000,
        max_processing: 1_000,
        slack:          0.4,
        sd:             0.2,
        ..Default::default()
    }.generate().unwrap();
    let slacks = set.iter()
        .map(|j| (j.due - j.release) as f64 / j.processing as f64 - 1.0)
        .collect::<Vec<_>>();
    let mean = slacks.iter().sum::<f64>() / slacks.len() as f64;
    assert!((mean - 0.4).abs() < 0.02, "mean slack {mean}");
    assert!(slacks.iter().all(|&s| s > 0.0));

    let flat = SlackSynth { slack: 0.5, sd: 0.0, max_processing: 10, ..Default::default() }
        .generate()
        .unwrap();
    assert!(flat.iter().all(|j| {
        let window = (j.due - j.release) as f64;
        let exact = j.processing as f64 * 1.5;
        window > exact - 1e-6 && window < exact + 1.0 + 1e-6
    }));

    let bad = SlackSynth { slack: 0.0, ..Default::default() }.generate().unwrap_err();
    assert!(matches!(bad, SimError::BadParam { name: "slack mean", .. }));
}

#[test]
fn every_policy_keeps_the_books() {
    let params = Params { epsilon: 0.5, alpha: 1.0 };
    for seed in 0..3 {
        let jobs = workload(seed, 3);
        let submitted = jobs.len();
        for policy in Policy::ALL {
            for machines in [1, 4, 7] {
                let run = simulate(jobs.clone(), machines, policy, &params).unwrap();
                let e = &run.engine;
                let o = run.outcome;
                let ctx = format!("{policy} on {machines} machines, seed {seed}");

                // Partition.
                assert_eq!(o.accepted + o.rejected, submitted, "{ctx}");
                assert!(e.accepted().all(|j| e.rejected().all(|r| r.id != j.id)), "{ctx}");
                // Load accounting.
                assert_eq!(o.accepted_load, total_load(&e.accepted().cloned().collect::<Vec<_>>()), "{ctx}");
                assert_eq!(o.rejected_load, total_load(&e.rejected().cloned().collect::<Vec<_>>()), "{ctx}");
                assert_eq!(
                    o.optimal_load,
                    (machines as TimeSteps * e.makespan()).min(o.accepted_load + o.rejected_load),
                    "{ctx}"
                );
                // Non-overlap and coverage.
                assert!(e.schedule_is_valid(), "{ctx}");
                // Rejected jobs carry no times.
                assert!(e.rejected().all(|j| j.start.is_none()), "{ctx}");
                if !matches!(policy, Policy::Region | Policy::Slack) {
                    assert!(e.placements_meet_windows(), "{ctx}");
                    assert!(e.accepted().all(Job::meets_window), "{ctx}");
                }
            }
        }
    }
}

#[test]
fn backfill_pool_stays_consistent() {
    let params = Params::default();
    let jobs = workload(11, 2);
    for policy in [Policy::BackfillBalanced, Policy::BackfillBestFit] {
        let run = simulate(jobs.clone(), 3, policy, &params).unwrap();
        assert!(run.engine.schedule_is_valid());
        assert!(run.engine.open_pool().all(|v| v.vacant_size() > 0));
    }
}

#[test]
fn sweep_rows_follow_the_grid() {
    let jobs = workload(3, 2);
    let policies = [Policy::GreedyBalanced, Policy::Threshold, Policy::Slack];
    let rows = sweep(&jobs, &[2, 3, 5], &policies, &Params::default()).unwrap();

    let grid: Vec<_> = rows.iter().map(|r| (r.machines, r.policy)).collect();
    let expected: Vec<_> = [2_usize, 3, 5].into_iter()
        .cartesian_product(policies)
        .collect();
    assert_eq!(grid, expected);

    // Same outcome as running alone.
    let alone = simulate(jobs.clone(), 3, Policy::Threshold, &Params::default()).unwrap();
    assert_eq!(rows[4].outcome, alone.outcome);

    let best = best_optimal(&rows);
    assert_eq!(best.keys().copied().collect::<Vec<_>>(), vec![2, 3, 5]);
    for r in &rows {
        assert!(best[&r.machines] >= r.outcome.optimal_load);
    }
}

#[test]
fn enough_machines_accept_everything() {
    let jobs = workload(5, 2);
    let params = Params::default();
    let m = min_machines(&jobs, Policy::GreedyBalanced, Goal::AcceptAll, &params, 1..=jobs.len() * 2)
        .unwrap()
        .unwrap();
    let run = simulate(jobs.clone(), m, Policy::GreedyBalanced, &params).unwrap();
    assert_eq!(run.outcome.rejected, 0);
    assert_eq!(min_machines(&jobs, Policy::GreedyBalanced, Goal::AcceptAll, &params, 1..=1).unwrap(), None);
}

#[test]
fn covering_the_load_needs_capacity_only() {
    // 3 single-core jobs of 10 each, all due at 10.
    let jobs = (1..=3).map(|id| Job::new(id, 10, 0, 10, 1)).collect::<Vec<_>>();
    let params = Params::default();
    let search = |goal| min_machines(&jobs, Policy::GreedyBestFit, goal, &params, 1..=8).unwrap();
    assert_eq!(search(Goal::AcceptAll), Some(3));
    assert_eq!(search(Goal::CoverLoad), Some(3));

    // A late job stretches the makespan, so fewer machines cover the load
    // even though some work is turned away.
    let mut jobs = jobs;
    jobs.push(Job::new(4, 10, 100, 110, 1));
    let search = |goal| min_machines(&jobs, Policy::GreedyBestFit, goal, &params, 1..=8).unwrap();
    assert_eq!(search(Goal::AcceptAll), Some(3));
    assert_eq!(search(Goal::CoverLoad), Some(1));
    assert_eq!(min_machines(&jobs, Policy::Slack, Goal::CoverLoad, &params, 1..=8).unwrap(), None);
}
