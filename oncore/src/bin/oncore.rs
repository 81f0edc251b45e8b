use oncore::{*, algo::{Policy, simulate, sweep, best_optimal}};

/// Online admission and placement of deadline-constrained jobs
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to input. A synthetic trace is generated if absent.
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:          Option<PathBuf>,

    /// Input format
    #[arg(short, long, value_enum, default_value_t = InpuType::Trace)]
    format:         InpuType,

    /// Number of identical cores
    #[arg(short, long, default_value_t = 4)]
    #[arg(value_parser = clap::value_parser!(usize))]
    machines:       usize,

    /// Sweep machine counts from --machines up to this one
    #[arg(long)]
    max_machines:   Option<usize>,

    /// Machine count increment while sweeping
    #[arg(long, default_value_t = 1)]
    step:           usize,

    /// Policies to run (all of them if none given)
    #[arg(short, long, value_enum)]
    policy:         Vec<Policy>,

    /// Competitive parameter ε
    #[arg(short, long, default_value_t = Params::default().epsilon)]
    epsilon:        f64,

    /// Stretch of preemptively inserted jobs
    #[arg(short, long, default_value_t = Params::default().alpha)]
    alpha:          f64,

    /// Number of synthetic jobs
    #[arg(long, default_value_t = 1000)]
    synth_jobs:     usize,

    /// Largest core demand of synthetic jobs
    #[arg(long, default_value_t = 1)]
    synth_cores:    usize,

    /// Mean slack factor of synthetic jobs
    #[arg(long, default_value_t = SlackSynth::default().slack)]
    slack:          f64,

    /// Standard deviation of the synthetic slack factor
    #[arg(long, default_value_t = SlackSynth::default().sd)]
    sd:             f64,

    /// Seed for the synthetic trace
    #[arg(long, default_value_t = 0)]
    seed:           u64,

    /// Print the realized schedule of every core (single machine count only)
    #[arg(short, long, default_value_t = false)]
    schedule:       bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Args::parse();
    let params = Params {
        epsilon:    cli.epsilon,
        alpha:      cli.alpha,
    };
    params.validate()?;
    anyhow::ensure!(cli.step > 0, "Machine step must be positive");

    let set = match cli.input {
        Some(path) => {
            anyhow::ensure!(path.is_file(), "Invalid input path: {}", path.display());
            match cli.format {
                InpuType::Trace => read_from_path::<TraceParser, [TimeSteps; 4]>(path)?,
                InpuType::CSV   => read_from_path::<CSVParser, [TimeSteps; 4]>(path)?,
            }
        },
        None => {
            SlackSynth {
                jobs:       cli.synth_jobs,
                max_cores:  cli.synth_cores,
                slack:      cli.slack,
                sd:         cli.sd,
                seed:       cli.seed,
                ..Default::default()
            }.generate()?
        },
    };
    info!(jobs = set.len(), load = total_load(&set), "job set ready");

    let policies = if cli.policy.is_empty() {
        Policy::ALL.to_vec()
    } else { cli.policy.clone() };

    let total_start = Instant::now();
    match cli.max_machines {
        None => {
            println!("MACHINES; POLICY; ACC JOBS; REJ JOBS; ACC LOAD; REJ LOAD; OPT LOAD; RUN TIME");
            for policy in policies {
                let run = simulate(set.clone(), cli.machines, policy, &params)?;
                let o = run.outcome;
                println!("{}; {}; {}; {}; {}; {}; {}; {}",
                    cli.machines, policy, o.accepted, o.rejected,
                    o.accepted_load, o.rejected_load, o.optimal_load,
                    run.elapsed.as_micros());
                if cli.schedule {
                    for core in run.engine.cores() {
                        println!("\t{}", core.render());
                    }
                }
            }
        },
        Some(top) => {
            anyhow::ensure!(top >= cli.machines, "--max-machines is below --machines");
            let counts = (cli.machines..=top).step_by(cli.step).collect::<Vec<_>>();
            let rows = sweep(&set, &counts, &policies, &params)?;
            let best = best_optimal(&rows);
            println!("MACHINES; POLICY; ACC JOBS; REJ JOBS; ACC LOAD; REJ LOAD; OPT LOAD; RUN TIME");
            for r in &rows {
                let o = r.outcome;
                println!("{}; {}; {}; {}; {}; {}; {}; {}",
                    r.machines, r.policy, o.accepted, o.rejected,
                    o.accepted_load, o.rejected_load,
                    best.get(&r.machines).copied().unwrap_or(o.optimal_load),
                    r.elapsed.as_micros());
            }
        },
    }
    println!("Total simulation time: {} μs", total_start.elapsed().as_micros());

    Ok(())
}
