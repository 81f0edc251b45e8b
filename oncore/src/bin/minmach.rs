use oncore::{*, algo::{Goal, Policy, min_machines}};

/// Smallest number of cores on which a policy meets a goal
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to input
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:      PathBuf,

    /// Input format
    #[arg(short, long, value_enum, default_value_t = InpuType::Trace)]
    format:     InpuType,

    /// Policy to size the machine for
    #[arg(short, long, value_enum, default_value_t = Policy::GreedyBestFit)]
    policy:     Policy,

    /// What the machine count must achieve
    #[arg(short, long, value_enum, default_value_t = Goal::AcceptAll)]
    goal:       Goal,

    /// Smallest machine count considered
    #[arg(long, default_value_t = 1)]
    min:        usize,

    /// Largest machine count considered
    #[arg(long, default_value_t = 1024)]
    max:        usize,

    /// Competitive parameter ε
    #[arg(short, long, default_value_t = Params::default().epsilon)]
    epsilon:    f64,

    /// Stretch of preemptively inserted jobs
    #[arg(short, long, default_value_t = Params::default().alpha)]
    alpha:      f64,
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
    anyhow::ensure!(cli.input.is_file(), "Invalid input path: {}", cli.input.display());
    let params = Params {
        epsilon:    cli.epsilon,
        alpha:      cli.alpha,
    };
    let set = match cli.format {
        InpuType::Trace => read_from_path::<TraceParser, [TimeSteps; 4]>(cli.input)?,
        InpuType::CSV   => read_from_path::<CSVParser, [TimeSteps; 4]>(cli.input)?,
    };

    let total_start = Instant::now();
    match min_machines(&set, cli.policy, cli.goal, &params, cli.min..=cli.max)? {
        Some(m) => println!("{}: {} machines", cli.policy, m),
        None    => println!("{}: misses {:?} even with {} machines", cli.policy, cli.goal, cli.max),
    }
    println!("Total simulation time: {} μs", total_start.elapsed().as_micros());

    Ok(())
}
