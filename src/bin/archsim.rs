use archsim::cli::{self, FormatArg};
use archsim::config;
use archsim::engine;
use archsim::error::Result;
use archsim::output::{Formatter, HumanFormatter, JsonFormatter, SummaryFormatter};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args()?;
    let mut spec = config::load_graph(&args.config)?;
    if let Some(duration) = args.duration {
        spec.duration_secs = Some(duration);
    }
    if let Some(seed) = args.seed {
        spec.seed = Some(seed);
    }

    let report = engine::run_simulation(&spec)?;
    let formatter = formatter_for(args.format);
    let output = formatter.write(&report);
    print!("{}", output);

    Ok(())
}

fn formatter_for(format: FormatArg) -> Box<dyn Formatter> {
    match format {
        FormatArg::Human => Box::new(HumanFormatter),
        FormatArg::Summary => Box::new(SummaryFormatter),
        FormatArg::Json => Box::new(JsonFormatter),
    }
}
