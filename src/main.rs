use anyhow::{Context, Result};
use clap::Parser;
use trial_analyzer::{aggregate, cli::Cli, report};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber; progress goes to stderr
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = args.to_config()?;

    let summary = aggregate::run(&config)
        .with_context(|| format!("Failed to analyze trials of {}", config.bench_name()))?;

    report::print_summary(&summary);
    report::append_jsonl(&args.output, &summary)
        .with_context(|| format!("Failed to write results to {}", args.output.display()))?;

    Ok(())
}
