//! Shared setup for the FXP tools: configuration types and tracing initialization.

pub mod config;

pub use config::{OutputConfig, OutputFormat, SimulationConfig};

/// Map `-v` occurrences to a log level; `quiet` wins over any verbosity.
pub fn verbosity_filter(quiet: bool, verbose: u8) -> tracing::level_filters::LevelFilter {
    use tracing::level_filters::LevelFilter;
    if quiet {
        return LevelFilter::OFF;
    }
    match verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the verbosity flags.
pub fn init_tracing(output: &OutputConfig) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let default_level = verbosity_filter(output.quiet, output.verbose);
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))?;
    tracing::debug!("tracing initialized at {}", default_level);
    Ok(())
}
