use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "connsim",
    version,
    about = "Replay scripted control-connection activity against the connection state tracker",
    long_about = "`connsim` drives a single connection state tracker through a JSON scenario.

Before every step the tracker's admission predicates are consulted, exactly like a
connection driver would, and the virtual clock advances by one tick after each step.
Delayed commands that become due are reported as fired.

EXAMPLES:
    # Run a scenario and print the final state as JSON
    connsim scenario.json --summary

    # Human readable report, 100 time units per tick, skip refused steps
    connsim scenario.json --summary --format text --tick-interval 100 --keep-going

    # Debug logging of every state transition
    connsim scenario.json -vv"
)]
struct Args {
    /// Scenario file (JSON)
    #[arg(value_name = "SCENARIO")]
    scenario: std::path::PathBuf,

    // Simulation
    /// Virtual time units the clock advances after every step
    #[arg(
        long,
        default_value_t = common::config::DEFAULT_TICK_INTERVAL,
        value_name = "UNITS",
        help_heading = "Simulation"
    )]
    tick_interval: u64,

    /// Stop after N ticks (0 = run every step)
    #[arg(long, default_value = "0", value_name = "N", help_heading = "Simulation")]
    max_ticks: u64,

    /// Skip steps the connection cannot accept instead of failing
    #[arg(short = 'k', long, help_heading = "Simulation")]
    keep_going: bool,

    // Output
    /// Print the final connection state
    #[arg(long, help_heading = "Output")]
    summary: bool,

    /// Format of the final state report
    #[arg(
        long,
        default_value_t = common::OutputFormat::Json,
        value_name = "FORMAT",
        help_heading = "Output"
    )]
    format: common::OutputFormat,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output")]
    verbose: u8,

    /// Quiet mode, don't log anything
    #[arg(short = 'q', long = "quiet", help_heading = "Output")]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
        format: args.format,
    };
    let simulation = common::SimulationConfig {
        tick_interval: args.tick_interval,
        max_ticks: args.max_ticks,
        keep_going: args.keep_going,
    };
    simulation.validate().map_err(anyhow::Error::msg)?;
    common::init_tracing(&output)?;
    let scenario = connsim::load_scenario(&args.scenario)?;
    tracing::info!(
        "running scenario {:?} ({} steps)",
        scenario.name,
        scenario.steps.len()
    );
    let mut driver = connsim::Driver::new(simulation);
    let report = driver
        .run(&scenario)
        .with_context(|| format!("scenario {:?} failed", args.scenario))?;
    if output.print_summary {
        match output.format {
            common::OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            common::OutputFormat::Text => print!("{}", report.to_text()),
        }
    }
    Ok(())
}
