//! Configuration types for output, logging and scenario execution

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress all log output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print the final connection state at the end
    pub print_summary: bool,
    /// Format used for the final state report
    pub format: OutputFormat,
}

/// How the final connection state is reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

/// Virtual-clock settings for driving a connection through a scenario
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    /// Virtual time units the clock advances after every step
    pub tick_interval: u64,
    /// Stop after this many ticks (0 = run every step)
    pub max_ticks: u64,
    /// Skip steps the connection cannot accept instead of failing
    pub keep_going: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_ticks: 0,
            keep_going: false,
        }
    }
}

/// Default virtual time units per tick
pub const DEFAULT_TICK_INTERVAL: u64 = 50;

impl SimulationConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval == 0 {
            return Err("tick_interval must be greater than 0".to_string());
        }
        Ok(())
    }
    /// True once `ticks` ticks have been run and a tick limit is configured.
    pub fn limit_reached(&self, ticks: u64) -> bool {
        self.max_ticks > 0 && ticks >= self.max_ticks
    }
}
