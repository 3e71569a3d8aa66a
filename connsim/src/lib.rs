//! Scenario driver for the connection state tracker.
//!
//! A scenario is a JSON document listing the activity seen on one control connection:
//! locks, transfers, listings, site requests, scheduled commands and disconnects. The
//! driver plays it against a `ConnStateTracker` the way a connection driver would: it
//! checks the tracker's admission predicates before every call and advances the
//! virtual clock by one tick after every step.
//!
//! ```json
//! {
//!   "name": "aborted download",
//!   "steps": [
//!     { "op": "lock", "monitor": 1, "direction": "download" },
//!     { "op": "transfer", "path": "/inc", "file": "f.txt", "addr": "1.2.3.4", "tls": true },
//!     { "op": "abort" },
//!     { "op": "finish" }
//!   ]
//! }
//! ```

use anyhow::Context;
use connstate::{
    ConnPhase, ConnStateTracker, Direction, RecursiveMode, ScheduledCommand, SiteLogicRequest,
    SiteRace, StateSnapshot, TransferMonitorId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Lock {
        monitor: u64,
        direction: Direction,
    },
    /// Without `addr` the transfer is passive; with `addr` and no explicit `passive`
    /// it connects out to `addr`.
    Transfer {
        path: String,
        file: String,
        #[serde(default)]
        fxp: bool,
        passive: Option<bool>,
        addr: Option<String>,
        #[serde(default)]
        tls: bool,
    },
    List {
        monitor: u64,
        addr: Option<String>,
        #[serde(default)]
        tls: bool,
    },
    Initialize,
    Finish,
    Abort,
    Request(SiteLogicRequest),
    FinishRequest,
    Claim,
    ResetIdle,
    Schedule {
        command: String,
        delay: u64,
        payload: Option<u64>,
        #[serde(default)]
        persisting: bool,
    },
    Tick {
        units: u64,
    },
    Login,
    Disconnect,
    Check {
        race: String,
    },
    Recursive {
        mode: RecursiveMode,
        path: String,
    },
    RecursiveDone,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Lock { .. } => "lock",
            Step::Transfer { .. } => "transfer",
            Step::List { .. } => "list",
            Step::Initialize => "initialize",
            Step::Finish => "finish",
            Step::Abort => "abort",
            Step::Request(_) => "request",
            Step::FinishRequest => "finish_request",
            Step::Claim => "claim",
            Step::ResetIdle => "reset_idle",
            Step::Schedule { .. } => "schedule",
            Step::Tick { .. } => "tick",
            Step::Login => "login",
            Step::Disconnect => "disconnect",
            Step::Check { .. } => "check",
            Step::Recursive { .. } => "recursive",
            Step::RecursiveDone => "recursive_done",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("step {index} ({op}) refused: connection is {phase}")]
    Refused {
        index: usize,
        op: &'static str,
        phase: ConnPhase,
    },
}

/// A delayed command that fired during the run.
#[derive(Debug, Clone, Serialize)]
pub struct FiredCommand {
    pub at: u64,
    #[serde(flatten)]
    pub command: ScheduledCommand,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: String,
    pub steps_run: usize,
    pub skipped: usize,
    pub ticks: u64,
    pub fired: Vec<FiredCommand>,
    pub state: StateSnapshot,
}

impl Report {
    pub fn to_text(&self) -> String {
        let state = &self.state;
        let mut out = format!(
            "scenario: {}\nsteps run: {} (skipped: {})\nticks: {}\nclock: {} (idle {})\nstate: {}\n",
            self.name,
            self.steps_run,
            self.skipped,
            self.ticks,
            state.clock,
            state.idle_time,
            state.phase
        );
        if let Some(monitor) = state.monitor {
            out.push_str(&format!("monitor: {monitor}\n"));
        }
        out.push_str(&format!("aborted: {}\n", state.aborted));
        for fired in &self.fired {
            out.push_str(&format!("fired: {} at {}\n", fired.command.command, fired.at));
        }
        out
    }
}

pub fn load_scenario(path: &std::path::Path) -> anyhow::Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {path:?}"))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse scenario {path:?}"))
}

pub struct Driver {
    tracker: ConnStateTracker,
    races: std::collections::HashMap<String, std::sync::Arc<SiteRace>>,
    config: common::SimulationConfig,
    ticks: u64,
    fired: Vec<FiredCommand>,
}

impl Driver {
    pub fn new(config: common::SimulationConfig) -> Self {
        Self {
            tracker: ConnStateTracker::new(),
            races: std::collections::HashMap::new(),
            config,
            ticks: 0,
            fired: Vec::new(),
        }
    }
    pub fn tracker(&self) -> &ConnStateTracker {
        &self.tracker
    }
    /// Play every step of `scenario`, one tick after each.
    pub fn run(&mut self, scenario: &Scenario) -> Result<Report, StepError> {
        let mut steps_run = 0;
        let mut skipped = 0;
        for (index, step) in scenario.steps.iter().enumerate() {
            if self.config.limit_reached(self.ticks) {
                tracing::info!("tick limit {} reached, stopping", self.config.max_ticks);
                break;
            }
            match self.apply(index, step) {
                Ok(()) => steps_run += 1,
                Err(err) if self.config.keep_going => {
                    tracing::warn!("{}, skipping", err);
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
            self.tick(self.config.tick_interval);
            self.ticks += 1;
        }
        Ok(Report {
            name: scenario.name.clone(),
            steps_run,
            skipped,
            ticks: self.ticks,
            fired: self.fired.clone(),
            state: self.tracker.snapshot(),
        })
    }
    fn refuse(&self, index: usize, step: &Step) -> StepError {
        StepError::Refused {
            index,
            op: step.name(),
            phase: self.tracker.phase(),
        }
    }
    fn tick(&mut self, units: u64) {
        self.tracker.advance(units);
        if let Some(command) = self.tracker.scheduler_mut().take_released() {
            let at = self.tracker.clock();
            tracing::info!("fired {:?} at {}", command.command, at);
            self.fired.push(FiredCommand { at, command });
        }
    }
    fn apply(&mut self, index: usize, step: &Step) -> Result<(), StepError> {
        tracing::debug!("step {}: {:?}", index, step);
        let tracker = &mut self.tracker;
        match step {
            Step::Lock { monitor, direction } => {
                if !tracker.can_lock_for_transfer() {
                    return Err(self.refuse(index, step));
                }
                tracker.lock_for_transfer(TransferMonitorId(*monitor), *direction);
            }
            Step::Transfer {
                path,
                file,
                fxp,
                passive,
                addr,
                tls,
            } => {
                if !tracker.can_begin_file_transfer() {
                    return Err(self.refuse(index, step));
                }
                match (passive, addr) {
                    (Some(passive), addr) => tracker.begin_file_transfer(
                        path.as_str(),
                        file.as_str(),
                        *fxp,
                        *passive,
                        addr.as_deref().unwrap_or_default(),
                        *tls,
                    ),
                    (None, Some(addr)) => tracker.begin_file_transfer(
                        path.as_str(),
                        file.as_str(),
                        *fxp,
                        false,
                        addr.as_str(),
                        *tls,
                    ),
                    (None, None) => {
                        tracker.begin_passive_transfer(path.as_str(), file.as_str(), *fxp, *tls)
                    }
                }
            }
            Step::List { monitor, addr, tls } => {
                if !tracker.can_begin_list_transfer() {
                    return Err(self.refuse(index, step));
                }
                let monitor = TransferMonitorId(*monitor);
                match addr {
                    Some(addr) => tracker.begin_active_list(monitor, addr.as_str(), *tls),
                    None => tracker.begin_passive_list(monitor, *tls),
                }
            }
            Step::Initialize => tracker.initialize_transfer(),
            Step::Finish => tracker.finish_transfer(),
            Step::Abort => tracker.abort_transfer(),
            Step::Request(request) => {
                if !tracker.can_set_request() {
                    return Err(self.refuse(index, step));
                }
                tracker.set_request(request.clone());
            }
            Step::FinishRequest => tracker.finish_request(),
            Step::Claim => {
                if !tracker.can_claim() {
                    return Err(self.refuse(index, step));
                }
                tracker.claim();
            }
            Step::ResetIdle => tracker.reset_idle(),
            Step::Schedule {
                command,
                delay,
                payload,
                persisting,
            } => tracker.schedule_command(command.as_str(), *delay, *payload, *persisting),
            Step::Tick { units } => self.tick(*units),
            Step::Login => tracker.set_logged_in(),
            Step::Disconnect => {
                if !tracker.can_disconnect() {
                    return Err(self.refuse(index, step));
                }
                tracker.mark_disconnected();
            }
            Step::Check { race } => {
                let target = self.races.entry(race.clone()).or_insert_with(|| {
                    std::sync::Arc::new(SiteRace::new("scenario", race.as_str()))
                });
                tracker.check(target);
                if tracker.check_count() > 1 {
                    tracing::debug!("{} checked {} times in a row", race, tracker.check_count());
                }
            }
            Step::Recursive { mode, path } => {
                tracker.recursive_logic_mut().initialize(*mode, path.as_str())
            }
            Step::RecursiveDone => tracker.recursive_logic_mut().finish(),
        }
        Ok(())
    }
}
