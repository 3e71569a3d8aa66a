//! Single-slot delayed command keyed to a connection's virtual clock.
//!
//! A connection schedules at most one command at a time ("send CWD again in 500
//! time units", "retry the login later"). Scheduling a new command replaces the
//! previous one. The slot never looks at wall-clock time: the owning tracker forwards
//! its own clock through `advance_to` and the slot decides whether the fire time has
//! been reached.
//!
//! Two ways of cancelling exist:
//!
//! - `cancel_all` drops whatever is scheduled.
//! - `cancel_transient` drops the command unless it was scheduled as *persisting*;
//!   persisting commands survive a disconnect so the reconnect logic still sees them.

use serde::{Deserialize, Serialize};

/// The scheduler contract a `ConnStateTracker` delegates to.
pub trait CommandScheduler {
    /// Schedule `command` to fire once the clock reaches `fire_time`, replacing any
    /// previously scheduled command.
    fn set(&mut self, command: String, fire_time: u64, payload: Option<u64>, persisting: bool);
    /// True while a command is scheduled (released or not).
    fn is_active(&self) -> bool;
    /// Inform the scheduler of the current virtual time.
    fn advance_to(&mut self, time: u64);
    /// Unconditionally cancel the scheduled command.
    fn cancel_all(&mut self);
    /// Cancel the scheduled command unless it was scheduled as persisting.
    fn cancel_transient(&mut self);
}

/// A command that has been scheduled on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCommand {
    pub command: String,
    pub fire_time: u64,
    pub payload: Option<u64>,
    pub persisting: bool,
}

#[derive(Debug, Default)]
pub struct DelayedCommand {
    scheduled: Option<ScheduledCommand>,
    released: bool,
}

impl DelayedCommand {
    pub fn new() -> Self {
        Self::default()
    }
    /// True once the clock passed the fire time of the scheduled command.
    pub fn is_released(&self) -> bool {
        self.released
    }
    pub fn scheduled(&self) -> Option<&ScheduledCommand> {
        self.scheduled.as_ref()
    }
    /// Take the command if it has been released, emptying the slot.
    pub fn take_released(&mut self) -> Option<ScheduledCommand> {
        if !self.released {
            return None;
        }
        self.released = false;
        self.scheduled.take()
    }
}

impl CommandScheduler for DelayedCommand {
    fn set(&mut self, command: String, fire_time: u64, payload: Option<u64>, persisting: bool) {
        if let Some(previous) = &self.scheduled {
            tracing::trace!(
                "delayed command {:?} replaced by {:?}",
                previous.command,
                command
            );
        }
        self.scheduled = Some(ScheduledCommand {
            command,
            fire_time,
            payload,
            persisting,
        });
        self.released = false;
    }
    fn is_active(&self) -> bool {
        self.scheduled.is_some()
    }
    fn advance_to(&mut self, time: u64) {
        if self.released {
            return;
        }
        let Some(scheduled) = &self.scheduled else {
            return;
        };
        if time < scheduled.fire_time {
            return;
        }
        tracing::info!(
            "delayed command {:?} released at {} (due {})",
            scheduled.command,
            time,
            scheduled.fire_time
        );
        self.released = true;
    }
    fn cancel_all(&mut self) {
        if let Some(scheduled) = self.scheduled.take() {
            tracing::trace!("delayed command {:?} cancelled", scheduled.command);
        }
        self.released = false;
    }
    fn cancel_transient(&mut self) {
        match &self.scheduled {
            Some(scheduled) if scheduled.persisting => {
                tracing::trace!("persisting delayed command {:?} kept", scheduled.command);
            }
            _ => self.cancel_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn empty_slot_is_inactive() {
        let mut slot = DelayedCommand::new();
        assert!(!slot.is_active());
        slot.advance_to(1_000);
        assert!(!slot.is_released());
        assert_eq!(slot.take_released(), None);
    }
    #[test]
    fn releases_at_fire_time() {
        let mut slot = DelayedCommand::new();
        slot.set("CWD /inc".to_string(), 100, Some(7), false);
        assert!(slot.is_active());
        slot.advance_to(99);
        assert!(!slot.is_released());
        slot.advance_to(100);
        assert!(slot.is_released());
        let taken = slot.take_released().unwrap();
        assert_eq!(taken.command, "CWD /inc");
        assert_eq!(taken.payload, Some(7));
        assert!(!slot.is_active());
        assert!(!slot.is_released());
    }
    #[test]
    fn take_before_release_keeps_command() {
        let mut slot = DelayedCommand::new();
        slot.set("LIST".to_string(), 50, None, false);
        assert_eq!(slot.take_released(), None);
        assert!(slot.is_active());
    }
    #[test]
    fn set_replaces_released_command() {
        let mut slot = DelayedCommand::new();
        slot.set("first".to_string(), 10, None, false);
        slot.advance_to(20);
        assert!(slot.is_released());
        slot.set("second".to_string(), 40, None, false);
        assert!(!slot.is_released());
        assert_eq!(slot.scheduled().unwrap().command, "second");
    }
    #[test]
    fn cancel_all_drops_persisting() {
        let mut slot = DelayedCommand::new();
        slot.set("reconnect".to_string(), 10, None, true);
        slot.cancel_all();
        assert!(!slot.is_active());
    }
    #[test]
    fn cancel_transient_keeps_persisting_only() {
        let mut slot = DelayedCommand::new();
        slot.set("reconnect".to_string(), 10, None, true);
        slot.cancel_transient();
        assert!(slot.is_active());
        slot.set("retry".to_string(), 10, None, false);
        slot.cancel_transient();
        assert!(!slot.is_active());
    }
}
