//! Control-connection state tracking for FXP race orchestration
//!
//! Every control connection to a site is shared by several logical roles: the transfer
//! engine, the directory listing engine and the site request pipeline. None of them
//! may issue a command while another role owns the connection. This crate provides
//! the per-connection bookkeeping that arbitrates between them.
//!
//! # Overview
//!
//! - `ConnStateTracker` records which role owns the connection, how long it has been
//!   idle on a virtual clock, and how many times in a row the same race target was
//!   checked.
//! - `DelayedCommand` (behind the `CommandScheduler` trait) holds the single command
//!   scheduled to fire later on that connection.
//! - `SiteLogicRequest`, `SiteRace`, `TransferMonitorId` and `RecursiveCommandLogic`
//!   are the boundary types of the collaborators the tracker talks to.
//!
//! The tracker performs no I/O and is not synchronized: it belongs to the single task
//! driving its connection.
//!
//! # Example
//!
//! ```
//! use connstate::{ConnPhase, ConnStateTracker, Direction, TransferMonitorId};
//!
//! let mut tracker = ConnStateTracker::new();
//! assert!(tracker.can_lock_for_transfer());
//! tracker.lock_for_transfer(TransferMonitorId(1), Direction::Download);
//! tracker.begin_passive_transfer("/incoming", "file.rar", false, true);
//! tracker.initialize_transfer();
//! tracker.advance(5);
//! tracker.finish_transfer();
//! assert_eq!(tracker.phase(), ConnPhase::Idle);
//! assert_eq!(tracker.idle_time(), 5);
//! ```

pub mod delayed;
pub mod monitor;
pub mod race;
pub mod recursive;
pub mod request;
pub mod state;
pub mod tracker;

pub use delayed::{CommandScheduler, DelayedCommand, ScheduledCommand};
pub use monitor::TransferMonitorId;
pub use race::SiteRace;
pub use recursive::{RecursiveCommandLogic, RecursiveMode};
pub use request::{RequestKind, SiteLogicRequest};
pub use state::{ConnPhase, Direction, StateSnapshot, TransferKind};
pub use tracker::ConnStateTracker;
