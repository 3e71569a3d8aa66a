//! Per-connection control-state tracker.
//!
//! # Overview
//!
//! One `ConnStateTracker` exists per control connection. The connection driver
//! consults it before issuing any command and updates it whenever a transfer, listing
//! or site request starts, finishes or aborts. It answers three questions:
//!
//! - who currently owns the connection (a file transfer lock, a listing, a pending
//!   site request, or nobody)
//! - how long the connection has been idle, measured on a virtual clock advanced by
//!   the driver's tick
//! - which delayed command, if any, should fire next
//!
//! # Ownership rules
//!
//! - A pending request and a transfer lock are mutually exclusive.
//! - A file transfer runs only on a locked connection.
//! - A listing may start only while the connection is not locked, but a lock may be
//!   acquired while a listing is still running. Both can therefore be active at once,
//!   and every read accessor prefers the listing.
//! - A connection can only be marked disconnected once it is completely free.
//!
//! Breaking one of these rules is a bug in the caller and panics. Callers check the
//! `can_*` predicates (or `is_locked`/`has_request`) before acting.
//!
//! # Virtual time
//!
//! The tracker never reads wall-clock time. `advance` moves both the clock and the
//! idle counter forward and forwards the clock to the scheduler. Claiming the
//! connection (`claim`, `lock_for_transfer`, `begin_list_transfer`) resets the idle
//! counter and cancels any scheduled command.

use std::sync::{Arc, Weak};

use crate::delayed::{CommandScheduler, DelayedCommand};
use crate::monitor::TransferMonitorId;
use crate::race::SiteRace;
use crate::recursive::RecursiveCommandLogic;
use crate::request::SiteLogicRequest;
use crate::state::{
    ConnPhase, Direction, FileLock, FileTransfer, ListTransfer, Reservation, StateSnapshot,
    TransferKind,
};

#[derive(Debug)]
pub struct ConnStateTracker<S = DelayedCommand> {
    clock: u64,
    idle_time: u64,
    logged_in: bool,
    last_checked: Option<Weak<SiteRace>>,
    check_count: u32,
    reservation: Reservation,
    list: Option<ListTransfer>,
    /// Survives `finish_transfer`, cleared by the next `begin_file_transfer`
    aborted: bool,
    scheduler: S,
    recursive_logic: RecursiveCommandLogic,
}

impl ConnStateTracker<DelayedCommand> {
    pub fn new() -> Self {
        Self::with_scheduler(DelayedCommand::new())
    }
}

impl Default for ConnStateTracker<DelayedCommand> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CommandScheduler> ConnStateTracker<S> {
    pub fn with_scheduler(scheduler: S) -> Self {
        Self {
            clock: 0,
            idle_time: 0,
            logged_in: false,
            last_checked: None,
            check_count: 0,
            reservation: Reservation::Free,
            list: None,
            aborted: false,
            scheduler,
            recursive_logic: RecursiveCommandLogic::new(),
        }
    }

    // virtual clock & scheduling

    /// Move the virtual clock forward by `delta` time units.
    pub fn advance(&mut self, delta: u64) {
        self.clock = self.clock.saturating_add(delta);
        self.idle_time = self.idle_time.saturating_add(delta);
        tracing::trace!("clock advanced to {} (idle {})", self.clock, self.idle_time);
        if self.scheduler.is_active() {
            self.scheduler.advance_to(self.clock);
        }
    }
    pub fn clock(&self) -> u64 {
        self.clock
    }
    /// Time since the connection was last claimed or disconnected.
    pub fn idle_time(&self) -> u64 {
        self.idle_time
    }
    /// Schedule `command` to fire `delay` time units from now.
    pub fn schedule(&mut self, command: impl Into<String>, delay: u64) {
        self.schedule_command(command, delay, None, false);
    }
    pub fn schedule_with_payload(&mut self, command: impl Into<String>, delay: u64, payload: u64) {
        self.schedule_command(command, delay, Some(payload), false);
    }
    /// Schedule a command that survives `mark_disconnected`.
    pub fn schedule_persisting(
        &mut self,
        command: impl Into<String>,
        delay: u64,
        payload: Option<u64>,
    ) {
        self.schedule_command(command, delay, payload, true);
    }
    pub fn schedule_command(
        &mut self,
        command: impl Into<String>,
        delay: u64,
        payload: Option<u64>,
        persisting: bool,
    ) {
        let command = command.into();
        let fire_time = self.clock.saturating_add(delay);
        tracing::debug!(
            "scheduling {:?} at {} (persisting: {})",
            command,
            fire_time,
            persisting
        );
        self.scheduler.set(command, fire_time, payload, persisting);
    }
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
    /// Claim the connection for new work: resets the idle counter and cancels any
    /// scheduled command. Must not be called on a locked connection.
    pub fn claim(&mut self) {
        assert!(
            !self.is_transfer_locked(),
            "cannot claim a connection that is locked for transfer"
        );
        self.scheduler.cancel_all();
        self.idle_time = 0;
    }
    /// Same as `claim` but allowed in any state.
    pub fn reset_idle(&mut self) {
        self.scheduler.cancel_all();
        self.idle_time = 0;
    }
    pub fn mark_disconnected(&mut self) {
        assert!(
            !self.is_transfer_locked(),
            "cannot disconnect a connection locked for transfer"
        );
        assert!(
            self.list.is_none(),
            "cannot disconnect a connection with a list transfer in progress"
        );
        assert!(
            !self.has_request(),
            "cannot disconnect a connection with a pending request"
        );
        tracing::debug!("connection disconnected at {}", self.clock);
        self.logged_in = false;
        self.scheduler.cancel_transient();
        self.idle_time = 0;
    }
    pub fn set_logged_in(&mut self) {
        self.logged_in = true;
    }
    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    // duplicate-check counter

    /// Record a check of `race`. Consecutive checks of the same target (by identity)
    /// increment the count; any other target restarts it at 1.
    pub fn check(&mut self, race: &Arc<SiteRace>) {
        let same = self
            .last_checked
            .as_ref()
            .is_some_and(|last| std::ptr::eq(last.as_ptr(), Arc::as_ptr(race)));
        if same {
            self.check_count += 1;
        } else {
            self.last_checked = Some(Arc::downgrade(race));
            self.check_count = 1;
        }
    }
    /// The last checked target, if it is still alive.
    pub fn last_checked(&self) -> Option<Arc<SiteRace>> {
        self.last_checked.as_ref().and_then(Weak::upgrade)
    }
    pub fn check_count(&self) -> u32 {
        self.check_count
    }

    // transfers

    /// Reserve the connection for an upcoming file transfer.
    pub fn lock_for_transfer(&mut self, monitor: TransferMonitorId, direction: Direction) {
        match &self.reservation {
            Reservation::Free => {}
            Reservation::Request(request) => panic!(
                "cannot lock connection for transfer while request {} is pending",
                request.id
            ),
            Reservation::Locked(lock) if lock.transfer.is_some() => {
                panic!("cannot lock connection for transfer: a transfer is in progress")
            }
            Reservation::Locked(_) => {
                panic!("cannot lock connection for transfer: already locked")
            }
        }
        self.claim();
        tracing::debug!("locked for {:?} with {}", direction, monitor);
        self.reservation = Reservation::Locked(FileLock {
            monitor,
            direction,
            transfer: None,
        });
    }
    /// Start the file transfer on a locked connection.
    pub fn begin_file_transfer(
        &mut self,
        remote_path: impl Into<String>,
        remote_file: impl Into<String>,
        fxp: bool,
        passive: bool,
        addr: impl Into<String>,
        tls: bool,
    ) {
        let lock = match &mut self.reservation {
            Reservation::Locked(lock) if lock.transfer.is_none() => lock,
            Reservation::Locked(_) => {
                panic!("cannot begin file transfer: a transfer is already in progress")
            }
            Reservation::Request(request) => panic!(
                "cannot begin file transfer while request {} is pending",
                request.id
            ),
            Reservation::Free => {
                panic!("cannot begin file transfer on a connection that is not locked")
            }
        };
        let transfer = FileTransfer {
            remote_path: remote_path.into(),
            remote_file: remote_file.into(),
            fxp,
            passive,
            addr: addr.into(),
            tls,
            initialized: false,
        };
        tracing::debug!(
            "{:?} of {}/{} started (fxp: {}, passive: {}, tls: {})",
            lock.direction,
            transfer.remote_path,
            transfer.remote_file,
            transfer.fxp,
            transfer.passive,
            transfer.tls
        );
        lock.transfer = Some(transfer);
        self.aborted = false;
    }
    /// Start a passive-mode file transfer; the peer address is not known.
    pub fn begin_passive_transfer(
        &mut self,
        remote_path: impl Into<String>,
        remote_file: impl Into<String>,
        fxp: bool,
        tls: bool,
    ) {
        self.begin_file_transfer(remote_path, remote_file, fxp, true, "", tls);
    }
    /// Start an active-mode file transfer connecting to `addr`.
    pub fn begin_active_transfer(
        &mut self,
        remote_path: impl Into<String>,
        remote_file: impl Into<String>,
        addr: impl Into<String>,
        tls: bool,
    ) {
        self.begin_file_transfer(remote_path, remote_file, false, false, addr, tls);
    }
    pub fn begin_list_transfer(
        &mut self,
        monitor: TransferMonitorId,
        passive: bool,
        addr: impl Into<String>,
        tls: bool,
    ) {
        assert!(
            !self.has_file_transfer(),
            "cannot begin list transfer while a file transfer is in progress"
        );
        assert!(
            !self.is_transfer_locked(),
            "cannot begin list transfer on a connection locked for transfer"
        );
        assert!(
            self.list.is_none(),
            "cannot begin list transfer: a list transfer is already in progress"
        );
        self.claim();
        tracing::debug!("list transfer started with {}", monitor);
        self.list = Some(ListTransfer {
            monitor,
            passive,
            addr: addr.into(),
            tls,
            initialized: false,
        });
    }
    pub fn begin_passive_list(&mut self, monitor: TransferMonitorId, tls: bool) {
        self.begin_list_transfer(monitor, true, "", tls);
    }
    pub fn begin_active_list(
        &mut self,
        monitor: TransferMonitorId,
        addr: impl Into<String>,
        tls: bool,
    ) {
        self.begin_list_transfer(monitor, false, addr, tls);
    }
    /// Complete the current transfer. A running listing is completed first, leaving
    /// any file lock in place; otherwise the file lock (and its transfer) is released.
    pub fn finish_transfer(&mut self) {
        if let Some(list) = self.list.take() {
            tracing::debug!("list transfer with {} finished", list.monitor);
            return;
        }
        if let Reservation::Locked(lock) = &self.reservation {
            tracing::debug!(
                "{:?} with {} finished (started: {})",
                lock.direction,
                lock.monitor,
                lock.transfer.is_some()
            );
            self.reservation = Reservation::Free;
        } else {
            tracing::trace!("finish_transfer with nothing to finish");
        }
    }
    /// Note that the data path failed. The lock is not released.
    pub fn abort_transfer(&mut self) {
        tracing::debug!("transfer aborted");
        self.aborted = true;
    }
    pub fn was_aborted(&self) -> bool {
        self.aborted
    }
    /// Mark the active listing (or, without one, the active file transfer) as having
    /// data flowing.
    pub fn initialize_transfer(&mut self) {
        if let Some(list) = &mut self.list {
            list.initialized = true;
            return;
        }
        match &mut self.reservation {
            Reservation::Locked(FileLock {
                transfer: Some(transfer),
                ..
            }) => transfer.initialized = true,
            _ => tracing::trace!("initialize_transfer with no transfer in progress"),
        }
    }
    pub fn is_transfer_initialized(&self) -> bool {
        match &self.list {
            Some(list) => list.initialized,
            None => self
                .reservation
                .file_transfer()
                .is_some_and(|transfer| transfer.initialized),
        }
    }

    // accessors: an active listing shadows the file transfer state

    pub fn transfer_kind(&self) -> Option<TransferKind> {
        if self.list.is_some() {
            return Some(TransferKind::List);
        }
        self.reservation.lock().map(|lock| lock.direction.into())
    }
    pub fn transfer_monitor(&self) -> Option<TransferMonitorId> {
        match &self.list {
            Some(list) => Some(list.monitor),
            None => self.reservation.lock().map(|lock| lock.monitor),
        }
    }
    pub fn is_passive(&self) -> Option<bool> {
        match &self.list {
            Some(list) => Some(list.passive),
            None => self.reservation.file_transfer().map(|t| t.passive),
        }
    }
    pub fn is_fxp(&self) -> bool {
        self.list.is_none() && self.reservation.file_transfer().is_some_and(|t| t.fxp)
    }
    pub fn peer_address(&self) -> Option<&str> {
        match &self.list {
            Some(list) => Some(&list.addr),
            None => self.reservation.file_transfer().map(|t| t.addr.as_str()),
        }
    }
    pub fn uses_tls(&self) -> Option<bool> {
        match &self.list {
            Some(list) => Some(list.tls),
            None => self.reservation.file_transfer().map(|t| t.tls),
        }
    }
    pub fn remote_path(&self) -> Option<&str> {
        if self.list.is_some() {
            return None;
        }
        self.reservation
            .file_transfer()
            .map(|t| t.remote_path.as_str())
    }
    pub fn remote_file(&self) -> Option<&str> {
        if self.list.is_some() {
            return None;
        }
        self.reservation
            .file_transfer()
            .map(|t| t.remote_file.as_str())
    }

    // predicates

    pub fn has_file_transfer(&self) -> bool {
        self.reservation.file_transfer().is_some()
    }
    pub fn is_list_locked(&self) -> bool {
        self.list.is_some()
    }
    pub fn has_transfer(&self) -> bool {
        self.is_list_locked() || self.has_file_transfer()
    }
    pub fn is_transfer_locked(&self) -> bool {
        matches!(self.reservation, Reservation::Locked(_))
    }
    pub fn has_request(&self) -> bool {
        matches!(self.reservation, Reservation::Request(_))
    }
    pub fn is_list_or_transfer_locked(&self) -> bool {
        self.is_list_locked() || self.is_transfer_locked()
    }
    pub fn is_locked(&self) -> bool {
        self.is_list_or_transfer_locked() || self.has_request()
    }
    /// A listing alone does not count: it does not block request dispatch.
    pub fn is_hard_locked(&self) -> bool {
        self.is_transfer_locked() || self.has_request()
    }
    pub fn can_lock_for_transfer(&self) -> bool {
        matches!(self.reservation, Reservation::Free)
    }
    pub fn can_begin_file_transfer(&self) -> bool {
        self.is_transfer_locked() && !self.has_file_transfer()
    }
    pub fn can_begin_list_transfer(&self) -> bool {
        !self.is_transfer_locked() && self.list.is_none()
    }
    pub fn can_claim(&self) -> bool {
        !self.is_transfer_locked()
    }
    pub fn can_set_request(&self) -> bool {
        !self.is_transfer_locked()
    }
    pub fn can_disconnect(&self) -> bool {
        matches!(self.reservation, Reservation::Free) && self.list.is_none()
    }
    pub fn phase(&self) -> ConnPhase {
        ConnPhase::of(&self.reservation, self.list.as_ref())
    }

    // site requests

    /// Store a copy of `request` as the connection's outstanding site command,
    /// replacing any previous one.
    ///
    /// # Panics
    ///
    /// Panics if the connection is locked for a file transfer.
    pub fn set_request(&mut self, request: SiteLogicRequest) {
        assert!(
            !self.is_transfer_locked(),
            "cannot set request {} on a connection locked for transfer",
            request.id
        );
        if let Reservation::Request(previous) = &self.reservation {
            tracing::debug!("request {} replaced by {}", previous.id, request.id);
        }
        tracing::debug!("request {} ({:?}) pending", request.id, request.kind);
        self.reservation = Reservation::Request(request);
    }
    pub fn finish_request(&mut self) {
        if let Reservation::Request(request) = &self.reservation {
            tracing::debug!("request {} finished", request.id);
            self.reservation = Reservation::Free;
        }
    }
    pub fn request(&self) -> Option<&SiteLogicRequest> {
        match &self.reservation {
            Reservation::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn recursive_logic(&self) -> &RecursiveCommandLogic {
        &self.recursive_logic
    }
    pub fn recursive_logic_mut(&mut self) -> &mut RecursiveCommandLogic {
        &mut self.recursive_logic
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            phase: self.phase(),
            clock: self.clock,
            idle_time: self.idle_time,
            logged_in: self.logged_in,
            transfer_kind: self.transfer_kind(),
            monitor: self.transfer_monitor(),
            remote_path: self.remote_path().map(str::to_string),
            remote_file: self.remote_file().map(str::to_string),
            passive: self.is_passive(),
            fxp: self.is_fxp(),
            peer_address: self.peer_address().map(str::to_string),
            tls: self.uses_tls(),
            initialized: self.is_transfer_initialized(),
            aborted: self.aborted,
            request: self.request().cloned(),
            check_count: self.check_count,
            command_scheduled: self.scheduler.is_active(),
        }
    }
}
