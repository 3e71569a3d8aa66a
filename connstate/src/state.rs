//! Tagged representation of who owns a control connection.
//!
//! A connection is reserved by at most one of: a pending site request, or a file
//! transfer lock. The lock may or may not have a running transfer attached. A
//! directory listing is tracked next to the reservation because it may overlap with a
//! freshly acquired (not yet running) lock, and with a running transfer that was
//! started on such a lock.

use serde::{Deserialize, Serialize};

use crate::monitor::TransferMonitorId;
use crate::request::SiteLogicRequest;

/// Direction of a file transfer relative to the site owning the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Upload,
    Download,
}

/// What the connection's data channel is being used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Upload,
    Download,
    List,
}

impl From<Direction> for TransferKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Upload => TransferKind::Upload,
            Direction::Download => TransferKind::Download,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FileTransfer {
    pub remote_path: String,
    pub remote_file: String,
    pub fxp: bool,
    pub passive: bool,
    pub addr: String,
    pub tls: bool,
    pub initialized: bool,
}

/// A connection reserved for a file transfer; `transfer` is set once it starts.
#[derive(Debug, Clone)]
pub(crate) struct FileLock {
    pub monitor: TransferMonitorId,
    pub direction: Direction,
    pub transfer: Option<FileTransfer>,
}

#[derive(Debug, Clone)]
pub(crate) struct ListTransfer {
    pub monitor: TransferMonitorId,
    pub passive: bool,
    pub addr: String,
    pub tls: bool,
    pub initialized: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) enum Reservation {
    #[default]
    Free,
    Request(SiteLogicRequest),
    Locked(FileLock),
}

impl Reservation {
    pub fn lock(&self) -> Option<&FileLock> {
        match self {
            Reservation::Locked(lock) => Some(lock),
            _ => None,
        }
    }
    pub fn file_transfer(&self) -> Option<&FileTransfer> {
        self.lock().and_then(|lock| lock.transfer.as_ref())
    }
}

/// Flattened view of the connection state, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnPhase {
    Idle,
    ListActive,
    Locked,
    LockedListActive,
    LockedActive,
    LockedActiveListActive,
    RequestPending,
    RequestPendingListActive,
}

impl ConnPhase {
    pub(crate) fn of(reservation: &Reservation, list: Option<&ListTransfer>) -> Self {
        let listing = list.is_some();
        match (reservation, listing) {
            (Reservation::Free, false) => ConnPhase::Idle,
            (Reservation::Free, true) => ConnPhase::ListActive,
            (Reservation::Request(_), false) => ConnPhase::RequestPending,
            (Reservation::Request(_), true) => ConnPhase::RequestPendingListActive,
            (Reservation::Locked(lock), false) if lock.transfer.is_some() => {
                ConnPhase::LockedActive
            }
            (Reservation::Locked(lock), true) if lock.transfer.is_some() => {
                ConnPhase::LockedActiveListActive
            }
            (Reservation::Locked(_), false) => ConnPhase::Locked,
            (Reservation::Locked(_), true) => ConnPhase::LockedListActive,
        }
    }
}

impl std::fmt::Display for ConnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnPhase::Idle => "idle",
            ConnPhase::ListActive => "list active",
            ConnPhase::Locked => "locked",
            ConnPhase::LockedListActive => "locked, list active",
            ConnPhase::LockedActive => "transferring",
            ConnPhase::LockedActiveListActive => "transferring, list active",
            ConnPhase::RequestPending => "request pending",
            ConnPhase::RequestPendingListActive => "request pending, list active",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of everything a tracker reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub phase: ConnPhase,
    pub clock: u64,
    pub idle_time: u64,
    pub logged_in: bool,
    pub transfer_kind: Option<TransferKind>,
    pub monitor: Option<TransferMonitorId>,
    pub remote_path: Option<String>,
    pub remote_file: Option<String>,
    pub passive: Option<bool>,
    pub fxp: bool,
    pub peer_address: Option<String>,
    pub tls: Option<bool>,
    pub initialized: bool,
    pub aborted: bool,
    pub request: Option<SiteLogicRequest>,
    pub check_count: u32,
    pub command_scheduled: bool,
}
