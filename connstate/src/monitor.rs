use serde::{Deserialize, Serialize};

/// Handle to a transfer monitor owned by the transfer or listing engine.
///
/// The tracker never dereferences it: it stores the handle it was given when the
/// connection was locked (or a listing started) and hands the same value back. The
/// engine that issued the handle must keep the monitor alive for as long as any
/// tracker holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferMonitorId(pub u64);

impl std::fmt::Display for TransferMonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "monitor#{}", self.0)
    }
}
