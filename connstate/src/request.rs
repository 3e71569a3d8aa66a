use serde::{Deserialize, Serialize};

/// What a site-logic request asks the connection to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    FileList,
    FileListRefresh,
    RawCommand,
    Wipe,
    Delete,
    Nuke,
    MakeDir,
    Move,
    Idle,
    Abort,
}

/// A site command handed to one connection by the request pipeline.
///
/// The tracker keeps its own copy while the command is outstanding and drops it on
/// `finish_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLogicRequest {
    pub id: u64,
    pub kind: RequestKind,
    /// Primary argument (usually a path)
    #[serde(default)]
    pub data: String,
    /// Secondary argument (reason, target path or raw command text)
    #[serde(default)]
    pub extra: String,
    /// Whether the requester waits for the outcome
    #[serde(default)]
    pub care: bool,
}

impl SiteLogicRequest {
    pub fn new(id: u64, kind: RequestKind, data: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            data: data.into(),
            extra: String::new(),
            care: true,
        }
    }
    #[must_use]
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }
}
