//! Boundary of the recursive traversal helper owned by each connection.
//!
//! The command generation itself lives with the traversal engine. The connection only
//! needs to know whether a recursive operation is in flight, which kind, and where it
//! is rooted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecursiveMode {
    Delete,
    DeleteOwn,
    Transfer,
}

#[derive(Debug, Default)]
pub struct RecursiveCommandLogic {
    mode: Option<RecursiveMode>,
    base_path: String,
}

impl RecursiveCommandLogic {
    pub fn new() -> Self {
        Self::default()
    }
    /// Start a recursive operation rooted at `base_path`, replacing any previous one.
    pub fn initialize(&mut self, mode: RecursiveMode, base_path: impl Into<String>) {
        self.mode = Some(mode);
        self.base_path = base_path.into();
        tracing::debug!("recursive {:?} started at {:?}", mode, self.base_path);
    }
    pub fn finish(&mut self) {
        if let Some(mode) = self.mode.take() {
            tracing::debug!("recursive {:?} at {:?} finished", mode, self.base_path);
        }
        self.base_path.clear();
    }
    pub fn is_active(&self) -> bool {
        self.mode.is_some()
    }
    pub fn mode(&self) -> Option<RecursiveMode> {
        self.mode
    }
    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}
