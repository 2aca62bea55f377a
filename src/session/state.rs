//! Session lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session is in its lifecycle
///
/// `Idle → Loading → Ready → Extracting → Closed`; cancellation reaches
/// `Closed` from anywhere. A failed extraction goes back to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, request not built yet
    Idle,
    /// Request built, waiting for the navigation to commit
    Loading,
    /// Page committed; save is possible
    Ready,
    /// Extraction script evaluated or in flight; waiting for the content
    Extracting,
    /// Torn down; terminal
    Closed,
}

impl SessionState {
    /// Whether a save may start the extraction script in this state
    ///
    /// In `Extracting` this re-runs a script whose evaluation settled while
    /// the page never posted content.
    pub fn can_extract(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Extracting)
    }

    /// Whether the session is finished
    pub fn is_closed(self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Extracting => "extracting",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
