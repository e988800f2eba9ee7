//! Lifecycle states for loops and for the engine itself

use serde::{Deserialize, Serialize};

/// State of a single registered loop
///
/// `Scheduled -> Running -> Stopped`, with `Scheduled -> Stopped` when a loop is
/// cancelled before its first execution. Nothing leaves `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    /// Registered, waiting for its first execution
    Scheduled,
    /// Has started executing at least once
    Running,
    /// Terminal
    Stopped,
}

impl LoopState {
    /// Returns true if the loop can never execute again
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Stopped)
    }

    /// Returns true while the loop occupies its identifier
    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        matches!(
            (self, next),
            (LoopState::Scheduled, LoopState::Running)
                | (LoopState::Scheduled, LoopState::Stopped)
                | (LoopState::Running, LoopState::Stopped)
        )
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoopState::Scheduled => "scheduled",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Engine lifecycle. Only `Active -> Disposed` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Active,
    Disposed,
}

/// Why a loop reached `Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop(id)` was called
    Requested,
    /// Another loop was registered under the same identifier
    Replaced,
    /// The engine was disposed
    Disposed,
    /// A one-shot loop ran to completion
    Completed,
    /// Work returned a fatal error, or failed under `StopOnError`
    Failed,
    /// Work returned `Canceled`, or the engine was dropped without disposal
    Cancelled,
}
