//! Loop handles: the engine's record of one loop, and the read-only view handed to callers

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::{LoopState, Schedule};

/// Apply `next` if the state machine allows it; returns true if this call changed the state
pub(crate) fn transition(state: &watch::Sender<LoopState>, next: LoopState) -> bool {
    state.send_if_modified(|current| {
        if current.can_transition_to(next) {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// Engine-owned record of a registered loop
pub(crate) struct LoopHandle {
    id: Arc<str>,
    state: Arc<watch::Sender<LoopState>>,
    token: CancellationToken,
    schedule: Schedule,
    join: JoinHandle<()>,
}

impl LoopHandle {
    pub(crate) fn new(
        id: Arc<str>,
        state: Arc<watch::Sender<LoopState>>,
        token: CancellationToken,
        schedule: Schedule,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            state,
            token,
            schedule,
            join,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub(crate) fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// The task has exited and the handle holds nothing but bookkeeping
    pub(crate) fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Returns true if this call moved the loop to `Stopped`
    pub(crate) fn mark_stopped(&self) -> bool {
        transition(&self.state, LoopState::Stopped)
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    pub(crate) fn observe(&self) -> LoopRef {
        LoopRef {
            id: self.id.clone(),
            state: self.state.subscribe(),
        }
    }

    /// Give up the record, keeping only what is needed to await the task
    pub(crate) fn into_join(self) -> (Arc<str>, JoinHandle<()>) {
        (self.id, self.join)
    }
}

/// Caller-side view of a registered loop
///
/// Returned by [`LoopEngine::register`](super::LoopEngine::register). It can watch
/// the loop's state but has no authority to start or stop it.
#[derive(Debug, Clone)]
pub struct LoopRef {
    id: Arc<str>,
    state: watch::Receiver<LoopState>,
}

impl LoopRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state().is_terminal()
    }

    /// Wait until the loop reaches `Stopped`
    pub async fn stopped(&self) {
        let mut rx = self.state.clone();
        // Err means every sender is gone, which only happens after the final transition
        let _ = rx.wait_for(|state| state.is_terminal()).await;
    }
}
