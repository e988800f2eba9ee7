//! Engine events and the broadcast bus that carries them
//!
//! Every lifecycle change and every failed execution is published here and logged
//! through `tracing`. The bus is fire-and-forget: events sent while nobody is
//! subscribed are dropped, and a receiver that falls more than `capacity` events
//! behind sees `RecvError::Lagged` and skips ahead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::StopReason;
use crate::error::LoopExecutionError;

/// Something observable that happened inside an engine
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoopEvent {
    /// A loop was accepted and its task spawned
    Registered { loop_id: String, at: DateTime<Utc> },
    /// First execution of a loop began (`Scheduled -> Running`)
    Started { loop_id: String, at: DateTime<Utc> },
    /// One execution failed or panicked; the loop itself may keep running
    Failed {
        error: LoopExecutionError,
        at: DateTime<Utc>,
    },
    /// A loop reached `Stopped`
    Stopped {
        loop_id: String,
        reason: StopReason,
        at: DateTime<Utc>,
    },
    /// A loop did not finish within the grace period and was detached
    CancellationTimeout {
        loop_id: String,
        grace_ms: u64,
        at: DateTime<Utc>,
    },
    /// The engine finished disposing
    Disposed {
        stopped: usize,
        detached: usize,
        at: DateTime<Utc>,
    },
}

impl LoopEvent {
    pub fn registered(loop_id: &str) -> Self {
        Self::Registered {
            loop_id: loop_id.to_string(),
            at: Utc::now(),
        }
    }

    pub fn started(loop_id: &str) -> Self {
        Self::Started {
            loop_id: loop_id.to_string(),
            at: Utc::now(),
        }
    }

    pub fn failed(error: LoopExecutionError) -> Self {
        Self::Failed {
            error,
            at: Utc::now(),
        }
    }

    pub fn stopped(loop_id: &str, reason: StopReason) -> Self {
        Self::Stopped {
            loop_id: loop_id.to_string(),
            reason,
            at: Utc::now(),
        }
    }

    pub fn cancellation_timeout(loop_id: &str, grace_ms: u64) -> Self {
        Self::CancellationTimeout {
            loop_id: loop_id.to_string(),
            grace_ms,
            at: Utc::now(),
        }
    }

    pub fn disposed(stopped: usize, detached: usize) -> Self {
        Self::Disposed {
            stopped,
            detached,
            at: Utc::now(),
        }
    }

    /// Loop the event is about, if any
    pub fn loop_id(&self) -> Option<&str> {
        match self {
            LoopEvent::Registered { loop_id, .. }
            | LoopEvent::Started { loop_id, .. }
            | LoopEvent::Stopped { loop_id, .. }
            | LoopEvent::CancellationTimeout { loop_id, .. } => Some(loop_id),
            LoopEvent::Failed { error, .. } => Some(&error.loop_id),
            LoopEvent::Disposed { .. } => None,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            LoopEvent::Registered { at, .. }
            | LoopEvent::Started { at, .. }
            | LoopEvent::Failed { at, .. }
            | LoopEvent::Stopped { at, .. }
            | LoopEvent::CancellationTimeout { at, .. }
            | LoopEvent::Disposed { at, .. } => *at,
        }
    }

    fn log(&self) {
        match self {
            LoopEvent::Registered { loop_id, .. } => {
                tracing::debug!(loop_id = %loop_id, "Loop registered");
            }
            LoopEvent::Started { loop_id, .. } => {
                tracing::debug!(loop_id = %loop_id, "Loop started");
            }
            LoopEvent::Failed { error, .. } => {
                tracing::error!(
                    loop_id = %error.loop_id,
                    tick = error.tick,
                    panicked = error.panicked,
                    error = %error.message,
                    "Loop execution failed"
                );
            }
            LoopEvent::Stopped {
                loop_id, reason, ..
            } => {
                tracing::info!(loop_id = %loop_id, reason = ?reason, "Loop stopped");
            }
            LoopEvent::CancellationTimeout {
                loop_id, grace_ms, ..
            } => {
                tracing::warn!(
                    loop_id = %loop_id,
                    grace_ms = grace_ms,
                    "Loop did not stop within grace period, detaching"
                );
            }
            LoopEvent::Disposed {
                stopped, detached, ..
            } => {
                tracing::info!(stopped = stopped, detached = detached, "Engine disposed");
            }
        }
    }
}

/// Broadcast channel for [`LoopEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LoopEvent>,
}

impl EventBus {
    /// Capacity is clamped to at least 1
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Log the event and hand it to every current subscriber
    pub fn publish(&self, event: LoopEvent) {
        event.log();
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_id_accessor() {
        assert_eq!(LoopEvent::registered("a").loop_id(), Some("a"));
        assert_eq!(
            LoopEvent::stopped("b", StopReason::Requested).loop_id(),
            Some("b")
        );
        assert_eq!(LoopEvent::disposed(2, 0).loop_id(), None);

        let err = LoopExecutionError {
            loop_id: "c".to_string(),
            tick: 1,
            message: "boom".to_string(),
            panicked: false,
        };
        assert_eq!(LoopEvent::failed(err).loop_id(), Some("c"));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(LoopEvent::stopped("ping", StopReason::Disposed)).unwrap();
        assert_eq!(json["event"], "stopped");
        assert_eq!(json["loop_id"], "ping");
        assert_eq!(json["reason"], "disposed");
        assert!(json["at"].is_string());
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(LoopEvent::registered("ping"));
        let ev = rx.recv().await.unwrap();
        assert!(matches!(ev, LoopEvent::Registered { ref loop_id, .. } if loop_id == "ping"));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(0);
        bus.publish(LoopEvent::disposed(0, 0));
    }
}
