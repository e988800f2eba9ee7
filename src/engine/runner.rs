//! Per-loop driver
//!
//! One `LoopRunner` runs inside each loop's tokio task. It waits for the schedule,
//! executes the work, and isolates failures and panics at the loop boundary. Every
//! wait and every execution is raced against the loop's cancellation token, so a
//! stopped loop is abandoned at the work's next `.await`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::handle::transition;
use crate::domain::{ErrorPolicy, LoopState, StopReason};
use crate::error::{LoopError, LoopExecutionError};
use crate::events::{EventBus, LoopEvent};
use crate::work::{LoopContext, LoopSpec};

/// Result of a single execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Execution {
    Completed,
    Cancelled,
    Failed { fatal: bool },
}

pub(crate) struct LoopRunner {
    id: Arc<str>,
    spec: LoopSpec,
    token: CancellationToken,
    state: Arc<watch::Sender<LoopState>>,
    bus: EventBus,
}

impl LoopRunner {
    pub(crate) fn new(
        id: Arc<str>,
        spec: LoopSpec,
        token: CancellationToken,
        state: Arc<watch::Sender<LoopState>>,
        bus: EventBus,
    ) -> Self {
        Self {
            id,
            spec,
            token,
            state,
            bus,
        }
    }

    /// Drive the loop until it finishes or is cancelled, then settle its state
    pub(crate) async fn run(self) {
        let reason = self.drive().await;
        // A stop issued by the engine has already moved the state and reported it
        if transition(&self.state, LoopState::Stopped) {
            self.bus.publish(LoopEvent::stopped(&self.id, reason));
        }
    }

    async fn drive(&self) -> StopReason {
        let schedule = self.spec.schedule;
        let start = Instant::now() + schedule.initial_delay();

        let mut interval: Option<Interval> = schedule.period().map(|period| {
            let mut interval = time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        if interval.is_none() && !schedule.initial_delay().is_zero() {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return StopReason::Cancelled,
                _ = time::sleep_until(start) => {}
            }
        }

        let mut tick: u64 = 0;
        loop {
            if let Some(interval) = interval.as_mut() {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => return StopReason::Cancelled,
                    _ = interval.tick() => {}
                }
            }

            if self.token.is_cancelled() || self.state.borrow().is_terminal() {
                return StopReason::Cancelled;
            }

            tick += 1;
            if transition(&self.state, LoopState::Running) {
                self.bus.publish(LoopEvent::started(&self.id));
            }

            match self.execute(tick).await {
                Execution::Completed => {}
                Execution::Cancelled => return StopReason::Cancelled,
                Execution::Failed { fatal } => {
                    if fatal || self.spec.error_policy == ErrorPolicy::StopOnError {
                        return StopReason::Failed;
                    }
                }
            }

            if interval.is_none() {
                return StopReason::Completed;
            }
        }
    }

    async fn execute(&self, tick: u64) -> Execution {
        let ctx = LoopContext::new(self.id.clone(), tick, self.token.clone());
        let work = AssertUnwindSafe(self.spec.work.run(ctx)).catch_unwind();

        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Execution::Cancelled,
            result = work => result,
        };

        match result {
            Ok(Ok(())) => Execution::Completed,
            Ok(Err(LoopError::Canceled)) => Execution::Cancelled,
            Ok(Err(e)) => {
                self.report(tick, e.to_string(), false);
                Execution::Failed {
                    fatal: e.is_fatal(),
                }
            }
            Err(payload) => {
                self.report(tick, panic_message(payload.as_ref()), true);
                Execution::Failed { fatal: false }
            }
        }
    }

    fn report(&self, tick: u64, message: String, panicked: bool) {
        self.bus.publish(LoopEvent::failed(LoopExecutionError {
            loop_id: self.id.to_string(),
            tick,
            message,
            panicked,
        }));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}
