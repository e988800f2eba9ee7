//! Schedule descriptors and per-loop error policy

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// When a loop's work executes
///
/// A schedule without a period is one-shot: it runs once after `initial_delay`
/// and the loop then stops with [`StopReason::Completed`](super::StopReason::Completed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Schedule {
    initial_delay: Duration,
    period: Option<Duration>,
}

impl Schedule {
    /// Run once, immediately
    pub fn once() -> Self {
        Self::default()
    }

    /// Run once after `delay`
    pub fn after(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            period: None,
        }
    }

    /// Run on every tick of `period`, first tick immediately
    pub fn every(period: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            period: Some(period),
        }
    }

    /// Push the first execution back by `delay`
    pub fn starting_after(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn is_recurring(&self) -> bool {
        self.period.is_some()
    }

    /// Reject schedules the runner cannot drive
    pub fn validate(&self) -> Result<()> {
        if self.period == Some(Duration::ZERO) {
            return Err(EngineError::InvalidSchedule(
                "period must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a recurring loop does after a failed execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Report and keep the schedule
    #[default]
    Continue,
    /// Report and stop the loop
    StopOnError,
}
