//! Domain types for loopwarden
//!
//! - LoopState / EngineState: the two lifecycle state machines
//! - StopReason: why a loop reached `Stopped`
//! - Schedule / ErrorPolicy: how a registered loop is driven

pub mod schedule;
pub mod state;

pub use schedule::{ErrorPolicy, Schedule};
pub use state::{EngineState, LoopState, StopReason};
