//! Loop Lifecycle Engine
//!
//! Owns a set of named background loops, each running as its own tokio task, and
//! guarantees they are all stopped exactly once when the engine is disposed.

mod handle;
mod loop_engine;
mod runner;

pub use handle::LoopRef;
pub use loop_engine::{DisposeReport, LoopEngine, LoopInfo};
