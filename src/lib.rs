//! loopwarden - owner-scoped lifecycle engine for named background loops
//!
//! A controller embeds a [`LoopEngine`], registers loops with it while active, and
//! calls [`LoopEngine::dispose`] (usually through [`LoopOwner::close`]) during its
//! own teardown. After disposal no loop owned by the engine runs again.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod owner;
pub mod shutdown;
pub mod work;

pub use config::{Config, DuplicatePolicy, EngineConfig};
pub use domain::{EngineState, ErrorPolicy, LoopState, Schedule, StopReason};
pub use engine::{DisposeReport, LoopEngine, LoopInfo, LoopRef};
pub use error::{EngineError, LoopError, LoopExecutionError, Result};
pub use events::LoopEvent;
pub use owner::{LazyLoopEngine, LoopOwner};
pub use work::{LoopContext, LoopFn, LoopSpec, LoopWork};
