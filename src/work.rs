//! Units of work that can be registered with a [`LoopEngine`](crate::engine::LoopEngine)
//!
//! A loop's work is anything implementing [`LoopWork`]. Closures are adapted with
//! [`LoopFn`]. Each scheduled execution receives a fresh [`LoopContext`] carrying
//! the loop's identifier, the execution counter, and its stop signal.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::domain::{ErrorPolicy, Schedule};
use crate::error::LoopError;

/// Per-execution context handed to [`LoopWork::run`]
#[derive(Debug, Clone)]
pub struct LoopContext {
    loop_id: Arc<str>,
    tick: u64,
    token: CancellationToken,
}

impl LoopContext {
    pub(crate) fn new(loop_id: Arc<str>, tick: u64, token: CancellationToken) -> Self {
        Self {
            loop_id,
            tick,
            token,
        }
    }

    pub fn loop_id(&self) -> &str {
        &self.loop_id
    }

    /// 1-based counter of executions of this loop
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// True once the loop has been told to stop
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the loop is told to stop
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// The loop's stop signal, for handing to nested tasks
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// A repeatable unit of background work
///
/// Implementations should return promptly once [`LoopContext::is_cancelled`] turns
/// true, ideally with [`LoopError::Canceled`]. The engine drops the execution
/// future at its next `.await` after a stop, but it cannot interrupt code that
/// never yields.
#[async_trait]
pub trait LoopWork: Send + Sync + 'static {
    async fn run(&self, ctx: LoopContext) -> Result<(), LoopError>;
}

/// Closure-backed [`LoopWork`]
///
/// The closure builds a fresh future per execution, so no state is shared between
/// ticks unless the closure captures an `Arc` explicitly.
pub struct LoopFn<F> {
    f: F,
}

impl<F> LoopFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> LoopWork for LoopFn<F>
where
    F: Fn(LoopContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), LoopError>> + Send + 'static,
{
    async fn run(&self, ctx: LoopContext) -> Result<(), LoopError> {
        (self.f)(ctx).await
    }
}

/// Everything needed to register a loop: what to run, when, and how to treat failures
#[derive(Clone)]
pub struct LoopSpec {
    pub(crate) work: Arc<dyn LoopWork>,
    pub(crate) schedule: Schedule,
    pub(crate) error_policy: ErrorPolicy,
}

impl LoopSpec {
    pub fn new(work: impl LoopWork, schedule: Schedule) -> Self {
        Self {
            work: Arc::new(work),
            schedule,
            error_policy: ErrorPolicy::default(),
        }
    }

    /// Build a spec from a closure returning a future
    pub fn from_fn<F, Fut>(schedule: Schedule, f: F) -> Self
    where
        F: Fn(LoopContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), LoopError>> + Send + 'static,
    {
        Self::new(LoopFn::new(f), schedule)
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }
}

impl std::fmt::Debug for LoopSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopSpec")
            .field("schedule", &self.schedule)
            .field("error_policy", &self.error_policy)
            .finish_non_exhaustive()
    }
}
