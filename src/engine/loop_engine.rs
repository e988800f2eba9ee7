//! LoopEngine implementation
//!
//! The engine maps identifiers to loop handles behind an async mutex, so
//! `register`, `stop` and `dispose` are serialized and the one-live-handle-per-id
//! rule holds under concurrent callers. Each loop's token is a child of the
//! engine's root token; disposal cancels the root and then joins every task under
//! one shared grace deadline.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::handle::{LoopHandle, LoopRef};
use super::runner::LoopRunner;
use crate::config::{DuplicatePolicy, EngineConfig};
use crate::domain::{EngineState, LoopState, StopReason};
use crate::error::{EngineError, Result};
use crate::events::{EventBus, LoopEvent};
use crate::work::LoopSpec;

/// Outcome of [`LoopEngine::dispose`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisposeReport {
    /// This call performed the disposal; false for every later call
    pub first: bool,
    /// Loops moved to `Stopped` by this disposal
    pub stopped: usize,
    /// Loops that outlived the grace period and were detached
    pub detached: Vec<String>,
}

impl DisposeReport {
    /// Every loop confirmed its exit within the grace period
    pub fn is_clean(&self) -> bool {
        self.detached.is_empty()
    }
}

/// Point-in-time description of a registered loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopInfo {
    pub id: String,
    pub state: LoopState,
    pub period_ms: Option<u64>,
}

type Retired = (Arc<str>, JoinHandle<()>);

struct Registry {
    state: EngineState,
    loops: HashMap<String, LoopHandle>,
    /// Tasks of stopped loops that have not been joined yet
    retiring: Vec<Retired>,
}

impl Registry {
    fn new() -> Self {
        Self {
            state: EngineState::Active,
            loops: HashMap::new(),
            retiring: Vec::new(),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            EngineState::Active => Ok(()),
            EngineState::Disposed => Err(EngineError::AlreadyDisposed),
        }
    }

    /// Drop records of loops whose tasks have already exited
    fn reap(&mut self) {
        self.loops
            .retain(|_, handle| !(handle.state().is_terminal() && handle.is_finished()));
        self.retiring.retain(|(_, join)| !join.is_finished());
    }
}

struct Inner {
    config: EngineConfig,
    registry: Mutex<Registry>,
    root: CancellationToken,
    /// Cancelled once the first `dispose()` has finished joining
    disposal_done: CancellationToken,
    bus: EventBus,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let registry = self.registry.get_mut();
        if registry.state == EngineState::Active && !registry.loops.is_empty() {
            tracing::warn!(
                loops = registry.loops.len(),
                "LoopEngine dropped without dispose(), cancelling its loops"
            );
        }
        self.root.cancel();
    }
}

/// Registry and lifecycle owner for a set of named background loops
///
/// Cloning is cheap and every clone refers to the same engine. When the last clone
/// is dropped without `dispose()`, every loop is told to stop, but nothing waits
/// for them.
#[derive(Clone)]
pub struct LoopEngine {
    inner: Arc<Inner>,
}

impl Default for LoopEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for LoopEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopEngine")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl LoopEngine {
    pub fn new(config: EngineConfig) -> Self {
        let bus = EventBus::new(config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                registry: Mutex::new(Registry::new()),
                root: CancellationToken::new(),
                disposal_done: CancellationToken::new(),
                bus,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.inner.bus.subscribe()
    }

    /// Register `spec` under `id` and start it on its own task
    ///
    /// Returns as soon as the task is spawned. Under
    /// [`DuplicatePolicy::Replace`] a live loop holding `id` is stopped the same way
    /// `stop()` does it and its task is left for `dispose()` to join.
    pub async fn register(&self, id: impl Into<String>, spec: LoopSpec) -> Result<LoopRef> {
        let id = id.into();
        if id.is_empty() {
            return Err(EngineError::InvalidIdentifier);
        }
        spec.schedule.validate()?;

        let mut registry = self.inner.registry.lock().await;
        registry.ensure_active()?;
        registry.reap();

        let live = registry
            .loops
            .get(&id)
            .is_some_and(|handle| handle.state().is_live());
        if live && self.inner.config.duplicate_policy == DuplicatePolicy::Reject {
            return Err(EngineError::DuplicateIdentifier(id));
        }
        // A live loop is replaced here; a stopped one may still have a task winding down
        if let Some(old) = registry.loops.remove(&id) {
            let retired = self.retire(old, StopReason::Replaced);
            registry.retiring.push(retired);
        }

        self.inner.bus.publish(LoopEvent::registered(&id));
        let handle = self.spawn(&id, spec);
        let loop_ref = handle.observe();
        registry.loops.insert(id, handle);

        Ok(loop_ref)
    }

    /// Stop the loop registered under `id`
    ///
    /// Returns `Ok(false)` when no live loop holds `id`. Does not wait for an
    /// in-flight execution; its task is joined by `dispose()`.
    pub async fn stop(&self, id: &str) -> Result<bool> {
        let mut registry = self.inner.registry.lock().await;
        registry.ensure_active()?;
        registry.reap();

        let Some(handle) = registry.loops.remove(id) else {
            return Ok(false);
        };
        let was_live = handle.state().is_live();
        let retired = self.retire(handle, StopReason::Requested);
        registry.retiring.push(retired);

        Ok(was_live)
    }

    /// Stop every loop and move the engine to `Disposed`
    ///
    /// Waits for each loop's task to exit, up to the configured grace period in
    /// total. Tasks still running after that are aborted and detached; each one is
    /// reported with a `CancellationTimeout` event. Later calls wait for the first
    /// disposal to finish and return a report with `first == false`.
    pub async fn dispose(&self) -> DisposeReport {
        let (retired, stopped, _done) = {
            let mut registry = self.inner.registry.lock().await;
            if registry.state == EngineState::Disposed {
                drop(registry);
                self.inner.disposal_done.cancelled().await;
                return DisposeReport::default();
            }
            registry.state = EngineState::Disposed;
            let done = self.inner.disposal_done.clone().drop_guard();

            let mut stopped = 0;
            let mut retired: Vec<Retired> = Vec::with_capacity(registry.loops.len());
            for (_, handle) in registry.loops.drain() {
                if handle.mark_stopped() {
                    stopped += 1;
                    self.inner
                        .bus
                        .publish(LoopEvent::stopped(handle.id(), StopReason::Disposed));
                }
                retired.push(handle.into_join());
            }
            retired.append(&mut registry.retiring);
            (retired, stopped, done)
        };

        self.inner.root.cancel();
        let detached = self.join_with_grace(retired).await;

        self.inner
            .bus
            .publish(LoopEvent::disposed(stopped, detached.len()));

        DisposeReport {
            first: true,
            stopped,
            detached,
        }
    }

    pub async fn state(&self) -> EngineState {
        self.inner.registry.lock().await.state
    }

    pub async fn is_disposed(&self) -> bool {
        self.state().await == EngineState::Disposed
    }

    /// State of the loop under `id`, if the engine still tracks one
    pub async fn loop_state(&self, id: &str) -> Option<LoopState> {
        let registry = self.inner.registry.lock().await;
        registry.loops.get(id).map(|handle| handle.state())
    }

    /// Identifiers of live loops, sorted
    pub async fn loop_ids(&self) -> Vec<String> {
        let registry = self.inner.registry.lock().await;
        let mut ids: Vec<String> = registry
            .loops
            .iter()
            .filter(|(_, handle)| handle.state().is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live loops
    pub async fn len(&self) -> usize {
        let registry = self.inner.registry.lock().await;
        registry
            .loops
            .values()
            .filter(|handle| handle.state().is_live())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Describe every tracked loop, sorted by identifier
    pub async fn snapshot(&self) -> Vec<LoopInfo> {
        let registry = self.inner.registry.lock().await;
        let mut infos: Vec<LoopInfo> = registry
            .loops
            .values()
            .map(|handle| LoopInfo {
                id: handle.id().to_string(),
                state: handle.state(),
                period_ms: handle.schedule().period().map(|p| p.as_millis() as u64),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    fn spawn(&self, id: &str, spec: LoopSpec) -> LoopHandle {
        let id: Arc<str> = Arc::from(id);
        let token = self.inner.root.child_token();
        let (state, _) = watch::channel(LoopState::Scheduled);
        let state = Arc::new(state);
        let schedule = spec.schedule;

        let runner = LoopRunner::new(
            id.clone(),
            spec,
            token.clone(),
            state.clone(),
            self.inner.bus.clone(),
        );
        let join = tokio::spawn(runner.run());

        LoopHandle::new(id, state, token, schedule, join)
    }

    /// Mark stopped, raise the stop signal, and keep only the task to join
    fn retire(&self, handle: LoopHandle, reason: StopReason) -> Retired {
        if handle.mark_stopped() {
            self.inner
                .bus
                .publish(LoopEvent::stopped(handle.id(), reason));
        }
        handle.cancel();
        handle.into_join()
    }

    /// Join tasks concurrently until a shared deadline; abort and return the stragglers
    async fn join_with_grace(&self, retired: Vec<Retired>) -> Vec<String> {
        let grace = self.inner.config.grace_period();
        let grace_ms = self.inner.config.grace_period_ms;
        let deadline = Instant::now() + grace;

        let outcomes = join_all(retired.into_iter().map(|(id, mut join)| async move {
            match time::timeout_at(deadline, &mut join).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    if e.is_panic() {
                        tracing::error!(loop_id = %id, error = ?e, "Loop task panicked");
                    }
                    None
                }
                Err(_) => {
                    join.abort();
                    self.inner
                        .bus
                        .publish(LoopEvent::cancellation_timeout(&id, grace_ms));
                    Some(id.to_string())
                }
            }
        }))
        .await;

        let mut detached: Vec<String> = outcomes.into_iter().flatten().collect();
        detached.sort_unstable();
        detached
    }
}
