//! Owner hook: binding an engine's lifetime to the controller that owns it
//!
//! A controller embeds a [`LoopEngine`] (or a [`LazyLoopEngine`]) as a plain field
//! and implements [`LoopOwner`]. Teardown is two-phase: [`LoopOwner::close`]
//! disposes the engine first, then runs the owner's own [`LoopOwner::on_close`].

use std::sync::OnceLock;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::engine::{DisposeReport, LoopEngine};

#[async_trait]
pub trait LoopOwner: Send + Sync {
    fn loop_engine(&self) -> &LoopEngine;

    /// The owner's own teardown. Runs after every loop has stopped, exactly once.
    async fn on_close(&self) {}

    /// Dispose the engine, then run `on_close` if this call did the disposal
    async fn close(&self) -> DisposeReport {
        let report = self.loop_engine().dispose().await;
        if report.first {
            self.on_close().await;
        }
        report
    }
}

/// An engine created on first use
///
/// Closing an owner whose lazy engine was never touched creates the engine and
/// disposes it straight away, so any registration attempted afterwards still
/// fails with `AlreadyDisposed`.
#[derive(Debug, Default)]
pub struct LazyLoopEngine {
    config: EngineConfig,
    cell: OnceLock<LoopEngine>,
}

impl LazyLoopEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cell: OnceLock::new(),
        }
    }

    pub fn get(&self) -> &LoopEngine {
        self.cell
            .get_or_init(|| LoopEngine::new(self.config.clone()))
    }

    pub fn is_created(&self) -> bool {
        self.cell.get().is_some()
    }
}
