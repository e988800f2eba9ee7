//! Demo controller: owns an engine and registers one heartbeat loop per config entry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use loopwarden::config::{EngineConfig, HeartbeatConfig};
use loopwarden::{LoopContext, LoopEngine, LoopError, LoopOwner, LoopSpec, LoopWork, Schedule};

/// Logs a message on every beat, failing every `fail_every`-th beat when set
struct HeartbeatWork {
    message: String,
    fail_every: u64,
    beats: Arc<AtomicU64>,
}

#[async_trait]
impl LoopWork for HeartbeatWork {
    async fn run(&self, ctx: LoopContext) -> Result<(), LoopError> {
        if self.fail_every > 0 && ctx.tick() % self.fail_every == 0 {
            let message = format!("simulated failure on beat {}", ctx.tick());
            return Err(LoopError::fail(message));
        }
        self.beats.fetch_add(1, Ordering::SeqCst);
        info!("{}: {} (beat {})", ctx.loop_id(), self.message, ctx.tick());
        Ok(())
    }
}

pub struct HeartbeatController {
    engine: LoopEngine,
    beats: Arc<AtomicU64>,
}

impl HeartbeatController {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: LoopEngine::new(config),
            beats: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register one loop per heartbeat entry
    pub async fn start(&self, heartbeats: &[HeartbeatConfig]) -> loopwarden::Result<usize> {
        for hb in heartbeats {
            let schedule = Schedule::every(Duration::from_millis(hb.period_ms))
                .starting_after(Duration::from_millis(hb.initial_delay_ms));
            let work = HeartbeatWork {
                message: hb.message.clone(),
                fail_every: hb.fail_every,
                beats: self.beats.clone(),
            };
            self.engine
                .register(hb.id.clone(), LoopSpec::new(work, schedule))
                .await?;
        }
        Ok(heartbeats.len())
    }

    /// Successful beats across all loops
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoopOwner for HeartbeatController {
    fn loop_engine(&self) -> &LoopEngine {
        &self.engine
    }

    async fn on_close(&self) {
        info!("Heartbeat controller closed after {} beats", self.beats());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopwarden::EngineError;

    fn heartbeat(id: &str, period_ms: u64, fail_every: u64) -> HeartbeatConfig {
        HeartbeatConfig {
            id: id.to_string(),
            period_ms,
            fail_every,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_registers_every_heartbeat() {
        let controller = HeartbeatController::new(EngineConfig::default());
        let started = controller
            .start(&[heartbeat("a", 10, 0), heartbeat("b", 10, 0)])
            .await
            .unwrap();
        assert_eq!(started, 2);
        assert_eq!(
            controller.loop_engine().loop_ids().await,
            vec!["a".to_string(), "b".to_string()]
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = controller.close().await;
        assert_eq!(report.stopped, 2);
        assert!(controller.beats() >= 2);
    }

    #[tokio::test]
    async fn test_duplicate_heartbeat_ids_rejected() {
        let controller = HeartbeatController::new(EngineConfig::default());
        let err = controller
            .start(&[heartbeat("a", 10, 0), heartbeat("a", 20, 0)])
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::DuplicateIdentifier("a".to_string()));
        controller.close().await;
    }

    #[tokio::test]
    async fn test_failing_beats_do_not_count() {
        let controller = HeartbeatController::new(EngineConfig::default());
        controller.start(&[heartbeat("flaky", 5, 1)]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        controller.close().await;
        assert_eq!(controller.beats(), 0);
    }
}
