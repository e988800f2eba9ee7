//! Owner teardown integration tests

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use loopwarden::shutdown::close_on_shutdown;
use loopwarden::{
    EngineConfig, EngineError, LazyLoopEngine, LoopEngine, LoopOwner, LoopSpec, LoopState, Schedule,
};

/// Controller that records what it saw while tearing down
struct Poller {
    engine: LoopEngine,
    polls: Arc<AtomicU64>,
    journal: Mutex<Vec<String>>,
}

impl Poller {
    fn new() -> Self {
        Self {
            engine: LoopEngine::new(EngineConfig::default()),
            polls: Arc::new(AtomicU64::new(0)),
            journal: Mutex::new(Vec::new()),
        }
    }

    async fn start(&self, ids: &[&str]) {
        for id in ids {
            let polls = self.polls.clone();
            let spec = LoopSpec::from_fn(Schedule::every(Duration::from_millis(10)), move |_ctx| {
                let polls = polls.clone();
                async move {
                    polls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
            self.engine.register(*id, spec).await.unwrap();
        }
    }

    fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

#[async_trait]
impl LoopOwner for Poller {
    fn loop_engine(&self) -> &LoopEngine {
        &self.engine
    }

    async fn on_close(&self) {
        let disposed = self.engine.is_disposed().await;
        let live = self.engine.len().await;
        self.journal
            .lock()
            .unwrap()
            .push(format!("closed disposed={} live={}", disposed, live));
    }
}

/// Integration test: the engine is disposed before the owner's own teardown runs
#[tokio::test]
async fn test_close_disposes_engine_before_owner_teardown() {
    let poller = Poller::new();
    poller.start(&["alpha", "beta"]).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let report = poller.close().await;
    assert!(report.first);
    assert_eq!(report.stopped, 2);
    assert_eq!(poller.journal(), vec!["closed disposed=true live=0".to_string()]);

    let polls = poller.polls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(poller.polls.load(Ordering::SeqCst), polls);
}

/// Integration test: closing twice runs the owner's teardown once
#[tokio::test]
async fn test_concurrent_close_runs_teardown_once() {
    let poller = Poller::new();
    poller.start(&["alpha"]).await;

    let (a, b) = tokio::join!(poller.close(), poller.close());
    assert!(a.first ^ b.first);
    assert!(!poller.close().await.first);
    assert_eq!(poller.journal().len(), 1);

    let err = poller
        .engine
        .register(
            "late",
            LoopSpec::from_fn(Schedule::once(), |_ctx| async { Ok(()) }),
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadyDisposed);
}

/// Controller whose engine is only created when a loop is registered
struct LazyController {
    engine: LazyLoopEngine,
}

#[async_trait]
impl LoopOwner for LazyController {
    fn loop_engine(&self) -> &LoopEngine {
        self.engine.get()
    }
}

/// Integration test: a lazily created engine is still disposed on close
#[tokio::test]
async fn test_lazy_engine_disposed_on_close() {
    let controller = LazyController {
        engine: LazyLoopEngine::new(EngineConfig::default()),
    };
    assert!(!controller.engine.is_created());

    let tick = controller
        .loop_engine()
        .register(
            "tick",
            LoopSpec::from_fn(Schedule::every(Duration::from_millis(10)), |_ctx| async {
                Ok(())
            }),
        )
        .await
        .unwrap();
    assert!(controller.engine.is_created());

    let report = controller.close().await;
    assert_eq!(report.stopped, 1);
    assert_eq!(tick.state(), LoopState::Stopped);
}

/// Integration test: the time limit closes the owner without any signal
#[tokio::test]
async fn test_close_on_shutdown_time_limit() {
    let poller = Poller::new();
    poller.start(&["alpha"]).await;

    let report = close_on_shutdown(&poller, Some(Duration::from_millis(30)))
        .await
        .unwrap();
    assert!(report.first);
    assert_eq!(report.stopped, 1);
    assert!(poller.engine.is_disposed().await);
    assert_eq!(poller.journal().len(), 1);
}
