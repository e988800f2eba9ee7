//! `run --events`: stream engine events to stdout as JSON lines.

use log::warn;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use loopwarden::LoopEvent;

/// Print each event as one JSON line until the engine reports `Disposed`
///
/// The task resolves to the number of events printed.
pub fn spawn_event_printer(mut rx: broadcast::Receiver<LoopEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut printed = 0;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = matches!(event, LoopEvent::Disposed { .. });
                    match serde_json::to_string(&event) {
                        Ok(line) => {
                            println!("{}", line);
                            printed += 1;
                        }
                        Err(e) => warn!("Failed to serialize event: {}", e),
                    }
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        printed
    })
}

/// Wait for the printer to drain; a failed printer is logged, not fatal
pub async fn finish_printer(printer: JoinHandle<usize>) -> Option<usize> {
    match printer.await {
        Ok(printed) => Some(printed),
        Err(e) => {
            warn!("Event printer task failed: {}", e);
            None
        }
    }
}
