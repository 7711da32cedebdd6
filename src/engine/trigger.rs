//! Out-of-band rebuild trigger: a periodic timer plus a manual handle.
//!
//! Dispatches are fire-and-forget; failures are logged, never surfaced
//! to mutation callers. The rebuilt artifact only becomes visible through
//! the cache's wholesale refetch path.

use std::thread;
use std::time::Duration;

use crossbeam::channel::{tick, unbounded, Sender};
use serde::Serialize;
use thiserror::Error;

/// Payload sent to the external build system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildDispatch {
    pub repository: String,
    pub incremental: bool,
}

#[derive(Error, Debug)]
#[error("rebuild dispatch failed: {0}")]
pub struct DispatchError(pub String);

/// Client of the external build system.
pub trait BuildDispatcher: Send + 'static {
    fn dispatch(&self, request: &BuildDispatch) -> Result<(), DispatchError>;
}

/// Manual trigger, cloneable and safe to hand to request handlers.
#[derive(Clone)]
pub struct TriggerHandle {
    tx: Sender<()>,
}

impl TriggerHandle {
    /// Request a full rebuild now. Returns false after shutdown.
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

pub struct RebuildScheduler {
    handle: TriggerHandle,
    shutdown_tx: Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RebuildScheduler {
    pub fn spawn<D: BuildDispatcher>(
        dispatcher: D,
        repository: String,
        interval: Duration,
    ) -> Self {
        let (trigger_tx, trigger_rx) = unbounded::<()>();
        let (shutdown_tx, shutdown_rx) = unbounded::<()>();
        let ticker = tick(interval);

        let thread = thread::spawn(move || loop {
            crossbeam::select! {
                recv(ticker) -> _ => dispatch_once(&dispatcher, &repository),
                recv(trigger_rx) -> msg => match msg {
                    Ok(()) => dispatch_once(&dispatcher, &repository),
                    Err(_) => break,
                },
                recv(shutdown_rx) -> _ => break,
            }
        });

        Self {
            handle: TriggerHandle { tx: trigger_tx },
            shutdown_tx,
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> TriggerHandle {
        self.handle.clone()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RebuildScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch_once<D: BuildDispatcher>(dispatcher: &D, repository: &str) {
    let request = BuildDispatch {
        repository: repository.to_string(),
        incremental: false,
    };
    tracing::info!(repository, "trigger computation of compiled data");
    if let Err(e) = dispatcher.dispatch(&request) {
        tracing::warn!("rebuild dispatch failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct RecordingDispatcher {
        requests: Arc<Mutex<Vec<BuildDispatch>>>,
    }

    impl BuildDispatcher for RecordingDispatcher {
        fn dispatch(&self, request: &BuildDispatch) -> Result<(), DispatchError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn wait_for<F: Fn() -> bool>(cond: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn manual_trigger_dispatches_full_rebuild() {
        let dispatcher = RecordingDispatcher::default();
        let requests = Arc::clone(&dispatcher.requests);
        let scheduler = RebuildScheduler::spawn(
            dispatcher,
            "etalab/sill-data".to_string(),
            Duration::from_secs(3600),
        );

        assert!(scheduler.handle().trigger());
        wait_for(|| !requests.lock().unwrap().is_empty());

        let seen = requests.lock().unwrap().clone();
        assert_eq!(
            seen[0],
            BuildDispatch {
                repository: "etalab/sill-data".to_string(),
                incremental: false,
            }
        );
        scheduler.shutdown();
    }

    #[test]
    fn periodic_tick_dispatches_without_manual_trigger() {
        let dispatcher = RecordingDispatcher::default();
        let requests = Arc::clone(&dispatcher.requests);
        let scheduler = RebuildScheduler::spawn(
            dispatcher,
            "etalab/sill-data".to_string(),
            Duration::from_millis(20),
        );

        wait_for(|| requests.lock().unwrap().len() >= 2);
        scheduler.shutdown();
    }

    #[test]
    fn dispatch_payload_serializes_as_the_wire_event() {
        let request = BuildDispatch {
            repository: "etalab/sill-data".to_string(),
            incremental: false,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"repository": "etalab/sill-data", "incremental": false})
        );
    }

    #[test]
    fn trigger_after_shutdown_reports_failure() {
        let dispatcher = RecordingDispatcher::default();
        let scheduler = RebuildScheduler::spawn(
            dispatcher,
            "etalab/sill-data".to_string(),
            Duration::from_secs(3600),
        );
        let handle = scheduler.handle();
        scheduler.shutdown();
        assert!(!handle.trigger());
    }
}
