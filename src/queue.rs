use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::client::RemoteLogClient;
use crate::config::StrategyOptions;
use crate::error::{ConfigError, DeliveryError, ErrorHandler};
use crate::models::{Destination, LogEvent, WorkerMessage};
use crate::strategy::DeliveryStrategy;
use crate::worker::{relay_errors, BatchingWorker, WorkerSettings};

/// Forwards worker errors to the strategy's error handler until detached.
struct ErrorRelay {
    detach: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ErrorRelay {
    fn spawn(mut errors_rx: mpsc::UnboundedReceiver<WorkerMessage>, on_error: ErrorHandler) -> Self {
        let (detach, mut detached) = oneshot::channel();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    message = errors_rx.recv() => match message {
                        Some(message) => dispatch(&on_error, message),
                        None => break,
                    },
                    _ = &mut detached => {
                        // errors queued before the detach still reach the handler
                        errors_rx.close();
                        while let Ok(message) = errors_rx.try_recv() {
                            dispatch(&on_error, message);
                        }
                        break;
                    }
                }
            }
        });
        ErrorRelay { detach, task }
    }

    /// Dispatches everything already queued, then stops listening. Errors
    /// reported afterwards are only logged by the worker.
    async fn detach(self) {
        let _ = self.detach.send(());
        if let Err(e) = self.task.await {
            error!("Error relay failed: {}", e);
        }
    }
}

fn dispatch(on_error: &ErrorHandler, message: WorkerMessage) {
    match message {
        WorkerMessage::Error { cause } => on_error.report(&cause),
        other => warn!("Unexpected message from batching worker: {:?}", other),
    }
}

struct RunningWorker {
    tx: mpsc::UnboundedSender<WorkerMessage>,
    worker: JoinHandle<()>,
    relay: ErrorRelay,
}

enum WorkerState {
    NotStarted,
    Running(RunningWorker),
    /// Flips to `true` once the drain (or abort) has finished.
    Stopping(watch::Receiver<bool>),
    Stopped,
}

/// Hands events to a [`BatchingWorker`] task that batches and flushes them.
///
/// The worker is spawned on the first `submit`, so a strategy that never
/// logs never spawns anything. Submitting never waits on the network.
pub struct WorkerQueueStrategy {
    client: Arc<dyn RemoteLogClient>,
    settings: WorkerSettings,
    shutdown_timeout: Duration,
    on_error: ErrorHandler,
    state: Mutex<WorkerState>,
}

impl WorkerQueueStrategy {
    pub fn new(
        client: Arc<dyn RemoteLogClient>,
        options: StrategyOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        Ok(WorkerQueueStrategy {
            client,
            settings: WorkerSettings::from(&options),
            shutdown_timeout: options.shutdown_timeout(),
            on_error: options.on_error,
            state: Mutex::new(WorkerState::NotStarted),
        })
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, WorkerState::Running(_))
    }

    fn spawn_worker(&self) -> RunningWorker {
        let (tx, rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        let worker = BatchingWorker::new(
            Arc::clone(&self.client),
            self.settings,
            rx,
            relay_errors(errors_tx),
        );
        let worker = tokio::spawn(worker.run());
        let relay = ErrorRelay::spawn(errors_rx, self.on_error.clone());

        debug!("Spawned batching worker");
        RunningWorker { tx, worker, relay }
    }

    async fn stop_worker(&self, running: RunningWorker) {
        running.relay.detach().await;
        if running.tx.send(WorkerMessage::Stop).is_err() {
            debug!("Batching worker already exited");
        }

        let mut worker = running.worker;
        match timeout(self.shutdown_timeout, &mut worker).await {
            Ok(Ok(())) => debug!("Batching worker drained"),
            Ok(Err(e)) => error!("Batching worker failed: {}", e),
            Err(_) => {
                warn!(
                    "Batching worker did not stop within {:?}, aborting it",
                    self.shutdown_timeout
                );
                worker.abort();
            }
        }
    }
}

#[async_trait]
impl DeliveryStrategy for WorkerQueueStrategy {
    async fn submit(&self, event: LogEvent, destination: Destination) {
        let mut state = self.state.lock().await;
        if matches!(*state, WorkerState::NotStarted) {
            *state = WorkerState::Running(self.spawn_worker());
        }

        let WorkerState::Running(running) = &*state else {
            self.on_error.report(&DeliveryError::Closed { destination });
            return;
        };

        let message = WorkerMessage::Event {
            destination: destination.clone(),
            event,
        };
        if running.tx.send(message).is_err() {
            self.on_error.report(&DeliveryError::Closed { destination });
        }
    }

    /// Stops the worker after its final flush, or aborts it once the
    /// shutdown timeout has passed. Concurrent callers all return only after
    /// the worker is gone.
    async fn shutdown(&self) {
        let (running, done) = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, WorkerState::Stopped) {
                WorkerState::Running(running) => {
                    let (done, finished) = watch::channel(false);
                    *state = WorkerState::Stopping(finished);
                    (running, done)
                }
                WorkerState::Stopping(finished) => {
                    let mut waiter = finished.clone();
                    *state = WorkerState::Stopping(finished);
                    drop(state);
                    // a dropped sender also ends the wait
                    let _ = waiter.wait_for(|finished| *finished).await;
                    return;
                }
                WorkerState::NotStarted | WorkerState::Stopped => return,
            }
        };

        self.stop_worker(running).await;

        *self.state.lock().await = WorkerState::Stopped;
        let _ = done.send(true);
    }
}
