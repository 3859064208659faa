//! Background half of the worker queue strategy.
//!
//! The worker owns its client, its provisioner and every per-destination
//! buffer. The only way in is a [`WorkerMessage`] channel and the only way
//! out is the error relay, so nothing it touches is shared with callers.
//!
//! ```text
//!   WorkerQueueStrategy ──Event/Stop──▶ BatchingWorker ──PutLogEvents──▶ remote
//!          ▲                                 │
//!          └──────────── Error ──────────────┘
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::client::RemoteLogClient;
use crate::config::StrategyOptions;
use crate::error::{DeliveryError, ErrorHandler};
use crate::models::{Destination, LogEvent, WorkerMessage};
use crate::provisioner::ResourceProvisioner;

/// PutLogEvents payload ceiling.
pub const MAX_BATCH_BYTES: usize = 1_048_576;
/// Bytes PutLogEvents charges per event on top of the message itself.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// The part of [`StrategyOptions`] the worker runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub create_if_not_exists: bool,
    pub max_buffered_events: Option<usize>,
}

impl From<&StrategyOptions> for WorkerSettings {
    fn from(options: &StrategyOptions) -> Self {
        WorkerSettings {
            batch_size: options.batch_size(),
            flush_interval: options.flush_interval(),
            create_if_not_exists: options.create_if_not_exists,
            max_buffered_events: options.max_buffered_events,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushMode {
    /// Timer tick: at most one batch per destination.
    OneBatch,
    /// Shutdown: everything buffered.
    Drain,
}

struct EventChannel {
    destination: Destination,
    buffered: VecDeque<LogEvent>,
}

impl EventChannel {
    fn new(destination: Destination) -> Self {
        EventChannel {
            destination,
            buffered: VecDeque::new(),
        }
    }
}

/// Returns an error handler that posts each error back to the caller side
/// as a [`WorkerMessage::Error`]. Once the caller stops listening, errors are
/// only logged.
pub fn relay_errors(tx: mpsc::UnboundedSender<WorkerMessage>) -> ErrorHandler {
    ErrorHandler::new(move |cause| {
        let message = WorkerMessage::Error {
            cause: cause.clone(),
        };
        if tx.send(message).is_err() {
            error!("{}", cause);
        }
    })
}

/// Removes the oldest events that fit in one PutLogEvents call.
///
/// A batch holds at most `batch_size` events and [`MAX_BATCH_BYTES`], except
/// that an oversize event is still sent alone.
pub fn take_batch(buffered: &mut VecDeque<LogEvent>, batch_size: usize) -> Vec<LogEvent> {
    let mut batch = Vec::new();
    let mut bytes = 0;
    while let Some(event) = buffered.front() {
        let size = event.message.len() + EVENT_OVERHEAD_BYTES;
        if batch.len() >= batch_size || (!batch.is_empty() && bytes + size > MAX_BATCH_BYTES) {
            break;
        }
        bytes += size;
        match buffered.pop_front() {
            Some(event) => batch.push(event),
            None => break,
        }
    }
    batch
}

pub struct BatchingWorker {
    client: Arc<dyn RemoteLogClient>,
    settings: WorkerSettings,
    provisioner: ResourceProvisioner,
    channels: BTreeMap<Destination, EventChannel>,
    errors: ErrorHandler,
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl BatchingWorker {
    pub fn new(
        client: Arc<dyn RemoteLogClient>,
        settings: WorkerSettings,
        rx: mpsc::UnboundedReceiver<WorkerMessage>,
        errors: ErrorHandler,
    ) -> Self {
        let provisioner = ResourceProvisioner::new(Arc::clone(&client), errors.clone());
        BatchingWorker {
            client,
            settings,
            provisioner,
            channels: BTreeMap::new(),
            errors,
            rx,
        }
    }

    /// Processes messages and sends one batch per destination on every tick
    /// until `Stop` arrives or every sender is gone, then drains everything.
    pub async fn run(mut self) {
        debug!(
            "Batching worker started (batch size {}, flush every {:?})",
            self.settings.batch_size, self.settings.flush_interval
        );

        let period = self.settings.flush_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(WorkerMessage::Event { destination, event }) => {
                        self.accept(destination, event).await;
                    }
                    Some(WorkerMessage::Stop) | None => break,
                    Some(WorkerMessage::Error { cause }) => {
                        warn!("Batching worker ignored an inbound error message: {}", cause);
                    }
                },
                _ = ticker.tick() => self.flush(FlushMode::OneBatch).await,
            }
        }

        self.flush(FlushMode::Drain).await;
        debug!("Batching worker stopped");
    }

    async fn accept(&mut self, destination: Destination, event: LogEvent) {
        if self.settings.create_if_not_exists {
            self.provisioner.ensure_destination(&destination).await;
        }

        let channel = self
            .channels
            .entry(destination.clone())
            .or_insert_with(|| EventChannel::new(destination));

        if let Some(limit) = self.settings.max_buffered_events {
            let mut dropped = 0;
            while channel.buffered.len() >= limit {
                channel.buffered.pop_front();
                dropped += 1;
            }
            if dropped > 0 {
                self.errors.report(&DeliveryError::Overflow {
                    destination: channel.destination.clone(),
                    dropped,
                });
            }
        }

        channel.buffered.push_back(event);
    }

    /// One append per batch. A failed batch is reported and dropped; it never
    /// holds up other batches or destinations.
    async fn flush(&mut self, mode: FlushMode) {
        for channel in self.channels.values_mut() {
            loop {
                let batch = take_batch(&mut channel.buffered, self.settings.batch_size);
                if batch.is_empty() {
                    break;
                }

                let destination = &channel.destination;
                match self
                    .client
                    .append_events(&destination.group_name, &destination.stream_name, &batch)
                    .await
                {
                    Ok(()) => debug!("Flushed {} event(s) to {}", batch.len(), destination),
                    Err(e) => self.errors.report(&DeliveryError::Append {
                        destination: destination.clone(),
                        count: batch.len(),
                        message: e.to_string(),
                    }),
                }

                if mode == FlushMode::OneBatch {
                    break;
                }
            }
        }
    }
}
