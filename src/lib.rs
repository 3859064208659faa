//! Ships log events to CloudWatch Logs, either one call per event or
//! batched on a background worker.

#[macro_use]
extern crate lazy_static;

pub mod aws;
pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod inline;
pub mod lines;
pub mod models;
pub mod provisioner;
pub mod queue;
pub mod strategy;
pub mod transport;
pub mod utilities;
pub mod worker;

pub use client::RemoteLogClient;
pub use config::{StrategyKind, StrategyOptions, MAX_WAIT_TIME};
pub use error::{ConfigError, DeliveryError, ErrorHandler};
pub use hooks::ExitHooks;
pub use inline::InlineStrategy;
pub use models::{Destination, LogEvent, SendableError, WorkerMessage};
pub use provisioner::ResourceProvisioner;
pub use queue::WorkerQueueStrategy;
pub use strategy::{build_strategy, DeliveryStrategy};
pub use transport::{DestinationResolver, LogRecord, MessageFormat, Transport};
