use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::error;
use parse_duration::parse;

use crate::error::{ConfigError, ErrorHandler};

/// PutLogEvents accepts at most this many events per call.
pub const MAX_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = MAX_BATCH_SIZE;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(6_000);
/// Upper bound on how long a worker shutdown may take before the worker is aborted.
pub const MAX_WAIT_TIME: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    /// One PutLogEvents call per event, on the caller's task.
    Inline,
    /// Buffer on a background worker and flush in batches.
    Worker,
}

/// Options shared by every delivery strategy. The batching fields only apply
/// to the worker strategy.
#[derive(Debug, Clone, Default)]
pub struct StrategyOptions {
    pub create_if_not_exists: bool,
    pub batch_size: Option<usize>,
    pub flush_interval: Option<Duration>,
    pub shutdown_timeout: Option<Duration>,
    /// `None` keeps per-destination buffers unbounded.
    pub max_buffered_events: Option<usize>,
    pub on_error: ErrorHandler,
}

impl StrategyOptions {
    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout.unwrap_or(MAX_WAIT_TIME)
    }

    /// Rejects out-of-range values rather than clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let batch_size = self.batch_size();
        if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(ConfigError::BatchSize(batch_size));
        }
        if self.flush_interval().is_zero() {
            return Err(ConfigError::FlushInterval);
        }
        if self.shutdown_timeout().is_zero() {
            return Err(ConfigError::ShutdownTimeout);
        }
        if self.max_buffered_events == Some(0) {
            return Err(ConfigError::BufferBound);
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "logship",
    version,
    about = "Ship lines from stdin to AWS CloudWatch Logs."
)]
pub struct AppConfig {
    #[arg(long, default_value = "us-east-1")]
    pub region: Option<String>,

    #[arg(long, default_value = "default")]
    pub profile: Option<String>,

    #[arg(long)]
    pub group: String,

    /// Defaults to one stream per UTC day (YYYY/MM/DD).
    #[arg(long)]
    pub stream: Option<String>,

    #[arg(long, value_enum, default_value = "worker")]
    pub strategy: StrategyKind,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(long, default_value = "6s")]
    pub flush_interval: String,

    #[arg(long)]
    pub create_if_not_exists: bool,

    /// Render each line as a JSON document instead of plain text.
    #[arg(long)]
    pub json: bool,
}

impl AppConfig {
    pub fn get_flush_interval(&self) -> Duration {
        match parse(&self.flush_interval) {
            Ok(d) => d,
            Err(e) => {
                error!(
                    "Failed to parse flush interval '{}': {}",
                    &self.flush_interval, e
                );
                std::process::exit(1);
            }
        }
    }

    pub fn strategy_options(&self) -> StrategyOptions {
        StrategyOptions {
            create_if_not_exists: self.create_if_not_exists,
            batch_size: Some(self.batch_size),
            flush_interval: Some(self.get_flush_interval()),
            ..StrategyOptions::default()
        }
    }
}
