use std::fmt;
use std::sync::Arc;

use log::error;
use serde::{Deserialize, Serialize};

use crate::models::Destination;

/// Invalid strategy or client settings. The only error a constructor returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("batch size must be between 1 and 10000, got {0}")]
    BatchSize(usize),

    #[error("flush interval must be greater than zero")]
    FlushInterval,

    #[error("shutdown timeout must be greater than zero")]
    ShutdownTimeout,

    #[error("buffer bound must be at least 1")]
    BufferBound,

    #[error("unknown AWS region: {0}")]
    UnknownRegion(String),
}

/// Provisioning and delivery failures. These never reach the caller of
/// `submit`; they are handed to the configured [`ErrorHandler`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryError {
    #[error("failed to provision log group {group}: {message}")]
    GroupProvisioning { group: String, message: String },

    #[error("failed to provision log stream {destination}: {message}")]
    StreamProvisioning {
        destination: Destination,
        message: String,
    },

    #[error("failed to append {count} event(s) to {destination}: {message}")]
    Append {
        destination: Destination,
        count: usize,
        message: String,
    },

    #[error("buffer for {destination} is full, dropped {dropped} oldest event(s)")]
    Overflow {
        destination: Destination,
        dropped: usize,
    },

    #[error("delivery is shut down, dropped event for {destination}")]
    Closed { destination: Destination },
}

type Callback = dyn Fn(&DeliveryError) + Send + Sync;

#[derive(Clone)]
pub struct ErrorHandler(Arc<Callback>);

impl ErrorHandler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&DeliveryError) + Send + Sync + 'static,
    {
        ErrorHandler(Arc::new(callback))
    }

    pub fn report(&self, cause: &DeliveryError) {
        (self.0)(cause)
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        ErrorHandler::new(|cause| error!("{}", cause))
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler")
    }
}
