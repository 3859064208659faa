use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

pub type SendableError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp_millis: i64,
    pub message: String,
}

impl LogEvent {
    pub fn new(timestamp_millis: i64, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp_millis,
            message: message.into(),
        }
    }

    pub fn now(message: impl Into<String>) -> Self {
        Self::new(Utc::now().timestamp_millis(), message)
    }
}

/// The log group and stream an event is appended to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Destination {
    pub group_name: String,
    pub stream_name: String,
}

impl Destination {
    pub fn new(group_name: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Destination {
            group_name: group_name.into(),
            stream_name: stream_name.into(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_name, self.stream_name)
    }
}

/// Everything that crosses between a worker queue strategy and its batching
/// worker. Only owned, serializable data travels here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Event {
        destination: Destination,
        event: LogEvent,
    },
    Stop,
    Error {
        cause: DeliveryError,
    },
}
