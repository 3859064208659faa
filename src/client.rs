use async_trait::async_trait;

use crate::models::{LogEvent, SendableError};

/// The slice of the remote log API that delivery needs.
#[async_trait]
pub trait RemoteLogClient: Send + Sync {
    /// Whether a group with exactly this name exists.
    async fn describe_group(&self, group_name: &str) -> Result<bool, SendableError>;

    async fn create_group(&self, group_name: &str) -> Result<(), SendableError>;

    /// Whether a stream with exactly this name exists in the group.
    async fn describe_stream(
        &self,
        group_name: &str,
        stream_name: &str,
    ) -> Result<bool, SendableError>;

    async fn create_stream(&self, group_name: &str, stream_name: &str) -> Result<(), SendableError>;

    /// Events arrive oldest first.
    async fn append_events(
        &self,
        group_name: &str,
        stream_name: &str,
        events: &[LogEvent],
    ) -> Result<(), SendableError>;
}
