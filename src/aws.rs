use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_cloudwatchlogs::{types::InputLogEvent, Client};
use log::{debug, info};

use crate::client::RemoteLogClient;
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::models::{LogEvent, SendableError};

lazy_static! {
    static ref AWS_REGIONS: Vec<&'static str> = vec![
        "us-east-1", "us-east-2", "us-west-1", "us-west-2",
        "af-south-1", "ap-east-1", "ap-south-1", "ap-south-2",
        "ap-southeast-1", "ap-southeast-2", "ap-southeast-3",
        "ap-northeast-1", "ap-northeast-2", "ap-northeast-3",
        "ca-central-1", "eu-central-1", "eu-central-2",
        "eu-west-1", "eu-west-2", "eu-west-3", "eu-south-1",
        "eu-south-2", "eu-north-1", "me-central-1", "me-south-1",
        "sa-east-1",
    ];
}

fn find_region(input: &str) -> Option<&'static str> {
    AWS_REGIONS.iter().find(|&&region| region == input).copied()
}

pub async fn build_config(app_config: &AppConfig) -> Result<SdkConfig, SendableError> {
    let mut loader = aws_config::from_env();

    if let Some(profile_name) = app_config.profile.clone() {
        loader = loader.profile_name(profile_name);
    }

    if let Some(region_str) = &app_config.region {
        let selected_region = find_region(region_str.as_str())
            .ok_or_else(|| ConfigError::UnknownRegion(region_str.clone()))?;
        loader = loader.region(Region::new(selected_region));
    }

    let shared_config = loader.load().await;
    Ok(shared_config)
}

/// [`RemoteLogClient`] backed by the CloudWatch Logs SDK.
#[derive(Debug, Clone)]
pub struct CloudWatchLogsClient {
    client: Client,
}

impl CloudWatchLogsClient {
    pub fn new(config: &SdkConfig) -> Self {
        CloudWatchLogsClient {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl RemoteLogClient for CloudWatchLogsClient {
    async fn describe_group(&self, group_name: &str) -> Result<bool, SendableError> {
        // An exact name sorts first among its prefix matches, so one page is enough.
        let resp = self
            .client
            .describe_log_groups()
            .log_group_name_prefix(group_name)
            .send()
            .await?;

        let exists = resp
            .log_groups
            .unwrap_or_default()
            .iter()
            .any(|group| group.log_group_name.as_deref() == Some(group_name));
        Ok(exists)
    }

    async fn create_group(&self, group_name: &str) -> Result<(), SendableError> {
        match self
            .client
            .create_log_group()
            .log_group_name(group_name)
            .send()
            .await
        {
            Ok(_) => {
                info!("Created log group: {}", group_name);
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception()) =>
            {
                debug!("Log group {} was created concurrently", group_name);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn describe_stream(
        &self,
        group_name: &str,
        stream_name: &str,
    ) -> Result<bool, SendableError> {
        let resp = self
            .client
            .describe_log_streams()
            .log_group_name(group_name)
            .log_stream_name_prefix(stream_name)
            .send()
            .await?;

        let exists = resp
            .log_streams
            .unwrap_or_default()
            .iter()
            .any(|stream| stream.log_stream_name.as_deref() == Some(stream_name));
        Ok(exists)
    }

    async fn create_stream(&self, group_name: &str, stream_name: &str) -> Result<(), SendableError> {
        match self
            .client
            .create_log_stream()
            .log_group_name(group_name)
            .log_stream_name(stream_name)
            .send()
            .await
        {
            Ok(_) => {
                info!("Created log stream: {}/{}", group_name, stream_name);
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception()) =>
            {
                debug!(
                    "Log stream {}/{} was created concurrently",
                    group_name, stream_name
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn append_events(
        &self,
        group_name: &str,
        stream_name: &str,
        events: &[LogEvent],
    ) -> Result<(), SendableError> {
        let input = events
            .iter()
            .map(|event| {
                InputLogEvent::builder()
                    .timestamp(event.timestamp_millis)
                    .message(event.message.clone())
                    .build()
            })
            .collect::<Result<Vec<InputLogEvent>, _>>()?;

        let resp = self
            .client
            .put_log_events()
            .log_group_name(group_name)
            .log_stream_name(stream_name)
            .set_log_events(Some(input))
            .send()
            .await?;

        match resp.rejected_log_events_info.and_then(|info| {
            RejectedEvents::from_indices(
                events.len(),
                info.too_new_log_event_start_index,
                info.too_old_log_event_end_index,
                info.expired_log_event_end_index,
            )
        }) {
            Some(rejected) => Err(rejected.into()),
            None => Ok(()),
        }
    }
}

/// Events PutLogEvents accepted the call for but refused to store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("PutLogEvents rejected {count} event(s): {ranges}")]
pub struct RejectedEvents {
    pub count: usize,
    pub ranges: String,
}

impl RejectedEvents {
    /// Old and expired events form a prefix of the batch, too-new ones a suffix.
    pub fn from_indices(
        batch_len: usize,
        too_new_start: Option<i32>,
        too_old_end: Option<i32>,
        expired_end: Option<i32>,
    ) -> Option<Self> {
        let mut ranges = Vec::new();
        let mut rejected = vec![false; batch_len];
        let mut mark = |label: &str, start: usize, end: usize| {
            let end = end.min(batch_len);
            if start < end {
                ranges.push(format!("{label} {start}..{end}"));
                rejected[start..end].iter_mut().for_each(|r| *r = true);
            }
        };

        if let Some(end) = expired_end.and_then(|i| usize::try_from(i).ok()) {
            mark("expired", 0, end + 1);
        }
        if let Some(end) = too_old_end.and_then(|i| usize::try_from(i).ok()) {
            mark("too old", 0, end + 1);
        }
        if let Some(start) = too_new_start.and_then(|i| usize::try_from(i).ok()) {
            mark("too new", start, batch_len);
        }

        let count = rejected.iter().filter(|r| **r).count();
        (count > 0).then(|| RejectedEvents {
            count,
            ranges: ranges.join(", "),
        })
    }
}
