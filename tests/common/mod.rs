//! Recording mock of the remote log API shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use logship::{DeliveryError, Destination, ErrorHandler, LogEvent, RemoteLogClient, SendableError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeGroup(String),
    CreateGroup(String),
    DescribeStream(String, String),
    CreateStream(String, String),
    Append(Destination, Vec<LogEvent>),
}

/// Nothing exists remotely until it is created. Describe calls yield once so
/// concurrent callers interleave.
#[derive(Default)]
pub struct MockLogClient {
    calls: Mutex<Vec<Call>>,
    failing_groups: Mutex<HashSet<String>>,
    hang_appends: AtomicBool,
    fail_describes: AtomicBool,
    append_delay: Mutex<Option<Duration>>,
}

impl MockLogClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_appends_for(&self, group_name: &str) {
        self.failing_groups
            .lock()
            .unwrap()
            .insert(group_name.to_string());
    }

    pub fn hang_appends(&self) {
        self.hang_appends.store(true, Ordering::SeqCst);
    }

    pub fn fail_describes(&self) {
        self.fail_describes.store(true, Ordering::SeqCst);
    }

    pub fn delay_appends(&self, delay: Duration) {
        *self.append_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn appends(&self) -> Vec<(Destination, Vec<LogEvent>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Append(destination, events) => Some((destination, events)),
                _ => None,
            })
            .collect()
    }

    pub fn appended_messages(&self, destination: &Destination) -> Vec<String> {
        self.appends()
            .into_iter()
            .filter(|(d, _)| d == destination)
            .flat_map(|(_, events)| events.into_iter().map(|e| e.message))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn created(&self, wanted: &Call) -> bool {
        self.calls.lock().unwrap().iter().any(|call| call == wanted)
    }
}

#[async_trait]
impl RemoteLogClient for MockLogClient {
    async fn describe_group(&self, group_name: &str) -> Result<bool, SendableError> {
        self.record(Call::DescribeGroup(group_name.to_string()));
        tokio::task::yield_now().await;
        if self.fail_describes.load(Ordering::SeqCst) {
            return Err(format!("AccessDeniedException: {group_name}").into());
        }
        Ok(self.created(&Call::CreateGroup(group_name.to_string())))
    }

    async fn create_group(&self, group_name: &str) -> Result<(), SendableError> {
        self.record(Call::CreateGroup(group_name.to_string()));
        Ok(())
    }

    async fn describe_stream(
        &self,
        group_name: &str,
        stream_name: &str,
    ) -> Result<bool, SendableError> {
        self.record(Call::DescribeStream(
            group_name.to_string(),
            stream_name.to_string(),
        ));
        tokio::task::yield_now().await;
        if self.fail_describes.load(Ordering::SeqCst) {
            return Err(format!("AccessDeniedException: {group_name}/{stream_name}").into());
        }
        Ok(self.created(&Call::CreateStream(
            group_name.to_string(),
            stream_name.to_string(),
        )))
    }

    async fn create_stream(&self, group_name: &str, stream_name: &str) -> Result<(), SendableError> {
        self.record(Call::CreateStream(
            group_name.to_string(),
            stream_name.to_string(),
        ));
        Ok(())
    }

    async fn append_events(
        &self,
        group_name: &str,
        stream_name: &str,
        events: &[LogEvent],
    ) -> Result<(), SendableError> {
        if self.hang_appends.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *self.append_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(Call::Append(
            Destination::new(group_name, stream_name),
            events.to_vec(),
        ));
        if self.failing_groups.lock().unwrap().contains(group_name) {
            return Err(format!("ResourceNotFoundException: {group_name}").into());
        }
        Ok(())
    }
}

pub fn collecting_errors() -> (ErrorHandler, Arc<Mutex<Vec<DeliveryError>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = ErrorHandler::new(move |cause| sink.lock().unwrap().push(cause.clone()));
    (handler, seen)
}

pub fn event(message: &str) -> LogEvent {
    LogEvent::new(1_700_000_000_000, message)
}
