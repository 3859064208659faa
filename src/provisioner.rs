//! Lazily creates log groups and streams before their first write.
//!
//! Every group and every (group, stream) pair gets exactly one provisioning
//! attempt per provisioner. Concurrent callers for the same key wait on the
//! attempt already in flight instead of issuing their own describe/create
//! calls. Failed attempts are reported once and never retried.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::OnceCell;

use crate::client::RemoteLogClient;
use crate::error::{DeliveryError, ErrorHandler};
use crate::models::{Destination, SendableError};

type Attempt = Arc<OnceCell<Result<(), DeliveryError>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ProvisionKey {
    Group(String),
    Stream(Destination),
}

pub struct ResourceProvisioner {
    client: Arc<dyn RemoteLogClient>,
    on_error: ErrorHandler,
    attempts: Mutex<HashMap<ProvisionKey, Attempt>>,
}

impl ResourceProvisioner {
    pub fn new(client: Arc<dyn RemoteLogClient>, on_error: ErrorHandler) -> Self {
        ResourceProvisioner {
            client,
            on_error,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Makes sure the log group exists. Failures are reported through the
    /// error handler and also returned to every waiter.
    pub async fn ensure_group(&self, group_name: &str) -> Result<(), DeliveryError> {
        let attempt = self.attempt(ProvisionKey::Group(group_name.to_string()));
        attempt
            .get_or_init(|| async {
                let result = self.provision_group(group_name).await.map_err(|e| {
                    DeliveryError::GroupProvisioning {
                        group: group_name.to_string(),
                        message: e.to_string(),
                    }
                });
                self.finish(result)
            })
            .await
            .clone()
    }

    pub async fn ensure_stream(&self, destination: &Destination) -> Result<(), DeliveryError> {
        let attempt = self.attempt(ProvisionKey::Stream(destination.clone()));
        attempt
            .get_or_init(|| async {
                let result = self.provision_stream(destination).await.map_err(|e| {
                    DeliveryError::StreamProvisioning {
                        destination: destination.clone(),
                        message: e.to_string(),
                    }
                });
                self.finish(result)
            })
            .await
            .clone()
    }

    /// Group first, then stream. The stream is attempted even when the group fails.
    pub async fn ensure_destination(&self, destination: &Destination) {
        let _ = self.ensure_group(&destination.group_name).await;
        let _ = self.ensure_stream(destination).await;
    }

    fn attempt(&self, key: ProvisionKey) -> Attempt {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(attempts.entry(key).or_default())
    }

    fn finish(&self, result: Result<(), DeliveryError>) -> Result<(), DeliveryError> {
        if let Err(cause) = &result {
            self.on_error.report(cause);
        }
        result
    }

    async fn provision_group(&self, group_name: &str) -> Result<(), SendableError> {
        if !self.client.describe_group(group_name).await? {
            debug!("Log group {} not found, creating it", group_name);
            self.client.create_group(group_name).await?;
        }
        Ok(())
    }

    async fn provision_stream(&self, destination: &Destination) -> Result<(), SendableError> {
        let exists = self
            .client
            .describe_stream(&destination.group_name, &destination.stream_name)
            .await?;
        if !exists {
            debug!("Log stream {} not found, creating it", destination);
            self.client
                .create_stream(&destination.group_name, &destination.stream_name)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogEvent;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingClient {
        describes: AtomicUsize,
        creates: AtomicUsize,
        group_exists: bool,
        fail_describe: bool,
    }

    #[async_trait]
    impl RemoteLogClient for CountingClient {
        async fn describe_group(&self, _group_name: &str) -> Result<bool, SendableError> {
            self.describes.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_describe {
                return Err("access denied".into());
            }
            Ok(self.group_exists)
        }

        async fn create_group(&self, _group_name: &str) -> Result<(), SendableError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn describe_stream(&self, _: &str, _: &str) -> Result<bool, SendableError> {
            self.describes.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }

        async fn create_stream(&self, _: &str, _: &str) -> Result<(), SendableError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn append_events(&self, _: &str, _: &str, _: &[LogEvent]) -> Result<(), SendableError> {
            Ok(())
        }
    }

    fn collecting_handler() -> (ErrorHandler, Arc<Mutex<Vec<DeliveryError>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = ErrorHandler::new(move |cause| sink.lock().unwrap().push(cause.clone()));
        (handler, seen)
    }

    #[tokio::test]
    async fn existing_group_is_not_created() {
        let client = Arc::new(CountingClient {
            group_exists: true,
            ..Default::default()
        });
        let provisioner = ResourceProvisioner::new(client.clone(), ErrorHandler::default());

        provisioner.ensure_group("app").await.unwrap();
        provisioner.ensure_group("app").await.unwrap();

        assert_eq!(client.describes.load(Ordering::SeqCst), 1);
        assert_eq!(client.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_attempt() {
        let client = Arc::new(CountingClient::default());
        let provisioner = ResourceProvisioner::new(client.clone(), ErrorHandler::default());
        let destination = Destination::new("app", "web");

        tokio::join!(
            provisioner.ensure_destination(&destination),
            provisioner.ensure_destination(&destination),
            provisioner.ensure_destination(&destination),
        );

        // one describe and one create each for the group and the stream
        assert_eq!(client.describes.load(Ordering::SeqCst), 2);
        assert_eq!(client.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_reported_once_and_not_retried() {
        let client = Arc::new(CountingClient {
            fail_describe: true,
            ..Default::default()
        });
        let (handler, seen) = collecting_handler();
        let provisioner = ResourceProvisioner::new(client.clone(), handler);

        let first = provisioner.ensure_group("app").await;
        let second = provisioner.ensure_group("app").await;

        assert!(matches!(first, Err(DeliveryError::GroupProvisioning { .. })));
        assert_eq!(first, second);
        assert_eq!(client.describes.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
