use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::client::RemoteLogClient;
use crate::config::StrategyOptions;
use crate::error::{DeliveryError, ErrorHandler};
use crate::models::{Destination, LogEvent};
use crate::provisioner::ResourceProvisioner;
use crate::strategy::DeliveryStrategy;

/// Sends each event on the caller's task with its own PutLogEvents call.
/// Nothing is buffered, so every log call pays a network round trip.
pub struct InlineStrategy {
    client: Arc<dyn RemoteLogClient>,
    provisioner: ResourceProvisioner,
    create_if_not_exists: bool,
    on_error: ErrorHandler,
}

impl InlineStrategy {
    pub fn new(client: Arc<dyn RemoteLogClient>, options: StrategyOptions) -> Self {
        let provisioner = ResourceProvisioner::new(Arc::clone(&client), options.on_error.clone());
        InlineStrategy {
            client,
            provisioner,
            create_if_not_exists: options.create_if_not_exists,
            on_error: options.on_error,
        }
    }
}

#[async_trait]
impl DeliveryStrategy for InlineStrategy {
    async fn submit(&self, event: LogEvent, destination: Destination) {
        if self.create_if_not_exists {
            self.provisioner.ensure_destination(&destination).await;
        }

        let events = [event];
        if let Err(e) = self
            .client
            .append_events(&destination.group_name, &destination.stream_name, &events)
            .await
        {
            self.on_error.report(&DeliveryError::Append {
                destination,
                count: events.len(),
                message: e.to_string(),
            });
        }
    }

    async fn shutdown(&self) {
        debug!("Inline delivery has nothing buffered");
    }
}
