use std::sync::Arc;

use async_trait::async_trait;

use crate::client::RemoteLogClient;
use crate::config::{StrategyKind, StrategyOptions};
use crate::error::ConfigError;
use crate::hooks::ExitHooks;
use crate::inline::InlineStrategy;
use crate::models::{Destination, LogEvent};
use crate::queue::WorkerQueueStrategy;

/// How log events get from a log call to the remote service.
///
/// Neither method fails: delivery problems go to the strategy's error
/// handler so a log call can never break its caller.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    async fn submit(&self, event: LogEvent, destination: Destination);

    /// Delivers anything still buffered. Safe to call more than once.
    async fn shutdown(&self);
}

/// Builds a strategy and registers its shutdown with `hooks`.
pub fn build_strategy(
    kind: StrategyKind,
    client: Arc<dyn RemoteLogClient>,
    options: StrategyOptions,
    hooks: &ExitHooks,
) -> Result<Arc<dyn DeliveryStrategy>, ConfigError> {
    let strategy: Arc<dyn DeliveryStrategy> = match kind {
        StrategyKind::Inline => Arc::new(InlineStrategy::new(client, options)),
        StrategyKind::Worker => Arc::new(WorkerQueueStrategy::new(client, options)?),
    };
    hooks.register(Arc::clone(&strategy));
    Ok(strategy)
}
