use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::timeout;

use crate::config::MAX_WAIT_TIME;
use crate::strategy::DeliveryStrategy;

/// Shutdown callbacks run when the host process is about to exit.
pub struct ExitHooks {
    budget: Duration,
    strategies: Mutex<Vec<Arc<dyn DeliveryStrategy>>>,
}

impl ExitHooks {
    /// `budget` bounds each registered shutdown.
    pub fn new(budget: Duration) -> Self {
        ExitHooks {
            budget,
            strategies: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, strategy: Arc<dyn DeliveryStrategy>) {
        self.lock().push(strategy);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shuts down every registered strategy. Hooks run at most once.
    pub async fn run(&self) {
        let strategies = std::mem::take(&mut *self.lock());
        debug!("Running {} exit hook(s)", strategies.len());
        for strategy in strategies {
            if timeout(self.budget, strategy.shutdown()).await.is_err() {
                warn!("Exit hook exceeded its {:?} budget", self.budget);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn DeliveryStrategy>>> {
        self.strategies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ExitHooks {
    fn default() -> Self {
        // leave the worker's own timeout room to fire first
        ExitHooks::new(MAX_WAIT_TIME + Duration::from_secs(1))
    }
}
