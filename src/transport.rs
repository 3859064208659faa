//! Turns log records into [`LogEvent`]s and hands them to a delivery strategy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::Level;
use serde_json::{Map, Value};

use crate::models::{Destination, LogEvent};
use crate::strategy::DeliveryStrategy;

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub fields: Map<String, Value>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            level,
            message: message.into(),
            fields: Map::new(),
            timestamp: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

type ResolveFn = dyn Fn(&LogRecord) -> Destination + Send + Sync;

#[derive(Clone)]
pub enum DestinationResolver {
    Static(Destination),
    Computed(Arc<ResolveFn>),
}

impl DestinationResolver {
    pub fn computed<F>(resolve: F) -> Self
    where
        F: Fn(&LogRecord) -> Destination + Send + Sync + 'static,
    {
        DestinationResolver::Computed(Arc::new(resolve))
    }

    pub fn resolve(&self, record: &LogRecord) -> Destination {
        match self {
            DestinationResolver::Static(destination) => destination.clone(),
            DestinationResolver::Computed(resolve) => resolve(record),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    /// `LEVEL message {"field":...}`
    #[default]
    Text,
    /// `{"level":...,"message":...,"field":...}`
    Json,
}

impl MessageFormat {
    pub fn render(&self, record: &LogRecord) -> String {
        match self {
            MessageFormat::Text if record.fields.is_empty() => {
                format!("{} {}", record.level, record.message)
            }
            MessageFormat::Text => format!(
                "{} {} {}",
                record.level,
                record.message,
                Value::Object(record.fields.clone())
            ),
            MessageFormat::Json => {
                let mut document = Map::new();
                document.insert("level".into(), Value::from(record.level.as_str()));
                document.insert("message".into(), Value::from(record.message.clone()));
                for (key, value) in &record.fields {
                    document
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                Value::Object(document).to_string()
            }
        }
    }
}

pub struct Transport {
    strategy: Arc<dyn DeliveryStrategy>,
    resolver: DestinationResolver,
    format: MessageFormat,
}

impl Transport {
    pub fn new(
        strategy: Arc<dyn DeliveryStrategy>,
        resolver: DestinationResolver,
        format: MessageFormat,
    ) -> Self {
        Transport {
            strategy,
            resolver,
            format,
        }
    }

    pub async fn log(&self, record: LogRecord) {
        let destination = self.resolver.resolve(&record);
        let timestamp = record.timestamp.unwrap_or_else(Utc::now);
        let event = LogEvent::new(timestamp.timestamp_millis(), self.format.render(&record));
        self.strategy.submit(event, destination).await;
    }

    pub async fn shutdown(&self) {
        self.strategy.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingStrategy {
        submitted: Mutex<Vec<(LogEvent, Destination)>>,
    }

    #[async_trait]
    impl DeliveryStrategy for CapturingStrategy {
        async fn submit(&self, event: LogEvent, destination: Destination) {
            self.submitted.lock().unwrap().push((event, destination));
        }

        async fn shutdown(&self) {}
    }

    #[test]
    fn text_format_appends_fields() {
        let record = LogRecord::new(Level::Warn, "disk low").with_field("free_mb", 12);
        assert_eq!(MessageFormat::Text.render(&record), r#"WARN disk low {"free_mb":12}"#);

        let bare = LogRecord::new(Level::Info, "started");
        assert_eq!(MessageFormat::Text.render(&bare), "INFO started");
    }

    #[test]
    fn json_format_keeps_level_and_message() {
        let record = LogRecord::new(Level::Error, "boom")
            .with_field("message", "shadowed")
            .with_field("code", 7);
        let rendered: Value = serde_json::from_str(&MessageFormat::Json.render(&record)).unwrap();
        assert_eq!(rendered["level"], "ERROR");
        assert_eq!(rendered["message"], "boom");
        assert_eq!(rendered["code"], 7);
    }

    #[tokio::test]
    async fn computed_destination_and_timestamp() {
        let strategy = Arc::new(CapturingStrategy::default());
        let resolver = DestinationResolver::computed(|record| {
            Destination::new("app", record.level.as_str().to_lowercase())
        });
        let transport = Transport::new(strategy.clone(), resolver, MessageFormat::Text);
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        transport.log(LogRecord::new(Level::Debug, "hello").at(at)).await;

        let submitted = strategy.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, LogEvent::new(1_700_000_000_000, "DEBUG hello"));
        assert_eq!(submitted[0].1, Destination::new("app", "debug"));
    }
}
