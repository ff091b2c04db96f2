use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::callback::DeliveryCallback;
use crate::config::{AppenderAttributes, AppenderConfig, ConfigError};
use crate::event::{LogEvent, UNKNOWN_LOCATION};
use crate::layout::Layout;
use crate::producer::{LogProducer, ProducerError, ProducerFactory};
use crate::record::LogItem;

/// Error returned by [`LoghubAppender`] lifecycle and append calls.
#[derive(thiserror::Error, Debug)]
pub enum AppenderError {
    #[error("appender {0} is not started")]
    NotStarted(String),

    #[error(transparent)]
    Producer(#[from] ProducerError),
}

/// Turns [`LogEvent`]s into [`LogItem`]s and submits them to a producer.
///
/// The appender owns exactly one producer between [`start`] and [`stop`].
/// `append` may be called from any thread and never waits for delivery.
///
/// [`start`]: LoghubAppender::start
/// [`stop`]: LoghubAppender::stop
pub struct LoghubAppender {
    config: AppenderConfig,
    factory: Arc<dyn ProducerFactory>,
    layout: Option<Arc<dyn Layout>>,
    producer: RwLock<Option<Arc<dyn LogProducer>>>,
}

impl LoghubAppender {
    pub fn new(config: AppenderConfig, factory: Arc<dyn ProducerFactory>) -> Self {
        LoghubAppender {
            config,
            factory,
            layout: None,
            producer: RwLock::new(None),
        }
    }

    /// Validate `attributes` and build an appender around `factory`.
    pub fn from_attributes(
        attributes: &AppenderAttributes,
        factory: Arc<dyn ProducerFactory>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(AppenderConfig::from_attributes(attributes)?, factory))
    }

    /// Attach a layout whose output is added to each item as `log`.
    pub fn with_layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Some(Arc::new(layout));
        self
    }

    pub fn config(&self) -> &AppenderConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<dyn LogProducer>> {
        self.producer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create the producer. A producer left over from an earlier start is
    /// flushed and closed after the new one is in place; failing to release
    /// it is logged and does not fail the start.
    pub async fn start(&self) -> Result<(), AppenderError> {
        let producer = self
            .factory
            .create(self.config.project.clone(), self.config.producer.clone())?;
        let previous = self
            .producer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(producer);
        debug!(appender = %self.config.name, project = %self.config.project.project_name, logstore = %self.config.logstore, "loghub appender started");

        if let Some(previous) = previous {
            debug!(appender = %self.config.name, "releasing producer from previous start");
            if let Err(error) = release(previous).await {
                warn!(appender = %self.config.name, %error, "failed to release previous producer");
            }
        }
        Ok(())
    }

    /// Flush and close the producer, if any. Safe to call before `start`.
    pub async fn stop(&self) -> Result<(), AppenderError> {
        let producer = self
            .producer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match producer {
            Some(producer) => {
                release(producer).await?;
                debug!(appender = %self.config.name, "loghub appender stopped");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Build one item from `event` and hand it to the producer.
    pub fn append(&self, event: &LogEvent) -> Result<(), AppenderError> {
        let producer = self
            .current()
            .ok_or_else(|| AppenderError::NotStarted(self.config.name.clone()))?;

        let items: Arc<[LogItem]> = Arc::from(vec![self.to_log_item(event)]);
        let callback = DeliveryCallback::for_config(&self.config, Arc::clone(&items));
        producer.send(
            &self.config.project.project_name,
            &self.config.logstore,
            &self.config.topic,
            self.config.source.as_deref(),
            items,
            callback,
        );
        Ok(())
    }

    /// The item `append` would submit for `event`.
    pub fn to_log_item(&self, event: &LogEvent) -> LogItem {
        let mut item = LogItem::new();
        item.set_time(event.timestamp.timestamp_millis().div_euclid(1000));
        item.push_back("time", self.config.time_formatter.format(&event.timestamp));
        item.push_back("level", event.level.as_str());
        item.push_back("thread", event.thread_name.as_str());

        // Events created without location capture are read once with it
        // forced on; the event itself is left untouched.
        let location = match event.location(event.include_location) {
            Some(location) => Some(location),
            None if !event.include_location => event.location(true),
            None => None,
        };
        item.push_back(
            "location",
            location.unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
        );

        item.push_back("message", event.message.as_str());

        if let Some(thrown) = &event.thrown {
            item.push_back("throwable", thrown.render());
        }

        if let Some(layout) = &self.layout {
            item.push_back("log", String::from_utf8_lossy(&layout.format(event)).into_owned());
        }

        for (key, value) in &event.context {
            item.push_back(key.as_str(), value.as_str());
        }
        item
    }
}

async fn release(producer: Arc<dyn LogProducer>) -> Result<(), ProducerError> {
    let flushed = producer.flush().await;
    producer.close().await?;
    flushed
}
