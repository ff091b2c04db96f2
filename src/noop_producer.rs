use std::sync::Arc;

use async_trait::async_trait;

use crate::callback::DeliveryCallback;
use crate::config::{ProducerConfig, ProjectConfig};
use crate::producer::{LogProducer, ProducerError, ProducerFactory};
use crate::record::LogItem;

/// A producer that accepts and drops every item.
///
/// Useful for measuring the overhead of the layer and appender without any
/// delivery, and for tests that don't care about what was sent. Callbacks
/// complete successfully on the sending thread, which only a producer with
/// no I/O can afford; real clients complete them from their own threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProducer;

#[async_trait]
impl LogProducer for NoopProducer {
    fn send(
        &self,
        _project: &str,
        _logstore: &str,
        _topic: &str,
        _source: Option<&str>,
        _items: Arc<[LogItem]>,
        callback: DeliveryCallback,
    ) {
        callback.on_completion(Ok(()));
    }

    async fn flush(&self) -> Result<(), ProducerError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ProducerError> {
        Ok(())
    }
}

impl ProducerFactory for NoopProducer {
    fn create(
        &self,
        _project: ProjectConfig,
        _producer: ProducerConfig,
    ) -> Result<Arc<dyn LogProducer>, ProducerError> {
        Ok(Arc::new(NoopProducer))
    }
}
