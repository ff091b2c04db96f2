use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;

use crate::callback::DeliveryCallback;
use crate::config::{ProducerConfig, ProjectConfig};
use crate::record::LogItem;

/// Error reported by a producer client, either to a [`DeliveryCallback`]
/// or from `flush`/`close`.
#[derive(thiserror::Error, Debug)]
pub enum ProducerError {
    #[error("producer is closed")]
    Closed,

    #[error("delivery failed with code {code}: {message}")]
    Delivery { code: String, message: String },

    #[error("producer unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

/// Client that batches [`LogItem`]s and delivers them to the ingestion
/// service.
///
/// Implementations own all transport concerns (batching, retries, worker
/// pools, back-pressure). The appender shares one instance across every
/// thread that logs, so implementations must be thread-safe.
#[async_trait]
pub trait LogProducer: Send + Sync {
    /// Queue `items` for delivery and return without waiting.
    ///
    /// **Parameters**
    /// - `project`, `logstore`, `topic`, `source`: destination of the items.
    ///   `topic` may be empty; `source` is `None` when the producer should
    ///   pick its own.
    /// - `items`: records to deliver.
    /// - `callback`: must be completed exactly once, on success or failure,
    ///   including when the producer rejects the items outright.
    fn send(
        &self,
        project: &str,
        logstore: &str,
        topic: &str,
        source: Option<&str>,
        items: Arc<[LogItem]>,
        callback: DeliveryCallback,
    );

    /// Wait until every queued item was delivered or retried to exhaustion.
    async fn flush(&self) -> Result<(), ProducerError>;

    /// Release threads, connections and buffers. Called after [`flush`].
    ///
    /// [`flush`]: LogProducer::flush
    async fn close(&self) -> Result<(), ProducerError>;
}

/// Creates the producer client when the appender starts.
pub trait ProducerFactory: Send + Sync {
    fn create(
        &self,
        project: ProjectConfig,
        producer: ProducerConfig,
    ) -> Result<Arc<dyn LogProducer>, ProducerError>;
}
