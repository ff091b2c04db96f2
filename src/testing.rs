//! In-memory producer for tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::callback::DeliveryCallback;
use crate::config::{ProducerConfig, ProjectConfig};
use crate::producer::{LogProducer, ProducerError, ProducerFactory};
use crate::record::LogItem;

/// One `send` call as seen by [`RecordingProducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentBatch {
    pub project: String,
    pub logstore: String,
    pub topic: String,
    pub source: Option<String>,
    pub items: Vec<LogItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Send,
    Flush,
    Close,
}

#[derive(Default)]
struct State {
    sent: Vec<SentBatch>,
    calls: Vec<Call>,
    created: Vec<(ProjectConfig, ProducerConfig)>,
    failure: Option<(String, String)>,
    flush_failure: Option<String>,
}

/// Producer that records every call and completes callbacks immediately
/// on the sending thread.
///
/// Completing inline keeps tests deterministic. Real clients complete
/// callbacks from their own I/O threads, never from `send`.
///
/// Clones share their records, and the factory hands out clones, so a test
/// keeps one handle and inspects whatever the appender did with the others.
#[derive(Clone, Default)]
pub struct RecordingProducer {
    state: Arc<Mutex<State>>,
}

impl RecordingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete every callback with [`ProducerError::Delivery`].
    pub fn failing(code: impl Into<String>, message: impl Into<String>) -> Self {
        let producer = Self::default();
        producer.state().failure = Some((code.into(), message.into()));
        producer
    }

    /// Make every `flush` fail with [`ProducerError::Unavailable`].
    pub fn failing_flush(message: impl Into<String>) -> Self {
        let producer = Self::default();
        producer.state().flush_failure = Some(message.into());
        producer
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sent(&self) -> Vec<SentBatch> {
        self.state().sent.clone()
    }

    /// All sent items, flattened in send order.
    pub fn items(&self) -> Vec<LogItem> {
        self.state()
            .sent
            .iter()
            .flat_map(|batch| batch.items.iter().cloned())
            .collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Configurations passed to the factory, one per created producer.
    pub fn created(&self) -> Vec<(ProjectConfig, ProducerConfig)> {
        self.state().created.clone()
    }
}

#[async_trait]
impl LogProducer for RecordingProducer {
    fn send(
        &self,
        project: &str,
        logstore: &str,
        topic: &str,
        source: Option<&str>,
        items: Arc<[LogItem]>,
        callback: DeliveryCallback,
    ) {
        let failure = {
            let mut state = self.state();
            state.calls.push(Call::Send);
            state.sent.push(SentBatch {
                project: project.to_string(),
                logstore: logstore.to_string(),
                topic: topic.to_string(),
                source: source.map(str::to_string),
                items: items.to_vec(),
            });
            state.failure.clone()
        };
        let result = match failure {
            Some((code, message)) => Err(ProducerError::Delivery { code, message }),
            None => Ok(()),
        };
        callback.on_completion(result);
    }

    async fn flush(&self) -> Result<(), ProducerError> {
        let failure = {
            let mut state = self.state();
            state.calls.push(Call::Flush);
            state.flush_failure.clone()
        };
        match failure {
            Some(message) => Err(ProducerError::Unavailable(message)),
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), ProducerError> {
        self.state().calls.push(Call::Close);
        Ok(())
    }
}

impl ProducerFactory for RecordingProducer {
    fn create(
        &self,
        project: ProjectConfig,
        producer: ProducerConfig,
    ) -> Result<Arc<dyn LogProducer>, ProducerError> {
        self.state().created.push((project, producer));
        Ok(Arc::new(self.clone()))
    }
}
