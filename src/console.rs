use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::callback::DeliveryCallback;
use crate::config::{ProducerConfig, ProjectConfig};
use crate::producer::{LogProducer, ProducerError, ProducerFactory};
use crate::record::{LogContent, LogItem};

enum Command {
    Send {
        destination: Destination,
        items: Arc<[LogItem]>,
        callback: DeliveryCallback,
    },
    Flush(oneshot::Sender<Result<(), ProducerError>>),
}

struct Destination {
    project: String,
    logstore: String,
    topic: String,
    source: Option<String>,
}

#[derive(Serialize)]
struct ConsoleLine<'a> {
    project: &'a str,
    logstore: &'a str,
    topic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    time: i64,
    contents: &'a [LogContent],
}

/// Producer that prints every item as one JSON line.
///
/// Lines are written by a background Tokio task which also completes the
/// delivery callbacks, so logging threads never touch the writer. Meant for
/// local development where no ingestion endpoint is reachable.
///
/// The queue is unbounded and the task writes with blocking `std::io::Write`
/// calls on a runtime worker. Neither holds up under sustained volume or a
/// slow writer; use a real client outside development.
pub struct ConsoleProducer {
    sender: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    worker: Mutex<Option<JoinHandle<Result<(), ProducerError>>>>,
}

impl ConsoleProducer {
    /// Spawn the writer task on the current Tokio runtime, printing to stdout.
    pub fn spawn() -> Result<Self, ProducerError> {
        Self::spawn_with_writer(std::io::stdout())
    }

    /// Spawn the writer task with a custom destination.
    pub fn spawn_with_writer<W>(writer: W) -> Result<Self, ProducerError>
    where
        W: Write + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| ProducerError::Unavailable(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = handle.spawn(run(rx, writer));
        Ok(ConsoleProducer {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Command>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run<W: Write>(
    mut rx: mpsc::UnboundedReceiver<Command>,
    mut writer: W,
) -> Result<(), ProducerError> {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Send {
                destination,
                items,
                callback,
            } => {
                let result = write_items(&mut writer, &destination, &items);
                callback.on_completion(result);
            }
            Command::Flush(done) => {
                let _ = done.send(flush_writer(&mut writer));
            }
        }
    }
    flush_writer(&mut writer)
}

fn flush_writer<W: Write>(writer: &mut W) -> Result<(), ProducerError> {
    writer.flush().map_err(|e| ProducerError::Other(Box::new(e)))
}

fn write_items<W: Write>(
    writer: &mut W,
    destination: &Destination,
    items: &[LogItem],
) -> Result<(), ProducerError> {
    for item in items {
        let line = ConsoleLine {
            project: &destination.project,
            logstore: &destination.logstore,
            topic: &destination.topic,
            source: destination.source.as_deref(),
            time: item.time(),
            contents: item.contents(),
        };
        let mut bytes = serde_json::to_vec(&line).map_err(|e| ProducerError::Other(Box::new(e)))?;
        bytes.push(b'\n');
        writer
            .write_all(&bytes)
            .map_err(|e| ProducerError::Other(Box::new(e)))?;
    }
    Ok(())
}

#[async_trait]
impl LogProducer for ConsoleProducer {
    fn send(
        &self,
        project: &str,
        logstore: &str,
        topic: &str,
        source: Option<&str>,
        items: Arc<[LogItem]>,
        callback: DeliveryCallback,
    ) {
        let command = Command::Send {
            destination: Destination {
                project: project.to_string(),
                logstore: logstore.to_string(),
                topic: topic.to_string(),
                source: source.map(str::to_string),
            },
            items,
            callback,
        };
        let rejected = match self.sender().as_ref() {
            Some(tx) => tx.send(command).err().map(|e| e.0),
            None => Some(command),
        };
        if let Some(Command::Send { callback, .. }) = rejected {
            callback.on_completion(Err(ProducerError::Closed));
        }
    }

    async fn flush(&self) -> Result<(), ProducerError> {
        let (done_tx, done_rx) = oneshot::channel();
        let queued = match self.sender().as_ref() {
            Some(tx) => tx.send(Command::Flush(done_tx)).is_ok(),
            None => false,
        };
        if !queued {
            return Err(ProducerError::Closed);
        }
        done_rx.await.map_err(|_| ProducerError::Closed)?
    }

    async fn close(&self) -> Result<(), ProducerError> {
        drop(self.sender().take());
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| ProducerError::Unavailable(e.to_string()))??;
        }
        Ok(())
    }
}

/// Creates a [`ConsoleProducer`] writing to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleProducerFactory;

impl ProducerFactory for ConsoleProducerFactory {
    fn create(
        &self,
        _project: ProjectConfig,
        _producer: ProducerConfig,
    ) -> Result<Arc<dyn LogProducer>, ProducerError> {
        Ok(Arc::new(ConsoleProducer::spawn()?))
    }
}
