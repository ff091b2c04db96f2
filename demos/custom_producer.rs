use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_loghub_appender::init::init_tracing;
use tracing_loghub_appender::{
    env, AppenderConfig, DeliveryCallback, LogItem, LogProducer, LoghubAppender, ProducerConfig,
    ProducerError, ProducerFactory, ProjectConfig,
};

/// Example of plugging in a producer client by implementing `LogProducer`
/// directly. Imagine this wraps the vendor SDK that batches and ships items.
struct PrintingProducer {
    user_agent: String,
}

#[async_trait]
impl LogProducer for PrintingProducer {
    fn send(
        &self,
        project: &str,
        logstore: &str,
        topic: &str,
        _source: Option<&str>,
        items: Arc<[LogItem]>,
        callback: DeliveryCallback,
    ) {
        // A real client would queue here and complete the callback later.
        println!("[{}] {project}/{logstore}#{topic}: {:?}", self.user_agent, items);
        callback.on_completion(Ok(()));
    }

    async fn flush(&self) -> Result<(), ProducerError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ProducerError> {
        Ok(())
    }
}

struct PrintingFactory;

impl ProducerFactory for PrintingFactory {
    fn create(
        &self,
        project: ProjectConfig,
        producer: ProducerConfig,
    ) -> Result<Arc<dyn LogProducer>, ProducerError> {
        println!("connecting to {} as {:?}", project.endpoint, project);
        Ok(Arc::new(PrintingProducer {
            user_agent: producer.user_agent,
        }))
    }
}

#[tokio::main]
async fn main() {
    // Example: LOGHUB_PROJECT_NAME=demo LOGHUB_LOGSTORE=app LOGHUB_ENDPOINT=... \
    //          LOGHUB_ACCESS_KEY_ID=... LOGHUB_ACCESS_KEY=... cargo run --example custom_producer
    let config = AppenderConfig::from_attributes(&env::attributes_from_env())
        .expect("invalid LOGHUB_* configuration");
    let appender = Arc::new(LoghubAppender::new(config, Arc::new(PrintingFactory)));
    appender.start().await.expect("start appender");

    init_tracing(Arc::clone(&appender)).expect("install subscriber");

    info!("custom producer example started");
    error!(db = "orders", "simulated error sent via custom producer");

    appender.stop().await.expect("stop appender");
}
