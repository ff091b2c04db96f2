use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use tracing_loghub_appender::init::{init_tracing_with_config, LayerConfig};
use tracing_loghub_appender::{AppenderAttributes, LoghubAppender, NoopProducer};

#[tokio::main]
async fn main() {
    let attributes = AppenderAttributes::from_pairs([
        ("projectName", "load-test"),
        ("logstore", "load"),
        ("endpoint", "localhost"),
        ("accessKeyId", "id"),
        ("accessKey", "key"),
    ]);
    let appender = Arc::new(
        LoghubAppender::from_attributes(&attributes, Arc::new(NoopProducer))
            .expect("valid attributes"),
    );
    appender.start().await.expect("start appender");

    init_tracing_with_config(
        Arc::clone(&appender),
        LayerConfig {
            enable_stdout: false,
            ..LayerConfig::default()
        },
    )
    .expect("install subscriber");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: appended {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    appender.stop().await.expect("stop appender");
}
