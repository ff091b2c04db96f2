use std::error::Error;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};
use tracing_loghub_appender::event::LINE_SEPARATOR;
use tracing_loghub_appender::init::LayerConfig;
use tracing_loghub_appender::testing::RecordingProducer;
use tracing_loghub_appender::{AppenderAttributes, LoghubAppender, LoghubLayer};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

#[derive(Debug)]
struct ConnectionReset;

impl fmt::Display for ConnectionReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection reset")
    }
}

impl Error for ConnectionReset {}

#[derive(Debug)]
struct RequestFailed(ConnectionReset);

impl fmt::Display for RequestFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("request failed")
    }
}

impl Error for RequestFailed {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

fn appender(producer: &RecordingProducer) -> Arc<LoghubAppender> {
    let attributes = AppenderAttributes::from_pairs([
        ("projectName", "proj"),
        ("logstore", "store"),
        ("endpoint", "endpoint"),
        ("accessKeyId", "id"),
        ("accessKey", "key"),
    ]);
    Arc::new(LoghubAppender::from_attributes(&attributes, Arc::new(producer.clone())).unwrap())
}

async fn started(producer: &RecordingProducer) -> Arc<LoghubAppender> {
    let appender = appender(producer);
    appender.start().await.unwrap();
    appender
}

fn config() -> LayerConfig {
    LayerConfig {
        enable_stdout: false,
        ..LayerConfig::default()
    }
}

#[tokio::test]
async fn event_and_span_fields_become_sorted_context() {
    let producer = RecordingProducer::new();
    let layer = LoghubLayer::new(started(&producer).await, &config());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        let span = info_span!("request", request_id = "r-1", user = "outer");
        let _guard = span.enter();
        info!(user = "inner", zeta = 1, alpha = true, "hello {}", "world");
    });

    let batches = producer.sent();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].topic, "");
    assert_eq!(batches[0].source, None);

    let item = &batches[0].items[0];
    assert_eq!(
        item.keys().collect::<Vec<_>>(),
        vec!["time", "level", "thread", "location", "message", "alpha", "request_id", "user", "zeta"]
    );
    assert_eq!(item.get("level"), Some("INFO"));
    assert_eq!(item.get("message"), Some("hello world"));
    assert_eq!(item.get("user"), Some("inner"));
    assert_eq!(item.get("alpha"), Some("true"));
    assert_eq!(item.get("zeta"), Some("1"));
    assert!(item.get("location").unwrap().starts_with("layer(tests/layer.rs:"));
}

#[tokio::test]
async fn span_fields_recorded_later_are_included() {
    let producer = RecordingProducer::new();
    let layer = LoghubLayer::new(started(&producer).await, &config());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        let span = info_span!("job", attempt = tracing::field::Empty);
        span.record("attempt", 3);
        let _guard = span.enter();
        warn!("retrying");
    });

    let items = producer.items();
    assert_eq!(items[0].get("attempt"), Some("3"));
    assert_eq!(items[0].get("level"), Some("WARN"));
}

#[tokio::test]
async fn recorded_error_becomes_throwable() {
    let producer = RecordingProducer::new();
    let layer = LoghubLayer::new(started(&producer).await, &config());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        let err = RequestFailed(ConnectionReset);
        error!(error = &err as &(dyn Error + 'static), "checkout failed");
    });

    let item = &producer.items()[0];
    assert_eq!(
        item.get("throwable"),
        Some(format!("request failed{LINE_SEPARATOR}Caused by: connection reset").as_str())
    );
    assert_eq!(item.get("error"), None);
    assert_eq!(item.get("message"), Some("checkout failed"));
}

#[tokio::test]
async fn plain_event_has_only_base_fields() {
    let producer = RecordingProducer::new();
    let layer = LoghubLayer::new(started(&producer).await, &config());
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        info!("ping");
    });

    let item = &producer.items()[0];
    assert_eq!(
        item.keys().collect::<Vec<_>>(),
        vec!["time", "level", "thread", "location", "message"]
    );
}

#[tokio::test]
async fn events_above_max_level_are_skipped() {
    let producer = RecordingProducer::new();
    let layer = LoghubLayer::new(
        started(&producer).await,
        &LayerConfig {
            max_level: LevelFilter::INFO,
            ..config()
        },
    );
    let total = Arc::clone(&layer.total_events);
    let appended = Arc::clone(&layer.appended_events);
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        debug!("noisy");
        info!("kept");
    });

    assert_eq!(total.load(Ordering::Relaxed), 2);
    assert_eq!(appended.load(Ordering::Relaxed), 1);
    assert_eq!(producer.items()[0].get("message"), Some("kept"));
}

#[tokio::test]
async fn events_before_start_are_counted_as_failed() {
    let producer = RecordingProducer::new();
    let layer = LoghubLayer::new(appender(&producer), &config());
    let failed = Arc::clone(&layer.failed_events);
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        info!("too early");
    });

    assert_eq!(failed.load(Ordering::Relaxed), 1);
    assert!(producer.sent().is_empty());
}

#[tokio::test]
async fn location_is_filled_without_capture() {
    let producer = RecordingProducer::new();
    let layer = LoghubLayer::new(
        started(&producer).await,
        &LayerConfig {
            include_location: false,
            ..config()
        },
    );
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        info!("where am i");
    });

    let location = producer.items()[0].get("location").unwrap().to_string();
    assert!(location.starts_with("layer(tests/layer.rs:"), "{location}");
}

#[tokio::test]
async fn thread_name_comes_from_the_logging_thread() {
    let producer = RecordingProducer::new();
    let layer = LoghubLayer::new(started(&producer).await, &config());
    let subscriber = Registry::default().with(layer);

    std::thread::Builder::new()
        .name("worker-7".to_string())
        .spawn(move || {
            tracing::subscriber::with_default(subscriber, || {
                info!("from worker");
            });
        })
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(producer.items()[0].get("thread"), Some("worker-7"));
}

#[tokio::test]
async fn delivery_failures_do_not_reach_the_caller() {
    let producer = RecordingProducer::failing("WriteQuotaExceed", "quota exceeded");
    let layer = LoghubLayer::new(started(&producer).await, &config());
    let appended = Arc::clone(&layer.appended_events);
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        info!("shipped anyway");
    });

    assert_eq!(appended.load(Ordering::Relaxed), 1);
    assert_eq!(producer.sent().len(), 1);
}
