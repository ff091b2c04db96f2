use std::sync::Arc;

use tracing::{error, info, info_span};
use tracing_loghub_appender::console::ConsoleProducerFactory;
use tracing_loghub_appender::init::{init_tracing_with_config, LayerConfig};
use tracing_loghub_appender::layout::TextLayout;
use tracing_loghub_appender::{AppenderAttributes, LoghubAppender};

#[tokio::main]
async fn main() {
    // Every item is printed as a JSON line instead of being shipped.
    let attributes = AppenderAttributes::from_pairs([
        ("projectName", "demo"),
        ("logstore", "app"),
        ("endpoint", "cn-hangzhou.log.aliyuncs.com"),
        ("accessKeyId", "id"),
        ("accessKey", "key"),
        ("topic", "checkout"),
        ("timeZone", "Asia/Shanghai"),
    ]);
    let appender = LoghubAppender::from_attributes(&attributes, Arc::new(ConsoleProducerFactory))
        .expect("valid attributes");
    let layout = TextLayout::new(appender.config().time_formatter.clone());
    let appender = Arc::new(appender.with_layout(layout));
    appender.start().await.expect("start appender");

    init_tracing_with_config(
        Arc::clone(&appender),
        LayerConfig {
            enable_stdout: false,
            ..LayerConfig::default()
        },
    )
    .expect("install subscriber");

    let span = info_span!("request", request_id = "r-17");
    let _guard = span.enter();
    info!(user_id = 42, "checkout started");

    let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "payment gateway timed out");
    error!(error = &err as &(dyn std::error::Error + 'static), "checkout failed");

    appender.stop().await.expect("stop appender");
}
