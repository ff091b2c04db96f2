use crate::appender::LoghubAppender;
use crate::layer::LoghubLayer;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// **Fields**
/// - `max_level`: most verbose level forwarded to the appender.
/// - `include_location`: whether events are created with location capture
///   enabled. Layouts only show the call site when it is; the `location`
///   content of each item is filled either way.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to [`LoghubLayer`] so events are also printed locally.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub max_level: LevelFilter,
    pub include_location: bool,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            max_level: LevelFilter::INFO,
            include_location: true,
            enable_stdout: true,
        }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global `tracing` subscriber with a [`LoghubLayer`]
/// around `appender`.
///
/// **Parameters**
/// - `appender`: started [`LoghubAppender`] receiving every event.
/// - `config`: [`LayerConfig`] controlling level filtering, location
///   capture and local console output.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with [`LoghubLayer`] as the
/// global default subscriber, so all `tracing` events in the process
/// are observed by the layer.
pub fn init_tracing_with_config(
    appender: Arc<LoghubAppender>,
    config: LayerConfig,
) -> Result<(), InitError> {
    let layer = LoghubLayer::new(appender, &config);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(appender: Arc<LoghubAppender>) -> Result<(), InitError> {
    init_tracing_with_config(appender, LayerConfig::default())
}
