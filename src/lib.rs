//! Loghub appender for `tracing`.
//!
//! [`LoghubLayer`] captures `tracing` events, [`LoghubAppender`] turns each
//! one into a [`LogItem`] and hands it to a [`LogProducer`], which owns
//! batching, retries and transport to the ingestion service.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracing_loghub_appender::{env, init, AppenderConfig, LoghubAppender, NoopProducer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppenderConfig::from_attributes(&env::attributes_from_env())?;
//! let appender = Arc::new(LoghubAppender::new(config, Arc::new(NoopProducer)));
//! appender.start().await?;
//! init::init_tracing(Arc::clone(&appender))?;
//!
//! tracing::info!(order_id = 7, "order placed");
//!
//! appender.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod appender;
pub mod callback;
pub mod config;
pub mod env;
pub mod event;
pub mod init;
pub mod layer;
pub mod layout;
pub mod noop_producer;
pub mod producer;
pub mod record;
pub mod testing;
pub mod time_format;

#[cfg(feature = "console")]
pub mod console;

pub use appender::{AppenderError, LoghubAppender};
pub use callback::DeliveryCallback;
pub use config::{AppenderAttributes, AppenderConfig, ConfigError, ProducerConfig, ProjectConfig};
pub use event::LogEvent;
pub use layer::LoghubLayer;
pub use noop_producer::NoopProducer;
pub use producer::{LogProducer, ProducerError, ProducerFactory};
pub use record::LogItem;
