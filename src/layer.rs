use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{debug, Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::appender::LoghubAppender;
use crate::event::{current_thread_name, CallSite, LogEvent, ThrownChain};
use crate::init::LayerConfig;

/// Events from this crate are diagnostics about delivery itself; shipping
/// them would feed every delivery failure back into the producer.
const INTERNAL_TARGET: &str = env!("CARGO_CRATE_NAME");

fn is_internal(target: &str) -> bool {
    target
        .strip_prefix(INTERNAL_TARGET)
        .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
}

/// `tracing_subscriber` layer that turns events into [`LogEvent`]s and
/// appends them through a [`LoghubAppender`].
///
/// Fields of the enclosing spans become context entries, root span first,
/// and event fields override span fields with the same name. The appender
/// must be started before events arrive; until then events are counted as
/// failed.
pub struct LoghubLayer {
    appender: Arc<LoghubAppender>,
    max_level: LevelFilter,
    include_location: bool,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events handed to the producer.
    pub appended_events: Arc<AtomicU64>,
    /// Events the appender refused, e.g. because it was not started.
    pub failed_events: Arc<AtomicU64>,
}

impl LoghubLayer {
    pub fn new(appender: Arc<LoghubAppender>, config: &LayerConfig) -> Self {
        LoghubLayer {
            appender,
            max_level: config.max_level,
            include_location: config.include_location,
            total_events: Arc::new(AtomicU64::new(0)),
            appended_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn appender(&self) -> &Arc<LoghubAppender> {
        &self.appender
    }
}

/// Span fields stored in the registry's span extensions.
struct SpanFields(BTreeMap<String, String>);

impl<S> Layer<S> for LoghubLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::for_span();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = FieldVisitor::for_span();
            values.record(&mut visitor);
            fields.0.extend(visitor.fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_internal(meta.target()) {
            return;
        }
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if *meta.level() > self.max_level {
            return;
        }

        let mut context = BTreeMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    context.extend(fields.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        let mut visitor = FieldVisitor::for_event();
        event.record(&mut visitor);
        context.extend(visitor.fields);

        let log_event = LogEvent {
            timestamp: Utc::now(),
            level: *meta.level(),
            thread_name: current_thread_name(),
            target: meta.target().to_string(),
            call_site: CallSite::from_metadata(meta),
            include_location: self.include_location,
            message: visitor.message.unwrap_or_default(),
            thrown: visitor.thrown,
            context,
        };

        match self.appender.append(&log_event) {
            Ok(()) => {
                self.appended_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                if self.appender.config().ignore_exceptions {
                    debug!(%error, "dropping log event");
                } else {
                    eprintln!("loghub appender {}: {}", self.appender.config().name, error);
                }
            }
        }
    }
}

/// Collects field values as strings.
///
/// For events, `message` and the first recorded error are pulled out of the
/// field map; for spans every field stays a plain field. Fields added by the
/// `log` compatibility bridge (`log.target`, `log.file`, ...) are skipped.
struct FieldVisitor {
    span: bool,
    fields: BTreeMap<String, String>,
    message: Option<String>,
    thrown: Option<ThrownChain>,
}

impl FieldVisitor {
    fn for_event() -> Self {
        FieldVisitor {
            span: false,
            fields: BTreeMap::new(),
            message: None,
            thrown: None,
        }
    }

    fn for_span() -> Self {
        FieldVisitor {
            span: true,
            ..Self::for_event()
        }
    }

    fn insert(&mut self, field: &Field, value: String) {
        let name = field.name();
        if !self.span && name == "message" {
            self.message = Some(value);
        } else if !name.starts_with("log.") {
            self.fields.insert(name.to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if !self.span && self.thrown.is_none() {
            self.thrown = Some(ThrownChain::from_error(value));
        } else {
            self.insert(field, value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_targets_are_recognized() {
        assert!(is_internal(INTERNAL_TARGET));
        assert!(is_internal(&format!("{INTERNAL_TARGET}::callback")));
        assert!(!is_internal(&format!("{INTERNAL_TARGET}_extra")));
        assert!(!is_internal("app::orders"));
    }
}
