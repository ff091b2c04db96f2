use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{LogEvent, LINE_SEPARATOR};
use crate::time_format::TimeFormatter;

/// Renders a [`LogEvent`] into bytes, attached to each item as its `log`
/// content.
pub trait Layout: Send + Sync {
    fn format(&self, event: &LogEvent) -> Vec<u8>;
}

/// Plain text: `<time> <LEVEL> [<thread>] <target> - <message>`.
///
/// The call site is appended when location capture was enabled for the
/// event, and a thrown chain follows on separate lines.
#[derive(Debug, Clone)]
pub struct TextLayout {
    formatter: TimeFormatter,
}

impl TextLayout {
    pub fn new(formatter: TimeFormatter) -> Self {
        TextLayout { formatter }
    }
}

impl Layout for TextLayout {
    fn format(&self, event: &LogEvent) -> Vec<u8> {
        let mut line = format!(
            "{} {:<5} [{}] {} - {}",
            self.formatter.format(&event.timestamp),
            event.level.as_str(),
            event.thread_name,
            event.target,
            event.message
        );
        if let Some(location) = event.location(event.include_location) {
            line.push_str(" @ ");
            line.push_str(&location);
        }
        if let Some(thrown) = &event.thrown {
            line.push_str(LINE_SEPARATOR);
            line.push_str(&thrown.render());
        }
        line.into_bytes()
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    timestamp: &'a DateTime<Utc>,
    level: &'a str,
    thread: &'a str,
    target: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thrown: Option<Vec<String>>,
    #[serde(skip_serializing_if = "no_context")]
    context: &'a BTreeMap<String, String>,
}

fn no_context(context: &&BTreeMap<String, String>) -> bool {
    context.is_empty()
}

/// One JSON object per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLayout;

impl Layout for JsonLayout {
    fn format(&self, event: &LogEvent) -> Vec<u8> {
        let json = JsonEvent {
            timestamp: &event.timestamp,
            level: event.level.as_str(),
            thread: &event.thread_name,
            target: &event.target,
            message: &event.message,
            location: event.location(event.include_location),
            thrown: event.thrown.as_ref().map(|t| t.to_lines()),
            context: &event.context,
        };
        serde_json::to_vec(&json).unwrap_or_default()
    }
}
