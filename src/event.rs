use std::collections::BTreeMap;
use std::error::Error;

use chrono::{DateTime, Utc};
use tracing::{Level, Metadata};

/// Line separator used when rendering multi-line fields.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

/// Location substituted when an event carries no call-site information.
pub const UNKNOWN_LOCATION: &str = "Unknown(Unknown Source)";

/// Where an event was emitted from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl CallSite {
    pub fn from_metadata(meta: &Metadata<'_>) -> Self {
        CallSite {
            module_path: meta.module_path().map(str::to_string),
            file: meta.file().map(str::to_string),
            line: meta.line(),
        }
    }

    /// `module(file:line)`, or `None` if neither module nor file is known.
    pub fn render(&self) -> Option<String> {
        if self.module_path.is_none() && self.file.is_none() {
            return None;
        }
        let module = self.module_path.as_deref().unwrap_or("Unknown");
        let source = match (&self.file, self.line) {
            (Some(file), Some(line)) => format!("{file}:{line}"),
            (Some(file), None) => file.clone(),
            (None, _) => "Unknown Source".to_string(),
        };
        Some(format!("{module}({source})"))
    }
}

/// One entry of a thrown error chain: its message and any known frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrowableEntry {
    pub message: String,
    pub frames: Vec<String>,
}

impl ThrowableEntry {
    pub fn new(message: impl Into<String>) -> Self {
        ThrowableEntry {
            message: message.into(),
            frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frames.push(frame.into());
        self
    }
}

/// An error and its chain of causes, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrownChain {
    entries: Vec<ThrowableEntry>,
}

impl ThrownChain {
    pub fn new(entries: Vec<ThrowableEntry>) -> Self {
        ThrownChain { entries }
    }

    /// Walk `error` and its `source()` chain.
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut entries = vec![ThrowableEntry::new(error.to_string())];
        let mut cause = error.source();
        while let Some(err) = cause {
            entries.push(ThrowableEntry::new(err.to_string()));
            cause = err.source();
        }
        ThrownChain { entries }
    }

    pub fn entries(&self) -> &[ThrowableEntry] {
        &self.entries
    }

    /// One line per message and frame; causes are prefixed with `Caused by: `.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if i == 0 {
                lines.push(entry.message.clone());
            } else {
                lines.push(format!("Caused by: {}", entry.message));
            }
            lines.extend(entry.frames.iter().map(|frame| format!("\tat {frame}")));
        }
        lines
    }

    pub fn render(&self) -> String {
        self.to_lines().join(LINE_SEPARATOR)
    }
}

/// A log event captured from the hosting logging framework.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub thread_name: String,
    pub target: String,
    pub call_site: CallSite,
    /// Whether location capture was enabled when the event was created.
    pub include_location: bool,
    pub message: String,
    pub thrown: Option<ThrownChain>,
    pub context: BTreeMap<String, String>,
}

impl LogEvent {
    /// Event stamped now, on the current thread, with no call site or context.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            level,
            thread_name: current_thread_name(),
            target: String::new(),
            call_site: CallSite::default(),
            include_location: true,
            message: message.into(),
            thrown: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = call_site;
        self
    }

    pub fn with_include_location(mut self, include_location: bool) -> Self {
        self.include_location = include_location;
        self
    }

    pub fn with_thrown(mut self, thrown: ThrownChain) -> Self {
        self.thrown = Some(thrown);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Read the call site. With `include_location == false` nothing is read,
    /// mirroring an event whose location capture was turned off.
    pub fn location(&self, include_location: bool) -> Option<String> {
        if !include_location {
            return None;
        }
        self.call_site.render()
    }
}

pub(crate) fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}
