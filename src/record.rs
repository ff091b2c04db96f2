use serde::Serialize;

/// A single key/value pair inside a [`LogItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogContent {
    pub key: String,
    pub value: String,
}

/// Structured record accepted by the Loghub ingestion service.
///
/// Contents keep insertion order and may repeat a key; the service treats
/// the item as an ordered list of pairs, not as a map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogItem {
    time: i64,
    contents: Vec<LogContent>,
}

impl LogItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event time in seconds since the Unix epoch.
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn set_time(&mut self, seconds: i64) {
        self.time = seconds;
    }

    /// Append a content pair at the end of the item.
    pub fn push_back(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.contents.push(LogContent {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn contents(&self) -> &[LogContent] {
        &self.contents
    }

    /// Value of the first content with the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.contents
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.contents.iter().map(|c| c.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
