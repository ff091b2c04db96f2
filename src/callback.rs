use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AppenderConfig;
use crate::producer::ProducerError;
use crate::record::LogItem;

/// Observes the outcome of one [`LogProducer::send`] call.
///
/// Completing consumes the callback, so it can only run once. Outcomes are
/// logged and never reach the code that emitted the event.
///
/// [`LogProducer::send`]: crate::producer::LogProducer::send
#[derive(Debug)]
pub struct DeliveryCallback {
    project: String,
    logstore: String,
    topic: String,
    source: Option<String>,
    items: Arc<[LogItem]>,
    completed: bool,
}

impl DeliveryCallback {
    pub fn new(
        project: impl Into<String>,
        logstore: impl Into<String>,
        topic: impl Into<String>,
        source: Option<String>,
        items: Arc<[LogItem]>,
    ) -> Self {
        DeliveryCallback {
            project: project.into(),
            logstore: logstore.into(),
            topic: topic.into(),
            source,
            items,
            completed: false,
        }
    }

    pub(crate) fn for_config(config: &AppenderConfig, items: Arc<[LogItem]>) -> Self {
        DeliveryCallback::new(
            config.project.project_name.as_str(),
            config.logstore.as_str(),
            config.topic.as_str(),
            config.source.clone(),
            items,
        )
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn logstore(&self) -> &str {
        &self.logstore
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn items(&self) -> &[LogItem] {
        &self.items
    }

    pub fn on_completion(mut self, result: Result<(), ProducerError>) {
        self.completed = true;
        match result {
            Ok(()) => debug!(
                project = %self.project,
                logstore = %self.logstore,
                topic = %self.topic,
                source = self.source.as_deref().unwrap_or(""),
                items = self.items.len(),
                "log items delivered"
            ),
            Err(error) => warn!(
                project = %self.project,
                logstore = %self.logstore,
                topic = %self.topic,
                source = self.source.as_deref().unwrap_or(""),
                items = ?self.items,
                %error,
                "failed to send log items"
            ),
        }
    }
}

impl Drop for DeliveryCallback {
    fn drop(&mut self) {
        if !self.completed {
            warn!(
                project = %self.project,
                logstore = %self.logstore,
                items = self.items.len(),
                "delivery callback dropped without completion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn callback() -> DeliveryCallback {
        let mut item = LogItem::new();
        item.push_back("message", "disk full");
        DeliveryCallback::new("proj", "store", "", Some("host-1".to_string()), Arc::from(vec![item]))
    }

    #[test]
    #[traced_test]
    fn failure_is_logged_with_destination() {
        callback().on_completion(Err(ProducerError::Delivery {
            code: "Unauthorized".to_string(),
            message: "bad key".to_string(),
        }));
        assert!(logs_contain("failed to send log items"));
        assert!(logs_contain("proj"));
        assert!(logs_contain("host-1"));
        assert!(logs_contain("Unauthorized"));
        assert!(!logs_contain("dropped without completion"));
    }

    #[test]
    #[traced_test]
    fn success_is_logged_at_debug() {
        callback().on_completion(Ok(()));
        assert!(logs_contain("log items delivered"));
        assert!(!logs_contain("failed to send"));
    }

    #[test]
    #[traced_test]
    fn dropping_without_completion_is_reported() {
        drop(callback());
        assert!(logs_contain("delivery callback dropped without completion"));
    }

    #[test]
    fn exposes_destination_and_items() {
        let cb = callback();
        assert_eq!(cb.project(), "proj");
        assert_eq!(cb.logstore(), "store");
        assert_eq!(cb.topic(), "");
        assert_eq!(cb.source(), Some("host-1"));
        assert_eq!(cb.items()[0].get("message"), Some("disk full"));
        cb.on_completion(Ok(()));
    }
}
