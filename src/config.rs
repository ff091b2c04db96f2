//! Appender attributes and their validation.
//!
//! [`AppenderAttributes`] carries the raw string attributes exactly as a
//! declarative configuration source provides them. [`AppenderConfig`] is the
//! validated, immutable result used by the appender for its whole lifetime.

use std::fmt;

use serde::Deserialize;
use tracing::warn;

use crate::time_format::{TimeFormatError, TimeFormatter, DEFAULT_TIME_FORMAT, DEFAULT_TIME_ZONE};

pub const DEFAULT_APPENDER_NAME: &str = "Loghub";
pub const DEFAULT_PACKAGE_TIMEOUT_MS: i32 = 3000;
pub const MAX_LOGS_COUNT_PER_PACKAGE: i32 = 4096;
pub const MAX_LOGS_BYTES_PER_PACKAGE: i32 = 5 * 1024 * 1024;
pub const DEFAULT_MEM_POOL_SIZE_IN_BYTE: i32 = 100 * 1024 * 1024;
pub const DEFAULT_RETRY_TIMES: i32 = 3;
pub const DEFAULT_MAX_IO_THREADS: i32 = 8;

/// Client identifier reported to the producer.
pub const USER_AGENT: &str = concat!("tracing-loghub-appender/", env!("CARGO_PKG_VERSION"));

/// Raw appender attributes, all optional strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppenderAttributes {
    pub name: Option<String>,
    pub project_name: Option<String>,
    pub logstore: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key: Option<String>,
    pub sts_token: Option<String>,
    #[serde(rename = "packageTimeoutInMS")]
    pub package_timeout_in_ms: Option<String>,
    pub logs_count_per_package: Option<String>,
    pub logs_bytes_per_package: Option<String>,
    pub mem_pool_size_in_byte: Option<String>,
    pub retry_times: Option<String>,
    #[serde(rename = "maxIOThreadSizeInPool")]
    pub max_io_thread_size_in_pool: Option<String>,
    pub topic: Option<String>,
    pub source: Option<String>,
    pub time_format: Option<String>,
    pub time_zone: Option<String>,
    pub ignore_exceptions: Option<String>,
}

impl AppenderAttributes {
    /// Set an attribute by its configuration name. Returns `false` for
    /// names this appender does not know.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match key {
            "name" => &mut self.name,
            "projectName" => &mut self.project_name,
            "logstore" => &mut self.logstore,
            "endpoint" => &mut self.endpoint,
            "accessKeyId" => &mut self.access_key_id,
            "accessKey" => &mut self.access_key,
            "stsToken" => &mut self.sts_token,
            "packageTimeoutInMS" => &mut self.package_timeout_in_ms,
            "logsCountPerPackage" => &mut self.logs_count_per_package,
            "logsBytesPerPackage" => &mut self.logs_bytes_per_package,
            "memPoolSizeInByte" => &mut self.mem_pool_size_in_byte,
            "retryTimes" => &mut self.retry_times,
            "maxIOThreadSizeInPool" => &mut self.max_io_thread_size_in_pool,
            "topic" => &mut self.topic,
            "source" => &mut self.source,
            "timeFormat" => &mut self.time_format,
            "timeZone" => &mut self.time_zone,
            "ignoreExceptions" => &mut self.ignore_exceptions,
            _ => return false,
        };
        *slot = Some(value.into());
        true
    }

    /// Build attributes from `(name, value)` pairs; unknown names are skipped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut attributes = AppenderAttributes::default();
        for (key, value) in pairs {
            if !attributes.set(key.as_ref(), value) {
                tracing::debug!(attribute = key.as_ref(), "ignoring unknown appender attribute");
            }
        }
        attributes
    }
}

/// Error returned when appender attributes fail validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config value [{field}] must not be empty")]
    Missing { field: &'static str },

    #[error("config value [{field}] must be {constraint}, got {value}")]
    OutOfRange {
        field: &'static str,
        constraint: &'static str,
        value: i32,
    },

    #[error("invalid time format: {0}")]
    TimeFormat(#[from] TimeFormatError),
}

/// Why a default was used for a numeric attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultReason {
    Missing,
    Malformed(String),
}

/// Outcome of parsing an optional numeric attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Given(T),
    Defaulted { value: T, reason: DefaultReason },
}

impl<T: Copy> Parsed<T> {
    pub fn value(&self) -> T {
        match self {
            Parsed::Given(value) => *value,
            Parsed::Defaulted { value, .. } => *value,
        }
    }
}

/// Parse `raw` as a 32-bit integer, falling back to `default` when it is
/// absent, empty or not a valid integer.
pub fn parse_int_or_default(raw: Option<&str>, default: i32) -> Parsed<i32> {
    match raw {
        None | Some("") => Parsed::Defaulted {
            value: default,
            reason: DefaultReason::Missing,
        },
        Some(text) => match text.parse::<i32>() {
            Ok(value) => Parsed::Given(value),
            Err(_) => Parsed::Defaulted {
                value: default,
                reason: DefaultReason::Malformed(text.to_string()),
            },
        },
    }
}

/// `"true"`/`"false"` in any case; anything else yields `default`.
pub fn parse_bool_or_default(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(text) if text.eq_ignore_ascii_case("true") => true,
        Some(text) if text.eq_ignore_ascii_case("false") => false,
        _ => default,
    }
}

/// Destination credentials handed to the producer.
#[derive(Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub project_name: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub access_key: String,
    pub sts_token: Option<String>,
}

impl fmt::Debug for ProjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectConfig")
            .field("project_name", &self.project_name)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("access_key", &"<redacted>")
            .field("sts_token", &self.sts_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Batching tunables handed to the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub package_timeout_ms: u32,
    pub logs_count_per_package: u32,
    pub logs_bytes_per_package: u32,
    pub mem_pool_size_in_byte: u32,
    pub retry_times: u32,
    pub max_io_thread_size_in_pool: u32,
    pub user_agent: String,
}

impl ProducerConfig {
    pub fn package_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(u64::from(self.package_timeout_ms))
    }
}

/// Validated appender configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppenderConfig {
    pub name: String,
    pub project: ProjectConfig,
    pub producer: ProducerConfig,
    pub logstore: String,
    /// Empty when not configured.
    pub topic: String,
    pub source: Option<String>,
    pub time_formatter: TimeFormatter,
    pub ignore_exceptions: bool,
}

impl AppenderConfig {
    /// Validate `attributes` and resolve defaults.
    pub fn from_attributes(attributes: &AppenderAttributes) -> Result<Self, ConfigError> {
        let project_name = required("projectName", &attributes.project_name)?;
        let logstore = required("logstore", &attributes.logstore)?;
        let endpoint = required("endpoint", &attributes.endpoint)?;
        let access_key_id = required("accessKeyId", &attributes.access_key_id)?;
        let access_key = required("accessKey", &attributes.access_key)?;

        let package_timeout_ms = tunable(
            "packageTimeoutInMS",
            &attributes.package_timeout_in_ms,
            DEFAULT_PACKAGE_TIMEOUT_MS,
        );
        check(package_timeout_ms > 10, "packageTimeoutInMS", "> 10", package_timeout_ms)?;

        let logs_count = tunable(
            "logsCountPerPackage",
            &attributes.logs_count_per_package,
            MAX_LOGS_COUNT_PER_PACKAGE,
        );
        check(
            (1..=MAX_LOGS_COUNT_PER_PACKAGE).contains(&logs_count),
            "logsCountPerPackage",
            "between [1,4096]",
            logs_count,
        )?;

        let logs_bytes = tunable(
            "logsBytesPerPackage",
            &attributes.logs_bytes_per_package,
            MAX_LOGS_BYTES_PER_PACKAGE,
        );
        check(
            (1..=MAX_LOGS_BYTES_PER_PACKAGE).contains(&logs_bytes),
            "logsBytesPerPackage",
            "between [1,5242880]",
            logs_bytes,
        )?;

        let mem_pool = tunable(
            "memPoolSizeInByte",
            &attributes.mem_pool_size_in_byte,
            DEFAULT_MEM_POOL_SIZE_IN_BYTE,
        );
        check(mem_pool > 0, "memPoolSizeInByte", "> 0", mem_pool)?;

        let retry_times = tunable("retryTimes", &attributes.retry_times, DEFAULT_RETRY_TIMES);
        check(retry_times > 0, "retryTimes", "> 0", retry_times)?;

        let io_threads = tunable(
            "maxIOThreadSizeInPool",
            &attributes.max_io_thread_size_in_pool,
            DEFAULT_MAX_IO_THREADS,
        );
        check(io_threads > 0, "maxIOThreadSizeInPool", "> 0", io_threads)?;

        let pattern = non_empty(&attributes.time_format).unwrap_or(DEFAULT_TIME_FORMAT);
        let zone = non_empty(&attributes.time_zone).unwrap_or(DEFAULT_TIME_ZONE);
        let time_formatter = TimeFormatter::new(pattern, zone)?;

        Ok(AppenderConfig {
            name: non_empty(&attributes.name)
                .unwrap_or(DEFAULT_APPENDER_NAME)
                .to_string(),
            project: ProjectConfig {
                project_name,
                endpoint,
                access_key_id,
                access_key,
                sts_token: attributes.sts_token.clone(),
            },
            // Every tunable was checked positive above.
            producer: ProducerConfig {
                package_timeout_ms: package_timeout_ms.unsigned_abs(),
                logs_count_per_package: logs_count.unsigned_abs(),
                logs_bytes_per_package: logs_bytes.unsigned_abs(),
                mem_pool_size_in_byte: mem_pool.unsigned_abs(),
                retry_times: retry_times.unsigned_abs(),
                max_io_thread_size_in_pool: io_threads.unsigned_abs(),
                user_agent: USER_AGENT.to_string(),
            },
            logstore,
            topic: attributes.topic.clone().unwrap_or_default(),
            source: non_empty(&attributes.source).map(str::to_string),
            time_formatter,
            ignore_exceptions: parse_bool_or_default(attributes.ignore_exceptions.as_deref(), true),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn required(field: &'static str, value: &Option<String>) -> Result<String, ConfigError> {
    non_empty(value)
        .map(str::to_string)
        .ok_or(ConfigError::Missing { field })
}

fn tunable(field: &'static str, raw: &Option<String>, default: i32) -> i32 {
    let parsed = parse_int_or_default(raw.as_deref(), default);
    if let Parsed::Defaulted {
        reason: DefaultReason::Malformed(raw),
        ..
    } = &parsed
    {
        warn!(attribute = field, raw = %raw, default, "malformed numeric attribute, using default");
    }
    parsed.value()
}

fn check(
    condition: bool,
    field: &'static str,
    constraint: &'static str,
    value: i32,
) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            constraint,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn base() -> AppenderAttributes {
        AppenderAttributes::from_pairs([
            ("projectName", "proj"),
            ("logstore", "store"),
            ("endpoint", "cn-hangzhou.log.aliyuncs.com"),
            ("accessKeyId", "id"),
            ("accessKey", "secret"),
        ])
    }

    fn with(key: &str, value: &str) -> AppenderAttributes {
        let mut attributes = base();
        assert!(attributes.set(key, value));
        attributes
    }

    #[test]
    fn defaults_resolve() {
        let config = AppenderConfig::from_attributes(&base()).unwrap();
        assert_eq!(config.name, "Loghub");
        assert_eq!(config.producer.package_timeout_ms, 3000);
        assert_eq!(config.producer.logs_count_per_package, 4096);
        assert_eq!(config.producer.logs_bytes_per_package, 5_242_880);
        assert_eq!(config.producer.mem_pool_size_in_byte, 104_857_600);
        assert_eq!(config.producer.retry_times, 3);
        assert_eq!(config.producer.max_io_thread_size_in_pool, 8);
        assert_eq!(config.producer.user_agent, USER_AGENT);
        assert_eq!(config.time_formatter.pattern(), DEFAULT_TIME_FORMAT);
        assert!(config.ignore_exceptions);
        assert_eq!(config.source, None);
        assert_eq!(config.project.sts_token, None);
    }

    #[test]
    fn identical_attributes_yield_identical_configs() {
        let first = AppenderConfig::from_attributes(&with("retryTimes", "oops")).unwrap();
        let second = AppenderConfig::from_attributes(&with("retryTimes", "oops")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_topic_is_empty_string() {
        let config = AppenderConfig::from_attributes(&base()).unwrap();
        assert_eq!(config.topic, "");
    }

    #[test]
    fn required_fields_are_named() {
        for field in ["projectName", "logstore", "endpoint", "accessKeyId", "accessKey"] {
            let err = AppenderConfig::from_attributes(&with(field, "")).unwrap_err();
            assert_eq!(err, ConfigError::Missing { field });
            assert!(err.to_string().contains(field));
        }
    }

    #[test]
    fn logs_count_bounds() {
        assert!(AppenderConfig::from_attributes(&with("logsCountPerPackage", "0")).is_err());
        assert!(AppenderConfig::from_attributes(&with("logsCountPerPackage", "4096")).is_ok());
        let err = AppenderConfig::from_attributes(&with("logsCountPerPackage", "4097")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::OutOfRange {
                field: "logsCountPerPackage",
                constraint: "between [1,4096]",
                value: 4097,
            }
        );
    }

    #[test]
    fn other_bounds() {
        let cases = [
            ("packageTimeoutInMS", "10"),
            ("logsBytesPerPackage", "5242881"),
            ("memPoolSizeInByte", "0"),
            ("retryTimes", "0"),
            ("maxIOThreadSizeInPool", "-1"),
        ];
        for (field, value) in cases {
            let err = AppenderConfig::from_attributes(&with(field, value)).unwrap_err();
            assert!(
                matches!(err, ConfigError::OutOfRange { field: f, .. } if f == field),
                "{field}={value} gave {err:?}"
            );
        }
        assert!(AppenderConfig::from_attributes(&with("packageTimeoutInMS", "11")).is_ok());
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        let cases = [
            ("packageTimeoutInMS", "3s"),
            ("logsCountPerPackage", " 12"),
            ("logsBytesPerPackage", "1.5"),
            ("memPoolSizeInByte", "99999999999"),
            ("retryTimes", "three"),
            ("maxIOThreadSizeInPool", "0x10"),
        ];
        let defaults = AppenderConfig::from_attributes(&base()).unwrap();
        for (field, value) in cases {
            let config = AppenderConfig::from_attributes(&with(field, value)).unwrap();
            assert_eq!(config.producer, defaults.producer, "{field}={value}");
        }
    }

    #[test]
    fn parse_int_reports_why_default_was_used() {
        assert_eq!(parse_int_or_default(Some("+7"), 3), Parsed::Given(7));
        assert_eq!(
            parse_int_or_default(None, 3),
            Parsed::Defaulted {
                value: 3,
                reason: DefaultReason::Missing
            }
        );
        assert_eq!(
            parse_int_or_default(Some("x"), 3),
            Parsed::Defaulted {
                value: 3,
                reason: DefaultReason::Malformed("x".to_string())
            }
        );
    }

    #[test]
    #[traced_test]
    fn malformed_number_is_logged() {
        AppenderConfig::from_attributes(&with("retryTimes", "many")).unwrap();
        assert!(logs_contain("malformed numeric attribute"));
        assert!(logs_contain("retryTimes"));
    }

    #[test]
    fn invalid_time_settings_fail() {
        assert!(matches!(
            AppenderConfig::from_attributes(&with("timeFormat", "yyyy-bb")),
            Err(ConfigError::TimeFormat(TimeFormatError::IllegalComponent { .. }))
        ));
        assert!(matches!(
            AppenderConfig::from_attributes(&with("timeZone", "Nowhere/Land")),
            Err(ConfigError::TimeFormat(TimeFormatError::UnknownZone(_)))
        ));
    }

    #[test]
    fn ignore_exceptions_parsing() {
        let config = AppenderConfig::from_attributes(&with("ignoreExceptions", "FALSE")).unwrap();
        assert!(!config.ignore_exceptions);
        let config = AppenderConfig::from_attributes(&with("ignoreExceptions", "nope")).unwrap();
        assert!(config.ignore_exceptions);
    }

    #[test]
    fn sts_token_passes_through_and_is_redacted() {
        let config = AppenderConfig::from_attributes(&with("stsToken", "")).unwrap();
        assert_eq!(config.project.sts_token.as_deref(), Some(""));

        let debug = format!("{:?}", config.project);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn deserializes_camel_case_attributes() {
        let attributes: AppenderAttributes = serde_json::from_value(serde_json::json!({
            "projectName": "proj",
            "packageTimeoutInMS": "500",
            "maxIOThreadSizeInPool": "2",
            "timeZone": "Asia/Shanghai"
        }))
        .unwrap();
        assert_eq!(attributes.project_name.as_deref(), Some("proj"));
        assert_eq!(attributes.package_timeout_in_ms.as_deref(), Some("500"));
        assert_eq!(attributes.max_io_thread_size_in_pool.as_deref(), Some("2"));
        assert_eq!(attributes.time_zone.as_deref(), Some("Asia/Shanghai"));
    }

    #[test]
    fn unknown_attribute_names_are_rejected_by_set() {
        let mut attributes = AppenderAttributes::default();
        assert!(!attributes.set("bogus", "1"));
        assert_eq!(attributes, AppenderAttributes::default());
    }
}
