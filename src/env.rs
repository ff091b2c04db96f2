//! Environment variable names used by this crate for convenient
//! configuration of the appender from services.
//!
//! These are purely helpers; [`AppenderAttributes`] itself stays decoupled
//! from environment access.

use crate::config::AppenderAttributes;

pub const LOGHUB_PROJECT_NAME_ENV: &str = "LOGHUB_PROJECT_NAME";
pub const LOGHUB_LOGSTORE_ENV: &str = "LOGHUB_LOGSTORE";
pub const LOGHUB_ENDPOINT_ENV: &str = "LOGHUB_ENDPOINT";
pub const LOGHUB_ACCESS_KEY_ID_ENV: &str = "LOGHUB_ACCESS_KEY_ID";
pub const LOGHUB_ACCESS_KEY_ENV: &str = "LOGHUB_ACCESS_KEY";
/// Optional STS token for temporary credentials.
pub const LOGHUB_STS_TOKEN_ENV: &str = "LOGHUB_STS_TOKEN";
pub const LOGHUB_PACKAGE_TIMEOUT_MS_ENV: &str = "LOGHUB_PACKAGE_TIMEOUT_MS";
pub const LOGHUB_LOGS_COUNT_PER_PACKAGE_ENV: &str = "LOGHUB_LOGS_COUNT_PER_PACKAGE";
pub const LOGHUB_LOGS_BYTES_PER_PACKAGE_ENV: &str = "LOGHUB_LOGS_BYTES_PER_PACKAGE";
pub const LOGHUB_MEM_POOL_SIZE_ENV: &str = "LOGHUB_MEM_POOL_SIZE";
pub const LOGHUB_RETRY_TIMES_ENV: &str = "LOGHUB_RETRY_TIMES";
pub const LOGHUB_MAX_IO_THREADS_ENV: &str = "LOGHUB_MAX_IO_THREADS";
pub const LOGHUB_TOPIC_ENV: &str = "LOGHUB_TOPIC";
pub const LOGHUB_SOURCE_ENV: &str = "LOGHUB_SOURCE";
pub const LOGHUB_TIME_FORMAT_ENV: &str = "LOGHUB_TIME_FORMAT";
pub const LOGHUB_TIME_ZONE_ENV: &str = "LOGHUB_TIME_ZONE";
pub const LOGHUB_IGNORE_EXCEPTIONS_ENV: &str = "LOGHUB_IGNORE_EXCEPTIONS";

/// Attribute name paired with the variable it is read from.
const VARIABLES: [(&str, &str); 17] = [
    ("projectName", LOGHUB_PROJECT_NAME_ENV),
    ("logstore", LOGHUB_LOGSTORE_ENV),
    ("endpoint", LOGHUB_ENDPOINT_ENV),
    ("accessKeyId", LOGHUB_ACCESS_KEY_ID_ENV),
    ("accessKey", LOGHUB_ACCESS_KEY_ENV),
    ("stsToken", LOGHUB_STS_TOKEN_ENV),
    ("packageTimeoutInMS", LOGHUB_PACKAGE_TIMEOUT_MS_ENV),
    ("logsCountPerPackage", LOGHUB_LOGS_COUNT_PER_PACKAGE_ENV),
    ("logsBytesPerPackage", LOGHUB_LOGS_BYTES_PER_PACKAGE_ENV),
    ("memPoolSizeInByte", LOGHUB_MEM_POOL_SIZE_ENV),
    ("retryTimes", LOGHUB_RETRY_TIMES_ENV),
    ("maxIOThreadSizeInPool", LOGHUB_MAX_IO_THREADS_ENV),
    ("topic", LOGHUB_TOPIC_ENV),
    ("source", LOGHUB_SOURCE_ENV),
    ("timeFormat", LOGHUB_TIME_FORMAT_ENV),
    ("timeZone", LOGHUB_TIME_ZONE_ENV),
    ("ignoreExceptions", LOGHUB_IGNORE_EXCEPTIONS_ENV),
];

/// Read appender attributes from `LOGHUB_*` environment variables.
/// Unset variables leave the attribute unset.
pub fn attributes_from_env() -> AppenderAttributes {
    attributes_from_lookup(|key| std::env::var(key).ok())
}

fn attributes_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppenderAttributes {
    AppenderAttributes::from_pairs(
        VARIABLES
            .iter()
            .filter_map(|&(attribute, variable)| lookup(variable).map(|value| (attribute, value))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn every_variable_maps_to_a_known_attribute() {
        let mut attributes = AppenderAttributes::default();
        for (attribute, _) in VARIABLES {
            assert!(attributes.set(attribute, "x"), "{attribute}");
        }
    }

    #[test]
    fn reads_only_present_variables() {
        let env: HashMap<&str, &str> = HashMap::from([
            (LOGHUB_PROJECT_NAME_ENV, "proj"),
            (LOGHUB_TOPIC_ENV, "orders"),
            (LOGHUB_MAX_IO_THREADS_ENV, "4"),
        ]);
        let attributes = attributes_from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(attributes.project_name.as_deref(), Some("proj"));
        assert_eq!(attributes.topic.as_deref(), Some("orders"));
        assert_eq!(attributes.max_io_thread_size_in_pool.as_deref(), Some("4"));
        assert_eq!(attributes.logstore, None);
    }
}
