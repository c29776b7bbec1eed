use std::env::VarError;
use std::str::FromStr;
use std::time::Duration;

use orgsync_core::Cvr;

use crate::sync::filter::FilterConfig;

/// Longest accepted success archive retention, in days.
pub const MAX_RETENTION_DAYS: i64 = 3_650;

/// Success archive retention of `days` days. `None` unless `days` is within
/// `1..=MAX_RETENTION_DAYS`.
#[must_use]
pub fn retention_from_days(days: i64) -> Option<chrono::Duration> {
    (1..=MAX_RETENTION_DAYS)
        .contains(&days)
        .then(|| chrono::Duration::days(days))
}

/// Configuration for the queue, drain engine and directory tracker.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Worker pool width. Also the batch size fetched per drain step.
    pub workers: usize,

    /// Hard deadline for one registry call.
    pub item_timeout: Duration,

    pub drain_interval: Duration,
    pub directory_sync_interval: Duration,
    pub reconcile_interval: Duration,
    pub cleanup_interval: Duration,

    /// Success archive rows older than this are purged.
    pub success_retention: chrono::Duration,

    /// Changes requested per directory page.
    pub page_size: u32,

    /// Tenant of the directory source. Required by the tracker and the
    /// reconciliation pass, not by the drain engine.
    pub cvr: Option<Cvr>,

    pub filter: FilterConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let database_url = reader("ORGSYNC_DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("ORGSYNC_DATABASE_URL".into()))?;

        let workers: usize = parse_or(&reader, "ORGSYNC_WORKERS", 10)?;
        if workers == 0 {
            return Err(ConfigError::InvalidValue(
                "ORGSYNC_WORKERS".into(),
                "must be at least 1".into(),
            ));
        }

        let item_timeout = Duration::from_secs(parse_or(&reader, "ORGSYNC_ITEM_TIMEOUT_SECS", 15)?);
        let drain_interval =
            Duration::from_secs(parse_or(&reader, "ORGSYNC_DRAIN_INTERVAL_SECS", 60)?);
        let directory_sync_interval = Duration::from_secs(parse_or(
            &reader,
            "ORGSYNC_DIRECTORY_SYNC_INTERVAL_SECS",
            300,
        )?);
        let reconcile_interval =
            Duration::from_secs(parse_or(&reader, "ORGSYNC_RECONCILE_INTERVAL_SECS", 86_400)?);
        let cleanup_interval =
            Duration::from_secs(parse_or(&reader, "ORGSYNC_CLEANUP_INTERVAL_SECS", 3_600)?);
        let retention_days: i64 = parse_or(&reader, "ORGSYNC_SUCCESS_RETENTION_DAYS", 7)?;
        let success_retention = retention_from_days(retention_days).ok_or_else(|| {
            ConfigError::InvalidValue(
                "ORGSYNC_SUCCESS_RETENTION_DAYS".into(),
                format!("must be between 1 and {MAX_RETENTION_DAYS}, got {retention_days}"),
            )
        })?;
        let page_size = parse_or(&reader, "ORGSYNC_PAGE_SIZE", 500)?;

        let cvr = match reader("ORGSYNC_CVR") {
            Ok(value) => Some(value.parse::<Cvr>().map_err(|e| {
                ConfigError::InvalidValue("ORGSYNC_CVR".into(), e.to_string())
            })?),
            Err(_) => None,
        };

        let filter = FilterConfig {
            root_dn: reader("ORGSYNC_ROOT_DN").ok().filter(|s| !s.trim().is_empty()),
            excluded_subtrees: split_list(reader("ORGSYNC_EXCLUDED_SUBTREES").ok(), ';'),
            required_orgunit_attributes: split_list(
                reader("ORGSYNC_REQUIRED_ORGUNIT_ATTRIBUTES").ok(),
                ',',
            ),
            required_user_attributes: split_list(
                reader("ORGSYNC_REQUIRED_USER_ATTRIBUTES").ok(),
                ',',
            ),
            skip_disabled_users: parse_or(&reader, "ORGSYNC_SKIP_DISABLED_USERS", true)?,
            exclude_marker_attribute: reader("ORGSYNC_EXCLUDE_MARKER_ATTRIBUTE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        Ok(Self {
            database_url,
            workers,
            item_timeout,
            drain_interval,
            directory_sync_interval,
            reconcile_interval,
            cleanup_interval,
            success_retention,
            page_size,
            cvr,
            filter,
        })
    }
}

fn parse_or<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn split_list(value: Option<String>, separator: char) -> Vec<String> {
    value
        .map(|v| {
            v.split(separator)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Create a reader closure from a HashMap (no global env mutation).
    fn make_reader(vars: HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        let owned: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| owned.get(key).cloned().ok_or(VarError::NotPresent)
    }

    #[test]
    fn test_missing_database_url() {
        let err = EngineConfig::from_reader(make_reader(HashMap::new())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
        assert!(err.to_string().contains("ORGSYNC_DATABASE_URL"));
    }

    #[test]
    fn test_defaults() {
        let reader = make_reader(HashMap::from([("ORGSYNC_DATABASE_URL", "sqlite::memory:")]));

        let config = EngineConfig::from_reader(reader).expect("should succeed with defaults");
        assert_eq!(config.workers, 10);
        assert_eq!(config.item_timeout, Duration::from_secs(15));
        assert_eq!(config.drain_interval, Duration::from_secs(60));
        assert_eq!(config.directory_sync_interval, Duration::from_secs(300));
        assert_eq!(config.reconcile_interval, Duration::from_secs(86_400));
        assert_eq!(config.cleanup_interval, Duration::from_secs(3_600));
        assert_eq!(config.success_retention, chrono::Duration::days(7));
        assert_eq!(config.page_size, 500);
        assert!(config.cvr.is_none());
        assert!(config.filter.root_dn.is_none());
        assert!(config.filter.excluded_subtrees.is_empty());
        assert!(config.filter.skip_disabled_users);
    }

    #[test]
    fn test_custom_values() {
        let reader = make_reader(HashMap::from([
            ("ORGSYNC_DATABASE_URL", "sqlite://orgsync.db"),
            ("ORGSYNC_WORKERS", "4"),
            ("ORGSYNC_ITEM_TIMEOUT_SECS", "5"),
            ("ORGSYNC_PAGE_SIZE", "100"),
            ("ORGSYNC_CVR", "29189846"),
            ("ORGSYNC_ROOT_DN", "OU=Kommune,DC=example,DC=local"),
            (
                "ORGSYNC_EXCLUDED_SUBTREES",
                "OU=Disabled,OU=Kommune,DC=example,DC=local; OU=Service,OU=Kommune,DC=example,DC=local",
            ),
            ("ORGSYNC_REQUIRED_USER_ATTRIBUTES", "mail, employeeID"),
            ("ORGSYNC_SKIP_DISABLED_USERS", "false"),
            ("ORGSYNC_EXCLUDE_MARKER_ATTRIBUTE", "extensionAttribute15"),
        ]));

        let config = EngineConfig::from_reader(reader).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.item_timeout, Duration::from_secs(5));
        assert_eq!(config.page_size, 100);
        assert_eq!(config.cvr.unwrap().as_str(), "29189846");
        assert_eq!(config.filter.excluded_subtrees.len(), 2);
        assert_eq!(
            config.filter.required_user_attributes,
            vec!["mail".to_string(), "employeeID".to_string()]
        );
        assert!(config.filter.required_orgunit_attributes.is_empty());
        assert!(!config.filter.skip_disabled_users);
        assert_eq!(
            config.filter.exclude_marker_attribute.as_deref(),
            Some("extensionAttribute15")
        );
    }

    #[test]
    fn test_invalid_workers() {
        let reader = make_reader(HashMap::from([
            ("ORGSYNC_DATABASE_URL", "sqlite::memory:"),
            ("ORGSYNC_WORKERS", "0"),
        ]));
        let err = EngineConfig::from_reader(reader).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("ORGSYNC_WORKERS"));
    }

    #[test]
    fn test_retention_days_out_of_range() {
        for days in ["0", "-3", "999999999999999"] {
            let reader = make_reader(HashMap::from([
                ("ORGSYNC_DATABASE_URL", "sqlite::memory:"),
                ("ORGSYNC_SUCCESS_RETENTION_DAYS", days),
            ]));
            let err = EngineConfig::from_reader(reader).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(..)), "{days}");
            assert!(err.to_string().contains("ORGSYNC_SUCCESS_RETENTION_DAYS"));
        }
    }

    #[test]
    fn test_retention_days_bounds() {
        assert_eq!(retention_from_days(1), Some(chrono::Duration::days(1)));
        assert_eq!(
            retention_from_days(MAX_RETENTION_DAYS),
            Some(chrono::Duration::days(MAX_RETENTION_DAYS))
        );
        assert!(retention_from_days(MAX_RETENTION_DAYS + 1).is_none());
        assert!(retention_from_days(i64::MIN).is_none());
    }

    #[test]
    fn test_invalid_number() {
        let reader = make_reader(HashMap::from([
            ("ORGSYNC_DATABASE_URL", "sqlite::memory:"),
            ("ORGSYNC_PAGE_SIZE", "lots"),
        ]));
        let err = EngineConfig::from_reader(reader).unwrap_err();
        assert!(err.to_string().contains("ORGSYNC_PAGE_SIZE"));
    }

    #[test]
    fn test_invalid_cvr() {
        let reader = make_reader(HashMap::from([
            ("ORGSYNC_DATABASE_URL", "sqlite::memory:"),
            ("ORGSYNC_CVR", "1234"),
        ]));
        let err = EngineConfig::from_reader(reader).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("ORGSYNC_CVR"));
    }
}
