use anyhow::{anyhow, bail, ensure};
use config::{Config, ConfigError, Environment, Map};
use keepalive_database::{ClusterConfig, StoreBackend};
use keepalive_models::{OperationMode, ReadTarget};
use serde::Deserialize;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{KeepaliveError, KeepaliveResult};

pub const DEFAULT_CONNECTION_STRING: &str = "localhost";
pub const DEFAULT_BUCKET_NAME: &str = "default";
pub const DEFAULT_SCOPE_NAME: &str = "_default";
pub const DEFAULT_COLLECTION_NAME: &str = "_default";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DOCUMENT_EXPIRY: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_COUNTER_DOCUMENT_ID: &str = "keepalive-counter";

/// Longest accepted duration, matching Go's `time.Duration` (i64 nanoseconds).
pub const MAX_DURATION: Duration = Duration::from_nanos(i64::MAX as u64);

/// Prefix of the legacy variable names, e.g. `COUCHBASE_USERNAME`.
const LEGACY_PREFIX: &str = "COUCHBASE";

#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    pub cluster: ClusterConfig,
    pub interval: Duration,
    pub operation_timeout: Duration,
    pub document_expiry: Duration,
    pub operation_mode: OperationMode,
    pub read_target: ReadTarget,
    pub counter_document_id: String,
    pub logging: LoggingConfig,
    /// Values that were rejected and replaced by their defaults. Loading
    /// happens before logging is up, so these are logged by the caller.
    pub warnings: Vec<String>,
    /// `.env` file the environment was supplemented from, if any
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Variables as read from the environment, before validation.
#[derive(Debug, Deserialize)]
struct RawSettings {
    connection_string: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    bucket_name: String,
    scope_name: String,
    collection_name: String,
    interval: String,
    operation_timeout: String,
    document_expiry: String,
    operation_mode: String,
    read_target: String,
    counter_document_id: String,
    store_backend: String,
    log_level: String,
    log_format: String,
    log_file: Option<String>,
}

impl KeepaliveConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> KeepaliveResult<Self> {
        let env_file = dotenvy::dotenv().ok();
        let mut config = Self::from_source(None)?;
        config.env_file = env_file;
        Ok(config)
    }

    /// Reads configuration from `vars` instead of the process environment.
    pub fn from_vars(vars: Map<String, String>) -> KeepaliveResult<Self> {
        Self::from_source(Some(vars))
    }

    fn from_source(vars: Option<Map<String, String>>) -> KeepaliveResult<Self> {
        let raw = read_raw(vars)?;

        // The only hard requirement; everything else has a default
        if raw.username.trim().is_empty() || raw.password.trim().is_empty() {
            return Err(KeepaliveError::configuration("USERNAME and PASSWORD are required"));
        }

        let mut warnings = Vec::new();
        let interval =
            duration_or_default("INTERVAL", &raw.interval, DEFAULT_INTERVAL, &mut warnings);
        let operation_timeout = duration_or_default(
            "OPERATION_TIMEOUT",
            &raw.operation_timeout,
            DEFAULT_OPERATION_TIMEOUT,
            &mut warnings,
        );
        let document_expiry = duration_or_default(
            "DOCUMENT_EXPIRY",
            &raw.document_expiry,
            DEFAULT_DOCUMENT_EXPIRY,
            &mut warnings,
        );
        let operation_mode = parse_or_default("OPERATION_MODE", &raw.operation_mode, &mut warnings);
        let read_target = parse_or_default("READ_TARGET", &raw.read_target, &mut warnings);
        let backend =
            parse_or_default::<StoreBackend>("STORE_BACKEND", &raw.store_backend, &mut warnings);

        Ok(Self {
            cluster: ClusterConfig {
                connection_string: raw.connection_string,
                username: raw.username,
                password: raw.password,
                bucket_name: raw.bucket_name,
                scope_name: raw.scope_name,
                collection_name: raw.collection_name,
                connect_timeout: operation_timeout,
                backend,
            },
            interval,
            operation_timeout,
            document_expiry,
            operation_mode,
            read_target,
            counter_document_id: raw.counter_document_id,
            logging: LoggingConfig {
                level: raw.log_level,
                format: raw.log_format,
                file_path: raw.log_file.filter(|path| !path.trim().is_empty()),
            },
            warnings,
            env_file: None,
        })
    }

    /// Emits the load-time notes and warnings; call once logging is initialized.
    pub fn log_warnings(&self) {
        match &self.env_file {
            Some(path) => tracing::info!("Loaded environment from {}", path.display()),
            None => tracing::info!("No .env file found, using system environment variables"),
        }
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
    }
}

fn read_raw(vars: Option<Map<String, String>>) -> KeepaliveResult<RawSettings> {
    let settings = Config::builder()
        .set_default("connection_string", DEFAULT_CONNECTION_STRING)?
        .set_default("bucket_name", DEFAULT_BUCKET_NAME)?
        .set_default("scope_name", DEFAULT_SCOPE_NAME)?
        .set_default("collection_name", DEFAULT_COLLECTION_NAME)?
        .set_default("interval", "5m")?
        .set_default("operation_timeout", "10s")?
        .set_default("document_expiry", "1h")?
        .set_default("operation_mode", OperationMode::default().as_str())?
        .set_default("read_target", ReadTarget::default().as_str())?
        .set_default("counter_document_id", DEFAULT_COUNTER_DOCUMENT_ID)?
        .set_default("store_backend", StoreBackend::default().as_str())?
        .set_default("log_level", "info")?
        .set_default("log_format", "pretty")?
        // Legacy prefixed names first so the plain names win
        .add_source(
            Environment::with_prefix(LEGACY_PREFIX)
                .ignore_empty(true)
                .source(vars.clone()),
        )
        .add_source(Environment::default().ignore_empty(true).source(vars))
        .build()?;

    Ok(settings.try_deserialize()?)
}

fn duration_or_default(
    name: &str,
    raw: &str,
    default: Duration,
    warnings: &mut Vec<String>,
) -> Duration {
    match parse_duration(raw) {
        Ok(duration) => duration,
        Err(e) => {
            warnings.push(format!(
                "Invalid {} '{}' ({}), using default {:?}",
                name, raw, e, default
            ));
            default
        }
    }
}

fn parse_or_default<T>(name: &str, raw: &str, warnings: &mut Vec<String>) -> T
where
    T: FromStr + Default + Display,
    T::Err: Display,
{
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            let default = T::default();
            warnings.push(format!("Invalid {} '{}' ({}), using default {}", name, raw, e, default));
            default
        }
    }
}

/// Parses a Go-style duration such as `"5m"`, `"10s"`, `"250ms"` or `"1h30m"`.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    ensure!(!s.is_empty(), "Empty duration");

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let split_index = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| anyhow!("Missing unit in duration: {}", s))?;
        ensure!(split_index > 0, "Invalid duration format: {}", s);

        let (value_str, tail) = rest.split_at(split_index);
        let value: u64 = value_str
            .parse()
            .map_err(|_| anyhow!("Invalid duration value: {}", value_str))?;

        let unit_end = tail.find(|c: char| c.is_ascii_digit()).unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let part = match unit {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(60 * 60).map(Duration::from_secs),
            _ => bail!("Invalid duration unit: '{}'. Expected 'ms', 's', 'm' or 'h'.", unit),
        };

        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| anyhow!("Duration out of range: {}", s))?;
        rest = tail;
    }

    ensure!(!total.is_zero(), "Duration must be greater than zero: {}", s);
    ensure!(total <= MAX_DURATION, "Duration out of range: {}", s);
    Ok(total)
}

impl From<ConfigError> for KeepaliveError {
    fn from(error: ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vars(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn with_credentials(extra: &[(&str, &str)]) -> Map<String, String> {
        let mut map = vars(&[("USERNAME", "keepalive"), ("PASSWORD", "secret")]);
        map.extend(vars(extra));
        map
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration(" 2m10s ").unwrap(), Duration::from_secs(130));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("m5").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("five minutes").is_err());
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert!(parse_duration("18000000000000000000s").is_err());
        assert!(parse_duration("2562048h").is_err());
        assert!(parse_duration("18446744073709551615ms").is_err());
        assert_eq!(parse_duration("2562047h").unwrap(), Duration::from_secs(2_562_047 * 3600));
    }

    #[test]
    fn test_oversized_interval_falls_back() {
        let config =
            KeepaliveConfig::from_vars(with_credentials(&[("INTERVAL", "18000000000000000000s")]))
                .unwrap();

        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("out of range"));
    }

    #[test]
    fn test_defaults() {
        let config = KeepaliveConfig::from_vars(with_credentials(&[])).unwrap();

        assert_eq!(config.cluster.connection_string, "localhost");
        assert_eq!(config.cluster.bucket_name, "default");
        assert_eq!(config.cluster.scope_name, "_default");
        assert_eq!(config.cluster.collection_name, "_default");
        assert_eq!(config.cluster.backend, StoreBackend::Redis);
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.operation_timeout, DEFAULT_OPERATION_TIMEOUT);
        assert_eq!(config.document_expiry, DEFAULT_DOCUMENT_EXPIRY);
        assert_eq!(config.operation_mode, OperationMode::Random);
        assert_eq!(config.read_target, ReadTarget::Latest);
        assert_eq!(config.counter_document_id, DEFAULT_COUNTER_DOCUMENT_ID);
        assert_eq!(config.logging, LoggingConfig::default());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_explicit_values() {
        let config = KeepaliveConfig::from_vars(with_credentials(&[
            ("CONNECTION_STRING", "rediss://cluster.example:6380"),
            ("BUCKET_NAME", "travel"),
            ("SCOPE_NAME", "inventory"),
            ("COLLECTION_NAME", "pings"),
            ("INTERVAL", "30s"),
            ("OPERATION_TIMEOUT", "2s"),
            ("OPERATION_MODE", "increment"),
            ("READ_TARGET", "random"),
            ("STORE_BACKEND", "memory"),
            ("LOG_FORMAT", "json"),
            ("LOG_FILE", "/tmp/keepalive.log"),
        ]))
        .unwrap();

        assert_eq!(config.cluster.connection_string, "rediss://cluster.example:6380");
        assert_eq!(config.cluster.bucket_name, "travel");
        assert_eq!(config.cluster.scope_name, "inventory");
        assert_eq!(config.cluster.collection_name, "pings");
        assert_eq!(config.cluster.backend, StoreBackend::Memory);
        assert_eq!(config.cluster.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.operation_timeout, Duration::from_secs(2));
        assert_eq!(config.operation_mode, OperationMode::Increment);
        assert_eq!(config.read_target, ReadTarget::Random);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.file_path.as_deref(), Some("/tmp/keepalive.log"));
    }

    #[test]
    fn test_missing_username_is_fatal() {
        let err = KeepaliveConfig::from_vars(vars(&[("PASSWORD", "secret")])).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_missing_password_is_fatal() {
        let err = KeepaliveConfig::from_vars(vars(&[("USERNAME", "keepalive")])).unwrap_err();
        assert!(matches!(err, KeepaliveError::Configuration { .. }));
    }

    #[test]
    fn test_empty_credentials_are_fatal() {
        let err =
            KeepaliveConfig::from_vars(vars(&[("USERNAME", ""), ("PASSWORD", "")])).unwrap_err();
        assert!(matches!(err, KeepaliveError::Configuration { .. }));
    }

    #[test]
    fn test_legacy_prefixed_names() {
        let config = KeepaliveConfig::from_vars(vars(&[
            ("COUCHBASE_USERNAME", "legacy"),
            ("COUCHBASE_PASSWORD", "secret"),
            ("COUCHBASE_BUCKET_NAME", "old-bucket"),
            ("BUCKET_NAME", "new-bucket"),
        ]))
        .unwrap();

        assert_eq!(config.cluster.username, "legacy");
        // Plain names take precedence over the prefixed ones
        assert_eq!(config.cluster.bucket_name, "new-bucket");
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let env = with_credentials(&[("BUCKET_NAME", ""), ("INTERVAL", "")]);
        let config = KeepaliveConfig::from_vars(env).unwrap();

        assert_eq!(config.cluster.bucket_name, "default");
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn test_malformed_durations_fall_back() {
        let config = KeepaliveConfig::from_vars(with_credentials(&[
            ("INTERVAL", "every now and then"),
            ("OPERATION_TIMEOUT", "10"),
            ("DOCUMENT_EXPIRY", "1d"),
        ]))
        .unwrap();

        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.operation_timeout, DEFAULT_OPERATION_TIMEOUT);
        assert_eq!(config.document_expiry, DEFAULT_DOCUMENT_EXPIRY);
        assert_eq!(config.warnings.len(), 3);
        assert!(config.warnings[0].contains("INTERVAL"));
    }

    #[test]
    fn test_unknown_policies_fall_back() {
        let config = KeepaliveConfig::from_vars(with_credentials(&[
            ("OPERATION_MODE", "chaos"),
            ("READ_TARGET", "oldest"),
            ("STORE_BACKEND", "couchdb"),
        ]))
        .unwrap();

        assert_eq!(config.operation_mode, OperationMode::Random);
        assert_eq!(config.read_target, ReadTarget::Latest);
        assert_eq!(config.cluster.backend, StoreBackend::Redis);
        assert_eq!(config.warnings.len(), 3);
    }

    proptest! {
        #[test]
        fn malformed_interval_never_aborts(raw in "[a-z ]{1,16}") {
            let env = with_credentials(&[("INTERVAL", raw.as_str())]);
            let config = KeepaliveConfig::from_vars(env).unwrap();
            prop_assert_eq!(config.interval, DEFAULT_INTERVAL);
            prop_assert_eq!(config.warnings.len(), 1);
        }

        #[test]
        fn composed_durations_add_up(h in 0u64..48, m in 0u64..60, s in 1u64..60) {
            let raw = format!("{}h{}m{}s", h, m, s);
            let expected = Duration::from_secs(h * 3600 + m * 60 + s);
            prop_assert_eq!(parse_duration(&raw).unwrap(), expected);
        }
    }
}
