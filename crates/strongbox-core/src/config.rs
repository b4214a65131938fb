//! Configuration module for Strongbox.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ChunkerConfig;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Strongbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub rate_limiting: RateLimitingConfig,
    pub logging: LoggingConfig,
}

/// Remote server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the server API.
    pub api_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Retries after a transport failure before giving up.
    pub max_retries: u32,
    /// First retry delay in milliseconds; doubles on each attempt.
    pub retry_base_delay_ms: u64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between background syncs. `0` disables the timer.
    pub auto_sync_interval_secs: u64,
    /// How many times a sync restarts after the server reports a stale version.
    pub max_merge_attempts: u32,
    /// Concurrent document downloads during a pull.
    pub parallel_transfers: usize,
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the metadata database.
    pub data_dir: PathBuf,
    /// Smallest chunk produced by the content-defined chunker, in bytes.
    pub chunk_min_bytes: usize,
    /// Target average chunk size, in bytes.
    pub chunk_avg_bytes: usize,
    /// Largest chunk, in bytes.
    pub chunk_max_bytes: usize,
}

/// Client-side request throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    pub requests_per_second: u32,
    pub burst: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Path to the log file.
    pub file: PathBuf,
    /// Maximum size of a single log file (in MiB) before rotation.
    pub max_size_mb: u64,
    /// Maximum number of rotated log files to keep.
    pub max_files: u32,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/strongbox/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("strongbox")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            max_retries: 5,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_interval_secs: 300,
            max_merge_attempts: 10,
            parallel_transfers: 4,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let chunker = ChunkerConfig::default();
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("strongbox"),
            chunk_min_bytes: chunker.min_size,
            chunk_avg_bytes: chunker.avg_size,
            chunk_max_bytes: chunker.max_size,
        }
    }
}

impl StorageConfig {
    /// Chunker bounds described by this section.
    pub fn chunker(&self) -> ChunkerConfig {
        ChunkerConfig {
            min_size: self.chunk_min_bytes,
            avg_size: self.chunk_avg_bytes,
            max_size: self.chunk_max_bytes,
        }
    }

    /// Path of the SQLite database inside `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("strongbox.db")
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 20,
            burst: 40,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("strongbox")
                .join("strongbox.log"),
            max_size_mb: 50,
            max_files: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error with the offending field path and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the field, e.g. `"server.api_url"`.
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return a list of errors (empty == valid).
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- server ---
        if !(self.server.api_url.starts_with("http://")
            || self.server.api_url.starts_with("https://"))
        {
            errors.push(ValidationError {
                field: "server.api_url".into(),
                message: format!(
                    "'{}' must start with http:// or https://",
                    self.server.api_url
                ),
            });
        }
        positive(
            &mut errors,
            "server.request_timeout_secs",
            self.server.request_timeout_secs,
        );
        positive(
            &mut errors,
            "server.retry_base_delay_ms",
            self.server.retry_base_delay_ms,
        );

        // --- sync ---
        positive(
            &mut errors,
            "sync.max_merge_attempts",
            self.sync.max_merge_attempts.into(),
        );
        positive(
            &mut errors,
            "sync.parallel_transfers",
            self.sync.parallel_transfers as u64,
        );

        // --- storage ---
        positive(
            &mut errors,
            "storage.chunk_min_bytes",
            self.storage.chunk_min_bytes as u64,
        );
        if self.storage.chunk_min_bytes > self.storage.chunk_avg_bytes
            || self.storage.chunk_avg_bytes > self.storage.chunk_max_bytes
        {
            errors.push(ValidationError {
                field: "storage.chunk_avg_bytes".into(),
                message: format!(
                    "chunk sizes must satisfy min ({}) <= avg ({}) <= max ({})",
                    self.storage.chunk_min_bytes,
                    self.storage.chunk_avg_bytes,
                    self.storage.chunk_max_bytes
                ),
            });
        }
        if !self.storage.chunk_avg_bytes.is_power_of_two() {
            errors.push(ValidationError {
                field: "storage.chunk_avg_bytes".into(),
                message: format!(
                    "{} is not a power of two",
                    self.storage.chunk_avg_bytes
                ),
            });
        }

        // --- rate_limiting ---
        positive(
            &mut errors,
            "rate_limiting.requests_per_second",
            self.rate_limiting.requests_per_second.into(),
        );
        if self.rate_limiting.burst < self.rate_limiting.requests_per_second {
            errors.push(ValidationError {
                field: "rate_limiting.burst".into(),
                message: format!(
                    "burst ({}) must not be below requests_per_second ({})",
                    self.rate_limiting.burst, self.rate_limiting.requests_per_second
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        positive(&mut errors, "logging.max_size_mb", self.logging.max_size_mb);
        positive(&mut errors, "logging.max_files", self.logging.max_files.into());

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use strongbox_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .server_api_url("https://api.example.com")
///     .storage_data_dir(PathBuf::from("/tmp/strongbox"))
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn server_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.server.api_url = url.into();
        self
    }

    pub fn server_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.server.request_timeout_secs = seconds;
        self
    }

    pub fn server_max_retries(mut self, n: u32) -> Self {
        self.config.server.max_retries = n;
        self
    }

    pub fn server_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.server.retry_base_delay_ms = ms;
        self
    }

    // --- sync ---

    pub fn sync_auto_sync_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.auto_sync_interval_secs = seconds;
        self
    }

    pub fn sync_max_merge_attempts(mut self, n: u32) -> Self {
        self.config.sync.max_merge_attempts = n;
        self
    }

    pub fn sync_parallel_transfers(mut self, n: usize) -> Self {
        self.config.sync.parallel_transfers = n;
        self
    }

    // --- storage ---

    pub fn storage_data_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.data_dir = dir;
        self
    }

    pub fn storage_chunk_bounds(mut self, min: usize, avg: usize, max: usize) -> Self {
        self.config.storage.chunk_min_bytes = min;
        self.config.storage.chunk_avg_bytes = avg;
        self.config.storage.chunk_max_bytes = max;
        self
    }

    // --- rate_limiting ---

    pub fn rate_limiting_requests_per_second(mut self, n: u32) -> Self {
        self.config.rate_limiting.requests_per_second = n;
        self
    }

    pub fn rate_limiting_burst(mut self, n: u32) -> Self {
        self.config.rate_limiting.burst = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = file;
        self
    }

    pub fn logging_max_size_mb(mut self, mb: u64) -> Self {
        self.config.logging.max_size_mb = mb;
        self
    }

    pub fn logging_max_files(mut self, n: u32) -> Self {
        self.config.logging.max_files = n;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.server.api_url, "http://localhost:8000");
        assert_eq!(cfg.server.request_timeout_secs, 30);
        assert_eq!(cfg.server.max_retries, 5);
        assert_eq!(cfg.server.retry_base_delay_ms, 1000);
        assert_eq!(cfg.sync.auto_sync_interval_secs, 300);
        assert_eq!(cfg.sync.max_merge_attempts, 10);
        assert_eq!(cfg.sync.parallel_transfers, 4);
        assert!(cfg.storage.data_dir.to_string_lossy().contains("strongbox"));
        assert_eq!(cfg.storage.chunk_min_bytes, 2 * 1024);
        assert_eq!(cfg.storage.chunk_avg_bytes, 8 * 1024);
        assert_eq!(cfg.storage.chunk_max_bytes, 64 * 1024);
        assert_eq!(cfg.rate_limiting.requests_per_second, 20);
        assert_eq!(cfg.rate_limiting.burst, 40);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.max_size_mb, 50);
        assert_eq!(cfg.logging.max_files, 5);
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    #[test]
    fn storage_helpers() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/tmp/sb"),
            chunk_min_bytes: 1024,
            chunk_avg_bytes: 4096,
            chunk_max_bytes: 16384,
        };
        assert_eq!(storage.database_path(), PathBuf::from("/tmp/sb/strongbox.db"));
        let chunker = storage.chunker();
        assert_eq!(chunker.min_size, 1024);
        assert_eq!(chunker.avg_size, 4096);
        assert_eq!(chunker.max_size, 16384);
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
server:
  api_url: https://api.example.com
  request_timeout_secs: 10
  max_retries: 2
  retry_base_delay_ms: 250
sync:
  auto_sync_interval_secs: 0
  max_merge_attempts: 3
  parallel_transfers: 8
storage:
  data_dir: /tmp/strongbox-test
  chunk_min_bytes: 1024
  chunk_avg_bytes: 4096
  chunk_max_bytes: 32768
rate_limiting:
  requests_per_second: 5
  burst: 10
logging:
  level: debug
  file: /tmp/test.log
  max_size_mb: 25
  max_files: 3
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.server.api_url, "https://api.example.com");
        assert_eq!(cfg.server.request_timeout_secs, 10);
        assert_eq!(cfg.server.max_retries, 2);
        assert_eq!(cfg.server.retry_base_delay_ms, 250);
        assert_eq!(cfg.sync.auto_sync_interval_secs, 0);
        assert_eq!(cfg.sync.max_merge_attempts, 3);
        assert_eq!(cfg.sync.parallel_transfers, 8);
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/tmp/strongbox-test"));
        assert_eq!(cfg.storage.chunk_avg_bytes, 4096);
        assert_eq!(cfg.rate_limiting.requests_per_second, 5);
        assert_eq!(cfg.rate_limiting.burst, 10);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.file, PathBuf::from("/tmp/test.log"));
        assert_eq!(cfg.logging.max_files, 3);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let yaml = "server:\n  api_url: https://sb.example.org\n";
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.server.api_url, "https://sb.example.org");
        assert_eq!(cfg.server.max_retries, 5);
        assert_eq!(cfg.sync.max_merge_attempts, 10);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.auto_sync_interval_secs, 300);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        let result = Config::load(tmp.path());
        assert!(result.is_err());
    }

    #[test]
    fn default_path_ends_with_strongbox_config() {
        let path = Config::default_path();
        assert!(path.ends_with("strongbox/config.yaml"));
    }

    // -- Validation --

    #[test]
    fn validate_catches_bad_api_url() {
        let mut cfg = Config::default();
        cfg.server.api_url = "ftp://example.com".into();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "server.api_url"));
    }

    #[test]
    fn validate_catches_zero_values() {
        let mut cfg = Config::default();
        cfg.server.request_timeout_secs = 0;
        cfg.sync.max_merge_attempts = 0;
        cfg.sync.parallel_transfers = 0;
        cfg.rate_limiting.requests_per_second = 0;
        cfg.logging.max_size_mb = 0;
        cfg.logging.max_files = 0;
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"server.request_timeout_secs"));
        assert!(fields.contains(&"sync.max_merge_attempts"));
        assert!(fields.contains(&"sync.parallel_transfers"));
        assert!(fields.contains(&"rate_limiting.requests_per_second"));
        assert!(fields.contains(&"logging.max_size_mb"));
        assert!(fields.contains(&"logging.max_files"));
    }

    #[test]
    fn zero_auto_sync_interval_is_valid() {
        let mut cfg = Config::default();
        cfg.sync.auto_sync_interval_secs = 0;
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn validate_catches_unordered_chunk_bounds() {
        let mut cfg = Config::default();
        cfg.storage.chunk_min_bytes = 16 * 1024;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "storage.chunk_avg_bytes"));
    }

    #[test]
    fn validate_catches_non_power_of_two_average() {
        let mut cfg = Config::default();
        cfg.storage.chunk_avg_bytes = 5000;
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "storage.chunk_avg_bytes" && e.message.contains("power of two")));
    }

    #[test]
    fn validate_catches_small_burst() {
        let mut cfg = Config::default();
        cfg.rate_limiting.burst = 1;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "rate_limiting.burst"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".into();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "server.api_url".into(),
            message: "bad".into(),
        };
        assert_eq!(err.to_string(), "server.api_url: bad");
    }

    // -- Builder --

    #[test]
    fn builder_overrides_defaults() {
        let cfg = ConfigBuilder::new()
            .server_api_url("https://api.example.com")
            .server_request_timeout_secs(5)
            .server_max_retries(1)
            .server_retry_base_delay_ms(10)
            .sync_auto_sync_interval_secs(0)
            .sync_max_merge_attempts(2)
            .sync_parallel_transfers(1)
            .storage_data_dir(PathBuf::from("/tmp/sb"))
            .storage_chunk_bounds(512, 1024, 4096)
            .rate_limiting_requests_per_second(100)
            .rate_limiting_burst(100)
            .logging_level("warn")
            .logging_file(PathBuf::from("/tmp/sb.log"))
            .logging_max_size_mb(1)
            .logging_max_files(1)
            .build();

        assert_eq!(cfg.server.api_url, "https://api.example.com");
        assert_eq!(cfg.server.request_timeout_secs, 5);
        assert_eq!(cfg.server.max_retries, 1);
        assert_eq!(cfg.server.retry_base_delay_ms, 10);
        assert_eq!(cfg.sync.auto_sync_interval_secs, 0);
        assert_eq!(cfg.sync.max_merge_attempts, 2);
        assert_eq!(cfg.sync.parallel_transfers, 1);
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/tmp/sb"));
        assert_eq!(cfg.storage.chunk_min_bytes, 512);
        assert_eq!(cfg.storage.chunk_max_bytes, 4096);
        assert_eq!(cfg.rate_limiting.requests_per_second, 100);
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.logging.file, PathBuf::from("/tmp/sb.log"));
    }

    #[test]
    fn build_validated_rejects_invalid() {
        let result = ConfigBuilder::new().logging_level("loud").build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "logging.level");
    }

    #[test]
    fn build_validated_accepts_defaults() {
        assert!(ConfigBuilder::default().build_validated().is_ok());
    }

    #[test]
    fn config_roundtrips_through_yaml() {
        let cfg = ConfigBuilder::new().server_api_url("https://x.test").build();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.server.api_url, "https://x.test");
        assert_eq!(back.storage.chunk_avg_bytes, cfg.storage.chunk_avg_bytes);
    }
}
