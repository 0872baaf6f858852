//! Configuration loading and types for filegate.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, authorization, file policy, object storage, the
//! download counter store, and diagnostics.

use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides `auth.token`.
pub const TOKEN_ENV_VAR: &str = "FILEGATE_AUTH_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Bearer token authorization settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// File naming policy and link expiry.
    #[serde(default)]
    pub files: FilesConfig,

    /// Download link construction.
    #[serde(default)]
    pub links: LinksConfig,

    /// Object storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Download counter store settings.
    #[serde(default)]
    pub counters: CountersConfig,

    /// Diagnostic endpoints and headers.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds. Also bounds the counter queue drain.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Maximum upload request body in bytes (default 100 MiB).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// Authorization settings.
///
/// When `token` is unset, link generation is open and the admin endpoints
/// (upload, reset-stats) reject every request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared secret expected as `Authorization: Bearer <token>`.
    #[serde(default)]
    pub token: Option<String>,
}

/// File policy.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Extensions (without the dot) accepted for upload and download.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Advisory lifetime of generated download links, in seconds.
    #[serde(default = "default_link_expiry")]
    pub link_expiry_seconds: i64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            link_expiry_seconds: default_link_expiry(),
        }
    }
}

/// Download link construction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinksConfig {
    /// Public origin used in generated URLs (e.g. `https://files.example.com`).
    /// Falls back to `http://<Host header>` when unset.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Object storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `local` or `memory`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Local storage configuration.
    #[serde(default)]
    pub local: LocalStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            local: LocalStorageConfig::default(),
        }
    }
}

/// Local filesystem storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    /// Root directory for stored files.
    #[serde(default = "default_storage_root")]
    pub root_dir: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
        }
    }
}

/// Counter store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CountersConfig {
    /// Backend type: `memory` or `sqlite`.
    #[serde(default = "default_counter_backend")]
    pub backend: String,

    /// SQLite-specific configuration.
    #[serde(default)]
    pub sqlite: SqliteConfig,

    /// Capacity of the background increment queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for CountersConfig {
    fn default() -> Self {
        Self {
            backend: default_counter_backend(),
            sqlite: SqliteConfig::default(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// SQLite counter store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_counter_path")]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_counter_path(),
        }
    }
}

/// Diagnostics.
#[derive(Debug, Clone, Deserialize)]
pub struct DebugConfig {
    /// Honour `X-Debug` request headers by echoing resolved keys.
    #[serde(default)]
    pub verbose: bool,

    /// Expose `GET /debug/kv`.
    #[serde(default = "default_true")]
    pub kv_selftest: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            kv_selftest: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_upload_size() -> usize {
    100 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    [
        "pdf", "zip", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "csv", "json", "jpg",
        "jpeg", "png", "gif", "webp", "svg", "mp3", "mp4", "mov", "tar", "gz", "7z", "rar", "exe",
        "dmg", "apk", "iso",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_link_expiry() -> i64 {
    3600
}

fn default_storage_backend() -> String {
    "local".to_string()
}

fn default_storage_root() -> String {
    "./data/files".to_string()
}

fn default_counter_backend() -> String {
    "sqlite".to_string()
}

fn default_counter_path() -> String {
    "./data/counters.db".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
///
/// A missing file yields the defaults. `FILEGATE_AUTH_TOKEN`, when set and
/// non-empty, replaces `auth.token`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let mut config = if path.as_ref().exists() {
        let contents = std::fs::read_to_string(path.as_ref())?;
        parse_config(&contents)?
    } else {
        Config::default()
    };

    if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
        if !token.is_empty() {
            config.auth.token = Some(token);
        }
    }

    Ok(config)
}

/// Parse configuration from YAML text.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.server.port, 8787);
        assert!(config.auth.token.is_none());
        assert!(config.files.allowed_extensions.contains(&"pdf".to_string()));
        assert_eq!(config.files.link_expiry_seconds, 3600);
        assert_eq!(config.storage.backend, "local");
        assert_eq!(config.counters.backend, "sqlite");
        assert!(config.debug.kv_selftest);
        assert!(!config.debug.verbose);
    }

    #[test]
    fn test_partial_sections() {
        let yaml = r#"
server:
  port: 9000
auth:
  token: s3cret
files:
  allowed_extensions: [pdf, ZIP]
counters:
  backend: memory
  queue_capacity: 8
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.token.as_deref(), Some("s3cret"));
        assert_eq!(config.files.allowed_extensions, vec!["pdf", "ZIP"]);
        assert_eq!(config.files.link_expiry_seconds, 3600);
        assert_eq!(config.counters.backend, "memory");
        assert_eq!(config.counters.queue_capacity, 8);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.storage.local.root_dir, "./data/files");
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        assert!(parse_config("server: [unclosed").is_err());
    }

    #[test]
    fn test_example_file_parses() {
        let config = parse_config(include_str!("../filegate.example.yaml")).unwrap();
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.auth.token.as_deref(), Some("change-me"));
        assert!(config.links.base_url.is_none());
        assert_eq!(config.files.allowed_extensions, default_allowed_extensions());
        assert_eq!(config.counters.backend, "sqlite");
        assert!(config.debug.kv_selftest);
    }
}
