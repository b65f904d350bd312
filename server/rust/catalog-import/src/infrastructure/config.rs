use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::database::DatabaseConfig;

/// Config はアプリケーション全体の設定。
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// YAML ファイルから設定を読み込む。
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path, e))?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

/// AppConfig はアプリケーション設定。
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

/// ServerConfig はサーバー設定。
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// StorageConfig はアップロード済みファイルの保存先設定。
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_file_size_mb() -> u64 {
    50
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl StorageConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// ImportConfig はインポートパイプライン固有の設定。
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_validation_batch_size")]
    pub validation_batch_size: usize,
    #[serde(default = "default_commit_batch_size")]
    pub commit_batch_size: usize,
    #[serde(default = "default_commit_concurrency")]
    pub commit_concurrency: usize,
    #[serde(default = "default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
    #[serde(default)]
    pub purge_staging_on_complete: bool,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_validation_batch_size() -> usize {
    500
}

fn default_commit_batch_size() -> usize {
    100
}

fn default_commit_concurrency() -> usize {
    4
}

fn default_watchdog_interval_secs() -> u64 {
    30
}

fn default_stall_timeout_secs() -> u64 {
    900
}

fn default_event_buffer() -> usize {
    256
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            validation_batch_size: default_validation_batch_size(),
            commit_batch_size: default_commit_batch_size(),
            commit_concurrency: default_commit_concurrency(),
            watchdog_interval_secs: default_watchdog_interval_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
            purge_staging_on_complete: false,
            event_buffer: default_event_buffer(),
        }
    }
}

impl ImportConfig {
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs.max(1))
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs.max(1))
    }
}

/// LoggingConfig はログ出力設定。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
