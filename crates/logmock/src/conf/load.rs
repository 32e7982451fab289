//! Load — config loading from file and environment variables.

use std::path::{Path, PathBuf};

use super::model::{AppConfig, OtlpConfig};
use super::ConfigError;

pub const CONFIG_FILE_ENV: &str = "LOGMOCK_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "/etc/logmock/logmock.toml";

impl AppConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::from_env()
        };

        // Environment variables override file config for paths
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();
        Self {
            uploads_dir: env_path("LOGMOCK_UPLOADS_DIR").unwrap_or(defaults.uploads_dir),
            generated_dir: env_path("LOGMOCK_GENERATED_DIR").unwrap_or(defaults.generated_dir),
            sample_dir: env_path("LOGMOCK_SAMPLE_DIR").unwrap_or(defaults.sample_dir),
            output_log_path: env_path("LOGMOCK_OUTPUT_LOG").unwrap_or(defaults.output_log_path),
            detection_sample_lines: std::env::var("LOGMOCK_DETECTION_SAMPLE_LINES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.detection_sample_lines),
            otlp: OtlpConfig::from_env(),
            startup_replay: None,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(dir) = env_path("LOGMOCK_UPLOADS_DIR") {
            self.uploads_dir = dir;
        }
        if let Some(dir) = env_path("LOGMOCK_GENERATED_DIR") {
            self.generated_dir = dir;
        }
        if let Some(dir) = env_path("LOGMOCK_SAMPLE_DIR") {
            self.sample_dir = dir;
        }
        if let Some(path) = env_path("LOGMOCK_OUTPUT_LOG") {
            self.output_log_path = path;
        }
    }
}

impl OtlpConfig {
    /// Load OTLP settings from environment variables
    pub fn from_env() -> Self {
        let defaults = OtlpConfig::default();
        Self {
            timeout_secs: std::env::var("LOGMOCK_OTLP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            service_name: std::env::var("LOGMOCK_SERVICE_NAME").unwrap_or(defaults.service_name),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}
