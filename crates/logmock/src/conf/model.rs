//! Model — AppConfig and related structs.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parser::DETECTION_SAMPLE_SIZE;
use crate::replay::{EngineSettings, ReplayConfig};
use crate::sink::otlp::DEFAULT_SERVICE_NAME;

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Uploaded `.log` files, ingested at boot as uploaded sources
    pub uploads_dir: PathBuf,
    /// Generated `.jsonl` files, resolved on demand by replay
    pub generated_dir: PathBuf,
    /// Sample `.log`/`.txt` files, ingested at boot as auto-loaded sources
    pub sample_dir: PathBuf,
    pub output_log_path: PathBuf,
    pub detection_sample_lines: usize,
    pub otlp: OtlpConfig,
    pub startup_replay: Option<ReplayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtlpConfig {
    pub timeout_secs: u64,
    pub service_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("/var/lib/logmock/uploads"),
            generated_dir: PathBuf::from("/var/lib/logmock/generated"),
            sample_dir: PathBuf::from("/usr/share/logmock/samples"),
            output_log_path: PathBuf::from("/var/log/logmock/replay.log"),
            detection_sample_lines: DETECTION_SAMPLE_SIZE,
            otlp: OtlpConfig::default(),
            startup_replay: None,
        }
    }
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection_sample_lines == 0 {
            return Err(ConfigError::Invalid("detection_sample_lines must be > 0".to_string()));
        }
        if self.output_log_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_log_path must not be empty".to_string()));
        }
        if self.otlp.timeout_secs == 0 {
            return Err(ConfigError::Invalid("otlp.timeout_secs must be > 0".to_string()));
        }
        if let Some(replay) = &self.startup_replay {
            replay
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("startup_replay: {}", e)))?;
        }
        Ok(())
    }

    /// Settings handed to the replay engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            output_log_path: self.output_log_path.clone(),
            generated_dir: self.generated_dir.clone(),
            otlp_timeout: Duration::from_secs(self.otlp.timeout_secs),
            service_name: self.otlp.service_name.clone(),
        }
    }
}
