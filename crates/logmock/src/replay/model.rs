//! Model — replay config, lifecycle states and status snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::source::SourceKind;

use super::error::ReplayError;

pub const DEFAULT_JITTER_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    File,
    Otlp,
    Both,
}

impl SinkMode {
    pub fn uses_file(&self) -> bool {
        matches!(self, SinkMode::File | SinkMode::Both)
    }

    pub fn uses_otlp(&self) -> bool {
        matches!(self, SinkMode::Otlp | SinkMode::Both)
    }
}

impl FromStr for SinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(SinkMode::File),
            "otlp" => Ok(SinkMode::Otlp),
            "both" => Ok(SinkMode::Both),
            other => Err(format!("unknown mode '{}' (expected file, otlp or both)", other)),
        }
    }
}

fn default_jitter_ms() -> u64 {
    DEFAULT_JITTER_MS
}

/// What to replay and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub source: SourceKind,
    /// Source id, file name, `latest` (uploaded only) or `all`
    pub id_or_path: String,
    pub mode: SinkMode,
    pub rate_lines_per_sec: f64,
    #[serde(rename = "loop", default)]
    pub loop_replay: bool,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl ReplayConfig {
    pub fn new(source: SourceKind, id_or_path: impl Into<String>, mode: SinkMode, rate_lines_per_sec: f64) -> Self {
        Self {
            source,
            id_or_path: id_or_path.into(),
            mode,
            rate_lines_per_sec,
            loop_replay: false,
            jitter_ms: DEFAULT_JITTER_MS,
            otlp_endpoint: None,
        }
    }

    pub fn looping(mut self, loop_replay: bool) -> Self {
        self.loop_replay = loop_replay;
        self
    }

    pub fn jitter_ms(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    pub fn otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        if !self.rate_lines_per_sec.is_finite() || self.rate_lines_per_sec <= 0.0 {
            return Err(ReplayError::InvalidConfig(format!(
                "rate_lines_per_sec must be > 0 (got {})",
                self.rate_lines_per_sec
            )));
        }
        if self.id_or_path.trim().is_empty() {
            return Err(ReplayError::InvalidConfig("id_or_path must not be empty".to_string()));
        }

        // An endpoint alongside mode=file is accepted and unused
        if self.mode.uses_otlp() && self.endpoint().is_none() {
            return Err(ReplayError::InvalidConfig(
                "otlp_endpoint is required when mode is otlp or both".to_string(),
            ));
        }
        Ok(())
    }

    /// Trimmed, non-empty OTLP endpoint.
    pub fn endpoint(&self) -> Option<&str> {
        self.otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayState {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl ReplayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplayState::Completed | ReplayState::Stopped | ReplayState::Failed)
    }
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReplayState::Idle => "idle",
            ReplayState::Running => "running",
            ReplayState::Completed => "completed",
            ReplayState::Stopped => "stopped",
            ReplayState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replay-{}", self.0)
    }
}

/// Position of the next line to write: (source index, line offset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub source_index: usize,
    pub line_offset: usize,
}

/// Lines written per sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkCounts {
    pub file: u64,
    pub otlp: u64,
}

/// Non-blocking snapshot of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayStatus {
    pub session_id: Option<SessionId>,
    pub state: ReplayState,
    /// Identifier of the source the cursor is in
    pub source: Option<String>,
    pub cursor: Cursor,
    pub per_sink_counts: SinkCounts,
    /// Non-fatal delivery failures
    pub failures: u64,
    /// Completed passes over the source list (looping only)
    pub cycle: u64,
    pub last_error: Option<String>,
}

impl ReplayStatus {
    pub fn idle() -> Self {
        Self {
            session_id: None,
            state: ReplayState::Idle,
            source: None,
            cursor: Cursor::default(),
            per_sink_counts: SinkCounts::default(),
            failures: 0,
            cycle: 0,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialize_defaults() {
        let cfg: ReplayConfig = serde_json::from_str(
            r#"{"source":"auto-loaded","id_or_path":"all","mode":"file","rate_lines_per_sec":5}"#,
        )
        .unwrap();
        assert_eq!(cfg.source, SourceKind::AutoLoaded);
        assert!(!cfg.loop_replay);
        assert_eq!(cfg.jitter_ms, 100);
        assert!(cfg.otlp_endpoint.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_loop_field_name() {
        let cfg: ReplayConfig = serde_json::from_str(
            r#"{"source":"uploaded","id_or_path":"latest","mode":"file","rate_lines_per_sec":1,"loop":true}"#,
        )
        .unwrap();
        assert!(cfg.loop_replay);
    }

    #[test]
    fn test_validate_rejects_bad_rate() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let cfg = ReplayConfig::new(SourceKind::Uploaded, "latest", SinkMode::File, rate);
            assert!(matches!(cfg.validate(), Err(ReplayError::InvalidConfig(_))), "rate {}", rate);
        }
    }

    #[test]
    fn test_validate_otlp_endpoint_required_for_otlp_modes() {
        let base = ReplayConfig::new(SourceKind::Uploaded, "latest", SinkMode::Both, 10.0);
        assert!(base.validate().is_err());
        assert!(base.clone().otlp_endpoint("http://collector:4318/v1/logs").validate().is_ok());
        assert!(base.clone().otlp_endpoint("   ").validate().is_err());

        let file = ReplayConfig::new(SourceKind::Uploaded, "latest", SinkMode::File, 10.0)
            .otlp_endpoint("http://collector:4318/v1/logs");
        assert!(file.validate().is_ok());
    }

    #[test]
    fn test_mode_routing() {
        assert!(SinkMode::Both.uses_file() && SinkMode::Both.uses_otlp());
        assert!(!SinkMode::File.uses_otlp());
        assert!(!SinkMode::Otlp.uses_file());
        assert_eq!("both".parse::<SinkMode>().unwrap(), SinkMode::Both);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ReplayState::Completed.is_terminal());
        assert!(ReplayState::Stopped.is_terminal());
        assert!(ReplayState::Failed.is_terminal());
        assert!(!ReplayState::Running.is_terminal());
        assert!(!ReplayState::Idle.is_terminal());
    }
}
