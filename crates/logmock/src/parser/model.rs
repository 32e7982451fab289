use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::serde_utils::{deserialize_fields_from_map, serialize_fields_as_map};

/// Input shapes the detector can classify. Declaration order is the
/// detection priority order; `OpaqueFallback` always comes last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatKind {
    /// One JSON object per line with an explicit `event` field
    JsonEvents,
    /// `ansible-playbook` console output (PLAY / TASK headers, host results)
    RawPlaybookOutput,
    /// Controller system log: `2024-01-15 10:30:00 INFO Job 123 ...`
    SystemLog,
    /// Syslog-style service log: `Jan 15 10:30:00 host proc[pid]: ...`
    ServiceLog,
    /// `2024-01-15T10:30:00.000Z INFO [job_123:host] ...`
    StructuredCustom,
    /// Anything else: the whole input becomes one event
    OpaqueFallback,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::JsonEvents => "json-events",
            FormatKind::RawPlaybookOutput => "raw-playbook-output",
            FormatKind::SystemLog => "system-log",
            FormatKind::ServiceLog => "service-log",
            FormatKind::StructuredCustom => "structured-custom",
            FormatKind::OpaqueFallback => "opaque-fallback",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub format: FormatKind,
    /// Share of sampled lines that matched the format's predicate (0.0 - 1.0)
    pub confidence: f32,
}

impl DetectionResult {
    pub fn new(format: FormatKind, confidence: f32) -> Self {
        Self {
            format,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Build a result from a match count over the sampled lines.
    pub fn from_matches(format: FormatKind, matched: usize, sampled: usize) -> Self {
        if sampled == 0 {
            return Self::new(format, 0.0);
        }
        Self::new(format, matched as f32 / sampled as f32)
    }

    /// Every sampled line matched.
    pub fn is_unanimous(&self) -> bool {
        self.confidence >= 1.0
    }

    /// Strictly more than half of the sampled lines matched.
    pub fn is_majority(&self) -> bool {
        self.confidence > super::MAJORITY_THRESHOLD
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("input is empty: nothing to classify")]
    EmptyInput,
}

/// Whether an event came from a line that matched its format's grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    /// Degraded generic event: message is the raw line, other fields defaulted
    Low,
}

/// Event type tags shared by every extractor.
pub mod event_type {
    pub const PLAYBOOK_ON_START: &str = "playbook_on_start";
    pub const PLAY_START: &str = "playbook_on_play_start";
    pub const TASK_START: &str = "playbook_on_task_start";
    pub const HANDLER_TASK_START: &str = "playbook_on_handler_task_start";
    pub const STATS: &str = "playbook_on_stats";
    pub const RUNNER_ON_START: &str = "runner_on_start";
    pub const RUNNER_ON_OK: &str = "runner_on_ok";
    pub const RUNNER_ON_FAILED: &str = "runner_on_failed";
    pub const RUNNER_ON_SKIPPED: &str = "runner_on_skipped";
    pub const RUNNER_ON_UNREACHABLE: &str = "runner_on_unreachable";
    pub const WARNING: &str = "warning";
    pub const VERBOSE: &str = "verbose";

    /// Event types that mark the job as failed when the record carries no explicit flag.
    pub fn implies_failure(event: &str) -> bool {
        matches!(event, RUNNER_ON_FAILED | RUNNER_ON_UNREACHABLE)
    }

    /// Event types that mark the end of a playbook run.
    pub fn is_completion(event: &str) -> bool {
        event == STATS
    }
}

/// Canonical event, independent of the source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub counter: u64,
    pub event: String,
    pub host: Option<String>,
    pub task: Option<String>,
    pub play: Option<String>,
    pub failed: bool,
    pub changed: bool,
    pub created: DateTime<Utc>,
    /// Message text exactly as it appeared in the source (no trimming)
    #[serde(rename = "stdout")]
    pub message: String,
    /// 1-based line number where the event starts in the source
    pub start_line: usize,
    pub confidence: Confidence,
    pub level: Option<String>,
    /// Extra metadata (embedded job id, syslog process, ...)
    #[serde(
        serialize_with = "serialize_fields_as_map",
        deserialize_with = "deserialize_fields_from_map",
        default
    )]
    pub fields: Vec<(String, String)>,
}

impl ParsedEvent {
    /// A `verbose` event with every optional field defaulted.
    pub fn generic(counter: u64, start_line: usize, created: DateTime<Utc>, message: String) -> Self {
        Self {
            counter,
            event: event_type::VERBOSE.to_string(),
            host: None,
            task: None,
            play: None,
            failed: false,
            changed: false,
            created,
            message,
            start_line,
            confidence: Confidence::High,
            level: None,
            fields: Vec::new(),
        }
    }

    /// Degraded event for a line that did not match its format's grammar.
    pub fn low_confidence(counter: u64, start_line: usize, created: DateTime<Utc>, raw: &str) -> Self {
        Self {
            confidence: Confidence::Low,
            ..Self::generic(counter, start_line, created, raw.to_string())
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_low_confidence(&self) -> bool {
        self.confidence == Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_kind_priority_order() {
        assert!(FormatKind::JsonEvents < FormatKind::RawPlaybookOutput);
        assert!(FormatKind::StructuredCustom < FormatKind::OpaqueFallback);
    }

    #[test]
    fn test_format_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&FormatKind::RawPlaybookOutput).unwrap();
        assert_eq!(json, "\"raw-playbook-output\"");
        assert_eq!(FormatKind::ServiceLog.to_string(), "service-log");
    }

    #[test]
    fn test_detection_result_thresholds() {
        assert!(DetectionResult::from_matches(FormatKind::SystemLog, 3, 5).is_majority());
        assert!(!DetectionResult::from_matches(FormatKind::SystemLog, 2, 4).is_majority());
        assert!(DetectionResult::from_matches(FormatKind::JsonEvents, 4, 4).is_unanimous());
        assert_eq!(DetectionResult::from_matches(FormatKind::JsonEvents, 0, 0).confidence, 0.0);
    }

    #[test]
    fn test_event_serializes_canonical_fields() {
        let created = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let mut event = ParsedEvent::generic(7, 3, created, "  indented output".to_string());
        event.fields.push(("job_id".to_string(), "42".to_string()));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["counter"], 7);
        assert_eq!(value["event"], "verbose");
        assert_eq!(value["stdout"], "  indented output");
        assert_eq!(value["created"], "2024-01-15T10:30:00Z");
        assert_eq!(value["fields"]["job_id"], "42");
        assert!(value["host"].is_null());
    }

    #[test]
    fn test_low_confidence_event_defaults() {
        let created = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let event = ParsedEvent::low_confidence(1, 9, created, "garbage ERROR line");
        assert!(event.is_low_confidence());
        assert!(!event.failed);
        assert_eq!(event.message, "garbage ERROR line");
        assert_eq!(event.event, event_type::VERBOSE);
    }

    #[test]
    fn test_event_type_failure_vocabulary() {
        assert!(event_type::implies_failure("runner_on_failed"));
        assert!(event_type::implies_failure("runner_on_unreachable"));
        assert!(!event_type::implies_failure("runner_on_ok"));
        assert!(event_type::is_completion("playbook_on_stats"));
    }
}
