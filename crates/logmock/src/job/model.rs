//! Model — Job, status derivation, summary and stdout reconstruction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::{FormatKind, ParsedEvent};
use crate::source::SourceKind;

/// Store-allocated job identity. Re-ingesting a source always yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Successful,
    Failed,
}

impl JobStatus {
    /// Status is a pure function of the event scan:
    /// any failure wins, then completion (marker or fully consumed source).
    pub fn derive(failed_count: usize, completion_observed: bool, fully_consumed: bool) -> Self {
        if failed_count > 0 {
            JobStatus::Failed
        } else if completion_observed || fully_consumed {
            JobStatus::Successful
        } else {
            JobStatus::Running
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Successful => "successful",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub event_count: usize,
    pub failed_count: usize,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdoutFormat {
    Text,
    Json,
}

impl FromStr for StdoutFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "txt" => Ok(StdoutFormat::Text),
            "json" => Ok(StdoutFormat::Json),
            other => Err(format!("unknown stdout format '{}' (expected json or text)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StdoutLine {
    pub counter: u64,
    pub start_line: usize,
    pub text: String,
}

/// Reconstructed output. Both forms carry the same messages in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Stdout {
    Text(String),
    Lines(Vec<StdoutLine>),
}

impl Stdout {
    /// Plain-text form regardless of which variant was produced.
    pub fn into_text(self) -> String {
        match self {
            Stdout::Text(text) => text,
            Stdout::Lines(lines) => lines
                .into_iter()
                .map(|line| line.text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One ingested execution run. Immutable once built; shared as `Arc<Job>`.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    /// Display name: the source identifier
    pub name: String,
    pub status: JobStatus,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    /// Seconds between first and last event timestamps
    pub elapsed: f64,
    pub format: FormatKind,
    pub source_kind: SourceKind,
    pub source_id: String,
    /// Job id embedded in the log lines, if any
    pub external_job_id: Option<String>,
    /// Distinct hosts in first-seen order
    pub hosts: Vec<String>,
    /// Distinct task names in first-seen order
    pub tasks: Vec<String>,
    pub event_count: usize,
    pub failed_count: usize,
    pub low_confidence_count: usize,
    #[serde(skip)]
    pub(crate) events: Vec<ParsedEvent>,
}

impl Job {
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            event_count: self.event_count,
            failed_count: self.failed_count,
            status: self.status,
        }
    }

    pub fn events(&self) -> &[ParsedEvent] {
        &self.events
    }

    /// Event by its counter value.
    pub fn event(&self, counter: u64) -> Option<&ParsedEvent> {
        self.events.iter().find(|e| e.counter == counter)
    }

    /// Messages in event order, whitespace untouched.
    pub fn stdout(&self, format: StdoutFormat) -> Stdout {
        match format {
            StdoutFormat::Text => Stdout::Text(
                self.events
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            StdoutFormat::Json => Stdout::Lines(
                self.events
                    .iter()
                    .map(|e| StdoutLine {
                        counter: e.counter,
                        start_line: e.start_line,
                        text: e.message.clone(),
                    })
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derivation() {
        assert_eq!(JobStatus::derive(0, false, true), JobStatus::Successful);
        assert_eq!(JobStatus::derive(0, true, false), JobStatus::Successful);
        assert_eq!(JobStatus::derive(1, true, true), JobStatus::Failed);
        assert_eq!(JobStatus::derive(3, false, false), JobStatus::Failed);
        assert_eq!(JobStatus::derive(0, false, false), JobStatus::Running);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Successful).unwrap(), "\"successful\"");
        assert!(JobStatus::Failed.is_finished());
        assert!(!JobStatus::Running.is_finished());
    }

    #[test]
    fn test_stdout_format_parse() {
        assert_eq!("json".parse::<StdoutFormat>().unwrap(), StdoutFormat::Json);
        assert_eq!("text".parse::<StdoutFormat>().unwrap(), StdoutFormat::Text);
        assert!("html".parse::<StdoutFormat>().is_err());
    }

    #[test]
    fn test_stdout_lines_into_text() {
        let stdout = Stdout::Lines(vec![
            StdoutLine { counter: 1, start_line: 1, text: "  a".to_string() },
            StdoutLine { counter: 2, start_line: 3, text: "b  ".to_string() },
        ]);
        assert_eq!(stdout.into_text(), "  a\nb  ");
    }

    #[test]
    fn test_stdout_json_shape() {
        let stdout = Stdout::Lines(vec![StdoutLine { counter: 1, start_line: 2, text: "x".to_string() }]);
        let value = serde_json::to_value(&stdout).unwrap();
        assert_eq!(value[0]["counter"], 1);
        assert_eq!(value[0]["text"], "x");
        let text = serde_json::to_value(Stdout::Text("x".to_string())).unwrap();
        assert_eq!(text, "x");
    }
}
