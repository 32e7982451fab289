use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::formats::content_lines;
use crate::parser::traits::*;

/// `2024-01-15T10:30:00.000Z INFO [job_123:web01.example.com] message`
static LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2}))\s+([A-Za-z]+)\s+\[([^\]]+)\]\s?(.*)$",
    )
    .unwrap()
});

static JOB_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());
static TASK_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bTASK \[([^\]]+)\]").unwrap());
static PLAY_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bPLAY \[([^\]]+)\]").unwrap());
static JOB_DONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bJob\b.*\bcompleted\b").unwrap());

/// Structured custom log with `[job:host]` context.
pub struct StructuredDetector;

impl FormatDetector for StructuredDetector {
    fn matches(&self, line: &str) -> bool {
        LINE.is_match(line.trim_start())
    }

    fn format(&self) -> FormatKind {
        FormatKind::StructuredCustom
    }
}

pub struct StructuredExtractor;

impl EventExtractor for StructuredExtractor {
    fn extract(&self, text: &str, ctx: &ExtractContext) -> Vec<ParsedEvent> {
        content_lines(text)
            .enumerate()
            .map(|(idx, (line_no, line))| parse_line(idx as u64 + 1, line_no, line, ctx))
            .collect()
    }

    fn format(&self) -> FormatKind {
        FormatKind::StructuredCustom
    }
}

/// RFC 3339, or an ISO timestamp whose offset has no colon (`+0100`).
fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .or_else(|_| DateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_line(counter: u64, line_no: usize, line: &str, ctx: &ExtractContext) -> ParsedEvent {
    let Some(caps) = LINE.captures(line.trim_start()) else {
        return ParsedEvent::low_confidence(counter, line_no, ctx.ingested_at, line);
    };
    let Some(created) = caps
        .get(1)
        .and_then(|m| parse_timestamp(m.as_str()))
    else {
        return ParsedEvent::low_confidence(counter, line_no, ctx.ingested_at, line);
    };

    let level = caps.get(2).map_or("INFO", |m| m.as_str()).to_uppercase();
    let context = caps.get(3).map_or("", |m| m.as_str());
    let message = caps.get(4).map_or("", |m| m.as_str());

    // `job_123` or `job_123:web01.example.com`
    let (job, host) = match context.split_once(':') {
        Some((job, host)) => (job, Some(host.trim()).filter(|h| !h.is_empty())),
        None => (context, None),
    };

    let mut event = ParsedEvent::generic(counter, line_no, created, message.to_string());
    let (kind, changed, stderr) = classify(message);
    event.event = kind.to_string();
    event.changed = changed;
    event.failed = level == "ERROR" || stderr;
    if event.failed && kind == event_type::RUNNER_ON_OK {
        event.event = event_type::RUNNER_ON_FAILED.to_string();
    }
    event.host = host.map(str::to_string);
    event.task = TASK_REF.captures(message).and_then(|c| c.get(1)).map(|m| m.as_str().to_string());
    event.play = PLAY_REF.captures(message).and_then(|c| c.get(1)).map(|m| m.as_str().to_string());
    event.level = Some(level);

    if let Some(digits) = JOB_DIGITS.captures(job).and_then(|c| c.get(1)) {
        event.fields.push(("job_id".to_string(), digits.as_str().to_string()));
    }

    event
}

/// Event type from message keywords: (type, changed, stderr)
fn classify(message: &str) -> (&'static str, bool, bool) {
    if message.contains("PLAY RECAP") || JOB_DONE.is_match(message) {
        return (event_type::STATS, false, false);
    }

    let lower = message.to_lowercase();
    if lower.contains("started") || lower.contains("running") {
        (event_type::RUNNER_ON_START, false, false)
    } else if lower.contains("completed successfully") {
        (event_type::RUNNER_ON_OK, true, false)
    } else if lower.contains("failed") {
        (event_type::RUNNER_ON_FAILED, false, false)
    } else if message.contains("stderr:") {
        (event_type::RUNNER_ON_FAILED, false, true)
    } else if message.contains("stdout:") {
        (event_type::RUNNER_ON_OK, false, false)
    } else {
        (event_type::VERBOSE, false, false)
    }
}
