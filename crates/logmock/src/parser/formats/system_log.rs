use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::formats::content_lines;
use crate::parser::traits::*;

/// `2024-01-15 10:30:00 INFO Job 123 ...`
static DETECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?\s+(?:DEBUG|INFO|NOTICE|WARN|WARNING|ERROR|CRITICAL|FATAL)\s+[Jj]ob\s+#?\d+",
    )
    .unwrap()
});

/// Extraction is looser than detection: any level word, any message.
static LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})[ T](\d{2}:\d{2}:\d{2})(?:[.,](\d{1,9}))?\s+([A-Za-z]+)\s+(.*)$").unwrap()
});

static JOB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[Jj]ob\s+#?(\d+)").unwrap());

static JOB_DONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bjob\s+#?\d+\s+(?:completed|finished|successful|succeeded)\b").unwrap()
});

/// Controller system log.
pub struct SystemLogDetector;

impl FormatDetector for SystemLogDetector {
    fn matches(&self, line: &str) -> bool {
        DETECT.is_match(line.trim_start())
    }

    fn format(&self) -> FormatKind {
        FormatKind::SystemLog
    }
}

pub struct SystemLogExtractor;

impl EventExtractor for SystemLogExtractor {
    fn extract(&self, text: &str, ctx: &ExtractContext) -> Vec<ParsedEvent> {
        content_lines(text)
            .enumerate()
            .map(|(idx, (line_no, line))| parse_line(idx as u64 + 1, line_no, line, ctx))
            .collect()
    }

    fn format(&self) -> FormatKind {
        FormatKind::SystemLog
    }
}

fn parse_line(counter: u64, line_no: usize, line: &str, ctx: &ExtractContext) -> ParsedEvent {
    let Some(caps) = LINE.captures(line.trim_start()) else {
        return ParsedEvent::low_confidence(counter, line_no, ctx.ingested_at, line);
    };

    let date = caps.get(1).map_or("", |m| m.as_str());
    let time = caps.get(2).map_or("", |m| m.as_str());
    let fraction = caps.get(3).map(|m| m.as_str());
    let Some(created) = parse_timestamp(date, time, fraction) else {
        return ParsedEvent::low_confidence(counter, line_no, ctx.ingested_at, line);
    };

    let level = caps.get(4).map_or("INFO", |m| m.as_str()).to_uppercase();
    let message = caps.get(5).map_or("", |m| m.as_str());

    let mut event = ParsedEvent::generic(counter, line_no, created, message.to_string());
    event.failed = matches!(level.as_str(), "ERROR" | "FATAL" | "CRITICAL");
    event.event = classify(message, event.failed).to_string();
    event.level = Some(level);

    if let Some(job_id) = JOB_ID.captures(message).and_then(|c| c.get(1)) {
        event.fields.push(("job_id".to_string(), job_id.as_str().to_string()));
    }

    event
}

fn classify(message: &str, failed: bool) -> &'static str {
    if failed {
        return event_type::RUNNER_ON_FAILED;
    }
    if JOB_DONE.is_match(message) {
        return event_type::STATS;
    }

    let lower = message.to_lowercase();
    if lower.contains("start") {
        event_type::RUNNER_ON_START
    } else if lower.contains("complete") || lower.contains("finish") {
        event_type::RUNNER_ON_OK
    } else {
        event_type::VERBOSE
    }
}

/// Timestamps carry no zone and are taken as UTC.
fn parse_timestamp(date: &str, time: &str, fraction: Option<&str>) -> Option<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
    let mut naive = NaiveDateTime::new(date, time);

    if let Some(fraction) = fraction {
        // Right-pad to nanoseconds: "5" → 500_000_000
        let nanos: u32 = format!("{:0<9}", fraction).parse().ok()?;
        naive = naive.with_nanosecond(nanos)?;
    }

    Some(Utc.from_utc_datetime(&naive))
}
