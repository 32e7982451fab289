use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::formats::content_lines;
use crate::parser::traits::*;

/// `[<PRI>]Jan 15 10:30:00 tower-01 awx-manage[1234]: message`
static LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:<(\d{1,3})>)?([A-Z][a-z]{2})\s+(\d{1,2})\s+(\d{2}:\d{2}:\d{2})\s+(\S+)\s+([^\s\[\]:]+)(?:\[(\d+)\])?:\s?(.*)$",
    )
    .unwrap()
});

static ERROR_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(error|fatal|failed|failure)\b").unwrap());
static WARN_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bwarn(ing)?\b").unwrap());
static JOB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bjob\s*[:#]?\s*(\d+)").unwrap());

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Syslog-style service log (dispatcher, callback receiver, ...).
pub struct ServiceLogDetector;

impl FormatDetector for ServiceLogDetector {
    fn matches(&self, line: &str) -> bool {
        LINE.captures(line.trim_start())
            .and_then(|caps| caps.get(2))
            .is_some_and(|month| MONTHS.contains(&month.as_str()))
    }

    fn format(&self) -> FormatKind {
        FormatKind::ServiceLog
    }
}

/// One generic event per line. Syslog timestamps have no year, so the
/// ingestion year is assumed.
pub struct ServiceLogExtractor;

impl EventExtractor for ServiceLogExtractor {
    fn extract(&self, text: &str, ctx: &ExtractContext) -> Vec<ParsedEvent> {
        content_lines(text)
            .enumerate()
            .map(|(idx, (line_no, line))| parse_line(idx as u64 + 1, line_no, line, ctx))
            .collect()
    }

    fn format(&self) -> FormatKind {
        FormatKind::ServiceLog
    }
}

fn parse_line(counter: u64, line_no: usize, line: &str, ctx: &ExtractContext) -> ParsedEvent {
    let parsed = LINE.captures(line.trim_start()).and_then(|caps| {
        let created = parse_timestamp(
            ctx.ingested_at.year(),
            caps.get(2)?.as_str(),
            caps.get(3)?.as_str(),
            caps.get(4)?.as_str(),
        )?;
        Some((caps, created))
    });

    let Some((caps, created)) = parsed else {
        return ParsedEvent::low_confidence(counter, line_no, ctx.ingested_at, line);
    };

    let message = caps.get(8).map_or("", |m| m.as_str());
    let mut event = ParsedEvent::generic(counter, line_no, created, message.to_string());

    let level = if ERROR_WORD.is_match(message) {
        "ERROR"
    } else if WARN_WORD.is_match(message) {
        "WARN"
    } else {
        "INFO"
    };
    event.failed = level == "ERROR";
    if event.failed {
        event.event = event_type::RUNNER_ON_FAILED.to_string();
    }
    event.level = Some(level.to_string());

    for (key, idx) in [("origin_host", 5), ("process", 6), ("pid", 7), ("priority", 1)] {
        if let Some(m) = caps.get(idx) {
            event.fields.push((key.to_string(), m.as_str().to_string()));
        }
    }
    if let Some(job_id) = JOB_ID.captures(message).and_then(|c| c.get(1)) {
        event.fields.push(("job_id".to_string(), job_id.as_str().to_string()));
    }

    event
}

fn parse_timestamp(year: i32, month: &str, day: &str, time: &str) -> Option<chrono::DateTime<Utc>> {
    let month = MONTHS.iter().position(|m| *m == month)? as u32 + 1;
    let date = NaiveDate::from_ymd_opt(year, month, day.parse().ok()?)?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExtractContext {
        ExtractContext::new(Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap())
    }

    #[test]
    fn test_detector() {
        let detector = ServiceLogDetector;
        assert!(detector.matches("Jan 15 10:30:00 tower-01 awx-manage[1234]: Starting dispatcher"));
        assert!(detector.matches("<30>Feb  3 09:00:01 node2 systemd: Started receptor"));
        assert!(!detector.matches("Foo 15 10:30:00 tower-01 awx-manage[1234]: nope"));
        assert!(!detector.matches("2024-01-15 10:30:00 INFO Job 1 started"));
    }

    #[test]
    fn test_extract_fields_and_ingestion_year() {
        let text = "Jan 15 10:30:00 tower-01 awx-dispatcher[1240]: Job 45 queued\n";
        let events = ServiceLogExtractor.extract(text, &ctx());
        let event = &events[0];

        assert_eq!(event.created, Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap());
        assert_eq!(event.message, "Job 45 queued");
        assert_eq!(event.field("origin_host"), Some("tower-01"));
        assert_eq!(event.field("process"), Some("awx-dispatcher"));
        assert_eq!(event.field("pid"), Some("1240"));
        assert_eq!(event.field("job_id"), Some("45"));
        assert!(event.host.is_none());
        assert!(event.task.is_none());
        assert!(!event.failed);
        assert_eq!(event.event, event_type::VERBOSE);
    }

    #[test]
    fn test_error_words_mark_failure() {
        let text = "\
Jan 15 10:30:09 tower-01 awx-dispatcher[1240]: Job 45 failed: timeout
Jan 15 10:30:10 tower-01 awx-dispatcher[1240]: warning: queue is backing up
Jan 15 10:30:11 tower-01 awx-dispatcher[1240]: no errors so far
";
        let events = ServiceLogExtractor.extract(text, &ctx());
        assert!(events[0].failed);
        assert_eq!(events[0].level.as_deref(), Some("ERROR"));
        assert_eq!(events[1].level.as_deref(), Some("WARN"));
        // "errors" is not the word "error"
        assert!(!events[2].failed);
    }

    #[test]
    fn test_impossible_date_degrades() {
        let events = ServiceLogExtractor.extract("Feb 30 10:30:00 host proc: hi\nnot syslog\n", &ctx());
        assert!(events[0].is_low_confidence());
        assert!(events[1].is_low_confidence());
        assert_eq!(events[1].counter, 2);
    }
}
