use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::parser::formats::content_lines;
use crate::parser::traits::*;

/// One JSON object per line carrying a string `event` field.
pub struct JsonEventsDetector;

impl FormatDetector for JsonEventsDetector {
    fn matches(&self, line: &str) -> bool {
        let trimmed = line.trim();
        // Quick reject before paying for a parse
        if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
            return false;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(map)) => map.get("event").is_some_and(Value::is_string),
            _ => false,
        }
    }

    fn format(&self) -> FormatKind {
        FormatKind::JsonEvents
    }

    /// Every sampled line must be a record; one stray line rules the format out.
    fn accepts(&self, result: &DetectionResult) -> bool {
        result.is_unanimous()
    }
}

/// Direct field mapping from job event records.
///
/// Counters supplied by the record are kept as-is (gaps included); a record
/// without one gets the previous counter + 1, saturating at `u64::MAX`.
pub struct JsonEventsExtractor;

impl EventExtractor for JsonEventsExtractor {
    fn extract(&self, text: &str, ctx: &ExtractContext) -> Vec<ParsedEvent> {
        let mut events = Vec::new();
        let mut last_counter = 0u64;

        for (line_no, line) in content_lines(text) {
            let event = match serde_json::from_str::<Value>(line.trim()) {
                Ok(Value::Object(record)) => map_record(&record, line, line_no, last_counter, ctx),
                _ => ParsedEvent::low_confidence(last_counter.saturating_add(1), line_no, ctx.ingested_at, line),
            };
            last_counter = event.counter;
            events.push(event);
        }

        events
    }

    fn format(&self) -> FormatKind {
        FormatKind::JsonEvents
    }
}

fn map_record(
    record: &Map<String, Value>,
    raw: &str,
    line_no: usize,
    last_counter: u64,
    ctx: &ExtractContext,
) -> ParsedEvent {
    let counter = record
        .get("counter")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| last_counter.saturating_add(1));

    let event = str_field(record, "event").unwrap_or(event_type::VERBOSE).to_string();

    let failed = record
        .get("failed")
        .and_then(Value::as_bool)
        .unwrap_or_else(|| event_type::implies_failure(&event));
    let changed = record.get("changed").and_then(Value::as_bool).unwrap_or(false);

    let created = str_field(record, "created")
        .or_else(|| str_field(record, "timestamp"))
        .and_then(parse_timestamp)
        .unwrap_or(ctx.ingested_at);

    let message = str_field(record, "stdout")
        .filter(|s| !s.is_empty())
        .or_else(|| str_field(record, "event_display").filter(|s| !s.is_empty()))
        .unwrap_or(raw)
        .to_string();

    let level = str_field(record, "level")
        .map(str::to_uppercase)
        .unwrap_or_else(|| if failed { "ERROR" } else { "INFO" }.to_string());

    let mut fields = Vec::new();
    if let Some(job_id) = record.get("job_id").or_else(|| record.get("job")).and_then(job_id_of) {
        fields.push(("job_id".to_string(), job_id));
    }
    if let Some(uuid) = str_field(record, "uuid") {
        fields.push(("uuid".to_string(), uuid.to_string()));
    }

    ParsedEvent {
        counter,
        event,
        host: str_field(record, "host")
            .or_else(|| str_field(record, "host_name"))
            .map(str::to_string),
        task: str_field(record, "task").map(str::to_string),
        play: str_field(record, "play").map(str::to_string),
        failed,
        changed,
        created,
        message,
        start_line: line_no,
        confidence: Confidence::High,
        level: Some(level),
        fields,
    }
}

fn str_field<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `42`, `"42"` and `"job_42"` all name job 42.
fn job_id_of(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n.to_string()),
        Value::String(s) => {
            let digits = s.strip_prefix("job_").unwrap_or(s);
            (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .then(|| digits.to_string())
        }
        _ => None,
    }
}
