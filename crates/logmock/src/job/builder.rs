//! Builder — aggregate extracted events into an immutable Job.

use crate::parser::{event_type, FormatKind, ParsedEvent};
use crate::source::RawSource;

use super::model::{Job, JobId, JobStatus};

/// Build a Job from the full event sequence of one source.
///
/// Ingestion always consumes the whole source, so a job without failures
/// comes out `successful` even when no completion marker was seen.
pub fn build(id: JobId, source: &RawSource, format: FormatKind, events: Vec<ParsedEvent>) -> Job {
    build_with(id, source, format, events, true)
}

pub(crate) fn build_with(
    id: JobId,
    source: &RawSource,
    format: FormatKind,
    events: Vec<ParsedEvent>,
    fully_consumed: bool,
) -> Job {
    let mut failed_count = 0;
    let mut low_confidence_count = 0;
    let mut completion_observed = false;
    let mut hosts: Vec<String> = Vec::new();
    let mut tasks: Vec<String> = Vec::new();
    let mut external_job_id = None;

    // Single scan
    for event in &events {
        if event.failed {
            failed_count += 1;
        }
        if event.is_low_confidence() {
            low_confidence_count += 1;
        }
        if event_type::is_completion(&event.event) {
            completion_observed = true;
        }
        if let Some(host) = &event.host {
            if !hosts.contains(host) {
                hosts.push(host.clone());
            }
        }
        if let Some(task) = &event.task {
            if !tasks.contains(task) {
                tasks.push(task.clone());
            }
        }
        if external_job_id.is_none() {
            external_job_id = event.field("job_id").map(str::to_string);
        }
    }

    let status = JobStatus::derive(failed_count, completion_observed, fully_consumed);
    let started = events.iter().map(|e| e.created).min();
    let last = events.iter().map(|e| e.created).max();
    let finished = if status.is_finished() { last } else { None };
    let elapsed = match (started, finished) {
        (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as f64 / 1000.0,
        _ => 0.0,
    };

    Job {
        id,
        name: source.identifier.clone(),
        status,
        created: source.discovered_at,
        started,
        finished,
        elapsed,
        format,
        source_kind: source.kind,
        source_id: source.identifier.clone(),
        external_job_id,
        hosts,
        tasks,
        event_count: events.len(),
        failed_count,
        low_confidence_count,
        events,
    }
}
