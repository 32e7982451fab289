use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::model::FormatKind;

/// A wrapper that forces the wrapped data onto its own cache line.
///
/// Ingestion may run from several tasks at once while the replay worker
/// reads snapshots; keeping counter groups apart avoids false sharing.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Detections per classified format
#[derive(Debug, Default)]
pub struct FormatMetrics {
    pub json_events: AtomicU64,
    pub raw_playbook_output: AtomicU64,
    pub system_log: AtomicU64,
    pub service_log: AtomicU64,
    pub structured_custom: AtomicU64,
    pub opaque_fallback: AtomicU64,
}

impl FormatMetrics {
    fn counter(&self, format: FormatKind) -> &AtomicU64 {
        match format {
            FormatKind::JsonEvents => &self.json_events,
            FormatKind::RawPlaybookOutput => &self.raw_playbook_output,
            FormatKind::SystemLog => &self.system_log,
            FormatKind::ServiceLog => &self.service_log,
            FormatKind::StructuredCustom => &self.structured_custom,
            FormatKind::OpaqueFallback => &self.opaque_fallback,
        }
    }
}

/// Event totals across all ingestions
#[derive(Debug, Default)]
pub struct EventMetrics {
    pub jobs: AtomicU64,
    pub events: AtomicU64,
    pub low_confidence: AtomicU64,
    pub failed: AtomicU64,
}

/// Ingestion counters.
///
/// All operations use `Ordering::Relaxed`; `snapshot()` is not
/// transactional across fields, which is fine for observability.
#[derive(Debug, Default)]
pub struct IngestMetrics {
    pub formats: CacheAligned<FormatMetrics>,
    pub events: CacheAligned<EventMetrics>,
    /// Inputs rejected because they had no content
    pub rejected: CacheAligned<AtomicU64>,
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful ingestion.
    #[inline]
    pub fn record_job(&self, format: FormatKind, events: u64, low_confidence: u64, failed: u64) {
        self.formats.0.counter(format).fetch_add(1, Ordering::Relaxed);
        self.events.0.jobs.fetch_add(1, Ordering::Relaxed);
        self.events.0.events.fetch_add(events, Ordering::Relaxed);
        self.events.0.low_confidence.fetch_add(low_confidence, Ordering::Relaxed);
        self.events.0.failed.fetch_add(failed, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.rejected.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let formats = &self.formats.0;
        let events = self.events.0.events.load(Ordering::Relaxed);
        let low_confidence = self.events.0.low_confidence.load(Ordering::Relaxed);

        MetricsSnapshot {
            json_events: formats.json_events.load(Ordering::Relaxed),
            raw_playbook_output: formats.raw_playbook_output.load(Ordering::Relaxed),
            system_log: formats.system_log.load(Ordering::Relaxed),
            service_log: formats.service_log.load(Ordering::Relaxed),
            structured_custom: formats.structured_custom.load(Ordering::Relaxed),
            opaque_fallback: formats.opaque_fallback.load(Ordering::Relaxed),

            jobs: self.events.0.jobs.load(Ordering::Relaxed),
            events,
            low_confidence_events: low_confidence,
            failed_events: self.events.0.failed.load(Ordering::Relaxed),
            rejected_inputs: self.rejected.0.load(Ordering::Relaxed),
            high_confidence_ratio: if events > 0 {
                (events - low_confidence.min(events)) as f64 / events as f64
            } else {
                1.0
            },
        }
    }
}

/// A read-only, serializable snapshot of ingestion metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    // Detections by format
    pub json_events: u64,
    pub raw_playbook_output: u64,
    pub system_log: u64,
    pub service_log: u64,
    pub structured_custom: u64,
    pub opaque_fallback: u64,

    // Totals
    pub jobs: u64,
    pub events: u64,
    pub low_confidence_events: u64,
    pub failed_events: u64,
    pub rejected_inputs: u64,
    pub high_confidence_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_empty() {
        let snap = IngestMetrics::new().snapshot();
        assert_eq!(snap.jobs, 0);
        assert_eq!(snap.events, 0);
        assert_eq!(snap.high_confidence_ratio, 1.0);
    }

    #[test]
    fn test_record_job_by_format() {
        let metrics = IngestMetrics::new();
        metrics.record_job(FormatKind::JsonEvents, 10, 2, 1);
        metrics.record_job(FormatKind::JsonEvents, 5, 0, 0);
        metrics.record_job(FormatKind::OpaqueFallback, 1, 1, 0);

        let snap = metrics.snapshot();
        assert_eq!(snap.json_events, 2);
        assert_eq!(snap.opaque_fallback, 1);
        assert_eq!(snap.jobs, 3);
        assert_eq!(snap.events, 16);
        assert_eq!(snap.low_confidence_events, 3);
        assert_eq!(snap.failed_events, 1);
        assert!((snap.high_confidence_ratio - 13.0 / 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_rejected() {
        let metrics = IngestMetrics::new();
        metrics.record_rejected();
        metrics.record_rejected();
        assert_eq!(metrics.snapshot().rejected_inputs, 2);
    }

    #[test]
    fn test_cache_alignment() {
        assert_eq!(std::mem::align_of::<CacheAligned<FormatMetrics>>(), 64);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(IngestMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.record_job(FormatKind::SystemLog, 3, 0, 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.system_log, 400);
        assert_eq!(snap.events, 1200);
    }
}
