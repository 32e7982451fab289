//! Ingest — detect → extract → build → store.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::job::{self, Job, JobStore};
use crate::parser::metrics::IngestMetrics;
use crate::parser::{self, DetectionError, ExtractContext, FormatDetectorOrchestrator};
use crate::source::{RawSource, SourceCatalog, SourceKind, SourceOrigin};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Detection(#[from] DetectionError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Synchronous ingestion path shared by uploads and directory auto-load.
pub struct Ingestor {
    detector: FormatDetectorOrchestrator,
    store: Arc<JobStore>,
    catalog: Arc<SourceCatalog>,
    metrics: Arc<IngestMetrics>,
}

impl Ingestor {
    pub fn new(store: Arc<JobStore>, catalog: Arc<SourceCatalog>, metrics: Arc<IngestMetrics>) -> Self {
        Self::with_detector(FormatDetectorOrchestrator::new(), store, catalog, metrics)
    }

    pub fn with_detector(
        detector: FormatDetectorOrchestrator,
        store: Arc<JobStore>,
        catalog: Arc<SourceCatalog>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self { detector, store, catalog, metrics }
    }

    /// Ingest a payload and register its source for replay.
    ///
    /// Fails only when the payload has no non-blank line; in that case the
    /// source is not registered either.
    pub fn ingest(&self, payload: impl Into<Bytes>, origin: SourceOrigin) -> Result<Arc<Job>, IngestError> {
        let source = Arc::new(RawSource::new(origin, payload));
        let job = self.ingest_source(&source)?;
        self.catalog.register(source);
        Ok(job)
    }

    /// Build and store a job from an already constructed source without
    /// touching the catalog.
    pub fn ingest_source(&self, source: &RawSource) -> Result<Arc<Job>, IngestError> {
        let text = source.text();

        let detection = match self.detector.detect_text(&text) {
            Ok(detection) => detection,
            Err(e) => {
                self.metrics.record_rejected();
                warn!(source = %source.identifier, kind = %source.kind, "Rejected input: {}", e);
                return Err(e.into());
            }
        };
        debug!(
            source = %source.identifier,
            format = %detection.format,
            confidence = detection.confidence,
            "Detected format"
        );

        let ctx = ExtractContext::new(Utc::now());
        let events = parser::extract(detection.format, &text, &ctx);

        let job = job::build(self.store.allocate_id(), source, detection.format, events);
        self.metrics.record_job(
            job.format,
            job.event_count as u64,
            job.low_confidence_count as u64,
            job.failed_count as u64,
        );

        if job.low_confidence_count > 0 {
            debug!(
                job_id = %job.id,
                low_confidence = job.low_confidence_count,
                "Lines outside the detected grammar kept as generic events"
            );
        }

        let job = self.store.insert(job);
        info!(
            "Ingested {} '{}' as job {}: format={}, events={}, failed={}, status={}",
            source.kind, source.identifier, job.id, job.format, job.event_count, job.failed_count, job.status
        );
        Ok(job)
    }

    /// Read a file into a raw source keyed by its stem, discovered at its
    /// modification time.
    pub async fn read_source(path: &Path, kind: SourceKind) -> Result<RawSource, IngestError> {
        let io_err = |source| IngestError::Io {
            path: path.display().to_string(),
            source,
        };

        let payload = tokio::fs::read(path).await.map_err(io_err)?;
        let discovered_at = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let identifier = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(RawSource::new(
            SourceOrigin::new(kind, identifier).discovered_at(discovered_at),
            payload,
        ))
    }

    /// Read, ingest and register one file.
    pub async fn ingest_file(&self, path: &Path, kind: SourceKind) -> Result<Arc<Job>, IngestError> {
        let source = Arc::new(Self::read_source(path, kind).await?);
        let job = self.ingest_source(&source)?;
        self.catalog.register(source);
        Ok(job)
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<SourceCatalog> {
        &self.catalog
    }

    pub fn metrics(&self) -> &Arc<IngestMetrics> {
        &self.metrics
    }
}
