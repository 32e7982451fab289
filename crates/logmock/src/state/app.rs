//! App state — AppState struct, shared state type alias.

use std::sync::Arc;

use crate::conf::AppConfig;
use crate::ingest::Ingestor;
use crate::job::JobStore;
use crate::parser::metrics::IngestMetrics;
use crate::parser::FormatDetectorOrchestrator;
use crate::replay::ReplayEngine;
use crate::source::SourceCatalog;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<JobStore>,
    pub catalog: Arc<SourceCatalog>,
    pub metrics: Arc<IngestMetrics>,
    pub ingestor: Ingestor,
    pub engine: ReplayEngine,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(JobStore::new());
        let catalog = Arc::new(SourceCatalog::new());
        let metrics = Arc::new(IngestMetrics::new());

        let ingestor = Ingestor::with_detector(
            FormatDetectorOrchestrator::with_sample_size(config.detection_sample_lines),
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&metrics),
        );
        let engine = ReplayEngine::new(Arc::clone(&catalog), config.engine_settings());

        Self {
            config,
            store,
            catalog,
            metrics,
            ingestor,
            engine,
        }
    }
}

pub type SharedState = Arc<AppState>;
