//! Autoload — ingest sample and upload directories at boot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::source::{RefreshReport, SourceKind};
use crate::state::AppState;
use crate::ingest::Ingestor;

pub const SAMPLE_EXTENSIONS: &[&str] = &["log", "txt"];
pub const UPLOAD_EXTENSIONS: &[&str] = &["log"];

/// Per-directory outcome of an auto-load pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Load the sample directory (auto-loaded) and the uploads directory
/// (uploaded). Per-file failures are logged and counted, never returned.
pub async fn autoload(state: &AppState) -> (LoadSummary, LoadSummary) {
    let samples = load_directory(state, &state.config.sample_dir, SourceKind::AutoLoaded, SAMPLE_EXTENSIONS).await;
    let uploads = load_directory(state, &state.config.uploads_dir, SourceKind::Uploaded, UPLOAD_EXTENSIONS).await;

    info!(
        "Auto-load complete: samples loaded={} skipped={} failed={}, uploads loaded={} skipped={} failed={}",
        samples.loaded, samples.skipped, samples.failed, uploads.loaded, uploads.skipped, uploads.failed
    );
    (samples, uploads)
}

pub async fn load_directory(state: &AppState, dir: &Path, kind: SourceKind, extensions: &[&str]) -> LoadSummary {
    let mut summary = LoadSummary::default();

    for path in list_files(dir, extensions).await {
        let source = match Ingestor::read_source(&path, kind).await {
            Ok(source) => source,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                summary.failed += 1;
                continue;
            }
        };
        if source.is_blank() {
            warn!("Skipping empty {} file: {}", kind, path.display());
            summary.skipped += 1;
            continue;
        }

        let source = Arc::new(source);
        match state.ingestor.ingest_source(&source) {
            Ok(_) => {
                state.catalog.register(source);
                summary.loaded += 1;
            }
            Err(e) => {
                warn!("Failed to ingest {}: {}", path.display(), e);
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Re-scan the sample directory, replace the auto-loaded catalog and ingest
/// the sources whose keys are new.
pub async fn refresh_auto_loaded(state: &AppState) -> RefreshReport {
    let mut sources = Vec::new();
    for path in list_files(&state.config.sample_dir, SAMPLE_EXTENSIONS).await {
        match Ingestor::read_source(&path, SourceKind::AutoLoaded).await {
            Ok(source) if !source.is_blank() => sources.push(Arc::new(source)),
            Ok(_) => warn!("Skipping empty auto-loaded file: {}", path.display()),
            Err(e) => warn!("Failed to read {}: {}", path.display(), e),
        }
    }

    let scanned = sources.clone();
    let report = state.catalog.replace_auto_loaded(sources);

    for source in scanned.iter().filter(|s| report.added.contains(&s.identifier)) {
        if let Err(e) = state.ingestor.ingest_source(source) {
            warn!("Failed to ingest {}: {}", source.identifier, e);
        }
    }

    info!(
        "Auto-loaded catalog refreshed: {} total, added {:?}, removed {:?}",
        report.total, report.added, report.removed
    );
    report
}

/// Regular files in `dir` with one of `extensions`, sorted by name.
/// A missing or unreadable directory yields nothing.
async fn list_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let matches = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| extensions.contains(&e))
                    .unwrap_or(false);
                let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                if matches && is_file {
                    files.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error listing {}: {}", dir.display(), e);
                break;
            }
        }
    }

    files.sort();
    debug!("{} candidate files in {}", files.len(), dir.display());
    files
}
