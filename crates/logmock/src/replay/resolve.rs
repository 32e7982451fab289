//! Resolve — turn a (kind, id_or_path) selector into an ordered source list.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::source::{self, RawSource, SourceCatalog, SourceKind};

use super::error::ReplayError;

pub const SELECT_LATEST: &str = "latest";
pub const SELECT_ALL: &str = "all";

/// One source ready to replay: its identifier and non-blank lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySource {
    pub id: String,
    pub lines: Vec<String>,
}

impl ReplaySource {
    pub fn from_raw(source: &RawSource) -> Self {
        Self {
            id: source.identifier.clone(),
            lines: source.replay_lines(),
        }
    }
}

/// Resolve a selector. Sources without content are skipped; an empty
/// result is an error so no session starts with nothing to write.
pub fn resolve(
    catalog: &SourceCatalog,
    generated_dir: &Path,
    kind: SourceKind,
    id_or_path: &str,
) -> Result<Vec<ReplaySource>, ReplayError> {
    let not_found = || ReplayError::SourceNotFound {
        kind,
        id: id_or_path.to_string(),
    };

    let candidates: Vec<ReplaySource> = match kind {
        SourceKind::Uploaded => match id_or_path {
            SELECT_LATEST => vec![catalog.latest_uploaded().ok_or_else(not_found)?],
            SELECT_ALL => non_empty(catalog.all_uploaded()).ok_or_else(not_found)?,
            id => vec![catalog.uploaded(id).ok_or_else(not_found)?],
        }
        .iter()
        .map(|s| ReplaySource::from_raw(s))
        .collect(),
        SourceKind::AutoLoaded => match id_or_path {
            SELECT_ALL => non_empty(catalog.all_auto_loaded()).ok_or_else(not_found)?,
            id => vec![catalog.auto_loaded(id).ok_or_else(not_found)?],
        }
        .iter()
        .map(|s| ReplaySource::from_raw(s))
        .collect(),
        SourceKind::Generated => generated_files(generated_dir, id_or_path)
            .ok_or_else(not_found)?
            .iter()
            .map(|path| read_generated(path))
            .collect::<Result<_, _>>()?,
    };

    let total = candidates.len();
    let sources: Vec<ReplaySource> = candidates
        .into_iter()
        .filter(|s| {
            if s.lines.is_empty() {
                warn!("Skipping {} source '{}': no content lines", kind, s.id);
            }
            !s.lines.is_empty()
        })
        .collect();

    if sources.is_empty() {
        return Err(ReplayError::EmptySource {
            kind,
            id: id_or_path.to_string(),
        });
    }

    debug!(
        "Resolved {} '{}' to {} of {} sources ({} lines)",
        kind,
        id_or_path,
        sources.len(),
        total,
        sources.iter().map(|s| s.lines.len()).sum::<usize>()
    );
    Ok(sources)
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Generated selection:
/// - `all`: every `.jsonl` file, by name
/// - `<name>.jsonl`: that file
/// - otherwise: the most recently modified `<id>_*.jsonl`
fn generated_files(dir: &Path, id: &str) -> Option<Vec<PathBuf>> {
    if id.ends_with(".jsonl") {
        // Plain file names only; no path components
        if Path::new(id).file_name().and_then(|n| n.to_str()) != Some(id) {
            return None;
        }
        let path = dir.join(id);
        return path.is_file().then(|| vec![path]);
    }

    let mut entries: Vec<(PathBuf, String, SystemTime)> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let name = path.file_name()?.to_str()?.to_string();
            if !name.ends_with(".jsonl") || !path.is_file() {
                return None;
            }
            let modified = entry.metadata().and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
            Some((path, name, modified))
        })
        .collect();

    if id == SELECT_ALL {
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        return non_empty(entries.into_iter().map(|(path, _, _)| path).collect());
    }

    let prefix = format!("{}_", id);
    entries
        .into_iter()
        .filter(|(_, name, _)| name.starts_with(&prefix))
        .max_by(|a, b| a.2.cmp(&b.2).then_with(|| a.1.cmp(&b.1)))
        .map(|(path, _, _)| vec![path])
}

fn read_generated(path: &Path) -> Result<ReplaySource, ReplayError> {
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let bytes = fs::read(path).map_err(|e| {
        warn!("Failed to read generated source {}: {}", path.display(), e);
        ReplayError::SourceNotFound {
            kind: SourceKind::Generated,
            id: id.clone(),
        }
    })?;

    Ok(ReplaySource {
        lines: source::replay_lines(&String::from_utf8_lossy(&bytes)),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceOrigin;
    use std::sync::Arc;
    use chrono::{Duration, TimeZone, Utc};

    fn catalog() -> SourceCatalog {
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let catalog = SourceCatalog::new();
        for (kind, id, minute, text) in [
            (SourceKind::Uploaded, "second", 2, "b1\nb2\n"),
            (SourceKind::Uploaded, "first", 1, "a1\n"),
            (SourceKind::Uploaded, "blank", 3, "  \n"),
            (SourceKind::AutoLoaded, "zz", 0, "z1\n"),
            (SourceKind::AutoLoaded, "aa", 0, "x1\nx2\n"),
        ] {
            catalog.register(Arc::new(RawSource::new(
                SourceOrigin::new(kind, id).discovered_at(base + Duration::minutes(minute)),
                text.to_string(),
            )));
        }
        catalog
    }

    fn ids(sources: &[ReplaySource]) -> Vec<&str> {
        sources.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_uploaded_all_by_discovery_skipping_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sources = resolve(&catalog(), dir.path(), SourceKind::Uploaded, "all").unwrap();
        assert_eq!(ids(&sources), vec!["first", "second"]);
        assert_eq!(sources[1].lines, vec!["b1", "b2"]);
    }

    #[test]
    fn test_uploaded_latest_with_no_content_is_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(&catalog(), dir.path(), SourceKind::Uploaded, "latest").unwrap_err();
        assert!(matches!(err, ReplayError::EmptySource { .. }));
    }

    #[test]
    fn test_auto_loaded_all_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let sources = resolve(&catalog(), dir.path(), SourceKind::AutoLoaded, "all").unwrap();
        assert_eq!(ids(&sources), vec!["aa", "zz"]);
    }

    #[test]
    fn test_explicit_id_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(&catalog(), dir.path(), SourceKind::AutoLoaded, "missing").unwrap_err();
        assert_eq!(
            err,
            ReplayError::SourceNotFound { kind: SourceKind::AutoLoaded, id: "missing".to_string() }
        );
    }

    #[test]
    fn test_empty_catalog_all_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(&SourceCatalog::new(), dir.path(), SourceKind::Uploaded, "all").unwrap_err();
        assert!(matches!(err, ReplayError::SourceNotFound { .. }));
    }

    #[test]
    fn test_generated_exact_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("job_5_20240115.jsonl"), "{\"event\":\"a\"}\n\n{\"event\":\"b\"}\n").unwrap();

        let sources = resolve(&catalog(), dir.path(), SourceKind::Generated, "job_5_20240115.jsonl").unwrap();
        assert_eq!(ids(&sources), vec!["job_5_20240115.jsonl"]);
        assert_eq!(sources[0].lines.len(), 2);

        let err = resolve(&catalog(), dir.path(), SourceKind::Generated, "../escape.jsonl").unwrap_err();
        assert!(matches!(err, ReplayError::SourceNotFound { .. }));
    }

    #[test]
    fn test_generated_prefix_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("job_5_old.jsonl");
        let new = dir.path().join("job_5_new.jsonl");
        std::fs::write(&old, "old\n").unwrap();
        std::fs::write(&new, "new\n").unwrap();
        std::fs::write(dir.path().join("job_50_other.jsonl"), "other\n").unwrap();

        let earlier = SystemTime::now() - std::time::Duration::from_secs(3600);
        std::fs::File::options().write(true).open(&old).unwrap().set_modified(earlier).unwrap();

        let sources = resolve(&catalog(), dir.path(), SourceKind::Generated, "job_5").unwrap();
        assert_eq!(sources[0].lines, vec!["new"]);
    }

    #[test]
    fn test_generated_all_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jsonl"), "b\n").unwrap();
        std::fs::write(dir.path().join("a.jsonl"), "a\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored\n").unwrap();

        let sources = resolve(&catalog(), dir.path(), SourceKind::Generated, "all").unwrap();
        assert_eq!(ids(&sources), vec!["a.jsonl", "b.jsonl"]);
    }

    #[test]
    fn test_generated_missing_directory() {
        let err = resolve(&catalog(), Path::new("/nonexistent/logmock"), SourceKind::Generated, "job_1").unwrap_err();
        assert!(matches!(err, ReplayError::SourceNotFound { .. }));
    }
}
