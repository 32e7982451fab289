use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::{RawSource, SourceKind};

/// Keys that appeared or vanished when the auto-loaded set was replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub total: usize,
}

/// Ingested raw sources that replay can select.
///
/// Uploaded sources keep insertion order; auto-loaded sources are keyed by
/// name. Generated sources are never cataloged: they live as files in the
/// generated directory and are resolved from a listing.
#[derive(Debug, Default)]
pub struct SourceCatalog {
    uploaded: RwLock<Vec<Arc<RawSource>>>,
    auto_loaded: RwLock<BTreeMap<String, Arc<RawSource>>>,
}

impl SourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its kind. Generated sources are ignored.
    pub fn register(&self, source: Arc<RawSource>) {
        match source.kind {
            SourceKind::Uploaded => self.uploaded.write().push(source),
            SourceKind::AutoLoaded => {
                self.auto_loaded
                    .write()
                    .insert(source.identifier.clone(), source);
            }
            SourceKind::Generated => {}
        }
    }

    /// Most recently discovered uploaded source. Ties go to the later insert.
    pub fn latest_uploaded(&self) -> Option<Arc<RawSource>> {
        self.uploaded
            .read()
            .iter()
            .max_by_key(|s| s.discovered_at)
            .cloned()
    }

    /// Uploaded source by identifier (`name` or `name.log`). With repeated
    /// uploads under one name the newest wins.
    pub fn uploaded(&self, id: &str) -> Option<Arc<RawSource>> {
        let id = id.strip_suffix(".log").unwrap_or(id);
        self.uploaded
            .read()
            .iter()
            .rev()
            .find(|s| s.identifier == id)
            .cloned()
    }

    /// Every uploaded source, oldest discovery first.
    pub fn all_uploaded(&self) -> Vec<Arc<RawSource>> {
        let mut sources = self.uploaded.read().clone();
        sources.sort_by_key(|s| s.discovered_at); // stable: insertion order breaks ties
        sources
    }

    pub fn auto_loaded(&self, key: &str) -> Option<Arc<RawSource>> {
        self.auto_loaded.read().get(key).cloned()
    }

    /// Every auto-loaded source ordered by key.
    pub fn all_auto_loaded(&self) -> Vec<Arc<RawSource>> {
        self.auto_loaded.read().values().cloned().collect()
    }

    pub fn auto_loaded_keys(&self) -> Vec<String> {
        self.auto_loaded.read().keys().cloned().collect()
    }

    /// Swap in a freshly scanned auto-loaded set.
    pub fn replace_auto_loaded(&self, sources: Vec<Arc<RawSource>>) -> RefreshReport {
        let fresh: BTreeMap<String, Arc<RawSource>> = sources
            .into_iter()
            .map(|s| (s.identifier.clone(), s))
            .collect();

        let mut current = self.auto_loaded.write();
        let added = fresh
            .keys()
            .filter(|k| !current.contains_key(*k))
            .cloned()
            .collect();
        let removed = current
            .keys()
            .filter(|k| !fresh.contains_key(*k))
            .cloned()
            .collect();
        let total = fresh.len();
        *current = fresh;

        RefreshReport { added, removed, total }
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded.read().len()
    }

    pub fn auto_loaded_count(&self) -> usize {
        self.auto_loaded.read().len()
    }
}
