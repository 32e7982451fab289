//! Store — concurrent in-memory job storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::model::{Job, JobId};

/// Jobs keyed by id. Written once at ingestion, read many times.
#[derive(Debug)]
pub struct JobStore {
    jobs: DashMap<JobId, Arc<Job>>,
    next_id: AtomicU64,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Reserve a fresh id. Ids are never reused.
    pub fn allocate_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Insert a built job. An id is only ever inserted once; a second insert
    /// under the same id keeps the first job.
    pub fn insert(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        Arc::clone(self.jobs.entry(job.id).or_insert(job).value())
    }

    pub fn get(&self, id: JobId) -> Option<Arc<Job>> {
        self.jobs.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// All jobs, lowest id first.
    pub fn list(&self) -> Vec<Arc<Job>> {
        let mut jobs: Vec<_> = self.jobs.iter().map(|e| Arc::clone(e.value())).collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    /// Jobs built from the given source identifier, oldest first.
    pub fn find_by_name(&self, name: &str) -> Vec<Arc<Job>> {
        let mut jobs: Vec<_> = self
            .jobs
            .iter()
            .filter(|e| e.value().name == name)
            .map(|e| Arc::clone(e.value()))
            .collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::builder::build;
    use crate::parser::{FormatKind, ParsedEvent};
    use crate::source::{RawSource, SourceKind, SourceOrigin};
    use chrono::Utc;

    fn job(store: &JobStore, name: &str) -> Job {
        let source = RawSource::new(SourceOrigin::new(SourceKind::Uploaded, name), "x");
        let events = vec![ParsedEvent::generic(1, 1, Utc::now(), "x".to_string())];
        build(store.allocate_id(), &source, FormatKind::OpaqueFallback, events)
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let store = JobStore::new();
        let a = store.allocate_id();
        let b = store.allocate_id();
        assert!(b > a);
    }

    #[test]
    fn test_insert_and_get() {
        let store = JobStore::new();
        let inserted = store.insert(job(&store, "first"));
        let fetched = store.get(inserted.id).unwrap();
        assert_eq!(fetched.name, "first");
        assert_eq!(store.len(), 1);
        assert!(store.get(JobId(999)).is_none());
    }

    #[test]
    fn test_same_source_twice_gets_two_identities() {
        let store = JobStore::new();
        let a = store.insert(job(&store, "same"));
        let b = store.insert(job(&store, "same"));
        assert_ne!(a.id, b.id);
        let found = store.find_by_name("same");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, a.id);
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let store = JobStore::new();
        let first = job(&store, "one");
        let mut second = job(&store, "two");
        second.id = first.id;
        store.insert(first);
        let kept = store.insert(second);
        assert_eq!(kept.name, "one");
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = Arc::new(JobStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let j = job(&store, &format!("job-{}", i));
                    store.insert(j);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
        let ids: Vec<_> = store.list().iter().map(|j| j.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
