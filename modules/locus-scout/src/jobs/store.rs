use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use locus_common::error::{LocusError, Result};
use locus_common::{Job, JobId};

/// One job's state behind its own lock.
///
/// The executing controller holds a slot for the whole run, so a job
/// deleted mid-run keeps receiving writes into a detached slot that is
/// dropped when the run ends.
#[derive(Clone)]
pub struct JobSlot(Arc<RwLock<Job>>);

impl JobSlot {
    fn new(job: Job) -> Self {
        Self(Arc::new(RwLock::new(job)))
    }

    pub fn snapshot(&self) -> Job {
        self.0.read().expect("job lock poisoned").clone()
    }

    /// Apply one stage update atomically. Readers never see a half-applied
    /// update.
    pub fn update<T>(&self, f: impl FnOnce(&mut Job) -> Result<T>) -> Result<T> {
        let mut job = self.0.write().expect("job lock poisoned");
        f(&mut job)
    }
}

/// Keyed job registry with a per-job lock. Jobs are inserted on submit and
/// only leave through `remove`.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobSlot>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) -> JobSlot {
        let id = job.id;
        let slot = JobSlot::new(job);
        self.jobs
            .write()
            .expect("job store lock poisoned")
            .insert(id, slot.clone());
        slot
    }

    pub fn slot(&self, id: JobId) -> Option<JobSlot> {
        self.jobs
            .read()
            .expect("job store lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn get(&self, id: JobId) -> Result<Job> {
        self.slot(id)
            .map(|slot| slot.snapshot())
            .ok_or(LocusError::JobNotFound(id))
    }

    pub fn remove(&self, id: JobId) -> Result<Job> {
        self.jobs
            .write()
            .expect("job store lock poisoned")
            .remove(&id)
            .map(|slot| slot.snapshot())
            .ok_or(LocusError::JobNotFound(id))
    }

    /// Newest first.
    pub fn list(&self, limit: usize) -> Vec<Job> {
        let slots: Vec<JobSlot> = self
            .jobs
            .read()
            .expect("job store lock poisoned")
            .values()
            .cloned()
            .collect();
        let mut jobs: Vec<Job> = slots.iter().map(JobSlot::snapshot).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.read().expect("job store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_common::JobStatus;

    #[test]
    fn insert_get_remove() {
        let store = JobStore::new();
        let job = Job::new("Acme Corp");
        let id = job.id;
        store.insert(job);

        assert_eq!(store.get(id).unwrap().company, "Acme Corp");
        assert!(store.remove(id).is_ok());
        assert!(matches!(store.get(id), Err(LocusError::JobNotFound(_))));
        assert!(matches!(store.remove(id), Err(LocusError::JobNotFound(_))));
    }

    #[test]
    fn detached_slot_keeps_accepting_writes() {
        let store = JobStore::new();
        let job = Job::new("Acme Corp");
        let id = job.id;
        let slot = store.insert(job);
        store.remove(id).unwrap();

        slot.update(|job| job.start(10, "Initializing")).unwrap();
        assert_eq!(slot.snapshot().status, JobStatus::Running);
        assert!(store.get(id).is_err());
    }

    #[test]
    fn failed_update_leaves_job_untouched() {
        let store = JobStore::new();
        let slot = store.insert(Job::new("Acme Corp"));
        let result = slot.update(|job| job.advance(50, "too early"));
        assert!(result.is_err());
        assert_eq!(slot.snapshot().progress, 0);
    }

    #[test]
    fn list_is_newest_first_and_limited() {
        let store = JobStore::new();
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut job = Job::new(format!("Company {i}"));
            job.created_at += chrono::Duration::seconds(i);
            ids.push(job.id);
            store.insert(job);
        }
        let listed: Vec<JobId> = store.list(2).iter().map(|j| j.id).collect();
        assert_eq!(listed, vec![ids[2], ids[1]]);
        assert_eq!(store.len(), 3);
    }
}
