use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use super::model::{Job, JobId, JobResult, JobStatus, NewJob};

/// Change notifications for anyone reporting on jobs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Created { job: Job },
    StatusChanged { job: Job },
    Deleted { id: JobId },
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    // keyed by sequential id, so iteration order is creation order
    jobs: BTreeMap<JobId, Job>,
}

/// In-memory job store. Cheap to clone; all clones share the same jobs.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    store: Arc<Mutex<Store>>,
    events: broadcast::Sender<JobEvent>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn create(&self, request: NewJob) -> Job {
        let job = {
            let mut store = self.store.lock();
            store.next_id += 1;
            let id = JobId(store.next_id);
            let job = Job {
                id,
                status: JobStatus::Pending,
                url: request.url,
                form_data: request.form_data,
                name: request.name,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                result: None,
            };
            store.jobs.insert(id, job.clone());
            job
        };

        info!(job = %job.id, url = %job.url, "created job");
        let _ = self.events.send(JobEvent::Created { job: job.clone() });
        job
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.store.lock().jobs.get(&id).cloned()
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.store.lock().jobs.values().cloned().collect()
    }

    pub fn next_pending(&self) -> Option<Job> {
        self.store
            .lock()
            .jobs
            .values()
            .find(|j| j.status == JobStatus::Pending)
            .cloned()
    }

    /// The only way a job's status changes. Returns false for an unknown id.
    pub fn update_status(&self, id: JobId, status: JobStatus, result: Option<JobResult>) -> bool {
        let updated = {
            let mut store = self.store.lock();
            let Some(job) = store.jobs.get_mut(&id) else {
                return false;
            };

            job.status = status;
            if status == JobStatus::Running && job.started_at.is_none() {
                job.started_at = Some(Utc::now());
            }
            if status.is_terminal() {
                job.completed_at = Some(Utc::now());
                if result.is_some() {
                    job.result = result;
                }
            }
            job.clone()
        };

        match status {
            JobStatus::Running => info!(job = %id, "job is now running"),
            JobStatus::Completed => info!(job = %id, "job completed successfully"),
            JobStatus::Failed => info!(job = %id, "job failed"),
            JobStatus::Pending => {}
        }
        let _ = self.events.send(JobEvent::StatusChanged { job: updated });
        true
    }

    pub fn delete(&self, id: JobId) -> bool {
        let removed = self.store.lock().jobs.remove(&id).is_some();
        if removed {
            let _ = self.events.send(JobEvent::Deleted { id });
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueMapping;

    fn request(url: &str) -> NewJob {
        NewJob {
            url: url.to_string(),
            form_data: ValueMapping::new(),
            name: None,
        }
    }

    #[test]
    fn ids_are_sequential_and_jobs_start_pending() {
        let registry = JobRegistry::new();
        let a = registry.create(request("https://a.test"));
        let b = registry.create(request("https://b.test"));
        assert_eq!(a.id, JobId(1));
        assert_eq!(b.id, JobId(2));
        assert_eq!(a.status, JobStatus::Pending);
        assert_eq!(registry.list().len(), 2);
        assert_eq!(registry.next_pending().unwrap().id, a.id);
    }

    #[test]
    fn status_updates_stamp_times() {
        let registry = JobRegistry::new();
        let id = registry.create(request("https://a.test")).id;

        assert!(registry.update_status(id, JobStatus::Running, None));
        let started = registry.get(id).unwrap().started_at.unwrap();

        // a second running transition keeps the first start time
        registry.update_status(id, JobStatus::Running, None);
        assert_eq!(registry.get(id).unwrap().started_at, Some(started));
        assert!(registry.get(id).unwrap().completed_at.is_none());

        registry.update_status(id, JobStatus::Failed, Some(JobResult::failed("boom")));
        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());
        assert_eq!(job.result.unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn unknown_ids_are_reported() {
        let registry = JobRegistry::new();
        assert!(!registry.update_status(JobId(9), JobStatus::Running, None));
        assert!(!registry.delete(JobId(9)));
    }

    #[test]
    fn delete_removes_and_notifies() {
        let registry = JobRegistry::new();
        let mut events = registry.subscribe();
        let id = registry.create(request("https://a.test")).id;
        assert!(registry.delete(id));
        assert!(registry.get(id).is_none());

        assert!(matches!(events.try_recv(), Ok(JobEvent::Created { .. })));
        assert!(matches!(events.try_recv(), Ok(JobEvent::Deleted { id: gone }) if gone == id));
    }
}
