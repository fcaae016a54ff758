use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::Job;

/// In-memory job registry. Every read-modify-write runs under one lock, so
/// pollers, cancellers and the cleanup sweep never interleave on a record.
/// Contents do not survive a restart.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, job: Job) {
        self.jobs.lock().await.insert(job.id.clone(), job);
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        self.jobs.lock().await.get(id).cloned()
    }

    /// Apply `mutator` atomically. Returns the updated record and whatever
    /// the mutator returned, or `None` if the id is unknown.
    pub async fn update<R>(&self, id: &str, mutator: impl FnOnce(&mut Job) -> R) -> Option<(Job, R)> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(id)?;
        let out = mutator(job);
        Some((job.clone(), out))
    }

    pub async fn delete(&self, id: &str) -> Option<Job> {
        self.jobs.lock().await.remove(id)
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }
}
