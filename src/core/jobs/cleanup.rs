use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info};

use super::JobStore;
use crate::core::config::JobsConfig;
use crate::core::lifecycle::LifecycleComponent;

#[derive(Debug, Clone)]
pub struct CleanupPolicy {
    pub max_age: Duration,
    /// When set, only completed/failed/cancelled jobs are removed.
    pub terminal_only: bool,
}

impl CleanupPolicy {
    pub fn from_config(jobs: &JobsConfig) -> Result<Self> {
        let max_age = i64::try_from(jobs.max_age_hours)
            .ok()
            .and_then(Duration::try_hours)
            .with_context(|| {
                format!("jobs.max_age_hours = {} is out of range", jobs.max_age_hours)
            })?;
        Ok(Self {
            max_age,
            terminal_only: jobs.cleanup_terminal_only,
        })
    }
}

/// Remove every job whose `start_time` is older than the policy's max age.
/// Returns the removed ids, sorted.
pub async fn sweep_expired(
    store: &JobStore,
    policy: &CleanupPolicy,
    now: DateTime<Utc>,
) -> Vec<String> {
    // A cutoff before the earliest representable time expires nothing.
    let Some(cutoff) = now.checked_sub_signed(policy.max_age) else {
        return Vec::new();
    };

    // Start time never changes and terminal states are final, so a job
    // selected here is still expired when its delete runs.
    let mut removed = Vec::new();
    for job in store.list().await {
        let expired = job.start_time < cutoff;
        if expired
            && (!policy.terminal_only || job.status.is_terminal())
            && store.delete(&job.id).await.is_some()
        {
            removed.push(job.id);
        }
    }
    removed.sort();

    if !removed.is_empty() {
        info!("Cleanup removed {} expired job(s)", removed.len());
    }
    removed
}

/// Registers the periodic sweep on the lifecycle's cron scheduler.
pub struct CleanupScheduler {
    store: JobStore,
    policy: CleanupPolicy,
    cron: String,
    scheduler: JobScheduler,
}

impl CleanupScheduler {
    pub fn new(store: JobStore, policy: CleanupPolicy, cron: String, scheduler: JobScheduler) -> Self {
        Self {
            store,
            policy,
            cron,
            scheduler,
        }
    }
}

#[async_trait]
impl LifecycleComponent for CleanupScheduler {
    async fn on_init(&mut self) -> Result<()> {
        let store = self.store.clone();
        let policy = self.policy.clone();
        let job = tokio_cron_scheduler::Job::new_async(self.cron.as_str(), move |_uuid, _l| {
            let store = store.clone();
            let policy = policy.clone();
            Box::pin(async move {
                sweep_expired(&store, &policy, Utc::now()).await;
            })
        });

        match job {
            Ok(job) => {
                self.scheduler.add(job).await?;
                info!(
                    "Job cleanup scheduled ({}; max age {}h, terminal only: {})",
                    self.cron,
                    self.policy.max_age.num_hours(),
                    self.policy.terminal_only
                );
            }
            Err(e) => {
                error!("Invalid cleanup schedule '{}': {}", self.cron, e);
                return Err(e.into());
            }
        }
        Ok(())
    }
}
