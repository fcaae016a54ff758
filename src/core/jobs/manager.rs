//! Background research job lifecycle: submit, poll, cancel, list, plus the
//! synchronous (non-background) path.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::request::preview_query;
use super::{Job, JobError, JobStatus, JobStore, JobSummary, ResearchRequest};
use crate::core::citations::{Citation, ToolCallSummary, build_result};
use crate::core::config::JobsConfig;
use crate::core::events::parse_output_log;
use crate::core::progress::extract;
use crate::core::relay::{CollectSink, PlainText, relay};
use crate::core::upstream::{Upstream, UpstreamStatus};

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub default_model: String,
    pub default_max_tool_calls: u32,
    pub query_preview_chars: usize,
    pub stale_after: Option<Duration>,
}

impl JobSettings {
    pub fn from_config(jobs: &JobsConfig, default_model: &str) -> Result<Self> {
        let stale_after = jobs
            .stale_after_minutes
            .map(|minutes| {
                i64::try_from(minutes)
                    .ok()
                    .and_then(Duration::try_minutes)
                    .with_context(|| {
                        format!("jobs.stale_after_minutes = {} is out of range", minutes)
                    })
            })
            .transpose()?;

        Ok(Self {
            default_model: default_model.to_string(),
            default_max_tool_calls: jobs.default_max_tool_calls,
            query_preview_chars: jobs.query_preview_chars,
            stale_after,
        })
    }
}

/// Answer of the synchronous path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReply {
    pub role: &'static str,
    pub content: String,
    pub citations: Vec<Citation>,
    pub tool_calls: Vec<ToolCallSummary>,
}

#[derive(Clone)]
pub struct ResearchManager {
    store: JobStore,
    upstream: Arc<dyn Upstream>,
    settings: JobSettings,
}

impl ResearchManager {
    pub fn new(store: JobStore, upstream: Arc<dyn Upstream>, settings: JobSettings) -> Self {
        Self {
            store,
            upstream,
            settings,
        }
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    pub fn upstream(&self) -> Arc<dyn Upstream> {
        self.upstream.clone()
    }

    pub async fn submit(&self, request: &ResearchRequest) -> Result<Job, JobError> {
        let upstream_request = request.to_upstream(&self.settings, true)?;
        let response = self
            .upstream
            .create(&upstream_request)
            .await
            .map_err(JobError::upstream)?;

        let now = Utc::now();
        let mut job = Job::new(
            response.id,
            preview_query(&request.query, self.settings.query_preview_chars),
            upstream_request.model,
            upstream_request
                .max_tool_calls
                .unwrap_or(self.settings.default_max_tool_calls),
            now,
        );
        job.transition(JobStatus::InProgress, now)?;

        info!(
            "Research job [{}] started (model: {}, budget: {} tool calls)",
            job.id, job.model, job.max_tool_calls
        );
        self.store.put(job.clone()).await;
        Ok(job)
    }

    /// Streams the answer through the relay and assembles the reply once the
    /// upstream finishes. `content` is what a streaming client would have
    /// read, inline error notices included. Citations and tool calls come
    /// from the final response carried by the `completed` frame.
    pub async fn run_sync(&self, request: &ResearchRequest) -> Result<SyncReply, JobError> {
        let upstream_request = request.to_upstream(&self.settings, false)?;
        let source = self
            .upstream
            .stream(&upstream_request)
            .await
            .map_err(JobError::upstream)?;

        let mut sink = CollectSink::default();
        let relayed = relay(source, &mut sink, &PlainText).await;
        if !relayed.content_sent
            && let Some(message) = relayed.errors.first()
        {
            return Err(JobError::Upstream(message.clone()));
        }

        let output = relayed
            .completed
            .as_ref()
            .and_then(|response| response.get("output"))
            .and_then(Value::as_array)
            .map(|entries| parse_output_log(entries))
            .unwrap_or_default();
        let result = build_result(&output, Some(sink.buffer.as_str()), Utc::now());
        info!(
            "Synchronous research answered ({} chunk(s), {} citation(s))",
            relayed.chunks_written,
            result.citations.len()
        );
        Ok(SyncReply {
            role: "assistant",
            content: result.output_text,
            citations: result.citations,
            tool_calls: result.tool_calls,
        })
    }

    pub async fn poll(&self, id: &str) -> Result<Job, JobError> {
        let current = self
            .store
            .get(id)
            .await
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if current.status.is_terminal() {
            return Ok(current);
        }

        let response = self
            .upstream
            .retrieve(id)
            .await
            .map_err(JobError::upstream)?;

        let now = Utc::now();
        let log = parse_output_log(&response.output);
        let snapshot = extract(&log, now);
        let outcome = match response.status {
            UpstreamStatus::Completed => Some(JobStatus::Completed),
            UpstreamStatus::Failed | UpstreamStatus::Incomplete => Some(JobStatus::Failed),
            UpstreamStatus::Cancelled => Some(JobStatus::Cancelled),
            UpstreamStatus::Queued | UpstreamStatus::InProgress => None,
        };
        let result = (outcome == Some(JobStatus::Completed))
            .then(|| build_result(&log, response.output_text.as_deref(), now));
        let upstream_error = response.error;

        let (job, _) = self
            .store
            .update(id, |job| {
                // A concurrent cancel may have finished the job while we were
                // waiting on the upstream.
                if job.status.is_terminal() {
                    return;
                }
                job.apply_progress(snapshot, now);
                let Some(to) = outcome else {
                    return;
                };
                if let Err(e) = job.transition(to, now) {
                    warn!("Job [{}]: {}", job.id, e);
                    return;
                }
                match to {
                    JobStatus::Completed => job.result = result,
                    JobStatus::Failed => {
                        job.error = Some(
                            upstream_error
                                .unwrap_or_else(|| "upstream reported failure".to_string()),
                        )
                    }
                    _ => {}
                }
                info!("Research job [{}] is now {}", job.id, to.as_str());
            })
            .await
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        Ok(job)
    }

    pub async fn cancel(&self, id: &str) -> Result<Job, JobError> {
        let current = self
            .store
            .get(id)
            .await
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if current.status.is_terminal() {
            return Ok(current);
        }

        if let Err(e) = self.upstream.cancel(id).await {
            warn!(
                "Upstream cancel for job [{}] failed, cancelling locally: {}",
                id, e
            );
        }

        let now = Utc::now();
        let (job, _) = self
            .store
            .update(id, |job| {
                if job.status.is_terminal() {
                    return;
                }
                match job.transition(JobStatus::Cancelled, now) {
                    Ok(()) => info!("Research job [{}] cancelled", job.id),
                    Err(e) => warn!("Job [{}]: {}", job.id, e),
                }
            })
            .await
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        Ok(job)
    }

    pub async fn list(&self) -> Vec<JobSummary> {
        let now = Utc::now();
        self.store
            .list()
            .await
            .iter()
            .map(|job| job.summary(now, self.settings.stale_after))
            .collect()
    }

    pub fn is_stale(&self, job: &Job) -> bool {
        job.is_stale(Utc::now(), self.settings.stale_after)
    }
}
