use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};

use super::super::AppState;
use crate::core::jobs::{Job, JobError, ResearchRequest};

pub async fn submit_research_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Response, JobError> {
    if payload.background {
        let job = state.manager.submit(&payload).await?;
        return Ok(Json(json!({
            "success": true,
            "jobId": job.id,
            "status": "started"
        }))
        .into_response());
    }

    let reply = state.manager.run_sync(&payload).await?;
    Ok(Json(json!({
        "success": true,
        "role": reply.role,
        "content": reply.content,
        "citations": reply.citations,
        "toolCalls": reply.tool_calls
    }))
    .into_response())
}

pub async fn list_jobs_endpoint(State(state): State<AppState>) -> Json<Value> {
    let jobs = state.manager.list().await;
    Json(json!({ "success": true, "jobs": jobs }))
}

pub async fn poll_job_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, JobError> {
    let job = state.manager.poll(&id).await?;
    let stale = state.manager.is_stale(&job);
    Ok(Json(status_body(job, stale)))
}

pub async fn cancel_job_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, JobError> {
    let job = state.manager.cancel(&id).await?;
    Ok(Json(json!({
        "success": true,
        "jobId": job.id,
        "status": job.status
    })))
}

fn status_body(job: Job, stale: bool) -> Value {
    let mut body = Map::new();
    body.insert("success".into(), json!(true));
    body.insert("jobId".into(), json!(job.id));
    body.insert("status".into(), json!(job.status));
    body.insert("query".into(), json!(job.query));
    body.insert("startTime".into(), json!(job.start_time));
    body.insert("progress".into(), json!(job.progress));
    if let Some(result) = job.result {
        body.insert("response".into(), json!(result));
    }
    if let Some(error) = job.error {
        body.insert("error".into(), json!(error));
    }
    if stale {
        body.insert("stale".into(), json!(true));
    }
    Value::Object(body)
}
