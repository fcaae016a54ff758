use axum::{
    Json,
    body::Body,
    extract::State,
    http::header,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use super::super::AppState;
use crate::core::jobs::{JobError, ResearchRequest};
use crate::core::relay::{ChannelSink, ChunkFormat, PlainText, TaggedRecords, relay};
use crate::core::upstream::EventStream;

#[derive(serde::Deserialize)]
pub struct ChatRequest {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
}

async fn open_stream(state: &AppState, payload: ChatRequest) -> Result<EventStream, JobError> {
    let request = ResearchRequest {
        query: payload.prompt,
        model: payload.model,
        tools: payload.tools,
        ..Default::default()
    };
    let upstream_request = request.to_upstream(state.manager.settings(), false)?;
    info!("Relaying streamed answer (model: {})", upstream_request.model);
    state
        .manager
        .upstream()
        .stream(&upstream_request)
        .await
        .map_err(JobError::upstream)
}

/// Runs the relay in the background; the returned receiver yields formatted chunks.
fn spawn_relay<F>(source: EventStream, format: F) -> mpsc::Receiver<String>
where
    F: ChunkFormat + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        let outcome = relay(source, &mut sink, &format).await;
        if outcome.sink_closed_early {
            warn!(
                "Client went away after {} chunk(s)",
                outcome.chunks_written
            );
        }
    });
    rx
}

pub async fn chat_stream_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, JobError> {
    let source = open_stream(&state, payload).await?;
    let rx = spawn_relay(source, PlainText);
    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

pub async fn chat_events_endpoint(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, JobError> {
    let source = open_stream(&state, payload).await?;
    let rx = spawn_relay(source, TaggedRecords);
    let stream =
        ReceiverStream::new(rx).map(|msg| Ok::<_, Infallible>(Event::default().data(msg)));

    Ok(Sse::new(stream).into_response())
}
