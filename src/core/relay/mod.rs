//! Streaming relay: forwards incremental text from a live upstream call to a
//! waiting client.
//!
//! Event interpretation lives in [`relay`] alone. Call sites differ only in
//! how a chunk is framed on the wire, which is the job of a [`ChunkFormat`]:
//! - [`PlainText`]: raw text chunks, stream ends when the sink closes.
//! - [`TaggedRecords`]: `{"content": ...}` records followed by `[DONE]`.

mod sinks;

pub use sinks::{ChannelSink, CollectSink, StdoutSink};
#[cfg(test)]
pub(crate) use sinks::BufferSink;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::core::events::StreamEvent;

#[async_trait]
pub trait ChunkWriter: Send {
    async fn write(&mut self, chunk: String) -> Result<()>;

    /// Called exactly once per relay, on every exit path.
    async fn close(&mut self);
}

pub trait ChunkFormat: Send + Sync {
    fn text(&self, text: &str) -> String;

    /// Inline notice written when the upstream reports an error mid-stream.
    fn error(&self, message: &str) -> String;

    fn terminator(&self) -> Option<String> {
        None
    }
}

fn error_notice(message: &str) -> String {
    format!("\n\n[Error: {}]", message)
}

pub struct PlainText;

impl ChunkFormat for PlainText {
    fn text(&self, text: &str) -> String {
        text.to_string()
    }

    fn error(&self, message: &str) -> String {
        error_notice(message)
    }
}

pub struct TaggedRecords;

pub const DONE_SENTINEL: &str = "[DONE]";

impl ChunkFormat for TaggedRecords {
    fn text(&self, text: &str) -> String {
        serde_json::json!({ "content": text }).to_string()
    }

    fn error(&self, message: &str) -> String {
        serde_json::json!({ "content": error_notice(message) }).to_string()
    }

    fn terminator(&self) -> Option<String> {
        Some(DONE_SENTINEL.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayResult {
    pub content_sent: bool,
    /// Every delta that reached the sink, concatenated.
    pub text: String,
    pub chunks_written: usize,
    pub errors: Vec<String>,
    pub unknown_events: usize,
    /// The sink refused a write (client went away); the source was dropped.
    pub sink_closed_early: bool,
    /// Final response object from the `completed` frame, if one arrived.
    pub completed: Option<Value>,
}

pub async fn relay<S, W, F>(mut source: S, sink: &mut W, format: &F) -> RelayResult
where
    S: Stream<Item = Result<StreamEvent>> + Unpin + Send,
    W: ChunkWriter + ?Sized,
    F: ChunkFormat + ?Sized,
{
    let mut result = RelayResult::default();

    while let Some(next) = source.next().await {
        let event = match next {
            Ok(event) => event,
            Err(e) => {
                let message = e.to_string();
                warn!("Upstream stream failed: {}", message);
                if sink.write(format.error(&message)).await.is_err() {
                    result.sink_closed_early = true;
                }
                result.errors.push(message);
                break;
            }
        };

        match event {
            StreamEvent::OutputTextDelta { text } => {
                if text.is_empty() {
                    continue;
                }
                if let Err(e) = sink.write(format.text(&text)).await {
                    warn!("Relay sink rejected chunk, stopping: {}", e);
                    result.sink_closed_early = true;
                    break;
                }
                result.content_sent = true;
                result.chunks_written += 1;
                result.text.push_str(&text);
            }
            StreamEvent::Error { message } => {
                warn!("Upstream reported error mid-stream: {}", message);
                if sink.write(format.error(&message)).await.is_err() {
                    result.sink_closed_early = true;
                    result.errors.push(message);
                    break;
                }
                result.errors.push(message);
            }
            StreamEvent::Unknown { kind } => {
                debug!("Ignoring unrecognised stream event '{}'", kind);
                result.unknown_events += 1;
            }
            StreamEvent::Completed { response } => {
                debug!("Stream event: completed");
                if response.is_some() {
                    result.completed = response;
                }
            }
            other => debug!("Stream event: {}", other.kind()),
        }
    }

    if !result.content_sent {
        warn!("Relay finished without sending any content");
    }

    if !result.sink_closed_early
        && let Some(terminator) = format.terminator()
        && sink.write(terminator).await.is_err()
    {
        result.sink_closed_early = true;
    }

    sink.close().await;
    info!(
        "Relay finished: {} chunk(s), {} error(s)",
        result.chunks_written,
        result.errors.len()
    );
    result
}
