//! The AI provider the service orchestrates. It creates responses (in the
//! background or synchronously), reports their status and output log, and
//! streams live frames.

mod responses;
#[cfg(test)]
pub(crate) mod scripted;
mod sse;

pub use responses::ResponsesClient;

use std::pin::Pin;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::Stream;

use crate::core::events::StreamEvent;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
    CodeInterpreter,
}

impl ToolKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "web_search" | "web_search_preview" => Some(ToolKind::WebSearch),
            "code_interpreter" => Some(ToolKind::CodeInterpreter),
            _ => None,
        }
    }

    pub fn to_json(self) -> Value {
        match self {
            ToolKind::WebSearch => serde_json::json!({ "type": "web_search_preview" }),
            ToolKind::CodeInterpreter => serde_json::json!({
                "type": "code_interpreter",
                "container": { "type": "auto" }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub model: String,
    pub input: String,
    pub tools: Vec<ToolKind>,
    pub max_tool_calls: Option<u32>,
    pub background: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Incomplete,
}

impl UpstreamStatus {
    /// Unrecognised statuses are treated as still running.
    pub fn parse(value: &str) -> Self {
        match value {
            "queued" => UpstreamStatus::Queued,
            "completed" => UpstreamStatus::Completed,
            "failed" => UpstreamStatus::Failed,
            "cancelled" | "canceled" => UpstreamStatus::Cancelled,
            "incomplete" => UpstreamStatus::Incomplete,
            _ => UpstreamStatus::InProgress,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, UpstreamStatus::Queued | UpstreamStatus::InProgress)
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub id: String,
    pub status: UpstreamStatus,
    pub output: Vec<Value>,
    pub output_text: Option<String>,
    pub error: Option<String>,
}

impl UpstreamResponse {
    pub fn from_json(value: &Value) -> Result<Self> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("upstream response has no id"))?
            .to_string();
        let status = UpstreamStatus::parse(
            value
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        );
        let output = value
            .get("output")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let output_text = value
            .get("output_text")
            .and_then(Value::as_str)
            .map(str::to_string);

        let error = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                value
                    .pointer("/incomplete_details/reason")
                    .and_then(Value::as_str)
                    .map(|reason| format!("response incomplete: {}", reason))
            });

        Ok(Self {
            id,
            status,
            output,
            output_text,
            error,
        })
    }
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn create(&self, request: &UpstreamRequest) -> Result<UpstreamResponse>;

    async fn retrieve(&self, id: &str) -> Result<UpstreamResponse>;

    async fn cancel(&self, id: &str) -> Result<()>;

    async fn stream(&self, request: &UpstreamRequest) -> Result<EventStream>;
}
