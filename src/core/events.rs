//! Upstream event vocabulary.
//!
//! Two alphabets arrive from the provider:
//! - [`OutputItem`]: entries of a response's append-only output log, read on
//!   every poll of a background job.
//! - [`StreamEvent`]: frames of a live streaming call, consumed by the relay.
//!
//! Both normalise at ingestion. Anything outside the known set, or a known
//! tag whose payload does not fit, becomes an `Unknown` variant so callers
//! can skip it without failing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[serde(alias = "searching", alias = "interpreting")]
    InProgress,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchAction {
    Search {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
    },
    OpenPage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    FindInPage {
        #[serde(default, alias = "pattern", skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebSearchCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: CallStatus,
    #[serde(default)]
    pub action: Option<SearchAction>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodeInterpreterCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: CallStatus,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "outputs")]
    pub output: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Kept raw: citation parsing skips entries that don't fit instead of
    /// rejecting the whole message.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub annotations: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub content: Vec<ContentPart>,
}

impl MessageItem {
    /// Concatenated `output_text` parts, in order.
    pub fn output_text(&self) -> String {
        self.content
            .iter()
            .filter(|part| part.kind == "output_text" || part.kind == "text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// One entry of a response's output log.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputItem {
    WebSearchCall(WebSearchCall),
    CodeInterpreterCall(CodeInterpreterCall),
    Message(MessageItem),
    Unknown { kind: String },
}

const TOOL_CALL_KINDS: [&str; 2] = ["web_search_call", "code_interpreter_call"];

impl OutputItem {
    pub fn from_value(value: &Value) -> Self {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let parsed = match kind {
            "web_search_call" => {
                serde_json::from_value(value.clone()).map(OutputItem::WebSearchCall)
            }
            "code_interpreter_call" => {
                serde_json::from_value(value.clone()).map(OutputItem::CodeInterpreterCall)
            }
            "message" => serde_json::from_value(value.clone()).map(OutputItem::Message),
            _ => {
                return OutputItem::Unknown {
                    kind: kind.to_string(),
                };
            }
        };

        parsed.unwrap_or_else(|e| {
            debug!("Skipping malformed '{}' log entry: {}", kind, e);
            OutputItem::Unknown {
                kind: kind.to_string(),
            }
        })
    }

    /// Malformed entries still count when their type tag names a tool call.
    pub fn is_tool_call(&self) -> bool {
        match self {
            OutputItem::WebSearchCall(_) | OutputItem::CodeInterpreterCall(_) => true,
            OutputItem::Unknown { kind } => TOOL_CALL_KINDS.contains(&kind.as_str()),
            OutputItem::Message(_) => false,
        }
    }
}

pub fn parse_output_log(entries: &[Value]) -> Vec<OutputItem> {
    entries.iter().map(OutputItem::from_value).collect()
}

/// A frame of a live streaming call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Created,
    OutputTextDelta { text: String },
    OutputTextDone { text: String },
    OutputItemAdded,
    OutputItemDone,
    ContentPartAdded,
    ContentPartDone,
    /// Carries the final response object when the frame includes one.
    Completed { response: Option<Value> },
    Error { message: String },
    Unknown { kind: String },
}

/// Deltas arrive either as a bare string or wrapped as `{ "text": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TextPayload {
    Bare(String),
    Wrapped { text: String },
}

fn text_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(|raw| match serde_json::from_value::<TextPayload>(raw.clone()) {
            Ok(TextPayload::Bare(text)) | Ok(TextPayload::Wrapped { text }) => Some(text),
            Err(_) => None,
        })
        .unwrap_or_default()
}

fn error_message(value: &Value) -> String {
    value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| {
            value
                .pointer("/response/error/message")
                .and_then(Value::as_str)
        })
        .unwrap_or("Unknown error")
        .to_string()
}

impl StreamEvent {
    pub fn from_json(value: &Value) -> Self {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let kind = tag.strip_prefix("response.").unwrap_or(tag);

        match kind {
            "created" => StreamEvent::Created,
            "output_text.delta" => StreamEvent::OutputTextDelta {
                text: text_field(value, &["delta", "text"]),
            },
            "output_text.done" => StreamEvent::OutputTextDone {
                text: text_field(value, &["text", "delta"]),
            },
            "output_item.added" => StreamEvent::OutputItemAdded,
            "output_item.done" => StreamEvent::OutputItemDone,
            "content_part.added" => StreamEvent::ContentPartAdded,
            "content_part.done" => StreamEvent::ContentPartDone,
            "completed" => StreamEvent::Completed {
                response: value.get("response").filter(|r| r.is_object()).cloned(),
            },
            "error" | "failed" => StreamEvent::Error {
                message: error_message(value),
            },
            other => StreamEvent::Unknown {
                kind: other.to_string(),
            },
        }
    }

    /// Decode the `data:` payload of one SSE frame.
    pub fn from_sse_data(data: &str) -> Self {
        match serde_json::from_str::<Value>(data) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                debug!("Undecodable stream frame: {}", e);
                StreamEvent::Unknown {
                    kind: "malformed".to_string(),
                }
            }
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::Created => "created",
            StreamEvent::OutputTextDelta { .. } => "output_text.delta",
            StreamEvent::OutputTextDone { .. } => "output_text.done",
            StreamEvent::OutputItemAdded => "output_item.added",
            StreamEvent::OutputItemDone => "output_item.done",
            StreamEvent::ContentPartAdded => "content_part.added",
            StreamEvent::ContentPartDone => "content_part.done",
            StreamEvent::Completed { .. } => "completed",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Unknown { kind } => kind,
        }
    }
}
