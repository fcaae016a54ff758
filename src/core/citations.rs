//! Final-answer extraction: assembled text, url citations and a summary of
//! every tool call. Used when a background job completes and on the
//! synchronous path. Anything that does not fit is skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::events::{CallStatus, MessageItem, OutputItem, SearchAction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSummary {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<SearchAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub output_text: String,
    pub citations: Vec<Citation>,
    pub tool_calls: Vec<ToolCallSummary>,
}

fn final_message(log: &[OutputItem]) -> Option<&MessageItem> {
    log.iter().rev().find_map(|item| match item {
        OutputItem::Message(message) => Some(message),
        _ => None,
    })
}

fn parse_citation(annotation: &Value) -> Option<Citation> {
    let url = annotation.get("url")?.as_str()?.to_string();
    let start_index = usize::try_from(annotation.get("start_index")?.as_u64()?).ok()?;
    let end_index = usize::try_from(annotation.get("end_index")?.as_u64()?).ok()?;
    let title = annotation
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| url.clone());
    Some(Citation {
        url,
        title,
        start_index,
        end_index,
    })
}

pub fn extract_citations(log: &[OutputItem]) -> Vec<Citation> {
    let Some(message) = final_message(log) else {
        return Vec::new();
    };

    let mut citations = Vec::new();
    for annotation in message.content.iter().flat_map(|part| &part.annotations) {
        match parse_citation(annotation) {
            Some(citation) => citations.push(citation),
            None => debug!("Skipping annotation without url/indices: {}", annotation),
        }
    }
    citations
}

pub fn extract_tool_calls(log: &[OutputItem], observed_at: DateTime<Utc>) -> Vec<ToolCallSummary> {
    log.iter()
        .filter_map(|item| match item {
            OutputItem::WebSearchCall(call) => Some(ToolCallSummary {
                kind: "web_search_call".to_string(),
                id: call.id.clone(),
                status: call.status,
                action: call.action.clone(),
                code: None,
                output: None,
                timestamp: observed_at,
            }),
            OutputItem::CodeInterpreterCall(call) => Some(ToolCallSummary {
                kind: "code_interpreter_call".to_string(),
                id: call.id.clone(),
                status: call.status,
                action: None,
                code: call.code.clone(),
                output: call.output.clone(),
                timestamp: observed_at,
            }),
            _ => None,
        })
        .collect()
}

/// `output_text` prefers the upstream's own aggregate when it sent one.
pub fn build_result(
    log: &[OutputItem],
    output_text: Option<&str>,
    observed_at: DateTime<Utc>,
) -> ResearchResult {
    let output_text = match output_text.filter(|t| !t.is_empty()) {
        Some(text) => text.to_string(),
        None => final_message(log)
            .map(MessageItem::output_text)
            .unwrap_or_default(),
    };

    ResearchResult {
        output_text,
        citations: extract_citations(log),
        tool_calls: extract_tool_calls(log, observed_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::parse_output_log;
    use serde_json::json;

    fn sample_log() -> Vec<OutputItem> {
        parse_output_log(&[
            json!({
                "type": "web_search_call",
                "id": "ws_1",
                "status": "completed",
                "action": { "type": "search", "query": "q" }
            }),
            json!({
                "type": "code_interpreter_call",
                "id": "ci_1",
                "status": "completed",
                "code": "print(2)",
                "outputs": [{ "type": "logs", "logs": "2" }]
            }),
            json!({
                "type": "message",
                "content": [{
                    "type": "output_text",
                    "text": "Answer [1]",
                    "annotations": [
                        { "type": "url_citation", "url": "a.com", "title": "A",
                          "start_index": 7, "end_index": 10 },
                        { "type": "url_citation", "title": "missing url" },
                        { "type": "file_citation", "file_id": "f1" },
                        { "type": "url_citation", "url": "b.com",
                          "start_index": 0, "end_index": 6 }
                    ]
                }]
            }),
        ])
    }

    #[test]
    fn citations_come_from_final_message_and_skip_malformed() {
        let citations = extract_citations(&sample_log());
        assert_eq!(
            citations,
            vec![
                Citation {
                    url: "a.com".to_string(),
                    title: "A".to_string(),
                    start_index: 7,
                    end_index: 10,
                },
                Citation {
                    url: "b.com".to_string(),
                    title: "b.com".to_string(),
                    start_index: 0,
                    end_index: 6,
                },
            ]
        );
    }

    #[test]
    fn tool_calls_are_summarised_in_log_order() {
        let now = Utc::now();
        let calls = extract_tool_calls(&sample_log(), now);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, "web_search_call");
        assert_eq!(calls[0].id.as_deref(), Some("ws_1"));
        assert!(calls[0].action.is_some());
        assert_eq!(calls[1].kind, "code_interpreter_call");
        assert_eq!(calls[1].code.as_deref(), Some("print(2)"));
        assert!(calls[1].output.is_some());
        assert!(calls.iter().all(|c| c.timestamp == now));
    }

    #[test]
    fn result_falls_back_to_message_text() {
        let result = build_result(&sample_log(), None, Utc::now());
        assert_eq!(result.output_text, "Answer [1]");

        let preferred = build_result(&sample_log(), Some("Upstream aggregate"), Utc::now());
        assert_eq!(preferred.output_text, "Upstream aggregate");
    }

    #[test]
    fn missing_message_degrades_to_empty() {
        let log = parse_output_log(&[json!({ "type": "reasoning" })]);
        let result = build_result(&log, None, Utc::now());
        assert!(result.output_text.is_empty());
        assert!(result.citations.is_empty());
        assert!(result.tool_calls.is_empty());
    }
}
