//! Progress snapshots for background research jobs.
//!
//! A snapshot is recomputed from the full output log on every poll; nothing
//! here is incremental. [`extract`] is pure: the same log and observation
//! time always produce the same snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::events::{CallStatus, OutputItem, SearchAction, WebSearchCall};

pub const GENERIC_ACTIVITY: &str = "processing";
pub const STARTING_ACTIVITY: &str = "starting research";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Discovered,
    Reading,
    Found,
    Completed,
    Accessed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    pub status: LinkStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDetails {
    pub sources_found: usize,
    pub pages_accessed: usize,
    pub searches_performed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current_activity: String,
    pub tool_calls_count: usize,
    pub current_links: Vec<LinkRef>,
    pub all_discovered_links: Vec<LinkRef>,
    pub details: ProgressDetails,
}

impl ProgressSnapshot {
    /// Snapshot stored on a freshly submitted job, before the first poll.
    pub fn placeholder() -> Self {
        Self {
            current_activity: STARTING_ACTIVITY.to_string(),
            tool_calls_count: 0,
            current_links: Vec::new(),
            all_discovered_links: Vec::new(),
            details: ProgressDetails::default(),
        }
    }
}

fn link(
    url: &str,
    title: &str,
    snippet: Option<&String>,
    status: LinkStatus,
    at: DateTime<Utc>,
) -> LinkRef {
    LinkRef {
        url: url.to_string(),
        title: if title.is_empty() {
            url.to_string()
        } else {
            title.to_string()
        },
        snippet: snippet.cloned(),
        status,
        timestamp: at,
    }
}

fn result_links(call: &WebSearchCall, status: LinkStatus, at: DateTime<Utc>) -> Vec<LinkRef> {
    call.results
        .iter()
        .filter(|r| !r.url.is_empty())
        .map(|r| link(&r.url, &r.title, r.snippet.as_ref(), status, at))
        .collect()
}

fn page_link(
    url: Option<&String>,
    title: Option<&String>,
    status: LinkStatus,
    at: DateTime<Utc>,
) -> Option<LinkRef> {
    let url = url.filter(|u| !u.is_empty())?;
    Some(link(
        url,
        title.map(String::as_str).unwrap_or_default(),
        None,
        status,
        at,
    ))
}

fn labelled(prefix: &str, subject: Option<&String>) -> String {
    match subject.filter(|s| !s.is_empty()) {
        Some(subject) => format!("{}: {}", prefix, subject),
        None => prefix.to_string(),
    }
}

/// Activity label and current links derived from the most recent entry.
fn latest_activity(last: Option<&OutputItem>, at: DateTime<Utc>) -> (String, Vec<LinkRef>) {
    let Some(last) = last else {
        return (GENERIC_ACTIVITY.to_string(), Vec::new());
    };

    match last {
        OutputItem::WebSearchCall(call) => match (call.status, call.action.as_ref()) {
            (CallStatus::InProgress, Some(SearchAction::Search { query })) => {
                (labelled("searching", query.as_ref()), Vec::new())
            }
            (CallStatus::InProgress, Some(SearchAction::OpenPage { url, title })) => (
                labelled("reading", url.as_ref()),
                page_link(url.as_ref(), title.as_ref(), LinkStatus::Reading, at)
                    .into_iter()
                    .collect(),
            ),
            (CallStatus::InProgress, Some(SearchAction::FindInPage { query, .. })) => {
                (labelled("searching in page", query.as_ref()), Vec::new())
            }
            (CallStatus::Completed, Some(SearchAction::Search { .. })) => (
                "analyzing search results".to_string(),
                result_links(call, LinkStatus::Found, at),
            ),
            (CallStatus::Completed, Some(SearchAction::OpenPage { url, title })) => (
                "analyzing search results".to_string(),
                page_link(url.as_ref(), title.as_ref(), LinkStatus::Completed, at)
                    .into_iter()
                    .collect(),
            ),
            _ => (GENERIC_ACTIVITY.to_string(), Vec::new()),
        },
        OutputItem::CodeInterpreterCall(call) => match call.status {
            CallStatus::InProgress => ("running code analysis".to_string(), Vec::new()),
            CallStatus::Completed => ("processing code results".to_string(), Vec::new()),
            _ => (GENERIC_ACTIVITY.to_string(), Vec::new()),
        },
        OutputItem::Message(_) => ("finalizing report".to_string(), Vec::new()),
        OutputItem::Unknown { .. } => (GENERIC_ACTIVITY.to_string(), Vec::new()),
    }
}

fn completed_searches(log: &[OutputItem]) -> impl Iterator<Item = &WebSearchCall> {
    log.iter().filter_map(|item| match item {
        OutputItem::WebSearchCall(call) if call.status == CallStatus::Completed => Some(call),
        _ => None,
    })
}

pub fn extract(log: &[OutputItem], observed_at: DateTime<Utc>) -> ProgressSnapshot {
    let tool_calls_count = log.iter().filter(|item| item.is_tool_call()).count();
    let (current_activity, current_links) = latest_activity(log.last(), observed_at);

    let mut all_discovered_links = Vec::new();
    let mut details = ProgressDetails::default();

    for call in completed_searches(log) {
        details.sources_found += 1;
        match call.action.as_ref() {
            Some(SearchAction::Search { .. }) => {
                details.searches_performed += 1;
                all_discovered_links.extend(result_links(
                    call,
                    LinkStatus::Discovered,
                    observed_at,
                ));
            }
            Some(SearchAction::OpenPage { url, title }) => {
                details.pages_accessed += 1;
                all_discovered_links.extend(page_link(
                    url.as_ref(),
                    title.as_ref(),
                    LinkStatus::Accessed,
                    observed_at,
                ));
            }
            _ => {}
        }
    }

    ProgressSnapshot {
        current_activity,
        tool_calls_count,
        current_links,
        all_discovered_links,
        details,
    }
}
