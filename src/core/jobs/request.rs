use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{JobError, JobSettings};
use crate::core::upstream::{ToolKind, UpstreamRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClarificationValue {
    One(String),
    Many(Vec<String>),
}

impl ClarificationValue {
    fn render(&self) -> String {
        match self {
            ClarificationValue::One(value) => value.clone(),
            ClarificationValue::Many(values) => values.join(", "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tool_calls: Option<u32>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub clarifications: Option<BTreeMap<String, ClarificationValue>>,
    #[serde(default)]
    pub custom_sources: Option<Vec<CustomSource>>,
}

impl ResearchRequest {
    pub fn tool_kinds(&self) -> Result<Vec<ToolKind>, JobError> {
        let mut kinds = Vec::new();
        for name in &self.tools {
            let kind = ToolKind::parse(name)
                .ok_or_else(|| JobError::InvalidRequest(format!("unsupported tool '{}'", name)))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    /// The query plus any clarification answers and preferred sources.
    pub fn compose_input(&self) -> Result<String, JobError> {
        let mut input = self.query.trim().to_string();

        if let Some(clarifications) = self.clarifications.as_ref().filter(|c| !c.is_empty()) {
            input.push_str("\n\nClarifications:");
            for (key, value) in clarifications {
                input.push_str(&format!("\n- {}: {}", key, value.render()));
            }
        }

        if let Some(sources) = self.custom_sources.as_ref().filter(|s| !s.is_empty()) {
            input.push_str("\n\nPreferred sources:");
            for source in sources {
                let parsed = url::Url::parse(&source.url).map_err(|e| {
                    JobError::InvalidRequest(format!("invalid source url '{}': {}", source.url, e))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(JobError::InvalidRequest(format!(
                        "source url '{}' must be http(s)",
                        source.url
                    )));
                }
                input.push_str(&format!("\n- {} ({})", source.name, parsed));
            }
        }

        Ok(input)
    }

    pub fn to_upstream(
        &self,
        settings: &JobSettings,
        background: bool,
    ) -> Result<UpstreamRequest, JobError> {
        if self.query.trim().is_empty() {
            return Err(JobError::InvalidRequest("query is required".to_string()));
        }
        if self.max_tool_calls == Some(0) {
            return Err(JobError::InvalidRequest(
                "max_tool_calls must be at least 1".to_string(),
            ));
        }

        let model = self
            .model
            .as_ref()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| settings.default_model.clone());

        Ok(UpstreamRequest {
            model,
            input: self.compose_input()?,
            tools: self.tool_kinds()?,
            max_tool_calls: Some(
                self.max_tool_calls
                    .unwrap_or(settings.default_max_tool_calls),
            ),
            background,
        })
    }
}

/// Display copy of a query: at most `max_chars` characters, `...` when cut.
pub fn preview_query(query: &str, max_chars: usize) -> String {
    let query = query.trim();
    match query.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &query[..cut]),
        None => query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> JobSettings {
        JobSettings {
            default_model: "default-model".to_string(),
            default_max_tool_calls: 30,
            query_preview_chars: 10,
            stale_after: None,
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview_query("short", 10), "short");
        assert_eq!(preview_query("exactly10!", 10), "exactly10!");
        assert_eq!(preview_query("héllo wörld, again", 7), "héllo w...");
    }

    #[test]
    fn compose_input_appends_clarifications_and_sources() {
        let mut clarifications = BTreeMap::new();
        clarifications.insert(
            "region".to_string(),
            ClarificationValue::Many(vec!["EU".to_string(), "US".to_string()]),
        );
        clarifications.insert(
            "depth".to_string(),
            ClarificationValue::One("brief".to_string()),
        );
        let request = ResearchRequest {
            query: "  Battery recycling economics ".to_string(),
            clarifications: Some(clarifications),
            custom_sources: Some(vec![CustomSource {
                name: "IEA".to_string(),
                url: "https://www.iea.org".to_string(),
            }]),
            ..Default::default()
        };

        let input = request.compose_input().unwrap();
        assert_eq!(
            input,
            "Battery recycling economics\n\nClarifications:\n- depth: brief\n- region: EU, US\
             \n\nPreferred sources:\n- IEA (https://www.iea.org/)"
        );
    }

    #[test]
    fn invalid_source_url_is_rejected() {
        let request = ResearchRequest {
            query: "q".to_string(),
            custom_sources: Some(vec![CustomSource {
                name: "local".to_string(),
                url: "file:///etc/passwd".to_string(),
            }]),
            ..Default::default()
        };
        assert!(matches!(
            request.compose_input(),
            Err(JobError::InvalidRequest(_))
        ));
    }

    #[test]
    fn to_upstream_applies_defaults_and_validates() {
        let request = ResearchRequest {
            query: "q".to_string(),
            tools: vec!["web_search".to_string(), "web_search_preview".to_string()],
            ..Default::default()
        };
        let upstream = request.to_upstream(&settings(), true).unwrap();
        assert_eq!(upstream.model, "default-model");
        assert_eq!(upstream.max_tool_calls, Some(30));
        assert_eq!(upstream.tools, vec![ToolKind::WebSearch]);
        assert!(upstream.background);

        let empty = ResearchRequest {
            query: "   ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            empty.to_upstream(&settings(), true),
            Err(JobError::InvalidRequest(_))
        ));

        let bad_tool = ResearchRequest {
            query: "q".to_string(),
            tools: vec!["shell".to_string()],
            ..Default::default()
        };
        assert!(bad_tool.to_upstream(&settings(), false).is_err());

        let zero_budget = ResearchRequest {
            query: "q".to_string(),
            max_tool_calls: Some(0),
            ..Default::default()
        };
        assert!(zero_budget.to_upstream(&settings(), true).is_err());
    }
}
