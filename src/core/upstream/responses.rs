use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::sse::SseDecoder;
use super::{EventStream, Upstream, UpstreamRequest, UpstreamResponse};
use crate::core::events::StreamEvent;

/// Client for an OpenAI-Responses-compatible HTTP API.
pub struct ResponsesClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl ResponsesClient {
    pub fn new(base_url: &str, api_key: String, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }

    async fn checked(res: Response, action: &str) -> Result<Response> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        Err(anyhow!(
            "Upstream {} failed ({}): {}",
            action,
            status,
            res.text().await.unwrap_or_default()
        ))
    }
}

pub(crate) fn request_body(request: &UpstreamRequest, stream: bool) -> Value {
    let mut body = serde_json::json!({
        "model": request.model,
        "input": request.input,
        "background": request.background,
        "stream": stream,
        "tools": request.tools.iter().map(|t| t.to_json()).collect::<Vec<_>>(),
    });
    if let Some(max) = request.max_tool_calls {
        body["max_tool_calls"] = serde_json::json!(max);
    }
    body
}

#[async_trait]
impl Upstream for ResponsesClient {
    async fn create(&self, request: &UpstreamRequest) -> Result<UpstreamResponse> {
        info!(
            "Creating upstream response (model: {}, background: {})",
            request.model, request.background
        );
        let res = self
            .authorized(self.client.post(format!("{}/responses", self.base_url)))
            .json(&request_body(request, false))
            .send()
            .await?;
        let body: Value = Self::checked(res, "create").await?.json().await?;
        UpstreamResponse::from_json(&body)
    }

    async fn retrieve(&self, id: &str) -> Result<UpstreamResponse> {
        let res = self
            .authorized(
                self.client
                    .get(format!("{}/responses/{}", self.base_url, id)),
            )
            .send()
            .await?;
        let body: Value = Self::checked(res, "retrieve").await?.json().await?;
        UpstreamResponse::from_json(&body)
    }

    async fn cancel(&self, id: &str) -> Result<()> {
        let res = self
            .authorized(
                self.client
                    .post(format!("{}/responses/{}/cancel", self.base_url, id)),
            )
            .send()
            .await?;
        Self::checked(res, "cancel").await?;
        Ok(())
    }

    async fn stream(&self, request: &UpstreamRequest) -> Result<EventStream> {
        let res = self
            .authorized(self.client.post(format!("{}/responses", self.base_url)))
            .json(&request_body(request, true))
            .send()
            .await?;
        let res = Self::checked(res, "stream").await?;

        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(64);
        tokio::spawn(async move {
            let bytes = Box::pin(res.bytes_stream().map(|r| r.map_err(std::io::Error::other)));
            let reader = tokio_util::io::StreamReader::new(bytes);
            let mut lines = tokio::io::BufReader::new(reader).lines();
            let mut decoder = SseDecoder::default();

            loop {
                let frame = match lines.next_line().await {
                    Ok(Some(line)) => decoder.push_line(&line),
                    Ok(None) => {
                        if let Some(data) = decoder.flush()
                            && data != "[DONE]"
                        {
                            let _ = tx.send(Ok(StreamEvent::from_sse_data(&data))).await;
                        }
                        break;
                    }
                    Err(e) => {
                        warn!("Upstream stream read failed: {}", e);
                        let _ = tx.send(Err(anyhow!("stream read failed: {}", e))).await;
                        break;
                    }
                };

                let Some(data) = frame else {
                    continue;
                };
                if data == "[DONE]" {
                    debug!("Upstream stream sent [DONE]");
                    break;
                }
                if tx.send(Ok(StreamEvent::from_sse_data(&data))).await.is_err() {
                    debug!("Stream consumer went away; dropping upstream connection");
                    break;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
