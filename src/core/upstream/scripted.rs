use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{EventStream, Upstream, UpstreamRequest, UpstreamResponse};
use crate::core::events::StreamEvent;

/// In-memory upstream whose responses are set by the test.
#[derive(Default)]
pub(crate) struct ScriptedUpstream {
    responses: Mutex<HashMap<String, Value>>,
    stream_frames: Mutex<Vec<Value>>,
    requests: Mutex<Vec<UpstreamRequest>>,
    next_id: AtomicUsize,
    pub(crate) fail_create: AtomicBool,
    pub(crate) fail_retrieve: AtomicBool,
    pub(crate) fail_cancel: AtomicBool,
    pub(crate) retrieve_calls: AtomicUsize,
    pub(crate) cancel_calls: AtomicUsize,
}

impl ScriptedUpstream {
    pub(crate) fn set_response(&self, id: &str, status: &str, output: Value) {
        self.responses.lock().unwrap().insert(
            id.to_string(),
            json!({ "id": id, "status": status, "output": output }),
        );
    }

    pub(crate) fn set_raw_response(&self, id: &str, body: Value) {
        self.responses.lock().unwrap().insert(id.to_string(), body);
    }

    pub(crate) fn set_stream(&self, frames: Vec<Value>) {
        *self.stream_frames.lock().unwrap() = frames;
    }

    pub(crate) fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn create(&self, request: &UpstreamRequest) -> Result<UpstreamResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(anyhow!("upstream unavailable"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("resp_{}", n);
        self.set_response(&id, "queued", json!([]));
        let body = self.responses.lock().unwrap()[&id].clone();
        UpstreamResponse::from_json(&body)
    }

    async fn retrieve(&self, id: &str) -> Result<UpstreamResponse> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_retrieve.load(Ordering::SeqCst) {
            return Err(anyhow!("upstream timed out"));
        }
        let body = self
            .responses
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no such response {}", id))?;
        UpstreamResponse::from_json(&body)
    }

    async fn cancel(&self, id: &str) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(anyhow!("cancel rejected"));
        }
        if let Some(body) = self.responses.lock().unwrap().get_mut(id) {
            body["status"] = json!("cancelled");
        }
        Ok(())
    }

    async fn stream(&self, request: &UpstreamRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(anyhow!("upstream unavailable"));
        }
        let frames = self.stream_frames.lock().unwrap().clone();
        let events: Vec<Result<StreamEvent>> = frames
            .iter()
            .map(|frame| Ok(StreamEvent::from_json(frame)))
            .collect();
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}
